//! The axum HTTP facade: routing, conditional-request handling, and
//! response shaping. `ipx` itself stays framework-agnostic; everything that
//! talks HTTP lives here.
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use headers::{ETag, HeaderMapExt, IfModifiedSince, IfNoneMatch, LastModified};
use ipx::engine::ImageRequest;
use ipx::error::IpxError;
use ipx::response::{error_response, shape, Body as ShapedBody, ResponseDraft, ShapedResponse};
use ipx::IpxContext;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Builds the router for a given context. Middleware (tracing, etc.) is
/// layered on by the caller so tests can exercise the bare router.
pub fn build_router(ctx: Arc<IpxContext>) -> Router {
    Router::new().route("/*path", get(handle)).with_state(ctx)
}

#[derive(Debug, Deserialize, Default)]
struct QueryParams {
    #[serde(default, rename = "bypassDomain")]
    bypass_domain: bool,
}

async fn handle(
    State(ctx): State<Arc<IpxContext>>,
    Path(path): Path<String>,
    Query(params): Query<QueryParams>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return to_axum_response(error_response(&IpxError::MethodNotAllowed(format!("{} not allowed", method))), method);
    }

    match serve_image(ctx, &path, params.bypass_domain, &headers).await {
        Ok(shaped) => to_axum_response(shaped, method),
        Err(err) => {
            if matches!(err, IpxError::Internal(_)) && tracing::enabled!(tracing::Level::DEBUG) {
                tracing::error!(error = %err, "request failed");
            }
            to_axum_response(error_response(&err), method)
        },
    }
}

async fn serve_image(ctx: Arc<IpxContext>, path: &str, bypass_domain: bool, headers: &HeaderMap) -> Result<ShapedResponse, IpxError> {
    // axum's `/*path` wildcard strips exactly the route's own leading slash;
    // re-add it so a doubled slash in the original URI (meaning "empty
    // modifier segment") survives into `decode_path`.
    let request = ImageRequest::from_path(ctx, &format!("/{}", path), bypass_domain)?;

    let src = request.src().await?;
    if let Some(mtime) = src.mtime {
        if let Some(since) = headers.typed_get::<IfModifiedSince>() {
            if !since.is_modified(mtime) {
                return Ok(shape(not_modified_draft(src.max_age)));
            }
        }
    }

    let data = request.data().await?;
    let digest = format!("{:x}", Sha256::digest(&data.bytes));
    let etag = ETag::from_str(&format!("\"{}\"", digest)).map_err(|_| IpxError::internal("invalid etag digest"))?;
    if let Some(if_none_match) = headers.typed_get::<IfNoneMatch>() {
        if !if_none_match.precondition_passes(&etag) {
            return Ok(shape(not_modified_draft(src.max_age)));
        }
    }

    let mut typed_headers = HeaderMap::new();
    typed_headers.typed_insert(etag);
    if let Some(mtime) = src.mtime {
        typed_headers.typed_insert(LastModified::from(mtime));
    }

    let mut draft = ResponseDraft::new(200)
        .with_header("content-type", data.content_type.clone())
        .with_header("content-security-policy", "default-src 'none'");
    for (name, value) in typed_headers.iter() {
        if let Ok(value) = value.to_str() {
            draft = draft.with_header(name.as_str(), value.to_string());
        }
    }
    if let Some(max_age) = src.max_age {
        draft = draft.with_header("cache-control", format!("max-age={}, public, s-maxage={}", max_age, max_age));
    }

    Ok(shape(draft.with_body(ShapedBody::Bytes(data.bytes))))
}

fn not_modified_draft(max_age: Option<u32>) -> ResponseDraft {
    let mut draft = ResponseDraft::new(304);
    if let Some(max_age) = max_age {
        draft = draft.with_header("cache-control", format!("max-age={}, public, s-maxage={}", max_age, max_age));
    }
    draft
}

fn to_axum_response(shaped: ShapedResponse, method: Method) -> Response {
    let status = StatusCode::from_u16(shaped.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &shaped.headers {
        if let Ok(value) = HeaderValue::from_str(value) {
            builder = builder.header(name, value);
        }
    }
    if status == StatusCode::METHOD_NOT_ALLOWED {
        builder = builder.header("allow", "GET, HEAD");
    }

    let body = if method == Method::HEAD {
        builder = builder.header(axum::http::header::CONTENT_LENGTH, shaped.body.len().to_string());
        Body::empty()
    } else {
        Body::from(shaped.body)
    };

    builder.body(body).unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use ipx::config::IpxConfig;
    use tower::ServiceExt;

    use super::*;

    fn sample_png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(100, 100, image::Rgba([1, 2, 3, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    async fn test_app() -> Router {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), sample_png()).unwrap();
        let mut config = IpxConfig::default();
        config.dir = Some(dir.path().to_string_lossy().to_string());
        std::mem::forget(dir);
        let ctx = IpxContext::new(config).unwrap();
        build_router(ctx)
    }

    #[tokio::test]
    async fn serves_identity_pipeline() {
        let app = test_app().await;
        let response = app
            .oneshot(axum::http::Request::builder().uri("/_/logo.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
        assert!(response.headers().get("etag").is_some());
    }

    #[tokio::test]
    async fn post_is_method_not_allowed() {
        let app = test_app().await;
        let response = app
            .oneshot(axum::http::Request::builder().method("POST").uri("/_/logo.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get("allow").unwrap(), "GET, HEAD");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!bytes.is_empty());
    }
}
