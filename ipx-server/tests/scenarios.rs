//! End-to-end HTTP scenarios driven through an in-process router, covering
//! the request-resolution cycle from raw URI to shaped response: resize
//! negotiation, conditional requests, source rejection, and format
//! negotiation.
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use ipx::config::IpxConfig;
use ipx::url::Alias;
use ipx::IpxContext;
use ipx_server::build_router;
use tower::ServiceExt;

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 10, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

fn sample_svg() -> Vec<u8> {
    b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"10\"></svg>".to_vec()
}

/// Builds a router backed by a scratch filesystem root containing a 400x300
/// PNG, an SVG, and a nested file (for alias/traversal scenarios). The temp
/// directory is leaked so it outlives the router for the duration of the test.
fn test_app() -> axum::Router {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("photo.png"), sample_png(400, 300)).unwrap();
    std::fs::write(dir.path().join("icon.svg"), sample_svg()).unwrap();
    std::fs::create_dir(dir.path().join("secret")).unwrap();
    std::fs::write(dir.path().join("secret").join("data.png"), sample_png(10, 10)).unwrap();

    let mut config = IpxConfig::default();
    config.dir = Some(dir.path().to_string_lossy().to_string());
    config.alias = vec![Alias::new("/gallery", "")];
    config.domains = vec!["allowed.example.test".to_string()];
    std::mem::forget(dir);

    let ctx = IpxContext::new(config).unwrap();
    build_router(ctx)
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
}

#[tokio::test]
async fn identity_pipeline_returns_source_dimensions() {
    let app = test_app();
    let response = get(&app, "/_/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 300));
}

#[tokio::test]
async fn width_only_resize_preserves_aspect_ratio() {
    let app = test_app();
    let response = get(&app, "/w_200/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 150));
}

#[tokio::test]
async fn size_without_enlarge_clamps_to_source() {
    let app = test_app();
    let response = get(&app, "/s_1000x1000/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 300));
}

#[tokio::test]
async fn size_clamp_preserves_requested_aspect_not_source_aspect() {
    let app = test_app();
    let response = get(&app, "/s_1000x100/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 40));
}

#[tokio::test]
async fn enlarge_setter_lifts_the_clamp() {
    let app = test_app();
    let response = get(&app, "/enlarge,s_800x600/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));
}

#[tokio::test]
async fn conditional_request_with_matching_etag_is_304() {
    let app = test_app();
    let first = get(&app, "/_/photo.png").await;
    let etag = first.headers().get("etag").unwrap().to_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/_/photo.png").header("if-none-match", etag).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn path_traversal_outside_root_is_forbidden() {
    let app = test_app();
    let response = get(&app, "/_/../etc/passwd").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_modifiers_segment_is_bad_request() {
    let app = test_app();
    let response = get(&app, "//photo.png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remote_host_outside_allow_list_is_forbidden() {
    let app = test_app();
    let response = get(&app, "/_/https://blocked.example.test/x.png").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn format_and_quality_modifiers_negotiate_jpeg() {
    let app = test_app();
    let response = get(&app, "/f_jpeg,q_60/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
}

#[tokio::test]
async fn svg_source_passes_through_untouched() {
    let app = test_app();
    let response = get(&app, "/w_50/icon.svg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/svg+xml");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes, sample_svg());
}

#[tokio::test]
async fn alias_rewrites_id_prefix_before_fetch() {
    let app = test_app();
    let response = get(&app, "/_/gallery/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn head_request_has_no_body_but_reports_content_length() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().method("HEAD").uri("/_/photo.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_length: usize = response.headers().get("content-length").unwrap().to_str().unwrap().parse().unwrap();
    assert!(content_length > 0);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}
