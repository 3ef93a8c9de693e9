//! Request engine (§4.5): per-image memoization of source fetch and
//! pipeline output, optional external cache, SVG short-circuit.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::ImageFormat;

use crate::cache::CacheEntry;
use crate::codec::{self, Pipeline};
use crate::error::IpxError;
use crate::handlers::{self, HandlerContext};
use crate::literal::{as_bool, parse_literal};
use crate::once::Once;
use crate::source::SourceDescriptor;
use crate::url::{apply_aliases, decode_path, normalize_id, Modifiers};
use crate::IpxContext;

/// The decoded, encoded result of running one image request through the
/// pipeline (or the SVG passthrough).
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Bytes,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// One logical image request: a normalized id plus its modifier set,
/// holding the two memoized producers the HTTP facade drives (§3's "image
/// descriptor").
pub struct ImageRequest {
    ctx: Arc<IpxContext>,
    id: String,
    modifiers: Modifiers,
    bypass_domain: bool,
    src: Once<Arc<SourceDescriptor>>,
    data: Once<ImageData>,
}

impl ImageRequest {
    /// Decode `path`, normalize and alias-rewrite the id, and build a fresh
    /// (unresolved) request against `ctx`.
    pub fn from_path(ctx: Arc<IpxContext>, path: &str, bypass_domain: bool) -> Result<ImageRequest, IpxError> {
        let (modifiers, raw_id) = decode_path(path)?;
        let id = apply_aliases(&normalize_id(&raw_id), &ctx.config.alias);
        Ok(ImageRequest { ctx, id, modifiers, bypass_domain, src: Once::new(), data: Once::new() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deferred, memoized supplier resolution (§3's `getSrc`).
    pub async fn src(&self) -> Result<Arc<SourceDescriptor>, IpxError> {
        let ctx = self.ctx.clone();
        let id = self.id.clone();
        let bypass_domain = self.bypass_domain;
        self.src.get_or_init(move || resolve_src(ctx, id, bypass_domain)).await
    }

    /// Deferred, memoized pipeline output (§3's `getData`), including the
    /// optional external-cache lookup/write.
    pub async fn data(&self) -> Result<ImageData, IpxError> {
        let ctx = self.ctx.clone();
        let id = self.id.clone();
        let modifiers = self.modifiers.clone();
        let src_once = &self.src;
        let bypass_domain = self.bypass_domain;

        self.data.get_or_init(move || async move {
            let cache_key = build_cache_key(&id, &modifiers);

            if let Some(cache) = &ctx.cache {
                match cache.get(&cache_key).await {
                    Some(entry) => {
                        tracing::debug!(key = %cache_key, "cache hit");
                        return Ok(ImageData { bytes: Bytes::from(entry.bytes), content_type: entry.content_type, width: entry.width, height: entry.height });
                    },
                    None => tracing::debug!(key = %cache_key, "cache miss"),
                }
            }

            let src = src_once
                .get_or_init({
                    let ctx = ctx.clone();
                    let id = id.clone();
                    move || resolve_src(ctx, id, bypass_domain)
                })
                .await?;
            let raw = src.data().await?;

            let image_data = if looks_like_svg(&id, &raw) && !has_format_override(&modifiers) {
                ImageData { bytes: Bytes::from(raw.to_vec()), content_type: "image/svg+xml".to_string(), width: 0, height: 0 }
            } else {
                run_pipeline(raw, modifiers.clone()).await?
            };

            if let Some(cache) = &ctx.cache {
                let ttl = src.max_age.map(|secs| Duration::from_secs(secs as u64));
                cache.set(&cache_key, CacheEntry {
                    bytes: image_data.bytes.to_vec(),
                    content_type: image_data.content_type.clone(),
                    width: image_data.width,
                    height: image_data.height,
                    inserted_at: std::time::Instant::now(),
                    ttl,
                }).await;
            }

            Ok(image_data)
        }).await
    }
}

async fn resolve_src(ctx: Arc<IpxContext>, id: String, bypass_domain: bool) -> Result<Arc<SourceDescriptor>, IpxError> {
    let supplier = ctx.registry.select(&id)?.clone();
    let descriptor = supplier.resolve(&id, bypass_domain).await?;
    Ok(Arc::new(descriptor))
}

fn has_format_override(modifiers: &Modifiers) -> bool {
    modifiers.contains_key("f") || modifiers.contains_key("format")
}

fn looks_like_svg(id: &str, bytes: &Bytes) -> bool {
    if id.to_ascii_lowercase().ends_with(".svg") {
        return true;
    }
    let head = &bytes[..bytes.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

fn build_cache_key(id: &str, modifiers: &Modifiers) -> String {
    let mut map: BTreeMap<&str, &str> = BTreeMap::new();
    map.insert("id", id);
    for (k, v) in modifiers.iter() {
        map.insert(k, v);
    }
    serde_json::to_string(&map).unwrap_or_else(|_| id.to_string())
}

/// Runs decode → handler application → format negotiation → encode. CPU-bound,
/// so it executes inside `spawn_blocking` (§5) rather than on the async
/// reactor thread.
async fn run_pipeline(raw: Bytes, modifiers: Modifiers) -> Result<ImageData, IpxError> {
    tokio::task::spawn_blocking(move || run_pipeline_blocking(&raw, &modifiers))
        .await
        .map_err(|err| IpxError::internal(format!("pipeline task panicked: {}", err)))?
}

fn run_pipeline_blocking(raw: &[u8], modifiers: &Modifiers) -> Result<ImageData, IpxError> {
    let animated_requested = modifiers
        .get("a")
        .or_else(|| modifiers.get("animated"))
        .map(|v| v.is_empty() || as_bool(&parse_literal(v)))
        .unwrap_or(false);
    let probed_format = image::guess_format(raw).ok();
    let animated = animated_requested || probed_format == Some(ImageFormat::Gif);

    let (mut pipeline, meta) = Pipeline::decode(raw, animated).map_err(|err| {
        tracing::warn!(error = %err, "codec decode failed");
        err
    })?;
    let mut ctx = HandlerContext::new(meta.width, meta.height);

    // Setters first, in modifier-map insertion order, then operations:
    // the only ordering guarantee the handler table promises (§4.4, §8
    // invariant 6).
    for (name, value) in modifiers.iter() {
        if let Some(spec) = handlers::find(name) {
            if spec.is_setter {
                (spec.apply)(&mut ctx, &mut pipeline, value)?;
            }
        }
    }
    for (name, value) in modifiers.iter() {
        if let Some(spec) = handlers::find(name) {
            if !spec.is_setter {
                (spec.apply)(&mut ctx, &mut pipeline, value)?;
            }
        }
    }

    let requested_format = modifiers
        .get("f")
        .or_else(|| modifiers.get("format"))
        .and_then(|name| codec::resolve_format(name));
    let format = requested_format.or_else(|| codec::resolve_format(&meta.kind)).unwrap_or(ImageFormat::Png);

    let bytes = pipeline.encode(format, ctx.quality).map_err(|err| {
        tracing::warn!(error = %err, "codec encode failed");
        err
    })?;
    Ok(ImageData { bytes: Bytes::from(bytes), content_type: codec::mime_for(format).to_string(), width: pipeline.width(), height: pipeline.height() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::decode_path;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn detects_svg_by_extension() {
        assert!(looks_like_svg("/icon.svg", &Bytes::from_static(b"<svg></svg>")));
        assert!(!looks_like_svg("/icon.png", &Bytes::from_static(b"\x89PNG")));
    }

    #[test]
    fn detects_svg_by_sniffing_body() {
        assert!(looks_like_svg("/icon", &Bytes::from_static(b"<?xml version=\"1.0\"?><svg/>")));
    }

    #[test]
    fn cache_key_is_order_independent_of_modifier_insertion() {
        let (m1, _) = decode_path("/w_50,h_60/x.png").unwrap();
        let (m2, _) = decode_path("/h_60,w_50/x.png").unwrap();
        assert_eq!(build_cache_key("/x.png", &m1), build_cache_key("/x.png", &m2));
    }

    #[test]
    fn resizes_down_via_pipeline() {
        let raw = png_bytes(100, 100);
        let (modifiers, _) = decode_path("/w_50/x.png").unwrap();
        let result = run_pipeline_blocking(&raw, &modifiers).unwrap();
        assert_eq!((result.width, result.height), (50, 50));
        assert_eq!(result.content_type, "image/png");
    }

    #[test]
    fn format_modifier_switches_content_type() {
        let raw = png_bytes(10, 10);
        let (modifiers, _) = decode_path("/f_jpeg/x.png").unwrap();
        let result = run_pipeline_blocking(&raw, &modifiers).unwrap();
        assert_eq!(result.content_type, "image/jpeg");
    }

    #[test]
    fn setters_observed_before_operations_regardless_of_order() {
        let raw = png_bytes(100, 100);
        let (modifiers, _) = decode_path("/s_200x200,enlarge/x.png").unwrap();
        let result = run_pipeline_blocking(&raw, &modifiers).unwrap();
        assert_eq!((result.width, result.height), (200, 200));
    }
}
