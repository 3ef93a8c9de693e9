//! Static handler table (§4.4): modifier name → parser + effect.
//!
//! Context-setters only mutate [`HandlerContext`]; pipeline operations drive
//! the [`Pipeline`]. Both shapes fit the same function signature so the
//! table can stay a flat, linearly-scanned slice, small enough that a
//! perfect-hash map would only add a dependency, not speed.
use crate::codec::{parse_color, Fit, Margins, Pipeline, Position, ResizeOpts};
use crate::error::IpxError;
use crate::literal::{as_bool, as_f64, as_u32, parse_literal};

/// Per-request mutable record populated by setter handlers and consulted by
/// operation handlers (§3's "handler context").
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub width: u32,
    pub height: u32,
    pub quality: Option<u8>,
    pub fit: Fit,
    pub position: Position,
    pub background: image::Rgba<u8>,
    pub enlarge: bool,
}

impl HandlerContext {
    pub fn new(width: u32, height: u32) -> HandlerContext {
        HandlerContext {
            width,
            height,
            quality: None,
            fit: Fit::default(),
            position: Position::default(),
            background: image::Rgba([0, 0, 0, 255]),
            enlarge: false,
        }
    }

    fn resize_opts(&self) -> ResizeOpts {
        ResizeOpts { fit: self.fit, position: self.position, background: self.background, without_enlargement: !self.enlarge }
    }
}

/// A single registered modifier.
pub struct HandlerSpec {
    pub name: &'static str,
    /// Setters run before any operation regardless of the modifier map's
    /// insertion order (§4.4, §8 invariant 6).
    pub is_setter: bool,
    pub apply: fn(&mut HandlerContext, &mut Pipeline, &str) -> Result<(), IpxError>,
}

pub fn find(name: &str) -> Option<&'static HandlerSpec> {
    HANDLERS.iter().find(|h| h.name == name)
}

fn as_color(raw: &str) -> image::Rgba<u8> {
    let hex_like = raw.len() == 3 || raw.len() == 6;
    let prefixed = if hex_like && raw.chars().all(|c| c.is_ascii_hexdigit()) { format!("#{}", raw) } else { raw.to_string() };
    parse_color(&prefixed)
}

fn parse_quad(raw: &str) -> Result<Margins, IpxError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 {
        return Err(IpxError::BadRequest(format!("Expected 4 comma-separated values, got {}", raw)));
    }
    let parse = |s: &str| -> Result<u32, IpxError> {
        as_u32(&parse_literal(s)).ok_or_else(|| IpxError::BadRequest(format!("Invalid margin value {}", s)))
    };
    Ok(Margins { top: parse(parts[0])?, right: parse(parts[1])?, bottom: parse(parts[2])?, left: parse(parts[3])? })
}

fn parse_dims(raw: &str) -> Result<(u32, u32), IpxError> {
    let mut parts = raw.splitn(2, ['x', 'X']);
    let w = parts.next().unwrap_or("");
    let w = as_u32(&parse_literal(w)).ok_or_else(|| IpxError::BadRequest(format!("Invalid size {}", raw)))?;
    let h = match parts.next() {
        Some(h) if !h.is_empty() => as_u32(&parse_literal(h)).ok_or_else(|| IpxError::BadRequest(format!("Invalid size {}", raw)))?,
        _ => w,
    };
    Ok((w, h))
}

fn arg_u32(raw: &str, name: &str) -> Result<u32, IpxError> {
    as_u32(&parse_literal(raw)).ok_or_else(|| IpxError::BadRequest(format!("{} expects a number, got {}", name, raw)))
}

fn arg_f64(raw: &str, name: &str) -> Result<f64, IpxError> {
    as_f64(&parse_literal(raw)).ok_or_else(|| IpxError::BadRequest(format!("{} expects a number, got {}", name, raw)))
}

fn parse_csv_f64(raw: &str, count: usize) -> Result<Vec<f64>, IpxError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != count {
        return Err(IpxError::BadRequest(format!("Expected {} comma-separated numbers, got {}", count, raw)));
    }
    parts.iter().map(|p| arg_f64(p, "argument")).collect()
}

static HANDLERS: &[HandlerSpec] = &[
    HandlerSpec {
        name: "q",
        is_setter: true,
        apply: |ctx, _pipeline, raw| {
            ctx.quality = Some(arg_u32(raw, "q")?.min(100) as u8);
            Ok(())
        },
    },
    HandlerSpec { name: "quality", is_setter: true, apply: |ctx, _p, raw| {
        ctx.quality = Some(arg_u32(raw, "quality")?.min(100) as u8);
        Ok(())
    } },
    HandlerSpec { name: "fit", is_setter: true, apply: |ctx, _p, raw| {
        ctx.fit = Fit::parse(raw);
        Ok(())
    } },
    HandlerSpec { name: "pos", is_setter: true, apply: |ctx, _p, raw| {
        ctx.position = Position::parse(raw);
        Ok(())
    } },
    HandlerSpec { name: "position", is_setter: true, apply: |ctx, _p, raw| {
        ctx.position = Position::parse(raw);
        Ok(())
    } },
    HandlerSpec { name: "background", is_setter: true, apply: |ctx, _p, raw| {
        ctx.background = as_color(raw);
        Ok(())
    } },
    HandlerSpec { name: "b", is_setter: true, apply: |ctx, _p, raw| {
        ctx.background = as_color(raw);
        Ok(())
    } },
    HandlerSpec { name: "enlarge", is_setter: true, apply: |ctx, _p, raw| {
        ctx.enlarge = raw.is_empty() || as_bool(&parse_literal(raw));
        Ok(())
    } },
    HandlerSpec { name: "w", is_setter: false, apply: |ctx, pipeline, raw| {
        let w = arg_u32(raw, "w")?;
        pipeline.resize(Some(w), None, ctx.resize_opts());
        Ok(())
    } },
    HandlerSpec { name: "width", is_setter: false, apply: |ctx, pipeline, raw| {
        let w = arg_u32(raw, "width")?;
        pipeline.resize(Some(w), None, ctx.resize_opts());
        Ok(())
    } },
    HandlerSpec { name: "h", is_setter: false, apply: |ctx, pipeline, raw| {
        let h = arg_u32(raw, "h")?;
        pipeline.resize(None, Some(h), ctx.resize_opts());
        Ok(())
    } },
    HandlerSpec { name: "height", is_setter: false, apply: |ctx, pipeline, raw| {
        let h = arg_u32(raw, "height")?;
        pipeline.resize(None, Some(h), ctx.resize_opts());
        Ok(())
    } },
    HandlerSpec { name: "s", is_setter: false, apply: apply_resize },
    HandlerSpec { name: "resize", is_setter: false, apply: apply_resize },
    HandlerSpec { name: "trim", is_setter: false, apply: |_ctx, pipeline, raw| {
        let threshold = if raw.is_empty() { 10 } else { arg_u32(raw, "trim")?.min(255) as u8 };
        pipeline.trim(threshold);
        Ok(())
    } },
    HandlerSpec { name: "extend", is_setter: false, apply: |ctx, pipeline, raw| {
        pipeline.extend(parse_quad(raw)?, ctx.background);
        Ok(())
    } },
    HandlerSpec { name: "extract", is_setter: false, apply: apply_extract },
    HandlerSpec { name: "crop", is_setter: false, apply: apply_extract },
    HandlerSpec { name: "rotate", is_setter: false, apply: |ctx, pipeline, raw| {
        let angle = arg_f64(raw, "rotate")?;
        pipeline.rotate(angle, ctx.background);
        Ok(())
    } },
    HandlerSpec { name: "flip", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.flip();
        Ok(())
    } },
    HandlerSpec { name: "flop", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.flop();
        Ok(())
    } },
    HandlerSpec { name: "sharpen", is_setter: false, apply: |_ctx, pipeline, raw| {
        let v = parse_csv_f64(raw, 3)?;
        pipeline.sharpen(v[0] as f32, v[1] as f32, v[2] as f32);
        Ok(())
    } },
    HandlerSpec { name: "median", is_setter: false, apply: |_ctx, pipeline, raw| {
        pipeline.median(arg_u32(raw, "median")?);
        Ok(())
    } },
    HandlerSpec { name: "blur", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.blur();
        Ok(())
    } },
    HandlerSpec { name: "flatten", is_setter: false, apply: |ctx, pipeline, _raw| {
        pipeline.flatten(ctx.background);
        Ok(())
    } },
    HandlerSpec { name: "gamma", is_setter: false, apply: |_ctx, pipeline, raw| {
        let v = parse_csv_f64(raw, 2)?;
        pipeline.gamma(v[0], v[1]);
        Ok(())
    } },
    HandlerSpec { name: "negate", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.negate();
        Ok(())
    } },
    HandlerSpec { name: "normalize", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.normalize();
        Ok(())
    } },
    HandlerSpec { name: "threshold", is_setter: false, apply: |_ctx, pipeline, raw| {
        let level = if raw.is_empty() { 128 } else { arg_u32(raw, "threshold")?.min(255) as u8 };
        pipeline.threshold(level);
        Ok(())
    } },
    HandlerSpec { name: "modulate", is_setter: false, apply: |_ctx, pipeline, raw| {
        let v = parse_csv_f64(raw, 3)?;
        pipeline.modulate(v[0], v[1], v[2]);
        Ok(())
    } },
    HandlerSpec { name: "tint", is_setter: false, apply: |_ctx, pipeline, raw| {
        pipeline.tint(as_color(raw));
        Ok(())
    } },
    HandlerSpec { name: "grayscale", is_setter: false, apply: |_ctx, pipeline, _raw| {
        pipeline.grayscale();
        Ok(())
    } },
];

fn apply_resize(ctx: &mut HandlerContext, pipeline: &mut Pipeline, raw: &str) -> Result<(), IpxError> {
    let (mut w, mut h) = parse_dims(raw)?;
    if !ctx.enlarge && (w > ctx.width || h > ctx.height) {
        let aspect = w as f64 / h as f64;
        if w > ctx.width {
            w = ctx.width;
            h = (w as f64 / aspect).round().max(1.0) as u32;
        }
        if h > ctx.height {
            h = ctx.height;
            w = (h as f64 * aspect).round().max(1.0) as u32;
        }
    }
    pipeline.resize(Some(w), Some(h), ResizeOpts { without_enlargement: false, ..ctx.resize_opts() });
    Ok(())
}

fn apply_extract(ctx: &mut HandlerContext, pipeline: &mut Pipeline, raw: &str) -> Result<(), IpxError> {
    pipeline.extract(parse_quad(raw)?, ctx.background);
    Ok(())
}
