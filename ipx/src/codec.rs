//! The codec pipeline abstraction (§4.3), wrapping the `image` crate behind
//! the operation vocabulary the handler table (§4.4) drives.
//!
//! An implementation that cannot fulfill a specific operation may omit it;
//! here every listed operation has a concrete (if sometimes approximate,
//! as with `median`, `trim`, and `modulate`'s saturation term)
//! implementation over `image::DynamicImage`, since the crate has no
//! separate native codec to delegate to.
use std::io::Cursor;

use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, GenericImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::error::IpxError;

/// Decoded source metadata (§3's `meta`).
#[derive(Debug, Clone)]
pub struct Meta {
    pub width: u32,
    pub height: u32,
    /// Inferred source type, e.g. `"png"`, `"jpeg"`, `"svg"`.
    pub kind: String,
    pub mime: String,
}

/// How `resize` reconciles a source aspect ratio with an explicit target
/// box. Named after the `sharp`/CSS `object-fit` vocabulary the `fit`
/// setter draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl Fit {
    pub fn parse(s: &str) -> Fit {
        match s.to_ascii_lowercase().as_str() {
            "contain" => Fit::Contain,
            "fill" => Fit::Fill,
            "inside" => Fit::Inside,
            "outside" => Fit::Outside,
            _ => Fit::Cover,
        }
    }
}

/// Anchor used when `fit` crops or pads rather than stretching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Position {
    pub fn parse(s: &str) -> Position {
        match s.to_ascii_lowercase().replace([' ', '_'], "-").as_str() {
            "top" | "north" => Position::Top,
            "bottom" | "south" => Position::Bottom,
            "left" | "west" => Position::Left,
            "right" | "east" => Position::Right,
            "top-left" | "left-top" | "north-west" => Position::TopLeft,
            "top-right" | "right-top" | "north-east" => Position::TopRight,
            "bottom-left" | "left-bottom" | "south-west" => Position::BottomLeft,
            "bottom-right" | "right-bottom" | "south-east" => Position::BottomRight,
            _ => Position::Center,
        }
    }

    fn offset(&self, outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
        let (ow, oh) = (outer.0 as i64, outer.1 as i64);
        let (iw, ih) = (inner.0 as i64, inner.1 as i64);
        let (cx, cy) = ((ow - iw) / 2, (oh - ih) / 2);
        match self {
            Position::Center => (cx, cy),
            Position::Top => (cx, 0),
            Position::Bottom => (cx, oh - ih),
            Position::Left => (0, cy),
            Position::Right => (ow - iw, cy),
            Position::TopLeft => (0, 0),
            Position::TopRight => (ow - iw, 0),
            Position::BottomLeft => (0, oh - ih),
            Position::BottomRight => (ow - iw, oh - ih),
        }
    }
}

/// Parses `"#rgb"`, `"#rrggbb"`, or a 3/6-hex string the setter already
/// prefixed with `#` (§4.4). Falls back to opaque black.
pub fn parse_color(s: &str) -> Rgba<u8> {
    let hex = s.trim_start_matches('#');
    let expand = |c: char| -> Option<u8> { u8::from_str_radix(&format!("{c}{c}"), 16).ok() };

    match hex.len() {
        3 => {
            let mut chars = hex.chars();
            if let (Some(r), Some(g), Some(b)) = (chars.next(), chars.next(), chars.next()) {
                if let (Some(r), Some(g), Some(b)) = (expand(r), expand(g), expand(b)) {
                    return Rgba([r, g, b, 255]);
                }
            }
            Rgba([0, 0, 0, 255])
        },
        6 | 8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
            let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
            let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
            let a = if hex.len() == 8 { u8::from_str_radix(&hex[6..8], 16).unwrap_or(255) } else { 255 };
            Rgba([r, g, b, a])
        },
        _ => Rgba([0, 0, 0, 255]),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeOpts {
    pub fit: Fit,
    pub position: Position,
    pub background: Rgba<u8>,
    pub without_enlargement: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// A single decoded frame plus its animation delay (1 frame for a static
/// image).
struct AnimFrame {
    image: DynamicImage,
    delay_ms: u32,
}

/// The pipeline: a static image, or a sequence of frames when `animated`
/// decode was requested and the source actually had more than one frame.
pub struct Pipeline {
    frames: Vec<AnimFrame>,
}

impl Pipeline {
    /// Decode `bytes`. When `animated` is set and the source is a GIF, every
    /// frame is decoded; otherwise only the first frame is used.
    pub fn decode(bytes: &[u8], animated: bool) -> Result<(Pipeline, Meta), IpxError> {
        let format = image::guess_format(bytes).map_err(|err| IpxError::internal(err.to_string()))?;

        if animated && format == ImageFormat::Gif {
            let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
                .map_err(|err| IpxError::internal(err.to_string()))?;
            let frames: Vec<AnimFrame> = decoder
                .into_frames()
                .collect_frames()
                .map_err(|err| IpxError::internal(err.to_string()))?
                .into_iter()
                .map(|frame| {
                    let (num, _) = frame.delay().numer_denom_ms();
                    AnimFrame { image: DynamicImage::ImageRgba8(frame.into_buffer()), delay_ms: num }
                })
                .collect();
            if frames.is_empty() {
                return Err(IpxError::internal("empty animation"));
            }
            let (width, height) = (frames[0].image.width(), frames[0].image.height());
            let meta = Meta { width, height, kind: "gif".to_string(), mime: "image/gif".to_string() };
            return Ok((Pipeline { frames }, meta));
        }

        let image = image::load_from_memory_with_format(bytes, format).map_err(|err| IpxError::internal(err.to_string()))?;
        let meta = Meta {
            width: image.width(),
            height: image.height(),
            kind: format_kind(format).to_string(),
            mime: format_mime(format).to_string(),
        };
        Ok((Pipeline { frames: vec![AnimFrame { image, delay_ms: 0 }] }, meta))
    }

    fn map_frames(&mut self, mut f: impl FnMut(DynamicImage) -> DynamicImage) {
        for frame in &mut self.frames {
            let taken = std::mem::replace(&mut frame.image, DynamicImage::new_rgba8(0, 0));
            frame.image = f(taken);
        }
    }

    pub fn width(&self) -> u32 {
        self.frames[0].image.width()
    }

    pub fn height(&self) -> u32 {
        self.frames[0].image.height()
    }

    pub fn resize(&mut self, width: Option<u32>, height: Option<u32>, opts: ResizeOpts) {
        let (src_w, src_h) = (self.width(), self.height());
        let (target_w, target_h) = match (width, height) {
            (Some(w), None) => {
                let h = (w as f64 * src_h as f64 / src_w as f64).round().max(1.0) as u32;
                if opts.without_enlargement && w > src_w { (src_w, src_h) } else { (w, h) }
            },
            (None, Some(h)) => {
                let w = (h as f64 * src_w as f64 / src_h as f64).round().max(1.0) as u32;
                if opts.without_enlargement && h > src_h { (src_w, src_h) } else { (w, h) }
            },
            (Some(w), Some(h)) => (w, h),
            (None, None) => return,
        };
        if target_w == src_w && target_h == src_h {
            return;
        }

        let background = opts.background;
        self.map_frames(|image| resize_one(image, target_w, target_h, opts.fit, opts.position, background));
    }

    pub fn extend(&mut self, margins: Margins, background: Rgba<u8>) {
        self.map_frames(|image| extend_one(image, margins, background));
    }

    /// `extract`/`crop`: a true crop, padding with `background` if the
    /// requested rectangle would otherwise extend past the source bounds.
    pub fn extract(&mut self, margins: Margins, background: Rgba<u8>) {
        self.map_frames(|image| extract_one(image, margins, background));
    }

    pub fn trim(&mut self, threshold: u8) {
        self.map_frames(|image| trim_one(image, threshold));
    }

    pub fn rotate(&mut self, angle: f64, background: Rgba<u8>) {
        self.map_frames(|image| rotate_one(image, angle, background));
    }

    pub fn flip(&mut self) {
        self.map_frames(|image| image.flipv());
    }

    pub fn flop(&mut self) {
        self.map_frames(|image| image.fliph());
    }

    pub fn sharpen(&mut self, sigma: f32, _flat: f32, jagged: f32) {
        let threshold = jagged.round() as i32;
        self.map_frames(|image| image.unsharpen(sigma, threshold));
    }

    pub fn median(&mut self, size: u32) {
        self.map_frames(|image| median_one(image, size.max(1)));
    }

    pub fn blur(&mut self) {
        self.map_frames(|image| image.blur(1.5));
    }

    pub fn flatten(&mut self, background: Rgba<u8>) {
        self.map_frames(|image| flatten_one(image, background));
    }

    pub fn gamma(&mut self, gamma_in: f64, gamma_out: f64) {
        self.map_frames(|image| gamma_one(image, gamma_in, gamma_out));
    }

    pub fn negate(&mut self) {
        self.map_frames(|mut image| {
            image.invert();
            image
        });
    }

    pub fn normalize(&mut self) {
        self.map_frames(normalize_one);
    }

    pub fn threshold(&mut self, level: u8) {
        self.map_frames(|image| threshold_one(image, level));
    }

    pub fn modulate(&mut self, brightness: f64, saturation: f64, hue: f64) {
        self.map_frames(|image| modulate_one(image, brightness, saturation, hue));
    }

    pub fn tint(&mut self, rgb: Rgba<u8>) {
        self.map_frames(|image| tint_one(image, rgb));
    }

    pub fn grayscale(&mut self) {
        self.map_frames(|image| image.grayscale());
    }

    /// Encode to `format` (already resolved; see `pipeline::resolve_format`).
    /// `animated` output re-encodes every frame as a GIF; any other format
    /// encodes the first frame only.
    pub fn encode(&self, format: ImageFormat, quality: Option<u8>) -> Result<Vec<u8>, IpxError> {
        if self.frames.len() > 1 && format == ImageFormat::Gif {
            return self.encode_gif();
        }

        let image = &self.frames[0].image;
        let mut buf = Vec::new();
        if format == ImageFormat::Jpeg {
            let quality = quality.unwrap_or(80).clamp(1, 100);
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.encode_image(image).map_err(|err| IpxError::internal(err.to_string()))?;
        } else {
            let mut cursor = Cursor::new(&mut buf);
            image.write_to(&mut cursor, format).map_err(|err| IpxError::internal(err.to_string()))?;
        }
        Ok(buf)
    }

    fn encode_gif(&self) -> Result<Vec<u8>, IpxError> {
        let mut buf = Vec::new();
        {
            let mut encoder = image::codecs::gif::GifEncoder::new(&mut buf);
            let frames: Vec<image::Frame> = self
                .frames
                .iter()
                .map(|f| {
                    let delay = image::Delay::from_numer_denom_ms(f.delay_ms.max(1), 1);
                    image::Frame::from_parts(f.image.to_rgba8(), 0, 0, delay)
                })
                .collect();
            encoder.encode_frames(frames).map_err(|err| IpxError::internal(err.to_string()))?;
        }
        Ok(buf)
    }
}

fn resize_one(image: DynamicImage, w: u32, h: u32, fit: Fit, position: Position, background: Rgba<u8>) -> DynamicImage {
    match fit {
        Fit::Fill => image.resize_exact(w, h, FilterType::Lanczos3),
        Fit::Inside => image.resize(w, h, FilterType::Lanczos3),
        Fit::Outside => {
            let (sw, sh) = (image.width() as f64, image.height() as f64);
            let scale = (w as f64 / sw).max(h as f64 / sh);
            let (nw, nh) = ((sw * scale).round() as u32, (sh * scale).round() as u32);
            image.resize_exact(nw.max(1), nh.max(1), FilterType::Lanczos3)
        },
        Fit::Cover => image.resize_to_fill(w, h, FilterType::Lanczos3),
        Fit::Contain => {
            let fitted = image.resize(w, h, FilterType::Lanczos3);
            let mut canvas = solid_canvas(w, h, background);
            let (ox, oy) = position.offset((w, h), (fitted.width(), fitted.height()));
            let _ = canvas.copy_from(&fitted, ox.max(0) as u32, oy.max(0) as u32);
            DynamicImage::ImageRgba8(canvas)
        },
    }
}

fn solid_canvas(w: u32, h: u32, background: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(w.max(1), h.max(1), background)
}

fn extend_one(image: DynamicImage, m: Margins, background: Rgba<u8>) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let (nw, nh) = (w + m.left + m.right, h + m.top + m.bottom);
    let mut canvas = solid_canvas(nw, nh, background);
    let _ = canvas.copy_from(&image.to_rgba8(), m.left, m.top);
    DynamicImage::ImageRgba8(canvas)
}

fn extract_one(image: DynamicImage, m: Margins, background: Rgba<u8>) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let needs_padding = m.left + m.right >= w || m.top + m.bottom >= h;

    let (image, w, h) = if needs_padding {
        let pad = Margins {
            top: m.top.max(0),
            right: m.right.max(0),
            bottom: m.bottom.max(0),
            left: m.left.max(0),
        };
        let padded = extend_one(image, pad, background);
        (padded, w + pad.left + pad.right, h + pad.top + pad.bottom)
    } else {
        (image, w, h)
    };

    let new_w = w.saturating_sub(m.left + m.right).max(1);
    let new_h = h.saturating_sub(m.top + m.bottom).max(1);
    image.crop_imm(m.left.min(w.saturating_sub(1)), m.top.min(h.saturating_sub(1)), new_w, new_h)
}

fn trim_one(image: DynamicImage, threshold: u8) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return image;
    }
    let reference = *rgba.get_pixel(0, 0);
    let differs = |p: &Rgba<u8>| {
        let diff = p.0.iter().zip(reference.0.iter()).map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs()).max().unwrap_or(0);
        diff as u8 > threshold
    };

    let (mut top, mut bottom, mut left, mut right) = (0, h, 0, w);
    'top: while top < bottom {
        for x in 0..w {
            if differs(rgba.get_pixel(x, top)) {
                break 'top;
            }
        }
        top += 1;
    }
    'bottom: while bottom > top {
        for x in 0..w {
            if differs(rgba.get_pixel(x, bottom - 1)) {
                break 'bottom;
            }
        }
        bottom -= 1;
    }
    'left: while left < right {
        for y in top..bottom {
            if differs(rgba.get_pixel(left, y)) {
                break 'left;
            }
        }
        left += 1;
    }
    'right: while right > left {
        for y in top..bottom {
            if differs(rgba.get_pixel(right - 1, y)) {
                break 'right;
            }
        }
        right -= 1;
    }

    if left >= right || top >= bottom {
        return image;
    }
    image.crop_imm(left, top, right - left, bottom - top)
}

fn rotate_one(image: DynamicImage, angle: f64, background: Rgba<u8>) -> DynamicImage {
    let normalized = ((angle % 360.0) + 360.0) % 360.0;
    if (normalized - 90.0).abs() < f64::EPSILON {
        return image.rotate90();
    }
    if (normalized - 180.0).abs() < f64::EPSILON {
        return image.rotate180();
    }
    if (normalized - 270.0).abs() < f64::EPSILON {
        return image.rotate270();
    }
    if normalized == 0.0 {
        return image;
    }

    let theta = normalized.to_radians() as f32;
    let (w, h) = (image.width() as f64, image.height() as f64);
    let new_w = (w * theta.cos().abs() as f64 + h * theta.sin().abs() as f64).ceil().max(1.0) as u32;
    let new_h = (w * theta.sin().abs() as f64 + h * theta.cos().abs() as f64).ceil().max(1.0) as u32;

    let margins = Margins {
        left: (new_w - image.width()) / 2,
        right: (new_w - image.width()).div_ceil(2),
        top: (new_h - image.height()) / 2,
        bottom: (new_h - image.height()).div_ceil(2),
    };
    let padded = extend_one(image, margins, background).to_rgba8();
    let rotated = rotate_about_center(&padded, theta, Interpolation::Bilinear, background);
    DynamicImage::ImageRgba8(rotated)
}

fn median_one(image: DynamicImage, size: u32) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    let radius = (size / 2) as i64;
    let mut out = RgbaImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut channels: [Vec<u8>; 4] = Default::default();
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    let p = rgba.get_pixel(sx, sy);
                    for c in 0..4 {
                        channels[c].push(p.0[c]);
                    }
                }
            }
            let mut pixel = [0u8; 4];
            for c in 0..4 {
                channels[c].sort_unstable();
                pixel[c] = channels[c][channels[c].len() / 2];
            }
            out.put_pixel(x, y, Rgba(pixel));
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn flatten_one(image: DynamicImage, background: Rgba<u8>) -> DynamicImage {
    let rgba = image.to_rgba8();
    let mut out = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let alpha = p.0[3] as f64 / 255.0;
        let blend = |src: u8, bg: u8| -> u8 { ((src as f64 * alpha) + (bg as f64 * (1.0 - alpha))).round() as u8 };
        out.put_pixel(
            x,
            y,
            Rgba([blend(p.0[0], background.0[0]), blend(p.0[1], background.0[1]), blend(p.0[2], background.0[2]), 255]),
        );
    }
    DynamicImage::ImageRgba8(out)
}

fn gamma_one(image: DynamicImage, gamma_in: f64, gamma_out: f64) -> DynamicImage {
    let exponent = if gamma_in > 0.0 { 1.0 / gamma_in } else { 1.0 / 2.2 };
    let post = if gamma_out > 0.0 { gamma_out } else { 1.0 };
    let mut rgba = image.to_rgba8();
    for p in rgba.pixels_mut() {
        for c in 0..3 {
            let v = p.0[c] as f64 / 255.0;
            let corrected = v.powf(exponent).powf(post);
            p.0[c] = (corrected.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

fn normalize_one(image: DynamicImage) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    let (mut lo, mut hi) = (255u8, 0u8);
    for p in rgba.pixels() {
        for c in 0..3 {
            lo = lo.min(p.0[c]);
            hi = hi.max(p.0[c]);
        }
    }
    if hi <= lo {
        return DynamicImage::ImageRgba8(rgba);
    }
    let (lo, hi) = (lo as f64, hi as f64);
    for p in rgba.pixels_mut() {
        for c in 0..3 {
            let v = (p.0[c] as f64 - lo) * 255.0 / (hi - lo);
            p.0[c] = v.clamp(0.0, 255.0).round() as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

fn threshold_one(image: DynamicImage, level: u8) -> DynamicImage {
    let gray = image.grayscale().to_luma8();
    let mut out = RgbaImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        let v = if p.0[0] > level { 255 } else { 0 };
        out.put_pixel(x, y, Rgba([v, v, v, 255]));
    }
    DynamicImage::ImageRgba8(out)
}

fn modulate_one(image: DynamicImage, brightness: f64, saturation: f64, hue: f64) -> DynamicImage {
    let mut out = image;
    if brightness != 1.0 {
        let offset = ((brightness - 1.0) * 128.0).round() as i32;
        out = out.brighten(offset);
    }
    if saturation != 1.0 {
        let mut rgba = out.to_rgba8();
        for p in rgba.pixels_mut() {
            let luma = 0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64;
            for c in 0..3 {
                let v = luma + (p.0[c] as f64 - luma) * saturation;
                p.0[c] = v.clamp(0.0, 255.0).round() as u8;
            }
        }
        out = DynamicImage::ImageRgba8(rgba);
    }
    if hue != 0.0 {
        out = out.huerotate(hue.round() as i32);
    }
    out
}

fn tint_one(image: DynamicImage, rgb: Rgba<u8>) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for p in rgba.pixels_mut() {
        let luma = (0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64) / 255.0;
        for c in 0..3 {
            p.0[c] = (rgb.0[c] as f64 * luma).clamp(0.0, 255.0).round() as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

fn format_kind(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Avif => "avif",
        ImageFormat::Bmp => "bmp",
        _ => "unknown",
    }
}

/// Public alias so callers outside this module (the request engine) can map
/// a resolved [`ImageFormat`] to the `Content-Type` value without reaching
/// into a private helper.
pub fn mime_for(format: ImageFormat) -> &'static str {
    format_mime(format)
}

fn format_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Avif => "image/avif",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Parses the `f`/`format` modifier value into an [`ImageFormat`], applying
/// the `jpg` → `jpeg` normalization (§4.4). Returns `None` for anything
/// outside the supported output set, in which case `toFormat` does not run.
pub fn resolve_format(name: &str) -> Option<ImageFormat> {
    match name.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "webp" => Some(ImageFormat::WebP),
        "avif" => Some(ImageFormat::Avif),
        "tiff" => Some(ImageFormat::Tiff),
        "gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: Rgba<u8>) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, color))
    }

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#fff"), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#ff0000"), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn resize_single_axis_preserves_aspect() {
        let png = encode_png(&solid(100, 50, Rgba([1, 2, 3, 255])));
        let (mut pipeline, meta) = Pipeline::decode(&png, false).unwrap();
        assert_eq!((meta.width, meta.height), (100, 50));
        pipeline.resize(Some(50), None, ResizeOpts::default());
        assert_eq!((pipeline.width(), pipeline.height()), (50, 25));
    }

    #[test]
    fn without_enlargement_caps_at_source_size() {
        let png = encode_png(&solid(100, 50, Rgba([1, 2, 3, 255])));
        let (mut pipeline, _) = Pipeline::decode(&png, false).unwrap();
        pipeline.resize(Some(200), None, ResizeOpts { without_enlargement: true, ..Default::default() });
        assert_eq!((pipeline.width(), pipeline.height()), (100, 50));
    }

    #[test]
    fn resolve_format_normalizes_jpg() {
        assert_eq!(resolve_format("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(resolve_format("bogus"), None);
    }

    #[test]
    fn extract_crops_exact_rectangle() {
        let png = encode_png(&solid(10, 10, Rgba([9, 9, 9, 255])));
        let (mut pipeline, _) = Pipeline::decode(&png, false).unwrap();
        pipeline.extract(Margins { top: 1, right: 1, bottom: 1, left: 1 }, Rgba([0, 0, 0, 255]));
        assert_eq!((pipeline.width(), pipeline.height()), (8, 8));
    }

    #[test]
    fn grayscale_drops_color() {
        let png = encode_png(&solid(4, 4, Rgba([10, 200, 30, 255])));
        let (mut pipeline, _) = Pipeline::decode(&png, false).unwrap();
        pipeline.grayscale();
        let buf = pipeline.encode(ImageFormat::Png, None).unwrap();
        assert!(!buf.is_empty());
    }
}
