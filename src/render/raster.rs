//! Minimal raster primitives over `RgbaImage`.
//!
//! Coverage is decided by pixel centers, so output is exact and repeatable
//! for the same inputs.

use image::{Rgba, RgbaImage};

pub type Color = [u8; 4];

pub const TRANSPARENT: Color = [0, 0, 0, 0];

fn blend(dst: &mut Rgba<u8>, src: Color) {
    let a = src[3] as u32;
    if a == 255 {
        dst.0 = src;
        return;
    }
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        dst.0[c] = ((src[c] as u32 * a + dst.0[c] as u32 * inv) / 255) as u8;
    }
    dst.0[3] = (a + dst.0[3] as u32 * inv / 255).min(255) as u8;
}

/// Pixel index range whose centers fall inside `[lo, hi)`.
fn span(lo: f64, hi: f64, limit: u32) -> std::ops::Range<u32> {
    let start = (lo - 0.5).ceil().max(0.0);
    let end = (hi - 0.5).ceil().max(0.0);
    let start = (start as u64).min(limit as u64) as u32;
    let end = (end as u64).min(limit as u64) as u32;
    start..end.max(start)
}

pub fn clear(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        px.0 = TRANSPARENT;
    }
}

/// True when pixel center `(px, py)` lies inside a `w`x`h` rect with rounded corners.
fn in_rounded_rect(px: f64, py: f64, w: f64, h: f64, radius: f64) -> bool {
    let r = radius.min(w * 0.5).min(h * 0.5).max(0.0);
    let cx = px.clamp(r, w - r);
    let cy = py.clamp(r, h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Draw `src` scaled to fill `dst`, clipped to a rounded rectangle.
pub fn blit_rounded(dst: &mut RgbaImage, src: &RgbaImage, radius: f64) {
    let (w, h) = dst.dimensions();
    let (sw, sh) = src.dimensions();
    if w == 0 || h == 0 || sw == 0 || sh == 0 {
        return;
    }
    for y in 0..h {
        let sy = ((y as u64 * sh as u64) / h as u64) as u32;
        for x in 0..w {
            if !in_rounded_rect(x as f64 + 0.5, y as f64 + 0.5, w as f64, h as f64, radius) {
                continue;
            }
            let sx = ((x as u64 * sw as u64) / w as u64) as u32;
            let color = src.get_pixel(sx, sy).0;
            blend(dst.get_pixel_mut(x, y), color);
        }
    }
}

pub fn fill_rect(img: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, color: Color) {
    let (iw, ih) = img.dimensions();
    for py in span(y, y + h, ih) {
        for px in span(x, x + w, iw) {
            blend(img.get_pixel_mut(px, py), color);
        }
    }
}

/// Stroke a rectangle outline centered on its path, like a 2D canvas `strokeRect`.
pub fn stroke_rect(img: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, line_width: f64, color: Color) {
    let half = line_width * 0.5;
    let (ox0, oy0, ox1, oy1) = (x - half, y - half, x + w + half, y + h + half);
    let (ix0, iy0, ix1, iy1) = (x + half, y + half, x + w - half, y + h - half);
    let (iw, ih) = img.dimensions();
    for py in span(oy0, oy1, ih) {
        let cy = py as f64 + 0.5;
        for px in span(ox0, ox1, iw) {
            let cx = px as f64 + 0.5;
            let inner = cx >= ix0 && cx < ix1 && cy >= iy0 && cy < iy1;
            if !inner {
                blend(img.get_pixel_mut(px, py), color);
            }
        }
    }
}

pub fn fill_circle(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Color) {
    let (iw, ih) = img.dimensions();
    let r2 = radius * radius;
    for py in span(cy - radius, cy + radius, ih) {
        let dy = py as f64 + 0.5 - cy;
        for px in span(cx - radius, cx + radius, iw) {
            let dx = px as f64 + 0.5 - cx;
            if dx * dx + dy * dy <= r2 {
                blend(img.get_pixel_mut(px, py), color);
            }
        }
    }
}
