// Canvas module
// Raster drawing primitives on RGBA surfaces, geometry in fractional pixels

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Fill the whole surface with `color`
pub fn fill(surface: &mut RgbaImage, color: Rgba<u8>) {
    for pixel in surface.pixels_mut() {
        *pixel = color;
    }
}

/// Fill an axis-aligned rectangle; a pixel is covered when its center is inside
pub fn fill_rect(surface: &mut RgbaImage, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
    fill_rounded_rect(surface, x, y, width, height, 0.0, color);
}

/// Fill a rectangle whose corners are rounded with `radius`
pub fn fill_rounded_rect(
    surface: &mut RgbaImage,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    radius: f32,
    color: Rgba<u8>,
) {
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let radius = radius.clamp(0.0, width.min(height) / 2.0);
    let (right, bottom) = (x + width, y + height);

    let (x0, y0) = (x.floor().max(0.0) as u32, y.floor().max(0.0) as u32);
    let x1 = (right.ceil().max(0.0) as u32).min(surface.width());
    let y1 = (bottom.ceil().max(0.0) as u32).min(surface.height());

    for py in y0..y1 {
        for px in x0..x1 {
            let cx = px as f32 + 0.5;
            let cy = py as f32 + 0.5;
            if cx < x || cx >= right || cy < y || cy >= bottom {
                continue;
            }
            if radius > 0.0 && !inside_corners(cx, cy, x, y, right, bottom, radius) {
                continue;
            }
            blend_pixel(surface, px, py, color);
        }
    }
}

fn inside_corners(cx: f32, cy: f32, left: f32, top: f32, right: f32, bottom: f32, radius: f32) -> bool {
    // Nearest corner circle center, if the point is in a corner square
    let ox = if cx < left + radius {
        left + radius
    } else if cx > right - radius {
        right - radius
    } else {
        return true;
    };
    let oy = if cy < top + radius {
        top + radius
    } else if cy > bottom - radius {
        bottom - radius
    } else {
        return true;
    };
    let (dx, dy) = (cx - ox, cy - oy);
    dx * dx + dy * dy <= radius * radius
}

/// Draw `src` stretched into the given rectangle, alpha-blended
pub fn draw_image(
    surface: &mut RgbaImage,
    src: &RgbaImage,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    filter: FilterType,
) {
    let w = width.round().max(1.0) as u32;
    let h = height.round().max(1.0) as u32;
    if src.width() == 0 || src.height() == 0 {
        return;
    }

    if src.dimensions() == (w, h) {
        imageops::overlay(surface, src, x.round() as i64, y.round() as i64);
    } else {
        let resized = imageops::resize(src, w, h, filter);
        imageops::overlay(surface, &resized, x.round() as i64, y.round() as i64);
    }
}

/// Source-over blend of a single pixel, ignoring out-of-bounds writes
pub fn blend_pixel(surface: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x >= surface.width() || y >= surface.height() {
        return;
    }
    let alpha = color.0[3] as u32;
    if alpha == 0 {
        return;
    }
    let dst = surface.get_pixel_mut(x, y);
    if alpha == 255 {
        *dst = color;
        return;
    }

    let inv = 255 - alpha;
    for c in 0..3 {
        dst.0[c] = ((color.0[c] as u32 * alpha + dst.0[c] as u32 * inv + 127) / 255) as u8;
    }
    dst.0[3] = (alpha + (dst.0[3] as u32 * inv + 127) / 255).min(255) as u8;
}
