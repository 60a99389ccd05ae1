//! Tile-level change detection between consecutive screen frames.
//!
//! The screen is walked as a grid of 64×64 tiles in row-major order.
//! A tile is "changed" when any of its scanlines differ from the
//! previous frame; a missing previous frame marks every tile changed,
//! so the first comparison always produces a full update. Changed
//! tiles are classified by a bounded palette scan: a tile with exactly
//! one distinct 24-bit color becomes a [`Paint::Solid`] rect, anything
//! else is shipped as [`Paint::Raw`] pixels.
//!
//! Edge tiles are clipped to the buffer, never padded, so the rects of
//! a full update tile the screen exactly and no scan reads past the
//! pixel vector. The whole pass is O(width × height); the 64×64 grain
//! keeps the worst-case palette scan per tile small.

use crate::fb::types::{Paint, PixelBuffer, Rect, ScreenUpdate};

/// Tile edge length in pixels.
pub const TILE_SIZE: usize = 64;

/// The palette scan gives up after this many distinct colors and the
/// tile falls back to raw pixels.
pub const MAX_TILE_COLORS: usize = 32;

/// Compare `current` against `previous` and collect the changed tiles.
///
/// Returns `None` when nothing changed — callers never send an empty
/// update. A `previous` of different dimensions is ignored, which
/// turns a resolution change into a full update.
pub fn compare_screens(
    current: &PixelBuffer,
    previous: Option<&PixelBuffer>,
) -> Option<ScreenUpdate> {
    let width = current.width as usize;
    let height = current.height as usize;
    if width == 0 || height == 0 {
        return None;
    }

    let previous =
        previous.filter(|prev| prev.width == current.width && prev.height == current.height);

    let mut rects = Vec::new();
    let mut ty = 0;
    while ty < height {
        let tile_h = TILE_SIZE.min(height - ty);
        let mut tx = 0;
        while tx < width {
            let tile_w = TILE_SIZE.min(width - tx);
            let changed = match previous {
                Some(prev) => tile_differs(current, prev, tx, ty, tile_w, tile_h),
                None => true,
            };
            if changed {
                rects.push(encode_tile(current, tx, ty, tile_w, tile_h));
            }
            tx += TILE_SIZE;
        }
        ty += TILE_SIZE;
    }

    if rects.is_empty() {
        None
    } else {
        Some(ScreenUpdate { rects })
    }
}

/// Scanline-compare one tile between two equally sized frames.
fn tile_differs(
    current: &PixelBuffer,
    previous: &PixelBuffer,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
) -> bool {
    let stride = current.width as usize;
    for row in y..y + h {
        let start = row * stride + x;
        if current.pixels[start..start + w] != previous.pixels[start..start + w] {
            return true;
        }
    }
    false
}

/// Turn a changed tile into a rect, choosing its paint.
fn encode_tile(frame: &PixelBuffer, x: usize, y: usize, w: usize, h: usize) -> Rect {
    let paint = match solid_color(frame, x, y, w, h) {
        Some(color) => Paint::solid_from_pixel(color),
        None => Paint::Raw(copy_tile(frame, x, y, w, h)),
    };
    Rect {
        x: x as u16,
        y: y as u16,
        width: w as u16,
        height: h as u16,
        paint,
    }
}

/// The tile's single 24-bit color, if it has exactly one.
///
/// Collects distinct colors (alpha stripped) into a fixed table and
/// bails out past [`MAX_TILE_COLORS`]; 2 through 32 distinct colors
/// and the overflow case all classify as raw.
fn solid_color(frame: &PixelBuffer, x: usize, y: usize, w: usize, h: usize) -> Option<u32> {
    let stride = frame.width as usize;
    let mut palette = [0u32; MAX_TILE_COLORS];
    let mut used = 0;

    for row in y..y + h {
        let start = row * stride + x;
        for &pixel in &frame.pixels[start..start + w] {
            let color = pixel & 0x00ff_ffff;
            if !palette[..used].contains(&color) {
                if used == MAX_TILE_COLORS {
                    return None;
                }
                palette[used] = color;
                used += 1;
            }
        }
    }

    if used == 1 { Some(palette[0]) } else { None }
}

/// Copy a tile's pixels out, clipped rows only.
fn copy_tile(frame: &PixelBuffer, x: usize, y: usize, w: usize, h: usize) -> Vec<u32> {
    let stride = frame.width as usize;
    let mut pixels = Vec::with_capacity(w * h);
    for row in y..y + h {
        let start = row * stride + x;
        pixels.extend_from_slice(&frame.pixels[start..start + w]);
    }
    pixels
}
