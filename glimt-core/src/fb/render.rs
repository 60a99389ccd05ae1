//! Viewer-side canvas that decoded updates are blitted into.
//!
//! The canvas is the destination buffer handed to whatever presents
//! pixels on screen. The core only fills it: solid rects paint runs of
//! one color, raw rects copy scanlines. Rects falling partly outside
//! the canvas are clipped, which keeps a late resize or a stale update
//! from ever writing out of bounds.

use crate::fb::types::{Paint, Rect, ScreenUpdate};

/// Destination pixel buffer for a viewed session.
///
/// Stride equals width: `0x00RRGGBB` pixels, row-major, top-left
/// origin, matching [`crate::fb::PixelBuffer`] on the capture side.
#[derive(Debug, Clone)]
pub struct ViewCanvas {
    width: u16,
    height: u16,
    pixels: Vec<u32>,
}

impl ViewCanvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Resize for a new share, dropping the old contents.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, 0);
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// The backing pixels, row-major with stride = width.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width as usize + x]
    }

    /// Blit every rect of an update, in order.
    pub fn apply(&mut self, update: &ScreenUpdate) {
        for rect in &update.rects {
            self.blit(rect);
        }
    }

    fn blit(&mut self, rect: &Rect) {
        let canvas_w = self.width as usize;
        let canvas_h = self.height as usize;
        let x = rect.x as usize;
        let y = rect.y as usize;
        if x >= canvas_w || y >= canvas_h {
            return;
        }
        let w = (rect.width as usize).min(canvas_w - x);
        let h = (rect.height as usize).min(canvas_h - y);

        match &rect.paint {
            Paint::Solid { r, g, b } => {
                let color = (u32::from(*r) << 16) | (u32::from(*g) << 8) | u32::from(*b);
                for row in y..y + h {
                    let start = row * canvas_w + x;
                    self.pixels[start..start + w].fill(color);
                }
            }
            Paint::Raw(src) => {
                // Source rows are rect.width wide even when the
                // destination is clipped narrower.
                let src_stride = rect.width as usize;
                for dy in 0..h {
                    let src_start = dy * src_stride;
                    if src_start + w > src.len() {
                        break;
                    }
                    let dst_start = (y + dy) * canvas_w + x;
                    self.pixels[dst_start..dst_start + w]
                        .copy_from_slice(&src[src_start..src_start + w]);
                }
            }
        }
    }
}
