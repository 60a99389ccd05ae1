//! Shared pixel and rect types used across the framebuffer pipeline.

/// A captured screen frame.
///
/// `width × height` 32-bit pixels in row-major order with a top-left
/// origin. Pixels are `0x00RRGGBB`; the high byte is carried along
/// untouched by the raw path but ignored everywhere colors are
/// compared or classified.
///
/// The capture loop keeps two of these, "current" and "previous", and
/// swaps them after each comparison instead of copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u32>,
}

impl PixelBuffer {
    /// A zeroed (all-black) buffer of the given dimensions.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Resize to the given dimensions, zeroing the contents.
    ///
    /// Reuses the existing allocation when the pixel count allows.
    /// Capture backends call this before writing a frame whose size
    /// may have changed.
    pub fn reset(&mut self, width: u16, height: u16) {
        let len = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(len, 0);
    }

    /// One scanline.
    pub fn row(&self, y: usize) -> &[u32] {
        let w = self.width as usize;
        &self.pixels[y * w..(y + 1) * w]
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width as usize + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        let w = self.width as usize;
        self.pixels[y * w + x] = color;
    }

    /// Fill the whole buffer with one color.
    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Fill a rectangular region, clipped to the buffer bounds.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        let bw = self.width as usize;
        let bh = self.height as usize;
        let x_end = (x + w).min(bw);
        let y_end = (y + h).min(bh);
        for row in y.min(bh)..y_end {
            self.pixels[row * bw + x.min(bw)..row * bw + x_end].fill(color);
        }
    }
}

/// How a rect's pixels are represented on the wire.
///
/// One variant per ZRLE sub-encoding; `match` exhaustiveness means a
/// future palette variant cannot be silently mis-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paint {
    /// Every pixel in the rect is this 24-bit color.
    Solid { r: u8, g: u8, b: u8 },
    /// Row-major `0x00RRGGBB` pixels, `width × height` of them.
    Raw(Vec<u32>),
}

impl Paint {
    /// Solid paint from a packed pixel, dropping the high byte.
    pub fn solid_from_pixel(pixel: u32) -> Self {
        Paint::Solid {
            r: (pixel >> 16) as u8,
            g: (pixel >> 8) as u8,
            b: pixel as u8,
        }
    }
}

/// One changed region of the screen plus how to paint it.
///
/// Produced fresh for each update; dropped once serialized on the
/// sending side or blitted on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub paint: Paint,
}

impl Rect {
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An ordered batch of changed rects. Insertion order is render order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenUpdate {
    pub rects: Vec<Rect>,
}

impl ScreenUpdate {
    pub fn rect_count(&self) -> usize {
        self.rects.len()
    }

    /// Sum of rect areas. Tiles within one update never overlap, so
    /// this equals the covered area.
    pub fn covered_area(&self) -> usize {
        self.rects.iter().map(Rect::area).sum()
    }
}
