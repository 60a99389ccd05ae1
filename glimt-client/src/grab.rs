//! Screen capture abstraction.
//!
//! Platform capture backends (X11, DXGI, wlroots) plug in behind
//! [`ScreenGrabber`]; the session loop only ever sees pixel buffers.
//! [`TestPattern`] is the built-in backend: a deterministic animation
//! that exercises the differ and encoder without touching any display
//! server, which is also exactly what the tests want.

use glimt_core::{GlimtError, PixelBuffer};

/// A source of screen frames. `Send` so a sharing client can live
/// inside a spawned task.
pub trait ScreenGrabber: Send {
    /// Native size of the captured surface.
    fn size(&self) -> (u16, u16);

    /// Grab one frame into `into`, resizing it if needed.
    fn capture(&mut self, into: &mut PixelBuffer) -> Result<(), GlimtError>;

    /// Current cursor position on the captured surface, if the
    /// backend can tell.
    fn cursor_position(&mut self) -> Option<(u16, u16)>;
}

/// Synthetic frames: a dim checkerboard with a bright band scanning
/// down the screen and a cursor circling the center. Every tile the
/// band crosses changes between frames; the rest stay identical, so
/// incremental updates stay small.
pub struct TestPattern {
    width: u16,
    height: u16,
    frame: u64,
}

impl TestPattern {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            frame: 0,
        }
    }
}

impl ScreenGrabber for TestPattern {
    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn capture(&mut self, into: &mut PixelBuffer) -> Result<(), GlimtError> {
        into.reset(self.width, self.height);
        let band = ((self.frame * 4) % u64::from(self.height.max(1))) as usize;
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let checker = (x / 64 + y / 64) % 2;
                let base = if checker == 0 { 0x0020_3040 } else { 0x0010_2030 };
                let value = if y == band { 0x00ff_d000 } else { base };
                into.set_pixel(x, y, value);
            }
        }
        self.frame += 1;
        Ok(())
    }

    fn cursor_position(&mut self) -> Option<(u16, u16)> {
        let angle = self.frame as f64 / 10.0;
        let cx = f64::from(self.width) / 2.0;
        let cy = f64::from(self.height) / 2.0;
        let r = cx.min(cy) / 2.0;
        let x = (cx + r * angle.cos()).clamp(0.0, f64::from(self.width.saturating_sub(1)));
        let y = (cy + r * angle.sin()).clamp(0.0, f64::from(self.height.saturating_sub(1)));
        Some((x as u16, y as u16))
    }
}
