//! # fb — framebuffer pipeline
//!
//! Everything between "a screen was grabbed" and "bytes ready to
//! compress": pixel buffers, tile differencing, and the viewer-side
//! canvas updates are blitted into.
//!
//! ```text
//! SHARER                                        VIEWER
//! ┌──────────────────────────┐                 ┌──────────────────────┐
//! │ PixelBuffer (current)    │                 │ ZrleDecoder          │
//! │   ↓ compare_screens      │    relayed      │   ↓                  │
//! │ ScreenUpdate (rects)     │ ──────────────► │ ScreenUpdate (rects) │
//! │   ↓                      │   by server     │   ↓ apply            │
//! │ ZrleEncoder              │                 │ ViewCanvas           │
//! └──────────────────────────┘                 └──────────────────────┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module   | Purpose                                             |
//! |--------- |-----------------------------------------------------|
//! | `types`  | `PixelBuffer`, `Rect`, `Paint`, `ScreenUpdate`      |
//! | `diff`   | 64×64 tile change detection and classification      |
//! | `render` | Stride-aware canvas that decoded rects blit into    |

pub mod diff;
pub mod render;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use diff::{MAX_TILE_COLORS, TILE_SIZE, compare_screens};
pub use render::ViewCanvas;
pub use types::{Paint, PixelBuffer, Rect, ScreenUpdate};
