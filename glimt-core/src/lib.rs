//! # glimt-core
//!
//! Core protocol library for the glimt screen-sharing relay.
//!
//! This crate contains:
//! - **Protocol types**: `Packet`, `PacketType`, `JoinStatus`, `WireRect`
//! - **Codec**: `WireCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `Connection` plus split read/write halves
//! - **Framebuffer**: `PixelBuffer`, tile differencing, `ViewCanvas`
//! - **ZRLE**: per-connection persistent zlib compression of rect
//!   payloads
//! - **Error**: `GlimtError` — typed, `thiserror`-based error
//!   hierarchy
//!
//! The relay server never inflates rect payloads; only the sharing
//! and viewing endpoints hold ZRLE stream state.

pub mod error;
pub mod fb;
pub mod net;
pub mod protocol;
pub mod wire;
pub mod zrle;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::GlimtError;
pub use fb::{
    MAX_TILE_COLORS, Paint, PixelBuffer, Rect, ScreenUpdate, TILE_SIZE, ViewCanvas,
    compare_screens,
};
pub use net::{Connection, ConnectionInfo, ConnectionReader, ConnectionWriter, resolve_addr};
pub use protocol::{
    DEFAULT_PORT, ENCODING_ZRLE, JoinStatus, MAX_FRAME_SIZE, MAX_RECT_DATA, Packet, PacketType,
    WireCodec, WireRect,
};
pub use zrle::{ZrleDecoder, ZrleEncoder};
