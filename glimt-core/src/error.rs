//! Domain-specific error types for the glimt protocol.
//!
//! All fallible operations return `Result<T, GlimtError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the glimt protocol.
#[derive(Debug, Error)]
pub enum GlimtError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A framebuffer rect carried an encoding-type this build does not speak.
    #[error("unsupported rect encoding: {0}")]
    UnknownEncoding(i32),

    /// A packet violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Packet Errors ────────────────────────────────────────────
    /// A length-prefixed string exceeds the one-byte length field.
    #[error("string too long for wire format: {len} bytes (max 255)")]
    StringTooLong { len: usize },

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A single rect's compressed payload exceeded the codec limit.
    #[error("rect payload too large: {size} bytes (max {max})")]
    RectTooLarge { size: usize, max: usize },

    /// A decoded payload is shorter or longer than its rect geometry implies.
    #[error("invalid payload length: expected {expected}, got {actual}")]
    InvalidPayloadLength { expected: usize, actual: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,

    // ── Compression Errors ───────────────────────────────────────
    /// The deflate stream rejected input or corrupted state.
    #[error("compress error: {0}")]
    Compress(String),

    /// The inflate stream could not decode the peer's bytes.
    #[error("decompress error: {0}")]
    Decompress(String),

    // ── Serialization Errors ─────────────────────────────────────
    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Application Errors ───────────────────────────────────────
    /// The capture backend failed to produce a frame.
    #[error("capture error: {0}")]
    Capture(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for GlimtError {
    fn from(s: String) -> Self {
        GlimtError::Other(s)
    }
}

impl From<&str> for GlimtError {
    fn from(s: &str) -> Self {
        GlimtError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for GlimtError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        GlimtError::ChannelClosed
    }
}

impl From<flate2::CompressError> for GlimtError {
    fn from(e: flate2::CompressError) -> Self {
        GlimtError::Compress(e.to_string())
    }
}

impl From<flate2::DecompressError> for GlimtError {
    fn from(e: flate2::DecompressError) -> Self {
        GlimtError::Decompress(e.to_string())
    }
}
