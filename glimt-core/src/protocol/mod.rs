//! # protocol — packet model and byte-exact framing
//!
//! Five packet kinds travel a glimt connection, each framed as a
//! single type byte followed by a fixed or self-describing body. All
//! multi-byte integers are big-endian; strings carry a u8 length
//! prefix.
//!
//! ```text
//! SessionJoinRequest (1)    u8 len + session name
//!                           u8 len + password
//!
//! SessionJoinResponse (2)   u8 status
//!                           [status 4/5] u8 len + client name
//!
//! ScreenshareStart (3)      u16 width | u16 height
//!
//! CursorInfo (4)            u16 x | u16 y | u8 icon
//!
//! FramebufferUpdate (5)     u8 padding (0) | u16 rect count
//!                           per rect:
//!                             u16 x | u16 y | u16 w | u16 h
//!                             i32 encoding (16 = ZRLE)
//!                             u32 len | len compressed bytes
//! ```
//!
//! Rect payloads stay opaque at this layer; the relay server forwards
//! them untouched and only the viewing endpoint runs the inflate
//! stream. Any unknown packet type, status, encoding, or sub-encoding
//! is a hard error and the connection carrying it is done.

pub mod codec;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::GlimtError;
use crate::wire::{WireReader, put_str8};

pub use codec::{MAX_FRAME_SIZE, WireCodec};

/// TCP port the relay listens on.
pub const DEFAULT_PORT: u16 = 8999;

/// The one rect encoding this protocol speaks: ZRLE tiles through a
/// persistent zlib stream.
pub const ENCODING_ZRLE: i32 = 16;

/// Upper bound for one rect's compressed payload. A full 64×64 tile
/// is 16 KiB raw; sync-flush overhead cannot quadruple it.
pub const MAX_RECT_DATA: usize = 64 * 1024;

// ── Discriminators ───────────────────────────────────────────────

/// Leading byte of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    JoinRequest = 1,
    JoinResponse = 2,
    ShareStart = 3,
    CursorInfo = 4,
    FramebufferUpdate = 5,
}

impl TryFrom<u8> for PacketType {
    type Error = GlimtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::JoinRequest),
            2 => Ok(Self::JoinResponse),
            3 => Ok(Self::ShareStart),
            4 => Ok(Self::CursorInfo),
            5 => Ok(Self::FramebufferUpdate),
            other => Err(GlimtError::UnknownVariant {
                type_name: "packet type",
                value: u64::from(other),
            }),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JoinRequest => "session-join-request",
            Self::JoinResponse => "session-join-response",
            Self::ShareStart => "screenshare-start",
            Self::CursorInfo => "cursor-info",
            Self::FramebufferUpdate => "framebuffer-update",
        };
        write!(f, "{name}")
    }
}

/// Status byte of a SessionJoinResponse.
///
/// `ClientJoined` and `ClientLeft` double as membership broadcasts to
/// the existing members of a session and carry the affected client's
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JoinStatus {
    Ok = 1,
    NotFound = 2,
    InvalidPassword = 3,
    ClientJoined = 4,
    ClientLeft = 5,
}

impl JoinStatus {
    /// Whether this status is followed by a client name on the wire.
    pub fn carries_name(self) -> bool {
        matches!(self, Self::ClientJoined | Self::ClientLeft)
    }
}

impl TryFrom<u8> for JoinStatus {
    type Error = GlimtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ok),
            2 => Ok(Self::NotFound),
            3 => Ok(Self::InvalidPassword),
            4 => Ok(Self::ClientJoined),
            5 => Ok(Self::ClientLeft),
            other => Err(GlimtError::UnknownVariant {
                type_name: "join status",
                value: u64::from(other),
            }),
        }
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::NotFound => "not-found",
            Self::InvalidPassword => "invalid-password",
            Self::ClientJoined => "client-joined",
            Self::ClientLeft => "client-left",
        };
        write!(f, "{name}")
    }
}

// ── Packets ──────────────────────────────────────────────────────

/// One framebuffer rect as it crosses the wire: geometry plus the
/// opaque compressed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// A fully decoded protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    JoinRequest {
        session: String,
        password: String,
    },
    JoinResponse {
        status: JoinStatus,
        client: Option<String>,
    },
    ShareStart {
        width: u16,
        height: u16,
    },
    CursorInfo {
        x: u16,
        y: u16,
        icon: u8,
    },
    FramebufferUpdate {
        rects: Vec<WireRect>,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::JoinRequest { .. } => PacketType::JoinRequest,
            Packet::JoinResponse { .. } => PacketType::JoinResponse,
            Packet::ShareStart { .. } => PacketType::ShareStart,
            Packet::CursorInfo { .. } => PacketType::CursorInfo,
            Packet::FramebufferUpdate { .. } => PacketType::FramebufferUpdate,
        }
    }

    /// Serialize the whole packet, type byte included, into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), GlimtError> {
        dst.put_u8(self.packet_type() as u8);
        match self {
            Packet::JoinRequest { session, password } => {
                put_str8(dst, session)?;
                put_str8(dst, password)?;
            }
            Packet::JoinResponse { status, client } => {
                dst.put_u8(*status as u8);
                if status.carries_name() {
                    put_str8(dst, client.as_deref().unwrap_or(""))?;
                }
            }
            Packet::ShareStart { width, height } => {
                dst.put_u16(*width);
                dst.put_u16(*height);
            }
            Packet::CursorInfo { x, y, icon } => {
                dst.put_u16(*x);
                dst.put_u16(*y);
                dst.put_u8(*icon);
            }
            Packet::FramebufferUpdate { rects } => {
                if rects.len() > usize::from(u16::MAX) {
                    return Err(GlimtError::ProtocolViolation(
                        "more rects than a u16 count can carry",
                    ));
                }
                dst.put_u8(0);
                dst.put_u16(rects.len() as u16);
                for rect in rects {
                    if rect.data.len() > MAX_RECT_DATA {
                        return Err(GlimtError::RectTooLarge {
                            size: rect.data.len(),
                            max: MAX_RECT_DATA,
                        });
                    }
                    dst.put_u16(rect.x);
                    dst.put_u16(rect.y);
                    dst.put_u16(rect.width);
                    dst.put_u16(rect.height);
                    dst.put_i32(ENCODING_ZRLE);
                    dst.put_u32(rect.data.len() as u32);
                    dst.put_slice(&rect.data);
                }
            }
        }
        Ok(())
    }

    /// Try to decode one packet from the front of `buf`.
    ///
    /// `Ok(None)` means the frame is not complete yet; a successful
    /// decode also reports how many bytes it consumed so the caller
    /// can advance its buffer. Malformed input is an error, and the
    /// stream carrying it offers no way to resynchronize.
    pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>, GlimtError> {
        let mut r = WireReader::new(buf);
        let Some(type_byte) = r.read_u8() else {
            return Ok(None);
        };

        let packet = match PacketType::try_from(type_byte)? {
            PacketType::JoinRequest => {
                let Some(session) = r.read_str8() else {
                    return Ok(None);
                };
                let Some(password) = r.read_str8() else {
                    return Ok(None);
                };
                Packet::JoinRequest {
                    session: String::from_utf8(session.to_vec())?,
                    password: String::from_utf8(password.to_vec())?,
                }
            }
            PacketType::JoinResponse => {
                let Some(status_byte) = r.read_u8() else {
                    return Ok(None);
                };
                let status = JoinStatus::try_from(status_byte)?;
                let client = if status.carries_name() {
                    let Some(name) = r.read_str8() else {
                        return Ok(None);
                    };
                    Some(String::from_utf8(name.to_vec())?)
                } else {
                    None
                };
                Packet::JoinResponse { status, client }
            }
            PacketType::ShareStart => {
                let Some(width) = r.read_u16() else {
                    return Ok(None);
                };
                let Some(height) = r.read_u16() else {
                    return Ok(None);
                };
                Packet::ShareStart { width, height }
            }
            PacketType::CursorInfo => {
                let Some(x) = r.read_u16() else {
                    return Ok(None);
                };
                let Some(y) = r.read_u16() else {
                    return Ok(None);
                };
                let Some(icon) = r.read_u8() else {
                    return Ok(None);
                };
                Packet::CursorInfo { x, y, icon }
            }
            PacketType::FramebufferUpdate => {
                let Some(padding) = r.read_u8() else {
                    return Ok(None);
                };
                if padding != 0 {
                    return Err(GlimtError::ProtocolViolation(
                        "nonzero padding in framebuffer update",
                    ));
                }
                let Some(count) = r.read_u16() else {
                    return Ok(None);
                };
                let mut rects = Vec::with_capacity(usize::from(count).min(1024));
                for _ in 0..count {
                    let Some(x) = r.read_u16() else {
                        return Ok(None);
                    };
                    let Some(y) = r.read_u16() else {
                        return Ok(None);
                    };
                    let Some(width) = r.read_u16() else {
                        return Ok(None);
                    };
                    let Some(height) = r.read_u16() else {
                        return Ok(None);
                    };
                    let Some(encoding) = r.read_i32() else {
                        return Ok(None);
                    };
                    if encoding != ENCODING_ZRLE {
                        return Err(GlimtError::UnknownEncoding(encoding));
                    }
                    let Some(len) = r.read_u32() else {
                        return Ok(None);
                    };
                    let len = len as usize;
                    if len > MAX_RECT_DATA {
                        return Err(GlimtError::RectTooLarge {
                            size: len,
                            max: MAX_RECT_DATA,
                        });
                    }
                    let Some(data) = r.read_bytes(len) else {
                        return Ok(None);
                    };
                    rects.push(WireRect {
                        x,
                        y,
                        width,
                        height,
                        data: Bytes::copy_from_slice(data),
                    });
                }
                Packet::FramebufferUpdate { rects }
            }
        };

        Ok(Some((packet, r.consumed())))
    }
}
