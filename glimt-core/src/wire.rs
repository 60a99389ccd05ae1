//! Low-level wire building blocks shared by the packet codec.
//!
//! All multi-byte integers on the wire are big-endian. Serialization
//! appends into a [`bytes::BytesMut`] through the `BufMut` trait, which
//! already speaks network byte order; this module adds the two pieces
//! the codec needs on top:
//!
//! - [`put_str8`]: the length-prefixed string form (u8 length + bytes,
//!   capping strings at 255 bytes),
//! - [`WireReader`]: an incremental cursor whose getters return `None`
//!   when the buffered bytes run out, so the codec can tell "frame not
//!   complete yet" apart from "frame malformed".

use bytes::{BufMut, BytesMut};

use crate::error::GlimtError;

/// Longest string a u8 length prefix can carry.
pub const MAX_STR8_LEN: usize = 255;

/// Append a length-prefixed string: u8 length, then the raw bytes.
///
/// Strings longer than 255 bytes do not fit the prefix and are
/// rejected rather than truncated.
pub fn put_str8(dst: &mut BytesMut, s: &str) -> Result<(), GlimtError> {
    if s.len() > MAX_STR8_LEN {
        return Err(GlimtError::StringTooLong { len: s.len() });
    }
    dst.put_u8(s.len() as u8);
    dst.put_slice(s.as_bytes());
    Ok(())
}

/// Incremental big-endian reader over a byte slice.
///
/// Every getter advances the cursor on success and returns `None` when
/// fewer bytes remain than requested. The caller decides what `None`
/// means; the packet decoder treats it as "wait for more bytes".
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes left unread.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let b = self.read_bytes(2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let b = self.read_bytes(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        let b = self.read_bytes(4)?;
        Some(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read exactly `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    /// Read a length-prefixed string payload (u8 length + bytes).
    ///
    /// Returns the raw bytes; UTF-8 validation is the caller's business
    /// so that an incomplete frame is never confused with bad text.
    pub fn read_str8(&mut self) -> Option<&'a [u8]> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }
}
