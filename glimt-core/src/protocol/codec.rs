//! Frame codec bridging [`Packet`] to a tokio stream.
//!
//! Packets have no outer length prefix, so the decoder re-parses the
//! buffered bytes on every read, throwing away any attempt that runs
//! out mid-frame and trying again once more arrive. The buffer is
//! bounded by [`MAX_FRAME_SIZE`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::GlimtError;
use crate::protocol::Packet;

/// Ceiling for one buffered frame. A worst-case full-screen update of
/// a 4K display stays far below this.
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug)]
pub struct WireCodec;

impl Decoder for WireCodec {
    type Item = Packet;
    type Error = GlimtError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, GlimtError> {
        match Packet::decode(src)? {
            Some((packet, consumed)) => {
                src.advance(consumed);
                Ok(Some(packet))
            }
            None => {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(GlimtError::FrameTooLarge {
                        size: src.len(),
                        max: MAX_FRAME_SIZE,
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Packet> for WireCodec {
    type Error = GlimtError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), GlimtError> {
        item.encode(dst)
    }
}
