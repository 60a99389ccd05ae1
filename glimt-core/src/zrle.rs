//! ZRLE-style rect compression over persistent zlib streams.
//!
//! Each connection direction owns one stream for its whole lifetime:
//! the deflate dictionary carries information from one screen update
//! into the next, so repeated content costs almost nothing after the
//! first frame. Every rect is flushed with a zlib sync flush, making
//! its bytes immediately decodable by the peer while the stream stays
//! open. The receiving side mirrors this with a persistent inflate
//! stream; bytes from a mid-stream join are undecodable by design.
//!
//! Plaintext layout fed through the stream, per rect:
//!
//! ```text
//! +--------------+----------------------------------------+
//! | sub-encoding |  payload                               |
//! |  u8          |  Solid: r,g,b (3 bytes)                |
//! |              |  Raw:   width×height LE u32 pixels     |
//! +--------------+----------------------------------------+
//! ```
//!
//! Sub-encodings 2..=255 are reserved for palette variants and fail
//! closed on decode.

use bytes::{BufMut, Bytes, BytesMut};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::GlimtError;
use crate::fb::TILE_SIZE;
use crate::fb::types::{Paint, Rect};

/// Raw pixel rows, no prediction.
pub const SUB_ENCODING_RAW: u8 = 0;
/// Single 24-bit color for the whole rect.
pub const SUB_ENCODING_SOLID: u8 = 1;

/// Output window granularity for the stream loops.
const ZLIB_CHUNK: usize = 16384;

/// Compressing half of a connection's context pair.
pub struct ZrleEncoder {
    stream: Compress,
}

impl ZrleEncoder {
    /// Fresh deflate stream at the default level with a zlib header.
    pub fn new() -> Self {
        Self {
            stream: Compress::new(Compression::default(), true),
        }
    }

    /// Serialize and compress one rect.
    ///
    /// The output is a self-contained sync-flushed segment; the stream
    /// state persists into the next call.
    pub fn encode_rect(&mut self, rect: &Rect) -> Result<Bytes, GlimtError> {
        let mut plain = BytesMut::with_capacity(16);
        match &rect.paint {
            Paint::Solid { r, g, b } => {
                plain.put_u8(SUB_ENCODING_SOLID);
                plain.put_u8(*r);
                plain.put_u8(*g);
                plain.put_u8(*b);
            }
            Paint::Raw(pixels) => {
                let expected = rect.area();
                if pixels.len() != expected {
                    return Err(GlimtError::InvalidPayloadLength {
                        expected: expected * 4,
                        actual: pixels.len() * 4,
                    });
                }
                plain.reserve(1 + pixels.len() * 4);
                plain.put_u8(SUB_ENCODING_RAW);
                for &pixel in pixels {
                    plain.put_u32_le(pixel);
                }
            }
        }
        let compressed = self.deflate_sync(&plain)?;
        Ok(Bytes::from(compressed))
    }

    /// Run the deflate loop: feed everything, sync-flush, and grow the
    /// output in chunks while the stream keeps filling the window.
    fn deflate_sync(&mut self, input: &[u8]) -> Result<Vec<u8>, GlimtError> {
        let mut out = Vec::with_capacity(ZLIB_CHUNK);
        let mut consumed = 0;
        loop {
            out.reserve(ZLIB_CHUNK);
            let window = out.capacity();
            let before_in = self.stream.total_in();
            let status = self
                .stream
                .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)?;
            consumed += (self.stream.total_in() - before_in) as usize;

            let window_full = out.len() == window;
            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => {
                    // Done once all input is in and the flush fit.
                    if !window_full
                        && (consumed == input.len() || matches!(status, Status::BufError))
                    {
                        return Ok(out);
                    }
                }
            }
        }
    }
}

/// Decompressing half of a connection's context pair.
pub struct ZrleDecoder {
    stream: Decompress,
}

impl ZrleDecoder {
    /// Fresh inflate stream expecting a zlib header.
    pub fn new() -> Self {
        Self {
            stream: Decompress::new(true),
        }
    }

    /// Decompress one rect's bytes and rebuild its paint.
    ///
    /// `x, y, width, height` come from the wire rect header; the
    /// dimensions bound how much plaintext the stream may produce.
    pub fn decode_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<Rect, GlimtError> {
        if width == 0
            || height == 0
            || width as usize > TILE_SIZE
            || height as usize > TILE_SIZE
        {
            return Err(GlimtError::ProtocolViolation(
                "rect dimensions exceed tile bounds",
            ));
        }
        if data.is_empty() {
            return Err(GlimtError::ProtocolViolation("empty rect payload"));
        }

        let raw_len = width as usize * height as usize * 4;
        let plain = self.inflate(data, 1 + raw_len)?;
        let Some(&tag) = plain.first() else {
            return Err(GlimtError::ProtocolViolation(
                "rect payload produced no plaintext",
            ));
        };

        let paint = match tag {
            SUB_ENCODING_SOLID => {
                if plain.len() != 4 {
                    return Err(GlimtError::InvalidPayloadLength {
                        expected: 4,
                        actual: plain.len(),
                    });
                }
                Paint::Solid {
                    r: plain[1],
                    g: plain[2],
                    b: plain[3],
                }
            }
            SUB_ENCODING_RAW => {
                if plain.len() != 1 + raw_len {
                    return Err(GlimtError::InvalidPayloadLength {
                        expected: 1 + raw_len,
                        actual: plain.len(),
                    });
                }
                let mut pixels = Vec::with_capacity(raw_len / 4);
                for chunk in plain[1..].chunks_exact(4) {
                    pixels.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
                }
                Paint::Raw(pixels)
            }
            other => {
                return Err(GlimtError::UnknownVariant {
                    type_name: "sub-encoding",
                    value: u64::from(other),
                });
            }
        };

        Ok(Rect {
            x,
            y,
            width,
            height,
            paint,
        })
    }

    /// Run the inflate loop, capped at `max_out` plaintext bytes so a
    /// hostile stream cannot balloon memory.
    fn inflate(&mut self, input: &[u8], max_out: usize) -> Result<Vec<u8>, GlimtError> {
        let mut out = Vec::with_capacity(ZLIB_CHUNK);
        let mut consumed = 0;
        loop {
            out.reserve(ZLIB_CHUNK);
            let window = out.capacity();
            let before_in = self.stream.total_in();
            let status =
                self.stream
                    .decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)?;
            consumed += (self.stream.total_in() - before_in) as usize;

            if out.len() > max_out {
                return Err(GlimtError::ProtocolViolation(
                    "inflated rect exceeds tile bounds",
                ));
            }

            let window_full = out.len() == window;
            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => {
                    if !window_full
                        && (consumed == input.len() || matches!(status, Status::BufError))
                    {
                        return Ok(out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_rect(x: u16, y: u16, width: u16, height: u16) -> Rect {
        let pixels = (0..u32::from(width) * u32::from(height))
            .map(|i| i.wrapping_mul(0x01000193))
            .collect();
        Rect {
            x,
            y,
            width,
            height,
            paint: Paint::Raw(pixels),
        }
    }

    fn solid_rect(x: u16, y: u16, r: u8, g: u8, b: u8) -> Rect {
        Rect {
            x,
            y,
            width: 64,
            height: 64,
            paint: Paint::Solid { r, g, b },
        }
    }

    #[test]
    fn solid_round_trip() {
        let mut enc = ZrleEncoder::new();
        let mut dec = ZrleDecoder::new();
        let rect = solid_rect(64, 128, 0x10, 0x20, 0x30);

        let bytes = enc.encode_rect(&rect).unwrap();
        let back = dec.decode_rect(64, 128, 64, 64, &bytes).unwrap();
        assert_eq!(back, rect);
    }

    #[test]
    fn raw_round_trip() {
        let mut enc = ZrleEncoder::new();
        let mut dec = ZrleDecoder::new();
        let rect = raw_rect(0, 0, 64, 64);

        let bytes = enc.encode_rect(&rect).unwrap();
        let back = dec.decode_rect(0, 0, 64, 64, &bytes).unwrap();
        assert_eq!(back, rect);
    }

    #[test]
    fn clipped_rect_round_trip() {
        let mut enc = ZrleEncoder::new();
        let mut dec = ZrleDecoder::new();
        let rect = raw_rect(64, 64, 6, 6);

        let bytes = enc.encode_rect(&rect).unwrap();
        let back = dec.decode_rect(64, 64, 6, 6, &bytes).unwrap();
        assert_eq!(back, rect);
    }

    #[test]
    fn streams_survive_many_rects() {
        // The whole point of the persistent pair: one context each
        // side, many rects, in order.
        let mut enc = ZrleEncoder::new();
        let mut dec = ZrleDecoder::new();

        let rects = vec![
            raw_rect(0, 0, 64, 64),
            solid_rect(64, 0, 1, 2, 3),
            raw_rect(0, 64, 64, 64),
            raw_rect(0, 0, 64, 64),
            solid_rect(64, 64, 250, 251, 252),
            raw_rect(64, 0, 6, 64),
        ];

        for rect in &rects {
            let bytes = enc.encode_rect(rect).unwrap();
            let back = dec
                .decode_rect(rect.x, rect.y, rect.width, rect.height, &bytes)
                .unwrap();
            assert_eq!(&back, rect);
        }
    }

    #[test]
    fn dictionary_reuse_shrinks_repeats() {
        let mut enc = ZrleEncoder::new();
        let rect = raw_rect(0, 0, 64, 64);

        let first = enc.encode_rect(&rect).unwrap();
        let second = enc.encode_rect(&rect).unwrap();
        assert!(
            second.len() < first.len(),
            "repeated tile should compress smaller ({} vs {})",
            second.len(),
            first.len()
        );
    }

    #[test]
    fn mismatched_raw_payload_is_rejected() {
        let mut enc = ZrleEncoder::new();
        let rect = Rect {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
            paint: Paint::Raw(vec![0; 10]),
        };
        assert!(matches!(
            enc.encode_rect(&rect),
            Err(GlimtError::InvalidPayloadLength { .. })
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mut dec = ZrleDecoder::new();
        let err = dec.decode_rect(0, 0, 65, 64, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, GlimtError::ProtocolViolation(_)));

        let err = dec.decode_rect(0, 0, 0, 64, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, GlimtError::ProtocolViolation(_)));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let mut dec = ZrleDecoder::new();
        assert!(dec.decode_rect(0, 0, 8, 8, &[]).is_err());
    }

    #[test]
    fn unknown_sub_encoding_fails_closed() {
        // Hand-roll a stream carrying tag 2 (reserved palette range).
        let mut stream = Compress::new(Compression::default(), true);
        let mut data = Vec::with_capacity(64);
        stream
            .compress_vec(&[2u8, 0, 0, 0], &mut data, FlushCompress::Sync)
            .unwrap();

        let mut dec = ZrleDecoder::new();
        let err = dec.decode_rect(0, 0, 1, 1, &data).unwrap_err();
        assert!(matches!(
            err,
            GlimtError::UnknownVariant {
                type_name: "sub-encoding",
                value: 2
            }
        ));
    }

    #[test]
    fn truncated_stream_does_not_panic() {
        let mut enc = ZrleEncoder::new();
        let mut dec = ZrleDecoder::new();
        let bytes = enc.encode_rect(&raw_rect(0, 0, 64, 64)).unwrap();

        // Half a sync-flushed segment inflates to a short plaintext,
        // which must surface as a length error, not a panic.
        let result = dec.decode_rect(0, 0, 64, 64, &bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }
}
