//! Length-prefixed framing for the game protocol.
//!
//! Every packet travels as:
//!
//! ```text
//! ┌──────┬──────────────┬────────┬─────────────────┐
//! │ 0xAA │ len (u16 BE) │ opcode │ payload ...     │
//! └──────┴──────────────┴────────┴─────────────────┘
//!          └───────────── len bytes ─────────────┘
//! ```
//!
//! The codec only knows about the marker and the length. What the
//! opcode means, and whether the payload is encrypted, is the protocol
//! crate's business.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::TransportError;

/// First byte of every frame.
pub const FRAME_MARKER: u8 = 0xAA;

/// Marker byte plus the 16-bit length.
pub const FRAME_HEADER_LEN: usize = 3;

/// Largest body a frame can carry.
pub const MAX_FRAME_BODY: usize = u16::MAX as usize;

/// A [`Decoder`]/[`Encoder`] pair for `0xAA`-framed packets.
///
/// Decoding yields the frame body (opcode + payload). Encoding takes a
/// body and prepends the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = TransportError;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        if src[0] != FRAME_MARKER {
            return Err(TransportError::BadMarker(src[0]));
        }

        let len = u16::from_be_bytes([src[1], src[2]]) as usize;
        if len == 0 {
            return Err(TransportError::EmptyFrame);
        }
        if src.len() < FRAME_HEADER_LEN + len {
            // Not enough bytes yet. Reserve so the next read fills the
            // whole frame in one go.
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(
        &mut self,
        body: Bytes,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        if body.is_empty() {
            return Err(TransportError::EmptyFrame);
        }
        if body.len() > MAX_FRAME_BODY {
            return Err(TransportError::FrameTooLarge(body.len()));
        }

        dst.reserve(FRAME_HEADER_LEN + body.len());
        dst.put_u8(FRAME_MARKER);
        dst.put_u16(body.len() as u16);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_partial_header_returns_none() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0xAA, 0x00][..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2, "partial input must not be consumed");
    }

    #[test]
    fn test_decode_partial_body_waits_for_more() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0xAA, 0x00, 0x03, 0x45, 0x00][..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x01]);
        let body = codec.decode(&mut buf).unwrap().expect("full frame");
        assert_eq!(&body[..], &[0x45, 0x00, 0x01]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_two_frames_back_to_back() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(
            &[0xAA, 0x00, 0x01, 0x45, 0xAA, 0x00, 0x02, 0x57, 0x01][..],
        );

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(&first[..], &[0x45]);
        assert_eq!(&second[..], &[0x57, 0x01]);
    }

    #[test]
    fn test_decode_bad_marker_is_error() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0x10, 0x00, 0x01, 0x45][..]);

        let result = codec.decode(&mut buf);

        assert!(matches!(result, Err(TransportError::BadMarker(0x10))));
    }

    #[test]
    fn test_decode_zero_length_is_error() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0xAA, 0x00, 0x00][..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::EmptyFrame)
        ));
    }

    #[test]
    fn test_encode_writes_header() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();

        codec
            .encode(Bytes::from_static(&[0x49, 0x00]), &mut dst)
            .unwrap();

        assert_eq!(&dst[..], &[0xAA, 0x00, 0x02, 0x49, 0x00]);
    }

    #[test]
    fn test_encode_oversized_body_is_rejected() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();
        let body = Bytes::from(vec![0u8; MAX_FRAME_BODY + 1]);

        let result = codec.encode(body, &mut dst);

        assert!(matches!(result, Err(TransportError::FrameTooLarge(_))));
        assert!(dst.is_empty());
    }
}
