//! Packet buffers: an opcode byte plus a payload of fixed-width integers
//! and length-prefixed strings.
//!
//! All multi-byte integers are big-endian. Strings are never
//! null-terminated; they carry their length up front:
//!
//! - `string8` : one length byte, then up to 255 bytes
//! - `string16`: a `u16` length, then up to 65535 bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ClientOpcode, FrameError};

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// One decoded packet: the opcode and its (possibly encrypted) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: u8,
    pub payload: Bytes,
}

impl Packet {
    /// Creates a packet from an opcode and payload.
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Splits a frame body sent by a client into opcode and payload.
    ///
    /// # Errors
    /// - [`FrameError::Truncated`] if the body is empty
    /// - [`FrameError::UnknownOpcode`] if the first byte is not a
    ///   [`ClientOpcode`]
    pub fn decode_client(
        mut body: Bytes,
    ) -> Result<(ClientOpcode, Bytes), FrameError> {
        if body.is_empty() {
            return Err(FrameError::Truncated {
                needed: 1,
                remaining: 0,
            });
        }
        let raw = body.get_u8();
        let opcode = ClientOpcode::try_from(raw)?;
        Ok((opcode, body))
    }

    /// Serializes into a frame body (opcode followed by payload).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload.len());
        buf.put_u8(self.opcode);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

// ---------------------------------------------------------------------------
// PacketWriter
// ---------------------------------------------------------------------------

/// Builds a payload field by field. Infallible: oversized strings are
/// truncated to what their length prefix can express.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    /// Writes a one-byte length prefix followed by the bytes.
    pub fn write_string8(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        let bytes = value.as_ref();
        let len = bytes.len().min(u8::MAX as usize);
        self.buf.put_u8(len as u8);
        self.buf.extend_from_slice(&bytes[..len]);
        self
    }

    /// Writes a two-byte length prefix followed by the bytes.
    pub fn write_string16(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        let bytes = value.as_ref();
        let len = bytes.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.extend_from_slice(&bytes[..len]);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes the payload and tags it with `opcode`.
    pub fn into_packet(self, opcode: u8) -> Packet {
        Packet::new(opcode, self.buf.freeze())
    }
}

// ---------------------------------------------------------------------------
// PacketReader
// ---------------------------------------------------------------------------

/// Reads fields off a payload in order. Every read checks the remaining
/// length first, so a short payload yields [`FrameError::Truncated`]
/// instead of a panic.
#[derive(Debug, Clone)]
pub struct PacketReader {
    buf: Bytes,
}

impl PacketReader {
    pub fn new(payload: Bytes) -> Self {
        Self { buf: payload }
    }

    fn need(&self, needed: usize) -> Result<(), FrameError> {
        if self.buf.remaining() < needed {
            return Err(FrameError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, FrameError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, FrameError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, FrameError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, FrameError> {
        self.need(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_string8(&mut self) -> Result<Bytes, FrameError> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string16(&mut self) -> Result<Bytes, FrameError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    /// Reads a `string8` and decodes it lossily as UTF-8.
    pub fn read_text8(&mut self) -> Result<String, FrameError> {
        Ok(String::from_utf8_lossy(&self.read_string8()?).into_owned())
    }

    /// Reads a `string16` and decodes it lossily as UTF-8.
    pub fn read_text16(&mut self) -> Result<String, FrameError> {
        Ok(String::from_utf8_lossy(&self.read_string16()?).into_owned())
    }

    /// Reads a `string8` holding decimal digits.
    pub fn read_decimal8<T: std::str::FromStr>(
        &mut self,
        field: &'static str,
    ) -> Result<T, FrameError> {
        let text = self.read_text8()?;
        text.trim().parse().map_err(|_| FrameError::InvalidNumber {
            field,
            value: text,
        })
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
