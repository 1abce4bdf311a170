//! Buffer utilities for reading and writing wire protocol data.
//!
//! All multi-byte integers on the wire are little-endian. Length-encoded
//! ("lenenc") integers and strings are the protocol's self-describing
//! variable-width encoding; see `read_lenenc` for the width rules.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use bytes::{BufMut, Bytes, BytesMut};

/// Outcome of decoding a length-encoded integer.
///
/// `0xfb` and `0xff` prefixes are not integers: in row data `0xfb` means
/// NULL, and `0xff` can only start an ERR packet. Both require handling at
/// the call site, never silent conversion to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lenenc {
    Int(u64),
    Null,
    ErrorMarker,
}

/// A positional reader over an immutable byte buffer.
///
/// Every read checks the remaining length first and fails with
/// `Error::BufferTooSmall` on truncated input.
pub struct ReadBuffer {
    data: Bytes,
    pos: usize,
}

impl ReadBuffer {
    /// Create a new read buffer from bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the current position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the remaining bytes in the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if the buffer has at least `n` bytes remaining.
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    #[track_caller]
    fn check(&self, needed: usize) -> Result<()> {
        if !self.has_remaining(needed) {
            return Err(Error::BufferTooSmall {
                needed,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        Ok(())
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Skip `n` bytes.
    #[track_caller]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a single byte.
    #[track_caller]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let val = self.data[self.pos];
        self.pos += 1;
        Ok(val)
    }

    /// Read a little-endian u16.
    #[track_caller]
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.check(2)?;
        let val = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(val)
    }

    /// Read a little-endian 3-byte unsigned integer.
    #[track_caller]
    pub fn read_u24_le(&mut self) -> Result<u32> {
        self.check(3)?;
        let val = u32::from_le_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            0,
        ]);
        self.pos += 3;
        Ok(val)
    }

    /// Read a little-endian u32.
    #[track_caller]
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.check(4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read a little-endian u64.
    #[track_caller]
    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.check(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read a little-endian unsigned integer of `n` bytes (n ≤ 8).
    #[track_caller]
    pub fn read_uint_le(&mut self, n: usize) -> Result<u64> {
        if n > 8 {
            return Err(Error::protocol(format!("integer width {} exceeds 8", n)));
        }
        self.check(n)?;
        let mut val: u64 = 0;
        for i in 0..n {
            val |= (self.data[self.pos + i] as u64) << (8 * i);
        }
        self.pos += n;
        Ok(val)
    }

    /// Read raw bytes.
    #[track_caller]
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.check(n)?;
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    /// Read a length-encoded integer, surfacing the NULL and error markers.
    ///
    /// Width rules: a first byte `< 0xfb` encodes itself; `0xfc` is followed
    /// by 2 bytes, `0xfd` by 3, `0xfe` by 8.
    #[track_caller]
    pub fn read_lenenc(&mut self) -> Result<Lenenc> {
        let prefix = self.read_u8()?;
        let val = match prefix {
            LENENC_NULL => return Ok(Lenenc::Null),
            LENENC_ERR => return Ok(Lenenc::ErrorMarker),
            LENENC_2_BYTE => self.read_uint_le(2)?,
            LENENC_3_BYTE => self.read_uint_le(3)?,
            LENENC_8_BYTE => self.read_uint_le(8)?,
            literal => literal as u64,
        };
        Ok(Lenenc::Int(val))
    }

    /// Read a length-encoded integer where a NULL or error marker is
    /// malformed input.
    #[track_caller]
    pub fn read_lenenc_int(&mut self) -> Result<u64> {
        match self.read_lenenc()? {
            Lenenc::Int(val) => Ok(val),
            Lenenc::Null => Err(Error::protocol("unexpected NULL marker in lenenc integer")),
            Lenenc::ErrorMarker => {
                Err(Error::protocol("unexpected error marker in lenenc integer"))
            }
        }
    }

    /// Read a length-encoded string (lenenc length prefix, then bytes).
    #[track_caller]
    pub fn read_lenenc_string(&mut self) -> Result<String> {
        let len = self.read_lenenc_int()? as usize;
        self.read_string(len)
    }

    /// Read a string of exactly `n` bytes.
    ///
    /// Uses lossy UTF-8 conversion; the protocol does not guarantee the
    /// charset of metadata strings.
    #[track_caller]
    pub fn read_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_bytes(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a NUL-terminated string, consuming the terminator.
    #[track_caller]
    pub fn read_nul_string(&mut self) -> Result<String> {
        let start = self.pos;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| start + i)
            .ok_or_else(|| Error::protocol("missing NUL terminator"))?;
        let s = String::from_utf8_lossy(&self.data[start..end]).into_owned();
        self.pos = end + 1;
        Ok(s)
    }

    /// Read the rest of the buffer as a string ("EOF-terminated": the value
    /// runs to the end of the enclosing packet, there is no terminator byte).
    pub fn read_rest_string(&mut self) -> String {
        let s = String::from_utf8_lossy(&self.data[self.pos..]).into_owned();
        self.pos = self.data.len();
        s
    }

    /// Read the rest of the buffer as raw bytes.
    pub fn read_rest(&mut self) -> Bytes {
        let bytes = self.data.slice(self.pos..);
        self.pos = self.data.len();
        bytes
    }
}

/// A buffer for writing wire protocol data.
pub struct WriteBuffer {
    data: BytesMut,
}

impl WriteBuffer {
    /// Create a new write buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new write buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current length of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the buffer contents as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable bytes.
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, val: u8) {
        self.data.put_u8(val);
    }

    /// Write a little-endian u16.
    pub fn write_u16_le(&mut self, val: u16) {
        self.data.put_u16_le(val);
    }

    /// Write a little-endian 3-byte unsigned integer.
    pub fn write_u24_le(&mut self, val: u32) {
        debug_assert!(val <= MAX_PACKET_PAYLOAD as u32);
        self.data.extend_from_slice(&val.to_le_bytes()[..3]);
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, val: u32) {
        self.data.put_u32_le(val);
    }

    /// Write a little-endian u64.
    pub fn write_u64_le(&mut self, val: u64) {
        self.data.put_u64_le(val);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Write a length-encoded integer in its minimal-width form.
    pub fn write_lenenc_int(&mut self, val: u64) {
        if val < LENENC_NULL as u64 {
            self.write_u8(val as u8);
        } else if val <= 0xffff {
            self.write_u8(LENENC_2_BYTE);
            self.write_u16_le(val as u16);
        } else if val <= 0xff_ffff {
            self.write_u8(LENENC_3_BYTE);
            self.write_u24_le(val as u32);
        } else {
            self.write_u8(LENENC_8_BYTE);
            self.write_u64_le(val);
        }
    }

    /// Write a length-encoded string.
    pub fn write_lenenc_bytes(&mut self, bytes: &[u8]) {
        self.write_lenenc_int(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Write a NUL-terminated string.
    pub fn write_nul_string(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
        self.data.put_u8(0);
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
