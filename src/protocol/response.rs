//! Generic response packets: OK / ERR / EOF and first-byte classification.
//!
//! Several fields here are conditional on the negotiated capability set, so
//! every parser takes the connection's effective capabilities explicitly.
//! Passing a default or stale set where the negotiated one is required is a
//! bug, not a fallback.

use crate::error::{Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::constants::*;
use crate::protocol::flags::{CapabilityFlags, StatusFlags};
use bytes::Bytes;

/// Classification of a response by its first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ok,
    Eof,
    Err,
    /// Anything else: the first byte is the column count of a forthcoming
    /// result set.
    ResultSetHeader,
}

/// Classify a response body.
///
/// A `0x00` first byte is an OK packet only when the body is at least 7
/// bytes; a `0xfe` first byte is a (deprecated) EOF packet only when the
/// body is shorter than 9 bytes.
pub fn classify(body: &[u8]) -> ResponseKind {
    match body.first() {
        Some(&OK_HEADER) if body.len() >= OK_RESPONSE_MIN_LENGTH => ResponseKind::Ok,
        Some(&EOF_HEADER) if body.len() < EOF_RESPONSE_MAX_LENGTH => ResponseKind::Eof,
        Some(&ERR_HEADER) => ResponseKind::Err,
        _ => ResponseKind::ResultSetHeader,
    }
}

/// A decoded OK packet.
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: StatusFlags,
    pub warnings: u16,
    /// Human-readable info; empty for most statements.
    pub info: String,
    /// Session-state payload, present only with SESSION_TRACK when the
    /// server flags a state change.
    pub session_state: Option<String>,
}

impl OkPacket {
    /// Parse an OK packet body (including the leading header byte).
    pub fn parse(body: Bytes, capabilities: CapabilityFlags) -> Result<Self> {
        let mut buf = ReadBuffer::new(body);
        buf.read_u8()?; // 0x00 header (or 0xfe for a deprecate-EOF terminator)

        let affected_rows = buf.read_lenenc_int()?;
        let last_insert_id = buf.read_lenenc_int()?;

        let (status, warnings) = if capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            let status = StatusFlags(buf.read_u16_le()?);
            let warnings = buf.read_u16_le()?;
            (status, warnings)
        } else if capabilities.contains(CapabilityFlags::TRANSACTIONS) {
            (StatusFlags(buf.read_u16_le()?), 0)
        } else {
            (StatusFlags::empty(), 0)
        };

        let (info, session_state) = if capabilities.contains(CapabilityFlags::SESSION_TRACK) {
            let info = if buf.has_remaining(1) {
                buf.read_lenenc_string()?
            } else {
                String::new()
            };
            let session_state = if status.contains(StatusFlags::SESSION_STATE_CHANGED)
                && buf.has_remaining(1)
            {
                Some(buf.read_lenenc_string()?)
            } else {
                None
            };
            (info, session_state)
        } else {
            (buf.read_rest_string(), None)
        };

        Ok(Self {
            affected_rows,
            last_insert_id,
            status,
            warnings,
            info,
            session_state,
        })
    }
}

/// A decoded (deprecated) EOF packet.
#[derive(Debug, Clone, Default)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: StatusFlags,
}

impl EofPacket {
    /// Parse an EOF packet body (including the leading 0xfe byte).
    pub fn parse(body: Bytes, capabilities: CapabilityFlags) -> Result<Self> {
        let mut buf = ReadBuffer::new(body);
        buf.read_u8()?; // 0xfe header
        if capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            let warnings = buf.read_u16_le()?;
            let status = StatusFlags(buf.read_u16_le()?);
            Ok(Self { warnings, status })
        } else {
            Ok(Self::default())
        }
    }
}

/// Parse an ERR packet body (including the leading 0xff byte) into the
/// server error it carries.
pub fn parse_err(body: Bytes, capabilities: CapabilityFlags) -> Error {
    match parse_err_inner(body, capabilities) {
        Ok(err) => err,
        Err(err) => err,
    }
}

fn parse_err_inner(body: Bytes, capabilities: CapabilityFlags) -> Result<Error> {
    let mut buf = ReadBuffer::new(body);
    buf.read_u8()?; // 0xff header
    let code = buf.read_u16_le()?;
    let (marker, state) = if capabilities.contains(CapabilityFlags::PROTOCOL_41) {
        (buf.read_string(1)?, buf.read_string(5)?)
    } else {
        (String::new(), String::new())
    };
    let message = buf.read_rest_string();
    Ok(Error::Server {
        code,
        marker,
        state,
        message,
    })
}
