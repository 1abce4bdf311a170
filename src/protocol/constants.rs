//! MySQL client/server protocol constants.
//!
//! Byte values follow the published protocol documentation; positions must
//! match exactly for interoperability.

// Packet framing
pub const PACKET_HEADER_SIZE: usize = 4;
pub const MAX_PACKET_PAYLOAD: usize = 0xff_ffff; // 16,777,215

/// Value sent in the max-packet-size field of the handshake response.
pub const MAX_PACKET_SIZE: u32 = 0xff_ffff;

// Command bytes
pub const COM_SLEEP: u8 = 0x00;
pub const COM_QUIT: u8 = 0x01;
pub const COM_INIT_DB: u8 = 0x02;
pub const COM_QUERY: u8 = 0x03;
pub const COM_FIELD_LIST: u8 = 0x04;
pub const COM_PING: u8 = 0x0e;
pub const COM_STMT_PREPARE: u8 = 0x16;
pub const COM_STMT_EXECUTE: u8 = 0x17;
pub const COM_STMT_CLOSE: u8 = 0x19;
pub const COM_STMT_RESET: u8 = 0x1a;

// Response discriminants (first byte of a response payload)
pub const OK_HEADER: u8 = 0x00;
pub const EOF_HEADER: u8 = 0xfe;
pub const ERR_HEADER: u8 = 0xff;
pub const NULL_MARKER: u8 = 0xfb;

/// Minimum body length for a `0x00` first byte to be an OK packet.
pub const OK_RESPONSE_MIN_LENGTH: usize = 7;
/// A `0xfe` first byte is an EOF packet only when the body is shorter.
pub const EOF_RESPONSE_MAX_LENGTH: usize = 9;

// Length-encoded integer prefixes
pub const LENENC_NULL: u8 = 0xfb;
pub const LENENC_2_BYTE: u8 = 0xfc;
pub const LENENC_3_BYTE: u8 = 0xfd;
pub const LENENC_8_BYTE: u8 = 0xfe;
pub const LENENC_ERR: u8 = 0xff;

// Prepared-statement execute
pub const CURSOR_TYPE_NO_CURSOR: u8 = 0x00;
pub const CURSOR_TYPE_READ_ONLY: u8 = 0x01;
pub const CURSOR_TYPE_FOR_UPDATE: u8 = 0x02;
pub const CURSOR_TYPE_SCROLLABLE: u8 = 0x04;

/// Flag byte marking a bound parameter type as unsigned.
pub const UNSIGNED_TYPE_FLAG: u8 = 0x80;

/// Default port for MySQL servers.
pub const DEFAULT_PORT: u16 = 3306;
