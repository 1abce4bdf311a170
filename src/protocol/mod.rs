//! Wire-protocol building blocks: framing, flags, codecs and packet types.

pub mod auth;
pub mod binary;
pub mod buffer;
pub mod constants;
pub mod flags;
pub mod handshake;
pub mod packet;
pub mod response;
pub mod types;

pub use flags::{CapabilityFlags, FieldFlags, StatusFlags};
pub use types::{BindValue, Column, ColumnInfo, ColumnType, ResultSet, Row};
