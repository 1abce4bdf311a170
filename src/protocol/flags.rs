//! Capability, status and field flag bitsets.
//!
//! Bit positions mirror the published protocol tables and must not be
//! reordered. The effective capability set for a connection is the
//! intersection of what the client requested and what the server advertised,
//! computed once at handshake time; decoders with capability-conditional
//! fields always take that negotiated set explicitly.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident, $repr:ty, { $($(#[$fmeta:meta])* $flag:ident = $val:expr, $label:expr;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name($val); )+

            /// The empty flag set.
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Raw bit pattern.
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Check whether every bit of `other` is set in `self`.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Set the bits of `other`.
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear the bits of `other`.
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// The intersection of two flag sets.
            pub const fn intersect(self, other: Self) -> Self {
                Self(self.0 & other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl BitAndAssign for $name {
            fn bitand_assign(&mut self, rhs: Self) {
                self.0 &= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                $(
                    if self.contains(Self::$flag) {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", $label)?;
                        first = false;
                    }
                )+
                if first {
                    write!(f, "(none)")?;
                }
                Ok(())
            }
        }
    };
}

flag_set! {
    /// Client/server capability flags (32 bits).
    CapabilityFlags, u32, {
        LONG_PASSWORD = 0x0000_0001, "LONG_PASSWORD";
        FOUND_ROWS = 0x0000_0002, "FOUND_ROWS";
        LONG_FLAG = 0x0000_0004, "LONG_FLAG";
        CONNECT_WITH_DB = 0x0000_0008, "CONNECT_WITH_DB";
        NO_SCHEMA = 0x0000_0010, "NO_SCHEMA";
        COMPRESS = 0x0000_0020, "COMPRESS";
        ODBC = 0x0000_0040, "ODBC";
        LOCAL_FILES = 0x0000_0080, "LOCAL_FILES";
        IGNORE_SPACE = 0x0000_0100, "IGNORE_SPACE";
        PROTOCOL_41 = 0x0000_0200, "PROTOCOL_41";
        INTERACTIVE = 0x0000_0400, "INTERACTIVE";
        SSL = 0x0000_0800, "SSL";
        IGNORE_SIGPIPE = 0x0000_1000, "IGNORE_SIGPIPE";
        TRANSACTIONS = 0x0000_2000, "TRANSACTIONS";
        RESERVED = 0x0000_4000, "RESERVED";
        SECURE_CONNECTION = 0x0000_8000, "SECURE_CONNECTION";
        MULTI_STATEMENTS = 0x0001_0000, "MULTI_STATEMENTS";
        MULTI_RESULTS = 0x0002_0000, "MULTI_RESULTS";
        PS_MULTI_RESULTS = 0x0004_0000, "PS_MULTI_RESULTS";
        PLUGIN_AUTH = 0x0008_0000, "PLUGIN_AUTH";
        CONNECT_ATTRS = 0x0010_0000, "CONNECT_ATTRS";
        PLUGIN_AUTH_LENENC_CLIENT_DATA = 0x0020_0000, "PLUGIN_AUTH_LENENC_CLIENT_DATA";
        CAN_HANDLE_EXPIRED_PASSWORDS = 0x0040_0000, "CAN_HANDLE_EXPIRED_PASSWORDS";
        SESSION_TRACK = 0x0080_0000, "SESSION_TRACK";
        DEPRECATE_EOF = 0x0100_0000, "DEPRECATE_EOF";
    }
}

flag_set! {
    /// Per-response server status flags (16 bits).
    StatusFlags, u16, {
        IN_TRANSACTION = 0x0001, "IN_TRANSACTION";
        AUTOCOMMIT = 0x0002, "AUTOCOMMIT";
        MORE_RESULTS_EXISTS = 0x0008, "MORE_RESULTS_EXISTS";
        NO_GOOD_INDEX_USED = 0x0010, "NO_GOOD_INDEX_USED";
        NO_INDEX_USED = 0x0020, "NO_INDEX_USED";
        CURSOR_EXISTS = 0x0040, "CURSOR_EXISTS";
        LAST_ROW_SENT = 0x0080, "LAST_ROW_SENT";
        DB_DROPPED = 0x0100, "DB_DROPPED";
        NO_BACKSLASH_ESCAPES = 0x0200, "NO_BACKSLASH_ESCAPES";
        METADATA_CHANGED = 0x0400, "METADATA_CHANGED";
        QUERY_WAS_SLOW = 0x0800, "QUERY_WAS_SLOW";
        PS_OUT_PARAMS = 0x1000, "PS_OUT_PARAMS";
        IN_TRANSACTION_READONLY = 0x2000, "IN_TRANSACTION_READONLY";
        SESSION_STATE_CHANGED = 0x4000, "SESSION_STATE_CHANGED";
    }
}

flag_set! {
    /// Column definition field flags (16 bits; only the low byte carries
    /// documented bits in column-definition packets).
    FieldFlags, u16, {
        NOT_NULL = 0x0001, "NOT_NULL";
        PRIMARY_KEY = 0x0002, "PRIMARY_KEY";
        UNIQUE_KEY = 0x0004, "UNIQUE_KEY";
        MULTIPLE_KEY = 0x0008, "MULTIPLE_KEY";
        BLOB = 0x0010, "BLOB";
        UNSIGNED = 0x0020, "UNSIGNED";
        ZEROFILL = 0x0040, "ZEROFILL";
        BINARY = 0x0080, "BINARY";
        ENUM = 0x0100, "ENUM";
        AUTO_INCREMENT = 0x0200, "AUTO_INCREMENT";
        TIMESTAMP = 0x0400, "TIMESTAMP";
        SET = 0x0800, "SET";
    }
}

impl CapabilityFlags {
    /// Reassemble the capability flags from the two non-contiguous 16-bit
    /// halves of the handshake packet.
    pub const fn from_halves(lower: u16, upper: u16) -> Self {
        Self((upper as u32) << 16 | lower as u32)
    }

    /// The lower 16 bits, as laid out in the handshake packet.
    pub const fn lower_half(self) -> u16 {
        self.0 as u16
    }

    /// The upper 16 bits, as laid out in the handshake packet.
    pub const fn upper_half(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_intersection() {
        let requested = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::DEPRECATE_EOF;
        let advertised = CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::DEPRECATE_EOF
            | CapabilityFlags::PLUGIN_AUTH;

        let effective = requested.intersect(advertised);
        assert_eq!(
            effective,
            CapabilityFlags::SECURE_CONNECTION | CapabilityFlags::DEPRECATE_EOF
        );
        assert!(!effective.contains(CapabilityFlags::PROTOCOL_41));
        assert!(!effective.contains(CapabilityFlags::PLUGIN_AUTH));
    }

    #[test]
    fn test_halves_round_trip() {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::DEPRECATE_EOF
            | CapabilityFlags::PLUGIN_AUTH;
        let rebuilt = CapabilityFlags::from_halves(caps.lower_half(), caps.upper_half());
        assert_eq!(rebuilt, caps);

        // DEPRECATE_EOF lives entirely in the upper half.
        assert_eq!(CapabilityFlags::DEPRECATE_EOF.lower_half(), 0);
        assert_eq!(CapabilityFlags::DEPRECATE_EOF.upper_half(), 0x0100);
    }

    #[test]
    fn test_insert_remove() {
        let mut caps = CapabilityFlags::empty();
        caps.insert(CapabilityFlags::CONNECT_WITH_DB);
        assert!(caps.contains(CapabilityFlags::CONNECT_WITH_DB));
        caps.remove(CapabilityFlags::CONNECT_WITH_DB);
        assert_eq!(caps, CapabilityFlags::empty());
    }

    #[test]
    fn test_status_display_lists_set_bits() {
        let status = StatusFlags::AUTOCOMMIT | StatusFlags::SESSION_STATE_CHANGED;
        let rendered = status.to_string();
        assert!(rendered.contains("AUTOCOMMIT"));
        assert!(rendered.contains("SESSION_STATE_CHANGED"));
    }
}
