//! Initial handshake parsing and handshake-response serialization.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::auth::scramble_password;
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::constants::MAX_PACKET_SIZE;
use crate::protocol::flags::{CapabilityFlags, StatusFlags};
use bytes::Bytes;

/// The server's initial greeting.
///
/// Created once per connection from the first packet received after the
/// transport opens; immutable afterward.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Protocol version (10 for every server this client supports).
    pub protocol_version: u8,
    /// Human-readable server version string.
    pub server_version: String,
    /// Server-assigned connection id.
    pub connection_id: u32,
    /// Auth-plugin challenge ("auth cipher" / salt), both parts joined.
    pub auth_data: Vec<u8>,
    /// Capabilities advertised by the server, reassembled from the two
    /// non-contiguous 16-bit halves of the packet.
    pub capabilities: CapabilityFlags,
    /// Default character set byte.
    pub character_set: u8,
    /// Server status flags.
    pub status: StatusFlags,
    /// Authentication plugin name; empty when PLUGIN_AUTH is not advertised.
    pub auth_plugin_name: String,
}

impl Handshake {
    /// Parse the handshake packet body.
    pub fn parse(body: Bytes) -> Result<Self> {
        Self::parse_inner(body).map_err(|e| Error::MalformedHandshake {
            message: e.to_string(),
        })
    }

    fn parse_inner(body: Bytes) -> Result<Self> {
        let mut buf = ReadBuffer::new(body);

        let protocol_version = buf.read_u8()?;
        let server_version = buf.read_nul_string()?;
        let connection_id = buf.read_u32_le()?;

        let mut auth_data = buf.read_bytes(8)?.to_vec();
        buf.skip(1)?; // filler

        let lower = buf.read_u16_le()?;
        let character_set = buf.read_u8()?;
        let status = StatusFlags(buf.read_u16_le()?);
        let upper = buf.read_u16_le()?;
        let capabilities = CapabilityFlags::from_halves(lower, upper);

        let auth_data_len = buf.read_u8()? as usize;
        buf.skip(10)?; // reserved

        if capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            // Second salt fragment; its trailing NUL is not part of the salt.
            let part2_len = auth_data_len.saturating_sub(9).max(13);
            let part2 = buf.read_bytes(part2_len)?;
            let trimmed = match part2.last() {
                Some(0) => &part2[..part2.len() - 1],
                _ => &part2[..],
            };
            auth_data.extend_from_slice(trimmed);
        }

        let auth_plugin_name = if capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            // Some servers omit the terminator on the plugin name.
            buf.read_nul_string().unwrap_or_else(|_| buf.read_rest_string())
        } else {
            String::new()
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_data,
            capabilities,
            character_set,
            status,
            auth_plugin_name,
        })
    }
}

/// Serialize the handshake-response packet body.
///
/// `effective` is the negotiated capability set (client-requested ∩
/// server-advertised); it decides the auth-response framing and the
/// presence of the trailing schema and plugin-name fields. The four
/// capability bytes on the wire carry the client's *requested* set.
pub fn build_handshake_response(
    handshake: &Handshake,
    config: &Config,
    effective: CapabilityFlags,
) -> Bytes {
    let mut buf = WriteBuffer::with_capacity(128);

    buf.write_u32_le(config.requested_capabilities().bits());
    buf.write_u32_le(MAX_PACKET_SIZE);
    buf.write_u8(handshake.character_set);
    buf.write_zeros(23);
    buf.write_nul_string(config.username.as_deref().unwrap_or(""));

    let auth_response: Vec<u8> = match config.password.as_deref() {
        Some(password) if !password.is_empty() => {
            scramble_password(password, &handshake.auth_data).to_vec()
        }
        _ => Vec::new(),
    };
    if effective.contains(CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA) {
        buf.write_lenenc_bytes(&auth_response);
    } else if effective.contains(CapabilityFlags::SECURE_CONNECTION) {
        buf.write_u8(auth_response.len() as u8);
        buf.write_bytes(&auth_response);
    } else {
        buf.write_bytes(&auth_response);
        buf.write_u8(0);
    }

    if effective.contains(CapabilityFlags::CONNECT_WITH_DB) {
        if let Some(database) = &config.database {
            buf.write_nul_string(database);
        }
    }
    if effective.contains(CapabilityFlags::PLUGIN_AUTH) {
        buf.write_nul_string(&handshake.auth_plugin_name);
    }

    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Handshake body for protocol version 10, server "8.0.0-dmr",
    /// connection id 57, with PROTOCOL_41 and SECURE_CONNECTION advertised.
    fn sample_handshake_body() -> Bytes {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::PLUGIN_AUTH;
        let mut buf = WriteBuffer::new();
        buf.write_u8(10);
        buf.write_nul_string("8.0.0-dmr");
        buf.write_u32_le(57);
        buf.write_bytes(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        buf.write_u8(0); // filler
        buf.write_u16_le(caps.lower_half());
        buf.write_u8(0x21); // utf8_general_ci
        buf.write_u16_le(StatusFlags::AUTOCOMMIT.bits());
        buf.write_u16_le(caps.upper_half());
        buf.write_u8(21); // auth-plugin-data length
        buf.write_zeros(10);
        // Salt part 2: 12 bytes plus the trailing NUL.
        buf.write_bytes(&[
            0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14,
        ]);
        buf.write_u8(0);
        buf.write_nul_string("mysql_native_password");
        buf.freeze()
    }

    #[test]
    fn test_parse_handshake() {
        let handshake = Handshake::parse(sample_handshake_body()).unwrap();
        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "8.0.0-dmr");
        assert_eq!(handshake.connection_id, 57);
        assert_eq!(handshake.auth_data.len(), 20);
        assert_eq!(handshake.auth_data[..4], [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(handshake.auth_data[19], 0x14);
        assert!(handshake
            .capabilities
            .contains(CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION));
        assert_eq!(handshake.status, StatusFlags::AUTOCOMMIT);
        assert_eq!(handshake.auth_plugin_name, "mysql_native_password");
    }

    #[test]
    fn test_parse_truncated_handshake_is_malformed() {
        let body = sample_handshake_body();
        let truncated = body.slice(..20);
        assert!(matches!(
            Handshake::parse(truncated),
            Err(Error::MalformedHandshake { .. })
        ));
    }

    #[test]
    fn test_response_uses_length_prefixed_auth_with_secure_connection() {
        let handshake = Handshake::parse(sample_handshake_body()).unwrap();
        let config = Config::new("localhost").with_credentials("snacker", "snack");
        let effective = config
            .requested_capabilities()
            .intersect(handshake.capabilities);

        let body = build_handshake_response(&handshake, &config, effective);
        let mut buf = ReadBuffer::new(body);

        assert_eq!(
            buf.read_u32_le().unwrap(),
            config.requested_capabilities().bits()
        );
        assert_eq!(buf.read_u32_le().unwrap(), MAX_PACKET_SIZE);
        assert_eq!(buf.read_u8().unwrap(), 0x21);
        buf.skip(23).unwrap();
        assert_eq!(buf.read_nul_string().unwrap(), "snacker");

        // SECURE_CONNECTION negotiated: single length byte, not NUL-terminated.
        let auth_len = buf.read_u8().unwrap();
        assert_eq!(auth_len, 20);
        let auth = buf.read_bytes(20).unwrap();
        assert_eq!(
            &auth[..],
            &scramble_password("snack", &handshake.auth_data)[..]
        );
        // PLUGIN_AUTH was not requested by the client, so nothing follows.
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_response_empty_password_sends_empty_auth() {
        let handshake = Handshake::parse(sample_handshake_body()).unwrap();
        let config = Config::new("localhost").with_credentials("anon", "");
        let effective = config
            .requested_capabilities()
            .intersect(handshake.capabilities);

        let body = build_handshake_response(&handshake, &config, effective);
        let mut buf = ReadBuffer::new(body);
        buf.skip(4 + 4 + 1 + 23).unwrap();
        buf.read_nul_string().unwrap();
        assert_eq!(buf.read_u8().unwrap(), 0);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_response_includes_database_when_negotiated() {
        let mut handshake = Handshake::parse(sample_handshake_body()).unwrap();
        handshake.capabilities.insert(CapabilityFlags::CONNECT_WITH_DB);
        let config = Config::new("localhost")
            .with_credentials("snacker", "snack")
            .with_database("pantry");
        let effective = config
            .requested_capabilities()
            .intersect(handshake.capabilities);

        let body = build_handshake_response(&handshake, &config, effective);
        let mut buf = ReadBuffer::new(body);
        buf.skip(4 + 4 + 1 + 23).unwrap();
        buf.read_nul_string().unwrap();
        let auth_len = buf.read_u8().unwrap() as usize;
        buf.skip(auth_len).unwrap();
        assert_eq!(buf.read_nul_string().unwrap(), "pantry");
    }
}
