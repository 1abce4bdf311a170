//! Client configuration.

use crate::protocol::constants::DEFAULT_PORT;
use crate::protocol::flags::CapabilityFlags;

/// Connection configuration supplied by the caller.
///
/// No file, CLI or environment loading happens here; construct it in
/// process and hand it to [`crate::Connection::connect`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Default schema to select on connect, if any.
    pub database: Option<String>,
    /// Username; the protocol allows anonymous users.
    pub username: Option<String>,
    /// Password; empty/absent sends an empty auth response.
    pub password: Option<String>,
    /// Capabilities requested from the server.
    pub capabilities: CapabilityFlags,
}

impl Config {
    /// Create a configuration with default port and capabilities.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: None,
            username: None,
            password: None,
            capabilities: Self::default_capabilities(),
        }
    }

    /// The default capability set requested by this client.
    pub fn default_capabilities() -> CapabilityFlags {
        CapabilityFlags::LONG_PASSWORD
            | CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::TRANSACTIONS
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::DEPRECATE_EOF
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the default schema.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Replace the requested capability set.
    pub fn with_capabilities(mut self, capabilities: CapabilityFlags) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The capability set actually requested from the server.
    ///
    /// CONNECT_WITH_DB tracks whether a default schema is configured,
    /// whatever the caller put in `capabilities`.
    pub(crate) fn requested_capabilities(&self) -> CapabilityFlags {
        let mut caps = self.capabilities;
        if self.database.is_some() {
            caps.insert(CapabilityFlags::CONNECT_WITH_DB);
        } else {
            caps.remove(CapabilityFlags::CONNECT_WITH_DB);
        }
        caps
    }
}
