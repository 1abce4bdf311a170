//! Connection lifecycle and the command/response exchange.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::constants::*;
use crate::protocol::flags::{CapabilityFlags, StatusFlags};
use crate::protocol::handshake::{build_handshake_response, Handshake};
use crate::protocol::packet::PacketStream;
use crate::protocol::response::{classify, parse_err, EofPacket, OkPacket, ResponseKind};
use crate::protocol::types::column::{Column, ColumnInfo};
use crate::protocol::types::row::{ResultSet, Row};
use crate::protocol::{binary, types::BindValue};
use crate::statement::PreparedStatement;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    Authorizing,
    Connected,
    Disconnecting,
}

/// A client connection to one server.
///
/// Commands are strictly serialized: each one resets the packet sequence,
/// sends its request and fully drains its response before the next may
/// start. Borrowing rules enforce this; there is no internal locking.
pub struct Connection {
    stream: PacketStream,
    config: Config,
    /// Negotiated capabilities: requested ∩ advertised, fixed at handshake.
    capabilities: CapabilityFlags,
    /// Status flags from the most recent OK/EOF packet.
    status: StatusFlags,
    state: State,
    server_version: String,
    connection_id: u32,
}

impl Connection {
    /// Open a TCP connection and perform the handshake.
    pub async fn connect(config: Config) -> Result<Self> {
        debug!(host = %config.host, port = config.port, "connecting");
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;

        let mut conn = Self {
            stream: PacketStream::new(tcp),
            config,
            capabilities: CapabilityFlags::empty(),
            status: StatusFlags::empty(),
            state: State::Connecting,
            server_version: String::new(),
            connection_id: 0,
        };
        conn.handshake().await?;
        Ok(conn)
    }

    async fn handshake(&mut self) -> Result<()> {
        let body = self.stream.read_message().await?;
        // A server at capacity may greet with an ERR packet instead.
        if body.first() == Some(&ERR_HEADER) {
            return Err(parse_err(body, CapabilityFlags::empty()));
        }
        let handshake = Handshake::parse(body)?;
        self.server_version = handshake.server_version.clone();
        self.connection_id = handshake.connection_id;
        self.capabilities = self
            .config
            .requested_capabilities()
            .intersect(handshake.capabilities);
        debug!(
            server = %self.server_version,
            connection_id = self.connection_id,
            capabilities = %self.capabilities,
            "handshake received"
        );

        self.state = State::Authorizing;
        let response = build_handshake_response(&handshake, &self.config, self.capabilities);
        self.stream.write_message(&response).await?;

        let body = self.stream.read_message().await?;
        match classify(&body) {
            ResponseKind::Ok => {
                let ok = OkPacket::parse(body, self.capabilities)?;
                self.status = ok.status;
                self.state = State::Connected;
                debug!(connection_id = self.connection_id, "authenticated");
                Ok(())
            }
            ResponseKind::Err => {
                let err = parse_err(body, self.capabilities);
                Err(Error::AuthenticationFailed {
                    message: err.to_string(),
                })
            }
            // An auth-switch request; only mysql_native_password is spoken.
            ResponseKind::Eof => Err(Error::AuthenticationFailed {
                message: "server requested an unsupported authentication method switch"
                    .to_string(),
            }),
            ResponseKind::ResultSetHeader => Err(Error::unexpected(
                "result set in place of an authentication result",
            )),
        }
    }

    /// Negotiated capability set.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    /// Status flags from the most recent response.
    pub fn status(&self) -> StatusFlags {
        self.status
    }

    /// Lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Server version string from the handshake.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Server-assigned connection id.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Whether the server reports an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.status.contains(StatusFlags::IN_TRANSACTION)
    }

    /// Send a command packet: the command byte, then its payload. Resets
    /// the sequence number, as every command starts a new exchange.
    pub(crate) async fn send_command(&mut self, command: u8, payload: &[u8]) -> Result<()> {
        if self.state != State::Connected {
            return Err(Error::NoConnection);
        }
        debug!(command, len = payload.len(), "send command");
        self.stream.reset_sequence();
        let mut buf = WriteBuffer::with_capacity(1 + payload.len());
        buf.write_u8(command);
        buf.write_bytes(payload);
        self.stream.write_message(&buf.freeze()).await
    }

    /// Run a text-protocol statement and collect its full result.
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.send_command(COM_QUERY, sql.as_bytes()).await?;
        self.read_response(false).await
    }

    /// Run a statement for its side effect; returns the affected-row count.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        Ok(self.query(sql).await?.affected_rows)
    }

    /// Check that the server is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.send_command(COM_PING, &[]).await?;
        self.read_ok().await?;
        Ok(())
    }

    /// Switch the default schema.
    pub async fn use_database(&mut self, database: &str) -> Result<()> {
        self.send_command(COM_INIT_DB, database.as_bytes()).await?;
        self.read_ok().await?;
        self.config.database = Some(database.to_string());
        Ok(())
    }

    /// Open a transaction.
    pub async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction() {
            warn!("starting a transaction while one is already open");
        }
        self.execute("START TRANSACTION").await?;
        Ok(())
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await?;
        Ok(())
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").await?;
        Ok(())
    }

    /// Prepare a statement for binary-protocol execution.
    ///
    /// The statement borrows the connection; nothing else can use it until
    /// the statement is dropped or closed.
    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement<'_>> {
        PreparedStatement::prepare(self, sql).await
    }

    /// Bind `params` to a one-shot prepared statement, execute it and close
    /// it.
    ///
    /// The statement is closed even when the execute fails, so a statement
    /// error (which leaves the connection usable) does not leak the
    /// server-side handle. The execute error takes precedence over a close
    /// error.
    pub async fn execute_with(&mut self, sql: &str, params: &[BindValue]) -> Result<ResultSet> {
        let mut statement = self.prepare(sql).await?;
        let result = statement.execute(params).await;
        match statement.close().await {
            Ok(()) => result,
            Err(close_err) => result.and(Err(close_err)),
        }
    }

    /// Send COM_QUIT and shut the transport down.
    ///
    /// The server usually just closes the socket; a zero-length reply, an
    /// EOF packet or a closed connection all count as a clean quit.
    pub async fn close(mut self) -> Result<()> {
        if self.state != State::Connected {
            return Ok(());
        }
        self.state = State::Disconnecting;
        self.stream.reset_sequence();
        self.stream.write_message(&[COM_QUIT]).await?;
        match self.stream.read_message().await {
            Ok(body) if body.is_empty() => {}
            Ok(body) if body.first() == Some(&EOF_HEADER) => {}
            Ok(body) if classify(&body) == ResponseKind::Ok => {}
            Ok(body) => {
                warn!(len = body.len(), "unexpected reply to quit");
            }
            Err(Error::ConnectionClosed) => {}
            Err(e) => return Err(e),
        }
        self.stream.shutdown().await?;
        self.state = State::Disconnected;
        debug!(connection_id = self.connection_id, "disconnected");
        Ok(())
    }

    pub(crate) async fn read_message(&mut self) -> Result<Bytes> {
        self.stream.read_message().await
    }

    /// Read a response that must be a plain OK.
    pub(crate) async fn read_ok(&mut self) -> Result<OkPacket> {
        let body = self.stream.read_message().await?;
        match classify(&body) {
            ResponseKind::Ok => {
                let ok = OkPacket::parse(body, self.capabilities)?;
                self.status = ok.status;
                Ok(ok)
            }
            ResponseKind::Err => Err(parse_err(body, self.capabilities)),
            _ => Err(Error::unexpected("expected an OK packet")),
        }
    }

    /// Read a command response: OK, ERR or a full result set.
    ///
    /// `binary` selects the row codec; the surrounding packets are
    /// identical between the text and binary protocols.
    pub(crate) async fn read_response(&mut self, binary: bool) -> Result<ResultSet> {
        let body = self.stream.read_message().await?;
        match classify(&body) {
            ResponseKind::Ok => {
                let ok = OkPacket::parse(body, self.capabilities)?;
                self.status = ok.status;
                Ok(ResultSet::from_ok(ok))
            }
            ResponseKind::Err => Err(parse_err(body, self.capabilities)),
            ResponseKind::Eof => Err(Error::unexpected("EOF in place of a command response")),
            ResponseKind::ResultSetHeader => {
                let mut buf = ReadBuffer::new(body);
                let column_count = buf.read_lenenc_int()? as usize;
                if buf.remaining() != 0 {
                    return Err(Error::protocol("trailing bytes after column count"));
                }
                let columns = self.read_columns(column_count).await?;
                self.read_rows(columns, binary).await
            }
        }
    }

    /// Read `count` column definitions, plus the separating EOF packet on
    /// connections without DEPRECATE_EOF.
    pub(crate) async fn read_columns(&mut self, count: usize) -> Result<Arc<ColumnInfo>> {
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let body = self.stream.read_message().await?;
            if body.first() == Some(&ERR_HEADER) {
                return Err(parse_err(body, self.capabilities));
            }
            columns.push(Column::parse(body)?);
        }
        if count > 0 && !self.capabilities.contains(CapabilityFlags::DEPRECATE_EOF) {
            let body = self.stream.read_message().await?;
            if classify(&body) != ResponseKind::Eof {
                return Err(Error::unexpected("missing EOF after column definitions"));
            }
        }
        Ok(ColumnInfo::new(columns))
    }

    /// Read row packets until the terminator.
    ///
    /// With DEPRECATE_EOF the terminator is an OK packet wearing the 0xfe
    /// header; otherwise it is a classic EOF packet. Either way it carries
    /// the closing status flags.
    async fn read_rows(&mut self, columns: Arc<ColumnInfo>, binary: bool) -> Result<ResultSet> {
        let mut rows = Vec::new();
        loop {
            let body = self.stream.read_message().await?;
            if body.first() == Some(&ERR_HEADER) {
                return Err(parse_err(body, self.capabilities));
            }
            if body.first() == Some(&EOF_HEADER) {
                if self.capabilities.contains(CapabilityFlags::DEPRECATE_EOF)
                    && body.len() >= OK_RESPONSE_MIN_LENGTH
                {
                    let ok = OkPacket::parse(body, self.capabilities)?;
                    self.status = ok.status;
                    debug!(rows = rows.len(), "result set complete");
                    return Ok(ResultSet::from_rows(columns, rows, ok.status, ok.warnings));
                }
                if body.len() < EOF_RESPONSE_MAX_LENGTH {
                    let eof = EofPacket::parse(body, self.capabilities)?;
                    self.status = eof.status;
                    debug!(rows = rows.len(), "result set complete");
                    return Ok(ResultSet::from_rows(columns, rows, eof.status, eof.warnings));
                }
                // 0xfe can also start a long row; fall through to the codec.
            }
            let row = if binary {
                binary::parse_binary_row(body, Arc::clone(&columns))?
            } else {
                Row::parse_text(body, Arc::clone(&columns))?
            };
            rows.push(row);
        }
    }
}
