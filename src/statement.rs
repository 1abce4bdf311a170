//! Prepared statements over the binary protocol.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::binary::{build_null_bitmap, EXECUTE_BITMAP_OFFSET};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::constants::*;
use crate::protocol::response::parse_err;
use crate::protocol::types::column::{Column, ColumnInfo};
use crate::protocol::types::row::ResultSet;
use crate::protocol::types::value::BindValue;
use std::sync::Arc;
use tracing::debug;

/// Cursor mode requested when executing a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorType {
    /// Plain execution; the server streams the whole result back.
    #[default]
    NoCursor,
    ReadOnly,
    ForUpdate,
    Scrollable,
}

impl CursorType {
    pub(crate) const fn as_byte(self) -> u8 {
        match self {
            CursorType::NoCursor => CURSOR_TYPE_NO_CURSOR,
            CursorType::ReadOnly => CURSOR_TYPE_READ_ONLY,
            CursorType::ForUpdate => CURSOR_TYPE_FOR_UPDATE,
            CursorType::Scrollable => CURSOR_TYPE_SCROLLABLE,
        }
    }
}

/// A server-side prepared statement.
///
/// Borrows the connection for its whole life, so the connection cannot be
/// used for anything else until the statement is closed or dropped.
/// Dropping without [`close`](Self::close) leaves the server-side handle
/// allocated until the connection ends.
pub struct PreparedStatement<'c> {
    conn: &'c mut Connection,
    statement_id: u32,
    parameters: Vec<Column>,
    columns: Arc<ColumnInfo>,
    warnings: u16,
    cursor: CursorType,
    last_params: Option<Vec<BindValue>>,
}

impl<'c> PreparedStatement<'c> {
    pub(crate) async fn prepare(conn: &'c mut Connection, sql: &str) -> Result<Self> {
        conn.send_command(COM_STMT_PREPARE, sql.as_bytes()).await?;

        let body = conn.read_message().await?;
        if body.first() == Some(&ERR_HEADER) {
            return Err(parse_err(body, conn.capabilities()));
        }
        let mut buf = ReadBuffer::new(body);
        let status = buf.read_u8()?;
        if status != 0x00 {
            return Err(Error::unexpected(format!(
                "prepare response status 0x{:02x}",
                status
            )));
        }
        let statement_id = buf.read_u32_le()?;
        let column_count = buf.read_u16_le()? as usize;
        let parameter_count = buf.read_u16_le()? as usize;
        buf.skip(1)?; // filler
        let warnings = buf.read_u16_le()?;

        let parameters = conn.read_columns(parameter_count).await?;
        let columns = conn.read_columns(column_count).await?;
        debug!(
            statement_id,
            parameters = parameter_count,
            columns = column_count,
            "statement prepared"
        );

        Ok(Self {
            conn,
            statement_id,
            parameters: parameters.columns().to_vec(),
            columns,
            warnings,
            cursor: CursorType::default(),
            last_params: None,
        })
    }

    /// Server-assigned statement id.
    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    /// Number of `?` placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Result columns declared at prepare time.
    pub fn columns(&self) -> &[Column] {
        self.columns.columns()
    }

    /// Warning count from the prepare response.
    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    /// Cursor mode sent with each execute.
    pub fn cursor(&self) -> CursorType {
        self.cursor
    }

    /// Pick the cursor mode for subsequent executes.
    pub fn set_cursor(&mut self, cursor: CursorType) {
        self.cursor = cursor;
    }

    /// Bind `params` and execute.
    ///
    /// The parameter count must match the statement exactly; the mismatch
    /// is refused client side rather than bounced off the server.
    pub async fn execute(&mut self, params: &[BindValue]) -> Result<ResultSet> {
        if params.len() != self.parameters.len() {
            return Err(Error::ParameterCountMismatch {
                expected: self.parameters.len(),
                actual: params.len(),
            });
        }
        self.send_execute(params, true).await?;
        self.last_params = Some(params.to_vec());
        self.conn.read_response(true).await
    }

    /// Execute again with the previously bound parameters.
    pub async fn re_execute(&mut self) -> Result<ResultSet> {
        let params = self
            .last_params
            .clone()
            .ok_or_else(|| Error::unexpected("re-execute before any execute"))?;
        self.send_execute(&params, false).await?;
        self.conn.read_response(true).await
    }

    async fn send_execute(&mut self, params: &[BindValue], new_bound: bool) -> Result<()> {
        let payload = build_execute_payload(self.statement_id, self.cursor, params, new_bound);
        self.conn.send_command(COM_STMT_EXECUTE, &payload).await
    }

    /// Reset the statement's server-side state, discarding any pending
    /// cursor and accumulated long data.
    pub async fn reset(&mut self) -> Result<()> {
        let payload = self.statement_id.to_le_bytes();
        self.conn.send_command(COM_STMT_RESET, &payload).await?;
        self.conn.read_ok().await?;
        Ok(())
    }

    /// Deallocate the statement. Fire-and-forget: the server sends no
    /// response to COM_STMT_CLOSE.
    pub async fn close(self) -> Result<()> {
        let payload = self.statement_id.to_le_bytes();
        self.conn.send_command(COM_STMT_CLOSE, &payload).await?;
        debug!(statement_id = self.statement_id, "statement closed");
        Ok(())
    }
}

/// Serialize a COM_STMT_EXECUTE payload (everything after the command
/// byte): statement id, cursor flag, iteration count, then the NULL bitmap,
/// the new-params-bound flag and, when freshly bound, the type block. Type
/// bytes and values are emitted for non-NULL parameters only; NULL travels
/// in the bitmap alone.
fn build_execute_payload(
    statement_id: u32,
    cursor: CursorType,
    params: &[BindValue],
    new_bound: bool,
) -> Vec<u8> {
    let mut buf = WriteBuffer::with_capacity(16 + params.len() * 8);
    buf.write_u32_le(statement_id);
    buf.write_u8(cursor.as_byte());
    buf.write_u32_le(1); // iteration count

    if !params.is_empty() {
        let nulls: Vec<bool> = params.iter().map(BindValue::is_null).collect();
        buf.write_bytes(&build_null_bitmap(&nulls, EXECUTE_BITMAP_OFFSET));
        buf.write_u8(new_bound as u8);
        if new_bound {
            for param in params.iter().filter(|p| !p.is_null()) {
                buf.write_u8(param.type_code().as_byte());
                buf.write_u8(if param.is_unsigned() {
                    UNSIGNED_TYPE_FLAG
                } else {
                    0
                });
            }
        }
        for param in params {
            param.encode(&mut buf);
        }
    }
    buf.freeze().to_vec()
}
