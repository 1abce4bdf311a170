//! Rows and result sets.

use crate::error::{Error, Result};
use crate::protocol::buffer::{Lenenc, ReadBuffer};
use crate::protocol::flags::StatusFlags;
use crate::protocol::response::OkPacket;
use crate::protocol::types::column::{Column, ColumnInfo};
use bytes::Bytes;
use std::sync::Arc;

/// One row of a result set.
///
/// Values are the protocol's text representation; a `None` entry is SQL
/// NULL, which is distinct from an empty string.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Option<String>>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    pub(crate) fn new(values: Vec<Option<String>>, columns: Arc<ColumnInfo>) -> Self {
        Self { values, columns }
    }

    /// Parse a text-protocol row body: one length-encoded string per
    /// column, with the `0xfb` marker standing in for NULL.
    pub(crate) fn parse_text(body: Bytes, columns: Arc<ColumnInfo>) -> Result<Self> {
        let mut buf = ReadBuffer::new(body);
        let mut values = Vec::with_capacity(columns.len());
        for _ in 0..columns.len() {
            let value = match buf.read_lenenc()? {
                Lenenc::Null => None,
                Lenenc::Int(len) => Some(buf.read_string(len as usize)?),
                Lenenc::ErrorMarker => {
                    return Err(Error::protocol("unexpected 0xff marker in row data"))
                }
            };
            values.push(value);
        }
        Ok(Self { values, columns })
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column index; `Ok(None)` is SQL NULL.
    pub fn get(&self, index: usize) -> Result<Option<&str>> {
        self.values
            .get(index)
            .map(|v| v.as_deref())
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                count: self.values.len(),
            })
    }

    /// Value by column name; `Ok(None)` is SQL NULL.
    pub fn get_by_name(&self, name: &str) -> Result<Option<&str>> {
        let index = self
            .columns
            .index_of(name)
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })?;
        self.get(index)
    }

    /// All values in column order.
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }
}

/// The complete outcome of one statement.
///
/// Row-producing statements fill `columns` and `rows`; data-modifying
/// statements instead carry `affected_rows` and `last_insert_id` from the
/// server's OK packet.
#[derive(Debug)]
pub struct ResultSet {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
    pub status: StatusFlags,
    columns: Arc<ColumnInfo>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// A result set for a statement that produced no rows.
    pub(crate) fn from_ok(ok: OkPacket) -> Self {
        Self {
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            warnings: ok.warnings,
            status: ok.status,
            columns: ColumnInfo::new(Vec::new()),
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_rows(
        columns: Arc<ColumnInfo>,
        rows: Vec<Row>,
        status: StatusFlags,
        warnings: u16,
    ) -> Self {
        Self {
            affected_rows: 0,
            last_insert_id: 0,
            warnings,
            status,
            columns,
            rows,
        }
    }

    /// Column definitions, empty for row-less results.
    pub fn columns(&self) -> &[Column] {
        self.columns.columns()
    }

    pub fn column_info(&self) -> &Arc<ColumnInfo> {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buffer::WriteBuffer;
    use crate::protocol::flags::FieldFlags;
    use crate::protocol::types::column::tests::column_body;
    use crate::protocol::types::column::ColumnType;

    fn two_columns() -> Arc<ColumnInfo> {
        ColumnInfo::new(vec![
            Column::parse(column_body("id", ColumnType::Long, FieldFlags::empty())).unwrap(),
            Column::parse(column_body("flavor", ColumnType::VarString, FieldFlags::empty()))
                .unwrap(),
        ])
    }

    #[test]
    fn test_text_row_null_is_not_empty_string() {
        let mut buf = WriteBuffer::new();
        buf.write_lenenc_bytes(b""); // empty string
        buf.write_u8(0xfb); // NULL
        let row = Row::parse_text(buf.freeze(), two_columns()).unwrap();

        assert_eq!(row.get(0).unwrap(), Some(""));
        assert_eq!(row.get(1).unwrap(), None);
    }

    #[test]
    fn test_row_lookup_by_name() {
        let mut buf = WriteBuffer::new();
        buf.write_lenenc_bytes(b"7");
        buf.write_lenenc_bytes(b"salted");
        let row = Row::parse_text(buf.freeze(), two_columns()).unwrap();

        assert_eq!(row.get_by_name("flavor").unwrap(), Some("salted"));
        assert!(matches!(
            row.get_by_name("crunch"),
            Err(Error::ColumnNotFound { .. })
        ));
        assert!(matches!(
            row.get(5),
            Err(Error::ColumnIndexOutOfBounds { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_text_row_truncated() {
        let mut buf = WriteBuffer::new();
        buf.write_lenenc_bytes(b"only one value");
        assert!(Row::parse_text(buf.freeze(), two_columns()).is_err());
    }

    #[test]
    fn test_result_set_from_ok() {
        let ok = OkPacket {
            affected_rows: 4,
            last_insert_id: 11,
            status: StatusFlags::AUTOCOMMIT,
            warnings: 1,
            ..Default::default()
        };
        let result = ResultSet::from_ok(ok);
        assert_eq!(result.affected_rows, 4);
        assert_eq!(result.last_insert_id, 11);
        assert!(result.rows.is_empty());
        assert!(result.columns().is_empty());
    }
}
