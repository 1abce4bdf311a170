//! Column definitions and column types.

use crate::error::{Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::flags::FieldFlags;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Wire type of a column or bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    DateTime = 0x0c,
    Year = 0x0d,
    NewDate = 0x0e,
    VarChar = 0x0f,
    Bit = 0x10,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl ColumnType {
    /// Decode a column type byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        use ColumnType::*;
        Ok(match byte {
            0x00 => Decimal,
            0x01 => Tiny,
            0x02 => Short,
            0x03 => Long,
            0x04 => Float,
            0x05 => Double,
            0x06 => Null,
            0x07 => Timestamp,
            0x08 => LongLong,
            0x09 => Int24,
            0x0a => Date,
            0x0b => Time,
            0x0c => DateTime,
            0x0d => Year,
            0x0e => NewDate,
            0x0f => VarChar,
            0x10 => Bit,
            0xf5 => Json,
            0xf6 => NewDecimal,
            0xf7 => Enum,
            0xf8 => Set,
            0xf9 => TinyBlob,
            0xfa => MediumBlob,
            0xfb => LongBlob,
            0xfc => Blob,
            0xfd => VarString,
            0xfe => String,
            0xff => Geometry,
            other => {
                return Err(Error::protocol(format!(
                    "unknown column type byte 0x{:02x}",
                    other
                )))
            }
        })
    }

    /// The wire byte for this type.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A column definition from a result-set or prepare response.
#[derive(Debug, Clone)]
pub struct Column {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: FieldFlags,
    pub decimals: u8,
}

impl Column {
    /// Parse a column-definition packet body.
    pub fn parse(body: Bytes) -> Result<Self> {
        let mut buf = ReadBuffer::new(body);

        let catalog = buf.read_lenenc_string()?;
        let schema = buf.read_lenenc_string()?;
        let table = buf.read_lenenc_string()?;
        let org_table = buf.read_lenenc_string()?;
        let name = buf.read_lenenc_string()?;
        let org_name = buf.read_lenenc_string()?;

        // Length of the fixed-size tail; always 0x0c in practice, ignored.
        buf.read_lenenc_int()?;
        let character_set = buf.read_u16_le()?;
        let column_length = buf.read_u32_le()?;
        let column_type = ColumnType::from_byte(buf.read_u8()?)?;
        let flags = FieldFlags(buf.read_u16_le()?);
        let decimals = buf.read_u8()?;
        // Two filler bytes close the definition.
        buf.skip(2)?;

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            character_set,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }

    /// Whether the column carries the UNSIGNED field flag.
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(FieldFlags::UNSIGNED)
    }
}

/// The column set of one result, with an eager name index shared by every
/// row via `Arc`.
#[derive(Debug)]
pub struct ColumnInfo {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Build the lookup table. On duplicate names the first occurrence wins.
    pub fn new(columns: Vec<Column>) -> Arc<Self> {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            by_name.entry(column.name.clone()).or_insert(i);
        }
        Arc::new(Self { columns, by_name })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
