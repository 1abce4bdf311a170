//! Binary (prepared-statement) row decoding and NULL bitmaps.
//!
//! The same bitmap layout serves both directions with different bit
//! offsets: bit `(i + offset) % 8` of byte `(i + offset) / 8`. The client
//! writes parameter bitmaps with offset 0; the server writes row bitmaps
//! with offset 2, reserving the two low bits of the first byte.

use crate::error::{Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::types::column::{ColumnInfo, ColumnType};
use crate::protocol::types::row::Row;
use bytes::Bytes;
use std::sync::Arc;

/// Bit offset for parameter bitmaps in COM_STMT_EXECUTE.
pub const EXECUTE_BITMAP_OFFSET: usize = 0;
/// Bit offset for row bitmaps in binary result sets.
pub const ROW_BITMAP_OFFSET: usize = 2;

/// Number of bitmap bytes needed for `count` entries at `offset`.
pub fn null_bitmap_len(count: usize, offset: usize) -> usize {
    (count + offset + 7) / 8
}

/// Build a bitmap with a bit set for each `true` entry.
pub fn build_null_bitmap(nulls: &[bool], offset: usize) -> Vec<u8> {
    let mut bitmap = vec![0u8; null_bitmap_len(nulls.len(), offset)];
    for (i, &is_null) in nulls.iter().enumerate() {
        if is_null {
            bitmap[(i + offset) / 8] |= 1 << ((i + offset) % 8);
        }
    }
    bitmap
}

/// Whether entry `index` is marked NULL in `bitmap`.
pub fn is_null_set(bitmap: &[u8], index: usize, offset: usize) -> bool {
    let byte = (index + offset) / 8;
    let bit = (index + offset) % 8;
    bitmap.get(byte).is_some_and(|b| b & (1 << bit) != 0)
}

/// Parse a binary-protocol row body into the text representation used by
/// [`Row`], so callers read text and binary results identically.
pub fn parse_binary_row(body: Bytes, columns: Arc<ColumnInfo>) -> Result<Row> {
    let mut buf = ReadBuffer::new(body);
    let header = buf.read_u8()?;
    if header != 0x00 {
        return Err(Error::protocol(format!(
            "binary row header 0x{:02x} (expected 0x00)",
            header
        )));
    }

    let bitmap = buf
        .read_bytes(null_bitmap_len(columns.len(), ROW_BITMAP_OFFSET))?
        .to_vec();

    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in columns.columns().iter().enumerate() {
        if is_null_set(&bitmap, i, ROW_BITMAP_OFFSET) {
            values.push(None);
            continue;
        }
        let unsigned = column.is_unsigned();
        let text = match column.column_type {
            ColumnType::Tiny => {
                let v = buf.read_u8()?;
                if unsigned {
                    v.to_string()
                } else {
                    (v as i8).to_string()
                }
            }
            ColumnType::Short | ColumnType::Year => {
                let v = buf.read_u16_le()?;
                if unsigned {
                    v.to_string()
                } else {
                    (v as i16).to_string()
                }
            }
            ColumnType::Long | ColumnType::Int24 => {
                let v = buf.read_u32_le()?;
                if unsigned {
                    v.to_string()
                } else {
                    (v as i32).to_string()
                }
            }
            ColumnType::LongLong => {
                let v = buf.read_u64_le()?;
                if unsigned {
                    v.to_string()
                } else {
                    (v as i64).to_string()
                }
            }
            ColumnType::Float => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&buf.read_bytes(4)?);
                f32::from_le_bytes(bytes).to_string()
            }
            ColumnType::Double => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&buf.read_bytes(8)?);
                f64::from_le_bytes(bytes).to_string()
            }
            ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp => {
                decode_datetime(&mut buf)?
            }
            ColumnType::Time => decode_time(&mut buf)?,
            ColumnType::Null => {
                // Type says NULL but the bitmap did not; treat as NULL.
                values.push(None);
                continue;
            }
            // Everything else travels as a length-encoded string.
            _ => buf.read_lenenc_string()?,
        };
        values.push(Some(text));
    }

    Ok(Row::new(values, columns))
}

/// Decode a binary DATE/DATETIME/TIMESTAMP value. The length byte is 0, 4,
/// 7 or 11, trailing all-zero fields omitted.
fn decode_datetime(buf: &mut ReadBuffer) -> Result<String> {
    let len = buf.read_u8()?;
    let (mut year, mut month, mut day) = (0u16, 0u8, 0u8);
    let (mut hour, mut minute, mut second) = (0u8, 0u8, 0u8);
    let mut micros = 0u32;
    if len >= 4 {
        year = buf.read_u16_le()?;
        month = buf.read_u8()?;
        day = buf.read_u8()?;
    }
    if len >= 7 {
        hour = buf.read_u8()?;
        minute = buf.read_u8()?;
        second = buf.read_u8()?;
    }
    if len >= 11 {
        micros = buf.read_u32_le()?;
    }
    let mut text = format!("{:04}-{:02}-{:02}", year, month, day);
    if len >= 7 {
        text.push_str(&format!(" {:02}:{:02}:{:02}", hour, minute, second));
    }
    if len >= 11 {
        text.push_str(&format!(".{:06}", micros));
    }
    Ok(text)
}

/// Decode a binary TIME value. The length byte is 0, 8 or 12.
fn decode_time(buf: &mut ReadBuffer) -> Result<String> {
    let len = buf.read_u8()?;
    if len == 0 {
        return Ok("00:00:00".to_string());
    }
    let negative = buf.read_u8()? != 0;
    let days = buf.read_u32_le()?;
    let hours = buf.read_u8()? as u64 + days as u64 * 24;
    let minute = buf.read_u8()?;
    let second = buf.read_u8()?;
    let mut text = format!(
        "{}{:02}:{:02}:{:02}",
        if negative { "-" } else { "" },
        hours,
        minute,
        second
    );
    if len >= 12 {
        let micros = buf.read_u32_le()?;
        text.push_str(&format!(".{:06}", micros));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buffer::WriteBuffer;
    use crate::protocol::flags::FieldFlags;
    use crate::protocol::types::column::tests::column_body;
    use crate::protocol::types::column::Column;

    #[test]
    fn test_bitmap_offsets() {
        // Nine entries, only the last NULL: with the row offset the ninth
        // bit lands in bit 2 of the second byte; with no offset it lands in
        // bit 0.
        let mut nulls = [false; 9];
        nulls[8] = true;

        let row_map = build_null_bitmap(&nulls, ROW_BITMAP_OFFSET);
        assert_eq!(row_map, vec![0x00, 0x04]);

        let param_map = build_null_bitmap(&nulls, EXECUTE_BITMAP_OFFSET);
        assert_eq!(param_map, vec![0x00, 0x01]);

        assert!(is_null_set(&row_map, 8, ROW_BITMAP_OFFSET));
        assert!(!is_null_set(&row_map, 7, ROW_BITMAP_OFFSET));
        assert!(is_null_set(&param_map, 8, EXECUTE_BITMAP_OFFSET));
    }

    #[test]
    fn test_bitmap_len() {
        assert_eq!(null_bitmap_len(0, 0), 0);
        assert_eq!(null_bitmap_len(1, 0), 1);
        assert_eq!(null_bitmap_len(8, 0), 1);
        assert_eq!(null_bitmap_len(9, 0), 2);
        assert_eq!(null_bitmap_len(6, 2), 1);
        assert_eq!(null_bitmap_len(7, 2), 2);
    }

    fn columns(defs: &[(&str, ColumnType, FieldFlags)]) -> Arc<ColumnInfo> {
        ColumnInfo::new(
            defs.iter()
                .map(|(name, ty, flags)| Column::parse(column_body(name, *ty, *flags)).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_binary_row_integers_and_null() {
        let cols = columns(&[
            ("id", ColumnType::Long, FieldFlags::UNSIGNED),
            ("count", ColumnType::LongLong, FieldFlags::empty()),
            ("note", ColumnType::VarString, FieldFlags::empty()),
        ]);
        let mut buf = WriteBuffer::new();
        buf.write_u8(0x00);
        // note (index 2) NULL: bit 4 of the single bitmap byte.
        buf.write_u8(0b0001_0000);
        buf.write_u32_le(3_000_000_000);
        buf.write_u64_le((-5i64) as u64);
        let row = parse_binary_row(buf.freeze(), cols).unwrap();

        assert_eq!(row.get(0).unwrap(), Some("3000000000"));
        assert_eq!(row.get(1).unwrap(), Some("-5"));
        assert_eq!(row.get(2).unwrap(), None);
    }

    #[test]
    fn test_binary_row_strings_and_floats() {
        let cols = columns(&[
            ("flavor", ColumnType::VarString, FieldFlags::empty()),
            ("weight", ColumnType::Double, FieldFlags::empty()),
        ]);
        let mut buf = WriteBuffer::new();
        buf.write_u8(0x00);
        buf.write_u8(0x00);
        buf.write_lenenc_bytes(b"salted");
        buf.write_bytes(&1.5f64.to_le_bytes());
        let row = parse_binary_row(buf.freeze(), cols).unwrap();

        assert_eq!(row.get_by_name("flavor").unwrap(), Some("salted"));
        assert_eq!(row.get_by_name("weight").unwrap(), Some("1.5"));
    }

    #[test]
    fn test_binary_row_temporal_lengths() {
        let cols = columns(&[
            ("d", ColumnType::Date, FieldFlags::empty()),
            ("dt", ColumnType::DateTime, FieldFlags::empty()),
            ("t", ColumnType::Time, FieldFlags::empty()),
        ]);
        let mut buf = WriteBuffer::new();
        buf.write_u8(0x00);
        buf.write_u8(0x00);
        // DATE, length 4
        buf.write_u8(4);
        buf.write_u16_le(2026);
        buf.write_u8(8);
        buf.write_u8(27);
        // DATETIME, length 11
        buf.write_u8(11);
        buf.write_u16_le(2026);
        buf.write_u8(8);
        buf.write_u8(27);
        buf.write_u8(13);
        buf.write_u8(5);
        buf.write_u8(9);
        buf.write_u32_le(1250);
        // TIME, length 8, negative, one day plus ten hours
        buf.write_u8(8);
        buf.write_u8(1);
        buf.write_u32_le(1);
        buf.write_u8(10);
        buf.write_u8(30);
        buf.write_u8(0);
        let row = parse_binary_row(buf.freeze(), cols).unwrap();

        assert_eq!(row.get(0).unwrap(), Some("2026-08-27"));
        assert_eq!(row.get(1).unwrap(), Some("2026-08-27 13:05:09.001250"));
        assert_eq!(row.get(2).unwrap(), Some("-34:30:00"));
    }

    #[test]
    fn test_binary_row_bad_header() {
        let cols = columns(&[("id", ColumnType::Long, FieldFlags::empty())]);
        let mut buf = WriteBuffer::new();
        buf.write_u8(0x01);
        buf.write_u8(0x00);
        buf.write_u32_le(1);
        assert!(parse_binary_row(buf.freeze(), cols).is_err());
    }
}
