//! Parameter values for the binary (prepared-statement) protocol.

use crate::protocol::buffer::WriteBuffer;
use crate::protocol::types::column::ColumnType;

/// A value bound to a prepared-statement parameter.
///
/// This is the closed set of types the execute encoder knows how to put on
/// the wire; everything else must be passed as text and converted server
/// side.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    TinyInt(i8),
    TinyUint(u8),
    SmallInt(i16),
    SmallUint(u16),
    Int(i32),
    Uint(u32),
    BigInt(i64),
    BigUint(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl BindValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }

    /// The column-type byte advertised for this parameter.
    pub fn type_code(&self) -> ColumnType {
        match self {
            BindValue::Null => ColumnType::Null,
            BindValue::TinyInt(_) | BindValue::TinyUint(_) => ColumnType::Tiny,
            BindValue::SmallInt(_) | BindValue::SmallUint(_) => ColumnType::Short,
            BindValue::Int(_) | BindValue::Uint(_) => ColumnType::Long,
            BindValue::BigInt(_) | BindValue::BigUint(_) => ColumnType::LongLong,
            BindValue::Float(_) => ColumnType::Float,
            BindValue::Double(_) => ColumnType::Double,
            BindValue::Text(_) => ColumnType::VarString,
            BindValue::Bytes(_) => ColumnType::Blob,
        }
    }

    /// Whether the unsigned flag accompanies the type byte.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            BindValue::TinyUint(_)
                | BindValue::SmallUint(_)
                | BindValue::Uint(_)
                | BindValue::BigUint(_)
        )
    }

    /// Append the binary encoding of the value. NULL encodes no bytes; it
    /// is carried entirely by the execute packet's NULL bitmap.
    pub fn encode(&self, buf: &mut WriteBuffer) {
        match self {
            BindValue::Null => {}
            BindValue::TinyInt(v) => buf.write_u8(*v as u8),
            BindValue::TinyUint(v) => buf.write_u8(*v),
            BindValue::SmallInt(v) => buf.write_u16_le(*v as u16),
            BindValue::SmallUint(v) => buf.write_u16_le(*v),
            BindValue::Int(v) => buf.write_u32_le(*v as u32),
            BindValue::Uint(v) => buf.write_u32_le(*v),
            BindValue::BigInt(v) => buf.write_u64_le(*v as u64),
            BindValue::BigUint(v) => buf.write_u64_le(*v),
            BindValue::Float(v) => buf.write_bytes(&v.to_le_bytes()),
            BindValue::Double(v) => buf.write_bytes(&v.to_le_bytes()),
            BindValue::Text(v) => buf.write_lenenc_bytes(v.as_bytes()),
            BindValue::Bytes(v) => buf.write_lenenc_bytes(v),
        }
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::BigInt(v)
    }
}

impl From<u64> for BindValue {
    fn from(v: u64) -> Self {
        BindValue::BigUint(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Double(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<Vec<u8>> for BindValue {
    fn from(v: Vec<u8>) -> Self {
        BindValue::Bytes(v)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => BindValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &BindValue) -> Vec<u8> {
        let mut buf = WriteBuffer::new();
        value.encode(&mut buf);
        buf.freeze().to_vec()
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(encoded(&BindValue::TinyInt(-1)), vec![0xff]);
        assert_eq!(encoded(&BindValue::SmallUint(0x0102)), vec![0x02, 0x01]);
        assert_eq!(
            encoded(&BindValue::Int(-2)),
            vec![0xfe, 0xff, 0xff, 0xff]
        );
        assert_eq!(encoded(&BindValue::BigUint(1)).len(), 8);
    }

    #[test]
    fn test_null_encodes_nothing() {
        assert!(encoded(&BindValue::Null).is_empty());
        assert_eq!(BindValue::Null.type_code(), ColumnType::Null);
    }

    #[test]
    fn test_text_is_length_prefixed() {
        assert_eq!(
            encoded(&BindValue::Text("hi".into())),
            vec![0x02, b'h', b'i']
        );
        assert_eq!(BindValue::Text("hi".into()).type_code(), ColumnType::VarString);
    }

    #[test]
    fn test_unsigned_flag() {
        assert!(BindValue::BigUint(0).is_unsigned());
        assert!(!BindValue::BigInt(0).is_unsigned());
        assert_eq!(
            BindValue::BigUint(0).type_code(),
            BindValue::BigInt(0).type_code()
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(BindValue::from(None::<i64>), BindValue::Null);
        assert_eq!(BindValue::from(Some(3i64)), BindValue::BigInt(3));
    }
}
