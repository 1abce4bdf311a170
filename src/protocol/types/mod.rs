//! Result-set data types.

pub mod column;
pub mod row;
pub mod value;

pub use column::{Column, ColumnInfo, ColumnType};
pub use row::{ResultSet, Row};
pub use value::BindValue;
