//! MySQL Thin Client for Rust
//!
//! A pure Rust implementation of a MySQL wire-protocol client that speaks
//! the binary client/server protocol directly, with no C library in
//! between. Covers the text query protocol and binary prepared statements
//! over `mysql_native_password` authentication.
//!
//! # Example
//!
//! ```no_run
//! use mysql_thin_rs::{BindValue, Config, Connection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::new("localhost")
//!         .with_credentials("username", "password")
//!         .with_database("inventory");
//!     let mut conn = Connection::connect(config).await?;
//!
//!     let result = conn.query("SELECT id, flavor FROM snacks").await?;
//!     for row in &result.rows {
//!         println!("{:?} {:?}", row.get(0)?, row.get_by_name("flavor")?);
//!     }
//!
//!     let mut stmt = conn.prepare("INSERT INTO snacks (flavor) VALUES (?)").await?;
//!     stmt.execute(&[BindValue::from("salted")]).await?;
//!     stmt.close().await?;
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod statement;

// Re-export main types
pub use config::Config;
pub use connection::{Connection, State};
pub use error::{Error, Result};
pub use protocol::flags::{CapabilityFlags, FieldFlags, StatusFlags};
pub use protocol::types::{BindValue, Column, ColumnInfo, ColumnType, ResultSet, Row};
pub use statement::{CursorType, PreparedStatement};
