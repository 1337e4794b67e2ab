//! Minimal safe `SQLite` wrapper over the raw C API.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI,
//! linked from the bundled build of `libsqlite3-sys`. Every foreign resource
//! (connection, prepared statement, backup session) is owned by a
//! [`Handle`] that releases it exactly once, and every failing call returns
//! a [`DbError`] carrying the engine's code and message.
//!
//! ```no_run
//! use litekit_db::{Connection, Reader, Statement};
//!
//! # fn main() -> litekit_db::DbResult<()> {
//! let conn = Connection::memory()?;
//! conn.execute_batch("CREATE TABLE Users (Name TEXT)")?;
//! Statement::new(&conn, "INSERT INTO Users VALUES (?)", ("Joe",))?.execute()?;
//!
//! let mut select = Statement::new(&conn, "SELECT Name FROM Users", ())?;
//! let mut rows = select.rows()?;
//! while let Some(row) = rows.next()? {
//!     println!("{}", row.get_string(0));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The `ffi` module is the **only** file that contains `unsafe` code or C
//! types.

mod ffi;

mod backup;
mod connection;
pub mod error;
pub mod handle;
mod params;
mod row;
mod statement;
mod transaction;
pub mod value;

pub use backup::Backup;
pub use connection::{Connection, OpenMode, MEMORY, WIDE_MEMORY};
pub use error::{DbError, DbErrorCode, DbResult};
pub use handle::{Handle, HandlePolicy};
pub use params::{Borrowed, Null, Params, ToParam};
pub use row::{MappedRows, Reader, Row, Rows};
pub use statement::{execute, Statement};
pub use transaction::{Transaction, TransactionBehavior};
pub use value::{Value, ValueKind};

#[cfg(test)]
mod tests;
