//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! the `ffi` module through the connection's owned handle.

use std::path::Path;
use std::time::Duration;

use super::error::{DbError, DbResult};
use super::ffi::{self, DbHandle, Profiler};
use super::params::Params;
use super::row::Row;
use super::statement::Statement;
use super::transaction::{Transaction, TransactionBehavior};

/// The engine's reserved name for a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// [`MEMORY`] as UTF-16.
pub const WIDE_MEMORY: [u16; 8] = ascii_to_wide(b":memory:");

const fn ascii_to_wide<const N: usize>(ascii: &[u8; N]) -> [u16; N] {
    let mut wide = [0u16; N];
    let mut i = 0;
    while i < N {
        wide[i] = ascii[i] as u16;
        i += 1;
    }
    wide
}

/// How [`Connection::open_path`] opens its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    ReadOnly,
    /// Read-write, creating the file if needed.
    #[default]
    ReadWriteCreate,
}

impl OpenMode {
    const fn flags(self) -> i32 {
        match self {
            Self::ReadOnly => ffi::SQLITE_OPEN_READONLY,
            Self::ReadWriteCreate => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
        }
    }
}

/// A `SQLite` database connection.
///
/// `Connection::default()` is the not-yet-opened state. Closed when dropped.
/// Not `Send` or `Sync`: all access must happen from a single thread.
#[derive(Default)]
pub struct Connection {
    // Declared before `profiler` so the database closes first.
    handle: DbHandle,
    profiler: Option<Profiler>,
}

impl Connection {
    /// Opens (or creates) the database `name`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the failed open.
    pub fn new(name: &str) -> DbResult<Self> {
        let mut conn = Self::default();
        conn.open(name)?;
        Ok(conn)
    }

    /// Opens (or creates) the database named by UTF-16 `name`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the failed open.
    pub fn new_wide(name: &[u16]) -> DbResult<Self> {
        let mut conn = Self::default();
        conn.open_wide(name)?;
        Ok(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the failed open.
    pub fn memory() -> DbResult<Self> {
        Self::new(MEMORY)
    }

    /// Opens a private in-memory database through the UTF-16 entry point.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the failed open.
    pub fn wide_memory() -> DbResult<Self> {
        Self::new_wide(&WIDE_MEMORY)
    }

    /// Opens a database file at `path` with explicit access.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the failed open, or a misuse error for
    /// a path that is not valid UTF-8.
    pub fn open_path(path: &Path, mode: OpenMode) -> DbResult<Self> {
        let utf8 = path
            .to_str()
            .ok_or_else(|| DbError::new(ffi::SQLITE_MISUSE, "path is not valid UTF-8"))?;
        let c_path = ffi::c_string(utf8)?;
        let mut temp = Self::default();
        if ffi::open_v2(&c_path, mode.flags(), &mut temp.handle) != ffi::SQLITE_OK {
            return Err(temp.last_error());
        }
        log::debug!("opened {} ({mode:?})", path.display());
        Ok(temp)
    }

    /// Replaces this connection with one opened on `name`.
    ///
    /// The open happens on a temporary; `self` only changes on success, and
    /// the previous database (if any) is closed afterwards.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed attempt; `self` is left untouched.
    pub fn open(&mut self, name: &str) -> DbResult<()> {
        let c_name = ffi::c_string(name)?;
        self.open_with(|handle| ffi::open(&c_name, handle))?;
        log::debug!("opened {name}");
        Ok(())
    }

    /// Same as [`open`](Self::open) for a UTF-16 name.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed attempt; `self` is left untouched.
    pub fn open_wide(&mut self, name: &[u16]) -> DbResult<()> {
        let mut c_name = name.to_vec();
        if c_name.contains(&0) {
            return Err(DbError::new(ffi::SQLITE_MISUSE, "nul in wide text"));
        }
        c_name.push(0);
        self.open_with(|handle| ffi::open16(&c_name, handle))?;
        log::debug!("opened {}", String::from_utf16_lossy(name));
        Ok(())
    }

    fn open_with(&mut self, open: impl FnOnce(&mut DbHandle) -> i32) -> DbResult<()> {
        let mut temp = Self::default();
        if open(&mut temp.handle) != ffi::SQLITE_OK {
            return Err(temp.last_error());
        }
        self.handle.swap(&mut temp.handle);
        std::mem::swap(&mut self.profiler, &mut temp.profiler);
        Ok(())
    }

    /// Returns `true` once the connection has been opened.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Captures this connection's current error code and message.
    #[must_use]
    pub fn last_error(&self) -> DbError {
        ffi::last_error(&self.handle)
    }

    /// Returns the rowid of the most recent successful INSERT (0 if none).
    pub fn row_id(&self) -> i64 {
        ffi::last_insert_rowid(&self.handle)
    }

    /// Returns the number of rows changed by the most recent statement.
    pub fn changes(&self) -> usize {
        usize::try_from(ffi::changes(&self.handle)).unwrap_or(0)
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let c_sql = ffi::c_string(sql)?;
        if ffi::exec(&self.handle, &c_sql) != ffi::SQLITE_OK {
            return Err(self.last_error());
        }
        Ok(())
    }

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns the compile error.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        Statement::new(self, sql, ())
    }

    /// Prepares and executes a single SQL statement with the given parameters.
    ///
    /// Returns the number of rows changed; SQL without a statement changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the first prepare, bind or step error.
    pub fn execute<'conn>(&'conn self, sql: &str, params: impl Params<'conn>) -> DbResult<usize> {
        let mut stmt = Statement::new(self, sql, params)?;
        if !stmt.is_valid() {
            return Ok(0);
        }
        stmt.step()?;
        Ok(self.changes())
    }

    /// Prepares and executes a statement, mapping exactly one result row.
    ///
    /// # Errors
    ///
    /// Returns an error if no row is returned, or the first failing call.
    pub fn query_row<'conn, T>(
        &'conn self,
        sql: &str,
        params: impl Params<'conn>,
        mapper: impl FnOnce(&Row<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.query_row_optional(sql, params, mapper)?
            .ok_or_else(|| DbError::new(ffi::SQLITE_DONE, "query returned no rows"))
    }

    /// Like [`query_row`](Self::query_row) but returns `Ok(None)` when no row
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing call.
    pub fn query_row_optional<'conn, T>(
        &'conn self,
        sql: &str,
        params: impl Params<'conn>,
        mapper: impl FnOnce(&Row<'_>) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let mut stmt = Statement::new(self, sql, params)?;
        let mut rows = stmt.rows()?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        mapper(&row).map(Some)
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Begins a deferred transaction.
    ///
    /// # Errors
    ///
    /// Returns the `BEGIN` error.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    /// Begins an immediate transaction (acquires a RESERVED lock right away).
    ///
    /// # Errors
    ///
    /// Returns the `BEGIN` error.
    pub fn transaction_immediate(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Immediate)
    }

    // ── Profiling ───────────────────────────────────────────────────────

    /// Calls `callback` with the SQL text and run time of every statement
    /// that finishes on this connection, replacing any earlier callback.
    ///
    /// The callback runs inside the engine and must not panic.
    ///
    /// # Errors
    ///
    /// Fails on a connection that is not open.
    pub fn profile(&mut self, callback: impl FnMut(&str, Duration) + 'static) -> DbResult<()> {
        let profiler = Profiler::new(Box::new(callback));
        let rc = ffi::set_profile(&self.handle, Some(&profiler));
        if rc != ffi::SQLITE_OK {
            return Err(ffi::error_from_code(rc));
        }
        self.profiler = Some(profiler);
        Ok(())
    }

    /// Removes the profile callback, if any.
    pub fn clear_profile(&mut self) {
        if self.profiler.is_some() {
            ffi::set_profile(&self.handle, None);
            self.profiler = None;
        }
    }

    pub(crate) fn raw(&self) -> &DbHandle {
        &self.handle
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_valid())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            log::debug!("closing connection");
        }
    }
}
