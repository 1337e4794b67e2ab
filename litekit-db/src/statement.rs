//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! the `ffi` module through the statement's owned handle.

use std::marker::PhantomData;
use std::os::raw::c_int;

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::ffi::{self, BindMode, StatementHandle};
use super::params::{Params, ToParam};
use super::row::{MappedRows, Row, Rows};

/// A prepared `SQLite` statement.
///
/// Tied to the lifetime of the connection it was prepared against, which it
/// uses for error reporting but does not own. Finalized when dropped.
///
/// `Statement::default()` is the unprepared state; every other state comes
/// from a successful [`prepare`](Self::prepare).
///
/// The connection must outlive the statement:
///
/// ```compile_fail
/// use litekit_db::{Connection, Statement};
///
/// let stmt;
/// {
///     let conn = Connection::memory().expect("open");
///     stmt = Statement::new(&conn, "SELECT 1", ()).expect("prepare");
/// }
/// ```
pub struct Statement<'conn> {
    handle: StatementHandle,
    _conn: PhantomData<&'conn Connection>,
}

impl<'conn> Statement<'conn> {
    /// Prepares `sql` against `conn` and binds `params` from position 1.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if compilation fails, or the first
    /// rejected bind.
    pub fn new(conn: &'conn Connection, sql: &str, params: impl Params<'conn>) -> DbResult<Self> {
        let mut statement = Self::default();
        statement.prepare(conn, sql, params)?;
        Ok(statement)
    }

    /// Same as [`new`](Self::new) for UTF-16 SQL text.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn new_wide(
        conn: &'conn Connection,
        sql: &[u16],
        params: impl Params<'conn>,
    ) -> DbResult<Self> {
        let mut statement = Self::default();
        statement.prepare_wide(conn, sql, params)?;
        Ok(statement)
    }

    /// Compiles `sql` into this unprepared statement, then binds `params`.
    ///
    /// `conn` must be open and `self` must not be prepared yet. On a compile
    /// failure the statement stays unprepared.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if compilation fails, or the first
    /// rejected bind.
    pub fn prepare(
        &mut self,
        conn: &'conn Connection,
        sql: &str,
        params: impl Params<'conn>,
    ) -> DbResult<()> {
        debug_assert!(conn.is_valid(), "prepare on a closed connection");
        if ffi::prepare(conn.raw(), sql, &mut self.handle) != ffi::SQLITE_OK {
            self.handle.clear();
            return Err(conn.last_error());
        }
        self.bind_all(params)
    }

    /// Same as [`prepare`](Self::prepare) for UTF-16 SQL text.
    ///
    /// # Errors
    ///
    /// See [`prepare`](Self::prepare).
    pub fn prepare_wide(
        &mut self,
        conn: &'conn Connection,
        sql: &[u16],
        params: impl Params<'conn>,
    ) -> DbResult<()> {
        debug_assert!(conn.is_valid(), "prepare on a closed connection");
        if ffi::prepare16(conn.raw(), sql, &mut self.handle) != ffi::SQLITE_OK {
            self.handle.clear();
            return Err(conn.last_error());
        }
        self.bind_all(params)
    }

    /// Returns `true` once the statement holds a compiled program.
    ///
    /// SQL made only of whitespace or comments compiles to nothing and leaves
    /// the statement unprepared; stepping it reports completion at once.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// The SQL text the statement was prepared from.
    pub fn sql(&self) -> Option<&str> {
        ffi::sql(&self.handle)
    }

    /// Number of parameters the SQL declares.
    pub fn parameter_count(&self) -> usize {
        usize::try_from(ffi::bind_parameter_count(&self.handle)).unwrap_or(0)
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Binds one value at the 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind<T: ToParam<'conn> + ?Sized>(&mut self, index: usize, value: &T) -> DbResult<()> {
        value.bind_to(self, index)
    }

    /// Binds `params` starting at position 1.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first rejected bind.
    pub fn bind_all(&mut self, params: impl Params<'conn>) -> DbResult<()> {
        params.bind_params(self)
    }

    /// Binds a 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_int(&mut self, index: usize, value: i32) -> DbResult<()> {
        let rc = ffi::bind_int(&self.handle, ffi::c_index(index), value);
        self.check(rc)
    }

    /// Binds a 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_int64(&mut self, index: usize, value: i64) -> DbResult<()> {
        let rc = ffi::bind_int64(&self.handle, ffi::c_index(index), value);
        self.check(rc)
    }

    /// Binds a float.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_double(&mut self, index: usize, value: f64) -> DbResult<()> {
        let rc = ffi::bind_double(&self.handle, ffi::c_index(index), value);
        self.check(rc)
    }

    /// Binds SQL NULL.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_null(&mut self, index: usize) -> DbResult<()> {
        let rc = ffi::bind_null(&self.handle, ffi::c_index(index));
        self.check(rc)
    }

    /// Binds UTF-8 text; the engine copies it during the call.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_text(&mut self, index: usize, value: &str) -> DbResult<()> {
        let rc = ffi::bind_text(&self.handle, ffi::c_index(index), value, BindMode::Copied);
        self.check(rc)
    }

    /// Binds UTF-8 text without copying; the caller's buffer must live as
    /// long as the connection borrow.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_borrowed_text(&mut self, index: usize, value: &'conn str) -> DbResult<()> {
        let rc = ffi::bind_text(&self.handle, ffi::c_index(index), value, BindMode::Retained);
        self.check(rc)
    }

    /// Binds UTF-16 text; the engine copies it during the call.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_wide_text(&mut self, index: usize, value: &[u16]) -> DbResult<()> {
        let rc = ffi::bind_text16(&self.handle, ffi::c_index(index), value, BindMode::Copied);
        self.check(rc)
    }

    /// Binds UTF-16 text without copying.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_borrowed_wide_text(&mut self, index: usize, value: &'conn [u16]) -> DbResult<()> {
        let rc = ffi::bind_text16(&self.handle, ffi::c_index(index), value, BindMode::Retained);
        self.check(rc)
    }

    /// Binds a blob; the engine copies it during the call.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_blob(&mut self, index: usize, value: &[u8]) -> DbResult<()> {
        let rc = ffi::bind_blob(&self.handle, ffi::c_index(index), value, BindMode::Copied);
        self.check(rc)
    }

    /// Binds a blob without copying.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    pub fn bind_borrowed_blob(&mut self, index: usize, value: &'conn [u8]) -> DbResult<()> {
        let rc = ffi::bind_blob(&self.handle, ffi::c_index(index), value, BindMode::Retained);
        self.check(rc)
    }

    /// Sets every parameter back to NULL.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error on failure.
    pub fn clear_bindings(&mut self) -> DbResult<()> {
        let rc = ffi::clear_bindings(&self.handle);
        self.check(rc)
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Advances to the next result row.
    ///
    /// Returns `true` while a row is available and `false` once the
    /// statement has run to completion. An empty program is complete before
    /// its first step.
    ///
    /// # Errors
    ///
    /// Any other engine status is returned as the owning connection's error.
    pub fn step(&mut self) -> DbResult<bool> {
        if !self.is_valid() {
            return Ok(false);
        }
        match ffi::step(&self.handle) {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            rc => Err(self.error(rc)),
        }
    }

    /// Runs a statement that produces no rows (DDL, DML).
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn execute(&mut self) -> DbResult<()> {
        let row = self.step()?;
        debug_assert!(!row, "execute on a statement that produced a row");
        Ok(())
    }

    /// Rewinds to before the first step and binds `params` from position 1.
    ///
    /// The statement is not re-prepared.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the rewind or a bind fails.
    pub fn reset(&mut self, params: impl Params<'conn>) -> DbResult<()> {
        let rc = ffi::reset(&self.handle);
        self.check(rc)?;
        self.bind_all(params)
    }

    /// Starts a single-pass row sequence, performing the first step.
    ///
    /// # Errors
    ///
    /// Returns the first step's error.
    pub fn rows(&mut self) -> DbResult<Rows<'_, 'conn>> {
        Rows::new(self)
    }

    /// Lazily maps every row through `mapper`.
    ///
    /// # Errors
    ///
    /// Returns the first step's error; later failures surface as items.
    pub fn query_map<T, F>(&mut self, mapper: F) -> DbResult<MappedRows<'_, 'conn, F>>
    where
        F: FnMut(&Row<'_>) -> DbResult<T>,
    {
        Ok(self.rows()?.mapped(mapper))
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    pub(crate) fn raw(&self) -> &StatementHandle {
        &self.handle
    }

    fn check(&self, rc: c_int) -> DbResult<()> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.error(rc))
        }
    }

    fn error(&self, rc: c_int) -> DbError {
        ffi::statement_error(&self.handle, rc)
    }
}

impl Default for Statement<'_> {
    fn default() -> Self {
        Self {
            handle: StatementHandle::default(),
            _conn: PhantomData,
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.handle.clear();
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql())
            .finish_non_exhaustive()
    }
}

/// Prepares and runs a statement that produces no rows.
///
/// # Errors
///
/// Returns the first prepare, bind or step error.
pub fn execute<'conn>(
    conn: &'conn Connection,
    sql: &str,
    params: impl Params<'conn>,
) -> DbResult<()> {
    Statement::new(conn, sql, params)?.execute()
}
