//! Raw FFI to `SQLite`, provided by the bundled `libsqlite3-sys` build.
//!
//! This is the **only** file that contains `unsafe` code or C types. Every
//! function here takes one of the typed handles below instead of a bare
//! pointer, so a value reaching the engine is always either the sentinel or
//! a live resource owned by that handle.
//!
//! Calls that the engine does not guard against a null handle are guarded
//! here and report `SQLITE_MISUSE` (or a neutral value) instead.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;
use std::time::Duration;

use libsqlite3_sys as sys;

use crate::error::DbError;
use crate::handle::{Handle, HandlePolicy};

// ── SQLite constants ────────────────────────────────────────────────────

pub(crate) use sys::{
    SQLITE_BLOB, SQLITE_DONE, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_MISUSE,
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE, SQLITE_ROW,
    SQLITE_TEXT,
};

// ── Handle policies ─────────────────────────────────────────────────────

/// Policy for `sqlite3*` connection handles.
pub struct ConnectionPolicy;

impl HandlePolicy for ConnectionPolicy {
    type Raw = *mut sys::sqlite3;

    fn invalid() -> Self::Raw {
        ptr::null_mut()
    }

    fn close(value: Self::Raw) {
        // SAFETY: `Handle` only releases values it owns, exactly once.
        // `sqlite3_close_v2` defers the close until statements and backup
        // sessions still attached to the connection are finished.
        let rc = unsafe { sys::sqlite3_close_v2(value) };
        report_release("sqlite3_close_v2", rc);
    }
}

/// Policy for `sqlite3_stmt*` prepared-statement handles.
pub struct StatementPolicy;

impl HandlePolicy for StatementPolicy {
    type Raw = *mut sys::sqlite3_stmt;

    fn invalid() -> Self::Raw {
        ptr::null_mut()
    }

    fn close(value: Self::Raw) {
        // SAFETY: `Handle` only releases values it owns, exactly once.
        // `sqlite3_finalize` repeats the last step error, which was already
        // reported to whoever stepped the statement.
        unsafe { sys::sqlite3_finalize(value) };
    }
}

/// Policy for `sqlite3_backup*` backup-session handles.
pub struct BackupPolicy;

impl HandlePolicy for BackupPolicy {
    type Raw = *mut sys::sqlite3_backup;

    fn invalid() -> Self::Raw {
        ptr::null_mut()
    }

    fn close(value: Self::Raw) {
        // SAFETY: `Handle` only releases values it owns, exactly once. The
        // finish code mirrors the last step result and lands in the
        // destination connection's error state.
        unsafe { sys::sqlite3_backup_finish(value) };
    }
}

pub(crate) type DbHandle = Handle<ConnectionPolicy>;
pub(crate) type StatementHandle = Handle<StatementPolicy>;
pub(crate) type BackupHandle = Handle<BackupPolicy>;

/// Release must never fail outward. Debug builds still trip on it, unless
/// the thread is already unwinding.
fn report_release(what: &str, rc: c_int) {
    if rc != SQLITE_OK {
        log::warn!("{what} failed with code {rc}");
        debug_assert!(std::thread::panicking(), "{what} failed with code {rc}");
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Builds an error from a result code alone, for failures that never
/// reached a connection.
pub(crate) fn error_from_code(code: c_int) -> DbError {
    // SAFETY: `sqlite3_errstr` returns a static string for any code.
    let message = unsafe { lossy(sys::sqlite3_errstr(code)) };
    DbError::new(code, message)
}

/// Reads the connection's current error code and message.
pub(crate) fn last_error(db: &DbHandle) -> DbError {
    error_from_db(db.get())
}

/// Reads the error of the connection that owns `stmt`.
///
/// Falls back to the bare code when the statement has no connection.
pub(crate) fn statement_error(stmt: &StatementHandle, code: c_int) -> DbError {
    // SAFETY: `sqlite3_db_handle` accepts a null statement.
    let db = unsafe { sys::sqlite3_db_handle(stmt.get()) };
    if db.is_null() {
        error_from_code(code)
    } else {
        error_from_db(db)
    }
}

fn error_from_db(db: *mut sys::sqlite3) -> DbError {
    // SAFETY: both calls accept a null connection and report
    // `SQLITE_NOMEM` for it.
    unsafe {
        DbError::new(
            sys::sqlite3_extended_errcode(db),
            lossy(sys::sqlite3_errmsg(db)),
        )
    }
}

/// Copies a C string owned by the engine.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        "unknown error".to_string()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Converts text for APIs that take NUL-terminated strings.
pub(crate) fn c_string(text: &str) -> Result<CString, DbError> {
    CString::new(text)
        .map_err(|e| DbError::new(SQLITE_MISUSE, format!("nul in text: {e}")))
}

/// Clamps a byte length to `c_int`. The engine rejects anything above its
/// length limit (far below `c_int::MAX`) with `SQLITE_TOOBIG`.
fn c_len(bytes: usize) -> c_int {
    c_int::try_from(bytes).unwrap_or(c_int::MAX)
}

/// Same as [`c_len`] for UTF-16 text, kept even.
fn c_len16(units: usize) -> c_int {
    units
        .checked_mul(2)
        .and_then(|bytes| c_int::try_from(bytes).ok())
        .unwrap_or(c_int::MAX - 1)
}

/// Column and parameter positions beyond `c_int` are out of range anyway.
pub(crate) fn c_index(index: usize) -> c_int {
    c_int::try_from(index).unwrap_or(c_int::MAX)
}

// ── Connection ──────────────────────────────────────────────────────────

/// `sqlite3_open` into an empty handle.
pub(crate) fn open(filename: &CStr, db: &mut DbHandle) -> c_int {
    // SAFETY: `filename` is NUL-terminated; the slot belongs to `db`.
    unsafe { sys::sqlite3_open(filename.as_ptr(), db.set()) }
}

/// `sqlite3_open16` into an empty handle. `filename` must end in a NUL unit.
pub(crate) fn open16(filename: &[u16], db: &mut DbHandle) -> c_int {
    if filename.last() != Some(&0) {
        return SQLITE_MISUSE;
    }
    // SAFETY: `filename` is NUL-terminated UTF-16; the slot belongs to `db`.
    unsafe { sys::sqlite3_open16(filename.as_ptr().cast(), db.set()) }
}

/// `sqlite3_open_v2` with explicit flags into an empty handle.
pub(crate) fn open_v2(filename: &CStr, flags: c_int, db: &mut DbHandle) -> c_int {
    // SAFETY: `filename` is NUL-terminated, the default VFS is requested.
    unsafe { sys::sqlite3_open_v2(filename.as_ptr(), db.set(), flags, ptr::null()) }
}

/// Runs one or more statements, discarding any rows.
pub(crate) fn exec(db: &DbHandle, sql: &CStr) -> c_int {
    // SAFETY: `sqlite3_exec` rejects a null connection with SQLITE_MISUSE;
    // no callback and no error-message buffer are requested.
    unsafe {
        sys::sqlite3_exec(
            db.get(),
            sql.as_ptr(),
            None,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    }
}

pub(crate) fn last_insert_rowid(db: &DbHandle) -> i64 {
    if !db.is_valid() {
        return 0;
    }
    // SAFETY: the connection is live.
    unsafe { sys::sqlite3_last_insert_rowid(db.get()) }
}

pub(crate) fn changes(db: &DbHandle) -> i64 {
    if !db.is_valid() {
        return 0;
    }
    // SAFETY: the connection is live.
    i64::from(unsafe { sys::sqlite3_changes(db.get()) })
}

// ── Profiling ───────────────────────────────────────────────────────────

/// Callback receiving each finished statement's SQL and run time.
pub(crate) type ProfileCallback = Box<dyn FnMut(&str, Duration)>;

/// Heap-pinned profile callback whose address is handed to the engine.
///
/// Must outlive its registration: unregister (or close the connection)
/// before dropping it.
pub(crate) struct Profiler {
    callback: *mut ProfileCallback,
}

impl Profiler {
    pub(crate) fn new(callback: ProfileCallback) -> Self {
        Self {
            callback: Box::into_raw(Box::new(callback)),
        }
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        // SAFETY: created by `Box::into_raw` in `new` and freed only here.
        drop(unsafe { Box::from_raw(self.callback) });
    }
}

/// Installs (or with `None`, removes) the profile callback.
pub(crate) fn set_profile(db: &DbHandle, profiler: Option<&Profiler>) -> c_int {
    if !db.is_valid() {
        return SQLITE_MISUSE;
    }
    // SAFETY: the connection is live; the context pointer stays valid
    // until the callback is replaced, removed or the connection closes.
    unsafe {
        match profiler {
            Some(profiler) => sys::sqlite3_trace_v2(
                db.get(),
                sys::SQLITE_TRACE_PROFILE as c_uint,
                Some(profile_trampoline),
                profiler.callback.cast(),
            ),
            None => sys::sqlite3_trace_v2(db.get(), 0, None, ptr::null_mut()),
        }
    }
}

unsafe extern "C" fn profile_trampoline(
    event: c_uint,
    context: *mut c_void,
    statement: *mut c_void,
    elapsed: *mut c_void,
) -> c_int {
    if event == sys::SQLITE_TRACE_PROFILE as c_uint && !context.is_null() {
        // SAFETY: for PROFILE events P is the statement and X points to the
        // elapsed nanoseconds; the context is the `Profiler` registered above.
        let callback = &mut *context.cast::<ProfileCallback>();
        let sql = lossy(sys::sqlite3_sql(statement.cast()));
        let nanos = u64::try_from(*elapsed.cast::<i64>()).unwrap_or(0);
        callback(&sql, Duration::from_nanos(nanos));
    }
    0
}

// ── Statements ──────────────────────────────────────────────────────────

/// Compiles UTF-8 `sql` into an empty statement handle.
pub(crate) fn prepare(db: &DbHandle, sql: &str, stmt: &mut StatementHandle) -> c_int {
    // SAFETY: the engine rejects a null connection; `sql` is read for at
    // most its byte length; the slot belongs to `stmt`.
    unsafe {
        sys::sqlite3_prepare_v2(
            db.get(),
            sql.as_ptr().cast(),
            c_len(sql.len()),
            stmt.set(),
            ptr::null_mut(),
        )
    }
}

/// Compiles UTF-16 `sql` into an empty statement handle.
pub(crate) fn prepare16(db: &DbHandle, sql: &[u16], stmt: &mut StatementHandle) -> c_int {
    // SAFETY: as for `prepare`, with the length given in bytes.
    unsafe {
        sys::sqlite3_prepare16_v2(
            db.get(),
            sql.as_ptr().cast(),
            c_len16(sql.len()),
            stmt.set(),
            ptr::null_mut(),
        )
    }
}

pub(crate) fn step(stmt: &StatementHandle) -> c_int {
    // SAFETY: `sqlite3_step` rejects a null statement with SQLITE_MISUSE.
    unsafe { sys::sqlite3_step(stmt.get()) }
}

pub(crate) fn reset(stmt: &StatementHandle) -> c_int {
    // SAFETY: `sqlite3_reset` is a no-op on a null statement.
    unsafe { sys::sqlite3_reset(stmt.get()) }
}

pub(crate) fn clear_bindings(stmt: &StatementHandle) -> c_int {
    if !stmt.is_valid() {
        return SQLITE_MISUSE;
    }
    // SAFETY: the statement is live.
    unsafe { sys::sqlite3_clear_bindings(stmt.get()) }
}

pub(crate) fn bind_parameter_count(stmt: &StatementHandle) -> c_int {
    if !stmt.is_valid() {
        return 0;
    }
    // SAFETY: the statement is live.
    unsafe { sys::sqlite3_bind_parameter_count(stmt.get()) }
}

/// Original SQL text of the statement.
pub(crate) fn sql(stmt: &StatementHandle) -> Option<&str> {
    // SAFETY: `sqlite3_sql` accepts null and the text lives as long as the
    // statement.
    let ptr = unsafe { sys::sqlite3_sql(stmt.get()) };
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Who owns bound text or blob data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// The engine copies the data before the bind call returns.
    Copied,
    /// The caller keeps the data alive until the statement is rebound,
    /// reset with new values or finalized.
    Retained,
}

impl BindMode {
    fn destructor(self) -> sys::sqlite3_destructor_type {
        match self {
            Self::Copied => sys::SQLITE_TRANSIENT(),
            Self::Retained => sys::SQLITE_STATIC(),
        }
    }
}

// Binding to a null statement is rejected by the engine with SQLITE_MISUSE.

pub(crate) fn bind_int(stmt: &StatementHandle, index: c_int, value: i32) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_bind_int(stmt.get(), index, value) }
}

pub(crate) fn bind_int64(stmt: &StatementHandle, index: c_int, value: i64) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_bind_int64(stmt.get(), index, value) }
}

pub(crate) fn bind_double(stmt: &StatementHandle, index: c_int, value: f64) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_bind_double(stmt.get(), index, value) }
}

pub(crate) fn bind_null(stmt: &StatementHandle, index: c_int) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_bind_null(stmt.get(), index) }
}

/// Binds UTF-8 text. With [`BindMode::Retained`] the caller guarantees that
/// `value` outlives every use of the statement.
pub(crate) fn bind_text(
    stmt: &StatementHandle,
    index: c_int,
    value: &str,
    mode: BindMode,
) -> c_int {
    // SAFETY: the engine reads at most `value.len()` bytes; lifetime per `mode`.
    unsafe {
        sys::sqlite3_bind_text(
            stmt.get(),
            index,
            value.as_ptr().cast(),
            c_len(value.len()),
            mode.destructor(),
        )
    }
}

/// Binds UTF-16 text, same lifetime contract as [`bind_text`].
pub(crate) fn bind_text16(
    stmt: &StatementHandle,
    index: c_int,
    value: &[u16],
    mode: BindMode,
) -> c_int {
    // SAFETY: the engine reads at most the given byte length; lifetime per `mode`.
    unsafe {
        sys::sqlite3_bind_text16(
            stmt.get(),
            index,
            value.as_ptr().cast(),
            c_len16(value.len()),
            mode.destructor(),
        )
    }
}

/// Binds a blob, same lifetime contract as [`bind_text`].
pub(crate) fn bind_blob(
    stmt: &StatementHandle,
    index: c_int,
    value: &[u8],
    mode: BindMode,
) -> c_int {
    // SAFETY: the engine reads at most `value.len()` bytes; lifetime per `mode`.
    unsafe {
        sys::sqlite3_bind_blob(
            stmt.get(),
            index,
            value.as_ptr().cast(),
            c_len(value.len()),
            mode.destructor(),
        )
    }
}

// ── Columns ─────────────────────────────────────────────────────────────
//
// Column readers accept a null statement and out-of-range indexes, for
// which the engine yields a NULL value.

pub(crate) fn column_count(stmt: &StatementHandle) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_column_count(stmt.get()) }
}

pub(crate) fn column_name(stmt: &StatementHandle, col: c_int) -> Option<&str> {
    if col < 0 || col >= column_count(stmt) {
        return None;
    }
    // SAFETY: the statement is live and `col` in range; the name lives until
    // the statement is finalized or stepped into a re-prepare.
    let ptr = unsafe { sys::sqlite3_column_name(stmt.get(), col) };
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

pub(crate) fn column_type(stmt: &StatementHandle, col: c_int) -> c_int {
    // SAFETY: see above.
    unsafe { sys::sqlite3_column_type(stmt.get(), col) }
}

pub(crate) fn column_int(stmt: &StatementHandle, col: c_int) -> i32 {
    // SAFETY: see above.
    unsafe { sys::sqlite3_column_int(stmt.get(), col) }
}

pub(crate) fn column_int64(stmt: &StatementHandle, col: c_int) -> i64 {
    // SAFETY: see above.
    unsafe { sys::sqlite3_column_int64(stmt.get(), col) }
}

pub(crate) fn column_double(stmt: &StatementHandle, col: c_int) -> f64 {
    // SAFETY: see above.
    unsafe { sys::sqlite3_column_double(stmt.get(), col) }
}

/// Raw bytes of a column: the blob for BLOB values, UTF-8 text otherwise.
///
/// A column is only ever read through one of the two representations, so
/// no later call converts the value and invalidates an earlier slice.
pub(crate) fn column_bytes(stmt: &StatementHandle, col: c_int) -> &[u8] {
    let raw = stmt.get();
    // SAFETY: the buffer belongs to the current row and stays valid until
    // the statement is stepped, reset or finalized, all of which need a
    // unique borrow of the owner of `stmt`.
    unsafe {
        let data: *const u8 = if sys::sqlite3_column_type(raw, col) == SQLITE_BLOB {
            sys::sqlite3_column_blob(raw, col).cast()
        } else {
            sys::sqlite3_column_text(raw, col).cast()
        };
        let len = usize::try_from(sys::sqlite3_column_bytes(raw, col)).unwrap_or(0);
        if data.is_null() || len == 0 {
            return &[];
        }
        std::slice::from_raw_parts(data, len)
    }
}

// ── Backup ──────────────────────────────────────────────────────────────

/// Starts a backup session; the returned handle is invalid on failure.
pub(crate) fn backup_init(
    destination: &DbHandle,
    destination_name: &CStr,
    source: &DbHandle,
    source_name: &CStr,
) -> BackupHandle {
    if !destination.is_valid() || !source.is_valid() {
        return BackupHandle::default();
    }
    // SAFETY: both connections are live and both names NUL-terminated.
    BackupHandle::new(unsafe {
        sys::sqlite3_backup_init(
            destination.get(),
            destination_name.as_ptr(),
            source.get(),
            source_name.as_ptr(),
        )
    })
}

pub(crate) fn backup_step(backup: &BackupHandle, pages: c_int) -> c_int {
    if !backup.is_valid() {
        return SQLITE_MISUSE;
    }
    // SAFETY: the session is live.
    unsafe { sys::sqlite3_backup_step(backup.get(), pages) }
}

pub(crate) fn backup_remaining(backup: &BackupHandle) -> c_int {
    if !backup.is_valid() {
        return 0;
    }
    // SAFETY: the session is live.
    unsafe { sys::sqlite3_backup_remaining(backup.get()) }
}

pub(crate) fn backup_pagecount(backup: &BackupHandle) -> c_int {
    if !backup.is_valid() {
        return 0;
    }
    // SAFETY: the session is live.
    unsafe { sys::sqlite3_backup_pagecount(backup.get()) }
}
