//! Incremental online backup from one connection into another.

use super::connection::Connection;
use super::error::DbResult;
use super::ffi::{self, BackupHandle};

/// A backup session copying one database into another in page batches.
///
/// Holds the destination for error reporting only; both connections must
/// outlive the session. Finished when dropped.
///
/// ```compile_fail
/// use litekit_db::{Backup, Connection};
///
/// let destination = Connection::memory().expect("open");
/// let backup;
/// {
///     let source = Connection::memory().expect("open");
///     backup = Backup::new(&destination, &source).expect("init");
/// }
/// ```
#[derive(Debug)]
pub struct Backup<'a> {
    handle: BackupHandle,
    destination: &'a Connection,
    source: &'a Connection,
}

impl<'a> Backup<'a> {
    /// Copies from `source`'s `main` database into `destination`'s `main`.
    ///
    /// # Errors
    ///
    /// Returns the destination's error if the session cannot start.
    pub fn new(destination: &'a Connection, source: &'a Connection) -> DbResult<Self> {
        Self::with_names(destination, source, "main", "main")
    }

    /// Copies the attached database `source_name` of `source` into the
    /// attached database `destination_name` of `destination`.
    ///
    /// # Errors
    ///
    /// Returns the destination's error if the session cannot start.
    pub fn with_names(
        destination: &'a Connection,
        source: &'a Connection,
        destination_name: &str,
        source_name: &str,
    ) -> DbResult<Self> {
        debug_assert!(
            destination.is_valid() && source.is_valid(),
            "backup between closed connections"
        );
        if !destination.is_valid() || !source.is_valid() {
            return Err(ffi::error_from_code(ffi::SQLITE_MISUSE));
        }
        let destination_name = ffi::c_string(destination_name)?;
        let source_name = ffi::c_string(source_name)?;
        let handle = ffi::backup_init(
            destination.raw(),
            &destination_name,
            source.raw(),
            &source_name,
        );
        if !handle.is_valid() {
            return Err(destination.last_error());
        }
        Ok(Self {
            handle,
            destination,
            source,
        })
    }

    /// Copies up to `pages` pages; a negative count copies everything left.
    ///
    /// Returns `true` while more pages remain and `false` once the copy is
    /// complete.
    ///
    /// # Errors
    ///
    /// Any other status finishes the session at once and returns the
    /// destination's error. The session cannot be stepped again.
    pub fn step(&mut self, pages: i32) -> DbResult<bool> {
        debug_assert!(self.handle.is_valid(), "step on a failed backup");
        match ffi::backup_step(&self.handle, pages) {
            ffi::SQLITE_OK => Ok(true),
            ffi::SQLITE_DONE => {
                log::debug!("backup complete, {} pages", self.page_count());
                Ok(false)
            }
            ffi::SQLITE_MISUSE if !self.handle.is_valid() => {
                Err(ffi::error_from_code(ffi::SQLITE_MISUSE))
            }
            _ => {
                self.handle.clear();
                Err(self.destination.last_error())
            }
        }
    }

    /// Copies every remaining page in one step.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn step_all(&mut self) -> DbResult<bool> {
        self.step(-1)
    }

    /// Pages still to copy as of the last step.
    pub fn remaining(&self) -> usize {
        usize::try_from(ffi::backup_remaining(&self.handle)).unwrap_or(0)
    }

    /// Total pages in the source as of the last step.
    pub fn page_count(&self) -> usize {
        usize::try_from(ffi::backup_pagecount(&self.handle)).unwrap_or(0)
    }

    /// Returns `true` until a step fails.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// The connection being copied from.
    pub const fn source(&self) -> &'a Connection {
        self.source
    }
}

impl Drop for Backup<'_> {
    fn drop(&mut self) {
        self.handle.clear();
    }
}
