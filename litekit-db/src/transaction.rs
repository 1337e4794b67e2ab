//! Safe wrapper around a `SQLite` transaction.

use std::ops::Deref;

use super::connection::Connection;
use super::error::DbResult;

/// Transaction locking behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionBehavior {
    /// `BEGIN DEFERRED` (the default).
    Deferred,
    /// `BEGIN IMMEDIATE` -- acquires a RESERVED lock immediately.
    Immediate,
}

/// An open database transaction.
///
/// Derefs to the [`Connection`], so statements are prepared through it as
/// usual. Rolls back on drop unless explicitly committed.
#[derive(Debug)]
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    /// Begins a new transaction on `conn`.
    ///
    /// # Errors
    ///
    /// Returns the `BEGIN` error.
    pub fn begin(conn: &'conn Connection, behavior: TransactionBehavior) -> DbResult<Self> {
        let sql = match behavior {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
        };
        conn.execute_batch(sql)?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the `COMMIT` error; the transaction is then rolled back on drop.
    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the `ROLLBACK` error.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("rollback on drop failed: {e}");
            }
        }
    }
}
