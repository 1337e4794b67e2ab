//! Result rows: the column reader shared by [`Row`] and [`Statement`], and
//! the single-pass row sequence.

use std::borrow::Cow;

use super::error::DbResult;
use super::ffi::{self, StatementHandle};
use super::statement::Statement;
use super::value::{Value, ValueKind};

mod sealed {
    use crate::ffi::StatementHandle;

    pub trait RowSource {
        fn statement_handle(&self) -> &StatementHandle;
    }
}

/// Typed column accessors over the current result row.
///
/// Columns are 0-based. Reads never fail: a missing column, an unprepared
/// statement or a statement not positioned on a row all read as NULL.
/// Borrowed results live only until the statement advances, which the
/// borrow checker enforces.
pub trait Reader: sealed::RowSource {
    /// Column value as a 32-bit integer.
    fn get_int(&self, column: usize) -> i32 {
        ffi::column_int(self.statement_handle(), ffi::c_index(column))
    }

    /// Column value as a 64-bit integer.
    fn get_int64(&self, column: usize) -> i64 {
        ffi::column_int64(self.statement_handle(), ffi::c_index(column))
    }

    /// Column value as a float.
    fn get_double(&self, column: usize) -> f64 {
        ffi::column_double(self.statement_handle(), ffi::c_index(column))
    }

    /// Column bytes: the blob for BLOB values, UTF-8 text otherwise.
    fn get_bytes(&self, column: usize) -> &[u8] {
        ffi::column_bytes(self.statement_handle(), ffi::c_index(column))
    }

    /// Column value as a blob. Same bytes as [`get_bytes`](Self::get_bytes).
    fn get_blob(&self, column: usize) -> &[u8] {
        self.get_bytes(column)
    }

    /// Column value as UTF-8 text; empty for NULL.
    ///
    /// Borrowed unless the stored bytes are not valid UTF-8.
    fn get_string(&self, column: usize) -> Cow<'_, str> {
        String::from_utf8_lossy(self.get_bytes(column))
    }

    /// Length of the UTF-8 text in bytes.
    fn get_string_length(&self, column: usize) -> usize {
        self.get_bytes(column).len()
    }

    /// Column value as UTF-16 text, re-encoded from the UTF-8 form.
    ///
    /// Stored bytes that are not valid UTF-8 are replaced with U+FFFD first,
    /// so such text may differ from what the engine's own UTF-16 conversion
    /// would produce.
    fn get_wide_string(&self, column: usize) -> Vec<u16> {
        self.get_string(column).encode_utf16().collect()
    }

    /// Length of [`get_wide_string`](Self::get_wide_string) in code units.
    fn get_wide_string_length(&self, column: usize) -> usize {
        self.get_string(column).encode_utf16().count()
    }

    /// Storage class of the column value.
    fn get_type(&self, column: usize) -> ValueKind {
        ValueKind::from_code(ffi::column_type(self.statement_handle(), ffi::c_index(column)))
    }

    /// Returns `true` if the column is SQL NULL.
    fn is_null(&self, column: usize) -> bool {
        self.get_type(column) == ValueKind::Null
    }

    /// Copies the column into an owned [`Value`].
    fn get_value(&self, column: usize) -> Value {
        match self.get_type(column) {
            ValueKind::Integer => Value::Integer(self.get_int64(column)),
            ValueKind::Float => Value::Float(self.get_double(column)),
            ValueKind::Blob => Value::Blob(self.get_bytes(column).to_vec()),
            ValueKind::Text => Value::Text(self.get_string(column).into_owned()),
            ValueKind::Null => Value::Null,
        }
    }

    /// Number of columns in the result.
    fn column_count(&self) -> usize {
        usize::try_from(ffi::column_count(self.statement_handle())).unwrap_or(0)
    }

    /// Name of a result column.
    fn column_name(&self, column: usize) -> Option<&str> {
        ffi::column_name(self.statement_handle(), ffi::c_index(column))
    }
}

/// A non-owning view of the statement's current row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'r> {
    statement: &'r StatementHandle,
}

impl<'r> Row<'r> {
    pub(crate) fn new(statement: &'r Statement<'_>) -> Self {
        Self {
            statement: statement.raw(),
        }
    }
}

impl sealed::RowSource for Row<'_> {
    fn statement_handle(&self) -> &StatementHandle {
        self.statement
    }
}

impl Reader for Row<'_> {}

impl sealed::RowSource for Statement<'_> {
    fn statement_handle(&self) -> &StatementHandle {
        self.raw()
    }
}

impl Reader for Statement<'_> {}

/// Lazy, single-pass sequence of rows driven by [`Statement::step`].
///
/// Construction performs the first step. Once the statement reports
/// completion (or a step fails) the sequence is at its end for good; only
/// [`Statement::reset`] makes the rows available again, through a new
/// sequence.
pub struct Rows<'s, 'conn> {
    statement: Option<&'s mut Statement<'conn>>,
    pending: bool,
}

impl<'s, 'conn> Rows<'s, 'conn> {
    /// Steps `statement` once and starts the sequence.
    ///
    /// # Errors
    ///
    /// Returns the first step's error.
    pub fn new(statement: &'s mut Statement<'conn>) -> DbResult<Self> {
        let pending = statement.step()?;
        Ok(Self {
            statement: pending.then_some(statement),
            pending,
        })
    }

    /// The sequence's end marker.
    #[must_use]
    pub fn end() -> Self {
        Self {
            statement: None,
            pending: false,
        }
    }

    /// Returns `true` once the sequence is exhausted.
    pub fn is_end(&self) -> bool {
        self.statement.is_none()
    }

    /// Yields the next row, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns a failed step's error; the sequence then ends.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> DbResult<Option<Row<'_>>> {
        let Some(statement) = self.statement.take() else {
            return Ok(None);
        };
        if !std::mem::take(&mut self.pending) && !statement.step()? {
            return Ok(None);
        }
        let statement = self.statement.insert(statement);
        Ok(Some(Row::new(statement)))
    }

    /// Adapts the sequence into an [`Iterator`] of mapped rows.
    pub fn mapped<T, F>(self, mapper: F) -> MappedRows<'s, 'conn, F>
    where
        F: FnMut(&Row<'_>) -> DbResult<T>,
    {
        MappedRows { rows: self, mapper }
    }
}

impl PartialEq for Rows<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        let position = |rows: &Self| rows.statement.as_ref().map(|s| s.raw().get());
        position(self) == position(other)
    }
}

impl std::fmt::Debug for Rows<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("end", &self.is_end())
            .finish_non_exhaustive()
    }
}

/// Iterator over rows mapped through a closure; fused after the end.
pub struct MappedRows<'s, 'conn, F> {
    rows: Rows<'s, 'conn>,
    mapper: F,
}

impl<T, F> Iterator for MappedRows<'_, '_, F>
where
    F: FnMut(&Row<'_>) -> DbResult<T>,
{
    type Item = DbResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next() {
            Ok(Some(row)) => Some((self.mapper)(&row)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T, F> std::iter::FusedIterator for MappedRows<'_, '_, F> where
    F: FnMut(&Row<'_>) -> DbResult<T>
{
}
