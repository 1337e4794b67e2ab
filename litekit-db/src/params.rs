//! Parameter binding traits.
//!
//! [`ToParam`] binds one value at a position; [`Params`] binds a whole
//! heterogeneous list starting at position 1, where the position of each
//! value is its 1-based place in the list.
//!
//! Text and blobs bind in one of two explicit modes. Plain `&str`,
//! `String`, `&[u16]` and `&[u8]` are copied by the engine during the bind
//! call. Wrapping a borrow in [`Borrowed`] hands the engine the caller's
//! buffer instead; the `'conn` bound makes the compiler check that the
//! buffer outlives the statement.

use super::error::DbResult;
use super::statement::Statement;
use super::value::Value;

/// A value that can be bound to one statement parameter.
pub trait ToParam<'conn> {
    /// Binds `self` at the 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns the owning connection's error if the engine rejects the bind.
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()>;
}

/// A list of values bound from position 1 onwards.
pub trait Params<'conn> {
    /// Binds every value in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first rejected bind.
    fn bind_params(self, statement: &mut Statement<'conn>) -> DbResult<()>;
}

/// Text or blob whose buffer the caller keeps alive for the statement's
/// whole use, so the engine does not copy it.
#[derive(Debug, Clone, Copy)]
pub struct Borrowed<'conn, T: ?Sized>(pub &'conn T);

/// SQL NULL as a parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

impl<'conn, T: ToParam<'conn> + ?Sized> ToParam<'conn> for &T {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        (**self).bind_to(statement, index)
    }
}

impl<'conn, T: ToParam<'conn>> ToParam<'conn> for Option<T> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        match self {
            Some(value) => value.bind_to(statement, index),
            None => statement.bind_null(index),
        }
    }
}

impl<'conn> ToParam<'conn> for Null {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_null(index)
    }
}

impl<'conn> ToParam<'conn> for i32 {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_int(index, *self)
    }
}

impl<'conn> ToParam<'conn> for i64 {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_int64(index, *self)
    }
}

impl<'conn> ToParam<'conn> for f64 {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_double(index, *self)
    }
}

impl<'conn> ToParam<'conn> for str {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_text(index, self)
    }
}

impl<'conn> ToParam<'conn> for String {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_text(index, self)
    }
}

impl<'conn> ToParam<'conn> for [u16] {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_wide_text(index, self)
    }
}

impl<'conn> ToParam<'conn> for Vec<u16> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_wide_text(index, self)
    }
}

impl<'conn> ToParam<'conn> for [u8] {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_blob(index, self)
    }
}

impl<'conn> ToParam<'conn> for Vec<u8> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_blob(index, self)
    }
}

impl<'conn> ToParam<'conn> for Borrowed<'conn, str> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_borrowed_text(index, self.0)
    }
}

impl<'conn> ToParam<'conn> for Borrowed<'conn, [u16]> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_borrowed_wide_text(index, self.0)
    }
}

impl<'conn> ToParam<'conn> for Borrowed<'conn, [u8]> {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        statement.bind_borrowed_blob(index, self.0)
    }
}

impl<'conn> ToParam<'conn> for Value {
    fn bind_to(&self, statement: &mut Statement<'conn>, index: usize) -> DbResult<()> {
        match self {
            Self::Integer(v) => statement.bind_int64(index, *v),
            Self::Float(v) => statement.bind_double(index, *v),
            Self::Blob(v) => statement.bind_blob(index, v),
            Self::Text(v) => statement.bind_text(index, v),
            Self::Null => statement.bind_null(index),
        }
    }
}

impl<'conn> Params<'conn> for () {
    fn bind_params(self, _statement: &mut Statement<'conn>) -> DbResult<()> {
        Ok(())
    }
}

impl<'conn, T: ToParam<'conn>> Params<'conn> for &[T] {
    fn bind_params(self, statement: &mut Statement<'conn>) -> DbResult<()> {
        for (i, value) in self.iter().enumerate() {
            value.bind_to(statement, i + 1)?;
        }
        Ok(())
    }
}

impl<'conn, T: ToParam<'conn>, const N: usize> Params<'conn> for [T; N] {
    fn bind_params(self, statement: &mut Statement<'conn>) -> DbResult<()> {
        self.as_slice().bind_params(statement)
    }
}

impl<'conn, T: ToParam<'conn>> Params<'conn> for Vec<T> {
    fn bind_params(self, statement: &mut Statement<'conn>) -> DbResult<()> {
        self.as_slice().bind_params(statement)
    }
}

macro_rules! tuple_params {
    ($($name:ident : $idx:tt),+) => {
        impl<'conn, $($name: ToParam<'conn>),+> Params<'conn> for ($($name,)+) {
            fn bind_params(self, statement: &mut Statement<'conn>) -> DbResult<()> {
                $( self.$idx.bind_to(statement, $idx + 1)?; )+
                Ok(())
            }
        }
    };
}

tuple_params!(A: 0);
tuple_params!(A: 0, B: 1);
tuple_params!(A: 0, B: 1, C: 2);
tuple_params!(A: 0, B: 1, C: 2, D: 3);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
