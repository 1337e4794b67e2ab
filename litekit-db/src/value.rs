//! Parameter and column value types for the safe `SQLite` wrapper.

use std::os::raw::c_int;

use super::ffi;

/// Storage class of a column value, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit IEEE float.
    Float,
    /// Binary blob.
    Blob,
    /// SQL NULL.
    Null,
    /// Text.
    Text,
}

impl ValueKind {
    pub(crate) const fn from_code(code: c_int) -> Self {
        match code {
            ffi::SQLITE_INTEGER => Self::Integer,
            ffi::SQLITE_FLOAT => Self::Float,
            ffi::SQLITE_BLOB => Self::Blob,
            ffi::SQLITE_TEXT => Self::Text,
            _ => Self::Null,
        }
    }
}

/// A value that can be bound to a prepared statement parameter or read from
/// a result column.
///
/// Text and blobs are owned, so binding a `Value` always lets the engine
/// copy the data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE float.
    Float(f64),
    /// Binary blob.
    Blob(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// SQL NULL.
    Null,
}

impl Value {
    /// Storage class of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Blob(_) => ValueKind::Blob,
            Self::Text(_) => ValueKind::Text,
            Self::Null => ValueKind::Null,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Convenience macro for building dynamic parameter lists.
///
/// Usage: `params![1_i64, blob.as_slice(), "text"]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}
