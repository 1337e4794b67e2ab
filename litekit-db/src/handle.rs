//! Generic, move-only ownership of a single foreign handle value.
//!
//! A [`Handle`] knows nothing about databases. Everything resource-specific
//! (which value means "empty" and how a live value is released) comes from
//! its [`HandlePolicy`]. Connections, statements and backup sessions each
//! supply one policy and share all of the ownership logic below.
//!
//! Ownership moves with the Rust value, so a move never releases anything.
//! The handle is not `Clone`: a foreign value has exactly one owner.

use std::fmt;
use std::marker::PhantomData;

/// Describes the sentinel value and the release operation of one kind of
/// foreign handle.
pub trait HandlePolicy {
    /// The raw foreign handle type (usually a pointer).
    type Raw: Copy + PartialEq + fmt::Debug;

    /// The sentinel value that never refers to a live resource.
    fn invalid() -> Self::Raw;

    /// Releases a live value. Never called with the sentinel.
    ///
    /// Must not panic or report failure to the caller; release errors are
    /// swallowed by the implementation.
    fn close(value: Self::Raw);
}

/// Owner of one foreign handle value, released exactly once.
pub struct Handle<P: HandlePolicy> {
    value: P::Raw,
    _policy: PhantomData<P>,
}

impl<P: HandlePolicy> Handle<P> {
    /// Takes ownership of `value`, which may be the sentinel.
    pub fn new(value: P::Raw) -> Self {
        Self {
            value,
            _policy: PhantomData,
        }
    }

    /// Returns `true` unless the handle holds the sentinel.
    pub fn is_valid(&self) -> bool {
        self.value != P::invalid()
    }

    /// Reads the raw value without giving up ownership.
    pub fn get(&self) -> P::Raw {
        self.value
    }

    /// Writable slot for a foreign "out" parameter.
    ///
    /// Only legal while the handle holds the sentinel; writing over a live
    /// value would leak it.
    pub fn set(&mut self) -> &mut P::Raw {
        debug_assert!(!self.is_valid(), "Handle::set called on a live handle");
        &mut self.value
    }

    /// Gives up ownership without releasing, leaving the sentinel behind.
    #[must_use = "the detached value is no longer released by the handle"]
    pub fn detach(&mut self) -> P::Raw {
        std::mem::replace(&mut self.value, P::invalid())
    }

    /// Releases the current value unless it equals `value`, then stores
    /// `value`. Returns the validity of the new state.
    pub fn reset(&mut self, value: P::Raw) -> bool {
        if self.value != value {
            self.close();
            self.value = value;
        }
        self.is_valid()
    }

    /// Releases the current value and stores the sentinel.
    pub fn clear(&mut self) {
        self.reset(P::invalid());
    }

    /// Move-assigns `other` into `self`, releasing whatever `self` held.
    pub fn assign(&mut self, mut other: Self) {
        let value = other.detach();
        self.reset(value);
    }

    /// Exchanges the values of two handles without releasing either.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.value, &mut other.value);
    }

    fn close(&self) {
        if self.is_valid() {
            P::close(self.value);
        }
    }
}

impl<P: HandlePolicy> Default for Handle<P> {
    fn default() -> Self {
        Self::new(P::invalid())
    }
}

impl<P: HandlePolicy> Drop for Handle<P> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<P: HandlePolicy> PartialEq for Handle<P> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<P: HandlePolicy> fmt::Debug for Handle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.value).finish()
    }
}
