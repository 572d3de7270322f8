//! Build-time constants and validated construction parameters.

use std::num::NonZeroUsize;

use crate::error::QueueError;

/// Cache line size assumed for padding and arena alignment.
///
/// The ring's role-state blocks use `#[repr(align(64))]`, which needs a
/// literal; a compile-time assertion next to them keeps the two in step.
pub const CACHE_LINE_SIZE: usize = 64;

/// Slot count of a queue: a power of two, at least 2.
///
/// One slot is always kept free to tell "full" from "empty", so a queue of
/// capacity `C` holds at most `C - 1` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capacity(NonZeroUsize);

impl Capacity {
    /// Validates `slots`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] if `slots` is 0, 1, or not a
    /// power of two. Nothing is rounded.
    pub const fn new(slots: usize) -> Result<Self, QueueError> {
        if slots < 2 || !slots.is_power_of_two() {
            return Err(QueueError::InvalidCapacity(slots));
        }
        match NonZeroUsize::new(slots) {
            Some(n) => Ok(Self(n)),
            None => Err(QueueError::InvalidCapacity(slots)),
        }
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Bitmask that reduces an index modulo the capacity.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> usize {
        self.0.get() - 1
    }

    /// Maximum number of items held at once (`capacity - 1`).
    #[inline]
    #[must_use]
    pub const fn usable(self) -> usize {
        self.0.get() - 1
    }
}
