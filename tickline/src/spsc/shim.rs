//! Concurrency primitives the queue is built from.
//!
//! Normal builds get `std` atomics, `std::sync::Arc` and a zero-cost
//! `UnsafeCell` wrapper. Building with `RUSTFLAGS="--cfg loom"` swaps all
//! three for their `loom` counterparts, so the model checker tracks every
//! slot access, index update and handle drop of the real queue.

#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell as SlotCell;
#[cfg(loom)]
pub(crate) use loom::sync::Arc;
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use std::sync::Arc;
#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};

/// `UnsafeCell` with the closure-based access API of `loom::cell::UnsafeCell`.
#[cfg(not(loom))]
#[repr(transparent)]
pub(crate) struct SlotCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(loom))]
impl<T> SlotCell<T> {
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(std::cell::UnsafeCell::new(value))
    }

    #[inline(always)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}
