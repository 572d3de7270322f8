use thiserror::Error;

use crate::simd::Variant;

/// Errors that can occur while constructing a queue.
///
/// Full and empty conditions are never reported here: `try_push` hands the
/// item back and `try_pop` returns `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Capacity is zero, one, or not a power of two.
    #[error("queue capacity must be a power of two >= 2, got {0}")]
    InvalidCapacity(usize),
    /// `capacity * size_of::<T>()` does not fit in a valid allocation layout.
    #[error("queue capacity {capacity} with {elem_size}-byte elements overflows the address space")]
    CapacityOverflow { capacity: usize, elem_size: usize },
    /// The allocator could not satisfy the aligned request.
    #[error("failed to allocate {size} bytes aligned to {align}")]
    Allocation { size: usize, align: usize },
}

impl QueueError {
    /// Returns `true` for caller mistakes, `false` for resource exhaustion.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCapacity(_) | Self::CapacityOverflow { .. }
        )
    }
}

/// Errors that can occur while selecting a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The running CPU lacks the instructions this variant needs.
    #[error("kernel variant {0} is not supported on this CPU")]
    Unsupported(Variant),
}
