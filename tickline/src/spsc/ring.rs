//! Core lock-free SPSC ring buffer algorithm.
//!
//! The ring owns a cache-line aligned arena of uninitialized slots and two
//! indices, each written by exactly one role:
//!
//! - `head`: next slot to consume, written only by the consumer
//! - `tail`: next slot to produce, written only by the producer
//!
//! Both indices are kept reduced modulo the capacity. The ring is full when
//! `(tail + 1) & mask == head`, so one slot always stays empty and a ring of
//! capacity `C` holds at most `C - 1` items.
//!
//! # Safety
//!
//! [`Ring::try_push`] and [`Ring::try_pop`] are unsafe because the caller must
//! uphold the SPSC invariant: at most one thread pushes and at most one
//! thread pops at any time. [`crate::sync::spsc`] enforces this with
//! non-`Sync` handles.
//!
//! Under `cfg(loom)` the indices and slot cells come from `loom` (see
//! `spsc::shim`), and `tests/loom_spsc.rs` model-checks this exact code.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use super::shim::{AtomicUsize, Ordering, SlotCell};
use crate::config::{CACHE_LINE_SIZE, Capacity};
use crate::error::QueueError;
use crate::trace::{debug, trace};

/// Consumer-side state: the read index.
#[repr(C)]
#[repr(align(64))]
pub struct ConsumerState {
    /// Next slot to read. Owned by consumer, read by producer.
    pub head: AtomicUsize,
}

impl ConsumerState {
    pub fn new() -> Self {
        Self {
            head: AtomicUsize::new(0),
        }
    }
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer-side state: the write index.
#[repr(C)]
#[repr(align(64))]
pub struct ProducerState {
    /// Next slot to write. Owned by producer, read by consumer.
    pub tail: AtomicUsize,
}

impl ProducerState {
    pub fn new() -> Self {
        Self {
            tail: AtomicUsize::new(0),
        }
    }
}

impl Default for ProducerState {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(align_of::<ConsumerState>() == CACHE_LINE_SIZE);
const _: () = assert!(align_of::<ProducerState>() == CACHE_LINE_SIZE);

type Slot<T> = SlotCell<MaybeUninit<T>>;

/// Bounded SPSC ring over a heap arena sized at construction.
#[repr(C)]
pub struct Ring<T> {
    /// Consumer state (head index).
    consumer: ConsumerState,

    /// Producer state (tail index).
    producer: ProducerState,

    /// Keeps the read-mostly fields below off the producer's line.
    _padding: [u8; CACHE_LINE_SIZE],

    slots: NonNull<Slot<T>>,
    capacity: Capacity,
    layout: Layout,
    _owns: PhantomData<T>,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` slots.
    ///
    /// # Errors
    ///
    /// - [`QueueError::CapacityOverflow`] if the arena size overflows a `Layout`
    /// - [`QueueError::Allocation`] if the allocator returns null
    pub fn new(capacity: Capacity) -> Result<Self, QueueError> {
        let layout = Self::arena_layout(capacity)?;

        let slots = if layout.size() == 0 {
            // Zero-sized elements never touch memory.
            NonNull::dangling()
        } else {
            // SAFETY: layout has non-zero size.
            let raw = unsafe { alloc::alloc(layout) };
            NonNull::new(raw.cast::<Slot<T>>()).ok_or(QueueError::Allocation {
                size: layout.size(),
                align: layout.align(),
            })?
        };

        for i in 0..capacity.get() {
            // SAFETY: i < capacity and the arena holds capacity slots. The
            // cell starts out with no value in it.
            unsafe { slots.as_ptr().add(i).write(SlotCell::new(MaybeUninit::uninit())) };
        }

        debug!(
            capacity = capacity.get(),
            arena_bytes = layout.size(),
            "allocated spsc ring"
        );

        Ok(Self {
            consumer: ConsumerState::new(),
            producer: ProducerState::new(),
            _padding: [0u8; CACHE_LINE_SIZE],
            slots,
            capacity,
            layout,
            _owns: PhantomData,
        })
    }

    fn arena_layout(capacity: Capacity) -> Result<Layout, QueueError> {
        Layout::array::<Slot<T>>(capacity.get())
            .and_then(|layout| layout.align_to(CACHE_LINE_SIZE))
            .map_err(|_| QueueError::CapacityOverflow {
                capacity: capacity.get(),
                elem_size: size_of::<T>(),
            })
    }

    #[inline]
    pub const fn capacity(&self) -> Capacity {
        self.capacity
    }

    #[inline]
    const fn mask(&self) -> usize {
        self.capacity.mask()
    }

    #[inline]
    fn slot(&self, index: usize) -> &Slot<T> {
        debug_assert!(index < self.capacity.get());
        // SAFETY: index < capacity and every cell was initialized in `new`.
        unsafe { &*self.slots.as_ptr().add(index) }
    }

    /// Attempts to push an item onto the ring.
    ///
    /// Returns `Err(item)` without touching any state if the ring is full.
    ///
    /// # Safety
    ///
    /// Only one thread may call this method at a time (single producer).
    #[inline]
    pub unsafe fn try_push(&self, item: T) -> Result<(), T> {
        // Only the producer writes tail, relaxed is fine
        let tail = self.producer.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) & self.mask();

        // Acquire pairs with the consumer's release of head: the slot we are
        // about to overwrite has been fully moved out.
        if next_tail == self.consumer.head.load(Ordering::Acquire) {
            return Err(item);
        }

        // SAFETY: The producer owns slot `tail`:
        // - tail is not yet published, so the consumer stops before it
        // - next_tail != head, so the consumer is not reading it
        self.slot(tail)
            .with_mut(|slot| unsafe { slot.write(MaybeUninit::new(item)) });

        // Publish after the write so an acquire load of tail sees the slot.
        self.producer.tail.store(next_tail, Ordering::Release);

        Ok(())
    }

    /// Attempts to pop an item from the ring.
    ///
    /// Returns `None` without touching any state if the ring is empty.
    ///
    /// # Safety
    ///
    /// Only one thread may call this method at a time (single consumer).
    #[inline]
    pub unsafe fn try_pop(&self) -> Option<T> {
        // Only the consumer writes head, relaxed is fine
        let head = self.consumer.head.load(Ordering::Relaxed);

        // Acquire pairs with the producer's release of tail.
        if head == self.producer.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: The consumer owns slot `head`:
        // - head != tail, so the producer initialized it before publishing
        // - the producer will not reuse it until we publish the new head
        // Reading moves the value out; the slot is uninitialized afterwards.
        let item = self
            .slot(head)
            .with(|slot| unsafe { slot.read().assume_init() });

        self.consumer
            .head
            .store((head + 1) & self.mask(), Ordering::Release);

        Some(item)
    }

    /// Hints the CPU to pull the slot after `head` into L1.
    ///
    /// Purely advisory; a no-op on targets without a prefetch intrinsic.
    #[inline]
    pub fn prefetch_next(&self) {
        let next = (self.consumer.head.load(Ordering::Relaxed) + 1) & self.mask();
        prefetch_read(ptr::from_ref(self.slot(next)));
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn prefetch_read<T>(ptr: *const T) {
    use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};

    // SAFETY: prefetch never faults and does not change program state.
    unsafe { _mm_prefetch::<_MM_HINT_T0>(ptr.cast::<i8>()) }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
fn prefetch_read<T>(_ptr: *const T) {}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let mask = self.mask();
        // &mut self: both ends are gone, so relaxed loads see the final indices.
        let mut head = self.consumer.head.load(Ordering::Relaxed);
        let tail = self.producer.tail.load(Ordering::Relaxed);

        if std::mem::needs_drop::<T>() && head != tail {
            trace!(
                pending = tail.wrapping_sub(head) & mask,
                "dropping undelivered items"
            );
            while head != tail {
                // SAFETY: slots in [head, tail) hold initialized values and
                // &mut self guarantees no other access.
                self.slot(head)
                    .with_mut(|slot| unsafe { (*slot).assume_init_drop() });
                head = (head + 1) & mask;
            }
        }

        if std::mem::needs_drop::<Slot<T>>() {
            for i in 0..self.capacity.get() {
                // SAFETY: each cell was written once in `new` and is dropped
                // once here; its contents were handled above.
                unsafe { ptr::drop_in_place(self.slots.as_ptr().add(i)) };
            }
        }

        if self.layout.size() != 0 {
            // SAFETY: slots was allocated with exactly this layout.
            unsafe { alloc::dealloc(self.slots.as_ptr().cast::<u8>(), self.layout) };
        }
    }
}

// SAFETY: Ring owns its arena; moving it moves ownership of every live T.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// - head/tail are AtomicUsize with Release/Acquire ordering
// - each slot is touched by one role at a time under the SPSC invariant
unsafe impl<T: Send> Sync for Ring<T> {}
