//! Lock-free SPSC queue for in-process (inter-thread) communication.
//!
//! A wait-free bounded queue over a heap arena with atomic indices.
//!
//! # Overview
//!
//! - [`Producer`] - Write end (single producer per queue)
//! - [`Consumer`] - Read end (single consumer per queue)
//! - Lock-free, wait-free: no mutexes, syscalls or allocation in the hot path
//!
//! A queue built with capacity `C` holds at most `C - 1` items.
//!
//! # Example
//!
//! ```
//! use tickline::sync::spsc;
//!
//! let (producer, consumer) = spsc::channel::<u64>(1024)?;
//!
//! // Producer thread
//! producer.try_push(42).expect("Queue full");
//!
//! // Consumer thread
//! assert_eq!(consumer.try_pop(), Some(42));
//! # Ok::<(), tickline::QueueError>(())
//! ```
//!
//! # Retrying
//!
//! Neither end ever blocks. A full queue hands the item back and an empty
//! queue returns `None`; spinning or backing off is up to the caller:
//!
//! ```
//! use tickline::sync::spsc;
//!
//! let (producer, consumer) = spsc::channel::<u32>(2)?;
//! let mut item = 1;
//! while let Err(returned) = producer.try_push(item) {
//!     item = returned;
//!     std::hint::spin_loop();
//! }
//! assert_eq!(consumer.try_pop(), Some(1));
//! # Ok::<(), tickline::QueueError>(())
//! ```

use std::cell::Cell;
use std::marker::PhantomData;

use crate::config::Capacity;
use crate::error::QueueError;
use crate::spsc::ring::Ring;
use crate::spsc::shim::Arc;

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the SPSC queue.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`] or [`Clone`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent `try_push()`)
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

/// Read end of the SPSC queue.
///
/// See [`Producer`] for thread safety details (same semantics apply).
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a new SPSC channel with `capacity` slots.
///
/// Returns a `(Producer, Consumer)` pair. The producer and consumer can be
/// sent to different threads. The backing arena is allocated here, once, and
/// freed when both ends are dropped.
///
/// # Errors
///
/// - [`QueueError::InvalidCapacity`] if `capacity` is not a power of two
///   `>= 2`; checked before anything is allocated
/// - [`QueueError::CapacityOverflow`] if the arena would not fit a `Layout`
/// - [`QueueError::Allocation`] if the aligned allocation fails
///
/// # Example
///
/// ```
/// use tickline::QueueError;
/// use tickline::sync::spsc;
///
/// assert!(matches!(
///     spsc::channel::<String>(3),
///     Err(QueueError::InvalidCapacity(3))
/// ));
///
/// let (tx, rx) = spsc::channel::<String>(16)?;
/// tx.try_push("hello".to_string()).unwrap();
/// assert_eq!(rx.try_pop(), Some("hello".to_string()));
/// # Ok::<(), QueueError>(())
/// ```
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), QueueError> {
    let capacity = Capacity::new(capacity)?;
    let ring = Arc::new(Ring::new(capacity)?);

    let producer = Producer {
        ring: Arc::clone(&ring),
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        ring,
        _unsync: PhantomData,
    };

    Ok((producer, consumer))
}

impl<T: Send> Producer<T> {
    /// Attempts to push an item onto the queue (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full, allowing retry. No state is
    /// changed in that case.
    #[inline]
    pub fn try_push(&self, item: T) -> Result<(), T> {
        // SAFETY: Producer is neither Sync nor Clone, so this is the only
        // thread pushing onto the ring.
        unsafe { self.ring.try_push(item) }
    }

    /// Total slot count the queue was built with.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    /// Maximum number of items the queue holds at once (`capacity - 1`).
    #[inline]
    #[must_use]
    pub fn usable_capacity(&self) -> usize {
        self.ring.capacity().usable()
    }
}

impl<T: Send> Consumer<T> {
    /// Attempts to pop an item from the queue (wait-free).
    ///
    /// Returns `None` if the queue is empty. Ownership of the item passes to
    /// the caller on `Some`.
    #[inline]
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        // SAFETY: Consumer is neither Sync nor Clone, so this is the only
        // thread popping from the ring.
        unsafe { self.ring.try_pop() }
    }

    /// Pops into `out`, dropping its previous value.
    ///
    /// Returns `false` and leaves `out` untouched if the queue is empty.
    #[inline]
    pub fn try_pop_into(&self, out: &mut T) -> bool {
        match self.try_pop() {
            Some(item) => {
                *out = item;
                true
            }
            None => false,
        }
    }

    /// Prefetches the slot after the next one to be popped.
    ///
    /// Advisory only; useful at the top of latency-critical receive loops.
    #[inline]
    pub fn prefetch_next(&self) {
        self.ring.prefetch_next();
    }

    /// Total slot count the queue was built with.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_push_pop() {
        let (producer, consumer) = channel::<u64>(8).unwrap();

        assert!(producer.try_push(42).is_ok());
        assert_eq!(consumer.try_pop(), Some(42));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn test_multiple_items() {
        let (producer, consumer) = channel::<u64>(16).unwrap();

        for i in 0..15 {
            assert!(producer.try_push(i).is_ok());
        }

        for i in 0..15 {
            assert_eq!(consumer.try_pop(), Some(i));
        }

        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn test_queue_full() {
        let (producer, consumer) = channel::<u64>(4).unwrap();

        for i in [10, 20, 30] {
            assert!(producer.try_push(i).is_ok(), "Failed to push item {i}");
        }

        assert_eq!(producer.try_push(40), Err(40));

        assert_eq!(consumer.try_pop(), Some(10));
        assert!(producer.try_push(40).is_ok());
        assert_eq!(producer.try_push(1000), Err(1000));
    }

    #[test]
    fn test_queue_empty() {
        let (producer, consumer) = channel::<u64>(8).unwrap();

        assert_eq!(consumer.try_pop(), None);

        producer.try_push(42).unwrap();
        assert_eq!(consumer.try_pop(), Some(42));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn test_invalid_capacity() {
        for capacity in [0, 1, 3, 6, 100] {
            assert_eq!(
                channel::<u64>(capacity).err(),
                Some(QueueError::InvalidCapacity(capacity))
            );
        }
    }

    #[test]
    fn test_capacity_accessors() {
        let (producer, consumer) = channel::<u8>(64).unwrap();
        assert_eq!(producer.capacity(), 64);
        assert_eq!(producer.usable_capacity(), 63);
        assert_eq!(consumer.capacity(), 64);
    }

    #[test]
    fn test_wrapping_behavior() {
        let (producer, consumer) = channel::<u64>(4).unwrap();

        for round in 0..5 {
            for i in 0..3 {
                let value = round * 10 + i;
                assert!(producer.try_push(value).is_ok());
            }

            for i in 0..3 {
                let expected = round * 10 + i;
                assert_eq!(consumer.try_pop(), Some(expected));
            }

            assert_eq!(consumer.try_pop(), None);
        }
    }

    #[test]
    fn test_interleaved_operations() {
        let (producer, consumer) = channel::<u64>(8).unwrap();

        producer.try_push(1).unwrap();
        producer.try_push(2).unwrap();
        assert_eq!(consumer.try_pop(), Some(1));
        producer.try_push(3).unwrap();
        assert_eq!(consumer.try_pop(), Some(2));
        assert_eq!(consumer.try_pop(), Some(3));
        producer.try_push(4).unwrap();
        producer.try_push(5).unwrap();
        assert_eq!(consumer.try_pop(), Some(4));
        assert_eq!(consumer.try_pop(), Some(5));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn test_pop_into() {
        let (producer, consumer) = channel::<String>(4).unwrap();
        let mut out = String::from("untouched");

        assert!(!consumer.try_pop_into(&mut out));
        assert_eq!(out, "untouched");

        producer.try_push("fresh".to_string()).unwrap();
        assert!(consumer.try_pop_into(&mut out));
        assert_eq!(out, "fresh");
    }

    #[test]
    fn test_send_to_thread() {
        let (producer, consumer) = channel::<u64>(16).unwrap();

        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                producer.try_push(i).unwrap();
            }
        });

        handle.join().unwrap();

        for i in 0..10 {
            assert_eq!(consumer.try_pop(), Some(i));
        }
    }

    #[test]
    fn test_concurrent_push_pop() {
        let (producer, consumer) = channel::<u64>(64).unwrap();
        let count = 1000u64;

        let producer_handle = std::thread::spawn(move || {
            for i in 0..count {
                while producer.try_push(i).is_err() {
                    std::thread::yield_now();
                }
            }
        });

        let consumer_handle = std::thread::spawn(move || {
            let mut received = Vec::with_capacity(count as usize);
            while received.len() < count as usize {
                consumer.prefetch_next();
                if let Some(item) = consumer.try_pop() {
                    received.push(item);
                } else {
                    std::thread::yield_now();
                }
            }
            received
        });

        producer_handle.join().unwrap();
        let received = consumer_handle.join().unwrap();

        // Verify FIFO order
        for (i, &val) in received.iter().enumerate() {
            assert_eq!(val, i as u64);
        }
    }

    #[test]
    fn test_non_copy_type() {
        let (producer, consumer) = channel::<String>(8).unwrap();

        producer.try_push("hello".to_string()).unwrap();
        producer.try_push("world".to_string()).unwrap();

        assert_eq!(consumer.try_pop(), Some("hello".to_string()));
        assert_eq!(consumer.try_pop(), Some("world".to_string()));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn test_ring_outlives_one_end() {
        let (producer, consumer) = channel::<Vec<u8>>(4).unwrap();
        producer.try_push(vec![1, 2, 3]).unwrap();
        drop(producer);
        assert_eq!(consumer.try_pop(), Some(vec![1, 2, 3]));
        assert_eq!(consumer.try_pop(), None);
    }
}
