//! Two-thread stress and ownership tests for the SPSC queue.
//!
//! To see construction events:
//! ```bash
//! RUST_LOG=tickline=debug cargo test --features tracing --test spsc_stress -- --nocapture
//! ```

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tickline::QueueError;
use tickline::sync::spsc;

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        tickline::init_tracing();
    });
}

/// Spins for a bounded number of attempts, then yields so the peer thread can
/// run even when both share one CPU.
struct Backoff {
    spins: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 64;

    fn new() -> Self {
        Self { spins: 0 }
    }

    fn snooze(&mut self) {
        if self.spins < Self::SPIN_LIMIT {
            self.spins += 1;
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }
    }

    fn reset(&mut self) {
        self.spins = 0;
    }
}

/// Pushes `0..count` from one thread and pops them on another, returning
/// everything the consumer saw in order.
fn run_pair(capacity: usize, count: u64) -> Vec<u64> {
    let (producer, consumer) = spsc::channel::<u64>(capacity).unwrap();

    let producer_handle = thread::spawn(move || {
        let mut backoff = Backoff::new();
        for i in 0..count {
            let mut item = i;
            while let Err(returned) = producer.try_push(item) {
                item = returned;
                backoff.snooze();
            }
            backoff.reset();
        }
    });

    let consumer_handle = thread::spawn(move || {
        let mut backoff = Backoff::new();
        let mut received = Vec::with_capacity(count as usize);
        while received.len() < count as usize {
            match consumer.try_pop() {
                Some(item) => {
                    received.push(item);
                    backoff.reset();
                }
                None => backoff.snooze(),
            }
        }
        // Nothing extra may show up afterwards.
        assert_eq!(consumer.try_pop(), None);
        received
    });

    producer_handle.join().unwrap();
    consumer_handle.join().unwrap()
}

fn assert_in_order(received: &[u64], count: u64) {
    assert_eq!(received.len() as u64, count);
    for (i, &val) in received.iter().enumerate() {
        assert_eq!(val, i as u64, "out of order at position {i}");
    }
}

#[test]
fn stress_ten_items() {
    init_test_tracing();
    assert_in_order(&run_pair(2, 10), 10);
}

#[test]
fn stress_ten_thousand_items() {
    init_test_tracing();
    for capacity in [2, 4, 64] {
        assert_in_order(&run_pair(capacity, 10_000), 10_000);
    }
}

#[test]
fn stress_one_million_items() {
    init_test_tracing();
    assert_in_order(&run_pair(8, 1_000_000), 1_000_000);
}

#[test]
fn stress_large_payloads() {
    // Payloads span several cache lines, so a torn read would show up as a
    // mismatched fill byte.
    let (producer, consumer) = spsc::channel::<[u64; 32]>(16).unwrap();
    let count = 20_000u64;

    let producer_handle = thread::spawn(move || {
        let mut backoff = Backoff::new();
        for i in 0..count {
            let mut item = [i; 32];
            while let Err(returned) = producer.try_push(item) {
                item = returned;
                backoff.snooze();
            }
            backoff.reset();
        }
    });

    let mut backoff = Backoff::new();
    for expected in 0..count {
        let item = loop {
            if let Some(item) = consumer.try_pop() {
                break item;
            }
            backoff.snooze();
        };
        backoff.reset();
        assert!(item.iter().all(|&v| v == expected), "torn payload at {expected}");
    }

    producer_handle.join().unwrap();
}

#[test]
fn stress_completes_with_both_ends_on_one_cpu() {
    // Both ends pinned to the same core: progress depends on the retry
    // loops giving up the CPU instead of spinning out their time slice.
    let Some(core) = core_affinity::get_core_ids().and_then(|ids| ids.into_iter().next()) else {
        return;
    };
    let (producer, consumer) = spsc::channel::<u64>(2).unwrap();
    let count = 20_000u64;

    let producer_handle = thread::spawn(move || {
        core_affinity::set_for_current(core);
        let mut backoff = Backoff::new();
        for i in 0..count {
            let mut item = i;
            while let Err(returned) = producer.try_push(item) {
                item = returned;
                backoff.snooze();
            }
            backoff.reset();
        }
    });

    let consumer_handle = thread::spawn(move || {
        core_affinity::set_for_current(core);
        let start = minstant::Instant::now();
        let mut backoff = Backoff::new();
        let mut received = Vec::with_capacity(count as usize);
        while received.len() < count as usize {
            match consumer.try_pop() {
                Some(item) => {
                    received.push(item);
                    backoff.reset();
                }
                None => backoff.snooze(),
            }
        }
        (received, start.elapsed())
    });

    producer_handle.join().unwrap();
    let (received, elapsed) = consumer_handle.join().unwrap();
    assert_in_order(&received, count);
    assert!(elapsed.as_secs() < 10, "took {elapsed:?} on a shared core");
}

#[test]
fn scenario_capacity_four() {
    let (producer, consumer) = spsc::channel::<i32>(4).unwrap();

    assert!(producer.try_push(10).is_ok());
    assert!(producer.try_push(20).is_ok());
    assert!(producer.try_push(30).is_ok());
    assert_eq!(producer.try_push(40), Err(40));

    assert_eq!(consumer.try_pop(), Some(10));
    assert!(producer.try_push(40).is_ok());
}

#[test]
fn capacity_must_be_power_of_two() {
    let err = spsc::channel::<u64>(3).err().unwrap();
    assert_eq!(err, QueueError::InvalidCapacity(3));
    assert!(err.is_configuration());
}

#[test]
fn empty_pop_is_idempotent() {
    let (producer, consumer) = spsc::channel::<u64>(4).unwrap();
    for _ in 0..1000 {
        assert_eq!(consumer.try_pop(), None);
    }
    // The ring still behaves as freshly built.
    for i in 0..3 {
        producer.try_push(i).unwrap();
    }
    assert!(producer.try_push(3).is_err());
    for i in 0..3 {
        assert_eq!(consumer.try_pop(), Some(i));
    }
}

/// Counts live instances so leaks and double drops are observable.
#[derive(Debug)]
struct Tracked(Arc<AtomicUsize>);

impl Tracked {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn undelivered_items_dropped_once() {
    let live = Arc::new(AtomicUsize::new(0));
    {
        let (producer, consumer) = spsc::channel::<Tracked>(8).unwrap();
        for _ in 0..6 {
            assert!(producer.try_push(Tracked::new(&live)).is_ok());
        }
        assert_eq!(live.load(Ordering::SeqCst), 6);

        let popped = consumer.try_pop().unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 6);
        drop(popped);
        assert_eq!(live.load(Ordering::SeqCst), 5);

        // Rejected items come back to the caller rather than leaking.
        let mut rejected = Vec::new();
        for _ in 0..4 {
            if let Err(item) = producer.try_push(Tracked::new(&live)) {
                rejected.push(item);
            }
        }
        assert_eq!(rejected.len(), 2);
        drop(rejected);
        assert_eq!(live.load(Ordering::SeqCst), 7);
    }
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn ends_dropped_on_different_threads() {
    let live = Arc::new(AtomicUsize::new(0));
    let (producer, consumer) = spsc::channel::<Tracked>(4).unwrap();
    producer.try_push(Tracked::new(&live)).unwrap();

    let l = Arc::clone(&live);
    thread::spawn(move || {
        producer.try_push(Tracked::new(&l)).unwrap();
        drop(producer);
    })
    .join()
    .unwrap();

    assert_eq!(live.load(Ordering::SeqCst), 2);
    thread::spawn(move || drop(consumer)).join().unwrap();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}
