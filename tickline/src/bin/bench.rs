//! Kernel and SPSC queue throughput/latency benchmark.
//!
//! Usage:
//!     RUSTFLAGS="-C target-cpu=native" cargo run --release --bin tickline-bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2  Pin consumer to CPU 2 (default: 2)

use std::env;
use std::hint::{self, black_box};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use minstant::Instant;

use tickline::simd::{self, Kernel, Variant};
use tickline::sync::spsc;

const DOT_LEN: usize = 1024 * 1024;
const DOT_ROUNDS: usize = 100;

const QUEUE_SIZE: usize = 4096;
const ITERATIONS: usize = 1_000_000;
const RTT_ITERATIONS: usize = 100_000;

type Payload = i32;

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    let producer_cpu = env::var("PRODUCER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(0));
    let consumer_cpu = env::var("CONSUMER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(2));
    (producer_cpu, consumer_cpu)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn bench_dot_product(kernel: Kernel) {
    println!("[BENCH] dot product ({})", kernel.variant().label());

    let a = vec![1.0001f64; DOT_LEN];
    let b = vec![0.9999f64; DOT_LEN];

    // Warmup
    black_box(kernel.dot_product(&a, &b));

    let start = Instant::now();
    let mut result = 0.0;
    for _ in 0..DOT_ROUNDS {
        result += kernel.dot_product(black_box(&a), black_box(&b));
    }
    let elapsed = start.elapsed();

    let elements = (DOT_LEN * DOT_ROUNDS) as f64;
    println!("  > processed {:.1} M elements", elements / 1e6);
    println!("  > time: {} us", elapsed.as_micros());
    println!("  > {:.3} ns/element", elapsed.as_nanos() as f64 / elements);
    println!("  > result: {result}");
}

fn bench_add() {
    println!("[BENCH] elementwise add ({})", Variant::COMPILED.label());

    let a = vec![1.5f64; DOT_LEN];
    let b = vec![2.5f64; DOT_LEN];
    let mut out = vec![0.0f64; DOT_LEN];

    let start = Instant::now();
    for _ in 0..DOT_ROUNDS {
        simd::elementwise_add(black_box(&a), black_box(&b), &mut out);
        black_box(&out);
    }
    let elapsed = start.elapsed();

    let elements = (DOT_LEN * DOT_ROUNDS) as f64;
    println!("  > {:.3} ns/element", elapsed.as_nanos() as f64 / elements);
}

fn bench_throughput(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    println!("[BENCH] spsc throughput (size={QUEUE_SIZE}, iters={ITERATIONS})");

    let (producer, consumer) = spsc::channel::<Payload>(QUEUE_SIZE).unwrap();

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Consumer thread
    let consumer_thread = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);

        // Signal ready
        ready_clone.store(true, Ordering::Release);

        for expected in 0..ITERATIONS as Payload {
            loop {
                consumer.prefetch_next();
                if let Some(value) = consumer.try_pop() {
                    if value != expected {
                        panic!("Data corruption: expected {}, got {}", expected, value);
                    }
                    break;
                }
                hint::spin_loop();
            }
        }
    });

    // Wait for consumer to be ready
    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let start = Instant::now();

    for i in 0..ITERATIONS as Payload {
        let mut item = i;
        while let Err(returned) = producer.try_push(item) {
            item = returned;
            hint::spin_loop();
        }
    }

    consumer_thread.join().unwrap();
    let elapsed = start.elapsed();

    let mops = ITERATIONS as f64 / elapsed.as_micros().max(1) as f64;
    println!("  > {mops:.2} M ops/sec");
}

fn bench_rtt(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    println!("[BENCH] spsc round trip (iters={RTT_ITERATIONS})");

    let (q1_producer, q1_consumer) = spsc::channel::<Payload>(QUEUE_SIZE).unwrap();
    let (q2_producer, q2_consumer) = spsc::channel::<Payload>(QUEUE_SIZE).unwrap();

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Responder thread
    let responder = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);

        // Signal ready
        ready_clone.store(true, Ordering::Release);

        for _ in 0..RTT_ITERATIONS {
            loop {
                if let Some(value) = q1_consumer.try_pop() {
                    // Queue is never more than one deep, push cannot fail
                    q2_producer.try_push(value).unwrap();
                    break;
                }
                hint::spin_loop();
            }
        }
    });

    // Wait for responder to be ready
    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let start = Instant::now();

    for i in 0..RTT_ITERATIONS as Payload {
        q1_producer.try_push(i).unwrap();
        loop {
            if q2_consumer.try_pop().is_some() {
                break;
            }
            hint::spin_loop();
        }
    }

    let elapsed = start.elapsed();
    responder.join().unwrap();

    let rtt_ns = elapsed.as_nanos() / RTT_ITERATIONS as u128;
    println!("  > {rtt_ns} ns RTT");
}

fn main() {
    tickline::init_tracing();

    let (producer_cpu, consumer_cpu) = get_cpu_affinity();

    println!("=== tickline ===");
    println!("compiled variant: {}", Variant::COMPILED.label());
    println!("detected variant: {}", Variant::detect().label());
    println!("----------------");

    bench_dot_product(Kernel::compiled());
    if Variant::detect() != Variant::COMPILED {
        bench_dot_product(Kernel::detected());
    }
    bench_add();
    bench_throughput(producer_cpu, consumer_cpu);
    bench_rtt(producer_cpu, consumer_cpu);
}
