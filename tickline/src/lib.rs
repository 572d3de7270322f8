//! Low-latency building blocks for numeric pipelines.
//!
//! - [`sync::spsc`] - bounded lock-free single-producer/single-consumer queue
//! - [`simd`] - f64 add and dot-product kernels with build-time variant selection
//!
//! Enable the `tracing` feature and call [`init_tracing`] to see construction
//! and kernel-selection events.

pub mod config;
mod error;
pub mod simd;
mod spsc;
pub mod sync;
mod trace;

pub use error::{KernelError, QueueError};
pub use trace::init_tracing;
