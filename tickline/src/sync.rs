//! Synchronization primitives for in-process communication.
//!
//! This module provides lock-free queues for handing data between threads
//! within the same process.

pub mod spsc;
