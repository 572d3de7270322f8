//! Core SPSC (Single-Producer Single-Consumer) queue primitives.
//!
//! This module contains the ring buffer algorithm behind
//! [`crate::sync::spsc`]. The ring itself is unsafe to drive; the handles in
//! `sync::spsc` make the single-producer/single-consumer contract a type
//! system guarantee.

pub(crate) mod shim;
pub(crate) mod ring;
