//! Micro-benchmarks for the memory subsystem: load/store latency,
//! cache-line placement and sharing cost, cross-core half-round-trip
//! latency and store-visibility latency across polling cores.
//!
//! [`protocols::Harness`] runs one experiment over a fixed thread team
//! and writes raw tick-count samples into caller-owned
//! [`stats::SampleSink`]s; everything below it is the synchronization
//! and timing machinery the protocols are built from.

pub mod barrier;
pub mod cell;
pub mod clock;
pub mod clock_offset;
pub mod constants;
pub mod error;
pub mod flush;
pub mod handshake;
pub mod ops;
pub mod protocols;
pub mod roles;
pub mod stats;
mod team;
pub mod value_channel;
pub mod wait_strategy;
