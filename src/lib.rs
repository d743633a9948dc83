//! Floodgate - Rate-Gated Task Scheduling
//!
//! This crate executes an unbounded stream of deferred invocations through a
//! fixed pool of worker threads while obeying one or more throughput caps
//! ("at most N operations per T seconds"). When several independent
//! credentials are configured, work is rotated round-robin across them to
//! multiply the effective cap.

pub mod config;
pub mod error;
pub mod queue;
pub mod ratelimit;
pub mod scheduler;
