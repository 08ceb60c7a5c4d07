//! Cairn Test & Validation Infrastructure
//!
//! Shared fixtures for exercising the reduction core: tracing setup, a temp-dir
//! test environment and deterministic workload generators. The test modules
//! cover the end-to-end ingest scenario, concurrent access from many threads
//! and property tests over the public API.

pub mod harness;
pub mod workload;

#[cfg(test)]
mod proptest_reduce;

pub use harness::{init_tracing, TestEnv};
pub use workload::{pseudo_random, repeated_pattern, similar_versions};
