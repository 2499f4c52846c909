//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution strategies (serial,
//! thread pool) so that the stack code in `multilayer-core` never depends on
//! a particular scheduler.

use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: usize,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Serial,
    Cpu,
}

/// Abstraction over compute backends.
///
/// Work is submitted as a single closure evaluated once for every index in
/// `0..count`. Tasks are independent: a backend may run them in any order
/// and on any thread, and must have finished all of them before
/// [`run_indexed`](ComputeBackend::run_indexed) returns.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Evaluate `task(i)` for every `i` in `0..count` and join.
    ///
    /// The closure only receives the index; results are expected to be
    /// written into caller-owned, per-index slots.
    fn run_indexed(&self, count: usize, task: &(dyn Fn(usize) + Send + Sync));
}
