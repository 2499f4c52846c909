//! Serial backend: runs every task in index order on the calling thread.
//!
//! Useful for debugging and as the reference when checking that a parallel
//! run reproduces the serial results.

use crate::backend::{BackendType, ComputeBackend, DeviceInfo};

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".into(),
            backend_type: BackendType::Serial,
            compute_units: 1,
        }
    }

    fn run_indexed(&self, count: usize, task: &(dyn Fn(usize) + Send + Sync)) {
        for i in 0..count {
            task(i);
        }
    }
}
