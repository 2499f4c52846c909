//! # Multilayer Compute
//!
//! Compute backend abstraction for the multilayer framework. This crate
//! provides a [`ComputeBackend`](backend::ComputeBackend) trait that isolates
//! the optics code from how independent per-wavelength tasks are scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | Serial | always | Implemented |
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;
pub mod progress;
pub mod serial;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};
pub use progress::{Progress, ProgressCounter};
pub use serial::SerialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

use std::sync::Arc;

/// The backend used when the caller does not pick one.
///
/// With the `cpu` feature this is the Rayon pool sized to the hardware
/// concurrency; otherwise tasks run serially on the calling thread.
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "cpu")]
    {
        Arc::new(CpuBackend::new())
    }
    #[cfg(not(feature = "cpu"))]
    {
        Arc::new(SerialBackend)
    }
}

/// Select a backend by name: `"serial"` or `"cpu"`, the latter optionally
/// with a dedicated pool of `threads` workers.
///
/// # Errors
/// [`ComputeError::Unavailable`] for unknown names, or `"cpu"` in a build
/// without the `cpu` feature.
pub fn backend_by_name(
    name: &str,
    threads: Option<usize>,
) -> Result<Arc<dyn ComputeBackend>, ComputeError> {
    match name {
        "serial" => Ok(Arc::new(SerialBackend)),
        #[cfg(feature = "cpu")]
        "cpu" => match threads {
            Some(n) => Ok(Arc::new(CpuBackend::with_threads(n)?)),
            None => Ok(Arc::new(CpuBackend::new())),
        },
        #[cfg(not(feature = "cpu"))]
        "cpu" => {
            let _ = threads;
            Err(ComputeError::Unavailable(
                "built without the `cpu` feature".into(),
            ))
        }
        other => Err(ComputeError::Unavailable(format!(
            "unknown backend '{other}' (valid: cpu, serial)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_by_name() {
        let serial = backend_by_name("serial", None).unwrap();
        assert_eq!(serial.device_info().backend_type, BackendType::Serial);
        assert!(matches!(
            backend_by_name("gpu", None),
            Err(ComputeError::Unavailable(_))
        ));
    }

    #[cfg(feature = "cpu")]
    #[test]
    fn test_cpu_backend_with_threads() {
        let cpu = backend_by_name("cpu", Some(2)).unwrap();
        assert_eq!(cpu.device_info().compute_units, 2);
    }
}
