//! Compute-once cache gate shared by the single-band and spectral stacks.
//!
//! The gate is a small state machine:
//!
//! ```text
//!   Dirty --query--> Computing --ok--> Fresh
//!     ^                  |               |
//!     +------err---------+               |
//!     +----------invalidate (&mut)-------+
//! ```
//!
//! `Computing` is the period during which a querying thread holds the lock
//! and runs the computation; concurrent queries block on the lock and then
//! observe `Fresh`, so the computation runs once. Callbacks invoked from
//! inside a computation must not query the same gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// Observable state of a [`ComputeOnce`] gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Dirty,
    Computing,
    Fresh,
}

enum Slot<T> {
    Dirty,
    Fresh(Arc<T>),
}

/// Mutex-guarded lazily computed value.
pub struct ComputeOnce<T> {
    slot: Mutex<Slot<T>>,
    computations: AtomicUsize,
}

impl<T> ComputeOnce<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Dirty),
            computations: AtomicUsize::new(0),
        }
    }

    /// Return the cached value, computing it first if the gate is dirty.
    ///
    /// A failed computation leaves the gate dirty; the next query retries.
    pub fn get_or_try_compute<E>(
        &self,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Slot::Fresh(value) = &*slot {
            return Ok(Arc::clone(value));
        }
        self.computations.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(compute()?);
        *slot = Slot::Fresh(Arc::clone(&value));
        Ok(value)
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        *self.slot.get_mut().unwrap_or_else(PoisonError::into_inner) = Slot::Dirty;
    }

    /// Best-effort snapshot of the gate. `Computing` means the lock was held
    /// at the time of the call, which includes another thread briefly reading
    /// a `Fresh` value; the state may change as soon as this returns.
    pub fn state(&self) -> CacheState {
        match self.slot.try_lock() {
            Ok(slot) => Self::slot_state(&slot),
            Err(TryLockError::Poisoned(poisoned)) => Self::slot_state(&poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => CacheState::Computing,
        }
    }

    /// Number of computations run so far (successful or not).
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    fn slot_state(slot: &Slot<T>) -> CacheState {
        match slot {
            Slot::Dirty => CacheState::Dirty,
            Slot::Fresh(_) => CacheState::Fresh,
        }
    }
}

impl<T> Default for ComputeOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_computes_once() {
        let gate = ComputeOnce::new();
        let a = gate.get_or_try_compute(|| Ok::<_, ()>(42)).unwrap();
        let b = gate.get_or_try_compute(|| Ok::<_, ()>(7)).unwrap();
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
        assert_eq!(gate.computations(), 1);
        assert_eq!(gate.state(), CacheState::Fresh);
    }

    #[test]
    fn test_failure_leaves_gate_dirty() {
        let gate: ComputeOnce<i32> = ComputeOnce::new();
        assert!(gate.get_or_try_compute(|| Err("boom")).is_err());
        assert_eq!(gate.state(), CacheState::Dirty);
        assert_eq!(*gate.get_or_try_compute(|| Ok::<_, &str>(1)).unwrap(), 1);
        assert_eq!(gate.computations(), 2);
    }

    #[test]
    fn test_state_reports_computing_while_locked() {
        let gate = ComputeOnce::new();
        gate.get_or_try_compute(|| {
            assert_eq!(gate.state(), CacheState::Computing);
            Ok::<_, ()>(5)
        })
        .unwrap();
        assert_eq!(gate.state(), CacheState::Fresh);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let mut gate = ComputeOnce::new();
        gate.get_or_try_compute(|| Ok::<_, ()>(1)).unwrap();
        gate.invalidate();
        assert_eq!(gate.state(), CacheState::Dirty);
        assert_eq!(*gate.get_or_try_compute(|| Ok::<_, ()>(2)).unwrap(), 2);
        assert_eq!(gate.computations(), 2);
    }

    #[test]
    fn test_concurrent_queries_compute_once() {
        let gate = ComputeOnce::new();
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let v = gate
                        .get_or_try_compute(|| {
                            thread::sleep(std::time::Duration::from_millis(5));
                            Ok::<_, ()>(99)
                        })
                        .unwrap();
                    assert_eq!(*v, 99);
                });
            }
        });
        assert_eq!(gate.computations(), 1);
    }
}
