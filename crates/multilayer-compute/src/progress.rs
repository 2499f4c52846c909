//! Progress reporting for indexed task runs.
//!
//! Workers call [`ProgressCounter::tick`] from arbitrary threads; the counter
//! accumulates completions atomically and forwards a [`Progress`] snapshot to
//! the user callback, which therefore has to be `Sync`.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty run counts as finished.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Thread-safe completion counter wrapping an optional callback.
pub struct ProgressCounter<'a> {
    completed: AtomicUsize,
    total: usize,
    callback: Option<&'a (dyn Fn(Progress) + Sync)>,
}

impl<'a> ProgressCounter<'a> {
    pub fn new(total: usize, callback: Option<&'a (dyn Fn(Progress) + Sync)>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            callback,
        }
    }

    /// Record one finished task and report.
    pub fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(callback) = self.callback {
            callback(Progress {
                completed,
                total: self.total,
            });
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComputeBackend, SerialBackend};
    use std::sync::Mutex;

    #[test]
    fn test_counter_reports_every_completion() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: Progress| seen.lock().unwrap().push(p.completed);
        let counter = ProgressCounter::new(4, Some(&callback));
        SerialBackend.run_indexed(4, &|_| counter.tick());

        assert_eq!(counter.completed(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fraction_of_empty_run_is_complete() {
        let p = Progress { completed: 0, total: 0 };
        assert_eq!(p.fraction(), 1.0);
    }
}
