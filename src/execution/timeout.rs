//! Query Deadline Module
//!
//! Cooperative deadline and cancellation for query execution. The join
//! engine holds no locks and performs no writes, so cancellation is just a
//! shared atomic flag that the engine polls at every recursion step and
//! every fact-list iteration; the HTTP layer keeps a [`CancelHandle`] to
//! flip the flag when the client disconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deadline error
#[derive(Debug, Clone, thiserror::Error)]
#[error("query exceeded timeout of {timeout:?} (ran for {elapsed:?})")]
pub struct TimeoutError {
    /// The deadline that was exceeded
    pub timeout: Duration,
    /// How long the query actually ran
    pub elapsed: Duration,
}

/// Deadline controller for one query execution.
///
/// Cloning shares the cancellation flag, so a clone (or a handle) can stop
/// the original from another thread.
#[derive(Clone)]
pub struct QueryTimeout {
    cancelled: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Duration>,
}

impl QueryTimeout {
    pub fn new(deadline: Option<Duration>) -> Self {
        QueryTimeout {
            cancelled: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline,
        }
    }

    /// A controller that never expires (still cancellable).
    pub fn unbounded() -> Self {
        QueryTimeout::new(None)
    }

    /// Poll the guard; called between fact iterations.
    ///
    /// Returns `Err` once the deadline has elapsed or the query was
    /// cancelled, after which every subsequent call also fails.
    pub fn check(&self) -> Result<(), TimeoutError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(TimeoutError {
                timeout: self.deadline.unwrap_or(Duration::ZERO),
                elapsed: self.started.elapsed(),
            });
        }

        if let Some(deadline) = self.deadline {
            let elapsed = self.started.elapsed();
            if elapsed > deadline {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(TimeoutError {
                    timeout: deadline,
                    elapsed,
                });
            }
        }

        Ok(())
    }

    /// Cancel the query explicitly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// A handle that can cancel this query from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl Default for QueryTimeout {
    fn default() -> Self {
        QueryTimeout::new(Some(Duration::from_secs(5)))
    }
}

/// Handle for cancelling an in-flight query (e.g. on client disconnect).
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_guard_passes() {
        let guard = QueryTimeout::new(Some(Duration::from_secs(10)));
        assert!(guard.check().is_ok());
        assert!(!guard.is_cancelled());
    }

    #[test]
    fn test_unbounded_never_expires() {
        let guard = QueryTimeout::unbounded();
        assert!(guard.check().is_ok());
    }

    #[test]
    fn test_deadline_expiry() {
        let guard = QueryTimeout::new(Some(Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(100));

        let err = guard.check().unwrap_err();
        assert_eq!(err.timeout, Duration::from_millis(20));
        assert!(err.elapsed >= Duration::from_millis(20));

        // Expiry latches: later polls keep failing.
        assert!(guard.check().is_err());
    }

    #[test]
    fn test_explicit_cancel() {
        let guard = QueryTimeout::new(Some(Duration::from_secs(10)));
        guard.cancel();
        assert!(guard.is_cancelled());
        assert!(guard.check().is_err());
    }

    #[test]
    fn test_cancel_handle_cross_thread() {
        let guard = QueryTimeout::new(Some(Duration::from_secs(10)));
        let handle = guard.cancel_handle();

        let t = thread::spawn(move || handle.cancel());
        t.join().unwrap();

        assert!(guard.is_cancelled());
        assert!(guard.check().is_err());
    }

    #[test]
    fn test_clone_shares_cancel_state() {
        let guard = QueryTimeout::new(Some(Duration::from_secs(10)));
        let cloned = guard.clone();
        guard.cancel();
        assert!(cloned.is_cancelled());
    }
}
