use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// External stop signal, polled by decoders once before every step.
///
/// A cancelled search still returns everything decoded so far, with
/// `Completion::Cancelled`.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<C: Cancellation + ?Sized> Cancellation for Arc<C> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Cancels once `limit` checks have been made; lets tests stop a search after
/// an exact number of steps.
#[derive(Debug)]
pub struct CancelAfter {
    limit: usize,
    checks: AtomicUsize,
}

impl CancelAfter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            checks: AtomicUsize::new(0),
        }
    }
}

impl Cancellation for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.checks.fetch_add(1, Ordering::Relaxed) >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_after() {
        let c = CancelAfter::new(2);
        assert!(!c.is_cancelled());
        assert!(!c.is_cancelled());
        assert!(c.is_cancelled());
    }
}
