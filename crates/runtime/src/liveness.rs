use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Teardown epoch shared between a component and its in-flight completions.
///
/// Completions capture a [`LivenessGuard`] when they are scheduled and must
/// check it before touching component state. `invalidate` marks every guard
/// handed out so far as stale.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    epoch: Arc<AtomicU64>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn guard(&self) -> LivenessGuard {
        LivenessGuard {
            epoch: self.epoch(),
            shared: Arc::clone(&self.epoch),
        }
    }

    /// Returns the new epoch.
    pub fn invalidate(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug, Clone)]
pub struct LivenessGuard {
    epoch: u64,
    shared: Arc<AtomicU64>,
}

impl LivenessGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_live(&self) -> bool {
        self.shared.load(Ordering::Acquire) == self.epoch
    }
}
