use log::{error, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Shared durability-health cell.
///
/// Handles are cheap clones of one `Arc`; every component that must refuse to
/// mutate a corrupt store gets a handle at construction time. The transition
/// to unhealthy is one-way for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    inner: Arc<HealthInner>,
}

#[derive(Debug, Default)]
struct HealthInner {
    unhealthy: AtomicBool,
    cause: Mutex<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy { cause: String },
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the store unhealthy. Only the first cause is retained.
    pub fn panic(&self, cause: impl Into<String>) {
        let cause = cause.into();
        let mut slot = self.inner.cause.lock();
        if let Some(existing) = slot.as_ref() {
            warn!(
                "event=store_health_panic_ignored first_cause={} cause={}",
                existing, cause
            );
            return;
        }
        error!("event=store_health_panic cause={}", cause);
        *slot = Some(cause);
        self.inner.unhealthy.store(true, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        !self.inner.unhealthy.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> HealthState {
        if self.is_healthy() {
            return HealthState::Healthy;
        }
        HealthState::Unhealthy {
            cause: self.cause().unwrap_or_default(),
        }
    }

    pub fn cause(&self) -> Option<String> {
        self.inner.cause.lock().clone()
    }

    pub fn assert_healthy(&self) -> Result<(), HealthError> {
        if self.is_healthy() {
            return Ok(());
        }
        Err(HealthError::Unhealthy {
            cause: self.cause().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("store is unhealthy: {cause}")]
    Unhealthy { cause: String },
}
