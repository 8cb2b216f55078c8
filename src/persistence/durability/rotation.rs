use crate::persistence::durability::health::{HealthError, HealthMonitor};
use crate::persistence::storage::segment::{
    LogFileInformation, LogSegmentStore, SegmentError, SegmentHandle, SegmentSection,
};
use crate::telemetry::{MetricsRegistry, MetricsSnapshot};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const ROTATION_LATENCY_CEILING_MS: u64 = 60_000;

/// Wall-clock source in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .min(u128::from(u64::MAX)) as u64
    }
}

/// Tracing hook carried by the append that triggered a rotation.
pub trait AppendEvent {
    fn rotation_completed(&self, _elapsed_ms: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAppendEvent;

impl AppendEvent for NullAppendEvent {}

/// Everything known about one finished rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub new_segment: SegmentHandle,
    pub previous_version: u64,
    /// Transaction mid-commit when the rotation ran. Informational only.
    pub committing_tx_id: u64,
    pub elapsed_ms: u64,
    /// Zero for the first rotation of the process.
    pub millis_since_last_rotation: u64,
}

pub trait RotationMonitor: Send + Sync {
    fn started(&self, _current_version: u64) {}
    fn finished(&self, _report: &RotationReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullRotationMonitor;

impl RotationMonitor for NullRotationMonitor {}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRotationMonitor;

impl RotationMonitor for LoggingRotationMonitor {
    fn started(&self, current_version: u64) {
        info!(
            "event=wal_rotation_started current_version={}",
            current_version
        );
    }

    fn finished(&self, report: &RotationReport) {
        info!(
            "event=wal_rotation_finished previous_version={} new_version={} path={} committing_tx_id={} elapsed_ms={} since_last_ms={}",
            report.previous_version,
            report.new_segment.version,
            report.new_segment.path.display(),
            report.committing_tx_id,
            report.elapsed_ms,
            report.millis_since_last_rotation
        );
    }
}

/// Publishes rotation counts, the highest version and rotation latency.
#[derive(Debug)]
pub struct MetricsRotationMonitor {
    registry: Mutex<MetricsRegistry>,
}

impl MetricsRotationMonitor {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            registry: Mutex::new(MetricsRegistry::new(namespace)),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.registry.lock().snapshot()
    }
}

impl RotationMonitor for MetricsRotationMonitor {
    fn finished(&self, report: &RotationReport) {
        let mut registry = self.registry.lock();
        registry.increment("wal.rotations");
        registry.set_gauge("wal.highest_version", report.new_segment.version);
        registry
            .latency("wal.rotation_ms", ROTATION_LATENCY_CEILING_MS)
            .record(report.elapsed_ms);
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle = 0,
    Checking = 1,
    RotationInProgress = 2,
}

impl RotationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RotationState::Checking,
            2 => RotationState::RotationInProgress,
            _ => RotationState::Idle,
        }
    }
}

/// Decides when the active segment rotates and performs the rotation.
///
/// Rotation runs inside the segment store's exclusive section, the same one
/// that guards explicit flushes, so a flush never sees a half-rotated writer.
pub struct RotationController {
    segments: Arc<LogSegmentStore>,
    health: HealthMonitor,
    monitor: Arc<dyn RotationMonitor>,
    clock: Arc<dyn Clock>,
    state: AtomicU8,
    // Only touched inside the segment section.
    last_rotation_completed: Mutex<Option<u64>>,
}

impl RotationController {
    pub fn new(
        segments: Arc<LogSegmentStore>,
        health: HealthMonitor,
        monitor: Arc<dyn RotationMonitor>,
    ) -> Self {
        Self::with_clock(segments, health, monitor, Arc::new(SystemClock))
    }

    pub fn with_clock(
        segments: Arc<LogSegmentStore>,
        health: HealthMonitor,
        monitor: Arc<dyn RotationMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            segments,
            health,
            monitor,
            clock,
            state: AtomicU8::new(RotationState::Idle as u8),
            last_rotation_completed: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RotationState {
        RotationState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn segments(&self) -> &Arc<LogSegmentStore> {
        &self.segments
    }

    /// Rotates when the active segment crossed its threshold.
    ///
    /// The first check is lock-free; the predicate is re-checked inside the
    /// exclusive section so concurrent callers produce a single rotation.
    pub fn rotate_if_needed(&self, event: &dyn AppendEvent) -> Result<bool, RotationError> {
        if !self.segments.rotation_needed() {
            return Ok(false);
        }
        let mut section = self.segments.lock();
        self.set_state(RotationState::Checking);
        if !section.rotation_needed() {
            self.set_state(RotationState::Idle);
            return Ok(false);
        }
        let outcome = self.do_rotate(&mut section, event);
        self.set_state(RotationState::Idle);
        outcome.map(|_| true)
    }

    /// Unconditional rotation under the exclusive section.
    pub fn rotate_log_file(&self, event: &dyn AppendEvent) -> Result<RotationReport, RotationError> {
        let mut section = self.segments.lock();
        let outcome = self.do_rotate(&mut section, event);
        self.set_state(RotationState::Idle);
        outcome
    }

    fn do_rotate(
        &self,
        section: &mut SegmentSection<'_>,
        event: &dyn AppendEvent,
    ) -> Result<RotationReport, RotationError> {
        if let Err(err) = self.health.assert_healthy() {
            warn!(
                "event=wal_rotation_aborted version={} error={}",
                section.active_segment().version,
                err
            );
            return Err(err.into());
        }
        let previous_version = section.active_segment().version;
        let start = self.clock.now_millis();
        self.monitor.started(previous_version);
        self.set_state(RotationState::RotationInProgress);

        let new_segment = section.rotate()?;
        let committing_tx_id = self.segments.committing_entry_id();

        let mut last_completed = self.last_rotation_completed.lock();
        let millis_since_last_rotation = last_completed
            .map(|last| start.saturating_sub(last))
            .unwrap_or(0);
        let completed = self.clock.now_millis();
        *last_completed = Some(completed);
        drop(last_completed);

        let elapsed_ms = completed.saturating_sub(start);
        event.rotation_completed(elapsed_ms);
        let report = RotationReport {
            new_segment,
            previous_version,
            committing_tx_id,
            elapsed_ms,
            millis_since_last_rotation,
        };
        self.monitor.finished(&report);
        Ok(report)
    }

    fn set_state(&self, state: RotationState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Unhealthy(#[from] HealthError),
    #[error("log rotation failed: {0}")]
    Segment(#[from] SegmentError),
}
