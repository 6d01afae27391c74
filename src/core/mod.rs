//! Core module - pipeline context, wiring and counters

mod engine;
mod scheduler;
mod event_bus;

pub use engine::{Engine, PipelineContext, Collaborators};
pub use scheduler::FramePacer;
pub use event_bus::{EventBus, Event, PipelineEvent};

use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Pipeline-wide counters, updated lock-free from every task
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_captured: AtomicU64,
    samples_dispatched: AtomicU64,
    samples_dropped: AtomicU64,
    detections: AtomicU64,
    alarms: AtomicU64,
    suppressed: AtomicU64,
    frames_evicted: AtomicU64,
    exports_succeeded: AtomicU64,
    exports_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub samples_dispatched: u64,
    pub samples_dropped: u64,
    pub detections: u64,
    pub alarms: u64,
    pub suppressed: u64,
    pub frames_evicted: u64,
    pub exports_succeeded: u64,
    pub exports_failed: u64,
}

impl PipelineStats {
    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.samples_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alarm(&self) {
        self.alarms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: usize) {
        self.frames_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_export(&self, ok: bool) {
        if ok {
            self.exports_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.exports_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            samples_dispatched: self.samples_dispatched.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            alarms: self.alarms.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            frames_evicted: self.frames_evicted.load(Ordering::Relaxed),
            exports_succeeded: self.exports_succeeded.load(Ordering::Relaxed),
            exports_failed: self.exports_failed.load(Ordering::Relaxed),
        }
    }
}
