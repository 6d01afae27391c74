//! Alarm module - debouncing and clip assembly around alarm instants

mod clip;
mod gate;

pub use clip::{Clip, ClipAssembler};
pub use gate::{AlarmGate, GateDecision, GateState};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::buffer::Frame;

/// A detection that passed the gate
#[derive(Debug, Clone)]
pub struct AlarmEvent {
    pub id: Uuid,
    /// Position of the triggering frame in the store
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    /// Copy of the triggering frame, independent of store retention
    pub frame: Frame,
}

impl AlarmEvent {
    pub fn new(frame: Frame, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq: frame.seq,
            timestamp: frame.timestamp,
            confidence,
            frame,
        }
    }

    /// Artifact stem derived from the alarm instant and trigger position.
    /// Unique per alarm even when alarms land within the same millisecond.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.timestamp.format("%Y_%m_%d_%H_%M_%S_%3f"), self.seq)
    }
}
