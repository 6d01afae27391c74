// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Event bus for pipeline observers

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::export::ExportReport;

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: PipelineEvent,
}

/// Everything the pipeline announces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    SampleDropped { seq: u64 },
    Detection { seq: u64, frame_time: DateTime<Utc>, confidence: f32 },
    AlarmFired { alarm_id: String, seq: u64, frame_time: DateTime<Utc>, confidence: f32 },
    AlarmSuppressed { seq: u64, frame_time: DateTime<Utc>, confidence: f32 },
    FramesEvicted { count: usize, retained: usize },
    ExportFinished(ExportReport),
    Error { message: String },
}

/// Broadcast bus; publishing never blocks and is a no-op without subscribers
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, payload: PipelineEvent) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn publish_error(&self, message: &str) {
        self.publish(PipelineEvent::Error {
            message: message.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}
