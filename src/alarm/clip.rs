// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Extraction of the before/after window around an alarm

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info};

use super::AlarmEvent;
use crate::buffer::{to_delta, Frame, FrameStore};

/// Frames covering `[alarm - W, alarm + W]`, strictly time-ordered
#[derive(Debug, Clone)]
pub struct Clip {
    pub alarm_time: DateTime<Utc>,
    pub frames: Vec<Frame>,
    /// Forward window cut short by the wait timeout or end of stream
    pub partial: bool,
}

impl Clip {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.frames.first().map(|f| f.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.frames.last().map(|f| f.timestamp)
    }

    pub fn duration(&self) -> chrono::Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end - start,
            _ => chrono::Duration::zero(),
        }
    }
}

/// Copies the alarm window out of the live store
pub struct ClipAssembler {
    store: Arc<FrameStore>,
    window: chrono::Duration,
    timeout: Duration,
}

impl ClipAssembler {
    /// The forward wait is bounded by twice the window
    pub fn new(store: Arc<FrameStore>, window: Duration) -> Self {
        Self {
            store,
            window: to_delta(window),
            timeout: window * 2,
        }
    }

    pub async fn assemble(&self, alarm: &AlarmEvent) -> Clip {
        let t_a = alarm.timestamp;
        let start = t_a - self.window;
        let end = t_a + self.window;
        let deadline = Instant::now() + self.timeout;

        let mut frames = self
            .store
            .copy_backward_while(alarm.seq, |m| m.timestamp >= start);

        // the store may have dropped the trigger already; the alarm carries its own copy
        if frames.last().map(|f| f.seq) != Some(alarm.seq) {
            frames.retain(|f| f.seq < alarm.seq);
            frames.push(alarm.frame.clone());
        }

        let mut last_seq = alarm.seq;
        let mut partial = false;
        loop {
            let (batch, stopped) = self
                .store
                .copy_forward_while(last_seq, |m| m.timestamp <= end);
            let covered = stopped || batch.last().map(|f| f.timestamp >= end).unwrap_or(false);
            if let Some(newest) = batch.last() {
                last_seq = newest.seq;
            }
            frames.extend(batch);

            if covered {
                break;
            }
            if !self.store.wait_for_append(last_seq, deadline).await {
                partial = true;
                debug!("Forward window for alarm {} cut short", alarm.id);
                break;
            }
        }

        let clip = Clip {
            alarm_time: t_a,
            frames: collapse_duplicates(frames, alarm.seq),
            partial,
        };
        info!(
            "Assembled clip for alarm {}: {} frames over {:.2}s{}",
            alarm.id,
            clip.len(),
            clip.duration().num_milliseconds() as f64 / 1000.0,
            if clip.partial { " (partial)" } else { "" }
        );
        clip
    }
}

/// Keeps the first frame of each timestamp, except that the trigger wins its slot
fn collapse_duplicates(frames: Vec<Frame>, trigger: u64) -> Vec<Frame> {
    let mut out: Vec<Frame> = Vec::with_capacity(frames.len());
    for frame in frames {
        match out.last_mut() {
            Some(prev) if prev.timestamp == frame.timestamp => {
                if frame.seq == trigger {
                    *prev = frame;
                }
            }
            _ => out.push(frame),
        }
    }
    out
}
