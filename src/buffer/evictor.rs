// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Background trimming of frames past the retention window

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{to_delta, FrameStore};
use crate::core::{EventBus, PipelineEvent, PipelineStats};

/// Removes the oldest frames while they are older than the retention window
pub struct Evictor {
    store: Arc<FrameStore>,
    retention: chrono::Duration,
    tick: Duration,
    stats: Arc<PipelineStats>,
    event_bus: Arc<EventBus>,
}

impl Evictor {
    pub fn new(
        store: Arc<FrameStore>,
        retention: Duration,
        tick: Duration,
        stats: Arc<PipelineStats>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            retention: to_delta(retention),
            tick,
            stats,
            event_bus,
        }
    }

    /// Evicts until the front frame is within the window or the store is empty
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        while let Some(frame) = self
            .store
            .remove_oldest_if(|oldest| now - oldest.timestamp > self.retention)
        {
            // pixels are released here
            drop(frame);
            evicted += 1;
        }

        if evicted > 0 {
            self.stats.record_evicted(evicted);
            self.event_bus.publish(PipelineEvent::FramesEvicted {
                count: evicted,
                retained: self.store.len(),
            });
            debug!("Evicted {} frames, {} retained", evicted, self.store.len());
        }
        evicted
    }

    /// Sweeps on every new-frame signal and on a periodic tick.
    ///
    /// The signal carries the newest capture timestamp; between signals the clock
    /// is advanced by wall time so a stalled producer still gets trimmed.
    pub async fn run(
        self,
        mut newest: watch::Receiver<Option<DateTime<Utc>>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Starting evictor (retention {}s)", self.retention.num_milliseconds() as f64 / 1000.0);

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_signal: Option<(DateTime<Utc>, Instant)> = None;

        loop {
            tokio::select! {
                changed = newest.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let stamp = *newest.borrow_and_update();
                    if let Some(now) = stamp {
                        last_signal = Some((now, Instant::now()));
                        self.sweep(now);
                    }
                }
                _ = ticker.tick() => {
                    if let Some((stamp, seen)) = last_signal {
                        self.sweep(stamp + to_delta(seen.elapsed()));
                    }
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        info!("Evictor stopped");
    }
}
