// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Fixed-stride sampling and the lossy detection queue

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam::queue::ArrayQueue;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::buffer::FrameMeta;
use crate::core::{EventBus, PipelineEvent, PipelineStats};

/// Reference to a stored frame selected for detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<FrameMeta> for FrameSample {
    fn from(meta: FrameMeta) -> Self {
        Self {
            seq: meta.seq,
            timestamp: meta.timestamp,
        }
    }
}

/// Picks every `stride`-th frame, starting with the first
#[derive(Debug, Clone)]
pub struct Sampler {
    stride: u64,
    count: u64,
}

impl Sampler {
    pub fn new(stride: u32) -> Self {
        Self {
            stride: stride.max(1) as u64,
            count: 0,
        }
    }

    pub fn should_sample(&mut self) -> bool {
        let hit = self.count % self.stride == 0;
        self.count += 1;
        hit
    }
}

/// Bounded single-consumer queue that drops the oldest sample when full
pub struct SampleQueue {
    queue: ArrayQueue<FrameSample>,
    ready: Notify,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            ready: Notify::new(),
        }
    }

    /// Enqueues without blocking; returns the sample displaced to make room
    pub fn push(&self, sample: FrameSample) -> Option<FrameSample> {
        let dropped = self.queue.force_push(sample);
        self.ready.notify_one();
        dropped
    }

    pub fn try_pop(&self) -> Option<FrameSample> {
        self.queue.pop()
    }

    /// Waits for the next sample
    pub async fn pop(&self) -> FrameSample {
        loop {
            if let Some(sample) = self.queue.pop() {
                return sample;
            }
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Capture-side half of detection: sampling plus best-effort enqueue
pub struct Dispatcher {
    sampler: Sampler,
    queue: Arc<SampleQueue>,
    stats: Arc<PipelineStats>,
    event_bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(
        stride: u32,
        queue: Arc<SampleQueue>,
        stats: Arc<PipelineStats>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sampler: Sampler::new(stride),
            queue,
            stats,
            event_bus,
        }
    }

    /// Offers a freshly stored frame; returns whether it was sampled
    pub fn offer(&mut self, meta: FrameMeta) -> bool {
        if !self.sampler.should_sample() {
            return false;
        }

        self.stats.record_dispatch();
        if let Some(dropped) = self.queue.push(meta.into()) {
            self.stats.record_dropped();
            self.event_bus.publish(PipelineEvent::SampleDropped { seq: dropped.seq });
            debug!("Detection queue full, dropped sample {}", dropped.seq);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::at_ms;

    fn sample(seq: u64) -> FrameSample {
        FrameSample { seq, timestamp: at_ms(seq as i64 * 33) }
    }

    #[test]
    fn test_stride_picks_every_nth() {
        let mut sampler = Sampler::new(10);
        let picked: Vec<usize> = (0..35).filter(|_| sampler.should_sample()).collect();
        assert_eq!(picked, vec![0, 10, 20, 30]);

        let mut every = Sampler::new(1);
        assert!((0..5).all(|_| every.should_sample()));
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let queue = SampleQueue::new(2);
        assert!(queue.push(sample(1)).is_none());
        assert!(queue.push(sample(2)).is_none());
        assert_eq!(queue.push(sample(3)), Some(sample(1)));

        assert_eq!(queue.try_pop(), Some(sample(2)));
        assert_eq!(queue.try_pop(), Some(sample(3)));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(SampleQueue::new(4));
        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            producer.push(sample(7));
        });

        assert_eq!(queue.pop().await, sample(7));
    }

    #[test]
    fn test_dispatcher_counts_drops() {
        let queue = Arc::new(SampleQueue::new(1));
        let stats = Arc::new(PipelineStats::default());
        let mut dispatcher = Dispatcher::new(2, Arc::clone(&queue), Arc::clone(&stats), Arc::new(EventBus::new(8)));

        let sampled = (0..6)
            .filter(|i| dispatcher.offer(FrameMeta { seq: *i, timestamp: at_ms(*i as i64) }))
            .count();

        assert_eq!(sampled, 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_dispatched, 3);
        assert_eq!(snapshot.samples_dropped, 2);
        assert_eq!(queue.try_pop().map(|s| s.seq), Some(4));
    }
}
