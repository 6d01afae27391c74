// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Detection worker - consumes samples, runs the detector, feeds the alarm gate

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::{max_confidence, Detector, Preprocessing, SampleQueue};
use crate::alarm::{AlarmEvent, AlarmGate, GateDecision};
use crate::buffer::{Frame, FrameStore};
use crate::core::{EventBus, PipelineEvent, PipelineStats};

pub struct DetectionWorker {
    queue: Arc<SampleQueue>,
    store: Arc<FrameStore>,
    detector: Arc<Mutex<Box<dyn Detector>>>,
    preprocessing: Preprocessing,
    gate: AlarmGate,
    alarm_tx: mpsc::Sender<AlarmEvent>,
    stats: Arc<PipelineStats>,
    event_bus: Arc<EventBus>,
}

impl DetectionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<SampleQueue>,
        store: Arc<FrameStore>,
        detector: Box<dyn Detector>,
        preprocessing: Preprocessing,
        gate: AlarmGate,
        alarm_tx: mpsc::Sender<AlarmEvent>,
        stats: Arc<PipelineStats>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            queue,
            store,
            detector: Arc::new(Mutex::new(detector)),
            preprocessing,
            gate,
            alarm_tx,
            stats,
            event_bus,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting detection worker...");

        loop {
            let sample = tokio::select! {
                sample = self.queue.pop() => sample,
                _ = shutdown.recv() => {
                    info!("Detection worker shutting down...");
                    break;
                }
            };

            // copy out; the sample is only a reference and may have aged out
            let Some(frame) = self.store.copy_frame(sample.seq) else {
                debug!("Sample {} evicted before detection", sample.seq);
                continue;
            };

            let Some((frame, confidence)) = self.infer(frame).await else {
                continue;
            };
            if !self.judge(frame, confidence).await {
                break;
            }
        }

        Ok(())
    }

    /// Runs the detector off the async threads. `None` when the detector task died.
    async fn infer(&self, frame: Frame) -> Option<(Frame, Option<f32>)> {
        let detector = Arc::clone(&self.detector);
        let pre = self.preprocessing.clone();
        let seq = frame.seq;
        let joined = tokio::task::spawn_blocking(move || {
            let verdict = detector.lock().infer(&frame, &pre);
            (frame, verdict)
        })
        .await;

        let (frame, verdict) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!("Detector task for frame {} died: {}", seq, e);
                self.event_bus.publish_error(&format!("detector task died: {}", e));
                return None;
            }
        };

        let confidence = match verdict {
            Ok(detections) => max_confidence(&detections),
            Err(e) => {
                warn!("Detector failed on frame {}: {}", frame.seq, e);
                self.event_bus.publish_error(&e.to_string());
                None
            }
        };
        Some((frame, confidence))
    }

    /// Applies the gate; returns `false` once nobody receives alarms any more
    async fn judge(&mut self, frame: Frame, confidence: Option<f32>) -> bool {
        if let Some(confidence) = confidence {
            self.stats.record_detection();
            self.event_bus.publish(PipelineEvent::Detection {
                seq: frame.seq,
                frame_time: frame.timestamp,
                confidence,
            });
        }

        match self.gate.observe(frame.timestamp, confidence) {
            GateDecision::Fire => {
                let confidence = confidence.unwrap_or_default();
                let alarm = AlarmEvent::new(frame, confidence);
                info!(
                    "Alarm {} fired at {} (frame {}, confidence {:.2})",
                    alarm.id, alarm.timestamp, alarm.seq, confidence
                );
                self.stats.record_alarm();
                self.event_bus.publish(PipelineEvent::AlarmFired {
                    alarm_id: alarm.id.to_string(),
                    seq: alarm.seq,
                    frame_time: alarm.timestamp,
                    confidence,
                });
                if self.alarm_tx.send(alarm).await.is_err() {
                    warn!("Alarm channel closed");
                    return false;
                }
            }
            GateDecision::Suppressed => {
                let confidence = confidence.unwrap_or_default();
                debug!("Alarm suppressed during cooldown (frame {}, {:.2})", frame.seq, confidence);
                self.stats.record_suppressed();
                self.event_bus.publish(PipelineEvent::AlarmSuppressed {
                    seq: frame.seq,
                    frame_time: frame.timestamp,
                    confidence,
                });
            }
            GateDecision::Ignored => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::{at_ms, push};
    use crate::detection::{FrameSample, ScriptedDetector};
    use crate::error::DetectorError;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    fn worker(
        store: &Arc<FrameStore>,
        queue: &Arc<SampleQueue>,
        detector: Box<dyn Detector>,
        alarm_tx: mpsc::Sender<AlarmEvent>,
    ) -> (DetectionWorker, Arc<PipelineStats>) {
        let stats = Arc::new(PipelineStats::default());
        let worker = DetectionWorker::new(
            Arc::clone(queue),
            Arc::clone(store),
            detector,
            Preprocessing::for_model(Path::new("net.pb")),
            AlarmGate::new(0.5, Duration::from_secs(10)),
            alarm_tx,
            Arc::clone(&stats),
            Arc::new(EventBus::new(32)),
        );
        (worker, stats)
    }

    #[tokio::test]
    async fn test_confidence_sequence_fires_once() {
        let store = Arc::new(FrameStore::new());
        let queue = Arc::new(SampleQueue::new(8));
        let confidences: HashMap<u64, f32> = [(0, 0.1), (1, 0.9), (2, 0.95), (3, 0.2)].into_iter().collect();
        let detector = ScriptedDetector::new(move |frame| Ok(confidences.get(&frame.seq).copied()));

        let (alarm_tx, mut alarm_rx) = mpsc::channel(4);
        let (worker, stats) = worker(&store, &queue, Box::new(detector), alarm_tx);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        for i in 0..4 {
            let meta = push(&store, i * 1000);
            queue.push(FrameSample::from(meta));
        }

        let alarm = tokio::time::timeout(Duration::from_secs(5), alarm_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alarm.seq, 1);
        assert_eq!(alarm.timestamp, at_ms(1000));
        assert_eq!(alarm.confidence, 0.9);

        while stats.snapshot().detections < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert!(alarm_rx.try_recv().is_err());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.alarms, 1);
        assert_eq!(snapshot.suppressed, 1);
    }

    #[tokio::test]
    async fn test_evicted_sample_is_skipped() {
        let store = Arc::new(FrameStore::new());
        let queue = Arc::new(SampleQueue::new(8));
        let detector = ScriptedDetector::new(|_| Ok(Some(1.0)));
        let (alarm_tx, mut alarm_rx) = mpsc::channel(4);
        let (worker, _stats) = worker(&store, &queue, Box::new(detector), alarm_tx);

        let stale = push(&store, 0);
        let fresh = push(&store, 100);
        store.remove_oldest();
        queue.push(stale.into());
        queue.push(fresh.into());

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(worker.run(shutdown_rx));

        let alarm = alarm_rx.recv().await.unwrap();
        assert_eq!(alarm.seq, fresh.seq);
    }

    #[tokio::test]
    async fn test_detector_error_is_not_fatal() {
        let store = Arc::new(FrameStore::new());
        let queue = Arc::new(SampleQueue::new(8));
        let detector = ScriptedDetector::new(|frame| {
            if frame.seq == 0 {
                Err(DetectorError::Inference("bad blob".to_string()))
            } else {
                Ok(Some(0.7))
            }
        });
        let (alarm_tx, mut alarm_rx) = mpsc::channel(4);
        let (worker, _stats) = worker(&store, &queue, Box::new(detector), alarm_tx);

        for i in 0..2 {
            queue.push(push(&store, i * 100).into());
        }

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(worker.run(shutdown_rx));

        assert_eq!(alarm_rx.recv().await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_detector_panic_is_not_fatal() {
        let store = Arc::new(FrameStore::new());
        let queue = Arc::new(SampleQueue::new(8));
        let detector = ScriptedDetector::new(|frame| {
            if frame.seq == 0 {
                panic!("detector crashed");
            }
            Ok(Some(0.8))
        });
        let (alarm_tx, mut alarm_rx) = mpsc::channel(4);
        let (worker, stats) = worker(&store, &queue, Box::new(detector), alarm_tx);

        for i in 0..2 {
            queue.push(push(&store, i * 100).into());
        }

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        let alarm = tokio::time::timeout(Duration::from_secs(5), alarm_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alarm.seq, 1);
        assert_eq!(stats.snapshot().alarms, 1);
        assert!(!handle.is_finished());
    }
}
