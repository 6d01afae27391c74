// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Per-alarm export: still and clip in parallel, then one notification

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{info, warn};

use super::{ExportConfig, ExportReport, MediaExporter, Notifier, Uploader};
use crate::alarm::{AlarmEvent, ClipAssembler};
use crate::core::{EventBus, PipelineEvent, PipelineStats};
use crate::error::ExportError;

/// Outcome of the clip branch
struct ClipOutcome {
    frames: usize,
    partial: bool,
    url: Result<String, ExportError>,
}

pub struct ExportCoordinator {
    assembler: ClipAssembler,
    exporter: Arc<dyn MediaExporter>,
    uploader: Arc<dyn Uploader>,
    notifier: Arc<dyn Notifier>,
    frame_rate: f64,
    subject: String,
    keep_artifacts: bool,
    stats: Arc<PipelineStats>,
    event_bus: Arc<EventBus>,
}

impl ExportCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assembler: ClipAssembler,
        exporter: Arc<dyn MediaExporter>,
        uploader: Arc<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
        config: &ExportConfig,
        frame_rate: f64,
        stats: Arc<PipelineStats>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            assembler,
            exporter,
            uploader,
            notifier,
            frame_rate,
            subject: config.subject.clone(),
            keep_artifacts: config.keep_artifacts,
            stats,
            event_bus,
        }
    }

    /// Runs the whole export cycle for one alarm. Failures are reported, never raised.
    pub async fn handle(&self, alarm: AlarmEvent) -> ExportReport {
        let (image, clip) = tokio::join!(self.export_still(&alarm), self.export_clip(&alarm));
        let ClipOutcome { frames, partial, url } = clip;

        let image_url = image
            .map_err(|e| warn!("Still export for alarm {} failed: {}", alarm.id, e))
            .ok();
        let clip_url = url
            .map_err(|e| warn!("Clip export for alarm {} failed: {}", alarm.id, e))
            .ok();

        let notified = if image_url.is_none() && clip_url.is_none() {
            warn!("Nothing exported for alarm {}, skipping notification", alarm.id);
            false
        } else {
            let (subject, body) = self.compose(&alarm, image_url.as_deref(), clip_url.as_deref(), frames, partial);
            match self.notifier.notify(&subject, &body).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Notification for alarm {} failed: {}", alarm.id, e);
                    false
                }
            }
        };

        let report = ExportReport {
            alarm_id: alarm.id.to_string(),
            alarm_time: alarm.timestamp,
            image_url,
            clip_url,
            clip_frames: frames,
            partial,
            notified,
        };

        self.stats.record_export(report.succeeded());
        self.event_bus.publish(PipelineEvent::ExportFinished(report.clone()));
        info!(
            "Export for alarm {} finished (image: {}, clip: {}, notified: {})",
            report.alarm_id,
            report.image_url.is_some(),
            report.clip_url.is_some(),
            report.notified
        );
        report
    }

    async fn export_still(&self, alarm: &AlarmEvent) -> Result<String, ExportError> {
        let exporter = Arc::clone(&self.exporter);
        let frame = alarm.frame.clone();
        let stem = alarm.file_stem();

        let written = tokio::task::spawn_blocking(move || exporter.write_image(&frame, &stem)).await;
        self.publish(flatten(written)?).await
    }

    async fn export_clip(&self, alarm: &AlarmEvent) -> ClipOutcome {
        let clip = self.assembler.assemble(alarm).await;
        let (frames, partial) = (clip.len(), clip.partial);

        let exporter = Arc::clone(&self.exporter);
        let frame_rate = self.frame_rate;
        let stem = alarm.file_stem();
        let written =
            tokio::task::spawn_blocking(move || exporter.write_clip(&clip.frames, frame_rate, &stem)).await;

        let url = match flatten(written) {
            Ok(path) => self.publish(path).await,
            Err(e) => Err(e),
        };
        ClipOutcome { frames, partial, url }
    }

    /// Uploads, then drops the local copy unless told to keep it
    async fn publish(&self, path: PathBuf) -> Result<String, ExportError> {
        let url = self.uploader.upload(&path).await?;
        if !self.keep_artifacts {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Could not remove {:?}: {}", path, e);
            }
        }
        Ok(url)
    }

    fn compose(
        &self,
        alarm: &AlarmEvent,
        image_url: Option<&str>,
        clip_url: Option<&str>,
        frames: usize,
        partial: bool,
    ) -> (String, String) {
        let subject = format!("{} at {}", self.subject, alarm.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));

        let mut body = format!("Detection confidence {:.2}\n", alarm.confidence);
        match image_url {
            Some(url) => body.push_str(&format!("Image: {}\n", url)),
            None => body.push_str("Image: unavailable\n"),
        }
        match clip_url {
            Some(url) => body.push_str(&format!(
                "Clip: {} ({} frames{})\n",
                url,
                frames,
                if partial { ", partial" } else { "" }
            )),
            None => body.push_str("Clip: unavailable\n"),
        }
        (subject, body)
    }
}

fn flatten<T>(joined: Result<Result<T, ExportError>, JoinError>) -> Result<T, ExportError> {
    joined.map_err(|e| ExportError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::{at_ms, push};
    use crate::buffer::FrameStore;
    use crate::export::tests::{MemoryExporter, MemoryUploader, RecordingNotifier};
    use std::time::Duration;

    fn coordinator(
        store: &Arc<FrameStore>,
        exporter: Arc<MemoryExporter>,
        uploader: MemoryUploader,
        notifier: Arc<RecordingNotifier>,
    ) -> ExportCoordinator {
        let config = ExportConfig {
            keep_artifacts: true,
            ..ExportConfig::default()
        };
        ExportCoordinator::new(
            ClipAssembler::new(Arc::clone(store), Duration::from_secs(1)),
            exporter,
            Arc::new(uploader),
            notifier,
            &config,
            10.0,
            Arc::new(PipelineStats::default()),
            Arc::new(EventBus::new(16)),
        )
    }

    /// 0..=2s at 10 fps, alarm at 1s
    fn filled_store() -> (Arc<FrameStore>, AlarmEvent) {
        let store = Arc::new(FrameStore::new());
        for i in 0..=20 {
            push(&store, i * 100);
        }
        let trigger = store.copy_frame(10).unwrap();
        (store, AlarmEvent::new(trigger, 0.9))
    }

    #[tokio::test]
    async fn test_both_branches_succeed() {
        let (store, alarm) = filled_store();
        let exporter = Arc::new(MemoryExporter::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(&store, Arc::clone(&exporter), MemoryUploader::default(), Arc::clone(&notifier));

        let report = coordinator.handle(alarm.clone()).await;

        assert!(report.succeeded());
        assert!(report.notified);
        assert!(!report.partial);
        assert_eq!(report.clip_frames, 21);
        assert_eq!(report.image_url.as_deref(), Some("mem://2026_03_01_12_00_01_000_10.ppm"));

        let clips = exporter.clips.lock();
        assert_eq!(clips[0].first().unwrap().timestamp, at_ms(0));
        assert_eq!(clips[0].last().unwrap().timestamp, at_ms(2000));
        assert_eq!(exporter.images.lock()[0].seq, alarm.seq);

        let messages = notifier.messages.lock();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("mem://2026_03_01_12_00_01_000_10.y4m"));
    }

    #[tokio::test]
    async fn test_failed_clip_still_notifies_with_image() {
        let (store, alarm) = filled_store();
        let exporter = Arc::new(MemoryExporter {
            fail_clip: true,
            ..MemoryExporter::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(&store, exporter, MemoryUploader::default(), Arc::clone(&notifier));

        let report = coordinator.handle(alarm).await;

        assert!(report.image_url.is_some());
        assert!(report.clip_url.is_none());
        assert!(report.notified);
        assert!(notifier.messages.lock()[0].1.contains("Clip: unavailable"));
    }

    #[tokio::test]
    async fn test_failed_still_notifies_with_clip() {
        let (store, alarm) = filled_store();
        let exporter = Arc::new(MemoryExporter {
            fail_image: true,
            ..MemoryExporter::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(&store, Arc::clone(&exporter), MemoryUploader::default(), Arc::clone(&notifier));

        let report = coordinator.handle(alarm).await;

        assert!(report.image_url.is_none());
        assert_eq!(report.clip_url.as_deref(), Some("mem://2026_03_01_12_00_01_000_10.y4m"));
        assert!(report.notified);
        assert!(exporter.images.lock().is_empty());
        assert_eq!(exporter.clips.lock().len(), 1);

        let messages = notifier.messages.lock();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("Image: unavailable"));
        assert!(messages[0].1.contains("Clip: mem://2026_03_01_12_00_01_000_10.y4m (21 frames)"));
    }

    #[tokio::test]
    async fn test_nothing_uploaded_skips_notification() {
        let (store, alarm) = filled_store();
        let notifier = Arc::new(RecordingNotifier::default());
        let uploader = MemoryUploader { fail: true };
        let coordinator = coordinator(&store, Arc::new(MemoryExporter::default()), uploader, Arc::clone(&notifier));

        let report = coordinator.handle(alarm).await;

        assert!(report.image_url.is_none());
        assert!(report.clip_url.is_none());
        assert!(!report.notified);
        assert!(notifier.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_local_artifacts_removed_after_upload() {
        let dir = std::env::temp_dir().join(format!("alarmcam-coord-{}", uuid::Uuid::new_v4()));
        let (store, alarm) = filled_store();
        let exporter = Arc::new(crate::export::FileExporter::new(&dir).unwrap());
        let coordinator = ExportCoordinator::new(
            ClipAssembler::new(Arc::clone(&store), Duration::from_secs(1)),
            exporter,
            Arc::new(MemoryUploader::default()),
            Arc::new(RecordingNotifier::default()),
            &ExportConfig::default(),
            10.0,
            Arc::new(PipelineStats::default()),
            Arc::new(EventBus::new(16)),
        );

        let report = coordinator.handle(alarm).await;

        assert!(report.succeeded());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
