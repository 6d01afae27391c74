// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Pipeline engine - owns the shared state and wires the tasks together

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::{Event, EventBus, FramePacer, PipelineStats, StatsSnapshot};
use crate::alarm::{AlarmEvent, AlarmGate, ClipAssembler};
use crate::buffer::{Evictor, FrameStore};
use crate::config::Config;
use crate::detection::{load_detector, DetectionWorker, Detector, DetectorSpec, Dispatcher, Preprocessing, SampleQueue};
use crate::export::{
    build_notifier, build_uploader, ExportCoordinator, ExportReport, FileExporter, MediaExporter, Notifier, Uploader,
};
use crate::source::{open_source, FrameSource};

/// Shared handles every pipeline task works against
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub store: Arc<FrameStore>,
    pub stats: Arc<PipelineStats>,
    pub event_bus: Arc<EventBus>,
}

/// The external pieces the pipeline drives
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn Detector>,
    pub preprocessing: Preprocessing,
    pub exporter: Arc<dyn MediaExporter>,
    pub uploader: Arc<dyn Uploader>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Opens the built-in implementations named by the configuration
    pub async fn from_config(config: &Config, source_id: &str, model: &Path, model_config: &Path) -> Result<Self> {
        let source = open_source(source_id, &config.source, config.pipeline.target_frame_rate)
            .await
            .context("opening frame source")?;

        let spec = DetectorSpec::new(model, model_config, &config.detector);
        let detector = load_detector(&spec).context("loading detector")?;

        let exporter = FileExporter::new(&config.export.output_dir).context("preparing output directory")?;
        let uploader = build_uploader(&config.export.uploader).context("configuring uploader")?;
        let notifier = build_notifier(&config.export.notifier).context("configuring notifier")?;

        Ok(Self {
            source,
            detector,
            preprocessing: spec.preprocessing,
            exporter: Arc::new(exporter),
            uploader,
            notifier,
        })
    }
}

/// Main alarm pipeline engine
pub struct Engine {
    context: PipelineContext,
    start_time: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid pipeline configuration")?;

        Ok(Self {
            context: PipelineContext {
                config: Arc::new(config),
                store: Arc::new(FrameStore::new()),
                stats: Arc::new(PipelineStats::default()),
                event_bus: Arc::new(EventBus::new(1024)),
            },
            start_time: None,
        })
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.context.event_bus.subscribe()
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Runs until the source ends, the source fails, or `stop` resolves.
    ///
    /// In-flight exports get the configured grace period before being aborted.
    /// A source failure is returned after everything has been torn down.
    pub async fn run<S>(&mut self, collaborators: Collaborators, stop: S) -> Result<StatsSnapshot>
    where
        S: Future<Output = ()> + Send,
    {
        let ctx = self.context.clone();
        let cfg = &ctx.config.pipeline;
        let Collaborators {
            mut source,
            detector,
            preprocessing,
            exporter,
            uploader,
            notifier,
        } = collaborators;

        info!("Starting alarm pipeline on {}...", source.id());
        self.start_time = Some(Instant::now());

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let (newest_tx, newest_rx) = watch::channel(None);
        let (alarm_tx, alarm_rx) = mpsc::channel::<AlarmEvent>(cfg.alarm_queue_capacity.max(1));
        let queue = Arc::new(SampleQueue::new(cfg.detection_queue_capacity.max(1)));

        let evictor = Evictor::new(
            Arc::clone(&ctx.store),
            cfg.retention_window(),
            cfg.eviction_tick(),
            Arc::clone(&ctx.stats),
            Arc::clone(&ctx.event_bus),
        );
        let evictor_handle = tokio::spawn(evictor.run(newest_rx, shutdown_tx.subscribe()));

        let worker = DetectionWorker::new(
            Arc::clone(&queue),
            Arc::clone(&ctx.store),
            detector,
            preprocessing,
            AlarmGate::new(cfg.confidence_threshold, cfg.cooldown()),
            alarm_tx,
            Arc::clone(&ctx.stats),
            Arc::clone(&ctx.event_bus),
        );
        let worker_handle = tokio::spawn(worker.run(shutdown_tx.subscribe()));

        let coordinator = Arc::new(ExportCoordinator::new(
            ClipAssembler::new(Arc::clone(&ctx.store), cfg.alarm_window()),
            exporter,
            uploader,
            notifier,
            &ctx.config.export,
            cfg.target_frame_rate,
            Arc::clone(&ctx.stats),
            Arc::clone(&ctx.event_bus),
        ));
        let alarm_handle = tokio::spawn(dispatch_alarms(alarm_rx, coordinator));

        let mut pacer = FramePacer::new(cfg.frame_interval(), !source.self_paced());
        let mut dispatcher = Dispatcher::new(
            cfg.sample_stride,
            Arc::clone(&queue),
            Arc::clone(&ctx.stats),
            Arc::clone(&ctx.event_bus),
        );
        let use_source_timestamps = ctx.config.source.use_source_timestamps;

        tokio::pin!(stop);
        let outcome: Result<()> = loop {
            let next = tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Stop requested");
                    break Ok(());
                }
                next = async {
                    pacer.tick().await;
                    source.next().await
                } => next,
            };

            match next {
                Ok(Some(frame)) => {
                    let timestamp = match frame.timestamp {
                        Some(ts) if use_source_timestamps => ts,
                        _ => Utc::now(),
                    };
                    let meta = ctx
                        .store
                        .append(timestamp, frame.width, frame.height, frame.channels, frame.pixels);
                    ctx.stats.record_frame();
                    newest_tx.send_replace(Some(meta.timestamp));
                    dispatcher.offer(meta);
                }
                Ok(None) => {
                    info!("End of stream from {}", source.id());
                    break Ok(());
                }
                Err(e) => {
                    error!("Source {} failed: {}", source.id(), e);
                    ctx.event_bus.publish_error(&e.to_string());
                    break Err(anyhow::Error::new(e).context("frame source failed"));
                }
            }
        };

        info!("Stopping alarm pipeline...");
        ctx.store.close();
        let _ = shutdown_tx.send(());
        drop(newest_tx);

        match worker_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Detection worker ended with error: {:#}", e),
            Err(e) => warn!("Detection worker task failed: {}", e),
        }

        // the worker dropped its alarm sender, so the dispatcher drains and returns
        let mut exports = alarm_handle.await.context("alarm dispatcher task failed")?;
        let grace = cfg.shutdown_grace();
        if !exports.is_empty() {
            info!("Waiting up to {:?} for {} export(s)", grace, exports.len());
        }
        let drained = tokio::time::timeout(grace, async {
            while let Some(done) = exports.join_next().await {
                log_export(done);
            }
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} unfinished export(s)", exports.len());
            exports.abort_all();
            while exports.join_next().await.is_some() {}
        }

        if let Err(e) = evictor_handle.await {
            warn!("Evictor task failed: {}", e);
        }

        let snapshot = ctx.stats.snapshot();
        info!("Alarm pipeline stopped after {}s", self.uptime());
        outcome.map(|_| snapshot)
    }
}

/// Starts one export task per alarm; returns the still-running ones once the
/// alarm channel closes
async fn dispatch_alarms(
    mut alarms: mpsc::Receiver<AlarmEvent>,
    coordinator: Arc<ExportCoordinator>,
) -> JoinSet<ExportReport> {
    let mut exports = JoinSet::new();

    loop {
        tokio::select! {
            alarm = alarms.recv() => match alarm {
                Some(alarm) => {
                    debug!("Starting export for alarm {}", alarm.id);
                    let coordinator = Arc::clone(&coordinator);
                    exports.spawn(async move { coordinator.handle(alarm).await });
                }
                None => break,
            },
            Some(done) = exports.join_next(), if !exports.is_empty() => log_export(done),
        }
    }

    exports
}

fn log_export(done: Result<ExportReport, JoinError>) {
    match done {
        Ok(report) => debug!("Export {} joined (ok: {})", report.alarm_id, report.succeeded()),
        Err(e) if e.is_cancelled() => {}
        Err(e) => warn!("Export task panicked: {}", e),
    }
}
