// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! AlarmCam - Video Alarm Pipeline
//!
//! Buffers a camera stream, samples it into an object detector and exports a
//! still plus a before/after clip whenever an alarm fires.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use alarmcam::{Collaborators, Config, Engine, NAME, VERSION};

/// AlarmCam - Video Alarm Pipeline
#[derive(Parser, Debug)]
#[command(name = "alarmcam")]
#[command(author = "AlarmCam Project")]
#[command(version = VERSION)]
#[command(about = "Rolling-buffer video alarms with detector sampling and clip export")]
struct Args {
    /// Frame source: `synthetic[:seconds]`, `-` for raw stdin, or a raw video file
    source: String,

    /// Detector model file
    model: PathBuf,

    /// Detector model configuration file
    model_config: PathBuf,

    /// Preview window flag (0/1); accepted for compatibility, no preview is shown
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set)]
    show_window: bool,

    /// Target capture frame rate
    #[arg(long)]
    fps: Option<f64>,

    /// Seconds of video kept on each side of an alarm
    #[arg(long)]
    window_secs: Option<f64>,

    /// Detector backend
    #[arg(long)]
    backend: Option<String>,

    /// Detector device, passed through to the backend
    #[arg(long)]
    device: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Artifact output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!("expected 0 or 1, got '{}'", other)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level()?
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{} - Video Alarm Pipeline", NAME, VERSION);

    // Override with command line args
    if let Some(fps) = args.fps {
        config.pipeline.target_frame_rate = fps;
    }
    if let Some(window) = args.window_secs {
        config.pipeline.alarm_window_seconds = window;
        if config.pipeline.retention_window_seconds < 2.0 * window {
            config.pipeline.retention_window_seconds = 2.0 * window;
            info!("Retention raised to {}s to cover the alarm window", 2.0 * window);
        }
    }
    if let Some(backend) = &args.backend {
        config.detector.backend = backend.clone();
    }
    if let Some(device) = &args.device {
        config.detector.device = device.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }
    if let Err(e) = config.validate() {
        bail!("Invalid configuration in {:?}: {}", config_path, e);
    }

    info!("Configuration loaded from {:?}", config_path);
    if args.show_window {
        warn!("Preview window requested but not supported; continuing headless");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: Config) -> Result<()> {
    // A source or model that fails to open ends the process here
    let collaborators = Collaborators::from_config(&config, &args.source, &args.model, &args.model_config).await?;

    let mut engine = Engine::new(config)?;
    info!("Press Ctrl+C to shutdown");

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, cleaning up...");
    };
    let stats = engine.run(collaborators, stop).await?;

    info!(
        "Frames: {} captured, {} evicted | samples: {} dispatched, {} dropped | detections: {} | alarms: {} fired, {} suppressed | exports: {} ok, {} failed",
        stats.frames_captured,
        stats.frames_evicted,
        stats.samples_dispatched,
        stats.samples_dropped,
        stats.detections,
        stats.alarms,
        stats.suppressed,
        stats.exports_succeeded,
        stats.exports_failed
    );
    info!("AlarmCam shutdown complete");

    Ok(())
}
