// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! AlarmCam - Video Alarm Pipeline
//!
//! Watches a camera stream, samples frames for an object detector and, when
//! something is seen, exports a still plus a clip spanning the alarm instant:
//! - Rolling, time-bounded frame buffer with background eviction
//! - Best-effort sampling into a drop-oldest detection queue
//! - Debounced alarms with a configurable cooldown
//! - Clip assembly reaching back before and waiting forward past the alarm
//! - Concurrent still/clip export, upload and notification
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AlarmCam Engine                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌──────────┐  ┌───────────┐  ┌────────────┐   │
//! │  │ Capture │→ │  Frame   │→ │  Sampler  │→ │  Detector  │   │
//! │  │  Loop   │  │  Store   │  │ Dispatch  │  │   Worker   │   │
//! │  └─────────┘  └──────────┘  └───────────┘  └────────────┘   │
//! │                  ↑    ↑                          ↓          │
//! │           ┌─────────┐ │                    ┌────────────┐   │
//! │           │ Evictor │ └─────────────────── │ Alarm Gate │   │
//! │           └─────────┘    Clip Assembler    └────────────┘   │
//! │                               ↓                             │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │     Export Coordinator → Uploader → Notifier          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                               ↓                             │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                      Event Bus                        │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod alarm;
pub mod buffer;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod export;
pub mod source;

// Re-exports for convenience
pub use alarm::{AlarmEvent, AlarmGate, Clip, ClipAssembler, GateDecision};
pub use buffer::{Evictor, Frame, FrameMeta, FrameStore};
pub use config::Config;
pub use core::{Collaborators, Engine, EventBus, PipelineContext, PipelineEvent, PipelineStats, StatsSnapshot};
pub use detection::{load_detector, Detection, Detector, DetectorSpec};
pub use export::{ExportCoordinator, ExportReport, MediaExporter, Notifier, Uploader};
pub use source::{open_source, FrameSource, SourceFrame};

/// AlarmCam version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// AlarmCam name
pub const NAME: &str = "AlarmCam";
