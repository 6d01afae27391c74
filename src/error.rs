// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Typed errors reported by pipeline collaborators

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a frame source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open source {source_id}: {reason}")]
    Open { source_id: String, reason: String },

    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("frame geometry {width}x{height}x{channels} is not supported")]
    Geometry {
        width: u32,
        height: u32,
        channels: u8,
    },

    #[error("truncated frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

/// Errors raised by a detector backend
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelMissing(PathBuf),

    #[error("unknown detector backend: {0}")]
    UnknownBackend(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Errors raised while writing, uploading or announcing alarm artifacts
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nothing to export: clip is empty")]
    EmptyClip,

    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("export task failed: {0}")]
    Task(String),
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration rejected by validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("confidence threshold {0} is outside [0, 1]")]
    Threshold(f32),

    #[error("target frame rate {0} is too high to pace")]
    FrameRate(f64),

    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error("retention window ({retention}s) must cover twice the alarm window ({window}s)")]
    RetentionTooShort { retention: f64, window: f64 },
}
