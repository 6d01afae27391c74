//! Frame source module - capture interfaces and built-in sources

mod raw;
mod simulator;

pub use raw::RawVideoSource;
pub use simulator::SyntheticSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SourceError;

/// Geometry and pacing of the incoming stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    /// 1 (gray) or 3 (RGB)
    pub channels: u8,
    /// Stamp frames with the source's own clock instead of arrival time
    pub use_source_timestamps: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            channels: 3,
            use_source_timestamps: false,
        }
    }
}

/// One frame as delivered by a source, before the store numbers it
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Producer of frames. `Ok(None)` ends the stream; an error is fatal.
#[async_trait]
pub trait FrameSource: Send {
    /// Human readable identifier for logs
    fn id(&self) -> &str;

    /// Whether `next` already blocks at the capture rate
    fn self_paced(&self) -> bool;

    async fn next(&mut self) -> Result<Option<SourceFrame>, SourceError>;
}

/// Opens `source_id`: `synthetic` (or `synthetic:<seconds>`), `-` for stdin,
/// otherwise a path to a raw video file.
pub async fn open_source(
    source_id: &str,
    config: &SourceConfig,
    frame_rate: f64,
) -> Result<Box<dyn FrameSource>, SourceError> {
    if config.width == 0 || config.height == 0 || !matches!(config.channels, 1 | 3) {
        return Err(SourceError::Geometry {
            width: config.width,
            height: config.height,
            channels: config.channels,
        });
    }

    let source: Box<dyn FrameSource> = if let Some(rest) = source_id.strip_prefix("synthetic") {
        let duration = match rest.strip_prefix(':') {
            Some(secs) => Some(secs.parse::<f64>().map_err(|e| SourceError::Open {
                source_id: source_id.to_string(),
                reason: format!("bad duration: {}", e),
            })?),
            None if rest.is_empty() => None,
            None => {
                return Err(SourceError::Open {
                    source_id: source_id.to_string(),
                    reason: "expected synthetic or synthetic:<seconds>".to_string(),
                })
            }
        };
        let mut source = SyntheticSource::new(config.width, config.height, config.channels, frame_rate)
            .realtime(true);
        if let Some(secs) = duration {
            source = source.limit_frames((secs * frame_rate).round() as u64);
        }
        Box::new(source)
    } else if source_id == "-" {
        Box::new(RawVideoSource::new(
            "stdin",
            tokio::io::stdin(),
            config.width,
            config.height,
            config.channels,
        ))
    } else {
        let file = tokio::fs::File::open(source_id)
            .await
            .map_err(|e| SourceError::Open {
                source_id: source_id.to_string(),
                reason: e.to_string(),
            })?;
        Box::new(RawVideoSource::new(
            source_id,
            file,
            config.width,
            config.height,
            config.channels,
        ))
    };

    info!(
        "Opened source {} ({}x{}x{})",
        source.id(),
        config.width,
        config.height,
        config.channels
    );
    Ok(source)
}
