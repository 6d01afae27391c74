// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

use crate::detection::Preprocessing;
use crate::error::ConfigError;
use crate::export::ExportConfig;
use crate::source::SourceConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when no verbosity flag is given
    pub log_level: String,

    /// Frame source geometry and pacing
    pub source: SourceConfig,

    /// Buffering, sampling and alarm timing
    pub pipeline: PipelineConfig,

    /// Detector selection and preprocessing
    pub detector: DetectorConfig,

    /// Artifact export and delivery
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            source: SourceConfig::default(),
            pipeline: PipelineConfig::default(),
            detector: DetectorConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("alarmcam"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Parsed `log_level`
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Reject settings the pipeline cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        self.pipeline.validate()
    }
}

/// Buffering, sampling and alarm timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum frame age kept in the rolling buffer
    pub retention_window_seconds: f64,

    /// Every Nth captured frame goes to the detector
    pub sample_stride: u32,

    /// Minimum detection confidence that raises an alarm
    pub confidence_threshold: f32,

    /// Minimum spacing between two alarms
    pub cooldown_seconds: f64,

    /// Half-width of the clip around the alarm instant
    pub alarm_window_seconds: f64,

    /// Capture pacing and clip playback rate
    pub target_frame_rate: f64,

    /// Pending detection samples before the oldest is dropped
    pub detection_queue_capacity: usize,

    /// Alarms waiting for export
    pub alarm_queue_capacity: usize,

    /// Evictor tick when no frames arrive
    pub eviction_tick_ms: u64,

    /// Time granted to in-flight exports on shutdown; defaults to 2W + 5s
    pub shutdown_grace_seconds: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retention_window_seconds: 20.0,
            sample_stride: 10,
            confidence_threshold: 0.5,
            cooldown_seconds: 10.0,
            alarm_window_seconds: 5.0,
            target_frame_rate: 30.0,
            detection_queue_capacity: 8,
            alarm_queue_capacity: 4,
            eviction_tick_ms: 500,
            shutdown_grace_seconds: None,
        }
    }
}

impl PipelineConfig {
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs_f64(self.retention_window_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }

    pub fn alarm_window(&self) -> Duration {
        Duration::from_secs_f64(self.alarm_window_seconds)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_frame_rate)
    }

    pub fn eviction_tick(&self) -> Duration {
        Duration::from_millis(self.eviction_tick_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        match self.shutdown_grace_seconds {
            Some(secs) => Duration::from_secs_f64(secs),
            None => self.alarm_window() * 2 + Duration::from_secs(5),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("retention_window_seconds", self.retention_window_seconds),
            ("alarm_window_seconds", self.alarm_window_seconds),
            ("target_frame_rate", self.target_frame_rate),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field });
            }
        }
        if !(self.cooldown_seconds.is_finite() && self.cooldown_seconds >= 0.0) {
            return Err(ConfigError::NotPositive { field: "cooldown_seconds" });
        }
        if let Some(grace) = self.shutdown_grace_seconds {
            if !(grace.is_finite() && grace >= 0.0) {
                return Err(ConfigError::NotPositive { field: "shutdown_grace_seconds" });
            }
        }
        // pacing needs a non-zero tick
        if self.frame_interval().is_zero() {
            return Err(ConfigError::FrameRate(self.target_frame_rate));
        }
        if self.sample_stride == 0 {
            return Err(ConfigError::NotPositive { field: "sample_stride" });
        }
        if self.detection_queue_capacity == 0 {
            return Err(ConfigError::NotPositive { field: "detection_queue_capacity" });
        }
        if self.alarm_queue_capacity == 0 {
            return Err(ConfigError::NotPositive { field: "alarm_queue_capacity" });
        }
        if self.eviction_tick_ms == 0 {
            return Err(ConfigError::NotPositive { field: "eviction_tick_ms" });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Threshold(self.confidence_threshold));
        }
        if self.retention_window_seconds < 2.0 * self.alarm_window_seconds {
            return Err(ConfigError::RetentionTooShort {
                retention: self.retention_window_seconds,
                window: self.alarm_window_seconds,
            });
        }
        Ok(())
    }
}

/// Detector selection and preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Backend name handed to the detector loader
    pub backend: String,

    /// Device selector, passed through untouched
    pub device: String,

    /// Network input width
    pub input_width: u32,

    /// Network input height
    pub input_height: u32,

    /// Overrides the model-family preprocessing
    pub preprocessing: Option<Preprocessing>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: "framediff".to_string(),
            device: "cpu".to_string(),
            input_width: 300,
            input_height: 300,
            preprocessing: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.sample_stride, 10);
        assert_eq!(config.detector.input_width, 300);
        assert_eq!(config.pipeline.shutdown_grace(), Duration::from_secs(15));
    }

    #[test]
    fn test_retention_must_cover_clip() {
        let mut pipeline = PipelineConfig::default();
        pipeline.retention_window_seconds = 8.0;
        assert_eq!(
            pipeline.validate(),
            Err(ConfigError::RetentionTooShort { retention: 8.0, window: 5.0 })
        );
    }

    #[test]
    fn test_threshold_range() {
        let mut pipeline = PipelineConfig::default();
        pipeline.confidence_threshold = 1.5;
        assert_eq!(pipeline.validate(), Err(ConfigError::Threshold(1.5)));

        pipeline.confidence_threshold = 0.5;
        pipeline.sample_stride = 0;
        assert_eq!(
            pipeline.validate(),
            Err(ConfigError::NotPositive { field: "sample_stride" })
        );
    }

    #[test]
    fn test_shutdown_grace_must_be_usable() {
        let config: Config = toml::from_str("[pipeline]\nshutdown_grace_seconds = -1.0\n").unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "shutdown_grace_seconds" })
        );

        let mut pipeline = PipelineConfig::default();
        pipeline.shutdown_grace_seconds = Some(f64::NAN);
        assert!(pipeline.validate().is_err());

        pipeline.shutdown_grace_seconds = Some(0.0);
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.shutdown_grace(), Duration::ZERO);
    }

    #[test]
    fn test_frame_rate_must_leave_a_pacing_interval() {
        let config: Config = toml::from_str("[pipeline]\ntarget_frame_rate = 1e12\n").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::FrameRate(1e12)));

        let mut pipeline = PipelineConfig::default();
        pipeline.target_frame_rate = 1000.0;
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_log_level_is_parsed() {
        let mut config = Config::default();
        assert_eq!(config.log_level(), Ok(Level::INFO));

        config.log_level = "Debug".to_string();
        assert_eq!(config.log_level(), Ok(Level::DEBUG));

        config.log_level = "loud".to_string();
        assert_eq!(config.validate(), Err(ConfigError::LogLevel("loud".to_string())));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            "[pipeline]\ncooldown_seconds = 30.0\n\n[detector]\nbackend = \"none\"\n",
        )
        .unwrap();
        assert_eq!(config.pipeline.cooldown_seconds, 30.0);
        assert_eq!(config.pipeline.alarm_window_seconds, 5.0);
        assert_eq!(config.detector.backend, "none");
        assert_eq!(config.detector.input_height, 300);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("alarmcam-cfg-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.pipeline.sample_stride, created.pipeline.sample_stride);
        assert_eq!(loaded.export.output_dir, created.export.output_dir);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
