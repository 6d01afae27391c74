//! Export module - still/clip artifacts, upload and notification

mod coordinator;
mod notify;
mod upload;
mod writer;

pub use coordinator::ExportCoordinator;
pub use notify::{LogNotifier, WebhookNotifier};
pub use upload::{HttpUploader, LocalUploader};
pub use writer::FileExporter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buffer::Frame;
use crate::error::ExportError;

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where artifacts are written before upload
    pub output_dir: PathBuf,

    /// Keep local files after a successful upload
    pub keep_artifacts: bool,

    /// Notification subject prefix
    pub subject: String,

    pub uploader: UploaderConfig,

    pub notifier: NotifierConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./alarms"),
            keep_artifacts: false,
            subject: "Motion alarm".to_string(),
            uploader: UploaderConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploaderConfig {
    /// Copy into a directory served elsewhere
    Local {
        publish_dir: PathBuf,
        base_url: Option<String>,
    },
    /// HTTP PUT to `endpoint/<file name>`
    Http {
        endpoint: String,
        auth_token: Option<String>,
    },
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self::Local {
            publish_dir: PathBuf::from("./alarms/published"),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    #[default]
    Log,
    /// POST `{subject, body}` as JSON
    Webhook { url: String },
}

/// Outcome of one alarm's export cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub alarm_id: String,
    pub alarm_time: DateTime<Utc>,
    pub image_url: Option<String>,
    pub clip_url: Option<String>,
    pub clip_frames: usize,
    pub partial: bool,
    pub notified: bool,
}

impl ExportReport {
    pub fn succeeded(&self) -> bool {
        self.image_url.is_some() && self.clip_url.is_some()
    }
}

/// Encodes frames into files. Blocking; called off the async runtime.
pub trait MediaExporter: Send + Sync {
    fn write_image(&self, frame: &Frame, stem: &str) -> Result<PathBuf, ExportError>;

    fn write_clip(&self, frames: &[Frame], frame_rate: f64, stem: &str) -> Result<PathBuf, ExportError>;
}

/// Publishes a local artifact and returns where it can be fetched
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<String, ExportError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), ExportError>;
}

pub fn build_uploader(config: &UploaderConfig) -> Result<Arc<dyn Uploader>, ExportError> {
    Ok(match config {
        UploaderConfig::Local { publish_dir, base_url } => {
            Arc::new(LocalUploader::new(publish_dir.clone(), base_url.clone())?)
        }
        UploaderConfig::Http { endpoint, auth_token } => {
            Arc::new(HttpUploader::new(endpoint, auth_token.clone())?)
        }
    })
}

pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, ExportError> {
    Ok(match config {
        NotifierConfig::Log => Arc::new(LogNotifier),
        NotifierConfig::Webhook { url } => Arc::new(WebhookNotifier::new(url)?),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps frames in memory instead of encoding them
    #[derive(Default)]
    pub(crate) struct MemoryExporter {
        pub images: Mutex<Vec<Frame>>,
        pub clips: Mutex<Vec<Vec<Frame>>>,
        pub fail_image: bool,
        pub fail_clip: bool,
    }

    impl MediaExporter for MemoryExporter {
        fn write_image(&self, frame: &Frame, stem: &str) -> Result<PathBuf, ExportError> {
            if self.fail_image {
                return Err(ExportError::Task("image encoder down".to_string()));
            }
            self.images.lock().push(frame.clone());
            Ok(PathBuf::from(format!("{}.ppm", stem)))
        }

        fn write_clip(&self, frames: &[Frame], _frame_rate: f64, stem: &str) -> Result<PathBuf, ExportError> {
            if self.fail_clip {
                return Err(ExportError::Task("clip encoder down".to_string()));
            }
            self.clips.lock().push(frames.to_vec());
            Ok(PathBuf::from(format!("{}.y4m", stem)))
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryUploader {
        pub fail: bool,
    }

    #[async_trait]
    impl Uploader for MemoryUploader {
        async fn upload(&self, path: &Path) -> Result<String, ExportError> {
            if self.fail {
                return Err(ExportError::Upload("bucket unreachable".to_string()));
            }
            Ok(format!("mem://{}", path.display()))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub messages: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) -> Result<(), ExportError> {
            self.messages.lock().push((subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_tagged_config_round_trip() {
        let config: ExportConfig = toml::from_str(
            "keep_artifacts = true\n\n[uploader]\nkind = \"http\"\nendpoint = \"https://media.example/alarms\"\n\n[notifier]\nkind = \"webhook\"\nurl = \"https://hooks.example/x\"\n",
        )
        .unwrap();

        assert!(config.keep_artifacts);
        assert_eq!(
            config.uploader,
            UploaderConfig::Http {
                endpoint: "https://media.example/alarms".to_string(),
                auth_token: None,
            }
        );
        assert_eq!(config.notifier, NotifierConfig::Webhook { url: "https://hooks.example/x".to_string() });
        assert_eq!(config.output_dir, PathBuf::from("./alarms"));
    }
}
