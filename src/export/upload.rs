// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Artifact publishing

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::Uploader;
use crate::error::ExportError;

fn file_name(path: &Path) -> Result<String, ExportError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ExportError::Upload(format!("{:?} has no file name", path)))
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ppm") => "image/x-portable-pixmap",
        Some("pgm") => "image/x-portable-graymap",
        Some("y4m") => "video/x-yuv4mpeg",
        _ => "application/octet-stream",
    }
}

/// Copies artifacts into a directory that something else serves
pub struct LocalUploader {
    publish_dir: PathBuf,
    base_url: Option<String>,
}

impl LocalUploader {
    pub fn new(publish_dir: PathBuf, base_url: Option<String>) -> Result<Self, ExportError> {
        std::fs::create_dir_all(&publish_dir).map_err(|e| ExportError::io(&publish_dir, e))?;
        Ok(Self {
            publish_dir,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, path: &Path) -> Result<String, ExportError> {
        let name = file_name(path)?;
        let target = self.publish_dir.join(&name);
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| ExportError::io(path, e))?;

        let url = match &self.base_url {
            Some(base) => format!("{}/{}", base, name),
            None => {
                let absolute = tokio::fs::canonicalize(&target)
                    .await
                    .map_err(|e| ExportError::io(&target, e))?;
                format!("file://{}", absolute.display())
            }
        };
        debug!("Published {:?} as {}", path, url);
        Ok(url)
    }
}

/// PUTs artifacts to `endpoint/<file name>`
pub struct HttpUploader {
    http: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpUploader {
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Result<Self, ExportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, path: &Path) -> Result<String, ExportError> {
        let url = format!("{}/{}", self.endpoint, file_name(path)?);
        let body = tokio::fs::read(path).await.map_err(|e| ExportError::io(path, e))?;
        let size = body.len();

        let mut req = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type(path))
            .body(body);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Upload(format!("{} returned {}", url, status)));
        }

        // Prefer the location the server says it stored the object at
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!("Uploaded {:?} ({} bytes) -> {}", path, size, status);
        Ok(location.unwrap_or(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_upload_with_base_url() {
        let root = std::env::temp_dir().join(format!("alarmcam-upload-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let artifact = root.join("2026_03_01_12_00_00.ppm");
        std::fs::write(&artifact, b"P6\n1 1\n255\nabc").unwrap();

        let uploader = LocalUploader::new(root.join("pub"), Some("https://cam.example/media/".to_string())).unwrap();
        let url = uploader.upload(&artifact).await.unwrap();

        assert_eq!(url, "https://cam.example/media/2026_03_01_12_00_00.ppm");
        assert!(root.join("pub/2026_03_01_12_00_00.ppm").exists());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_local_upload_missing_file() {
        let root = std::env::temp_dir().join(format!("alarmcam-upload-{}", uuid::Uuid::new_v4()));
        let uploader = LocalUploader::new(root.clone(), None).unwrap();

        let result = uploader.upload(&root.join("missing.y4m")).await;
        assert!(matches!(result, Err(ExportError::Io { .. })));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a.y4m")), "video/x-yuv4mpeg");
        assert_eq!(content_type(Path::new("a.pgm")), "image/x-portable-graymap");
        assert_eq!(content_type(Path::new("a")), "application/octet-stream");
    }
}
