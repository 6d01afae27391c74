//! Detection module - sampling, detector adaptor and the detection worker

mod backends;
mod preprocess;
mod sampler;
mod worker;

pub use backends::*;
pub use preprocess::{Blob, Preprocessing};
pub use sampler::{Dispatcher, FrameSample, SampleQueue, Sampler};
pub use worker::DetectionWorker;

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::buffer::Frame;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

/// Normalized box in [0, 1] image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn full() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        }
    }
}

/// One object reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f32,
    pub class_id: u32,
    pub bbox: BoundingBox,
}

/// Highest confidence among `detections`
pub fn max_confidence(detections: &[Detection]) -> Option<f32> {
    detections
        .iter()
        .map(|d| d.confidence)
        .fold(None, |best, c| Some(best.map_or(c, |b: f32| b.max(c))))
}

/// Blocking inference capability.
///
/// Called from a dedicated blocking worker, never from the capture loop.
pub trait Detector: Send {
    fn name(&self) -> &str;

    fn infer(&mut self, frame: &Frame, pre: &Preprocessing) -> Result<Vec<Detection>, DetectorError>;
}

/// Everything needed to open a detector
#[derive(Debug, Clone)]
pub struct DetectorSpec {
    pub model: PathBuf,
    pub model_config: PathBuf,
    pub backend: String,
    pub device: String,
    pub input_size: (u32, u32),
    pub preprocessing: Preprocessing,
}

impl DetectorSpec {
    pub fn new(model: &Path, model_config: &Path, config: &DetectorConfig) -> Self {
        let preprocessing = config
            .preprocessing
            .clone()
            .unwrap_or_else(|| Preprocessing::for_model(model));

        Self {
            model: model.to_path_buf(),
            model_config: model_config.to_path_buf(),
            backend: config.backend.clone(),
            device: config.device.clone(),
            input_size: (config.input_width, config.input_height),
            preprocessing,
        }
    }
}

/// Opens the detector named by `spec.backend`; missing model files are fatal
pub fn load_detector(spec: &DetectorSpec) -> Result<Box<dyn Detector>, DetectorError> {
    for path in [&spec.model, &spec.model_config] {
        if !path.is_file() {
            return Err(DetectorError::ModelMissing(path.clone()));
        }
    }

    let detector: Box<dyn Detector> = match spec.backend.as_str() {
        "framediff" | "default" => Box::new(FrameDiffDetector::new(spec.input_size)),
        "none" => Box::new(NullDetector),
        other => return Err(DetectorError::UnknownBackend(other.to_string())),
    };

    info!(
        "Detector '{}' ready (model {:?}, device {}, input {}x{}, {:?})",
        detector.name(),
        spec.model,
        spec.device,
        spec.input_size.0,
        spec.input_size.1,
        spec.preprocessing
    );
    Ok(detector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_confidence() {
        let detections: Vec<Detection> = [0.2, 0.7, 0.4]
            .into_iter()
            .map(|confidence| Detection {
                confidence,
                class_id: 1,
                bbox: BoundingBox::full(),
            })
            .collect();
        assert_eq!(max_confidence(&detections), Some(0.7));
        assert_eq!(max_confidence(&[]), None);
    }

    #[test]
    fn test_load_detector_requires_model_files() {
        let config = DetectorConfig::default();
        let spec = DetectorSpec::new(Path::new("/nonexistent/net.caffemodel"), Path::new("/nonexistent/net.prototxt"), &config);
        assert_eq!(spec.preprocessing.mean, [104.0, 177.0, 123.0]);
        assert!(matches!(load_detector(&spec), Err(DetectorError::ModelMissing(_))));
    }

    #[test]
    fn test_load_detector_backends() {
        let dir = std::env::temp_dir().join(format!("alarmcam-model-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let model = dir.join("net.pb");
        let graph = dir.join("net.pbtxt");
        std::fs::write(&model, b"weights").unwrap();
        std::fs::write(&graph, b"graph").unwrap();

        let mut config = DetectorConfig::default();
        let spec = DetectorSpec::new(&model, &graph, &config);
        assert_eq!(load_detector(&spec).unwrap().name(), "framediff");

        config.backend = "cuda-magic".to_string();
        let spec = DetectorSpec::new(&model, &graph, &config);
        assert!(matches!(load_detector(&spec), Err(DetectorError::UnknownBackend(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
