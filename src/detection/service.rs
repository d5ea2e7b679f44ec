use crate::config::Config;
use crate::detection::policy::{self, OrchestrationMode};
use crate::detection::{ClassifiedDetection, DetectorStatus, DualDetections, SlotRole};
use crate::image::{ImageLoader, MAX_IMAGE_BYTES};
use crate::models::{DetectorFactory, ModelRegistry, RegistrySnapshot, YoloFactory};
use crate::utils::error::DetectError;
use crate::Result;
use image::DynamicImage;

/// Detection entry point used by the HTTP layer.
///
/// Every call works on one registry snapshot taken before the image is
/// decoded, so a concurrent ensemble toggle never splits a request.
pub struct DetectionService {
    registry: ModelRegistry,
    max_image_bytes: usize,
}

impl DetectionService {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Loads both slots from the models directory with ONNX Runtime.
    pub fn from_config(config: &Config) -> Self {
        let factory = YoloFactory {
            onnx_config: config.onnx_config.clone(),
            params: config.yolo_params.clone(),
        };
        Self::load(config, &factory)
    }

    /// Loads both slots through `factory`. Load failures leave the slot
    /// unbound and never fail startup.
    pub fn load(config: &Config, factory: &dyn DetectorFactory) -> Self {
        let mut registry = ModelRegistry::new();

        registry.load(
            SlotRole::Primary,
            &config.primary_model_path(),
            &config.primary_labels_path(),
            factory,
        );

        match config.secondary_model_path() {
            Some(path) => {
                if config.model_config.secondary_model.is_none() {
                    tracing::info!("Auto-detected secondary model: {}", path.display());
                }
                registry.load(
                    SlotRole::Secondary,
                    &path,
                    &config.secondary_labels_path(),
                    factory,
                );
            }
            None => {
                tracing::info!("No secondary model found. Only primary model will be used.");
            }
        }

        if config.model_config.use_ensemble {
            registry.set_ensemble_mode(true);
        }

        let service = Self {
            registry,
            max_image_bytes: config.server_config.max_request_size,
        };

        tracing::info!("Detection service ready in {} mode", service.mode());
        service
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn status(&self) -> DetectorStatus {
        self.registry.status()
    }

    pub fn mode(&self) -> OrchestrationMode {
        OrchestrationMode::for_snapshot(&self.registry.snapshot())
    }

    /// Requests ensemble mode and returns the resulting status. The flag only
    /// sticks when both slots are ready.
    pub fn set_ensemble_mode(&self, enabled: bool) -> DetectorStatus {
        self.registry.set_ensemble_mode(enabled);
        self.status()
    }

    /// Detects food items in encoded image bytes.
    pub fn detect(&self, image_bytes: &[u8]) -> Result<Vec<ClassifiedDetection>> {
        self.detect_with_mode(image_bytes).map(|(detections, _)| detections)
    }

    /// Like [`detect`](Self::detect), also reporting the mode the request ran in.
    pub fn detect_with_mode(
        &self,
        image_bytes: &[u8],
    ) -> Result<(Vec<ClassifiedDetection>, OrchestrationMode)> {
        let (snapshot, image) = self.prepare(image_bytes)?;
        let detections = policy::execute(&snapshot, &image)?;
        Ok((detections, OrchestrationMode::for_snapshot(&snapshot)))
    }

    /// Runs each ready model on its own, for side-by-side comparison.
    pub fn detect_both_models_separately(&self, image_bytes: &[u8]) -> Result<DualDetections> {
        let (snapshot, image) = self.prepare(image_bytes)?;
        policy::execute_separately(&snapshot, &image)
    }

    fn prepare(&self, image_bytes: &[u8]) -> Result<(RegistrySnapshot, DynamicImage)> {
        if image_bytes.is_empty() {
            return Err(DetectError::ModelNotReady("Image payload was empty.".to_string()));
        }

        let snapshot = self.registry.snapshot();
        if !snapshot.any_ready() {
            return Err(DetectError::ModelNotReady(snapshot.not_ready_message()));
        }

        let image = ImageLoader::from_bytes_with_limit(image_bytes, self.max_image_bytes)?;
        Ok((snapshot, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RawDetection;
    use crate::image::loader::encode_png;
    use crate::models::adapter::testing::StaticDetector;
    use crate::models::DetectorAdapter;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn egg_factory(_path: &Path) -> Result<Box<dyn DetectorAdapter>> {
        Ok(Box::new(StaticDetector::new(vec![
            RawDetection::new(0, 0.9, [1.0, 1.0, 4.0, 4.0]),
            RawDetection::new(0, 0.7, [5.0, 5.0, 8.0, 8.0]),
        ])))
    }

    fn config_for(dir: &TempDir) -> Config {
        Config::new(
            "127.0.0.1:0".to_string(),
            dir.path().to_string_lossy().into_owned(),
            Some(1),
            false,
        )
        .unwrap()
    }

    fn populated_dir(with_secondary: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("best.onnx"), b"weights").unwrap();
        fs::write(dir.path().join("data.yaml"), "names: ['egg']\n").unwrap();
        if with_secondary {
            fs::write(dir.path().join("alternative.onnx"), b"weights").unwrap();
        }
        dir
    }

    #[test]
    fn test_empty_payload_rejected_first() {
        let dir = TempDir::new().unwrap();
        let service = DetectionService::load(&config_for(&dir), &egg_factory);

        let err = service.detect(&[]).unwrap_err();
        assert!(matches!(err, DetectError::ModelNotReady(_)));
        assert_eq!(err.to_string(), "Image payload was empty.");
    }

    #[test]
    fn test_not_ready_checked_before_decode() {
        let dir = TempDir::new().unwrap();
        let service = DetectionService::load(&config_for(&dir), &egg_factory);

        assert_eq!(service.mode(), OrchestrationMode::Unavailable);
        let err = service.detect(b"not an image").unwrap_err();
        assert!(matches!(err, DetectError::ModelNotReady(_)));
        assert!(err.to_string().starts_with("Model weights not found at"));
    }

    #[test]
    fn test_malformed_image() {
        let dir = populated_dir(false);
        let service = DetectionService::load(&config_for(&dir), &egg_factory);

        let err = service.detect(b"not an image").unwrap_err();
        assert!(matches!(err, DetectError::ImageDecode(_)));
    }

    #[test]
    fn test_detect_png() {
        let dir = populated_dir(false);
        let service = DetectionService::load(&config_for(&dir), &egg_factory);
        assert_eq!(service.mode(), OrchestrationMode::PrimaryOnly);

        let detections = service.detect(&encode_png(16, 16)).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].name, "egg");
        assert_eq!(detections[0].source_slot, SlotRole::Primary);
    }

    #[test]
    fn test_ensemble_from_config() {
        let dir = populated_dir(true);
        let config = config_for(&dir).with_models("best.onnx".into(), None, true);
        let service = DetectionService::load(&config, &egg_factory);

        let status = service.status();
        assert!(status.primary_model_ready);
        assert!(status.secondary_model_ready);
        assert!(status.ensemble_mode);
        assert_eq!(service.mode(), OrchestrationMode::Ensemble);

        let detections = service.detect(&encode_png(8, 8)).unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_ensemble_request_without_secondary() {
        let dir = populated_dir(false);
        let config = config_for(&dir).with_models("best.onnx".into(), None, true);
        let service = DetectionService::load(&config, &egg_factory);

        assert!(!service.status().ensemble_mode);
        let status = service.set_ensemble_mode(true);
        assert!(!status.ensemble_mode);
        assert!(status.secondary_model_error.is_none());
    }

    #[test]
    fn test_compare_groups_per_model() {
        let dir = populated_dir(true);
        let service = DetectionService::load(&config_for(&dir), &egg_factory);

        let result = service
            .detect_both_models_separately(&encode_png(8, 8))
            .unwrap();
        assert_eq!(result.model1.len(), 1);
        assert_eq!(result.model1[0].quantity, 2);
        assert_eq!(result.model1[0].confidence, 0.9);
        assert_eq!(result.model2, result.model1);
    }

    #[test]
    fn test_size_limit_applies() {
        let dir = populated_dir(false);
        let service =
            DetectionService::load(&config_for(&dir), &egg_factory).with_max_image_bytes(4);

        let err = service.detect(&encode_png(8, 8)).unwrap_err();
        assert!(matches!(err, DetectError::FileTooLarge(_, 4)));
    }
}
