use crate::detection::{ClassifiedDetection, DetectorStatus, SlotRole};
use crate::models::adapter::{DetectorAdapter, DetectorFactory, InferenceFailure};
use crate::models::labels::{parse_label_map, LabelMap};
use image::DynamicImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A detector bound to a slot together with its label map
#[derive(Clone)]
pub struct BoundModel {
    role: SlotRole,
    adapter: Arc<dyn DetectorAdapter>,
    labels: Arc<LabelMap>,
}

impl BoundModel {
    pub fn role(&self) -> SlotRole {
        self.role
    }

    /// Runs inference and resolves every raw detection against the label map.
    pub fn detect(
        &self,
        image: &DynamicImage,
    ) -> std::result::Result<Vec<ClassifiedDetection>, InferenceFailure> {
        let raw = self.adapter.infer(image)?;

        tracing::debug!(
            "{} model ({}) returned {} raw detections",
            self.role,
            self.adapter.name(),
            raw.len()
        );

        Ok(raw
            .into_iter()
            .map(|mut det| {
                det.source_slot = Some(self.role);
                ClassifiedDetection::classify(det, &self.labels, self.role)
            })
            .collect())
    }
}

enum SlotBinding {
    Bound(BoundModel),
    Unbound { load_error: Option<String> },
}

/// Registry position for one detector.
///
/// Either fully bound (detector present, no error) or unbound (no detector,
/// possibly with the load error that explains why).
pub struct ModelSlot {
    role: SlotRole,
    binding: SlotBinding,
}

impl ModelSlot {
    pub fn bound(role: SlotRole, adapter: Arc<dyn DetectorAdapter>, labels: LabelMap) -> Self {
        Self {
            role,
            binding: SlotBinding::Bound(BoundModel {
                role,
                adapter,
                labels: Arc::new(labels),
            }),
        }
    }

    pub fn unbound(role: SlotRole, load_error: Option<String>) -> Self {
        Self {
            role,
            binding: SlotBinding::Unbound { load_error },
        }
    }

    pub fn role(&self) -> SlotRole {
        self.role
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.binding, SlotBinding::Bound(_))
    }

    pub fn model(&self) -> Option<&BoundModel> {
        match &self.binding {
            SlotBinding::Bound(model) => Some(model),
            SlotBinding::Unbound { .. } => None,
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.binding {
            SlotBinding::Bound(_) => None,
            SlotBinding::Unbound { load_error } => load_error.as_deref(),
        }
    }
}

/// Consistent view of the registry taken once per request
#[derive(Clone)]
pub struct RegistrySnapshot {
    pub primary: Option<BoundModel>,
    pub secondary: Option<BoundModel>,
    pub primary_error: Option<String>,
    pub secondary_error: Option<String>,
    pub ensemble: bool,
}

impl RegistrySnapshot {
    pub fn any_ready(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// First recorded load error, primary before secondary.
    pub fn not_ready_message(&self) -> String {
        self.primary_error
            .as_deref()
            .filter(|e| !e.is_empty())
            .or_else(|| self.secondary_error.as_deref().filter(|e| !e.is_empty()))
            .unwrap_or("No detection models are available.")
            .to_string()
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            model_ready: self.any_ready(),
            primary_model_ready: self.primary.is_some(),
            secondary_model_ready: self.secondary.is_some(),
            primary_model_error: self.primary_error.clone(),
            secondary_model_error: self.secondary_error.clone(),
            ensemble_mode: self.ensemble,
        }
    }
}

/// Owns the primary and secondary detector slots.
///
/// Slots are written while the service starts; afterwards only the ensemble
/// flag changes.
pub struct ModelRegistry {
    primary: ModelSlot,
    secondary: ModelSlot,
    ensemble: AtomicBool,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::from_slots(
            ModelSlot::unbound(SlotRole::Primary, None),
            ModelSlot::unbound(SlotRole::Secondary, None),
        )
    }

    pub fn from_slots(primary: ModelSlot, secondary: ModelSlot) -> Self {
        Self {
            primary,
            secondary,
            ensemble: AtomicBool::new(false),
        }
    }

    /// Loads a detector into `role`. Failures are recorded on the slot.
    pub fn load(
        &mut self,
        role: SlotRole,
        weights_path: &Path,
        label_path: &Path,
        factory: &dyn DetectorFactory,
    ) {
        let slot = if !weights_path.exists() {
            let error = format!("Model weights not found at {}", weights_path.display());
            tracing::warn!("{}", error);
            ModelSlot::unbound(role, Some(error))
        } else {
            let labels = parse_label_map(label_path);

            match factory.build(weights_path) {
                Ok(adapter) => {
                    tracing::info!(
                        "Loaded {} detection model from {} ({} classes)",
                        role.as_str().to_uppercase(),
                        weights_path.display(),
                        labels.len()
                    );
                    ModelSlot::bound(role, Arc::from(adapter), labels)
                }
                Err(e) => {
                    let error = format!(
                        "Failed to load detection model from {}: {}",
                        weights_path.display(),
                        e
                    );
                    tracing::error!("{}", error);
                    ModelSlot::unbound(role, Some(error))
                }
            }
        };

        match role {
            SlotRole::Primary => self.primary = slot,
            SlotRole::Secondary => self.secondary = slot,
        }

        // a rebound slot may invalidate a previously effective ensemble
        if !(self.primary_ready() && self.secondary_ready()) {
            self.ensemble.store(false, Ordering::Release);
        }
    }

    pub fn slot(&self, role: SlotRole) -> &ModelSlot {
        match role {
            SlotRole::Primary => &self.primary,
            SlotRole::Secondary => &self.secondary,
        }
    }

    pub fn primary_ready(&self) -> bool {
        self.primary.is_ready()
    }

    pub fn secondary_ready(&self) -> bool {
        self.secondary.is_ready()
    }

    pub fn any_ready(&self) -> bool {
        self.primary_ready() || self.secondary_ready()
    }

    pub fn ensemble_mode(&self) -> bool {
        self.ensemble.load(Ordering::Acquire)
    }

    /// Turns ensemble mode on only when both slots are ready.
    pub fn set_ensemble_mode(&self, requested: bool) {
        let effective = requested && self.primary_ready() && self.secondary_ready();
        self.ensemble.store(effective, Ordering::Release);

        if requested && !effective {
            tracing::warn!(
                "Ensemble mode requested but both models not available (primary_ready={}, secondary_ready={})",
                self.primary_ready(),
                self.secondary_ready()
            );
        } else {
            tracing::info!("Ensemble mode {}", if effective { "enabled" } else { "disabled" });
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            primary: self.primary.model().cloned(),
            secondary: self.secondary.model().cloned(),
            primary_error: self.primary.load_error().map(str::to_string),
            secondary_error: self.secondary.load_error().map(str::to_string),
            ensemble: self.ensemble_mode(),
        }
    }

    pub fn status(&self) -> DetectorStatus {
        self.snapshot().status()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{FoodCategory, RawDetection};
    use crate::models::adapter::testing::{blank_image, StaticDetector};
    use crate::utils::error::DetectError;
    use std::fs;
    use tempfile::TempDir;

    fn static_factory(_path: &Path) -> crate::Result<Box<dyn DetectorAdapter>> {
        Ok(Box::new(StaticDetector::new(vec![RawDetection::new(
            1,
            0.9,
            [0.0, 0.0, 5.0, 5.0],
        )])))
    }

    fn broken_factory(_path: &Path) -> crate::Result<Box<dyn DetectorAdapter>> {
        Err(DetectError::ModelLoad("unsupported opset".into()))
    }

    fn models_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("best.onnx"), b"weights").unwrap();
        fs::write(dir.path().join("best2.onnx"), b"weights").unwrap();
        fs::write(dir.path().join("data.yaml"), "names: ['apple', 'egg']\n").unwrap();
        dir
    }

    #[test]
    fn test_missing_weights_recorded() {
        let dir = TempDir::new().unwrap();
        let mut registry = ModelRegistry::new();
        registry.load(
            SlotRole::Primary,
            &dir.path().join("best.onnx"),
            &dir.path().join("data.yaml"),
            &static_factory,
        );

        assert!(!registry.primary_ready());
        let error = registry.slot(SlotRole::Primary).load_error().unwrap();
        assert!(error.starts_with("Model weights not found at"));
    }

    #[test]
    fn test_construction_error_recorded() {
        let dir = models_dir();
        let mut registry = ModelRegistry::new();
        registry.load(
            SlotRole::Secondary,
            &dir.path().join("best2.onnx"),
            &dir.path().join("data.yaml"),
            &broken_factory,
        );

        assert!(!registry.secondary_ready());
        let error = registry.slot(SlotRole::Secondary).load_error().unwrap();
        assert!(error.contains("Failed to load detection model"));
        assert!(error.contains("unsupported opset"));
    }

    #[test]
    fn test_missing_labels_still_binds() {
        let dir = models_dir();
        let mut registry = ModelRegistry::new();
        registry.load(
            SlotRole::Primary,
            &dir.path().join("best.onnx"),
            &dir.path().join("missing.yaml"),
            &static_factory,
        );

        assert!(registry.primary_ready());
        assert!(registry.slot(SlotRole::Primary).load_error().is_none());

        let model = registry.snapshot().primary.unwrap();
        let detections = model.detect(&blank_image()).unwrap();
        assert_eq!(detections[0].name, "class_1");
        assert_eq!(detections[0].category, FoodCategory::Uncategorized);
    }

    #[test]
    fn test_bound_model_classifies_and_stamps_role() {
        let dir = models_dir();
        let mut registry = ModelRegistry::new();
        registry.load(
            SlotRole::Secondary,
            &dir.path().join("best2.onnx"),
            &dir.path().join("data.yaml"),
            &static_factory,
        );

        let model = registry.snapshot().secondary.unwrap();
        let detections = model.detect(&blank_image()).unwrap();
        assert_eq!(detections[0].name, "egg");
        assert_eq!(detections[0].category, FoodCategory::Dairy);
        assert_eq!(detections[0].source_slot, SlotRole::Secondary);
    }

    #[test]
    fn test_ensemble_requires_both_slots() {
        let dir = models_dir();
        let mut registry = ModelRegistry::new();
        registry.load(
            SlotRole::Primary,
            &dir.path().join("best.onnx"),
            &dir.path().join("data.yaml"),
            &static_factory,
        );

        registry.set_ensemble_mode(true);
        assert!(!registry.ensemble_mode());

        registry.load(
            SlotRole::Secondary,
            &dir.path().join("best2.onnx"),
            &dir.path().join("data.yaml"),
            &static_factory,
        );
        registry.set_ensemble_mode(true);
        assert!(registry.ensemble_mode());

        registry.set_ensemble_mode(false);
        assert!(!registry.ensemble_mode());
    }

    #[test]
    fn test_status_snapshot() {
        let registry = ModelRegistry::from_slots(
            ModelSlot::unbound(SlotRole::Primary, Some("primary missing".into())),
            ModelSlot::bound(
                SlotRole::Secondary,
                Arc::new(StaticDetector::new(Vec::new())),
                LabelMap::default(),
            ),
        );

        let status = registry.status();
        assert!(status.model_ready);
        assert!(!status.primary_model_ready);
        assert!(status.secondary_model_ready);
        assert_eq!(status.primary_model_error.as_deref(), Some("primary missing"));
        assert_eq!(status.secondary_model_error, None);
        assert!(!status.ensemble_mode);
    }

    #[test]
    fn test_not_ready_message_priority() {
        let registry = ModelRegistry::from_slots(
            ModelSlot::unbound(SlotRole::Primary, Some(String::new())),
            ModelSlot::unbound(SlotRole::Secondary, Some("secondary broken".into())),
        );
        assert_eq!(registry.snapshot().not_ready_message(), "secondary broken");

        let registry = ModelRegistry::new();
        assert_eq!(
            registry.snapshot().not_ready_message(),
            "No detection models are available."
        );
    }
}
