use crate::detection::RawDetection;
use crate::Result;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// Transient failure of a single inference call.
///
/// Never changes the readiness of the slot that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct InferenceFailure {
    pub reason: String,
}

impl InferenceFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type InferenceOutcome = std::result::Result<Vec<RawDetection>, InferenceFailure>;

/// A loaded object-detection model
pub trait DetectorAdapter: Send + Sync {
    /// Detector name (for logging)
    fn name(&self) -> &str;

    /// Runs the model on a decoded image. Nothing found is an empty list.
    fn infer(&self, image: &DynamicImage) -> InferenceOutcome;
}

/// Builds a detector from a weights file. Only construction may fail here.
pub trait DetectorFactory: Send + Sync {
    fn build(&self, weights_path: &Path) -> Result<Box<dyn DetectorAdapter>>;
}

impl<F> DetectorFactory for F
where
    F: Fn(&Path) -> Result<Box<dyn DetectorAdapter>> + Send + Sync,
{
    fn build(&self, weights_path: &Path) -> Result<Box<dyn DetectorAdapter>> {
        self(weights_path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Detector doubles shared by unit tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns the same detections on every call
    pub struct StaticDetector {
        pub detections: Vec<RawDetection>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StaticDetector {
        pub fn new(detections: Vec<RawDetection>) -> Self {
            Self {
                detections,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DetectorAdapter for StaticDetector {
        fn name(&self) -> &str {
            "static"
        }

        fn infer(&self, _image: &DynamicImage) -> InferenceOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    /// Fails every call with a fixed reason
    pub struct FailingDetector {
        pub reason: String,
        pub calls: Arc<AtomicUsize>,
    }

    impl FailingDetector {
        pub fn new(reason: &str) -> Self {
            Self {
                reason: reason.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DetectorAdapter for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        fn infer(&self, _image: &DynamicImage) -> InferenceOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InferenceFailure::new(self.reason.clone()))
        }
    }

    pub fn blank_image() -> DynamicImage {
        DynamicImage::new_rgb8(32, 32)
    }
}
