pub mod adapter;
pub mod labels;
pub mod registry;
pub mod yolo;

pub use adapter::{DetectorAdapter, DetectorFactory, InferenceFailure, InferenceOutcome};
pub use labels::{parse_label_map, LabelMap};
pub use registry::{BoundModel, ModelRegistry, ModelSlot, RegistrySnapshot};
pub use yolo::{YoloDetector, YoloFactory};
