pub mod aggregator;
pub mod classifier;
pub mod fuser;
pub mod policy;
pub mod service;
pub mod types;

pub use classifier::{categorize, FoodCategory};
pub use policy::OrchestrationMode;
pub use service::DetectionService;
pub use types::{
    ClassifiedDetection, DetectorStatus, DualDetections, GroupedDetection, RawDetection, SlotRole,
};
