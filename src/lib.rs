pub mod config;
pub mod detection;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

pub use config::Config;
pub use detection::{
    ClassifiedDetection, DetectionService, DetectorStatus, DualDetections, FoodCategory,
    GroupedDetection, OrchestrationMode,
};
pub use utils::error::DetectError;

pub type Result<T> = std::result::Result<T, DetectError>;
