use crate::detection::classifier::{categorize, FoodCategory};
use crate::models::LabelMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a model in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    Primary,
    Secondary,
}

impl SlotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::Primary => "primary",
            SlotRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector output before label resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
    pub class_index: u32,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// [x1, y1, x2, y2] in source image pixels
    pub bbox: [f32; 4],
    /// Filled in by the registry slot that ran the detector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_slot: Option<SlotRole>,
}

impl RawDetection {
    pub fn new(class_index: u32, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_index,
            confidence,
            bbox,
            source_slot: None,
        }
    }
}

/// Raw detection with a resolved name and food category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedDetection {
    pub name: String,
    pub category: FoodCategory,
    pub confidence: f32,
    pub bbox: [f32; 4],
    pub class_index: u32,
    pub source_slot: SlotRole,
}

impl ClassifiedDetection {
    /// Resolves the label through `labels`, falling back to `class_<index>`.
    pub fn classify(raw: RawDetection, labels: &LabelMap, role: SlotRole) -> Self {
        let name = labels.resolve(raw.class_index);
        let category = categorize(&name);

        Self {
            name,
            category,
            confidence: raw.confidence,
            bbox: raw.bbox,
            class_index: raw.class_index,
            source_slot: raw.source_slot.unwrap_or(role),
        }
    }
}

/// Counted summary of one model's detections sharing a name and category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDetection {
    pub name: String,
    pub category: FoodCategory,
    pub quantity: u32,
    pub unit: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// Per-model results for side-by-side comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DualDetections {
    pub model1: Vec<GroupedDetection>,
    pub model2: Vec<GroupedDetection>,
}

/// Readiness snapshot reported to API callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStatus {
    pub model_ready: bool,
    pub primary_model_ready: bool,
    pub secondary_model_ready: bool,
    pub primary_model_error: Option<String>,
    pub secondary_model_error: Option<String>,
    pub ensemble_mode: bool,
}
