//! Mode selection and the inference sequences behind each mode.

use crate::detection::{aggregator, fuser, ClassifiedDetection, DualDetections, GroupedDetection};
use crate::models::{BoundModel, InferenceFailure, RegistrySnapshot};
use crate::utils::error::DetectError;
use crate::Result;
use image::DynamicImage;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    /// No slot is bound
    Unavailable,
    /// Only the primary slot is bound
    PrimaryOnly,
    /// Only the secondary slot is bound
    SecondaryOnly,
    /// Both bound, ensemble off: primary first, secondary on failure
    FallbackChain,
    /// Both bound and fused
    Ensemble,
}

impl OrchestrationMode {
    pub fn select(primary_ready: bool, secondary_ready: bool, ensemble: bool) -> Self {
        match (primary_ready, secondary_ready) {
            (true, true) if ensemble => OrchestrationMode::Ensemble,
            (true, true) => OrchestrationMode::FallbackChain,
            (true, false) => OrchestrationMode::PrimaryOnly,
            (false, true) => OrchestrationMode::SecondaryOnly,
            (false, false) => OrchestrationMode::Unavailable,
        }
    }

    pub fn for_snapshot(snapshot: &RegistrySnapshot) -> Self {
        Self::select(
            snapshot.primary.is_some(),
            snapshot.secondary.is_some(),
            snapshot.ensemble,
        )
    }
}

impl fmt::Display for OrchestrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestrationMode::Unavailable => "unavailable",
            OrchestrationMode::PrimaryOnly => "primary_only",
            OrchestrationMode::SecondaryOnly => "secondary_only",
            OrchestrationMode::FallbackChain => "fallback_chain",
            OrchestrationMode::Ensemble => "ensemble",
        };
        f.write_str(name)
    }
}

/// Runs the detection sequence selected for `snapshot`.
pub fn execute(snapshot: &RegistrySnapshot, image: &DynamicImage) -> Result<Vec<ClassifiedDetection>> {
    let mode = OrchestrationMode::for_snapshot(snapshot);
    tracing::debug!("Running detection in {} mode", mode);

    match (mode, &snapshot.primary, &snapshot.secondary) {
        (OrchestrationMode::Ensemble, Some(primary), Some(secondary)) => {
            run_ensemble(primary, secondary, image)
        }
        (OrchestrationMode::PrimaryOnly | OrchestrationMode::FallbackChain, Some(primary), secondary) => {
            run_with_fallback(primary, secondary.as_ref(), image)
        }
        (OrchestrationMode::SecondaryOnly, _, Some(secondary)) => secondary
            .detect(image)
            .map_err(|e| DetectError::Inference(format!("Secondary model failed: {}", e))),
        _ => Err(DetectError::ModelNotReady(snapshot.not_ready_message())),
    }
}

/// Runs every bound slot on its own and groups each result list.
///
/// A failing slot contributes an empty list instead of failing the call.
pub fn execute_separately(snapshot: &RegistrySnapshot, image: &DynamicImage) -> Result<DualDetections> {
    if !snapshot.any_ready() {
        return Err(DetectError::ModelNotReady(snapshot.not_ready_message()));
    }

    Ok(DualDetections {
        model1: snapshot
            .primary
            .as_ref()
            .map(|model| grouped_or_empty(model, image))
            .unwrap_or_default(),
        model2: snapshot
            .secondary
            .as_ref()
            .map(|model| grouped_or_empty(model, image))
            .unwrap_or_default(),
    })
}

fn run_ensemble(
    primary: &BoundModel,
    secondary: &BoundModel,
    image: &DynamicImage,
) -> Result<Vec<ClassifiedDetection>> {
    let primary_outcome = primary.detect(image);
    let secondary_outcome = secondary.detect(image);

    match (primary_outcome, secondary_outcome) {
        (Ok(primary_detections), Ok(secondary_detections)) => {
            let merged = fuser::merge(primary_detections, secondary_detections);
            tracing::debug!("Ensemble merged into {} detections", merged.len());
            Ok(merged)
        }
        (primary_outcome, secondary_outcome) => {
            let message = format!(
                "Ensemble inference failed (primary: {}; secondary: {})",
                describe(&primary_outcome),
                describe(&secondary_outcome)
            );
            tracing::warn!("{}", message);
            Err(DetectError::Inference(message))
        }
    }
}

fn run_with_fallback(
    primary: &BoundModel,
    secondary: Option<&BoundModel>,
    image: &DynamicImage,
) -> Result<Vec<ClassifiedDetection>> {
    let primary_error = match primary.detect(image) {
        Ok(detections) => return Ok(detections),
        Err(e) => e,
    };

    let Some(secondary) = secondary else {
        tracing::warn!("Primary model failed with no fallback available: {}", primary_error);
        return Err(DetectError::Inference(format!(
            "Primary model failed: {}; no secondary model available for fallback",
            primary_error
        )));
    };

    tracing::warn!("Primary model failed, trying secondary: {}", primary_error);

    secondary.detect(image).map_err(|secondary_error| {
        DetectError::Inference(format!(
            "Both primary and secondary models failed (primary: {}; secondary: {})",
            primary_error, secondary_error
        ))
    })
}

fn grouped_or_empty(model: &BoundModel, image: &DynamicImage) -> Vec<GroupedDetection> {
    match model.detect(image) {
        Ok(detections) => aggregator::group_and_count(&detections),
        Err(e) => {
            tracing::warn!("{} model failed: {}", model.role(), e);
            Vec::new()
        }
    }
}

fn describe(outcome: &std::result::Result<Vec<ClassifiedDetection>, InferenceFailure>) -> String {
    match outcome {
        Ok(detections) => format!("ok, {} detections", detections.len()),
        Err(e) => format!("failed: {}", e),
    }
}
