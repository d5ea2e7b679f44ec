//! Ensemble result fusion.

use crate::detection::ClassifiedDetection;
use std::collections::HashMap;

/// Merges two classified detection lists into one list with a single entry
/// per lowercased name.
///
/// Primary detections are visited first. A later detection replaces the
/// stored one only when its confidence is strictly greater, so ties keep the
/// primary entry. Output follows first-insertion order.
pub fn merge(
    primary: Vec<ClassifiedDetection>,
    secondary: Vec<ClassifiedDetection>,
) -> Vec<ClassifiedDetection> {
    let mut merged: Vec<ClassifiedDetection> = Vec::with_capacity(primary.len() + secondary.len());
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for detection in primary.into_iter().chain(secondary) {
        let key = detection.name.to_lowercase();

        match index_by_name.get(&key) {
            Some(&idx) => {
                if detection.confidence > merged[idx].confidence {
                    merged[idx] = detection;
                }
            }
            None => {
                index_by_name.insert(key, merged.len());
                merged.push(detection);
            }
        }
    }

    merged
}
