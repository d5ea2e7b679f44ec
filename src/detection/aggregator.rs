//! Per-model grouping of duplicate detections.

use crate::detection::{ClassifiedDetection, FoodCategory, GroupedDetection};
use std::collections::HashMap;

/// Groups one model's detections by lowercased name and category.
///
/// The first detection of a group provides its name and bbox; each further
/// one bumps `quantity` and raises `confidence` to the running maximum.
pub fn group_and_count(detections: &[ClassifiedDetection]) -> Vec<GroupedDetection> {
    let mut grouped: Vec<GroupedDetection> = Vec::new();
    let mut index_by_key: HashMap<(String, FoodCategory), usize> = HashMap::new();

    for detection in detections {
        let key = (detection.name.trim().to_lowercase(), detection.category);

        if let Some(&idx) = index_by_key.get(&key) {
            let group = &mut grouped[idx];
            group.quantity += 1;
            group.confidence = group.confidence.max(detection.confidence);
            continue;
        }

        index_by_key.insert(key, grouped.len());
        grouped.push(GroupedDetection {
            name: detection.name.clone(),
            category: detection.category,
            quantity: 1,
            unit: "item".to_string(),
            confidence: detection.confidence,
            bbox: detection.bbox,
        });
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::SlotRole;

    fn det(name: &str, category: FoodCategory, confidence: f32, x: f32) -> ClassifiedDetection {
        ClassifiedDetection {
            name: name.to_string(),
            category,
            confidence,
            bbox: [x, x, x + 10.0, x + 10.0],
            class_index: 0,
            source_slot: SlotRole::Primary,
        }
    }

    #[test]
    fn test_group_and_count() {
        let grouped = group_and_count(&[
            det("tomato", FoodCategory::Vegetables, 0.8, 0.0),
            det("tomato", FoodCategory::Vegetables, 0.6, 20.0),
            det("egg", FoodCategory::Dairy, 0.99, 40.0),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].name, "tomato");
        assert_eq!(grouped[0].quantity, 2);
        assert_eq!(grouped[0].confidence, 0.8);
        assert_eq!(grouped[0].unit, "item");
        assert_eq!(grouped[1].name, "egg");
        assert_eq!(grouped[1].quantity, 1);
        assert_eq!(grouped[1].confidence, 0.99);
    }

    #[test]
    fn test_confidence_is_running_max_not_latest() {
        let grouped = group_and_count(&[
            det("apple", FoodCategory::Fruits, 0.5, 0.0),
            det("apple", FoodCategory::Fruits, 0.9, 10.0),
            det("apple", FoodCategory::Fruits, 0.7, 20.0),
        ]);

        assert_eq!(grouped[0].quantity, 3);
        assert_eq!(grouped[0].confidence, 0.9);
        // bbox stays with the first occurrence
        assert_eq!(grouped[0].bbox, [0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let grouped = group_and_count(&[
            det("Milk", FoodCategory::Dairy, 0.6, 0.0),
            det("milk ", FoodCategory::Dairy, 0.7, 5.0),
        ]);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].name, "Milk");
        assert_eq!(grouped[0].quantity, 2);
    }

    #[test]
    fn test_category_splits_groups() {
        let grouped = group_and_count(&[
            det("cream", FoodCategory::Dairy, 0.6, 0.0),
            det("cream", FoodCategory::Uncategorized, 0.7, 5.0),
        ]);

        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_and_count(&[]).is_empty());
    }
}
