//! Food taxonomy for detector labels.
//!
//! Categorization is an ordered cascade: exact vocabulary match, then
//! substring containment over the same vocabulary, then keyword fragments.
//! An earlier tier always wins over a later one.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Fruits,
    Vegetables,
    Dairy,
    Meat,
    Grains,
    Other,
    Uncategorized,
}

impl FoodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodCategory::Fruits => "fruits",
            FoodCategory::Vegetables => "vegetables",
            FoodCategory::Dairy => "dairy",
            FoodCategory::Meat => "meat",
            FoodCategory::Grains => "grains",
            FoodCategory::Other => "other",
            FoodCategory::Uncategorized => "uncategorized",
        }
    }
}

impl fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const FRUITS: &[&str] = &[
    "apple",
    "banana",
    "blue berry",
    "stawberry", // misspelled class in the training set
    "strawberry",
    "lemon",
    "orange",
];

const VEGETABLES: &[&str] = &[
    "brinjal",
    "cabbage",
    "capsicum",
    "carrot",
    "corn",
    "cucumber",
    "ginger",
    "green beans",
    "green chilly",
    "green leaves",
    "lettuce",
    "mushroom",
    "potato",
    "sweet potato",
    "tomato",
    "spinach",
    "broccoli",
];

const DAIRY: &[&str] = &["milk", "cheese", "butter", "fresh cream", "yogurt", "egg"];

const MEAT: &[&str] = &["chicken", "meat", "shrimp"];

const GRAINS: &[&str] = &["bread", "flour"];

const OTHER: &[&str] = &["chocolate"];

/// Vocabulary in priority order.
const VOCABULARY: &[(FoodCategory, &[&str])] = &[
    (FoodCategory::Fruits, FRUITS),
    (FoodCategory::Vegetables, VEGETABLES),
    (FoodCategory::Dairy, DAIRY),
    (FoodCategory::Meat, MEAT),
    (FoodCategory::Grains, GRAINS),
];

/// Only consulted by the exact tier.
const EXACT_ONLY: &[(FoodCategory, &[&str])] = &[(FoodCategory::Other, OTHER)];

const FRAGMENTS: &[(FoodCategory, &[&str])] = &[
    (FoodCategory::Fruits, &["fruit", "berry"]),
    (FoodCategory::Vegetables, &["veg", "leaf"]),
    (FoodCategory::Dairy, &["milk", "cream", "cheese"]),
    (FoodCategory::Meat, &["chicken", "meat", "fish", "shrimp"]),
    (FoodCategory::Grains, &["bread", "flour", "grain"]),
];

/// Maps a raw detector label onto a food category.
pub fn categorize(label: &str) -> FoodCategory {
    let label = label.trim().to_lowercase();

    if let Some(category) = exact_match(&label) {
        return category;
    }

    if let Some(category) = substring_match(&label) {
        return category;
    }

    fragment_match(&label).unwrap_or(FoodCategory::Uncategorized)
}

fn exact_match(label: &str) -> Option<FoodCategory> {
    VOCABULARY
        .iter()
        .chain(EXACT_ONLY.iter())
        .find(|(_, words)| words.contains(&label))
        .map(|(category, _)| *category)
}

fn substring_match(label: &str) -> Option<FoodCategory> {
    VOCABULARY
        .iter()
        .find(|(_, words)| words.iter().any(|word| label.contains(word)))
        .map(|(category, _)| *category)
}

fn fragment_match(label: &str) -> Option<FoodCategory> {
    FRAGMENTS
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|fragment| label.contains(fragment)))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches() {
        assert_eq!(categorize("Strawberry"), FoodCategory::Fruits);
        assert_eq!(categorize("Sweet Potato"), FoodCategory::Vegetables);
        assert_eq!(categorize("egg"), FoodCategory::Dairy);
        assert_eq!(categorize("Shrimp"), FoodCategory::Meat);
        assert_eq!(categorize("flour"), FoodCategory::Grains);
        assert_eq!(categorize("  TOMATO "), FoodCategory::Vegetables);
    }

    #[test]
    fn test_chocolate_is_only_an_exact_match() {
        assert_eq!(categorize("Chocolate"), FoodCategory::Other);
        assert_eq!(categorize("dark chocolate bar"), FoodCategory::Uncategorized);
    }

    #[test]
    fn test_substring_respects_category_order() {
        // fruits are scanned before dairy
        assert_eq!(categorize("strawberry milk"), FoodCategory::Fruits);
        assert_eq!(categorize("milk chocolate"), FoodCategory::Dairy);
        assert_eq!(categorize("Pineapple"), FoodCategory::Fruits);
        assert_eq!(categorize("cheddar cheese"), FoodCategory::Dairy);
    }

    #[test]
    fn test_fragment_tier() {
        assert_eq!(categorize("blackberry"), FoodCategory::Fruits);
        assert_eq!(categorize("dragon fruit"), FoodCategory::Fruits);
        assert_eq!(categorize("leafy greens"), FoodCategory::Vegetables);
        assert_eq!(categorize("frozen veg"), FoodCategory::Vegetables);
        assert_eq!(categorize("sour cream"), FoodCategory::Dairy);
        assert_eq!(categorize("fish fillet"), FoodCategory::Meat);
        assert_eq!(categorize("whole grain"), FoodCategory::Grains);
    }

    #[test]
    fn test_substring_wins_over_fragment() {
        // "blue berry" is vocabulary, so the fragment tier never sees it
        assert_eq!(substring_match("frozen blue berry"), Some(FoodCategory::Fruits));
        assert_eq!(substring_match("blackberry"), None);
        assert_eq!(fragment_match("blackberry"), Some(FoodCategory::Fruits));
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(categorize("class_17"), FoodCategory::Uncategorized);
        assert_eq!(categorize(""), FoodCategory::Uncategorized);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&FoodCategory::Vegetables).unwrap();
        assert_eq!(json, "\"vegetables\"");
        assert_eq!(FoodCategory::Uncategorized.to_string(), "uncategorized");
    }
}
