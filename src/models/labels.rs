//! Class-index to label-name maps.
//!
//! Two file layouts are understood: a YOLO dataset manifest (`data.yaml`)
//! whose `names` key holds either a list or an index mapping, and a plain
//! dictionary file with one label per line. Any read or parse problem yields
//! an empty map so detection keeps working with synthetic class names.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    names: HashMap<u32, String>,
}

impl LabelMap {
    pub fn new(names: HashMap<u32, String>) -> Self {
        Self { names }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (idx as u32, name.into()))
            .collect();
        Self { names }
    }

    /// Label for `class_index`, or `class_<index>` when unmapped.
    pub fn resolve(&self, class_index: u32) -> String {
        self.names
            .get(&class_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_index))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct DatasetManifest {
    #[serde(default)]
    names: Value,
}

/// Parses the label file at `path`; never fails.
pub fn parse_label_map(path: &Path) -> LabelMap {
    if !path.exists() {
        tracing::info!("Label file not found at {}, using synthetic class names", path.display());
        return LabelMap::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return LabelMap::default();
        }
    };

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let parsed = if is_yaml {
        parse_manifest(&content)
    } else {
        Ok(parse_dictionary(&content))
    };

    match parsed {
        Ok(labels) => {
            tracing::info!("Loaded {} class names from {}", labels.len(), path.display());
            labels
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            LabelMap::default()
        }
    }
}

fn parse_manifest(content: &str) -> std::result::Result<LabelMap, String> {
    let manifest: Option<DatasetManifest> =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    let names = match manifest.map(|m| m.names) {
        None | Some(Value::Null) => return Ok(LabelMap::default()),
        Some(names) => names,
    };

    match names {
        // entries without a usable name keep the synthetic `class_<i>` label
        Value::Sequence(items) => Ok(LabelMap::new(
            items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| scalar_to_string(item).map(|name| (idx as u32, name)))
                .collect(),
        )),
        Value::Mapping(entries) => {
            let mut map = HashMap::with_capacity(entries.len());
            for (key, value) in entries.iter() {
                let idx = scalar_to_index(key)
                    .ok_or_else(|| format!("invalid class index {:?}", key))?;
                let name = scalar_to_string(value)
                    .ok_or_else(|| format!("invalid class name for index {}", idx))?;
                map.insert(idx, name);
            }
            Ok(LabelMap::new(map))
        }
        other => Err(format!("unexpected `names` value: {:?}", other)),
    }
}

fn parse_dictionary(content: &str) -> LabelMap {
    LabelMap::from_names(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty()),
    )
}

fn scalar_to_index(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_yaml_list() {
        let file = write_file(".yaml", "nc: 3\nnames: ['apple', 'banana', 'egg']\n");
        let labels = parse_label_map(file.path());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.resolve(0), "apple");
        assert_eq!(labels.resolve(2), "egg");
    }

    #[test]
    fn test_yaml_mapping() {
        let file = write_file(".yaml", "names:\n  0: milk\n  4: sweet potato\n  '7': tomato\n");
        let labels = parse_label_map(file.path());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.resolve(4), "sweet potato");
        assert_eq!(labels.resolve(7), "tomato");
        assert_eq!(labels.resolve(1), "class_1");
    }

    #[test]
    fn test_plain_dictionary() {
        let file = write_file(".txt", "apple\n\n  carrot  \nbread\n");
        let labels = parse_label_map(file.path());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.resolve(1), "carrot");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let labels = parse_label_map(&dir.path().join("data.yaml"));
        assert!(labels.is_empty());
        assert_eq!(labels.resolve(3), "class_3");
    }

    #[test]
    fn test_corrupt_yaml_is_empty() {
        let file = write_file(".yaml", "names: [apple, banana\n  : ::\n");
        assert!(parse_label_map(file.path()).is_empty());

        let file = write_file(".yaml", "names: 42\n");
        assert!(parse_label_map(file.path()).is_empty());
    }

    #[test]
    fn test_yaml_list_null_entry_keeps_synthetic_name() {
        let file = write_file(".yaml", "names: ['apple', null, 'egg']\n");
        let labels = parse_label_map(file.path());

        assert_eq!(labels.len(), 2);
        assert_eq!(labels.resolve(0), "apple");
        assert_eq!(labels.resolve(1), "class_1");
        assert_eq!(labels.resolve(2), "egg");
    }

    #[test]
    fn test_manifest_without_names() {
        let file = write_file(".yml", "train: images/train\n");
        assert!(parse_label_map(file.path()).is_empty());
    }
}
