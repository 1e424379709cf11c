//! Externally supplied floor metadata, keyed by scene node name.

use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloorStatus {
    Free,
    Reserved,
    Sold,
}

impl FloorStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorRecord {
    /// Name of the scene node group this record describes.
    pub key: String,
    pub display_name: String,
    pub floor_label: String,
    /// Floor area in square metres.
    pub size: f32,
    pub price: f64,
    pub status: FloorStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate floor key '{0}'")]
    DuplicateKey(String),
}

/// Ordered, read-only list of [`FloorRecord`]s with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorCatalog {
    records: Vec<FloorRecord>,
}

impl FloorCatalog {
    pub fn new(records: Vec<FloorRecord>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.key.as_str()) {
                return Err(CatalogError::DuplicateKey(record.key.clone()));
            }
        }
        Ok(Self { records })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<FloorRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn records(&self) -> &[FloorRecord] {
        &self.records
    }

    pub fn get(&self, key: &str) -> Option<&FloorRecord> {
        self.records.iter().find(|record| record.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"key": "EG", "displayName": "Ground floor", "floorLabel": "EG", "size": 92.5, "price": 420000, "status": "free"},
        {"key": "1.OG", "displayName": "First floor", "floorLabel": "1. OG", "size": 88.0, "price": 395000, "status": "reserved"},
        {"key": "DG", "displayName": "Attic", "floorLabel": "DG", "size": 61.0, "price": 310000, "status": "sold"}
    ]"#;

    #[test]
    fn parses_records_in_order() {
        let catalog = FloorCatalog::from_json(SAMPLE).unwrap();
        let keys: Vec<_> = catalog.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["EG", "1.OG", "DG"]);
        assert_eq!(catalog.get("1.OG").unwrap().status, FloorStatus::Reserved);
        assert_eq!(catalog.get("DG").unwrap().display_name, "Attic");
        assert!(catalog.get("KG").is_none());
    }

    #[test]
    fn rejects_duplicate_keys() {
        let json = r#"[
            {"key": "EG", "displayName": "a", "floorLabel": "EG", "size": 1, "price": 1, "status": "free"},
            {"key": "EG", "displayName": "b", "floorLabel": "EG", "size": 1, "price": 1, "status": "sold"}
        ]"#;
        match FloorCatalog::from_json(json) {
            Err(CatalogError::DuplicateKey(key)) => assert_eq!(key, "EG"),
            other => panic!("expected duplicate key error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        let json = r#"[{"key": "EG", "displayName": "a", "floorLabel": "EG", "size": 1, "price": 1, "status": "rented"}]"#;
        assert!(matches!(FloorCatalog::from_json(json), Err(CatalogError::Json(_))));
    }

    #[test]
    fn load_from_file() {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("archviz_floors_{}_{}.json", std::process::id(), nonce));
        std::fs::write(&path, SAMPLE).unwrap();

        let catalog = FloorCatalog::load(&path).unwrap();
        assert_eq!(catalog.records().len(), 3);

        let _ = std::fs::remove_file(path);
    }
}
