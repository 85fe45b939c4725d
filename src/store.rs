//! Record Store Module
//!
//! Read path for the scraped announcement rows. The pipeline only ever
//! reads; enrichment output is computed per request and never written
//! back.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::types::RawPolicyRecord;

/// The record store seam: rows come back most recent first.
pub trait PolicyStore: Send + Sync {
    fn load_records(&self) -> Result<Vec<RawPolicyRecord>>;
}

/// JSON-file-backed store for local runs: a single file holding an array
/// of raw records.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }
}

impl PolicyStore for JsonFileStore {
    fn load_records(&self) -> Result<Vec<RawPolicyRecord>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read policy records from {:?}", self.path))?;

        let mut records: Vec<RawPolicyRecord> = serde_json::from_str(&content)
            .with_context(|| "Failed to parse policy records JSON")?;

        // Most recent first; rows without a timestamp sink to the end
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("policy-store-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_load_records_sorted_by_recency() {
        let path = temp_path("sorted");
        fs::write(
            &path,
            r#"[
                {"id": 1, "title": "오래된 공고", "created_at": "2026-01-01T00:00:00Z"},
                {"id": 2, "title": "최신 공고", "created_at": "2026-02-01T00:00:00Z"}
            ]"#,
        )
        .unwrap();

        let records = JsonFileStore::new(&path).load_records().unwrap();
        assert_eq!(records[0].id, 2);
        assert_eq!(records[1].id, 1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let store = JsonFileStore::new("/nonexistent/policies.json");
        assert!(store.load_records().is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "not json").unwrap();
        assert!(JsonFileStore::new(&path).load_records().is_err());
        fs::remove_file(&path).ok();
    }
}
