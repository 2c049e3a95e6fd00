//! JSON export of a search session.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ReaderError;
use crate::search::{SearchMode, SearchResult};
use crate::state::QueryState;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub book_title: String,
    pub query: String,
    pub mode: SearchMode,
    pub max_results: usize,
    pub result_count: usize,
    /// seconds since epoch
    pub exported_at: u64,
    pub results: Vec<SearchResult>,
}

impl ExportDocument {
    pub fn from_query(book_title: &str, state: &QueryState) -> Self {
        let exported_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        ExportDocument {
            book_title: book_title.to_string(),
            query: state.query.clone(),
            mode: state.mode,
            max_results: state.max_results,
            result_count: state.results.len(),
            exported_at,
            results: state.results.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReaderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ReaderError> {
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), results = self.result_count, "Search results exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_state() -> QueryState {
        QueryState {
            query: "3".to_string(),
            mode: SearchMode::Chapter,
            max_results: 50,
            results: vec![SearchResult::Chapter {
                number: 3,
                title: "A Revolução".to_string(),
                start_page: 5,
                end_page: 6,
                page_count: 2,
            }],
        }
    }

    #[test]
    fn test_export_fields() {
        let doc = ExportDocument::from_query("Crônicas", &query_state());
        assert_eq!(doc.result_count, 1);
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["mode"], "chapter");
        assert_eq!(value["results"][0]["type"], "chapter");
        assert_eq!(value["results"][0]["title"], "A Revolução");
    }

    #[test]
    fn test_export_write_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("export.json");
        let doc = ExportDocument::from_query("Crônicas", &query_state());
        doc.write(&path).unwrap();
        let back: ExportDocument = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_export_write_to_missing_dir_fails() {
        let doc = ExportDocument::from_query("Crônicas", &query_state());
        let err = doc.write(Path::new("/nonexistent/dir/export.json")).unwrap_err();
        assert!(matches!(err, ReaderError::Io(_)));
    }
}
