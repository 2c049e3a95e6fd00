//! Unified error type for the book reader.

use thiserror::Error;

/// All errors that can occur outside the search path itself.
///
/// Searches never fail: a query without matches yields an empty list.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// I/O error (book file, index cache, export file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Book or export JSON could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialization/deserialization error (bincode)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Page number outside the loaded book
    #[error("Page {page} is out of range (book has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// Argument validation error
    #[error("{0}")]
    InvalidArgs(String),

    /// Failed to load an index from disk
    #[error("Failed to load index from {path}: {message}")]
    IndexLoad {
        path: String,
        message: String,
    },

    /// Cached index was built from a different book
    #[error("Index fingerprint mismatch (expected {expected:016x}, found {found:016x})")]
    IndexMismatch { expected: u64, found: u64 },

    /// Cached index was built with different index options
    #[error("Index options mismatch (expected {expected}, found {found})")]
    IndexOptionsMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = ReaderError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_page_out_of_range_display() {
        let err = ReaderError::PageOutOfRange { page: 12, page_count: 3 };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("3 pages"));
    }

    #[test]
    fn test_invalid_regex_display() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err = ReaderError::InvalidRegex {
            pattern: "[invalid".to_string(),
            source: regex_err,
        };
        assert!(err.to_string().contains("[invalid"));
    }

    #[test]
    fn test_index_mismatch_display_is_hex() {
        let err = ReaderError::IndexMismatch { expected: 0xff, found: 0x10 };
        let msg = err.to_string();
        assert!(msg.contains("00000000000000ff"), "got: {}", msg);
        assert!(msg.contains("0000000000000010"), "got: {}", msg);
    }

    #[test]
    fn test_index_options_mismatch_display() {
        let err = ReaderError::IndexOptionsMismatch {
            expected: "counts".to_string(),
            found: "counts_nostop".to_string(),
        };
        assert_eq!(err.to_string(), "Index options mismatch (expected counts, found counts_nostop)");
    }

    #[test]
    fn test_json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ReaderError = json_err.into();
        assert!(matches!(err, ReaderError::Json(_)));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: ReaderError = io_err.into();
        assert!(matches!(err, ReaderError::Io(_)));
    }
}
