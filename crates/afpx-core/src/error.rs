//! Error types for the afpx-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for afpx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all afpx operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A structured-field length prefix outside the valid range
    #[error("invalid field length {length} at offset {offset}")]
    MalformedLength {
        /// Byte offset of the length prefix
        offset: usize,
        /// The decoded length value
        length: usize,
    },

    /// A structured field extends past the end of the buffer
    #[error("truncated record at offset {offset}: need {needed} bytes, {available} remain")]
    TruncatedRecord {
        /// Byte offset where the record starts
        offset: usize,
        /// Bytes the record requires
        needed: usize,
        /// Bytes remaining in the buffer
        available: usize,
    },

    /// A field payload too large to frame with a 2-byte length prefix
    #[error("payload of {len} bytes exceeds the {max}-byte structured-field maximum")]
    PayloadTooLarge {
        /// Offending payload size
        len: usize,
        /// Largest encodable payload
        max: usize,
    },

    /// No recognized structured fields after primary and recovery scans
    #[error("no recognizable AFP structured fields found ({fields_seen} unrecognized fields decoded)")]
    NotAfpFormat {
        /// Fields decoded without recognizing any type code
        fields_seen: usize,
    },

    /// The document contains no pages to extract from
    #[error("no pages found in the document")]
    NoPages,

    /// Every requested page is out of range
    #[error("none of the requested pages {requested:?} are valid: the document has {total_pages} pages")]
    NoValidPages {
        /// Requested page numbers, 1-based as users write them
        requested: Vec<usize>,
        /// Pages available in the document
        total_pages: usize,
    },

    /// Invalid page-range expression
    #[error("invalid page range: {reason}")]
    InvalidPageRange {
        /// What was wrong with the expression
        reason: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new malformed-length error
    pub fn malformed_length(offset: usize, length: usize) -> Self {
        Self::MalformedLength { offset, length }
    }

    /// Creates a new truncated-record error
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedRecord {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new oversized-payload error
    pub fn payload_too_large(len: usize) -> Self {
        Self::PayloadTooLarge {
            len,
            max: crate::scanner::MAX_PAYLOAD_LEN,
        }
    }

    /// Creates a new invalid-page-range error
    pub fn invalid_page_range(reason: impl Into<String>) -> Self {
        Self::InvalidPageRange {
            reason: reason.into(),
        }
    }

    /// Returns true if the scanner can resynchronize past this error by
    /// skipping a byte and continuing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedLength { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed_length(42, 70000);
        assert!(err.to_string().contains("invalid field length 70000"));
        assert!(err.to_string().contains("offset 42"));

        let err = Error::truncated(10, 500, 20);
        assert!(err.to_string().contains("truncated record at offset 10"));

        let err = Error::invalid_page_range("page numbers must be >= 1, got 0");
        assert!(err.to_string().contains("invalid page range"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::malformed_length(0, 3).is_recoverable());
        assert!(!Error::truncated(0, 10, 4).is_recoverable());
        assert!(!Error::NoPages.is_recoverable());
    }
}
