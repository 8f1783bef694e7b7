//! # afpx-core
//!
//! A library for parsing AFP/MO:DCA print streams and extracting page ranges.
//!
//! This crate provides the core functionality for:
//! - Scanning byte streams for MO:DCA structured fields, with damage tolerance
//! - Indexing document structure (resource prologue, pages) from recognized markers
//! - Re-encoding selected pages into a standalone AFP stream
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scanner`]: Structured-field decoding, resynchronization, and signature recovery
//! - [`document`]: Document assembly, structural indexing, and page extraction
//! - [`pages`]: The 1-based page-range expression language
//! - [`analyze`]: Cheap stream surveying for reporting
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use afpx_core::{extract_pages, parse_page_range, Document};
//! use std::fs;
//!
//! // Parse a print stream
//! let document = Document::parse_file("./statements.afp")?;
//! println!("{} pages", document.page_count());
//!
//! // Pull the first three pages into a new stream
//! let pages: Vec<usize> = parse_page_range("1:3", document.page_count())?
//!     .into_iter()
//!     .collect();
//! let extraction = extract_pages(&document, &pages)?;
//! fs::write("./subset.afp", &extraction.data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod analyze;
pub mod document;
pub mod error;
pub mod pages;
pub mod scanner;

// Re-export primary types for convenience
pub use analyze::{analyze, analyze_file, Analysis};
pub use document::{
    extract_pages, Document, Extraction, ParseOrigin, StructureIndex, StructureWarning,
};
pub use error::{Error, Result};
pub use pages::parse_page_range;
pub use scanner::{Marker, ScanReport, Scanner, ScannerConfig, StructuredField, TypeCode};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
