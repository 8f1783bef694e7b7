//! Page extraction: re-encoding a subset of a document's pages.
//!
//! The output stream always carries the full resource prologue (every
//! field before the first page), then the selected page spans in
//! ascending page order. When the selection alone would not end with an
//! EDT (End Document) field, the source's EDT is appended so downstream
//! consumers see a closed document. The assembled sequence is then
//! checked for the BDT/EDT/BPG markers; misses surface as warnings, not
//! errors.

use crate::error::{Error, Result};
use crate::scanner::Marker;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::Document;

/// Structural defects in the assembled output that do not block extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureWarning {
    /// The output has no BDT (Begin Document) field
    MissingBeginDocument,
    /// The output has no EDT (End Document) field
    MissingEndDocument,
    /// The output has no BPG (Begin Page) field
    MissingBeginPage,
}

impl fmt::Display for StructureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBeginDocument => write!(f, "output has no BDT (Begin Document) field"),
            Self::MissingEndDocument => write!(f, "output has no EDT (End Document) field"),
            Self::MissingBeginPage => write!(f, "output has no BPG (Begin Page) field"),
        }
    }
}

/// Result of a page extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The re-encoded output stream
    pub data: Vec<u8>,
    /// Pages included in the output, 0-indexed ascending
    pub pages: Vec<usize>,
    /// Requested pages that do not exist, 0-indexed ascending
    pub skipped: Vec<usize>,
    /// Structural defects observed in the source
    pub warnings: Vec<StructureWarning>,
}

/// Re-encodes the requested pages (0-indexed) of `document` into a new
/// stream.
///
/// Requests are deduplicated and emitted in ascending page order;
/// out-of-range pages are reported in [`Extraction::skipped`], and
/// structural defects in the assembled output in
/// [`Extraction::warnings`]. Fails with [`Error::NoPages`] when the
/// document has no pages at all and with [`Error::NoValidPages`] when
/// every requested page is out of range.
pub fn extract_pages(document: &Document, requested: &[usize]) -> Result<Extraction> {
    let total_pages = document.page_count();
    if total_pages == 0 {
        return Err(Error::NoPages);
    }

    let unique: BTreeSet<usize> = requested.iter().copied().collect();
    let mut pages = Vec::new();
    let mut skipped = Vec::new();
    for page in unique {
        if page < total_pages {
            pages.push(page);
        } else {
            skipped.push(page);
        }
    }
    if pages.is_empty() {
        return Err(Error::NoValidPages {
            requested: skipped.iter().map(|page| page + 1).collect(),
            total_pages,
        });
    }

    let index = document.index();
    let fields = document.fields();
    let mut selected: Vec<usize> = (0..index.resource_end).collect();
    for &page in &pages {
        if let Some(span) = document.page_span(page) {
            selected.extend(span);
        }
    }

    let mut has_begin = false;
    let mut has_end = false;
    let mut has_page = false;
    for &i in &selected {
        match fields[i].field.marker() {
            Some(Marker::BeginDocument) => has_begin = true,
            Some(Marker::EndDocument) => has_end = true,
            Some(Marker::BeginPage) => has_page = true,
            _ => {}
        }
    }

    // Reuse the source's EDT when the selection did not pick one up
    if !has_end {
        if let Some(last_end) = index.end_document {
            selected.push(last_end);
            has_end = true;
        }
    }

    // Presence checks cover the assembled output, not the source
    let mut warnings = Vec::new();
    if !has_begin {
        warnings.push(StructureWarning::MissingBeginDocument);
    }
    if !has_end {
        warnings.push(StructureWarning::MissingEndDocument);
    }
    if !has_page {
        warnings.push(StructureWarning::MissingBeginPage);
    }

    let size = selected
        .iter()
        .map(|&i| fields[i].field.encoded_len())
        .sum();
    let mut data = Vec::with_capacity(size);
    for &i in &selected {
        fields[i].field.encode_into(&mut data);
    }

    debug!(
        "Extracted {} of {} pages into {} fields ({} bytes)",
        pages.len(),
        total_pages,
        selected.len(),
        data.len()
    );

    Ok(Extraction {
        data,
        pages,
        skipped,
        warnings,
    })
}
