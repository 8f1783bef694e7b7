//! Document assembly: turning a byte stream into an indexed AFP document.
//!
//! ## Architecture
//!
//! [`Document::parse`] runs the full pipeline:
//!
//! 1. Scan the buffer from offset zero with the strict default scanner
//! 2. If nothing recognizable decodes, fall back to signature recovery
//! 3. Re-scan the recovered offset exhaustively so every field is retained
//! 4. Index the structural markers for page lookup and extraction
//!
//! A buffer that yields no recognized marker on either path is rejected
//! as [`Error::NotAfpFormat`].

mod extract;

use crate::error::{Error, Result};
use crate::scanner::{
    self, Marker, RecoveredStart, ScanReport, ScanWarning, ScannedField, Scanner, ScannerConfig,
    Termination,
};
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

pub use extract::{extract_pages, Extraction, StructureWarning};

/// Positions of structural markers within a document's field sequence.
///
/// All positions are indices into [`Document::fields`], not byte offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureIndex {
    /// First BDT (Begin Document) field, if any
    pub begin_document: Option<usize>,
    /// Last EDT (End Document) field, if any
    pub end_document: Option<usize>,
    /// Every BPG (Begin Page) field, in stream order
    pub page_starts: Vec<usize>,
    /// Fields before this index form the resource prologue
    pub resource_end: usize,
}

/// How the start of the field stream was located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOrigin {
    /// The stream decoded from offset zero
    Primary,
    /// The stream start was located by signature search
    Recovered(RecoveredStart),
}

/// A parsed AFP document: the decoded fields plus a structural index
#[derive(Debug, Clone)]
pub struct Document {
    report: ScanReport,
    index: StructureIndex,
    origin: ParseOrigin,
}

impl Document {
    /// Parses a byte stream into a document.
    ///
    /// The buffer is scanned from offset zero first; when that decodes no
    /// recognized marker, signature recovery picks an alternative start
    /// offset. Fails with [`Error::NotAfpFormat`] when neither path finds
    /// a recognized field.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let report = Scanner::new().scan(&data);

        if report.recognized_fields > 0 {
            debug!(
                "Parsed {} fields ({} recognized) from offset 0",
                report.total_fields, report.recognized_fields
            );
            let index = index_fields(&report.fields);
            return Ok(Self {
                report,
                index,
                origin: ParseOrigin::Primary,
            });
        }

        // Nothing recognizable at offset zero; the stream may carry a
        // spool header or be a partial copy
        let Some(recovery) = scanner::recover(&data) else {
            return Err(Error::NotAfpFormat {
                fields_seen: report.total_fields,
            });
        };

        let report =
            Scanner::with_config(ScannerConfig::exhaustive()).scan_at(&data, recovery.start.offset);
        debug!(
            "Parsed {} fields ({} recognized) from recovered offset {}",
            report.total_fields, report.recognized_fields, recovery.start.offset
        );
        let index = index_fields(&report.fields);
        Ok(Self {
            report,
            index,
            origin: ParseOrigin::Recovered(recovery.start),
        })
    }

    /// Reads and parses a file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(data)
    }

    /// Returns the decoded fields in stream order
    pub fn fields(&self) -> &[ScannedField] {
        &self.report.fields
    }

    /// Returns the warnings raised while scanning
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.report.warnings
    }

    /// Returns why the scan stopped
    pub fn termination(&self) -> Termination {
        self.report.termination
    }

    /// Returns how the stream start was located
    pub fn origin(&self) -> ParseOrigin {
        self.origin
    }

    /// Returns the structural marker index
    pub fn index(&self) -> &StructureIndex {
        &self.index
    }

    /// Returns the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.index.page_starts.len()
    }

    /// Returns the number of fields with recognized markers
    pub fn recognized_fields(&self) -> usize {
        self.report.recognized_fields
    }

    /// Returns the field range covering page `page` (0-indexed).
    ///
    /// A page runs from its BPG field to the next page's BPG; the last
    /// page ends at the first EDT after it, or at the end of the stream.
    /// Returns `None` when the page does not exist.
    pub fn page_span(&self, page: usize) -> Option<Range<usize>> {
        let start = *self.index.page_starts.get(page)?;
        if let Some(&next) = self.index.page_starts.get(page + 1) {
            return Some(start..next);
        }

        let end = self.report.fields[start + 1..]
            .iter()
            .position(|scanned| scanned.field.marker() == Some(Marker::EndDocument))
            .map(|relative| start + 1 + relative)
            .unwrap_or(self.report.fields.len());
        Some(start..end)
    }
}

/// Builds the structural index for a field sequence
fn index_fields(fields: &[ScannedField]) -> StructureIndex {
    let mut index = StructureIndex {
        begin_document: None,
        end_document: None,
        page_starts: Vec::new(),
        resource_end: fields.len(),
    };

    for (position, scanned) in fields.iter().enumerate() {
        match scanned.field.marker() {
            Some(Marker::BeginDocument) => {
                if index.begin_document.is_none() {
                    index.begin_document = Some(position);
                }
            }
            Some(Marker::EndDocument) => index.end_document = Some(position),
            Some(Marker::BeginPage) => index.page_starts.push(position),
            _ => {}
        }
    }

    if let Some(&first_page) = index.page_starts.first() {
        index.resource_end = first_page;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{StructuredField, TypeCode};
    use pretty_assertions::assert_eq;

    fn encode_all(fields: &[(TypeCode, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (code, payload) in fields {
            StructuredField::new(*code, payload.to_vec())
                .unwrap()
                .encode_into(&mut out);
        }
        out
    }

    #[test]
    fn test_parse_clean_document() {
        let data = encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b"doc"),
            (TypeCode::BEGIN_RESOURCE_GROUP, b""),
            (TypeCode::END_RESOURCE_GROUP, b""),
            (TypeCode::BEGIN_PAGE, b"p1"),
            (TypeCode::END_PAGE, b"p1"),
            (TypeCode::BEGIN_PAGE, b"p2"),
            (TypeCode::END_PAGE, b"p2"),
            (TypeCode::END_DOCUMENT, b""),
        ]);

        let document = Document::parse(data).unwrap();
        assert_eq!(document.origin(), ParseOrigin::Primary);
        assert_eq!(document.fields().len(), 8);
        assert_eq!(document.page_count(), 2);
        assert!(document.warnings().is_empty());
        assert_eq!(document.termination(), Termination::EndOfBuffer);

        let index = document.index();
        assert_eq!(index.begin_document, Some(0));
        assert_eq!(index.end_document, Some(7));
        assert_eq!(index.page_starts, vec![3, 5]);
        assert_eq!(index.resource_end, 3);
    }

    #[test]
    fn test_index_without_pages() {
        let data = encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b""),
            (TypeCode::END_DOCUMENT, b""),
        ]);

        let document = Document::parse(data).unwrap();
        assert_eq!(document.page_count(), 0);
        assert_eq!(document.page_span(0), None);

        // With no BPG the whole field sequence counts as prologue
        let index = document.index();
        assert_eq!(index.begin_document, Some(0));
        assert_eq!(index.end_document, Some(1));
        assert_eq!(index.resource_end, 2);
    }

    #[test]
    fn test_parse_rejects_unrecognized_streams() {
        let err = Document::parse(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, Error::NotAfpFormat { fields_seen: 0 }));

        // Valid framing but no recognized type codes anywhere
        let data = encode_all(&[
            (TypeCode([0x01, 0x02, 0x03]), b"a"),
            (TypeCode([0x04, 0x05, 0x06]), b"b"),
            (TypeCode([0x07, 0x08, 0x09]), b"c"),
        ]);
        let err = Document::parse(data).unwrap_err();
        assert!(matches!(err, Error::NotAfpFormat { fields_seen: 3 }));
    }

    #[test]
    fn test_parse_recovers_prefixed_stream() {
        let mut data = vec![0u8; 40];
        data.extend_from_slice(&encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b""),
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode::END_PAGE, b""),
            (TypeCode::END_DOCUMENT, b""),
        ]));

        let document = Document::parse(data).unwrap();
        match document.origin() {
            ParseOrigin::Recovered(start) => {
                assert_eq!(start.offset, 42);
                assert_eq!(start.signature, "BDT");
            }
            ParseOrigin::Primary => panic!("expected recovered origin"),
        }

        // The BDT bytes themselves are consumed by resynchronization, so
        // the recovered stream starts at the BPG field
        assert_eq!(document.fields().len(), 3);
        assert_eq!(document.page_count(), 1);
        assert_eq!(document.index().begin_document, None);
        assert_eq!(document.index().end_document, Some(2));
        assert_eq!(document.index().resource_end, 0);
        assert_eq!(document.warnings().len(), 3);
    }

    #[test]
    fn test_page_span() {
        let data = encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b""),
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode::END_PAGE, b""),
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode::END_PAGE, b""),
            (TypeCode::END_DOCUMENT, b""),
        ]);

        let document = Document::parse(data).unwrap();
        assert_eq!(document.page_span(0), Some(1..3));
        assert_eq!(document.page_span(1), Some(3..5));
        assert_eq!(document.page_span(2), None);
    }

    #[test]
    fn test_page_span_without_end_document() {
        let data = encode_all(&[
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode::END_PAGE, b""),
            (TypeCode([0x01, 0x02, 0x03]), b"trailing"),
        ]);

        let document = Document::parse(data).unwrap();
        assert_eq!(document.page_span(0), Some(0..3));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.afp");
        std::fs::write(
            &path,
            encode_all(&[
                (TypeCode::BEGIN_DOCUMENT, b""),
                (TypeCode::BEGIN_PAGE, b""),
                (TypeCode::END_DOCUMENT, b""),
            ]),
        )
        .unwrap();

        let document = Document::parse_file(&path).unwrap();
        assert_eq!(document.page_count(), 1);

        let err = Document::parse_file(dir.path().join("absent.afp")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
