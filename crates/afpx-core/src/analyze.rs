//! Stream surveying without full document assembly.
//!
//! Analysis answers "what is this file?" cheaply: it scans with the
//! default warning budget but retains only the leading fields, falling
//! back to signature recovery when offset zero yields nothing
//! recognizable. Use [`crate::Document::parse`] instead when every field
//! is needed.

use crate::error::{Error, Result};
use crate::scanner::{
    self, Marker, RecoveredStart, ScanWarning, Scanner, ScannerConfig, Termination, TypeCode,
    DEFAULT_MAX_RETAINED,
};
use bytes::Bytes;
use std::path::Path;

/// Per-field line item for reporting
#[derive(Debug, Clone)]
pub struct FieldSummary {
    /// Byte offset of the field
    pub offset: usize,
    /// The field's type code
    pub code: TypeCode,
    /// Marker label when the code is recognized
    pub marker: Option<Marker>,
    /// Payload size in bytes
    pub payload_len: usize,
}

/// Survey of a single data stream
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Size of the input in bytes
    pub size: usize,
    /// True when at least one recognized marker decoded
    pub is_afp: bool,
    /// Every field decoded, including ones not summarized
    pub total_fields: usize,
    /// Fields whose type code appears in the marker table
    pub recognized_fields: usize,
    /// Fields carrying the BPG (Begin Page) code
    pub page_fields: usize,
    /// Leading warnings, bounded by the permissive retention cap
    pub warnings: Vec<ScanWarning>,
    /// Every warning raised, including ones not retained
    pub total_warnings: usize,
    /// Why the scan stopped
    pub termination: Termination,
    /// Set when the stream only decodes from a recovered offset
    pub recovered: Option<RecoveredStart>,
    /// Leading fields, bounded by the permissive retention cap
    pub fields: Vec<FieldSummary>,
}

/// Surveys a byte stream, trying signature recovery when offset zero
/// decodes nothing recognizable
pub fn analyze(data: impl Into<Bytes>) -> Analysis {
    let data = data.into();
    let scanner = Scanner::with_config(ScannerConfig::new().max_retained(DEFAULT_MAX_RETAINED));
    let mut report = scanner.scan(&data);
    let mut recovered = None;

    if report.recognized_fields == 0 {
        if let Some(recovery) = scanner::recover(&data) {
            recovered = Some(recovery.start);
            report = recovery.report;
        }
    }

    let fields = report
        .fields
        .iter()
        .map(|scanned| FieldSummary {
            offset: scanned.offset,
            code: scanned.field.code(),
            marker: scanned.field.marker(),
            payload_len: scanned.field.payload().len(),
        })
        .collect();

    Analysis {
        size: data.len(),
        is_afp: report.is_afp(),
        total_fields: report.total_fields,
        recognized_fields: report.recognized_fields,
        page_fields: report.page_fields,
        total_warnings: report.total_warnings,
        termination: report.termination,
        recovered,
        warnings: report.warnings,
        fields,
    }
}

/// Reads and surveys a file
pub fn analyze_file(path: impl AsRef<Path>) -> Result<Analysis> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Ok(analyze(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::StructuredField;
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
    fn test_analyze_clean_document() {
        let analysis = analyze(encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b"doc"),
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode([0xD3, 0xEE, 0x9B]), b"text"),
            (TypeCode::END_PAGE, b""),
            (TypeCode::END_DOCUMENT, b""),
        ]));

        assert!(analysis.is_afp);
        assert_eq!(analysis.size, 32);
        assert_eq!(analysis.total_fields, 5);
        assert_eq!(analysis.recognized_fields, 4);
        assert_eq!(analysis.page_fields, 1);
        assert_eq!(analysis.total_warnings, 0);
        assert_eq!(analysis.termination, Termination::EndOfBuffer);
        assert!(analysis.recovered.is_none());

        let summary = &analysis.fields[2];
        assert_eq!(summary.offset, 13);
        assert_eq!(summary.code, TypeCode([0xD3, 0xEE, 0x9B]));
        assert_eq!(summary.marker, None);
        assert_eq!(summary.payload_len, 4);
    }

    #[test]
    fn test_analyze_non_afp_stream() {
        let analysis = analyze(vec![0u8; 64]);
        assert!(!analysis.is_afp);
        assert_eq!(analysis.total_fields, 0);
        assert_eq!(analysis.total_warnings, 11);
        assert_eq!(analysis.warnings.len(), 11);
        assert_eq!(
            analysis.warnings[0],
            ScanWarning::MalformedLength { offset: 0, length: 0 }
        );
        assert_eq!(analysis.termination, Termination::ErrorBudget);
        assert!(analysis.recovered.is_none());
    }

    #[test]
    fn test_analyze_caps_field_sample() {
        let mut fields = vec![(TypeCode::BEGIN_DOCUMENT, &b""[..])];
        for _ in 0..150 {
            fields.push((TypeCode::BEGIN_PAGE, &b""[..]));
        }

        let analysis = analyze(encode_all(&fields));
        assert!(analysis.is_afp);
        assert_eq!(analysis.total_fields, 151);
        assert_eq!(analysis.page_fields, 150);
        assert_eq!(analysis.fields.len(), DEFAULT_MAX_RETAINED);
    }

    #[test]
    fn test_analyze_recovers_prefixed_stream() {
        let mut data = vec![0u8; 40];
        data.extend_from_slice(&encode_all(&[
            (TypeCode::BEGIN_DOCUMENT, b""),
            (TypeCode::BEGIN_PAGE, b""),
            (TypeCode::END_PAGE, b""),
            (TypeCode::END_DOCUMENT, b""),
        ]));

        let analysis = analyze(data);
        assert!(analysis.is_afp);
        assert_eq!(analysis.recognized_fields, 3);
        assert_eq!(analysis.total_warnings, 3);
        assert_eq!(analysis.warnings.len(), 3);
        let recovered = analysis.recovered.unwrap();
        assert_eq!(recovered.offset, 42);
        assert_eq!(recovered.signature, "BDT");
    }

    #[test]
    fn test_analyze_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.afp");
        std::fs::write(&path, encode_all(&[(TypeCode::BEGIN_DOCUMENT, b"")])).unwrap();

        let analysis = analyze_file(&path).unwrap();
        assert!(analysis.is_afp);
        assert_eq!(analysis.total_fields, 1);

        let err = analyze_file(dir.path().join("absent.afp")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
