//! Structured-field scanning for AFP/MO:DCA data streams.
//!
//! This module walks a byte buffer and decodes consecutive structured
//! fields, tolerating damage instead of failing outright.
//!
//! ## Algorithm Overview
//!
//! 1. Decode a structured field at the current offset
//! 2. On success, advance by the field's declared length
//! 3. On a malformed length, record a warning and resync one byte forward
//! 4. On a truncated record, record a warning and stop
//!
//! Resynchronization bounds the work at one decode attempt per input byte,
//! so a damaged buffer cannot make the scanner loop forever. A warning
//! budget ([`ScannerConfig::max_errors`]) additionally aborts scans of
//! buffers that are clearly not field data.
//!
//! When a stream does not begin at a field boundary (spool headers,
//! partial copies), [`recover`] searches for known AFP signatures and
//! evaluates each candidate offset with a permissive scan, keeping the
//! offset that decodes the most recognized fields.

mod field;

use crate::error::Error;
use bytes::Bytes;
use std::fmt;
use tracing::{debug, trace};

pub use field::{Marker, StructuredField, TypeCode, MAX_FIELD_LEN, MAX_PAYLOAD_LEN, MIN_FIELD_LEN};

/// Warnings tolerated by the default configuration before a scan aborts
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// Fields and warnings retained by the permissive configuration
pub const DEFAULT_MAX_RETAINED: usize = 100;

/// Candidate offsets evaluated per signature during recovery
const MAX_CANDIDATES_PER_SIGNATURE: usize = 5;

/// Byte signatures that mark plausible stream starts.
///
/// `5A 00` is a carriage-control prefix byte followed by the high byte of
/// a short length; the other two are the BDT and BPG type codes.
const SIGNATURES: [(&[u8], &str); 3] = [
    (&[0x5A, 0x00], "MODCA"),
    (&[0xD3, 0xA8, 0xA8], "BDT"),
    (&[0xD3, 0xA8, 0xAF], "BPG"),
];

/// A decoded field together with its position in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedField {
    /// Byte offset of the field's length prefix
    pub offset: usize,
    /// The decoded field
    pub field: StructuredField,
}

/// A recoverable problem encountered while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWarning {
    /// The length prefix was outside `5..=32767`
    MalformedLength {
        /// Offset of the bad length prefix
        offset: usize,
        /// The value the prefix carried
        length: usize,
    },
    /// A declared length ran past the end of the buffer
    TruncatedField {
        /// Offset of the truncated field
        offset: usize,
        /// Bytes the field declared
        needed: usize,
        /// Bytes actually remaining
        available: usize,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLength { offset, length } => {
                write!(f, "invalid field length {} at offset {}", length, offset)
            }
            Self::TruncatedField {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated record at offset {}: need {} bytes, {} remain",
                offset, needed, available
            ),
        }
    }
}

/// Why a scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Fewer than [`MIN_FIELD_LEN`] bytes remained
    EndOfBuffer,
    /// A declared length ran past the end of the buffer
    Truncated,
    /// The warning count exceeded [`ScannerConfig::max_errors`]
    ErrorBudget,
}

/// Outcome of a single scan pass.
///
/// Retained fields and warnings are bounded by
/// [`ScannerConfig::max_retained`]; the `total_*` counters always cover
/// the whole pass.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Offset the scan started at
    pub start_offset: usize,
    /// Decoded fields, in input order
    pub fields: Vec<ScannedField>,
    /// Every field decoded, including ones not retained
    pub total_fields: usize,
    /// Fields whose type code appears in the marker table
    pub recognized_fields: usize,
    /// Fields carrying the BPG (Begin Page) code
    pub page_fields: usize,
    /// Warnings raised, in input order
    pub warnings: Vec<ScanWarning>,
    /// Every warning raised, including ones not retained
    pub total_warnings: usize,
    /// Why the scan stopped
    pub termination: Termination,
}

impl ScanReport {
    /// Returns true when at least one recognized marker was decoded
    pub fn is_afp(&self) -> bool {
        self.recognized_fields > 0
    }
}

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Warnings tolerated before the scan aborts (0 = unlimited)
    pub max_errors: usize,
    /// Fields and warnings retained in the report (0 = retain all)
    pub max_retained: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            max_retained: 0,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Survey configuration: tolerates any amount of damage but retains
    /// only the first [`DEFAULT_MAX_RETAINED`] fields and warnings
    pub fn permissive() -> Self {
        Self {
            max_errors: 0,
            max_retained: DEFAULT_MAX_RETAINED,
        }
    }

    /// Re-scan configuration: never aborts and retains everything
    pub fn exhaustive() -> Self {
        Self {
            max_errors: 0,
            max_retained: 0,
        }
    }

    /// Sets the warning budget (0 = unlimited)
    pub fn max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    /// Sets the retention bound for fields and warnings (0 = retain all)
    pub fn max_retained(mut self, max: usize) -> Self {
        self.max_retained = max;
        self
    }
}

/// Sequential structured-field scanner
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
        }
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Scans `data` from the start of the buffer
    pub fn scan(&self, data: &Bytes) -> ScanReport {
        self.scan_at(data, 0)
    }

    /// Scans `data` from `start`, decoding fields until the buffer ends,
    /// a field is truncated, or the warning budget runs out
    pub fn scan_at(&self, data: &Bytes, start: usize) -> ScanReport {
        let mut report = ScanReport {
            start_offset: start,
            fields: Vec::new(),
            total_fields: 0,
            recognized_fields: 0,
            page_fields: 0,
            warnings: Vec::new(),
            total_warnings: 0,
            termination: Termination::EndOfBuffer,
        };

        debug!("Scanning {} bytes from offset {}", data.len(), start);

        let mut offset = start;
        loop {
            if data.len().saturating_sub(offset) < MIN_FIELD_LEN {
                report.termination = Termination::EndOfBuffer;
                break;
            }

            match StructuredField::decode(data, offset) {
                Ok((field, consumed)) => {
                    report.total_fields += 1;
                    if field.code().is_recognized() {
                        report.recognized_fields += 1;
                    }
                    if field.code() == TypeCode::BEGIN_PAGE {
                        report.page_fields += 1;
                    }
                    push_bounded(
                        &mut report.fields,
                        ScannedField { offset, field },
                        self.config.max_retained,
                    );
                    offset += consumed;
                }
                Err(err) => {
                    let resync = err.is_recoverable();
                    report.total_warnings += 1;
                    match err {
                        Error::MalformedLength { offset: at, length } => {
                            trace!("Invalid length {} at offset {}, resyncing", length, at);
                            push_bounded(
                                &mut report.warnings,
                                ScanWarning::MalformedLength { offset: at, length },
                                self.config.max_retained,
                            );
                        }
                        Error::TruncatedRecord {
                            offset: at,
                            needed,
                            available,
                        } => {
                            trace!(
                                "Truncated record at offset {}: need {}, have {}",
                                at,
                                needed,
                                available
                            );
                            push_bounded(
                                &mut report.warnings,
                                ScanWarning::TruncatedField {
                                    offset: at,
                                    needed,
                                    available,
                                },
                                self.config.max_retained,
                            );
                        }
                        // decode emits only the two variants above
                        _ => {}
                    }

                    if !resync {
                        report.termination = Termination::Truncated;
                        break;
                    }
                    if self.config.max_errors > 0
                        && report.total_warnings > self.config.max_errors
                    {
                        report.termination = Termination::ErrorBudget;
                        break;
                    }
                    offset += 1;
                }
            }
        }

        debug!(
            "Scan complete: {} fields ({} recognized), {} warnings, {:?}",
            report.total_fields, report.recognized_fields, report.total_warnings, report.termination
        );
        report
    }
}

/// A stream start located by signature search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredStart {
    /// Offset the winning signature was found at
    pub offset: usize,
    /// Label of the winning signature
    pub signature: &'static str,
}

/// Result of a successful recovery pass
#[derive(Debug, Clone)]
pub struct Recovery {
    /// The chosen start offset
    pub start: RecoveredStart,
    /// Permissive scan report for the chosen offset
    pub report: ScanReport,
}

/// Searches `data` for known AFP signatures and picks the start offset
/// whose permissive scan decodes the most recognized fields.
///
/// The first [`MAX_CANDIDATES_PER_SIGNATURE`] occurrences of each
/// signature are evaluated. Candidates that decode zero recognized fields
/// never win; ties keep the earliest viable candidate. Returns `None`
/// when no candidate is viable.
pub fn recover(data: &Bytes) -> Option<Recovery> {
    let scanner = Scanner::with_config(ScannerConfig::permissive());
    let mut best: Option<Recovery> = None;

    debug!("Attempting signature recovery on {} bytes", data.len());

    for (signature, label) in SIGNATURES {
        for offset in find_all(data, signature, MAX_CANDIDATES_PER_SIGNATURE) {
            trace!("Evaluating {} candidate at offset {}", label, offset);
            let report = scanner.scan_at(data, offset);
            if report.recognized_fields == 0 {
                continue;
            }
            let better = match &best {
                Some(current) => report.recognized_fields > current.report.recognized_fields,
                None => true,
            };
            if better {
                best = Some(Recovery {
                    start: RecoveredStart {
                        offset,
                        signature: label,
                    },
                    report,
                });
            }
        }
    }

    match &best {
        Some(recovery) => debug!(
            "Recovery selected offset {} ({}): {} recognized fields",
            recovery.start.offset, recovery.start.signature, recovery.report.recognized_fields
        ),
        None => debug!("Recovery found no viable start offset"),
    }
    best
}

/// Find a subsequence within a byte slice
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find up to `limit` occurrences of `needle`, overlapping ones included
fn find_all(haystack: &[u8], needle: &[u8], limit: usize) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while found.len() < limit {
        let Some(relative) = find_subsequence(&haystack[from..], needle) else {
            break;
        };
        let absolute = from + relative;
        found.push(absolute);
        from = absolute + 1;
    }
    found
}

fn push_bounded<T>(items: &mut Vec<T>, item: T, cap: usize) {
    if cap == 0 || items.len() < cap {
        items.push(item);
    }
}
