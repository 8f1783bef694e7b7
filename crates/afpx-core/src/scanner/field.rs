//! Low-level structured-field codec.
//!
//! This module implements the MO:DCA structured-field framing needed to
//! delimit and rebuild records in an AFP data stream.
//!
//! ## Wire Format Overview
//!
//! Each structured field is encoded as:
//! - A 2-byte big-endian length covering the whole record, itself included
//! - A 3-byte type code identifying the record's role
//! - The payload bytes (opaque to this crate)
//!
//! A record therefore occupies exactly `length` bytes on the wire, with a
//! 5-byte minimum (empty payload) and a 32767-byte maximum. Payloads are
//! never interpreted; type codes are matched against a small table of
//! document/page/resource markers to drive structural decisions.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fmt;

/// Minimum wire size of a structured field (length prefix + type code)
pub const MIN_FIELD_LEN: usize = 5;

/// Maximum wire size of a structured field
pub const MAX_FIELD_LEN: usize = 32767;

/// Maximum payload a single structured field can carry
pub const MAX_PAYLOAD_LEN: usize = MAX_FIELD_LEN - MIN_FIELD_LEN;

/// 3-byte type code identifying a structured field's role
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode(pub [u8; 3]);

impl TypeCode {
    /// BDT: starts a document
    pub const BEGIN_DOCUMENT: TypeCode = TypeCode([0xD3, 0xA8, 0xA8]);
    /// EDT: ends a document
    pub const END_DOCUMENT: TypeCode = TypeCode([0xD3, 0xA9, 0xA8]);
    /// BPG: starts a page
    pub const BEGIN_PAGE: TypeCode = TypeCode([0xD3, 0xA8, 0xAF]);
    /// EPG: ends a page
    pub const END_PAGE: TypeCode = TypeCode([0xD3, 0xA9, 0xAF]);
    /// BRG: starts a resource group
    pub const BEGIN_RESOURCE_GROUP: TypeCode = TypeCode([0xD3, 0xA8, 0xC6]);
    /// ERG: ends a resource group
    pub const END_RESOURCE_GROUP: TypeCode = TypeCode([0xD3, 0xA9, 0xC6]);
    /// BOG: starts an object
    pub const BEGIN_OBJECT: TypeCode = TypeCode([0xD3, 0xA8, 0xC9]);
    /// EOG: ends an object
    pub const END_OBJECT: TypeCode = TypeCode([0xD3, 0xA9, 0xC9]);
    /// BMM: starts a mixed-mode section
    pub const BEGIN_MIXED_MODE: TypeCode = TypeCode([0xD3, 0xA8, 0xA7]);
    /// EMM: ends a mixed-mode section
    pub const END_MIXED_MODE: TypeCode = TypeCode([0xD3, 0xA9, 0xA7]);
    /// BPT: starts a presentation-text block
    pub const BEGIN_PRESENTATION_TEXT: TypeCode = TypeCode([0xD3, 0xA8, 0xFB]);
    /// EPT: ends a presentation-text block
    pub const END_PRESENTATION_TEXT: TypeCode = TypeCode([0xD3, 0xA9, 0xFB]);
    /// BDI: starts a document index
    pub const BEGIN_DOCUMENT_INDEX: TypeCode = TypeCode([0xD3, 0xA8, 0xDF]);
    /// EDI: ends a document index
    pub const END_DOCUMENT_INDEX: TypeCode = TypeCode([0xD3, 0xA9, 0xDF]);

    /// Looks the code up in the recognized-marker table
    pub fn marker(self) -> Option<Marker> {
        Marker::from_code(self)
    }

    /// Returns true if the code appears in the recognized-marker table
    pub fn is_recognized(self) -> bool {
        self.marker().is_some()
    }
}

impl From<[u8; 3]> for TypeCode {
    fn from(bytes: [u8; 3]) -> Self {
        TypeCode(bytes)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Debug for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeCode({})", self)
    }
}

/// Recognized structured-field markers.
///
/// Only the document, page, and resource-group markers participate in
/// structural decisions (indexing, extraction, validation); the rest are
/// informational and exist for human-readable labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// BDT
    BeginDocument,
    /// EDT
    EndDocument,
    /// BPG
    BeginPage,
    /// EPG
    EndPage,
    /// BRG
    BeginResourceGroup,
    /// ERG
    EndResourceGroup,
    /// BOG
    BeginObject,
    /// EOG
    EndObject,
    /// BMM
    BeginMixedMode,
    /// EMM
    EndMixedMode,
    /// BPT
    BeginPresentationText,
    /// EPT
    EndPresentationText,
    /// BDI
    BeginDocumentIndex,
    /// EDI
    EndDocumentIndex,
}

impl Marker {
    /// Looks up a type code in the marker table
    pub fn from_code(code: TypeCode) -> Option<Self> {
        match code.0 {
            [0xD3, 0xA8, 0xA8] => Some(Self::BeginDocument),
            [0xD3, 0xA9, 0xA8] => Some(Self::EndDocument),
            [0xD3, 0xA8, 0xAF] => Some(Self::BeginPage),
            [0xD3, 0xA9, 0xAF] => Some(Self::EndPage),
            [0xD3, 0xA8, 0xC6] => Some(Self::BeginResourceGroup),
            [0xD3, 0xA9, 0xC6] => Some(Self::EndResourceGroup),
            [0xD3, 0xA8, 0xC9] => Some(Self::BeginObject),
            [0xD3, 0xA9, 0xC9] => Some(Self::EndObject),
            [0xD3, 0xA8, 0xA7] => Some(Self::BeginMixedMode),
            [0xD3, 0xA9, 0xA7] => Some(Self::EndMixedMode),
            [0xD3, 0xA8, 0xFB] => Some(Self::BeginPresentationText),
            [0xD3, 0xA9, 0xFB] => Some(Self::EndPresentationText),
            [0xD3, 0xA8, 0xDF] => Some(Self::BeginDocumentIndex),
            [0xD3, 0xA9, 0xDF] => Some(Self::EndDocumentIndex),
            _ => None,
        }
    }

    /// Returns the wire type code for this marker
    pub fn code(self) -> TypeCode {
        match self {
            Self::BeginDocument => TypeCode::BEGIN_DOCUMENT,
            Self::EndDocument => TypeCode::END_DOCUMENT,
            Self::BeginPage => TypeCode::BEGIN_PAGE,
            Self::EndPage => TypeCode::END_PAGE,
            Self::BeginResourceGroup => TypeCode::BEGIN_RESOURCE_GROUP,
            Self::EndResourceGroup => TypeCode::END_RESOURCE_GROUP,
            Self::BeginObject => TypeCode::BEGIN_OBJECT,
            Self::EndObject => TypeCode::END_OBJECT,
            Self::BeginMixedMode => TypeCode::BEGIN_MIXED_MODE,
            Self::EndMixedMode => TypeCode::END_MIXED_MODE,
            Self::BeginPresentationText => TypeCode::BEGIN_PRESENTATION_TEXT,
            Self::EndPresentationText => TypeCode::END_PRESENTATION_TEXT,
            Self::BeginDocumentIndex => TypeCode::BEGIN_DOCUMENT_INDEX,
            Self::EndDocumentIndex => TypeCode::END_DOCUMENT_INDEX,
        }
    }

    /// Returns the conventional three-letter abbreviation
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::BeginDocument => "BDT",
            Self::EndDocument => "EDT",
            Self::BeginPage => "BPG",
            Self::EndPage => "EPG",
            Self::BeginResourceGroup => "BRG",
            Self::EndResourceGroup => "ERG",
            Self::BeginObject => "BOG",
            Self::EndObject => "EOG",
            Self::BeginMixedMode => "BMM",
            Self::EndMixedMode => "EMM",
            Self::BeginPresentationText => "BPT",
            Self::EndPresentationText => "EPT",
            Self::BeginDocumentIndex => "BDI",
            Self::EndDocumentIndex => "EDI",
        }
    }

    /// Returns the long human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::BeginDocument => "Begin Document",
            Self::EndDocument => "End Document",
            Self::BeginPage => "Begin Page",
            Self::EndPage => "End Page",
            Self::BeginResourceGroup => "Begin Resource Group",
            Self::EndResourceGroup => "End Resource Group",
            Self::BeginObject => "Begin Object",
            Self::EndObject => "End Object",
            Self::BeginMixedMode => "Begin Mixed Mode",
            Self::EndMixedMode => "End Mixed Mode",
            Self::BeginPresentationText => "Begin Presentation Text",
            Self::EndPresentationText => "End Presentation Text",
            Self::BeginDocumentIndex => "Begin Document Index",
            Self::EndDocumentIndex => "End Document Index",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.abbrev(), self.name())
    }
}

/// A single decoded structured field.
///
/// The payload is a view into the buffer the field was decoded from
/// (`Bytes` keeps the backing allocation alive), so decoding a stream does
/// not copy payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredField {
    code: TypeCode,
    payload: Bytes,
}

impl StructuredField {
    /// Creates a field from a type code and payload.
    ///
    /// Fails with [`Error::PayloadTooLarge`] when the payload cannot be
    /// framed with a 2-byte length prefix.
    pub fn new(code: TypeCode, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::payload_too_large(payload.len()));
        }
        Ok(Self { code, payload })
    }

    /// Decodes one structured field from `data` at `offset`.
    ///
    /// Returns the field and the number of bytes it occupies on the wire.
    /// Fails with [`Error::MalformedLength`] when the length prefix is
    /// outside `5..=32767`, and with [`Error::TruncatedRecord`] when the
    /// declared length (or the 5-byte header itself) runs past the end of
    /// the buffer.
    pub fn decode(data: &Bytes, offset: usize) -> Result<(Self, usize)> {
        let available = data.len().saturating_sub(offset);
        if available < MIN_FIELD_LEN {
            return Err(Error::truncated(offset, MIN_FIELD_LEN, available));
        }

        let length = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        if !(MIN_FIELD_LEN..=MAX_FIELD_LEN).contains(&length) {
            return Err(Error::malformed_length(offset, length));
        }
        if available < length {
            return Err(Error::truncated(offset, length, available));
        }

        let code = TypeCode([data[offset + 2], data[offset + 3], data[offset + 4]]);
        let payload = data.slice(offset + MIN_FIELD_LEN..offset + length);
        Ok((Self { code, payload }, length))
    }

    /// Returns the field's type code
    pub fn code(&self) -> TypeCode {
        self.code
    }

    /// Returns the opaque payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Looks the type code up in the recognized-marker table
    pub fn marker(&self) -> Option<Marker> {
        self.code.marker()
    }

    /// Returns the number of bytes the field occupies on the wire
    pub fn encoded_len(&self) -> usize {
        MIN_FIELD_LEN + self.payload.len()
    }

    /// Appends the field's wire encoding to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        debug_assert!(self.encoded_len() <= MAX_FIELD_LEN);
        out.extend_from_slice(&(self.encoded_len() as u16).to_be_bytes());
        out.extend_from_slice(&self.code.0);
        out.extend_from_slice(&self.payload);
    }

    /// Returns the field's wire encoding as a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_MARKERS: [Marker; 14] = [
        Marker::BeginDocument,
        Marker::EndDocument,
        Marker::BeginPage,
        Marker::EndPage,
        Marker::BeginResourceGroup,
        Marker::EndResourceGroup,
        Marker::BeginObject,
        Marker::EndObject,
        Marker::BeginMixedMode,
        Marker::EndMixedMode,
        Marker::BeginPresentationText,
        Marker::EndPresentationText,
        Marker::BeginDocumentIndex,
        Marker::EndDocumentIndex,
    ];

    #[test]
    fn test_round_trip() {
        let field = StructuredField::new(TypeCode::BEGIN_PAGE, b"page one".to_vec()).unwrap();
        let encoded = field.to_bytes();
        assert_eq!(encoded.len(), field.encoded_len());

        let data = Bytes::from(encoded);
        let (decoded, consumed) = StructuredField::decode(&data, 0).unwrap();
        assert_eq!(decoded, field);
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_round_trip_empty_payload() {
        let field = StructuredField::new(TypeCode::END_DOCUMENT, Vec::new()).unwrap();
        assert_eq!(field.encoded_len(), MIN_FIELD_LEN);

        let data = Bytes::from(field.to_bytes());
        let (decoded, consumed) = StructuredField::decode(&data, 0).unwrap();
        assert_eq!(decoded, field);
        assert_eq!(consumed, MIN_FIELD_LEN);
    }

    #[test]
    fn test_round_trip_max_payload() {
        let field =
            StructuredField::new(TypeCode::BEGIN_OBJECT, vec![0xEE; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(field.encoded_len(), MAX_FIELD_LEN);

        let data = Bytes::from(field.to_bytes());
        let (decoded, consumed) = StructuredField::decode(&data, 0).unwrap();
        assert_eq!(decoded, field);
        assert_eq!(consumed, MAX_FIELD_LEN);
    }

    #[test]
    fn test_new_rejects_oversized_payload() {
        let err = StructuredField::new(TypeCode::BEGIN_OBJECT, vec![0; MAX_PAYLOAD_LEN + 1])
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len, .. } if len == MAX_PAYLOAD_LEN + 1));
    }

    #[test]
    fn test_decode_at_offset() {
        let mut buffer = vec![0xAA, 0xBB, 0xCC];
        let field = StructuredField::new(TypeCode::BEGIN_DOCUMENT, b"x".to_vec()).unwrap();
        field.encode_into(&mut buffer);

        let data = Bytes::from(buffer);
        let (decoded, consumed) = StructuredField::decode(&data, 3).unwrap();
        assert_eq!(decoded.code(), TypeCode::BEGIN_DOCUMENT);
        assert_eq!(decoded.payload(), b"x");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_decode_malformed_length() {
        // Length 4 is below the 5-byte minimum
        let data = Bytes::from_static(&[0x00, 0x04, 0xD3, 0xA8, 0xA8]);
        let err = StructuredField::decode(&data, 0).unwrap_err();
        assert!(matches!(err, Error::MalformedLength { offset: 0, length: 4 }));

        // Length 0x8000 exceeds the 32767 maximum
        let data = Bytes::from_static(&[0x80, 0x00, 0xD3, 0xA8, 0xA8]);
        let err = StructuredField::decode(&data, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLength {
                offset: 0,
                length: 0x8000
            }
        ));
    }

    #[test]
    fn test_decode_truncated() {
        // Declares 16 bytes but only 8 are present
        let data = Bytes::from_static(&[0x00, 0x10, 0xD3, 0xA8, 0xA8, 0x01, 0x02, 0x03]);
        let err = StructuredField::decode(&data, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedRecord {
                offset: 0,
                needed: 16,
                available: 8
            }
        ));
    }

    #[test]
    fn test_decode_short_buffer() {
        let data = Bytes::from_static(&[0x00, 0x08, 0xD3]);
        let err = StructuredField::decode(&data, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedRecord {
                offset: 0,
                needed: 5,
                available: 3
            }
        ));
    }

    #[test]
    fn test_type_code_display() {
        assert_eq!(TypeCode::BEGIN_DOCUMENT.to_string(), "d3a8a8");
        assert_eq!(TypeCode([0x01, 0x02, 0xFF]).to_string(), "0102ff");
    }

    #[test]
    fn test_marker_lookup() {
        assert_eq!(
            TypeCode::BEGIN_PAGE.marker(),
            Some(Marker::BeginPage)
        );
        assert_eq!(TypeCode([0x00, 0x00, 0x00]).marker(), None);
        assert!(!TypeCode([0x12, 0x34, 0x56]).is_recognized());
    }

    #[test]
    fn test_marker_table_involution() {
        for marker in ALL_MARKERS {
            assert_eq!(Marker::from_code(marker.code()), Some(marker));
        }
    }

    #[test]
    fn test_marker_display() {
        assert_eq!(Marker::BeginDocument.to_string(), "BDT (Begin Document)");
        assert_eq!(
            Marker::EndPresentationText.to_string(),
            "EPT (End Presentation Text)"
        );
    }
}
