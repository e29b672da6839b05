use pollcast_core::{RecordKind, Versioned};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Magic byte identifying pollcast records.
pub const MAGIC_BYTE: u8 = 0xB7;

/// Size of the envelope header in bytes.
pub const ENVELOPE_HEADER_SIZE: usize = 3;

/// A version envelope wrapping a postcard-encoded record.
///
/// Binary format (3 bytes overhead):
/// ```text
/// [MAGIC: 0xB7][VERSION: u8][RECORD_KIND: u8][PAYLOAD: N bytes]
/// ```
///
/// # Example
///
/// ```
/// use pollcast_core::Poll;
/// use pollcast_store::RecordEnvelope;
///
/// let poll = Poll::new("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
/// let bytes = RecordEnvelope::encode(&poll).unwrap();
///
/// let back: Poll = RecordEnvelope::decode(&bytes).unwrap();
/// assert_eq!(back, poll);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEnvelope {
    /// Schema version of the payload.
    pub version: u8,
    /// Kind of record contained.
    pub kind: RecordKind,
    /// Postcard-encoded record.
    pub payload: Vec<u8>,
}

/// Error reading or writing an envelope.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvelopeError {
    /// Data is too short to contain a valid envelope.
    #[error("data too short for record envelope")]
    TooShort,
    /// Missing or incorrect magic byte.
    #[error("invalid magic byte: 0x{0:02X}, expected 0xB7")]
    InvalidMagic(u8),
    /// Unknown record kind byte.
    #[error("unknown record kind: {0}")]
    UnknownKind(u8),
    /// The record is of a different kind than requested.
    #[error("expected a {expected:?} record, found {found:?}")]
    KindMismatch {
        /// Kind the caller asked for.
        expected: RecordKind,
        /// Kind found in the header.
        found: RecordKind,
    },
    /// The record was written by a newer schema than this build understands.
    #[error("record schema v{found} is newer than supported v{supported}")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u8,
        /// Highest version this build reads.
        supported: u8,
    },
    /// Postcard encoding failed.
    #[error("serialization error: {0}")]
    Serialize(String),
    /// Postcard decoding failed.
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl RecordEnvelope {
    /// Create a new envelope.
    pub fn new(version: u8, kind: RecordKind, payload: Vec<u8>) -> Self {
        Self {
            version,
            kind,
            payload,
        }
    }

    /// Serialize the envelope to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_SIZE + self.payload.len());
        bytes.push(MAGIC_BYTE);
        bytes.push(self.version);
        bytes.push(self.kind as u8);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse an envelope from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, EnvelopeError> {
        if data.len() < ENVELOPE_HEADER_SIZE {
            return Err(EnvelopeError::TooShort);
        }

        if data[0] != MAGIC_BYTE {
            return Err(EnvelopeError::InvalidMagic(data[0]));
        }

        let version = data[1];
        let kind = RecordKind::from_byte(data[2]).ok_or(EnvelopeError::UnknownKind(data[2]))?;
        let payload = data[ENVELOPE_HEADER_SIZE..].to_vec();

        Ok(Self {
            version,
            kind,
            payload,
        })
    }

    /// Encode a record at its current schema version.
    pub fn encode<T: Serialize + Versioned>(value: &T) -> Result<Vec<u8>, EnvelopeError> {
        let payload =
            postcard::to_allocvec(value).map_err(|e| EnvelopeError::Serialize(e.to_string()))?;
        Ok(Self::new(T::CURRENT_VERSION, T::RECORD_KIND, payload).to_bytes())
    }

    /// Decode a record, refusing other kinds and newer schema versions.
    pub fn decode<T: DeserializeOwned + Versioned>(data: &[u8]) -> Result<T, EnvelopeError> {
        let envelope = Self::from_bytes(data)?;

        if envelope.kind != T::RECORD_KIND {
            return Err(EnvelopeError::KindMismatch {
                expected: T::RECORD_KIND,
                found: envelope.kind,
            });
        }

        if envelope.version > T::CURRENT_VERSION {
            return Err(EnvelopeError::UnsupportedVersion {
                found: envelope.version,
                supported: T::CURRENT_VERSION,
            });
        }

        postcard::from_bytes(&envelope.payload).map_err(|e| EnvelopeError::Deserialize(e.to_string()))
    }
}
