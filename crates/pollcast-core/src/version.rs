//! Schema versioning for persisted records.
//!
//! Stored records carry a small header naming their kind and schema version
//! so a store can refuse data written by a newer binary instead of
//! misreading it.

use crate::Poll;

/// Identifies the kind of record inside a stored envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    /// A [`Poll`] record.
    Poll = 1,
}

impl RecordKind {
    /// Convert from a raw byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Poll),
            _ => None,
        }
    }
}

/// Types with a versioned persisted representation.
pub trait Versioned: Sized {
    /// Current schema version written by this build.
    const CURRENT_VERSION: u8;

    /// Record kind written into the envelope header.
    const RECORD_KIND: RecordKind;
}

impl Versioned for Poll {
    const CURRENT_VERSION: u8 = 1;
    const RECORD_KIND: RecordKind = RecordKind::Poll;
}
