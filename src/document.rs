//! Opaque document payloads carried through the feed pipeline.
//!
//! Physical document encoding is a collaborator concern; this crate only
//! routes payload bytes alongside their identifiers.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

/// Stable document identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as handed over by the persistence provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier.
    pub id: DocumentId,
    /// Encoded document body, opaque to this crate.
    pub payload: Vec<u8>,
}

/// A partial update addressed to an existing document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpdate {
    /// Identifier of the document to update.
    pub id: DocumentId,
    /// Encoded update body, opaque to this crate.
    pub payload: Vec<u8>,
}

/// Microsecond wall-clock timestamp carried by feed operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        Self(micros)
    }

    /// This timestamp moved back by `micros`, saturating at zero.
    pub fn saturating_sub_micros(self, micros: u64) -> Self {
        Self(self.0.saturating_sub(micros))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
