//! # Protocol Error Types

use thiserror::Error;

/// Which message an inbound payload was classified as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Authoritative snapshot.
    Baseline,
    /// Per-frame roster and input batch.
    InputBatch,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => f.write_str("baseline"),
            Self::InputBatch => f.write_str("input batch"),
        }
    }
}

/// An inbound message was malformed or incomplete.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Valid JSON, but not an object.
    #[error("expected a JSON object, got {found}")]
    NotAnObject {
        /// JSON type that was received.
        found: &'static str,
    },

    /// Classified, but a field is missing or has the wrong type.
    #[error("malformed {kind}: {source}")]
    Invalid {
        /// What the payload was classified as.
        kind: MessageKind,
        /// Field-level detail.
        #[source]
        source: serde_json::Error,
    },
}

/// An outbound message could not be serialized.
#[derive(Error, Debug)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Result type for inbound parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for outbound encoding.
pub type EncodeResult<T> = Result<T, EncodeError>;
