//! Error types for ordering, reconciliation, and scene operations.

use thiserror::Error;

use tessera_types::ElementId;

use crate::scene::SubscriptionId;

/// Errors that can occur in the ordering and reconciliation core.
#[derive(Error, Debug)]
pub enum CrdtError {
    /// No key exists strictly between the requested bounds.
    ///
    /// Raised for `lower >= upper`, or when the integer part of the key space
    /// is exhausted at either end.
    #[error("no position key between {lower:?} and {upper:?}")]
    OrderingExhausted {
        lower: Option<String>,
        upper: Option<String>,
    },

    /// A position key does not follow the key format.
    #[error("invalid position key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Re-keying a contiguous run failed. The run keeps its previous keys.
    #[error("failed to repair {len} position keys starting at {start}: {source}")]
    RepairFailure {
        start: usize,
        len: usize,
        #[source]
        source: Box<CrdtError>,
    },

    /// The ordered-list invariant does not hold.
    #[error("position key invariant violated at {position}: {reason}")]
    InvariantViolation { position: usize, reason: String },

    /// Element not found in scene.
    #[error("element not found: {0:?}")]
    ElementNotFound(ElementId),

    /// An element with this id is already in the scene.
    #[error("duplicate element: {0:?}")]
    DuplicateElement(ElementId),

    /// Insertion point past the end of the scene.
    #[error("insert position {index} out of bounds for scene with {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Unsubscribing a callback that is not registered.
    #[error("unknown subscription: {0:?}")]
    UnknownSubscription(SubscriptionId),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl CrdtError {
    pub(crate) fn exhausted(lower: Option<&str>, upper: Option<&str>) -> Self {
        CrdtError::OrderingExhausted {
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
        }
    }

    pub(crate) fn invalid_key(key: &str, reason: &'static str) -> Self {
        CrdtError::InvalidKey {
            key: key.to_string(),
            reason,
        }
    }
}

impl From<serde_json::Error> for CrdtError {
    fn from(e: serde_json::Error) -> Self {
        CrdtError::Serialization(e.to_string())
    }
}

impl From<ron::error::SpannedError> for CrdtError {
    fn from(e: ron::error::SpannedError) -> Self {
        CrdtError::Config(e.to_string())
    }
}
