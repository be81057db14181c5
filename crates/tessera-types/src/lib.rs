//! Element identity and version types for Tessera.
//!
//! This crate is the leaf of the workspace: typed ids, the element record
//! with its version model, the position-key newtype, and the local
//! transient-edit markers. It has **no internal tessera dependencies**.
//!
//! # Entity Overview
//!
//! ```text
//! Scene (SceneId) ← one store instance on this peer
//!     └── holds Elements in position-key order
//!
//! Element (ElementId) ← whole-object LWW record
//!     └── version + version_nonce decide reconciliation winners
//!     └── index (FractionalIndex) decides total order, id breaks ties
//!     └── is_deleted tombstones, never physically removed
//! ```
//!
//! # Key Types
//!
//! |-----------------------|------------------------------------------------|
//! | Type                  | Purpose                                        |
//! |-----------------------|------------------------------------------------|
//! | [`Element`]           | Versioned scene element                        |
//! | [`ElementProps`]      | Opaque visual attributes                       |
//! | [`ElementId`]         | Globally unique element id (string)            |
//! | [`SceneId`]           | Local scene store instance                     |
//! | [`FractionalIndex`]   | Position key                                   |
//! | [`TransientState`]    | Elements mid-gesture on this peer              |
//! |-----------------------|------------------------------------------------|

pub mod element;
pub mod ids;
pub mod index;
pub mod transient;

pub use element::{Element, ElementBuilder, ElementKind, ElementProps, random_nonce};
pub use ids::{ElementId, IdError, SceneId};
pub use index::FractionalIndex;
pub use transient::TransientState;

/// Current time as Unix milliseconds. Stamped on every element mutation.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
