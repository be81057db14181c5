//! Reconciliation and ordering core for collaborative Tessera scenes.
//!
//! Peers exchange whole elements, never operations. Each element carries a
//! `(version, version_nonce)` pair that decides which copy wins, and a
//! fractional position key that decides where it sits. No peer coordinates
//! with another: the same inputs produce the same merged list everywhere.
//!
//! # Design Philosophy
//!
//! - **Whole-element LWW**: higher version wins, lower nonce breaks ties,
//!   and an element mid-gesture on this peer always stays local.
//! - **Keys, not positions**: order is the byte order of string keys, with
//!   id as the final tie-break. A new key always fits between any two
//!   distinct neighbors.
//! - **Repair, don't reject**: collisions and malformed keys from peers are
//!   re-keyed in place after every merge. The list a caller sees is always
//!   strictly ordered.
//!
//! # Modules
//!
//! |---------------|--------------------------------------------------------|
//! | Module        | Purpose                                                |
//! |---------------|--------------------------------------------------------|
//! | [`fractional`]| Key format, between/N-between generation, jitter       |
//! | [`indices`]   | Element order, key repair, invariant validation        |
//! | [`reconcile`] | Local/remote merge                                     |
//! | [`scene`]     | Canonical store, commits, subscriptions                |
//! | [`registry`]  | Element-to-scene map shared across scenes              |
//! | [`inbox`]     | Remote batch wire type and cross-thread channel        |
//! | [`restore`]   | Import cleanup                                         |
//! | [`validate`]  | Throttled invariant checks                             |
//! | [`config`]    | RON-loadable settings                                  |
//! |---------------|--------------------------------------------------------|
//!
//! # Example
//!
//! ```
//! use tessera_crdt::{Scene, SceneConfig};
//! use tessera_types::{Element, ElementKind, TransientState};
//!
//! let mut scene = Scene::new(&SceneConfig::deterministic());
//! scene.insert(Element::builder(ElementKind::Rectangle).id("a").size(4.0, 4.0).build())?;
//!
//! let remote = Element::builder(ElementKind::Ellipse).id("b").index("a5").build();
//! scene.apply_remote(&[remote], &TransientState::idle())?;
//!
//! let order: Vec<_> = scene.elements().iter().map(|e| e.id().as_str()).collect();
//! assert_eq!(order, ["a", "b"]);
//! # Ok::<(), tessera_crdt::CrdtError>(())
//! ```

pub mod config;
mod error;
pub mod fractional;
pub mod inbox;
pub mod indices;
pub mod reconcile;
pub mod registry;
pub mod restore;
pub mod scene;
pub mod validate;

pub use config::{Charset, IndexConfig, SceneConfig, ValidationConfig, ValidationMode};
pub use error::CrdtError;
pub use fractional::{
    BASE36, BASE62, IndexCharSet, KeyGenerator, jittered_key_between, key_between,
    n_keys_between,
};
pub use inbox::{RemoteBatch, RemoteInbox, RemoteSender, remote_channel};
pub use indices::{
    ValidationContext, compare_elements, is_valid_fractional_index, order_by_fractional_index,
    restore_indices, sync_invalid_indices, sync_moved_indices, validate_fractional_indices,
};
pub use reconcile::{reconcile_elements, should_discard_remote_element};
pub use registry::SceneRegistry;
pub use restore::{restore_elements, restore_from_json};
pub use scene::{Scene, SceneUpdate, SubscriptionId};
pub use validate::ThrottledValidator;

/// Result type for ordering and scene operations.
pub type Result<T> = std::result::Result<T, CrdtError>;
