//! Scene elements and the version model.
//!
//! An [`Element`] is whole-object last-writer-wins state. Its identity and
//! reconciliation metadata (`version`, `version_nonce`, `index`, `is_deleted`)
//! are private: every mutator goes through the version rule
//!
//! - `version` increments by exactly one,
//! - `version_nonce` is replaced with a fresh random integer,
//! - `updated` is stamped with the current wall-clock time.
//!
//! A mutation that changes nothing does not bump. The visual attributes in
//! [`ElementProps`] are opaque to reconciliation and never merged per field.
//!
//! The serialized form uses camelCase names (`versionNonce`, `isDeleted`,
//! `type`, ...) so batches interoperate with other peers on the same scene.

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

use crate::ids::ElementId;
use crate::index::FractionalIndex;

/// Draw a fresh version nonce. Non-negative 31-bit range, matching what
/// JavaScript peers produce.
pub fn random_nonce() -> u32 {
    rand::thread_rng().gen_range(0..=i32::MAX as u32)
}

/// What kind of shape an element is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ElementKind {
    #[default]
    Rectangle,
    Diamond,
    Ellipse,
    Arrow,
    Line,
    #[strum(serialize = "freedraw", serialize = "draw")]
    Freedraw,
    Text,
    Image,
    Frame,
    /// Frame whose contents are generated from a prompt.
    Magicframe,
    Embeddable,
    Iframe,
    /// Legacy selection marquee. Older scenes persisted it as an element;
    /// restore drops it.
    Selection,
}

impl ElementKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Diamond => "diamond",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Arrow => "arrow",
            ElementKind::Line => "line",
            ElementKind::Freedraw => "freedraw",
            ElementKind::Text => "text",
            ElementKind::Image => "image",
            ElementKind::Frame => "frame",
            ElementKind::Magicframe => "magicframe",
            ElementKind::Embeddable => "embeddable",
            ElementKind::Iframe => "iframe",
            ElementKind::Selection => "selection",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visual attributes. Opaque to reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementProps {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub stroke_color: String,
    pub background_color: String,
    /// 0..=100
    pub opacity: u8,
    /// Ordered from deepest to shallowest.
    pub group_ids: Vec<String>,
    pub frame_id: Option<ElementId>,
    pub locked: bool,
    /// Kind-specific attributes (`text`, `points`, `fileId`, ...) carried
    /// through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ElementProps {
    fn default() -> Self {
        Self {
            kind: ElementKind::default(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            stroke_color: "#1e1e1e".to_string(),
            background_color: "transparent".to_string(),
            opacity: 100,
            group_ids: Vec::new(),
            frame_id: None,
            locked: false,
            extra: Map::new(),
        }
    }
}

fn default_version() -> u64 {
    1
}

/// A scene element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    id: ElementId,
    #[serde(flatten)]
    props: ElementProps,
    /// Incremented on every mutation. Never decreases for a given id.
    #[serde(default = "default_version")]
    version: u64,
    /// Regenerated on every mutation. Lower nonce wins a version tie.
    #[serde(default)]
    version_nonce: u32,
    /// Position key. `None` until the element is placed in a scene.
    #[serde(default)]
    index: Option<FractionalIndex>,
    /// Tombstone.
    #[serde(default)]
    is_deleted: bool,
    /// Unix ms of the last mutation.
    #[serde(default)]
    updated: u64,
}

impl Element {
    /// Create a fresh, unplaced element at version 1.
    pub fn new(props: ElementProps) -> Self {
        Self {
            id: ElementId::new(),
            props,
            version: 1,
            version_nonce: random_nonce(),
            index: None,
            is_deleted: false,
            updated: crate::now_millis(),
        }
    }

    /// Start building an element with explicit metadata.
    pub fn builder(kind: ElementKind) -> ElementBuilder {
        ElementBuilder::new(kind)
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn props(&self) -> &ElementProps {
        &self.props
    }

    pub fn kind(&self) -> ElementKind {
        self.props.kind
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn version_nonce(&self) -> u32 {
        self.version_nonce
    }

    pub fn index(&self) -> Option<&FractionalIndex> {
        self.index.as_ref()
    }

    /// The position key as a plain string slice.
    pub fn index_str(&self) -> Option<&str> {
        self.index.as_ref().map(|k| k.as_str())
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn updated(&self) -> u64 {
        self.updated
    }

    /// Key for derived caches (shapes, measurements). Changes whenever the
    /// element does.
    pub fn cache_key(&self) -> (ElementId, u64) {
        (self.id.clone(), self.version)
    }

    /// Frames and magic frames contain other elements via `frame_id`.
    pub fn is_frame_like(&self) -> bool {
        matches!(self.props.kind, ElementKind::Frame | ElementKind::Magicframe)
    }

    /// Zero-sized elements are invisible and get dropped on restore.
    pub fn is_invisibly_small(&self) -> bool {
        self.props.width == 0.0 && self.props.height == 0.0
    }

    // ── Versioned mutation ──────────────────────────────────────────────

    /// Apply an edit to the visual attributes. Bumps the version if the
    /// attributes actually changed; returns whether they did.
    pub fn mutate(&mut self, edit: impl FnOnce(&mut ElementProps)) -> bool {
        let before = self.props.clone();
        edit(&mut self.props);
        if self.props == before {
            return false;
        }
        self.bump_version();
        true
    }

    /// Assign a new position key, bumping the version if it differs.
    pub fn set_index(&mut self, index: Option<FractionalIndex>) -> bool {
        if self.index == index {
            return false;
        }
        self.index = index;
        self.bump_version();
        true
    }

    /// Set or clear the tombstone, bumping the version if it differs.
    pub fn set_deleted(&mut self, deleted: bool) -> bool {
        if self.is_deleted == deleted {
            return false;
        }
        self.is_deleted = deleted;
        self.bump_version();
        true
    }

    /// Increment version, regenerate nonce, stamp `updated`.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.version_nonce = random_nonce();
        self.updated = crate::now_millis();
    }

    /// Bump so that the result is strictly newer than `other_version`.
    pub fn bump_version_past(&mut self, other_version: u64) {
        self.version = self.version.max(other_version);
        self.bump_version();
    }

    // ── Unversioned rewrites (import paths only) ────────────────────────

    /// Replace the position key without touching version metadata.
    ///
    /// Only for restoring legacy data, where the key is derived locally from
    /// array order and must not look like a newer edit to peers.
    pub fn with_restored_index(mut self, index: FractionalIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Re-identify an element. Used when an import contains duplicate ids.
    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = id;
        self
    }

    /// Version 0 is not a valid stored version; raise it to 1.
    pub fn normalized(mut self) -> Self {
        if self.version == 0 {
            self.version = 1;
        }
        self
    }
}

/// Builder for [`Element`] that sets metadata explicitly, for decoding peers'
/// state and for tests.
///
/// ```
/// use tessera_types::{Element, ElementKind};
///
/// let el = Element::builder(ElementKind::Ellipse)
///     .id("e1")
///     .version(3)
///     .version_nonce(42)
///     .index("a1")
///     .build();
/// assert_eq!(el.version(), 3);
/// assert_eq!(el.index_str(), Some("a1"));
/// ```
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new(kind: ElementKind) -> Self {
        let props = ElementProps {
            kind,
            ..ElementProps::default()
        };
        Self {
            element: Element::new(props),
        }
    }

    pub fn id(mut self, id: impl Into<ElementId>) -> Self {
        self.element.id = id.into();
        self
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.element.props.x = x;
        self.element.props.y = y;
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.element.props.width = width;
        self.element.props.height = height;
        self
    }

    pub fn stroke_color(mut self, color: impl Into<String>) -> Self {
        self.element.props.stroke_color = color.into();
        self
    }

    /// Set a kind-specific attribute such as `text` or `points`.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.element.props.extra.insert(key.into(), value.into());
        self
    }

    pub fn frame_id(mut self, frame_id: impl Into<ElementId>) -> Self {
        self.element.props.frame_id = Some(frame_id.into());
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.element.version = version;
        self
    }

    pub fn version_nonce(mut self, nonce: u32) -> Self {
        self.element.version_nonce = nonce;
        self
    }

    pub fn index(mut self, index: impl Into<FractionalIndex>) -> Self {
        self.element.index = Some(index.into());
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.element.is_deleted = deleted;
        self
    }

    pub fn updated(mut self, updated: u64) -> Self {
        self.element.updated = updated;
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Element {
        Element::builder(ElementKind::Rectangle)
            .id("r1")
            .size(10.0, 10.0)
            .version(1)
            .version_nonce(7)
            .build()
    }

    // ── Version rule ────────────────────────────────────────────────────

    #[test]
    fn test_new_element_is_unplaced_at_version_one() {
        let el = Element::new(ElementProps::default());
        assert_eq!(el.version(), 1);
        assert!(el.index().is_none());
        assert!(!el.is_deleted());
    }

    #[test]
    fn test_mutate_bumps_version_once() {
        let mut el = rect();
        let changed = el.mutate(|p| {
            p.x = 5.0;
            p.y = 6.0;
        });
        assert!(changed);
        assert_eq!(el.version(), 2);
        assert_eq!(el.props().x, 5.0);
    }

    #[test]
    fn test_noop_mutate_does_not_bump() {
        let mut el = rect();
        let changed = el.mutate(|p| p.x = 0.0);
        assert!(!changed);
        assert_eq!(el.version(), 1);
        assert_eq!(el.version_nonce(), 7);
    }

    #[test]
    fn test_set_index_bumps_only_on_change() {
        let mut el = rect();
        assert!(el.set_index(Some("a0".into())));
        assert_eq!(el.version(), 2);
        assert!(!el.set_index(Some("a0".into())));
        assert_eq!(el.version(), 2);
    }

    #[test]
    fn test_delete_is_a_versioned_tombstone() {
        let mut el = rect();
        assert!(el.set_deleted(true));
        assert!(el.is_deleted());
        assert_eq!(el.version(), 2);
        assert!(!el.set_deleted(true));
    }

    #[test]
    fn test_bump_version_past() {
        let mut el = rect();
        el.bump_version_past(9);
        assert_eq!(el.version(), 10);

        // Never goes backwards
        el.bump_version_past(3);
        assert_eq!(el.version(), 11);
    }

    #[test]
    fn test_restored_index_keeps_metadata() {
        let el = rect().with_restored_index("a5".into());
        assert_eq!(el.index_str(), Some("a5"));
        assert_eq!(el.version(), 1);
        assert_eq!(el.version_nonce(), 7);
    }

    #[test]
    fn test_cache_key_tracks_version() {
        let mut el = rect();
        let before = el.cache_key();
        el.mutate(|p| p.angle = 1.0);
        assert_ne!(before, el.cache_key());
    }

    #[test]
    fn test_normalized_raises_zero_version() {
        let el = rect();
        let zero = Element::builder(ElementKind::Text).version(0).build();
        assert_eq!(zero.normalized().version(), 1);
        assert_eq!(el.normalized().version(), 1);
    }

    #[test]
    fn test_random_nonce_is_non_negative_i32() {
        for _ in 0..100 {
            assert!(random_nonce() <= i32::MAX as u32);
        }
    }

    // ── Serialization ───────────────────────────────────────────────────

    #[test]
    fn test_serializes_camel_case() {
        let el = rect().with_restored_index("a0".into());
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["versionNonce"], 7);
        assert_eq!(json["isDeleted"], false);
        assert_eq!(json["index"], "a0");
        assert_eq!(json["strokeColor"], "#1e1e1e");
    }

    #[test]
    fn test_deserialize_fills_missing_metadata() {
        let el: Element =
            serde_json::from_str(r#"{"id":"x","type":"ellipse","width":3,"height":4}"#).unwrap();
        assert_eq!(el.id().as_str(), "x");
        assert_eq!(el.kind(), ElementKind::Ellipse);
        assert_eq!(el.version(), 1);
        assert_eq!(el.version_nonce(), 0);
        assert!(el.index().is_none());
        assert!(!el.is_deleted());
        assert_eq!(el.props().opacity, 100);
    }

    #[test]
    fn test_kind_parses_aliases() {
        assert_eq!(ElementKind::from_str("DRAW"), Some(ElementKind::Freedraw));
        assert_eq!(ElementKind::from_str("frame"), Some(ElementKind::Frame));
        assert_eq!(ElementKind::from_str("blob"), None);
        assert_eq!(ElementKind::from_str("iframe"), Some(ElementKind::Iframe));
        assert_eq!(ElementKind::Magicframe.as_str(), "magicframe");
    }

    #[test]
    fn test_kind_specific_attributes_round_trip() {
        let json = r#"{"id":"t","type":"text","text":"hello","fontSize":20,"points":[[0,0],[4,2]]}"#;
        let el: Element = serde_json::from_str(json).unwrap();
        assert_eq!(el.props().extra["text"], "hello");
        assert!(!el.props().extra.contains_key("id"));
        assert!(!el.props().extra.contains_key("type"));

        let back = serde_json::to_value(&el).unwrap();
        assert_eq!(back["text"], "hello");
        assert_eq!(back["fontSize"], 20);
        assert_eq!(back["points"], serde_json::json!([[0, 0], [4, 2]]));
    }

    #[test]
    fn test_attribute_edit_bumps_version() {
        let mut el = rect();
        assert!(el.mutate(|p| {
            p.extra.insert("text".into(), "hi".into());
        }));
        assert_eq!(el.version(), 2);
    }

    #[test]
    fn test_frame_like() {
        assert!(Element::builder(ElementKind::Frame).build().is_frame_like());
        assert!(Element::builder(ElementKind::Magicframe).build().is_frame_like());
        assert!(!rect().is_frame_like());
    }
}
