//! Local-only "in flux" markers.
//!
//! While the local user is mid-gesture on an element, incoming remote state
//! for that element must not clobber it. These markers are never persisted
//! or sent to peers.

use crate::ids::ElementId;

/// Elements the local user is currently editing, resizing, or dragging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransientState {
    pub editing: Option<ElementId>,
    pub resizing: Option<ElementId>,
    pub dragging: Option<ElementId>,
}

impl TransientState {
    /// No gesture in progress.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn editing(id: impl Into<ElementId>) -> Self {
        Self {
            editing: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn resizing(id: impl Into<ElementId>) -> Self {
        Self {
            resizing: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn dragging(id: impl Into<ElementId>) -> Self {
        Self {
            dragging: Some(id.into()),
            ..Self::default()
        }
    }

    /// Whether `id` is under an in-progress local gesture.
    pub fn is_busy(&self, id: &ElementId) -> bool {
        [&self.editing, &self.resizing, &self.dragging]
            .into_iter()
            .flatten()
            .any(|busy| busy == id)
    }
}
