//! Which scene currently holds each element.
//!
//! Shared between scenes on the same peer (clone the handle). A scene
//! re-registers its ids on every commit and releases them when destroyed or
//! dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use tessera_types::{ElementId, SceneId};

/// Shared `ElementId -> SceneId` map.
#[derive(Clone, Debug, Default)]
pub struct SceneRegistry {
    owners: Arc<RwLock<HashMap<ElementId, SceneId>>>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scene holding `id`, if any.
    pub fn scene_of(&self, id: &ElementId) -> Option<SceneId> {
        self.owners.read().get(id).copied()
    }

    /// Replace `scene`'s entries with `ids`. An id held by another scene
    /// moves to this one.
    pub fn register<'a>(&self, scene: SceneId, ids: impl IntoIterator<Item = &'a ElementId>) {
        let mut owners = self.owners.write();
        owners.retain(|_, owner| *owner != scene);
        for id in ids {
            owners.insert(id.clone(), scene);
        }
    }

    /// Drop every entry owned by `scene`. Returns how many were removed.
    pub fn release(&self, scene: SceneId) -> usize {
        let mut owners = self.owners.write();
        let before = owners.len();
        owners.retain(|_, owner| *owner != scene);
        before - owners.len()
    }

    pub fn len(&self) -> usize {
        self.owners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ElementId> {
        names.iter().map(|n| ElementId::from(*n)).collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SceneRegistry::new();
        let scene = SceneId::new();
        registry.register(scene, &ids(&["a", "b"]));
        assert_eq!(registry.scene_of(&"a".into()), Some(scene));
        assert_eq!(registry.scene_of(&"z".into()), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregister_replaces_scene_entries() {
        let registry = SceneRegistry::new();
        let scene = SceneId::new();
        registry.register(scene, &ids(&["a", "b"]));
        registry.register(scene, &ids(&["b", "c"]));
        assert_eq!(registry.scene_of(&"a".into()), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_release_leaves_other_scenes() {
        let registry = SceneRegistry::new();
        let (s1, s2) = (SceneId::new(), SceneId::new());
        registry.register(s1, &ids(&["a"]));
        registry.register(s2, &ids(&["b"]));

        let shared = registry.clone();
        assert_eq!(shared.release(s1), 1);
        assert_eq!(registry.scene_of(&"b".into()), Some(s2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_element_moves_between_scenes() {
        let registry = SceneRegistry::new();
        let (s1, s2) = (SceneId::new(), SceneId::new());
        registry.register(s1, &ids(&["a"]));
        registry.register(s2, &ids(&["a"]));
        assert_eq!(registry.scene_of(&"a".into()), Some(s2));
        assert_eq!(registry.release(s1), 0);
    }
}
