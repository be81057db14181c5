//! Scene store: the canonical ordered element list on this peer.
//!
//! Every structural change builds a new `Arc<[Element]>` snapshot, repairs
//! its position keys, validates it, and only then commits: id maps are
//! rebuilt, the scene nonce is regenerated, the registry is updated, and
//! subscribers are notified. Readers holding an older snapshot are never
//! affected by later commits.
//!
//! The scene has a single writer (`&mut self`). Remote batches arriving on
//! other threads queue in a [`RemoteInbox`] and are applied by
//! [`Scene::drain_inbox`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use tessera_types::{Element, ElementId, ElementProps, SceneId, TransientState, random_nonce};

use crate::config::SceneConfig;
use crate::fractional::KeyGenerator;
use crate::inbox::RemoteInbox;
use crate::indices::{ValidationContext, sync_invalid_indices, sync_moved_indices};
use crate::reconcile::reconcile_elements;
use crate::registry::SceneRegistry;
use crate::validate::ThrottledValidator;
use crate::{CrdtError, Result};

/// Handle returned by [`Scene::on_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Delivered to subscribers after each commit.
#[derive(Clone, Debug)]
pub struct SceneUpdate {
    /// Fresh random value per commit, for render-cache invalidation.
    pub nonce: u32,
    /// Number of commits so far, including this one.
    pub commit: u64,
    pub elements: Arc<[Element]>,
}

type UpdateCallback = Box<dyn FnMut(&SceneUpdate) + Send>;

/// Ordered, versioned element collection for one scene.
pub struct Scene {
    id: SceneId,

    /// Committed snapshot in position-key order.
    elements: Arc<[Element]>,

    /// Id to position in `elements`, tombstones included.
    elements_map: HashMap<ElementId, usize>,

    /// Positions of non-deleted elements, in order.
    non_deleted: Vec<usize>,

    /// Id to position in `elements`, tombstones excluded.
    non_deleted_map: HashMap<ElementId, usize>,

    /// Positions of frame-like elements, tombstones included.
    frames: Vec<usize>,

    nonce: u32,
    commits: u64,

    callbacks: Vec<(SubscriptionId, UpdateCallback)>,
    next_subscription: u64,

    registry: Option<SceneRegistry>,
    validator: ThrottledValidator,
    keygen: KeyGenerator,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            id: SceneId::new(),
            elements: Arc::from(Vec::new()),
            elements_map: HashMap::new(),
            non_deleted: Vec::new(),
            non_deleted_map: HashMap::new(),
            frames: Vec::new(),
            nonce: random_nonce(),
            commits: 0,
            callbacks: Vec::new(),
            next_subscription: 0,
            registry: None,
            validator: ThrottledValidator::new(&config.validation),
            keygen: KeyGenerator::new(&config.index),
        }
    }

    /// Create an empty scene that records its elements in `registry`.
    pub fn with_registry(config: &SceneConfig, registry: SceneRegistry) -> Self {
        let mut scene = Self::new(config);
        scene.registry = Some(registry);
        scene
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Regenerated on every commit.
    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Number of commits so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Sum of element versions. Changes whenever any element does.
    pub fn scene_version(&self) -> u64 {
        self.elements.iter().map(|el| el.version()).sum()
    }

    pub fn keygen(&self) -> &KeyGenerator {
        &self.keygen
    }

    /// Element count, tombstones included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements in order, tombstones included.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<[Element]> {
        Arc::clone(&self.elements)
    }

    /// Non-deleted elements in order.
    pub fn non_deleted_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.non_deleted.iter().map(|&i| &self.elements[i])
    }

    /// Frames and magic frames in order, tombstones included.
    pub fn frames_including_deleted(&self) -> impl Iterator<Item = &Element> + '_ {
        self.frames.iter().map(|&i| &self.elements[i])
    }

    /// Non-deleted frames and magic frames in order.
    pub fn non_deleted_frames(&self) -> impl Iterator<Item = &Element> + '_ {
        self.frames_including_deleted().filter(|el| !el.is_deleted())
    }

    pub fn get_element(&self, id: &ElementId) -> Option<&Element> {
        self.elements_map.get(id).map(|&i| &self.elements[i])
    }

    pub fn get_non_deleted_element(&self, id: &ElementId) -> Option<&Element> {
        self.non_deleted_map.get(id).map(|&i| &self.elements[i])
    }

    /// Position of `id` in [`elements`](Self::elements).
    pub fn get_element_index(&self, id: &ElementId) -> Option<usize> {
        self.elements_map.get(id).copied()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Validate and install `next` as the current snapshot.
    fn commit(&mut self, next: Vec<Element>, ctx: &ValidationContext) -> Result<()> {
        self.validator.check(&next, ctx)?;

        let elements: Arc<[Element]> = Arc::from(next);
        let mut elements_map = HashMap::with_capacity(elements.len());
        let mut non_deleted = Vec::with_capacity(elements.len());
        let mut non_deleted_map = HashMap::with_capacity(elements.len());
        let mut frames = Vec::new();
        for (i, el) in elements.iter().enumerate() {
            elements_map.insert(el.id().clone(), i);
            if el.is_frame_like() {
                frames.push(i);
            }
            if !el.is_deleted() {
                non_deleted.push(i);
                non_deleted_map.insert(el.id().clone(), i);
            }
        }

        self.elements = elements;
        self.elements_map = elements_map;
        self.non_deleted = non_deleted;
        self.non_deleted_map = non_deleted_map;
        self.frames = frames;
        self.nonce = random_nonce();
        self.commits += 1;

        if let Some(registry) = &self.registry {
            registry.register(self.id, self.elements.iter().map(|el| el.id()));
        }

        debug!(
            scene = %self.id.short(),
            commit = self.commits,
            elements = self.elements.len(),
            non_deleted = self.non_deleted.len(),
            "scene committed"
        );

        let update = SceneUpdate {
            nonce: self.nonce,
            commit: self.commits,
            elements: Arc::clone(&self.elements),
        };
        for (_, callback) in self.callbacks.iter_mut() {
            callback(&update);
        }
        Ok(())
    }

    /// Reject ids already in the scene or repeated within `incoming`.
    fn check_new_ids(&self, incoming: &[Element]) -> Result<()> {
        let mut seen = HashSet::with_capacity(incoming.len());
        for el in incoming {
            if self.elements_map.contains_key(el.id()) || !seen.insert(el.id()) {
                return Err(CrdtError::DuplicateElement(el.id().clone()));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Structural changes
    // =========================================================================

    /// Replace every element. Keys are repaired before committing.
    pub fn replace_all(&mut self, elements: Vec<Element>) -> Result<()> {
        let mut next = elements;
        sync_invalid_indices(&mut next, &self.keygen);
        self.commit(next, &ValidationContext::default())
    }

    /// Insert one element at `index`, keyed between its new neighbors.
    pub fn insert_at_index(&mut self, element: Element, index: usize) -> Result<()> {
        self.insert_many_at_index(vec![element], index)
    }

    /// Append one element.
    pub fn insert(&mut self, element: Element) -> Result<()> {
        self.insert_at_index(element, self.len())
    }

    /// Append several elements, keeping their relative order.
    pub fn insert_many(&mut self, elements: Vec<Element>) -> Result<()> {
        self.insert_many_at_index(elements, self.len())
    }

    /// Insert several elements starting at `index`, keeping their relative
    /// order. Only the inserted elements are re-keyed when possible.
    pub fn insert_many_at_index(&mut self, elements: Vec<Element>, index: usize) -> Result<()> {
        if index > self.len() {
            return Err(CrdtError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        self.check_new_ids(&elements)?;

        let moved: HashSet<ElementId> = elements.iter().map(|el| el.id().clone()).collect();
        let mut next = Vec::with_capacity(self.len() + elements.len());
        next.extend_from_slice(&self.elements[..index]);
        next.extend(elements);
        next.extend_from_slice(&self.elements[index..]);

        sync_moved_indices(&mut next, &moved, &self.keygen);
        self.commit(next, &ValidationContext::default())
    }

    /// Move `ids` so the first lands at `index` in the list with the moved
    /// elements taken out. The moved elements keep their current relative
    /// order.
    pub fn move_elements_to_index(&mut self, ids: &[ElementId], index: usize) -> Result<()> {
        for id in ids {
            if !self.elements_map.contains_key(id) {
                return Err(CrdtError::ElementNotFound(id.clone()));
            }
        }
        let moved: HashSet<ElementId> = ids.iter().cloned().collect();
        let (moving, mut rest): (Vec<Element>, Vec<Element>) = self
            .elements
            .iter()
            .cloned()
            .partition(|el| moved.contains(el.id()));

        if index > rest.len() {
            return Err(CrdtError::IndexOutOfBounds {
                index,
                len: rest.len(),
            });
        }
        rest.splice(index..index, moving);

        sync_moved_indices(&mut rest, &moved, &self.keygen);
        self.commit(rest, &ValidationContext::default())
    }

    // =========================================================================
    // Element mutation
    // =========================================================================

    /// Edit one element's visual attributes. Commits only if the edit
    /// changed something; returns whether it did.
    pub fn mutate_element(
        &mut self,
        id: &ElementId,
        edit: impl FnOnce(&mut ElementProps),
    ) -> Result<bool> {
        let pos = self
            .get_element_index(id)
            .ok_or_else(|| CrdtError::ElementNotFound(id.clone()))?;
        let mut next = self.elements.to_vec();
        if !next[pos].mutate(edit) {
            return Ok(false);
        }
        self.commit(next, &ValidationContext::default())?;
        Ok(true)
    }

    /// Tombstone an element. Returns `false` if it was already deleted.
    pub fn delete_element(&mut self, id: &ElementId) -> Result<bool> {
        let pos = self
            .get_element_index(id)
            .ok_or_else(|| CrdtError::ElementNotFound(id.clone()))?;
        let mut next = self.elements.to_vec();
        if !next[pos].set_deleted(true) {
            return Ok(false);
        }
        self.commit(next, &ValidationContext::default())?;
        Ok(true)
    }

    /// Run `f` over every element; commit if any call reports a change.
    ///
    /// `f` edits through the element's own versioned mutators and returns
    /// whether it changed anything. Returns the number of changed elements.
    pub fn map_elements(&mut self, mut f: impl FnMut(&mut Element) -> bool) -> Result<usize> {
        let mut next = self.elements.to_vec();
        let changed = next.iter_mut().map(|el| f(el)).filter(|&c| c).count();
        if changed == 0 {
            return Ok(0);
        }
        sync_invalid_indices(&mut next, &self.keygen);
        self.commit(next, &ValidationContext::default())?;
        Ok(changed)
    }

    // =========================================================================
    // Remote batches
    // =========================================================================

    /// Reconcile `remote` into the scene and commit the result.
    pub fn apply_remote(&mut self, remote: &[Element], transient: &TransientState) -> Result<()> {
        let merged = reconcile_elements(&self.elements, remote, transient, &self.keygen);
        let ctx = ValidationContext::reconcile(self.elements.len(), remote.len());
        self.commit(merged, &ctx)
    }

    /// Apply every queued batch. Returns how many were applied.
    ///
    /// Stops at the first batch that fails to commit; that batch is
    /// dropped and later batches stay queued.
    pub fn drain_inbox(
        &mut self,
        inbox: &mut RemoteInbox,
        transient: &TransientState,
    ) -> Result<usize> {
        let mut applied = 0;
        while let Some(batch) = inbox.try_next() {
            if let Err(err) = self.apply_remote(&batch.elements, transient) {
                warn!(%err, batch = batch.len(), "dropping remote batch");
                return Err(err);
            }
            applied += 1;
        }
        Ok(applied)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `callback` after every commit.
    pub fn on_update(&mut self, callback: impl FnMut(&SceneUpdate) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<()> {
        let before = self.callbacks.len();
        self.callbacks.retain(|(sub, _)| *sub != id);
        if self.callbacks.len() == before {
            return Err(CrdtError::UnknownSubscription(id));
        }
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Drop all elements, subscribers and registry entries.
    pub fn destroy(&mut self) {
        self.elements = Arc::from(Vec::new());
        self.elements_map.clear();
        self.non_deleted.clear();
        self.non_deleted_map.clear();
        self.frames.clear();
        self.callbacks.clear();
        if let Some(registry) = &self.registry {
            registry.release(self.id);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(&SceneConfig::default())
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            registry.release(self.id);
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("elements", &self.elements.len())
            .field("commits", &self.commits)
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::{RemoteBatch, remote_channel};
    use std::sync::Mutex;
    use tessera_types::ElementKind;

    fn test_scene() -> Scene {
        Scene::new(&SceneConfig::deterministic())
    }

    fn rect(id: &str) -> Element {
        Element::builder(ElementKind::Rectangle)
            .id(id)
            .size(10.0, 10.0)
            .version(1)
            .version_nonce(1)
            .build()
    }

    fn ids(scene: &Scene) -> Vec<&str> {
        scene.elements().iter().map(|e| e.id().as_str()).collect()
    }

    fn keys(scene: &Scene) -> Vec<&str> {
        scene
            .elements()
            .iter()
            .map(|e| e.index_str().unwrap())
            .collect()
    }

    #[test]
    fn test_new_scene() {
        let scene = test_scene();
        assert!(scene.is_empty());
        assert_eq!(scene.commits(), 0);
        assert_eq!(scene.scene_version(), 0);
    }

    // ── Insertion ─────────────────────────────────────────────────────

    #[test]
    fn test_insert_assigns_keys() {
        let mut scene = test_scene();
        scene.insert(rect("a")).unwrap();
        scene.insert(rect("b")).unwrap();
        scene.insert(rect("c")).unwrap();

        assert_eq!(ids(&scene), ["a", "b", "c"]);
        assert_eq!(keys(&scene), ["a0", "a1", "a2"]);
        // Placing an element is a versioned change
        assert!(scene.elements().iter().all(|e| e.version() == 2));
        assert_eq!(scene.commits(), 3);
    }

    #[test]
    fn test_insert_at_front_only_keys_new_element() {
        let mut scene = test_scene();
        scene.insert_many(vec![rect("a"), rect("b")]).unwrap();
        scene.insert_at_index(rect("z"), 0).unwrap();

        assert_eq!(ids(&scene), ["z", "a", "b"]);
        assert_eq!(keys(&scene), ["Zz", "a0", "a1"]);
        assert_eq!(scene.get_element(&"a".into()).unwrap().version(), 2);
    }

    #[test]
    fn test_insert_many_at_index_keeps_relative_order() {
        let mut scene = test_scene();
        scene.insert_many(vec![rect("a"), rect("d")]).unwrap();
        scene
            .insert_many_at_index(vec![rect("b"), rect("c")], 1)
            .unwrap();
        assert_eq!(ids(&scene), ["a", "b", "c", "d"]);
        let k = keys(&scene);
        assert!(k.windows(2).all(|w| w[0] < w[1]), "{k:?}");
        assert_eq!(k[0], "a0");
        assert_eq!(k[3], "a1");
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut scene = test_scene();
        let err = scene.insert_at_index(rect("a"), 1).unwrap_err();
        assert!(matches!(err, CrdtError::IndexOutOfBounds { index: 1, len: 0 }));
        assert_eq!(scene.commits(), 0);
    }

    #[test]
    fn test_insert_duplicate_id() {
        let mut scene = test_scene();
        scene.insert(rect("a")).unwrap();
        assert!(matches!(
            scene.insert(rect("a")),
            Err(CrdtError::DuplicateElement(_))
        ));
        assert!(matches!(
            scene.insert_many(vec![rect("b"), rect("b")]),
            Err(CrdtError::DuplicateElement(_))
        ));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_move_elements_to_index() {
        let mut scene = test_scene();
        scene
            .insert_many(vec![rect("a"), rect("b"), rect("c"), rect("d")])
            .unwrap();
        scene
            .move_elements_to_index(&["d".into(), "b".into()], 0)
            .unwrap();
        // Moved elements keep their relative order
        assert_eq!(ids(&scene), ["b", "d", "a", "c"]);
        let k = keys(&scene);
        assert!(k.windows(2).all(|w| w[0] < w[1]), "{k:?}");
        assert_eq!(scene.get_element(&"a".into()).unwrap().index_str(), Some("a0"));
    }

    #[test]
    fn test_move_unknown_element() {
        let mut scene = test_scene();
        scene.insert(rect("a")).unwrap();
        assert!(matches!(
            scene.move_elements_to_index(&["nope".into()], 0),
            Err(CrdtError::ElementNotFound(_))
        ));
    }

    // ── replace_all ───────────────────────────────────────────────────

    #[test]
    fn test_replace_all_repairs_and_rebuilds_maps() {
        let mut scene = test_scene();
        let deleted = Element::builder(ElementKind::Line)
            .id("gone")
            .index("a1")
            .deleted(true)
            .build();
        scene
            .replace_all(vec![rect("a"), deleted, rect("c")])
            .unwrap();

        assert_eq!(scene.len(), 3);
        assert_eq!(scene.get_element_index(&"c".into()), Some(2));
        assert!(scene.get_element(&"gone".into()).is_some());
        assert!(scene.get_non_deleted_element(&"gone".into()).is_none());
        let live: Vec<_> = scene.non_deleted_elements().map(|e| e.id().as_str()).collect();
        assert_eq!(live, ["a", "c"]);
        let k = keys(&scene);
        assert!(k.windows(2).all(|w| w[0] < w[1]), "{k:?}");
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_commits() {
        let mut scene = test_scene();
        scene.insert(rect("a")).unwrap();
        let before = scene.snapshot();
        scene.insert(rect("b")).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(scene.len(), 2);
    }

    // ── Mutation ──────────────────────────────────────────────────────

    #[test]
    fn test_mutate_element() {
        let mut scene = test_scene();
        scene.insert(rect("a")).unwrap();
        let version = scene.scene_version();

        assert!(scene.mutate_element(&"a".into(), |p| p.x = 42.0).unwrap());
        assert_eq!(scene.get_element(&"a".into()).unwrap().props().x, 42.0);
        assert_eq!(scene.scene_version(), version + 1);

        // No-op edits do not commit
        let commits = scene.commits();
        assert!(!scene.mutate_element(&"a".into(), |p| p.x = 42.0).unwrap());
        assert_eq!(scene.commits(), commits);

        assert!(matches!(
            scene.mutate_element(&"zz".into(), |p| p.x = 1.0),
            Err(CrdtError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_delete_element_is_tombstone() {
        let mut scene = test_scene();
        scene.insert_many(vec![rect("a"), rect("b")]).unwrap();
        assert!(scene.delete_element(&"a".into()).unwrap());
        assert!(!scene.delete_element(&"a".into()).unwrap());

        assert_eq!(scene.len(), 2);
        assert!(scene.get_element(&"a".into()).unwrap().is_deleted());
        assert_eq!(scene.non_deleted_elements().count(), 1);
    }

    #[test]
    fn test_frame_views_follow_commits() {
        let mut scene = test_scene();
        let frame = |id: &str, kind| Element::builder(kind).id(id).size(50.0, 50.0).build();
        scene
            .insert_many(vec![
                frame("f1", ElementKind::Frame),
                rect("r"),
                frame("f2", ElementKind::Magicframe),
            ])
            .unwrap();

        let frames: Vec<_> = scene.frames_including_deleted().map(|e| e.id().as_str()).collect();
        assert_eq!(frames, ["f1", "f2"]);

        scene.delete_element(&"f1".into()).unwrap();
        let live: Vec<_> = scene.non_deleted_frames().map(|e| e.id().as_str()).collect();
        assert_eq!(live, ["f2"]);
        assert_eq!(scene.frames_including_deleted().count(), 2);

        scene.destroy();
        assert_eq!(scene.frames_including_deleted().count(), 0);
    }

    #[test]
    fn test_map_elements_commits_only_on_change() {
        let mut scene = test_scene();
        scene.insert_many(vec![rect("a"), rect("b")]).unwrap();
        let commits = scene.commits();

        assert_eq!(scene.map_elements(|_| false).unwrap(), 0);
        assert_eq!(scene.commits(), commits);

        let changed = scene
            .map_elements(|el| el.id().as_str() == "b" && el.mutate(|p| p.angle = 1.5))
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(scene.commits(), commits + 1);
        assert_eq!(scene.get_element(&"b".into()).unwrap().props().angle, 1.5);
    }

    // ── Remote ────────────────────────────────────────────────────────

    #[test]
    fn test_apply_remote_nonce_tie() {
        let mut scene = test_scene();
        let local = Element::builder(ElementKind::Rectangle)
            .id("A")
            .version(1)
            .version_nonce(7)
            .index("a0")
            .build();
        scene.replace_all(vec![local]).unwrap();

        let remote = Element::builder(ElementKind::Rectangle)
            .id("A")
            .version(1)
            .version_nonce(2)
            .index("a1")
            .build();
        scene.apply_remote(&[remote], &TransientState::idle()).unwrap();

        let a = scene.get_element(&"A".into()).unwrap();
        assert_eq!(a.version_nonce(), 2);
        assert_eq!(a.index_str(), Some("a1"));
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn test_drain_inbox() {
        let mut scene = test_scene();
        let (tx, mut inbox) = remote_channel();
        let b1 = Element::builder(ElementKind::Text).id("t1").index("a0").build();
        let b2 = Element::builder(ElementKind::Text).id("t2").index("a1").build();
        tx.send(RemoteBatch::new(vec![b1]));
        tx.send(RemoteBatch::new(vec![b2]));

        let applied = scene.drain_inbox(&mut inbox, &TransientState::idle()).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(ids(&scene), ["t1", "t2"]);
        assert_eq!(scene.drain_inbox(&mut inbox, &TransientState::idle()).unwrap(), 0);
    }

    // ── Subscriptions ─────────────────────────────────────────────────

    #[test]
    fn test_subscribers_see_each_commit() {
        let mut scene = test_scene();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = scene.on_update(move |update| {
            sink.lock().unwrap().push((update.commit, update.elements.len()));
        });

        scene.insert(rect("a")).unwrap();
        scene.insert(rect("b")).unwrap();
        scene.unsubscribe(sub).unwrap();
        scene.insert(rect("c")).unwrap();

        assert_eq!(*seen.lock().unwrap(), [(1, 1), (2, 2)]);
        assert!(matches!(
            scene.unsubscribe(sub),
            Err(CrdtError::UnknownSubscription(_))
        ));
    }

    #[test]
    fn test_update_nonce_matches_scene() {
        let mut scene = test_scene();
        let last = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        scene.on_update(move |update| *sink.lock().unwrap() = Some(update.nonce));
        scene.insert(rect("a")).unwrap();
        assert_eq!(*last.lock().unwrap(), Some(scene.nonce()));
    }

    // ── Registry / teardown ───────────────────────────────────────────

    #[test]
    fn test_registry_tracks_commits_and_destroy() {
        let registry = SceneRegistry::new();
        let mut scene = Scene::with_registry(&SceneConfig::deterministic(), registry.clone());
        scene.insert_many(vec![rect("a"), rect("b")]).unwrap();
        assert_eq!(registry.scene_of(&"a".into()), Some(scene.id()));
        assert_eq!(registry.len(), 2);

        scene.destroy();
        assert!(registry.is_empty());
        assert!(scene.is_empty());
        assert!(scene.get_element(&"a".into()).is_none());
    }

    #[test]
    fn test_registry_released_on_drop() {
        let registry = SceneRegistry::new();
        {
            let mut scene =
                Scene::with_registry(&SceneConfig::deterministic(), registry.clone());
            scene.insert(rect("a")).unwrap();
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }
}
