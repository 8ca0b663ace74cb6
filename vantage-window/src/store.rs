//! Keyed collection of renderables.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;
use vantage_data::{Renderable, RenderableKind};
use vantage_gpu::{BufferHandle, DeviceBuffer, Shared};

use crate::errors::LayerError;

/// A renderable plus the bookkeeping a renderer needs.
#[derive(Debug)]
pub struct Entry {
    renderable: Renderable,
    revision: u64,
    enabled: bool,
    buffers: Vec<Shared<DeviceBuffer>>,
}

impl Entry {
    fn new(renderable: Renderable) -> Self {
        Self {
            renderable,
            revision: 0,
            enabled: true,
            buffers: Vec::new(),
        }
    }

    pub fn renderable(&self) -> &Renderable {
        &self.renderable
    }

    /// The entry's own visibility flag, independent of its group's.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bumped on every mutable access. Renderers compare it against the
    /// revision they last uploaded to decide whether to re-upload.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn buffers(&self) -> &[Shared<DeviceBuffer>] {
        &self.buffers
    }
}

/// Maps `(group_key, object_key)` to renderable content. Entries and whole
/// groups can be hidden separately; an entry is drawn only when both its
/// own flag and its group's flag are set. Groups never mentioned are visible.
#[derive(Debug, Default)]
pub struct RenderableStore {
    entries: BTreeMap<(String, usize), Entry>,
    group_enabled: HashMap<String, bool>,
}

impl RenderableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the renderable for a key, creating a default one if absent.
    pub fn get(&mut self, group_key: &str, object_key: usize) -> &mut Renderable {
        let entry = self
            .entries
            .entry((group_key.to_owned(), object_key))
            .or_insert_with(|| {
                debug!(group = group_key, object = object_key, "renderable created");
                Entry::new(Renderable::default())
            });
        entry.revision += 1;
        &mut entry.renderable
    }

    /// Typed [`get`](Self::get). Creates a default `K` if the key is absent
    /// and fails without touching the entry if it holds another kind.
    pub fn get_t<K: RenderableKind>(
        &mut self,
        group_key: &str,
        object_key: usize,
    ) -> Result<&mut K, LayerError> {
        let entry = self
            .entries
            .entry((group_key.to_owned(), object_key))
            .or_insert_with(|| {
                debug!(
                    group = group_key,
                    object = object_key,
                    kind = K::NAME,
                    "renderable created"
                );
                Entry::new(K::default().into())
            });
        let found = entry.renderable.kind_name();
        if found != K::NAME {
            return Err(LayerError::TypeMismatch {
                expected: K::NAME,
                found,
            });
        }
        entry.revision += 1;
        K::from_renderable_mut(&mut entry.renderable).ok_or(LayerError::TypeMismatch {
            expected: K::NAME,
            found,
        })
    }

    /// Read-only lookup; does not create or bump the revision.
    pub fn entry(&self, group_key: &str, object_key: usize) -> Option<&Entry> {
        self.entries.get(&(group_key.to_owned(), object_key))
    }

    pub fn contains(&self, group_key: &str, object_key: usize) -> bool {
        self.entries.contains_key(&(group_key.to_owned(), object_key))
    }

    /// Remove an entry and release its buffers. Handles handed out by
    /// [`attach_buffer`](Self::attach_buffer) go stale. Returns whether
    /// anything was removed.
    pub fn erase(&mut self, group_key: &str, object_key: usize) -> bool {
        let removed = self
            .entries
            .remove(&(group_key.to_owned(), object_key))
            .is_some();
        if removed {
            debug!(group = group_key, object = object_key, "renderable erased");
        }
        removed
    }

    /// Anchor a buffer to an entry's lifetime. `None` if the entry does not
    /// exist.
    pub fn attach_buffer(
        &mut self,
        group_key: &str,
        object_key: usize,
        buffer: DeviceBuffer,
    ) -> Option<BufferHandle> {
        let entry = self.entries.get_mut(&(group_key.to_owned(), object_key))?;
        let buffer = Shared::new(buffer);
        let handle = BufferHandle::new(&buffer);
        entry.buffers.push(buffer);
        Some(handle)
    }

    /// Drop every buffer attached to an entry, e.g. before re-uploading.
    pub fn clear_buffers(&mut self, group_key: &str, object_key: usize) {
        if let Some(entry) = self.entries.get_mut(&(group_key.to_owned(), object_key)) {
            entry.buffers.clear();
        }
    }

    pub fn set_group_enabled(&mut self, group_key: &str, enabled: bool) {
        debug!(group = group_key, enabled, "group visibility changed");
        self.group_enabled.insert(group_key.to_owned(), enabled);
    }

    pub fn is_group_enabled(&self, group_key: &str) -> bool {
        self.group_enabled.get(group_key).copied().unwrap_or(true)
    }

    /// Show or hide a single entry. Returns false if the entry does not
    /// exist. The group flag is left alone.
    pub fn set_enabled(&mut self, group_key: &str, object_key: usize, enabled: bool) -> bool {
        match self.entries.get_mut(&(group_key.to_owned(), object_key)) {
            Some(entry) => {
                debug!(group = group_key, object = object_key, enabled, "entry visibility changed");
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// The entry's own flag; `false` for missing entries.
    pub fn is_enabled(&self, group_key: &str, object_key: usize) -> bool {
        self.entry(group_key, object_key)
            .is_some_and(Entry::is_enabled)
    }

    /// All entries, visible or not.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &Entry)> + '_ {
        self.entries
            .iter()
            .map(|((group, object), entry)| (group.as_str(), *object, entry))
    }

    /// Entries that are enabled and whose group is enabled.
    pub fn visible(&self) -> impl Iterator<Item = (&str, usize, &Entry)> + '_ {
        self.iter()
            .filter(|(group, _, entry)| entry.enabled && self.is_group_enabled(group))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use vantage_data::{DrawnImage, DrawnMesh, DrawnPoints};

    #[test]
    fn test_get_returns_same_entry() {
        let mut store = RenderableStore::new();
        if let Renderable::Points(points) = store.get("cloud", 0) {
            points.positions.push(DVec3::ONE);
        }
        match store.get("cloud", 0) {
            Renderable::Points(points) => assert_eq!(points.positions, vec![DVec3::ONE]),
            other => panic!("unexpected kind {}", other.kind_name()),
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.entry("cloud", 0).unwrap().revision(), 2);
    }

    #[test]
    fn test_object_keys_are_distinct() {
        let mut store = RenderableStore::new();
        store.get_t::<DrawnPoints>("a", 0).unwrap();
        store.get_t::<DrawnMesh>("a", 1).unwrap();
        store.get_t::<DrawnImage>("b", 0).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.entry("a", 1).unwrap().renderable().kind_name(), "mesh");
    }

    #[test]
    fn test_erase_then_get_is_fresh() {
        let mut store = RenderableStore::new();
        store
            .get_t::<DrawnPoints>("cloud", 3)
            .unwrap()
            .positions
            .push(DVec3::X);
        assert!(store.erase("cloud", 3));
        assert!(!store.contains("cloud", 3));
        assert!(store.get_t::<DrawnPoints>("cloud", 3).unwrap().is_empty());
    }

    #[test]
    fn test_erase_missing_is_noop() {
        let mut store = RenderableStore::new();
        store.get("keep", 0);
        assert!(!store.erase("missing", 0));
        assert!(!store.erase("keep", 1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_type_mismatch_leaves_entry() {
        let mut store = RenderableStore::new();
        store
            .get_t::<DrawnMesh>("mesh", 0)
            .unwrap()
            .triangles
            .push([0, 1, 2]);
        let revision = store.entry("mesh", 0).unwrap().revision();

        let err = store.get_t::<DrawnPoints>("mesh", 0).unwrap_err();
        assert!(matches!(
            err,
            LayerError::TypeMismatch { expected: "points", found: "mesh" }
        ));
        let entry = store.entry("mesh", 0).unwrap();
        assert_eq!(entry.revision(), revision);
        match entry.renderable() {
            Renderable::Mesh(mesh) => assert_eq!(mesh.triangles.len(), 1),
            other => panic!("unexpected kind {}", other.kind_name()),
        }
    }

    #[test]
    fn test_untyped_get_defaults_to_points() {
        let mut store = RenderableStore::new();
        store.get("x", 0);
        assert!(store.get_t::<DrawnPoints>("x", 0).is_ok());
        assert!(store.get_t::<DrawnImage>("x", 0).is_err());
    }

    #[test]
    fn test_group_visibility() {
        let mut store = RenderableStore::new();
        store.get("a", 0);
        store.get("a", 1);
        store.get("b", 0);
        assert!(store.is_group_enabled("never-seen"));

        store.set_group_enabled("a", false);
        let visible: Vec<_> = store
            .visible()
            .map(|(g, o, _)| (g.to_owned(), o))
            .collect();
        assert_eq!(visible, vec![("b".to_owned(), 0)]);
        assert_eq!(store.iter().count(), 3);

        store.set_group_enabled("a", true);
        assert_eq!(store.visible().count(), 3);
    }

    #[test]
    fn test_entry_visibility_is_independent_of_group() {
        let mut store = RenderableStore::new();
        store.get("a", 0);
        store.get("a", 1);
        assert!(store.is_enabled("a", 0));
        assert!(!store.is_enabled("a", 7));
        assert!(!store.set_enabled("a", 7, false));

        assert!(store.set_enabled("a", 0, false));
        let visible: Vec<_> = store.visible().map(|(_, o, _)| o).collect();
        assert_eq!(visible, vec![1]);

        store.set_group_enabled("a", false);
        assert_eq!(store.visible().count(), 0);
        store.set_group_enabled("a", true);
        assert!(!store.is_enabled("a", 0));
        assert_eq!(store.visible().count(), 1);

        store.set_enabled("a", 0, true);
        assert_eq!(store.visible().count(), 2);
    }

    #[test]
    fn test_erase_resets_entry_visibility() {
        let mut store = RenderableStore::new();
        store.get("a", 0);
        store.set_enabled("a", 0, false);
        store.erase("a", 0);
        store.get_t::<DrawnPoints>("a", 0).unwrap();
        assert!(store.is_enabled("a", 0));
    }

    #[test]
    fn test_erase_invalidates_buffer_handles() {
        let mut store = RenderableStore::new();
        let buffer = || DeviceBuffer::from_texels("positions", 1, 1, &[0.0f32]).unwrap();
        assert!(store.attach_buffer("cloud", 0, buffer()).is_none());

        store.get("cloud", 0);
        let handle = store.attach_buffer("cloud", 0, buffer()).unwrap();
        assert!(handle.upgrade().is_ok());
        assert_eq!(store.entry("cloud", 0).unwrap().buffers().len(), 1);

        store.erase("cloud", 0);
        assert!(handle.upgrade().is_err());
    }

    #[test]
    fn test_clear_buffers() {
        let mut store = RenderableStore::new();
        store.get("cloud", 0);
        let colors = DeviceBuffer::from_texels("colors", 1, 1, &[0.0f32]).unwrap();
        let handle = store.attach_buffer("cloud", 0, colors).unwrap();
        store.clear_buffers("cloud", 0);
        assert!(!handle.is_valid());
        assert!(store.contains("cloud", 0));
    }
}
