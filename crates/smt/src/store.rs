//! Versioned node storage
//!
//! Every node keeps the list of hashes it held, tagged with the version that
//! wrote them. Reads at version `v` see the newest entry written at or before
//! `v`, which is what makes historical root and leaf queries possible.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{Hash, SmtError, Version};

/// Position of a node: `depth` 0 is the root, `index` is the path prefix at
/// that depth.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeKey {
    /// Distance from the root
    pub depth: u8,
    /// Node index within its level
    pub index: u64,
}

impl NodeKey {
    /// Root node key
    pub const ROOT: Self = Self { depth: 0, index: 0 };

    /// Create a node key
    pub const fn new(depth: u8, index: u64) -> Self {
        Self { depth, index }
    }

    /// Sibling at the same depth
    pub const fn sibling(&self) -> Self {
        Self { depth: self.depth, index: self.index ^ 1 }
    }

    /// Parent one level up
    pub const fn parent(&self) -> Self {
        Self { depth: self.depth - 1, index: self.index >> 1 }
    }
}

/// Storage backend for tree nodes.
///
/// A durable implementation is the only place where tree access may block.
pub trait NodeStore: Send + Sync {
    /// Newest hash recorded for `key` at or before `version`
    fn get(&self, key: &NodeKey, version: Version) -> Result<Option<Hash>, SmtError>;

    /// Record `hash` for `key` at `version`. Returns `true` when an entry from
    /// an older version was superseded.
    fn put(&mut self, key: NodeKey, version: Version, hash: Hash) -> Result<bool, SmtError>;

    /// Drop every entry written after `version`
    fn truncate_after(&mut self, version: Version) -> Result<(), SmtError>;

    /// Drop entries that are no longer visible from `oldest` or any later
    /// version. Returns the number of removed entries.
    fn prune(&mut self, oldest: Version) -> Result<usize, SmtError>;

    /// Latest committed version
    fn latest_version(&self) -> Version;

    /// Mark `version` as the latest committed version
    fn set_latest_version(&mut self, version: Version) -> Result<(), SmtError>;

    /// Oldest version whose reads are still exact after pruning
    fn oldest_version(&self) -> Version;

    /// Whether entries newer than the latest committed version exist
    fn has_uncommitted(&self) -> bool;

    /// Entries hidden behind a newer entry of the same node
    fn superseded(&self) -> usize;

    /// Number of stored node entries across all versions
    fn len(&self) -> usize;

    /// Whether the store holds no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory versioned node store
#[derive(Clone, Debug, Default)]
pub struct MemoryNodeStore {
    nodes: HashMap<NodeKey, Vec<(Version, Hash)>>,
    entries: usize,
    latest: Version,
    oldest: Version,
    /// Newest version any entry was written at
    written: Version,
}

impl MemoryNodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, key: &NodeKey, version: Version) -> Result<Option<Hash>, SmtError> {
        Ok(self.nodes.get(key).and_then(|history| {
            history.iter().rev().find(|(v, _)| *v <= version).map(|(_, hash)| *hash)
        }))
    }

    fn put(&mut self, key: NodeKey, version: Version, hash: Hash) -> Result<bool, SmtError> {
        self.written = self.written.max(version);
        let history = self.nodes.entry(key).or_default();
        match history.last_mut() {
            Some((latest, existing)) if *latest == version => {
                *existing = hash;
                Ok(false)
            }
            Some((latest, _)) if *latest > version => {
                Err(SmtError::VersionConflict { attempted: version, latest: *latest })
            }
            Some(_) => {
                history.push((version, hash));
                self.entries += 1;
                Ok(true)
            }
            None => {
                history.push((version, hash));
                self.entries += 1;
                Ok(false)
            }
        }
    }

    fn truncate_after(&mut self, version: Version) -> Result<(), SmtError> {
        let mut removed = 0;
        self.nodes.retain(|_, history| {
            let before = history.len();
            history.retain(|(v, _)| *v <= version);
            removed += before - history.len();
            !history.is_empty()
        });
        self.entries -= removed;
        self.written = self.written.min(version);
        self.latest = self.latest.min(version);
        Ok(())
    }

    fn prune(&mut self, oldest: Version) -> Result<usize, SmtError> {
        let mut removed = 0;
        for history in self.nodes.values_mut() {
            // keep the newest entry visible at `oldest`, plus everything after it
            let visible = history.iter().rposition(|(v, _)| *v <= oldest);
            if let Some(idx) = visible {
                if idx > 0 {
                    history.drain(..idx);
                    removed += idx;
                }
            }
        }
        self.entries -= removed;
        self.oldest = self.oldest.max(oldest);
        Ok(removed)
    }

    fn latest_version(&self) -> Version {
        self.latest
    }

    fn set_latest_version(&mut self, version: Version) -> Result<(), SmtError> {
        self.latest = version;
        Ok(())
    }

    fn oldest_version(&self) -> Version {
        self.oldest
    }

    fn has_uncommitted(&self) -> bool {
        self.written > self.latest
    }

    fn superseded(&self) -> usize {
        self.entries - self.nodes.len()
    }

    fn len(&self) -> usize {
        self.entries
    }
}

/// In-memory backend holding one [`MemoryNodeStore`] per namespace.
///
/// Trees opened over the same namespace see each other's writes, including
/// uncommitted ones, so a tree dropped before commit can be reopened without
/// losing its working version.
#[derive(Clone, Debug, Default)]
pub struct SharedMemoryNodeStore {
    namespaces: Arc<RwLock<HashMap<u64, MemoryNodeStore>>>,
}

impl SharedMemoryNodeStore {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Store view for the tree identified by `id`
    pub fn namespace(&self, id: u64) -> NamespacedNodeStore {
        NamespacedNodeStore { id, namespaces: Arc::clone(&self.namespaces) }
    }

    /// Number of namespaces holding data
    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One namespace of a [`SharedMemoryNodeStore`]
#[derive(Clone, Debug)]
pub struct NamespacedNodeStore {
    id: u64,
    namespaces: Arc<RwLock<HashMap<u64, MemoryNodeStore>>>,
}

impl NamespacedNodeStore {
    /// Namespace id
    pub const fn id(&self) -> u64 {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&MemoryNodeStore) -> R, default: R) -> R {
        self.namespaces.read().get(&self.id).map_or(default, f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryNodeStore) -> R) -> R {
        f(self.namespaces.write().entry(self.id).or_default())
    }
}

impl NodeStore for NamespacedNodeStore {
    fn get(&self, key: &NodeKey, version: Version) -> Result<Option<Hash>, SmtError> {
        self.read(|store| store.get(key, version), Ok(None))
    }

    fn put(&mut self, key: NodeKey, version: Version, hash: Hash) -> Result<bool, SmtError> {
        self.write(|store| store.put(key, version, hash))
    }

    fn truncate_after(&mut self, version: Version) -> Result<(), SmtError> {
        self.write(|store| store.truncate_after(version))
    }

    fn prune(&mut self, oldest: Version) -> Result<usize, SmtError> {
        self.write(|store| store.prune(oldest))
    }

    fn latest_version(&self) -> Version {
        self.read(MemoryNodeStore::latest_version, 0)
    }

    fn set_latest_version(&mut self, version: Version) -> Result<(), SmtError> {
        self.write(|store| store.set_latest_version(version))
    }

    fn oldest_version(&self) -> Version {
        self.read(MemoryNodeStore::oldest_version, 0)
    }

    fn has_uncommitted(&self) -> bool {
        self.read(MemoryNodeStore::has_uncommitted, false)
    }

    fn superseded(&self) -> usize {
        self.read(MemoryNodeStore::superseded, 0)
    }

    fn len(&self) -> usize {
        self.read(MemoryNodeStore::len, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: NodeKey = NodeKey::new(3, 5);

    #[test]
    fn test_node_key_navigation() {
        assert_eq!(KEY.sibling(), NodeKey::new(3, 4));
        assert_eq!(KEY.parent(), NodeKey::new(2, 2));
        assert_eq!(NodeKey::new(1, 1).parent(), NodeKey::ROOT);
    }

    #[test]
    fn test_versioned_reads() {
        let mut store = MemoryNodeStore::new();
        assert!(!store.put(KEY, 1, [1u8; 32]).unwrap());
        assert!(store.put(KEY, 3, [3u8; 32]).unwrap());

        assert_eq!(store.get(&KEY, 0).unwrap(), None);
        assert_eq!(store.get(&KEY, 1).unwrap(), Some([1u8; 32]));
        assert_eq!(store.get(&KEY, 2).unwrap(), Some([1u8; 32]));
        assert_eq!(store.get(&KEY, 3).unwrap(), Some([3u8; 32]));
        assert_eq!(store.get(&KEY, Version::MAX).unwrap(), Some([3u8; 32]));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_version_overwrites() {
        let mut store = MemoryNodeStore::new();
        store.put(KEY, 2, [1u8; 32]).unwrap();
        assert!(!store.put(KEY, 2, [2u8; 32]).unwrap());
        assert_eq!(store.get(&KEY, 2).unwrap(), Some([2u8; 32]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_write_into_past_rejected() {
        let mut store = MemoryNodeStore::new();
        store.put(KEY, 4, [1u8; 32]).unwrap();
        let err = store.put(KEY, 2, [2u8; 32]).unwrap_err();
        assert_eq!(err, SmtError::VersionConflict { attempted: 2, latest: 4 });
    }

    #[test]
    fn test_truncate_after() {
        let mut store = MemoryNodeStore::new();
        store.put(KEY, 1, [1u8; 32]).unwrap();
        store.put(KEY, 2, [2u8; 32]).unwrap();
        store.put(NodeKey::ROOT, 2, [9u8; 32]).unwrap();

        store.truncate_after(1).unwrap();
        assert_eq!(store.get(&KEY, Version::MAX).unwrap(), Some([1u8; 32]));
        assert_eq!(store.get(&NodeKey::ROOT, Version::MAX).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prune_keeps_visible_entry() {
        let mut store = MemoryNodeStore::new();
        for v in 1..=4u64 {
            store.put(KEY, v, [v as u8; 32]).unwrap();
        }

        let removed = store.prune(3).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.get(&KEY, 3).unwrap(), Some([3u8; 32]));
        assert_eq!(store.get(&KEY, 4).unwrap(), Some([4u8; 32]));
        assert_eq!(store.get(&KEY, 1).unwrap(), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.oldest_version(), 3);
    }

    #[test]
    fn test_uncommitted_tracking() {
        let mut store = MemoryNodeStore::new();
        assert!(!store.has_uncommitted());
        store.put(KEY, 1, [1u8; 32]).unwrap();
        assert!(store.has_uncommitted());
        store.set_latest_version(1).unwrap();
        assert!(!store.has_uncommitted());

        store.put(KEY, 2, [2u8; 32]).unwrap();
        assert_eq!(store.superseded(), 1);
        store.truncate_after(1).unwrap();
        assert!(!store.has_uncommitted());
        assert_eq!(store.superseded(), 0);
        assert_eq!(store.latest_version(), 1);
    }

    #[test]
    fn test_namespaces_share_backend() {
        let backend = SharedMemoryNodeStore::new();
        let mut first = backend.namespace(1);
        let reopened = backend.namespace(1);
        let other = backend.namespace(2);

        first.put(KEY, 1, [7u8; 32]).unwrap();
        assert_eq!(reopened.get(&KEY, 1).unwrap(), Some([7u8; 32]));
        assert!(reopened.has_uncommitted());
        assert_eq!(other.get(&KEY, 1).unwrap(), None);
        assert!(other.is_empty());
        assert_eq!(backend.len(), 1);
    }
}
