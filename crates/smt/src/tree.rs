//! Sparse Merkle Tree implementation

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    hasher::Keccak256Hasher,
    proof::SmtProof,
    store::{MemoryNodeStore, NodeKey, NodeStore},
    Hash, SmtError, Version, EMPTY_HASH,
};

/// Garbage collection tuning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Superseded node entries tolerated before a GC pass runs
    pub gc_threshold: usize,
    /// Number of committed versions (including the latest) kept queryable
    pub retained_versions: u64,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self { gc_threshold: 1024 * 10, retained_versions: 128 }
    }
}

/// Fixed-height sparse Merkle tree over `u64` leaf keys.
///
/// Writes land in a working version (`version() + 1`) until [`commit`] seals
/// them. Unset leaves hash to the nil leaf.
///
/// [`commit`]: SparseMerkleTree::commit
#[derive(Clone, Debug)]
pub struct SparseMerkleTree<S: NodeStore = MemoryNodeStore> {
    height: u8,
    /// Nil hash per depth, `nil_hashes[height]` is the nil leaf
    nil_hashes: Vec<Hash>,
    store: S,
    options: TreeOptions,
    /// Latest committed version
    version: Version,
    dirty: bool,
    /// Committed roots inside the retained window, oldest first
    roots: VecDeque<(Version, Hash)>,
}

impl SparseMerkleTree<MemoryNodeStore> {
    /// Create an empty in-memory tree using the default nil leaf
    pub fn new(height: u8) -> Result<Self, SmtError> {
        Self::with_store(height, EMPTY_HASH, MemoryNodeStore::new(), TreeOptions::default())
    }
}

impl<S: NodeStore> SparseMerkleTree<S> {
    /// Open a tree over `store`. The committed version and retained roots
    /// are restored from the store, and writes past the committed version
    /// become the working version again. An empty store gives the nil root
    /// at version 0.
    pub fn with_store(
        height: u8,
        nil_leaf: Hash,
        store: S,
        options: TreeOptions,
    ) -> Result<Self, SmtError> {
        if height == 0 || height > 64 {
            return Err(SmtError::InvalidHeight(height));
        }
        let options = TreeOptions {
            gc_threshold: options.gc_threshold,
            retained_versions: options.retained_versions.max(1),
        };
        let nil_hashes = Keccak256Hasher::nil_hashes(height, nil_leaf);
        let version = store.latest_version();
        let oldest = version
            .saturating_sub(options.retained_versions - 1)
            .max(store.oldest_version().min(version));

        let mut roots = VecDeque::new();
        for v in oldest..=version {
            let root = store.get(&NodeKey::ROOT, v)?.unwrap_or(nil_hashes[0]);
            roots.push_back((v, root));
        }
        let dirty = store.has_uncommitted();
        if version > 0 || dirty {
            debug!(target: "smt", version, oldest, dirty, "reopened tree over populated store");
        }

        Ok(Self { height, nil_hashes, store, options, version, dirty, roots })
    }

    /// Tree height
    pub fn height(&self) -> u8 {
        self.height
    }

    /// Latest committed version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether uncommitted writes exist
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Nil hash at the root, i.e. the root of an empty tree
    pub fn nil_root(&self) -> Hash {
        self.nil_hashes[0]
    }

    /// Nil leaf hash
    pub fn nil_leaf(&self) -> Hash {
        self.nil_hashes[self.height as usize]
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Oldest committed version still queryable
    pub fn oldest_version(&self) -> Version {
        self.roots.front().map(|(v, _)| *v).unwrap_or(self.version)
    }

    /// Working root, including uncommitted writes
    pub fn root(&self) -> Result<Hash, SmtError> {
        self.node(&NodeKey::ROOT, self.working_version())
    }

    /// Root committed at `version`
    pub fn root_at(&self, version: Version) -> Result<Hash, SmtError> {
        self.check_version(version)?;
        self.roots
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, root)| *root)
            .ok_or(SmtError::VersionNotFound(version))
    }

    /// Set the leaf at `key` to `leaf`
    pub fn set(&mut self, key: u64, leaf: Hash) -> Result<(), SmtError> {
        self.check_key(key)?;
        let version = self.working_version();
        let mut node = NodeKey::new(self.height, key);
        let mut current = leaf;
        self.write(node, version, current)?;

        while node.depth > 0 {
            let sibling = self.node(&node.sibling(), version)?;
            current = if node.index & 1 == 1 {
                Keccak256Hasher::hash_pair(&sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, &sibling)
            };
            node = node.parent();
            self.write(node, version, current)?;
        }

        self.dirty = true;
        Ok(())
    }

    /// Working leaf at `key`
    pub fn get(&self, key: u64) -> Result<Hash, SmtError> {
        self.check_key(key)?;
        self.node(&NodeKey::new(self.height, key), self.working_version())
    }

    /// Leaf at `key` as committed at `version`
    pub fn get_at(&self, key: u64, version: Version) -> Result<Hash, SmtError> {
        self.check_key(key)?;
        self.check_version(version)?;
        self.node(&NodeKey::new(self.height, key), version)
    }

    /// Inclusion proof of the working leaf at `key`
    pub fn prove(&self, key: u64) -> Result<SmtProof, SmtError> {
        self.check_key(key)?;
        let version = self.working_version();
        let mut node = NodeKey::new(self.height, key);
        let leaf = self.node(&node, version)?;
        let mut siblings = Vec::with_capacity(self.height as usize);

        while node.depth > 0 {
            siblings.push(self.node(&node.sibling(), version)?);
            node = node.parent();
        }

        Ok(SmtProof { key, leaf, siblings })
    }

    /// Seal the working version. A clean tree keeps its current version.
    pub fn commit(&mut self) -> Result<Version, SmtError> {
        if !self.dirty {
            return Ok(self.version);
        }
        let root = self.root()?;
        self.store.set_latest_version(self.version + 1)?;
        self.version += 1;
        self.dirty = false;
        self.roots.push_back((self.version, root));

        let oldest = self.version.saturating_sub(self.options.retained_versions - 1);
        while self.roots.front().is_some_and(|(v, _)| *v < oldest) {
            self.roots.pop_front();
        }

        if self.store.superseded() > self.options.gc_threshold {
            let removed = self.store.prune(oldest)?;
            debug!(
                target: "smt",
                version = self.version,
                oldest,
                removed,
                "pruned superseded nodes"
            );
        }
        Ok(self.version)
    }

    /// Return to a committed `version`, discarding everything after it
    pub fn rollback(&mut self, version: Version) -> Result<(), SmtError> {
        self.check_version(version)?;
        self.store.truncate_after(version)?;
        self.store.set_latest_version(version)?;
        self.roots.retain(|(v, _)| *v <= version);
        self.version = version;
        self.dirty = false;
        Ok(())
    }

    /// Discard uncommitted writes
    pub fn reset(&mut self) -> Result<(), SmtError> {
        if self.dirty {
            self.store.truncate_after(self.version)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn working_version(&self) -> Version {
        self.version + 1
    }

    fn node(&self, key: &NodeKey, version: Version) -> Result<Hash, SmtError> {
        Ok(self.store.get(key, version)?.unwrap_or(self.nil_hashes[key.depth as usize]))
    }

    fn write(&mut self, key: NodeKey, version: Version, hash: Hash) -> Result<(), SmtError> {
        self.store.put(key, version, hash)?;
        Ok(())
    }

    fn check_key(&self, key: u64) -> Result<(), SmtError> {
        if self.height < 64 && key >> self.height != 0 {
            return Err(SmtError::KeyOutOfRange { key, height: self.height });
        }
        Ok(())
    }

    fn check_version(&self, version: Version) -> Result<(), SmtError> {
        if version > self.version {
            return Err(SmtError::VersionNotFound(version));
        }
        let oldest = self.oldest_version();
        if version < oldest {
            return Err(SmtError::VersionPruned { requested: version, oldest });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SharedMemoryNodeStore;

    fn leaf(n: u8) -> Hash {
        Keccak256Hasher::hash(&[n])
    }

    #[test]
    fn test_invalid_height() {
        assert_eq!(SparseMerkleTree::new(0).unwrap_err(), SmtError::InvalidHeight(0));
        assert_eq!(SparseMerkleTree::new(65).unwrap_err(), SmtError::InvalidHeight(65));
    }

    #[test]
    fn test_key_out_of_range() {
        let mut tree = SparseMerkleTree::new(4).unwrap();
        assert!(tree.set(15, leaf(1)).is_ok());
        assert_eq!(
            tree.set(16, leaf(1)).unwrap_err(),
            SmtError::KeyOutOfRange { key: 16, height: 4 }
        );
    }

    #[test]
    fn test_root_matches_manual_computation() {
        let mut tree = SparseMerkleTree::new(2).unwrap();
        tree.set(2, leaf(7)).unwrap();

        let nil = EMPTY_HASH;
        let left = Keccak256Hasher::hash_pair(&nil, &nil);
        let right = Keccak256Hasher::hash_pair(&leaf(7), &nil);
        assert_eq!(tree.root().unwrap(), Keccak256Hasher::hash_pair(&left, &right));
    }

    #[test]
    fn test_order_independent_root() {
        let mut a = SparseMerkleTree::new(16).unwrap();
        let mut b = SparseMerkleTree::new(16).unwrap();
        a.set(1, leaf(1)).unwrap();
        a.set(900, leaf(2)).unwrap();
        b.set(900, leaf(2)).unwrap();
        b.set(1, leaf(1)).unwrap();
        assert_eq!(a.root().unwrap(), b.root().unwrap());
    }

    #[test]
    fn test_resetting_leaf_to_nil_restores_empty_root() {
        let mut tree = SparseMerkleTree::new(8).unwrap();
        let empty = tree.root().unwrap();
        tree.set(3, leaf(3)).unwrap();
        assert_ne!(tree.root().unwrap(), empty);
        tree.set(3, EMPTY_HASH).unwrap();
        assert_eq!(tree.root().unwrap(), empty);
    }

    #[test]
    fn test_commit_and_history() {
        let mut tree = SparseMerkleTree::new(8).unwrap();
        let empty = tree.root().unwrap();
        assert_eq!(tree.commit().unwrap(), 0);

        tree.set(1, leaf(1)).unwrap();
        assert_eq!(tree.commit().unwrap(), 1);
        let root1 = tree.root().unwrap();

        tree.set(1, leaf(2)).unwrap();
        assert_eq!(tree.commit().unwrap(), 2);

        assert_eq!(tree.root_at(0).unwrap(), empty);
        assert_eq!(tree.root_at(1).unwrap(), root1);
        assert_eq!(tree.get_at(1, 1).unwrap(), leaf(1));
        assert_eq!(tree.get_at(1, 2).unwrap(), leaf(2));
        assert_eq!(tree.root_at(3).unwrap_err(), SmtError::VersionNotFound(3));
    }

    #[test]
    fn test_uncommitted_writes_are_invisible_to_history() {
        let mut tree = SparseMerkleTree::new(8).unwrap();
        tree.set(5, leaf(5)).unwrap();
        tree.commit().unwrap();
        tree.set(5, leaf(6)).unwrap();

        assert_eq!(tree.get(5).unwrap(), leaf(6));
        assert_eq!(tree.get_at(5, 1).unwrap(), leaf(5));
        assert!(tree.is_dirty());

        tree.reset().unwrap();
        assert!(!tree.is_dirty());
        assert_eq!(tree.get(5).unwrap(), leaf(5));
        assert_eq!(tree.root().unwrap(), tree.root_at(1).unwrap());
    }

    #[test]
    fn test_rollback() {
        let mut tree = SparseMerkleTree::new(8).unwrap();
        tree.set(1, leaf(1)).unwrap();
        tree.commit().unwrap();
        let root1 = tree.root().unwrap();
        tree.set(2, leaf(2)).unwrap();
        tree.commit().unwrap();

        tree.rollback(1).unwrap();
        assert_eq!(tree.version(), 1);
        assert_eq!(tree.root().unwrap(), root1);
        assert_eq!(tree.get(2).unwrap(), EMPTY_HASH);

        // history continues from the restored version
        tree.set(3, leaf(3)).unwrap();
        assert_eq!(tree.commit().unwrap(), 2);
    }

    #[test]
    fn test_gc_prunes_outside_window() {
        let options = TreeOptions { gc_threshold: 0, retained_versions: 2 };
        let mut tree =
            SparseMerkleTree::with_store(4, EMPTY_HASH, MemoryNodeStore::new(), options).unwrap();

        for n in 1..=5u8 {
            tree.set(0, leaf(n)).unwrap();
            tree.commit().unwrap();
        }

        assert_eq!(tree.version(), 5);
        assert_eq!(tree.oldest_version(), 4);
        assert_eq!(tree.get_at(0, 4).unwrap(), leaf(4));
        assert_eq!(tree.get_at(0, 5).unwrap(), leaf(5));
        assert_eq!(
            tree.root_at(3).unwrap_err(),
            SmtError::VersionPruned { requested: 3, oldest: 4 }
        );
        // one leaf path of 5 nodes, two visible versions each
        assert_eq!(tree.store().len(), 10);
    }

    #[test]
    fn test_gc_threshold_delays_pruning() {
        let options = TreeOptions { gc_threshold: 1_000, retained_versions: 1 };
        let mut tree =
            SparseMerkleTree::with_store(4, EMPTY_HASH, MemoryNodeStore::new(), options).unwrap();
        for n in 1..=3u8 {
            tree.set(0, leaf(n)).unwrap();
            tree.commit().unwrap();
        }
        // below the threshold nothing is pruned even though versions left the window
        assert_eq!(tree.store().len(), 15);
        assert_eq!(tree.oldest_version(), 3);
    }

    #[test]
    fn test_reopen_over_populated_store() {
        let backend = SharedMemoryNodeStore::new();
        let options = TreeOptions::default();
        let mut tree = SparseMerkleTree::with_store(8, EMPTY_HASH, backend.namespace(0), options)
            .unwrap();
        tree.set(1, leaf(1)).unwrap();
        tree.commit().unwrap();
        let root1 = tree.root().unwrap();
        tree.set(2, leaf(2)).unwrap();
        tree.commit().unwrap();
        let root2 = tree.root().unwrap();
        drop(tree);

        let mut reopened =
            SparseMerkleTree::with_store(8, EMPTY_HASH, backend.namespace(0), options).unwrap();
        assert_eq!(reopened.version(), 2);
        assert!(!reopened.is_dirty());
        assert_eq!(reopened.root().unwrap(), root2);
        assert_eq!(reopened.root_at(1).unwrap(), root1);
        assert_eq!(reopened.get(2).unwrap(), leaf(2));

        reopened.set(3, leaf(3)).unwrap();
        assert_eq!(reopened.commit().unwrap(), 3);
    }

    #[test]
    fn test_reopen_keeps_working_version() {
        let backend = SharedMemoryNodeStore::new();
        let options = TreeOptions::default();
        let mut tree = SparseMerkleTree::with_store(8, EMPTY_HASH, backend.namespace(0), options)
            .unwrap();
        tree.set(1, leaf(1)).unwrap();
        tree.commit().unwrap();
        tree.set(1, leaf(9)).unwrap();
        let working = tree.root().unwrap();
        drop(tree);

        let mut reopened =
            SparseMerkleTree::with_store(8, EMPTY_HASH, backend.namespace(0), options).unwrap();
        assert!(reopened.is_dirty());
        assert_eq!(reopened.version(), 1);
        assert_eq!(reopened.root().unwrap(), working);
        assert_eq!(reopened.commit().unwrap(), 2);
        assert_eq!(reopened.root_at(2).unwrap(), working);
    }

    #[test]
    fn test_reopen_after_gc_respects_pruned_history() {
        let store = {
            let options = TreeOptions { gc_threshold: 0, retained_versions: 2 };
            let mut tree =
                SparseMerkleTree::with_store(4, EMPTY_HASH, MemoryNodeStore::new(), options)
                    .unwrap();
            for n in 1..=5u8 {
                tree.set(0, leaf(n)).unwrap();
                tree.commit().unwrap();
            }
            tree.store().clone()
        };

        let wider = TreeOptions { gc_threshold: 0, retained_versions: 10 };
        let reopened = SparseMerkleTree::with_store(4, EMPTY_HASH, store, wider).unwrap();
        assert_eq!(reopened.version(), 5);
        assert_eq!(reopened.oldest_version(), 4);
        assert_eq!(reopened.get_at(0, 4).unwrap(), leaf(4));
    }
}
