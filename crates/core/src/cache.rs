//! Lazily built, LRU bounded per-account tree cache
//!
//! Trees are built on first access by a factory and shared as
//! [`TreeHandle`]s. Only entries nobody else holds a handle to are evicted,
//! so an account never has two live trees. While every entry is held the
//! cache grows past its capacity and shrinks back on later misses.

use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use lru::LruCache;
use parking_lot::{lock_api::ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use tracing::{debug, warn};

use crate::{
    error::CacheError,
    types::{AccountIndex, BlockHeight},
};

/// Shared handle to a cached tree. Writers serialize per account.
pub type TreeHandle<T> = Arc<RwLock<T>>;

/// Exclusive access to one tree, independent of the cache lock
pub type TreeWriteGuard<T> = ArcRwLockWriteGuard<RawRwLock, T>;

/// Builds the tree of an account as of a block height
pub type TreeFactory<T> =
    Box<dyn Fn(AccountIndex, BlockHeight) -> anyhow::Result<T> + Send + Sync>;

/// Per-account tree cache
pub struct LazyTreeCache<T> {
    trees: Mutex<LruCache<AccountIndex, TreeHandle<T>>>,
    capacity: NonZeroUsize,
    /// Accounts with uncommitted tree changes
    changes: Mutex<BTreeSet<AccountIndex>>,
    max_index: AccountIndex,
    block_height: AtomicI64,
    factory: TreeFactory<T>,
}

impl<T> LazyTreeCache<T> {
    /// Cache holding at most `capacity` trees for accounts `0..=max_index`
    pub fn new<F>(
        capacity: usize,
        max_index: AccountIndex,
        block_height: BlockHeight,
        factory: F,
    ) -> Self
    where
        F: Fn(AccountIndex, BlockHeight) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            trees: Mutex::new(LruCache::unbounded()),
            capacity,
            changes: Mutex::new(BTreeSet::new()),
            max_index,
            block_height: AtomicI64::new(block_height),
            factory: Box::new(factory),
        }
    }

    /// Tree of `index`, built through the factory on a miss
    pub fn get(&self, index: AccountIndex) -> Result<TreeHandle<T>, CacheError> {
        if !(0..=self.max_index).contains(&index) {
            return Err(CacheError::NotFound(index));
        }

        let mut trees = self.trees.lock();
        if let Some(handle) = trees.get(&index) {
            return Ok(Arc::clone(handle));
        }

        // Built under the cache lock so two misses never race on one account
        let block_height = self.block_height();
        let tree = (self.factory)(index, block_height)
            .map_err(|source| CacheError::Factory { account_index: index, source })?;
        let handle = Arc::new(RwLock::new(tree));
        debug!("Built asset tree for account {} at height {}", index, block_height);

        trees.put(index, Arc::clone(&handle));
        self.evict(&mut trees);
        Ok(handle)
    }

    /// Drop least recently used entries until the cache fits its capacity,
    /// skipping entries whose handle is held elsewhere.
    fn evict(&self, trees: &mut LruCache<AccountIndex, TreeHandle<T>>) {
        while trees.len() > self.capacity.get() {
            // `iter` runs from most to least recently used
            let Some(victim) = trees
                .iter()
                .rev()
                .find(|(_, handle)| Arc::strong_count(handle) == 1)
                .map(|(index, _)| *index)
            else {
                warn!(
                    "All {} cached trees are in use, cache exceeds capacity {}",
                    trees.len(),
                    self.capacity
                );
                return;
            };
            trees.pop(&victim);
            if self.changes.lock().contains(&victim) {
                debug!("Evicted asset tree of account {} with uncommitted changes", victim);
            } else {
                debug!("Evicted asset tree of account {}", victim);
            }
        }
    }

    /// Write guards for several accounts, acquired in ascending index order
    pub fn write_many(
        &self,
        indices: &[AccountIndex],
    ) -> Result<Vec<(AccountIndex, TreeWriteGuard<T>)>, CacheError> {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let handles = indices
            .into_iter()
            .map(|index| Ok((index, self.get(index)?)))
            .collect::<Result<Vec<_>, CacheError>>()?;
        Ok(handles.into_iter().map(|(index, handle)| (index, handle.write_arc())).collect())
    }

    /// Record that the tree of `index` has uncommitted changes
    pub fn mark_changed(&self, index: AccountIndex) {
        self.changes.lock().insert(index);
    }

    /// Accounts with uncommitted changes, ascending
    pub fn changes(&self) -> Vec<AccountIndex> {
        self.changes.lock().iter().copied().collect()
    }

    pub fn clean_changes(&self) {
        self.changes.lock().clear();
    }

    pub fn block_height(&self) -> BlockHeight {
        self.block_height.load(Ordering::Acquire)
    }

    /// Height passed to the factory for trees built from now on
    pub fn set_block_height(&self, block_height: BlockHeight) {
        self.block_height.store(block_height, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.trees.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Whether `index` is cached, without touching its recency
    pub fn contains(&self, index: AccountIndex) -> bool {
        self.trees.lock().contains(&index)
    }
}

impl<T> std::fmt::Debug for LazyTreeCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTreeCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("max_index", &self.max_index)
            .field("block_height", &self.block_height())
            .finish()
    }
}
