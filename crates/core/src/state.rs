//! State management
//!
//! The global state is a height-32 account tree whose leaves commit to each
//! account's name, key, nonce and asset tree root. Asset trees (height 16)
//! are reached through the [`LazyTreeCache`].

use std::collections::{BTreeMap, BTreeSet};

use l2state_smt::{
    format_hash_hex, MemoryNodeStore, NamespacedNodeStore, SharedMemoryNodeStore, SmtError,
    SparseMerkleTree, Version, EMPTY_HASH,
};
use tracing::debug;

use crate::{
    cache::{LazyTreeCache, TreeHandle},
    config::CoreConfig,
    constants::{ACCOUNT_TREE_HEIGHT, ASSET_TREE_HEIGHT},
    crypto::{keccak256, PublicKey},
    encoding::FieldWriter,
    error::StateError,
    mempool::MempoolTx,
    types::{Account, AccountAsset, AccountIndex, AssetId, AssetType, Hash},
};

/// Per-account asset tree, one store namespace per account
pub type AssetTree = SparseMerkleTree<NamespacedNodeStore>;

/// Leaf of an asset: keccak(balance ‖ lp_amount ‖ locked_amount). Empty
/// assets use the nil leaf.
pub fn asset_leaf(asset: &AccountAsset) -> Result<Hash, StateError> {
    if asset.is_empty() {
        return Ok(EMPTY_HASH);
    }
    let mut writer = FieldWriter::new();
    writer.write_amount(&asset.balance)?;
    writer.write_amount(&asset.lp_amount)?;
    writer.write_amount(&asset.locked_amount)?;
    Ok(writer.hash())
}

/// Leaf of an account: keccak(name ‖ pk.x ‖ pk.y ‖ nonce ‖ asset root)
pub fn account_leaf(account: &Account, asset_root: &Hash) -> Result<Hash, StateError> {
    let mut writer = FieldWriter::new();
    writer.write_account_name(&account.name)?;
    let public_key = PublicKey::from_hex(&account.public_key)?;
    writer.write_public_key(&public_key);
    writer.write_i64(account.nonce);
    let mut bytes = writer.into_bytes();
    bytes.extend_from_slice(asset_root);
    Ok(keccak256(&bytes))
}

fn leaf_key(index: i64, height: u8) -> Result<u64, StateError> {
    u64::try_from(index)
        .map_err(|_| StateError::Tree(SmtError::KeyOutOfRange { key: index as u64, height }))
}

/// Account tree plus the cached asset trees
pub struct StateTrees {
    account_tree: SparseMerkleTree<MemoryNodeStore>,
    asset_trees: LazyTreeCache<AssetTree>,
    asset_store: SharedMemoryNodeStore,
}

impl StateTrees {
    /// Empty in-memory state
    pub fn new(config: &CoreConfig) -> Result<Self, StateError> {
        Self::with_asset_store(config, SharedMemoryNodeStore::new())
    }

    /// State whose asset trees live in `asset_store`. Trees are reopened from
    /// the store on a cache miss, uncommitted writes included.
    pub fn with_asset_store(
        config: &CoreConfig,
        asset_store: SharedMemoryNodeStore,
    ) -> Result<Self, StateError> {
        let options = config.tree_options();
        let account_tree = SparseMerkleTree::with_store(
            ACCOUNT_TREE_HEIGHT,
            EMPTY_HASH,
            MemoryNodeStore::new(),
            options,
        )?;

        let source = asset_store.clone();
        let asset_trees: LazyTreeCache<AssetTree> = LazyTreeCache::new(
            config.asset_tree_cache_size,
            config.max_account_index,
            0,
            move |account_index, _block_height| {
                let namespace = u64::try_from(account_index)?;
                let tree = SparseMerkleTree::with_store(
                    ASSET_TREE_HEIGHT,
                    EMPTY_HASH,
                    source.namespace(namespace),
                    options,
                )?;
                Ok(tree)
            },
        );

        Ok(Self { account_tree, asset_trees, asset_store })
    }

    /// Working root of the account tree
    pub fn state_root(&self) -> Result<Hash, StateError> {
        Ok(self.account_tree.root()?)
    }

    pub fn account_tree(&self) -> &SparseMerkleTree<MemoryNodeStore> {
        &self.account_tree
    }

    pub fn asset_tree(&self, account_index: AccountIndex) -> Result<TreeHandle<AssetTree>, StateError> {
        Ok(self.asset_trees.get(account_index)?)
    }

    pub fn asset_trees(&self) -> &LazyTreeCache<AssetTree> {
        &self.asset_trees
    }

    /// Backing store of the asset trees
    pub fn asset_store(&self) -> &SharedMemoryNodeStore {
        &self.asset_store
    }

    /// Insert or refresh whole accounts, e.g. when loading a snapshot
    pub fn load_accounts<'a>(
        &mut self,
        accounts: impl IntoIterator<Item = &'a Account>,
    ) -> Result<(), StateError> {
        for account in accounts {
            let assets: Vec<AssetId> = account.assets.keys().copied().collect();
            self.write_account(account, &assets)?;
        }
        Ok(())
    }

    /// Apply the general asset rows of a pending record to `accounts` and
    /// the trees, and consume the signer's nonce. Nft and pool rows are
    /// left to their own trees. `accounts` is untouched on failure.
    pub fn apply_tx(
        &mut self,
        accounts: &mut BTreeMap<AccountIndex, Account>,
        tx: &MempoolTx,
    ) -> Result<(), StateError> {
        let mut working: BTreeMap<AccountIndex, Account> = BTreeMap::new();
        let mut changed: BTreeSet<(AccountIndex, AssetId)> = BTreeSet::new();

        for detail in tx.details.iter().filter(|d| d.asset_type == AssetType::General) {
            let delta: AccountAsset = detail.balance_delta.parse()?;
            let account = checkout(&mut working, accounts, detail.account_index)?;
            let next = account.asset(delta.asset_id).apply(&delta).ok_or(
                StateError::NegativeBalance {
                    account_index: detail.account_index,
                    asset_id: delta.asset_id,
                },
            )?;
            account.assets.insert(delta.asset_id, next);
            changed.insert((detail.account_index, delta.asset_id));
        }
        checkout(&mut working, accounts, tx.account_index)?.nonce += 1;

        for (account_index, account) in &working {
            let assets: Vec<AssetId> = changed
                .range((*account_index, AssetId::MIN)..=(*account_index, AssetId::MAX))
                .map(|(_, asset_id)| *asset_id)
                .collect();
            self.write_account(account, &assets)?;
        }
        debug!(
            "Applied mempool tx {} touching {} accounts",
            tx.tx_hash,
            working.len()
        );
        accounts.extend(working);
        Ok(())
    }

    fn write_account(&mut self, account: &Account, assets: &[AssetId]) -> Result<(), StateError> {
        let handle = self.asset_trees.get(account.index)?;
        let mut asset_tree = handle.write();
        for asset_id in assets {
            let leaf = asset_leaf(&account.asset(*asset_id))?;
            asset_tree.set(leaf_key(*asset_id, ASSET_TREE_HEIGHT)?, leaf)?;
        }
        if asset_tree.is_dirty() {
            self.asset_trees.mark_changed(account.index);
        }
        let leaf = account_leaf(account, &asset_tree.root()?)?;
        self.account_tree.set(leaf_key(account.index, ACCOUNT_TREE_HEIGHT)?, leaf)?;
        Ok(())
    }

    /// Commit every changed asset tree, then the account tree
    pub fn commit(&mut self) -> Result<Version, StateError> {
        let changes = self.asset_trees.changes();
        for (_, mut tree) in self.asset_trees.write_many(&changes)? {
            tree.commit()?;
        }
        self.asset_trees.clean_changes();
        let version = self.account_tree.commit()?;
        debug!(
            "Committed state version {} root {} with {} asset trees",
            version,
            format_hash_hex(&self.account_tree.root()?),
            changes.len()
        );
        Ok(version)
    }
}

/// Working copy of an account, cloned from `accounts` on first use
fn checkout<'a>(
    working: &'a mut BTreeMap<AccountIndex, Account>,
    accounts: &BTreeMap<AccountIndex, Account>,
    index: AccountIndex,
) -> Result<&'a mut Account, StateError> {
    if !working.contains_key(&index) {
        let account = accounts.get(&index).ok_or(StateError::NotFound(index))?;
        working.insert(index, account.clone());
    }
    working.get_mut(&index).ok_or(StateError::NotFound(index))
}

impl std::fmt::Debug for StateTrees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTrees")
            .field("version", &self.account_tree.version())
            .field("asset_trees", &self.asset_trees)
            .finish()
    }
}
