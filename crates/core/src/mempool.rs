//! Pending transaction records
//!
//! A [`MempoolTx`] is built from an accepted [`VerifiedTx`] and handed to
//! the store only after every touched account's cache entry is invalidated.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cache_keys::CacheKey,
    constants::{NIL_ACCOUNT_INDEX, NIL_BLOCK_HEIGHT},
    crypto::keccak256,
    error::MempoolError,
    tx::TxType,
    types::{amount_serde, AccountIndex, Amount, AssetId, AssetType, BlockHeight, NftIndex, Nonce, PairIndex},
    verifier::VerifiedTx,
};

/// One state change of a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolTxDetail {
    /// Asset id, nft index or pair index depending on `asset_type`
    pub asset_id: AssetId,
    pub asset_type: AssetType,
    pub account_index: AccountIndex,
    pub account_name: String,
    /// String form of the matching delta record
    pub balance_delta: String,
    /// Position within the transaction
    pub order: i64,
    /// Position of the touched account, sentinel for non-account rows
    pub account_order: i64,
}

/// Lifecycle of a mempool record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Executed,
    Packed,
    Committed,
    Failed,
}

/// Accepted transaction waiting for a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolTx {
    pub tx_hash: String,
    pub tx_type: TxType,
    pub gas_fee_asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub gas_fee: Amount,
    pub nft_index: NftIndex,
    pub pair_index: PairIndex,
    pub asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub tx_amount: Amount,
    pub native_address: String,
    pub tx_info: String,
    pub memo: String,
    pub account_index: AccountIndex,
    pub nonce: Nonce,
    pub expired_at: i64,
    pub l2_block_height: BlockHeight,
    pub status: TxStatus,
    pub details: Vec<MempoolTxDetail>,
}

/// Transaction identifier: base64 of the Keccak-256 of the raw payload
pub fn compute_tx_hash(raw_tx_info: &str) -> String {
    STANDARD.encode(keccak256(raw_tx_info.as_bytes()))
}

impl MempoolTx {
    /// Pending record for an accepted transaction
    pub fn from_verified(verified: VerifiedTx, raw_tx_info: String, memo: String) -> Self {
        Self {
            tx_hash: compute_tx_hash(&raw_tx_info),
            tx_type: verified.tx_type,
            gas_fee_asset_id: verified.gas_fee_asset_id,
            gas_fee: verified.gas_fee,
            nft_index: verified.nft_index,
            pair_index: verified.pair_index,
            asset_id: verified.asset_id,
            tx_amount: verified.tx_amount,
            native_address: verified.native_address,
            tx_info: raw_tx_info,
            memo,
            account_index: verified.account_index,
            nonce: verified.nonce,
            expired_at: verified.expired_at,
            l2_block_height: NIL_BLOCK_HEIGHT,
            status: TxStatus::Pending,
            details: verified.details,
        }
    }

    /// Distinct accounts touched by the details, ascending
    pub fn touched_accounts(&self) -> Vec<AccountIndex> {
        let mut accounts: Vec<_> = self
            .details
            .iter()
            .map(|d| d.account_index)
            .filter(|index| *index != NIL_ACCOUNT_INDEX)
            .collect();
        accounts.sort_unstable();
        accounts.dedup();
        accounts
    }
}

/// Durable mempool storage
pub trait MempoolStore {
    fn create_mempool_txs(&self, txs: &[MempoolTx]) -> anyhow::Result<()>;
}

/// Account cache shared with readers
pub trait AccountCacheInvalidator {
    fn invalidate(&self, key: &CacheKey) -> anyhow::Result<()>;
}

/// Invalidate the cache of every touched account, then store the record
pub fn submit_mempool_tx(
    tx: MempoolTx,
    cache: &impl AccountCacheInvalidator,
    store: &impl MempoolStore,
) -> Result<String, MempoolError> {
    for account_index in tx.touched_accounts() {
        cache.invalidate(&CacheKey::account(account_index)).map_err(MempoolError::Invalidate)?;
    }
    let tx_hash = tx.tx_hash.clone();
    store
        .create_mempool_txs(std::slice::from_ref(&tx))
        .map_err(|source| MempoolError::Store { tx_hash: tx_hash.clone(), source })?;
    debug!("Stored mempool tx {} with {} details", tx_hash, tx.details.len());
    Ok(tx_hash)
}
