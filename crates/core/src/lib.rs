//! l2state core business logic
//!
//! This crate contains the state-transition core of the rollup:
//! - Canonical field encoding and signed message hashes
//! - Transaction verification producing ordered balance-delta details
//! - Pending mempool records and their hand-off to storage
//! - The per-account asset tree cache and the global account tree

pub mod cache;
pub mod cache_keys;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod dex;
pub mod encoding;
pub mod error;
pub mod mempool;
pub mod packed;
pub mod state;
pub mod tx;
pub mod types;
pub mod verifier;

pub use cache::{LazyTreeCache, TreeHandle};
pub use cache_keys::{CacheKey, CacheRegion};
pub use config::CoreConfig;
pub use crypto::{PublicKey, TxSigner};
pub use encoding::FieldWriter;
pub use error::{CacheError, EncodingError, MempoolError, StateError, VerifyError, VerifyStage};
pub use mempool::{
    compute_tx_hash, submit_mempool_tx, AccountCacheInvalidator, MempoolStore, MempoolTx,
    MempoolTxDetail, TxStatus,
};
pub use state::StateTrees;
pub use tx::{TransactionInfo, TxType};
pub use types::*;
pub use verifier::{asset_balance_sums, verify_tx, DeltaMap, StateSnapshot, VerifiedTx, VerifyContext};
