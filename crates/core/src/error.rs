//! Error types

use l2state_smt::SmtError;
use thiserror::Error;

use crate::types::{AccountIndex, AssetId};

/// Canonical encoding failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("value does not fit in a field element")]
    EncodingOverflow,

    #[error("invalid numeric string: {0:?}")]
    InvalidNumericString(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid 32-byte digest: {0:?}")]
    InvalidDigest(String),

    #[error("amount {0} cannot be packed")]
    InvalidPackedAmount(String),
}

/// Stage of the verification state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyStage {
    /// Transaction parsed, nothing checked yet
    Received,
    /// Existence, nonce, parameter and balance checks passed
    ValidatedPreconditions,
    /// Message hash computed
    HashComputed,
    /// Signature checked against the signer key
    SignatureVerified,
    /// Detail rows emitted, transaction accepted
    DeltasEmitted,
}

/// Rejection reasons. Every variant is terminal for the transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: i64, actual: i64 },

    #[error("invalid gas account: expected {expected}, got {actual}")]
    InvalidGasAccount { expected: AccountIndex, actual: AccountIndex },

    #[error("transaction expired at {expired_at}, now {now}")]
    Expired { expired_at: i64, now: i64 },

    #[error("insufficient balance of asset {asset_id} in account {account_index}")]
    InsufficientBalance { account_index: AccountIndex, asset_id: AssetId },

    #[error("unable to compute message hash: {0}")]
    HashError(#[source] EncodingError),

    #[error("invalid signature")]
    InvalidSignature,
}

impl VerifyError {
    /// Last stage reached before the rejection
    pub const fn stage(&self) -> VerifyStage {
        match self {
            Self::InvalidParams(_)
            | Self::InvalidNonce { .. }
            | Self::InvalidGasAccount { .. }
            | Self::Expired { .. }
            | Self::InsufficientBalance { .. } => VerifyStage::Received,
            Self::HashError(_) => VerifyStage::ValidatedPreconditions,
            Self::InvalidSignature => VerifyStage::HashComputed,
        }
    }
}

/// Tree cache failures
#[derive(Debug, Error)]
pub enum CacheError {
    /// Account index outside the cache's key space
    #[error("account {0} not found")]
    NotFound(AccountIndex),

    /// The factory could not build the tree; no substitute tree is used
    #[error("unable to build tree for account {account_index}")]
    Factory {
        account_index: AccountIndex,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while applying details to the state trees
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Tree(#[from] SmtError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("account {0} not found")]
    NotFound(AccountIndex),

    #[error("malformed balance delta: {0}")]
    MalformedDelta(#[from] serde_json::Error),

    #[error("balance of asset {asset_id} in account {account_index} would become negative")]
    NegativeBalance { account_index: AccountIndex, asset_id: AssetId },
}

/// Failures while handing a pending transaction to its collaborators
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("unable to invalidate account cache")]
    Invalidate(#[source] anyhow::Error),

    #[error("unable to store mempool tx {tx_hash}")]
    Store {
        tx_hash: String,
        #[source]
        source: anyhow::Error,
    },
}
