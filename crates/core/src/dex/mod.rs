//! Account settlement and liquidity pool arithmetic

pub mod account;
pub mod pool;

use thiserror::Error;

use crate::types::{Amount, AssetId, PairIndex};

pub use account::DexAccount;
pub use pool::{
    add_liquidity, isqrt, remove_liquidity, swap, treasury_lp, AddLiquidityOutcome,
    RemoveLiquidityOutcome, SwapOutcome,
};

/// Pool arithmetic failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DexError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("pair {0} has no liquidity")]
    EmptyPool(PairIndex),

    #[error("asset {asset_id} is not traded by pair {pair_index}")]
    AssetMismatch { pair_index: PairIndex, asset_id: AssetId },

    #[error("pair {0} has invalid fee or treasury rate")]
    InvalidRates(PairIndex),

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("output {actual} below minimum {minimum}")]
    BelowMinimum { actual: Amount, minimum: Amount },

    #[error("required {required} exceeds maximum {maximum}")]
    AboveMaximum { required: Amount, maximum: Amount },
}
