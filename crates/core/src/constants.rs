//! Protocol constants and sentinels

use crate::types::{AccountIndex, AssetId, BlockHeight, NftIndex, PairIndex};

/// Width in bytes of every encoded field (the signature curve's field element size)
pub const FIELD_SIZE: usize = 32;

/// Raw L1 address length in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Height of every per-account asset tree
pub const ASSET_TREE_HEIGHT: u8 = 16;

/// Height of the global account tree
pub const ACCOUNT_TREE_HEIGHT: u8 = 32;

/// Denominator of pool fee and treasury rates (basis points)
pub const FEE_RATE_BASE: i64 = 10_000;

/// Placeholder L1 address, encoded as an all-zero field
pub const NIL_L1_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// `account_order` of detail rows that do not change an account balance
pub const NIL_ACCOUNT_ORDER: i64 = -1;

/// Block height of a transaction not yet packed into a block
pub const NIL_BLOCK_HEIGHT: BlockHeight = -1;

/// Account index of rows not keyed by an account
pub const NIL_ACCOUNT_INDEX: AccountIndex = -1;

/// Asset id of transactions without a primary asset
pub const NIL_ASSET_ID: AssetId = -1;

/// Nft index of transactions without an nft
pub const NIL_NFT_INDEX: NftIndex = -1;

/// Pair index of transactions without a liquidity pair
pub const NIL_PAIR_INDEX: PairIndex = -1;
