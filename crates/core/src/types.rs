//! Common types

use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};

/// 32-byte hash type
pub type Hash = l2state_smt::Hash;

/// Stable rollup account identifier, also the account tree leaf key
pub type AccountIndex = i64;

/// Fungible asset identifier, also the asset tree leaf key
pub type AssetId = i64;

/// Nft identifier
pub type NftIndex = i64;

/// Liquidity pair identifier
pub type PairIndex = i64;

/// L2 block height
pub type BlockHeight = i64;

/// Account nonce
pub type Nonce = i64;

/// Signed 256-bit amount; balances, deltas and pool reserves all use it
pub type Amount = I256;

/// Build an [`Amount`] from a machine integer
pub fn amount_from_i64(value: i64) -> Amount {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Amounts travel as base-10 strings
pub(crate) mod amount_serde {
    use alloy_primitives::I256;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        I256::from_dec_str(&raw).map_err(D::Error::custom)
    }
}

/// Kind of state a detail row touches
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Fungible account asset
    General,
    /// Liquidity pool reserves
    Liquidity,
    /// Nft ownership
    Nft,
}

impl AssetType {
    /// Numeric tag used by persisted records
    pub const fn as_i64(&self) -> i64 {
        match self {
            Self::General => 1,
            Self::Liquidity => 2,
            Self::Nft => 3,
        }
    }
}

/// Per-asset account state, also used as a signed delta
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAsset {
    pub asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub balance: Amount,
    /// Amount reserved by open orders
    #[serde(with = "amount_serde")]
    pub locked_amount: Amount,
    /// Liquidity shares of the pair with the same index
    #[serde(with = "amount_serde")]
    pub lp_amount: Amount,
}

impl AccountAsset {
    /// Empty asset
    pub fn new(asset_id: AssetId) -> Self {
        Self::with_amounts(asset_id, Amount::ZERO, Amount::ZERO, Amount::ZERO)
    }

    /// Asset with explicit amounts
    pub const fn with_amounts(
        asset_id: AssetId,
        balance: Amount,
        locked_amount: Amount,
        lp_amount: Amount,
    ) -> Self {
        Self { asset_id, balance, locked_amount, lp_amount }
    }

    /// Delta touching only the balance
    pub fn balance_delta(asset_id: AssetId, balance: Amount) -> Self {
        Self::with_amounts(asset_id, balance, Amount::ZERO, Amount::ZERO)
    }

    /// Delta touching only the lp shares
    pub fn lp_delta(asset_id: AssetId, lp_amount: Amount) -> Self {
        Self::with_amounts(asset_id, Amount::ZERO, Amount::ZERO, lp_amount)
    }

    /// All amounts are zero
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.locked_amount.is_zero() && self.lp_amount.is_zero()
    }

    /// Add a delta. `None` on overflow or if any amount would turn negative.
    pub fn apply(&self, delta: &Self) -> Option<Self> {
        let next = Self {
            asset_id: self.asset_id,
            balance: self.balance.checked_add(delta.balance)?,
            locked_amount: self.locked_amount.checked_add(delta.locked_amount)?,
            lp_amount: self.lp_amount.checked_add(delta.lp_amount)?,
        };
        let negative = next.balance.is_negative()
            || next.locked_amount.is_negative()
            || next.lp_amount.is_negative();
        (!negative).then_some(next)
    }
}

impl fmt::Display for AccountAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for AccountAsset {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Account state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub index: AccountIndex,
    pub name: String,
    /// Hex-encoded public key, x then y coordinate
    pub public_key: String,
    pub nonce: Nonce,
    pub assets: BTreeMap<AssetId, AccountAsset>,
}

impl Account {
    /// Account with no assets and nonce zero
    pub fn new(index: AccountIndex, name: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            public_key: public_key.into(),
            nonce: 0,
            assets: BTreeMap::new(),
        }
    }

    /// Builder: set the nonce
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = nonce;
        self
    }

    /// Builder: insert an asset
    pub fn with_asset(mut self, asset: AccountAsset) -> Self {
        self.assets.insert(asset.asset_id, asset);
        self
    }

    /// Builder: set a plain balance
    pub fn with_balance(self, asset_id: AssetId, balance: Amount) -> Self {
        self.with_asset(AccountAsset::balance_delta(asset_id, balance))
    }

    /// Asset state, empty if the account never held it
    pub fn asset(&self, asset_id: AssetId) -> AccountAsset {
        self.assets.get(&asset_id).cloned().unwrap_or_else(|| AccountAsset::new(asset_id))
    }

    /// Balance of `asset_id`
    pub fn balance(&self, asset_id: AssetId) -> Amount {
        self.assets.get(&asset_id).map(|a| a.balance).unwrap_or(Amount::ZERO)
    }
}

/// Nft snapshot. Ownership changes produce a new snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftInfo {
    pub nft_index: NftIndex,
    pub creator_account_index: AccountIndex,
    pub owner_account_index: AccountIndex,
    pub content_hash: String,
    pub l1_token_id: String,
    pub l1_address: String,
    pub creator_treasury_rate: i64,
    pub collection_id: i64,
}

impl NftInfo {
    /// Copy of this snapshot owned by `owner`
    pub fn with_owner(&self, owner: AccountIndex) -> Self {
        Self { owner_account_index: owner, ..self.clone() }
    }
}

impl fmt::Display for NftInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for NftInfo {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Constant-product liquidity pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityInfo {
    pub pair_index: PairIndex,
    pub asset_a_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_a: Amount,
    pub asset_b_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_b: Amount,
    /// Outstanding lp shares
    #[serde(with = "amount_serde")]
    pub lp_amount: Amount,
    /// Reserve product after the last add or remove
    #[serde(with = "amount_serde")]
    pub k_last: Amount,
    /// Swap fee in basis points
    pub fee_rate: i64,
    pub treasury_account_index: AccountIndex,
    /// Share of the fee minted to the treasury, in basis points
    pub treasury_rate: i64,
}

/// Signed change of a pool, `k_last` is the new absolute value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityDelta {
    pub pair_index: PairIndex,
    pub asset_a_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_a_delta: Amount,
    pub asset_b_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_b_delta: Amount,
    #[serde(with = "amount_serde")]
    pub lp_delta: Amount,
    #[serde(with = "amount_serde")]
    pub k_last: Amount,
    pub fee_rate: i64,
    pub treasury_account_index: AccountIndex,
    pub treasury_rate: i64,
}

impl LiquidityDelta {
    /// Delta of `asset_id` carried by this row, zero if the pool does not hold it
    pub fn asset_delta(&self, asset_id: AssetId) -> Amount {
        let mut total = Amount::ZERO;
        if self.asset_a_id == asset_id {
            total += self.asset_a_delta;
        }
        if self.asset_b_id == asset_id {
            total += self.asset_b_delta;
        }
        total
    }
}

impl fmt::Display for LiquidityDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for LiquidityDelta {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_from_i64() {
        assert_eq!(amount_from_i64(-10).to_string(), "-10");
        assert_eq!(amount_from_i64(i64::MIN).to_string(), i64::MIN.to_string());
        assert!(amount_from_i64(0).is_zero());
    }

    #[test]
    fn test_account_asset_string_form() {
        let delta = AccountAsset::balance_delta(3, amount_from_i64(-10));
        let text = delta.to_string();
        assert_eq!(
            text,
            r#"{"asset_id":3,"balance":"-10","locked_amount":"0","lp_amount":"0"}"#
        );
        assert_eq!(text.parse::<AccountAsset>().unwrap(), delta);
    }

    #[test]
    fn test_apply_rejects_negative_result() {
        let asset = AccountAsset::balance_delta(0, amount_from_i64(5));
        let debit = AccountAsset::balance_delta(0, amount_from_i64(-10));
        assert!(asset.apply(&debit).is_none());

        let credit = AccountAsset::with_amounts(0, amount_from_i64(1), Amount::ZERO, amount_from_i64(2));
        let next = asset.apply(&credit).unwrap();
        assert_eq!(next.balance, amount_from_i64(6));
        assert_eq!(next.lp_amount, amount_from_i64(2));
    }

    #[test]
    fn test_nft_with_owner_keeps_other_fields() {
        let nft = NftInfo {
            nft_index: 9,
            creator_account_index: 1,
            owner_account_index: 2,
            content_hash: "ab".repeat(32),
            l1_token_id: "0".into(),
            l1_address: crate::constants::NIL_L1_ADDRESS.into(),
            creator_treasury_rate: 25,
            collection_id: 4,
        };
        let moved = nft.with_owner(7);
        assert_eq!(moved.owner_account_index, 7);
        assert_eq!(nft.owner_account_index, 2);
        assert_eq!(moved, NftInfo { owner_account_index: 7, ..nft });
    }

    #[test]
    fn test_account_missing_asset_is_empty() {
        let account = Account::new(1, "alice.legend", "").with_balance(0, amount_from_i64(100));
        assert_eq!(account.balance(0), amount_from_i64(100));
        assert!(account.balance(5).is_zero());
        assert!(account.asset(5).is_empty());
    }

    #[test]
    fn test_liquidity_asset_delta() {
        let delta = LiquidityDelta {
            pair_index: 2,
            asset_a_id: 1,
            asset_a_delta: amount_from_i64(100),
            asset_b_id: 2,
            asset_b_delta: amount_from_i64(-40),
            lp_delta: amount_from_i64(7),
            k_last: Amount::ZERO,
            fee_rate: 30,
            treasury_account_index: 9,
            treasury_rate: 5,
        };
        assert_eq!(delta.asset_delta(1), amount_from_i64(100));
        assert_eq!(delta.asset_delta(2), amount_from_i64(-40));
        assert!(delta.asset_delta(3).is_zero());

        let same_asset = LiquidityDelta { asset_b_id: 1, ..delta };
        assert_eq!(same_asset.asset_delta(1), amount_from_i64(60));
    }
}
