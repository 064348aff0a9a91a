//! Transaction verification
//!
//! [`verify_tx`] checks a signed transaction against an immutable snapshot
//! and returns the ordered detail rows describing its effect. It never
//! mutates the snapshot. Every transaction type runs the same pipeline:
//!
//! 1. signer lookup and nonce
//! 2. gas account, expiry and gas fee
//! 3. existence of every other referenced account or resource, type
//!    specific parameters
//! 4. accumulated deltas and balance sufficiency
//! 5. message hash and signature
//! 6. detail emission in the type's fixed order

mod liquidity;
mod nft;
mod swap;
mod transfer;
mod withdraw;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace, warn};

use crate::{
    constants::{NIL_ACCOUNT_INDEX, NIL_ACCOUNT_ORDER},
    crypto::PublicKey,
    dex::{DexAccount, DexError},
    encoding::account_name_hash,
    error::{VerifyError, VerifyStage},
    mempool::MempoolTxDetail,
    tx::{TransactionInfo, TxType},
    types::{
        Account, AccountAsset, AccountIndex, Amount, AssetId, AssetType, LiquidityDelta,
        LiquidityInfo, NftIndex, NftInfo, Nonce, PairIndex,
    },
};

/// Verification environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyContext {
    /// Current time in unix milliseconds
    pub now: i64,
    /// Account every gas fee must be paid to
    pub gas_account_index: AccountIndex,
}

/// Read-only view of the state a transaction is verified against
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    pub accounts: HashMap<AccountIndex, Account>,
    pub nfts: HashMap<NftIndex, NftInfo>,
    pub pairs: HashMap<PairIndex, LiquidityInfo>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.insert(account.index, account);
        self
    }

    pub fn with_nft(mut self, nft: NftInfo) -> Self {
        self.nfts.insert(nft.nft_index, nft);
        self
    }

    pub fn with_pair(mut self, pair: LiquidityInfo) -> Self {
        self.pairs.insert(pair.pair_index, pair);
        self
    }

    pub fn account(&self, index: AccountIndex) -> Result<&Account, VerifyError> {
        self.accounts
            .get(&index)
            .ok_or_else(|| VerifyError::InvalidParams(format!("account {index} not found")))
    }

    pub fn nft(&self, index: NftIndex) -> Result<&NftInfo, VerifyError> {
        self.nfts
            .get(&index)
            .ok_or_else(|| VerifyError::InvalidParams(format!("nft {index} not found")))
    }

    pub fn pair(&self, index: PairIndex) -> Result<&LiquidityInfo, VerifyError> {
        self.pairs
            .get(&index)
            .ok_or_else(|| VerifyError::InvalidParams(format!("pair {index} not found")))
    }
}

/// Accepted transaction with the fields a mempool record needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTx {
    pub tx_info: TransactionInfo,
    pub tx_type: TxType,
    /// Signer
    pub account_index: AccountIndex,
    pub nonce: Nonce,
    pub expired_at: i64,
    pub gas_fee_asset_id: AssetId,
    pub gas_fee: Amount,
    pub asset_id: AssetId,
    pub nft_index: NftIndex,
    pub pair_index: PairIndex,
    pub tx_amount: Amount,
    /// L1 address of withdrawals, empty otherwise
    pub native_address: String,
    pub details: Vec<MempoolTxDetail>,
}

/// Type specific part of a [`VerifiedTx`]
#[derive(Clone, Debug)]
pub(crate) struct Verified {
    asset_id: AssetId,
    nft_index: NftIndex,
    pair_index: PairIndex,
    tx_amount: Amount,
    native_address: String,
    details: Vec<MempoolTxDetail>,
}

/// Verify `tx` against `snapshot`
pub fn verify_tx(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    tx: &TransactionInfo,
) -> Result<VerifiedTx, VerifyError> {
    let result = match tx {
        TransactionInfo::Transfer(inner) => transfer::verify(snapshot, ctx, tx, inner),
        TransactionInfo::TransferNft(inner) => nft::verify_transfer_nft(snapshot, ctx, tx, inner),
        TransactionInfo::MintNft(inner) => nft::verify_mint_nft(snapshot, ctx, tx, inner),
        TransactionInfo::Withdraw(inner) => withdraw::verify(snapshot, ctx, tx, inner),
        TransactionInfo::AddLiquidity(inner) => {
            liquidity::verify_add_liquidity(snapshot, ctx, tx, inner)
        }
        TransactionInfo::RemoveLiquidity(inner) => {
            liquidity::verify_remove_liquidity(snapshot, ctx, tx, inner)
        }
        TransactionInfo::Swap(inner) => swap::verify(snapshot, ctx, tx, inner),
    };

    let verified = match result {
        Ok(verified) => verified,
        Err(err) => {
            warn!(
                "Rejected {:?} from account {} at stage {:?}: {}",
                tx.tx_type(),
                tx.signer_account_index(),
                err.stage(),
                err
            );
            return Err(err);
        }
    };
    debug!(
        "Verified {:?} from account {}, {} details, stage {:?}",
        tx.tx_type(),
        tx.signer_account_index(),
        verified.details.len(),
        VerifyStage::DeltasEmitted
    );

    let gas = tx.gas();
    Ok(VerifiedTx {
        tx_info: tx.clone(),
        tx_type: tx.tx_type(),
        account_index: tx.signer_account_index(),
        nonce: tx.nonce(),
        expired_at: tx.expired_at(),
        gas_fee_asset_id: gas.gas_fee_asset_id,
        gas_fee: gas.gas_fee_asset_amount,
        asset_id: verified.asset_id,
        nft_index: verified.nft_index,
        pair_index: verified.pair_index,
        tx_amount: verified.tx_amount,
        native_address: verified.native_address,
        details: verified.details,
    })
}

/// Checks every transaction type runs first. Returns the signer and the gas
/// account.
fn check_common<'a>(
    snapshot: &'a StateSnapshot,
    ctx: &VerifyContext,
    tx: &TransactionInfo,
) -> Result<(&'a Account, &'a Account), VerifyError> {
    let signer = snapshot.account(tx.signer_account_index())?;
    DexAccount::check_nonce(signer, tx.nonce())?;

    let gas = tx.gas();
    if gas.gas_account_index != ctx.gas_account_index {
        return Err(VerifyError::InvalidGasAccount {
            expected: ctx.gas_account_index,
            actual: gas.gas_account_index,
        });
    }
    if tx.expired_at() < ctx.now {
        return Err(VerifyError::Expired { expired_at: tx.expired_at(), now: ctx.now });
    }
    if gas.gas_fee_asset_amount.is_negative() {
        return Err(VerifyError::InvalidParams("negative gas fee".into()));
    }
    let gas_account = snapshot.account(gas.gas_account_index)?;
    Ok((signer, gas_account))
}

fn check_non_negative(name: &str, amount: &Amount) -> Result<(), VerifyError> {
    if amount.is_negative() {
        return Err(VerifyError::InvalidParams(format!("negative {name}")));
    }
    Ok(())
}

/// The signed receiver name digest must match the receiver account
fn check_name_hash(receiver: &Account, signed: &str) -> Result<(), VerifyError> {
    let expected = account_name_hash(&receiver.name)
        .map_err(|err| VerifyError::InvalidParams(err.to_string()))?;
    let signed = signed.strip_prefix("0x").unwrap_or(signed);
    if !expected.eq_ignore_ascii_case(signed) {
        return Err(VerifyError::InvalidParams(format!(
            "name hash does not match account {}",
            receiver.index
        )));
    }
    Ok(())
}

fn check_signature(tx: &TransactionInfo, signer: &Account) -> Result<(), VerifyError> {
    let hash = tx.msg_hash().map_err(VerifyError::HashError)?;
    let public_key =
        PublicKey::from_hex(&signer.public_key).map_err(|_| VerifyError::InvalidSignature)?;
    if !public_key.verify(&hash, tx.signature()) {
        return Err(VerifyError::InvalidSignature);
    }
    trace!(
        "Signature of account {} checked, stage {:?}",
        signer.index,
        VerifyStage::SignatureVerified
    );
    Ok(())
}

fn dex_error(err: DexError) -> VerifyError {
    VerifyError::InvalidParams(err.to_string())
}

/// Per account, per asset signed deltas of one transaction. Deltas for the
/// same slot accumulate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaMap {
    deltas: BTreeMap<AccountIndex, BTreeMap<AssetId, AccountAsset>>,
}

impl DeltaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `delta` into the account's slot for `delta.asset_id`
    pub fn add(&mut self, account_index: AccountIndex, delta: &AccountAsset) -> Result<(), VerifyError> {
        let overflow = || VerifyError::InvalidParams("delta overflow".into());
        let slot = self
            .deltas
            .entry(account_index)
            .or_default()
            .entry(delta.asset_id)
            .or_insert_with(|| AccountAsset::new(delta.asset_id));
        slot.balance = slot.balance.checked_add(delta.balance).ok_or_else(overflow)?;
        slot.locked_amount = slot.locked_amount.checked_add(delta.locked_amount).ok_or_else(overflow)?;
        slot.lp_amount = slot.lp_amount.checked_add(delta.lp_amount).ok_or_else(overflow)?;
        Ok(())
    }

    pub fn get(&self, account_index: AccountIndex, asset_id: AssetId) -> Option<&AccountAsset> {
        self.deltas.get(&account_index)?.get(&asset_id)
    }

    /// Every touched account must stay non-negative once all deltas apply
    pub fn check_sufficient(&self, snapshot: &StateSnapshot) -> Result<(), VerifyError> {
        for (account_index, deltas) in &self.deltas {
            let account = snapshot.account(*account_index)?;
            DexAccount::settle(account, deltas.values())?;
        }
        Ok(())
    }
}

/// Emits detail rows with their `order` and `account_order`
#[derive(Debug)]
pub(crate) struct DetailBuilder {
    details: Vec<MempoolTxDetail>,
    account_order: i64,
}

impl DetailBuilder {
    fn new() -> Self {
        Self { details: Vec::new(), account_order: NIL_ACCOUNT_ORDER }
    }

    /// Following asset rows belong to the next account
    fn begin_account(&mut self) -> &mut Self {
        self.account_order += 1;
        self
    }

    fn next_order(&self) -> i64 {
        self.details.len() as i64
    }

    fn asset(&mut self, account: &Account, delta: &AccountAsset) -> &mut Self {
        let row = MempoolTxDetail {
            asset_id: delta.asset_id,
            asset_type: AssetType::General,
            account_index: account.index,
            account_name: account.name.clone(),
            balance_delta: delta.to_string(),
            order: self.next_order(),
            account_order: self.account_order,
        };
        self.details.push(row);
        self
    }

    fn nft(&mut self, owner: &Account, nft: &NftInfo) -> &mut Self {
        let row = MempoolTxDetail {
            asset_id: nft.nft_index,
            asset_type: AssetType::Nft,
            account_index: owner.index,
            account_name: owner.name.clone(),
            balance_delta: nft.to_string(),
            order: self.next_order(),
            account_order: NIL_ACCOUNT_ORDER,
        };
        self.details.push(row);
        self
    }

    fn pool(&mut self, delta: &LiquidityDelta) -> &mut Self {
        let row = MempoolTxDetail {
            asset_id: delta.pair_index,
            asset_type: AssetType::Liquidity,
            account_index: NIL_ACCOUNT_INDEX,
            account_name: String::new(),
            balance_delta: delta.to_string(),
            order: self.next_order(),
            account_order: NIL_ACCOUNT_ORDER,
        };
        self.details.push(row);
        self
    }

    fn finish(self) -> Vec<MempoolTxDetail> {
        self.details
    }
}

/// Net balance change per asset over General and Liquidity rows.
/// Zero everywhere for transactions that neither mint nor burn.
pub fn asset_balance_sums(
    details: &[MempoolTxDetail],
) -> Result<BTreeMap<AssetId, Amount>, serde_json::Error> {
    let mut sums: BTreeMap<AssetId, Amount> = BTreeMap::new();
    for detail in details {
        match detail.asset_type {
            AssetType::General => {
                let delta: AccountAsset = detail.balance_delta.parse()?;
                *sums.entry(delta.asset_id).or_insert(Amount::ZERO) += delta.balance;
            }
            AssetType::Liquidity => {
                let delta: LiquidityDelta = detail.balance_delta.parse()?;
                let assets: BTreeSet<AssetId> = [delta.asset_a_id, delta.asset_b_id].into();
                for asset_id in assets {
                    *sums.entry(asset_id).or_insert(Amount::ZERO) += delta.asset_delta(asset_id);
                }
            }
            AssetType::Nft => {}
        }
    }
    Ok(sums)
}
