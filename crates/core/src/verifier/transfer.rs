use crate::{
    constants::{NIL_NFT_INDEX, NIL_PAIR_INDEX},
    error::VerifyError,
    tx::{TransactionInfo, TransferTxInfo},
    types::AccountAsset,
};

use super::{
    check_common, check_name_hash, check_non_negative, check_signature, DeltaMap, DetailBuilder,
    StateSnapshot, Verified, VerifyContext,
};

/// Rows: sender asset, sender gas, receiver asset, gas account gas
pub(super) fn verify(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &TransferTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    let to = snapshot.account(tx.to_account_index)?;
    check_name_hash(to, &tx.to_account_name_hash)?;
    check_non_negative("asset amount", &tx.asset_amount)?;

    let fee = &tx.gas;
    let from_asset = AccountAsset::balance_delta(tx.asset_id, -tx.asset_amount);
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let to_asset = AccountAsset::balance_delta(tx.asset_id, tx.asset_amount);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    deltas.add(from.index, &from_asset)?;
    deltas.add(from.index, &from_gas)?;
    deltas.add(to.index, &to_asset)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details.begin_account().asset(from, &from_asset).asset(from, &from_gas);
    details.begin_account().asset(to, &to_asset);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: tx.asset_id,
        nft_index: NIL_NFT_INDEX,
        pair_index: NIL_PAIR_INDEX,
        tx_amount: tx.asset_amount,
        native_address: String::new(),
        details: details.finish(),
    })
}
