use crate::{
    constants::NIL_NFT_INDEX,
    dex::swap,
    error::VerifyError,
    tx::{SwapTxInfo, TransactionInfo},
    types::AccountAsset,
};

use super::{
    check_common, check_signature, dex_error, DeltaMap, DetailBuilder, StateSnapshot, Verified,
    VerifyContext,
};

/// Rows: sender sold asset, bought asset and gas; pool; gas account gas
pub(super) fn verify(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &SwapTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    let pair = snapshot.pair(tx.pair_index)?;
    let outcome = swap(pair, tx.asset_a_id, tx.asset_b_id, tx.asset_a_amount, tx.asset_b_min_amount)
        .map_err(dex_error)?;

    let fee = &tx.gas;
    let from_a = AccountAsset::balance_delta(tx.asset_a_id, -tx.asset_a_amount);
    let from_b = AccountAsset::balance_delta(tx.asset_b_id, outcome.asset_b_amount);
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    for delta in [&from_a, &from_b, &from_gas] {
        deltas.add(from.index, delta)?;
    }
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details.begin_account().asset(from, &from_a).asset(from, &from_b).asset(from, &from_gas);
    details.pool(&outcome.pool_delta);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: tx.asset_a_id,
        nft_index: NIL_NFT_INDEX,
        pair_index: tx.pair_index,
        tx_amount: tx.asset_a_amount,
        native_address: String::new(),
        details: details.finish(),
    })
}
