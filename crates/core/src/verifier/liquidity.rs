use crate::{
    constants::{NIL_ASSET_ID, NIL_NFT_INDEX},
    dex::{add_liquidity, remove_liquidity},
    error::VerifyError,
    tx::{AddLiquidityTxInfo, RemoveLiquidityTxInfo, TransactionInfo},
    types::AccountAsset,
};

use super::{
    check_common, check_signature, dex_error, DeltaMap, DetailBuilder, StateSnapshot, Verified,
    VerifyContext,
};

/// Rows: sender asset a, asset b, lp and gas; pool; treasury lp; gas
/// account gas
pub(super) fn verify_add_liquidity(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &AddLiquidityTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    let pair = snapshot.pair(tx.pair_index)?;
    let treasury = snapshot.account(pair.treasury_account_index)?;
    let outcome =
        add_liquidity(pair, tx.asset_a_amount, tx.asset_b_amount).map_err(dex_error)?;

    let fee = &tx.gas;
    let from_a = AccountAsset::balance_delta(pair.asset_a_id, -tx.asset_a_amount);
    let from_b = AccountAsset::balance_delta(pair.asset_b_id, -outcome.asset_b_amount);
    let from_lp = AccountAsset::lp_delta(pair.pair_index, outcome.lp_amount);
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let treasury_lp = AccountAsset::lp_delta(pair.pair_index, outcome.treasury_lp);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    for delta in [&from_a, &from_b, &from_lp, &from_gas] {
        deltas.add(from.index, delta)?;
    }
    deltas.add(treasury.index, &treasury_lp)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details
        .begin_account()
        .asset(from, &from_a)
        .asset(from, &from_b)
        .asset(from, &from_lp)
        .asset(from, &from_gas);
    details.pool(&outcome.pool_delta);
    details.begin_account().asset(treasury, &treasury_lp);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: NIL_ASSET_ID,
        nft_index: NIL_NFT_INDEX,
        pair_index: tx.pair_index,
        tx_amount: outcome.lp_amount,
        native_address: String::new(),
        details: details.finish(),
    })
}

/// Same row layout as adding liquidity with the signs reversed
pub(super) fn verify_remove_liquidity(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &RemoveLiquidityTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    let pair = snapshot.pair(tx.pair_index)?;
    let treasury = snapshot.account(pair.treasury_account_index)?;
    let outcome =
        remove_liquidity(pair, tx.lp_amount, tx.asset_a_min_amount, tx.asset_b_min_amount)
            .map_err(dex_error)?;

    let fee = &tx.gas;
    let from_a = AccountAsset::balance_delta(pair.asset_a_id, outcome.asset_a_amount);
    let from_b = AccountAsset::balance_delta(pair.asset_b_id, outcome.asset_b_amount);
    let from_lp = AccountAsset::lp_delta(pair.pair_index, -tx.lp_amount);
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let treasury_lp = AccountAsset::lp_delta(pair.pair_index, outcome.treasury_lp);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    for delta in [&from_a, &from_b, &from_lp, &from_gas] {
        deltas.add(from.index, delta)?;
    }
    deltas.add(treasury.index, &treasury_lp)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details
        .begin_account()
        .asset(from, &from_a)
        .asset(from, &from_b)
        .asset(from, &from_lp)
        .asset(from, &from_gas);
    details.pool(&outcome.pool_delta);
    details.begin_account().asset(treasury, &treasury_lp);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: NIL_ASSET_ID,
        nft_index: NIL_NFT_INDEX,
        pair_index: tx.pair_index,
        tx_amount: tx.lp_amount,
        native_address: String::new(),
        details: details.finish(),
    })
}
