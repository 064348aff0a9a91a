use crate::{
    constants::{NIL_NFT_INDEX, NIL_PAIR_INDEX},
    error::VerifyError,
    tx::{TransactionInfo, WithdrawTxInfo},
    types::AccountAsset,
};

use super::{
    check_common, check_non_negative, check_signature, DeltaMap, DetailBuilder, StateSnapshot,
    Verified, VerifyContext,
};

/// Rows: sender asset, sender gas, gas account gas. The withdrawn amount
/// leaves L2.
pub(super) fn verify(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &WithdrawTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    check_non_negative("asset amount", &tx.asset_amount)?;

    let fee = &tx.gas;
    let from_asset = AccountAsset::balance_delta(tx.asset_id, -tx.asset_amount);
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    deltas.add(from.index, &from_asset)?;
    deltas.add(from.index, &from_gas)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details.begin_account().asset(from, &from_asset).asset(from, &from_gas);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: tx.asset_id,
        nft_index: NIL_NFT_INDEX,
        pair_index: NIL_PAIR_INDEX,
        tx_amount: tx.asset_amount,
        native_address: tx.to_address.clone(),
        details: details.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::{asset_balance_sums, test_utils::*, verify_tx};
    use crate::{
        error::{EncodingError, VerifyError},
        tx::{TransactionInfo, WithdrawTxInfo},
    };

    fn withdraw(to_address: &str, amount: i64) -> TransactionInfo {
        TransactionInfo::Withdraw(WithdrawTxInfo {
            from_account_index: 2,
            asset_id: 1,
            asset_amount: n(amount),
            to_address: to_address.into(),
            gas: gas(10),
            expired_at: NOW,
            nonce: 5,
            sig: String::new(),
        })
    }

    #[test]
    fn test_withdraw_burns_amount() {
        let address = "0x5b38da6a701c568545dcfcb03fcb875f56beddc4";
        let verified = verify_tx(&snapshot(), &ctx(), &signed(withdraw(address, 250))).unwrap();
        assert_eq!(verified.details.len(), 3);
        assert_eq!(verified.native_address, address);
        assert_ordering(&verified.details);

        let sums = asset_balance_sums(&verified.details).unwrap();
        assert_eq!(sums[&1], n(-250));
        assert!(sums[&0].is_zero());
    }

    #[test]
    fn test_withdraw_to_malformed_address() {
        // signing fails on the address too, so the signature is left empty
        assert_eq!(
            verify_tx(&snapshot(), &ctx(), &withdraw("0x1234", 1)),
            Err(VerifyError::HashError(EncodingError::InvalidAddress("0x1234".into())))
        );
    }

    #[test]
    fn test_withdraw_negative_amount() {
        let tx = withdraw("0x5b38da6a701c568545dcfcb03fcb875f56beddc4", -1);
        assert!(matches!(verify_tx(&snapshot(), &ctx(), &tx), Err(VerifyError::InvalidParams(_))));
    }
}
