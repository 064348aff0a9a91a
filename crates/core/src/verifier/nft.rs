use crate::{
    constants::{FEE_RATE_BASE, NIL_ASSET_ID, NIL_L1_ADDRESS, NIL_PAIR_INDEX},
    error::VerifyError,
    tx::{MintNftTxInfo, TransactionInfo, TransferNftTxInfo},
    types::{AccountAsset, Amount, NftInfo},
};

use super::{
    check_common, check_name_hash, check_signature, DeltaMap, DetailBuilder, StateSnapshot,
    Verified, VerifyContext,
};

/// Rows: sender gas, receiver empty gas row, nft with its new owner, gas
/// account gas
pub(super) fn verify_transfer_nft(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &TransferNftTxInfo,
) -> Result<Verified, VerifyError> {
    let (from, gas_account) = check_common(snapshot, ctx, info)?;
    let to = snapshot.account(tx.to_account_index)?;
    let nft = snapshot.nft(tx.nft_index)?;
    if nft.owner_account_index != from.index {
        return Err(VerifyError::InvalidParams(format!(
            "nft {} is not owned by account {}",
            tx.nft_index, from.index
        )));
    }
    check_name_hash(to, &tx.to_account_name_hash)?;

    let fee = &tx.gas;
    let from_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let to_empty = AccountAsset::new(fee.gas_fee_asset_id);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    deltas.add(from.index, &from_gas)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;
    let new_nft = nft.with_owner(to.index);

    check_signature(info, from)?;

    let mut details = DetailBuilder::new();
    details.begin_account().asset(from, &from_gas);
    details.begin_account().asset(to, &to_empty);
    details.nft(to, &new_nft);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: NIL_ASSET_ID,
        nft_index: tx.nft_index,
        pair_index: NIL_PAIR_INDEX,
        tx_amount: Amount::ZERO,
        native_address: String::new(),
        details: details.finish(),
    })
}

/// Same row layout as an nft transfer, the creator pays the gas
pub(super) fn verify_mint_nft(
    snapshot: &StateSnapshot,
    ctx: &VerifyContext,
    info: &TransactionInfo,
    tx: &MintNftTxInfo,
) -> Result<Verified, VerifyError> {
    let (creator, gas_account) = check_common(snapshot, ctx, info)?;
    let to = snapshot.account(tx.to_account_index)?;
    if snapshot.nfts.contains_key(&tx.nft_index) {
        return Err(VerifyError::InvalidParams(format!("nft {} already exists", tx.nft_index)));
    }
    if !(0..=FEE_RATE_BASE).contains(&tx.creator_treasury_rate) {
        return Err(VerifyError::InvalidParams(format!(
            "creator treasury rate {} out of range",
            tx.creator_treasury_rate
        )));
    }
    check_name_hash(to, &tx.to_account_name_hash)?;

    let fee = &tx.gas;
    let creator_gas = AccountAsset::balance_delta(fee.gas_fee_asset_id, -fee.gas_fee_asset_amount);
    let to_empty = AccountAsset::new(fee.gas_fee_asset_id);
    let gas_credit = AccountAsset::balance_delta(fee.gas_fee_asset_id, fee.gas_fee_asset_amount);

    let mut deltas = DeltaMap::new();
    deltas.add(creator.index, &creator_gas)?;
    deltas.add(gas_account.index, &gas_credit)?;
    deltas.check_sufficient(snapshot)?;
    let nft = NftInfo {
        nft_index: tx.nft_index,
        creator_account_index: creator.index,
        owner_account_index: to.index,
        content_hash: tx.nft_content_hash.clone(),
        l1_token_id: "0".into(),
        l1_address: NIL_L1_ADDRESS.into(),
        creator_treasury_rate: tx.creator_treasury_rate,
        collection_id: tx.nft_collection_id,
    };

    check_signature(info, creator)?;

    let mut details = DetailBuilder::new();
    details.begin_account().asset(creator, &creator_gas);
    details.begin_account().asset(to, &to_empty);
    details.nft(to, &nft);
    details.begin_account().asset(gas_account, &gas_credit);

    Ok(Verified {
        asset_id: NIL_ASSET_ID,
        nft_index: tx.nft_index,
        pair_index: NIL_PAIR_INDEX,
        tx_amount: Amount::ZERO,
        native_address: String::new(),
        details: details.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::{test_utils::*, verify_tx};
    use crate::{
        constants::NIL_ACCOUNT_ORDER,
        encoding::account_name_hash,
        error::VerifyError,
        tx::{MintNftTxInfo, TransactionInfo, TransferNftTxInfo},
        types::{AccountAsset, AssetType, NftInfo},
    };

    fn transfer_nft(nft_index: i64, fee: i64) -> TransactionInfo {
        TransactionInfo::TransferNft(TransferNftTxInfo {
            from_account_index: 2,
            to_account_index: 3,
            to_account_name_hash: account_name_hash("bob.legend").unwrap(),
            nft_index,
            gas: gas(fee),
            expired_at: NOW,
            nonce: 5,
            sig: String::new(),
        })
    }

    fn mint_nft(nft_index: i64) -> TransactionInfo {
        TransactionInfo::MintNft(MintNftTxInfo {
            creator_account_index: 2,
            to_account_index: 3,
            to_account_name_hash: account_name_hash("bob.legend").unwrap(),
            nft_index,
            nft_content_hash: "ef".repeat(32),
            nft_collection_id: 1,
            creator_treasury_rate: 100,
            gas: gas(10),
            expired_at: NOW,
            nonce: 5,
            sig: String::new(),
        })
    }

    #[test]
    fn test_transfer_nft_details() {
        let snapshot = snapshot();
        let verified = verify_tx(&snapshot, &ctx(), &signed(transfer_nft(4, 10))).unwrap();
        let details = &verified.details;
        assert_eq!(details.len(), 4);
        assert_ordering(details);
        assert_conserved(details);

        let sender: AccountAsset = details[0].balance_delta.parse().unwrap();
        assert_eq!((details[0].account_index, sender.balance), (2, n(-10)));
        let receiver: AccountAsset = details[1].balance_delta.parse().unwrap();
        assert_eq!(details[1].account_index, 3);
        assert!(receiver.is_empty());

        assert_eq!(details[2].asset_type, AssetType::Nft);
        assert_eq!(details[2].account_order, NIL_ACCOUNT_ORDER);
        let nft: NftInfo = details[2].balance_delta.parse().unwrap();
        assert_eq!(nft, snapshot.nfts[&4].with_owner(3));
        // the snapshot keeps the old owner
        assert_eq!(snapshot.nfts[&4].owner_account_index, 2);

        let gas: AccountAsset = details[3].balance_delta.parse().unwrap();
        assert_eq!((details[3].account_index, gas.balance), (GAS_ACCOUNT, n(10)));
        assert_eq!(
            details.iter().map(|d| d.account_order).collect::<Vec<_>>(),
            vec![0, 1, NIL_ACCOUNT_ORDER, 2]
        );
    }

    #[test]
    fn test_transfer_nft_not_owner() {
        let mut snapshot = snapshot();
        if let Some(nft) = snapshot.nfts.get_mut(&4) {
            nft.owner_account_index = 3;
        }
        assert!(matches!(
            verify_tx(&snapshot, &ctx(), &signed(transfer_nft(4, 10))),
            Err(VerifyError::InvalidParams(_))
        ));
        assert!(matches!(
            verify_tx(&snapshot, &ctx(), &signed(transfer_nft(77, 10))),
            Err(VerifyError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_mint_nft() {
        let verified = verify_tx(&snapshot(), &ctx(), &signed(mint_nft(5))).unwrap();
        let details = &verified.details;
        assert_eq!(details.len(), 4);
        assert_ordering(details);
        assert_conserved(details);

        let nft: NftInfo = details[2].balance_delta.parse().unwrap();
        assert_eq!(nft.nft_index, 5);
        assert_eq!(nft.creator_account_index, 2);
        assert_eq!(nft.owner_account_index, 3);
        assert_eq!(nft.creator_treasury_rate, 100);
        assert_eq!(verified.nft_index, 5);
    }

    #[test]
    fn test_mint_existing_nft() {
        assert!(matches!(
            verify_tx(&snapshot(), &ctx(), &signed(mint_nft(4))),
            Err(VerifyError::InvalidParams(_))
        ));
    }
}
