//! Account-side checks shared by every transaction type

use crate::{
    error::VerifyError,
    types::{Account, AccountAsset, Nonce},
};

/// Account operations
pub struct DexAccount;

impl DexAccount {
    /// The transaction must consume exactly the account's next nonce
    pub fn check_nonce(account: &Account, nonce: Nonce) -> Result<(), VerifyError> {
        if account.nonce != nonce {
            return Err(VerifyError::InvalidNonce { expected: account.nonce, actual: nonce });
        }
        Ok(())
    }

    /// Apply accumulated deltas to an account, failing if any amount would
    /// turn negative. Returns the resulting assets in delta order.
    pub fn settle<'a>(
        account: &Account,
        deltas: impl IntoIterator<Item = &'a AccountAsset>,
    ) -> Result<Vec<AccountAsset>, VerifyError> {
        deltas
            .into_iter()
            .map(|delta| {
                account.asset(delta.asset_id).apply(delta).ok_or(
                    VerifyError::InsufficientBalance {
                        account_index: account.index,
                        asset_id: delta.asset_id,
                    },
                )
            })
            .collect()
    }
}
