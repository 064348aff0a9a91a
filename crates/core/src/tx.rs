//! Transaction structure

use serde::{Deserialize, Serialize};

use crate::{
    crypto::TxSigner,
    encoding::FieldWriter,
    error::EncodingError,
    types::{amount_serde, AccountIndex, Amount, AssetId, Hash, NftIndex, Nonce, PairIndex},
};

/// Transaction type, numbered as in persisted records
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TxType {
    Transfer,
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Withdraw,
    MintNft,
    TransferNft,
}

impl TxType {
    /// Numeric tag, also the first field of every signed message
    pub const fn as_i64(&self) -> i64 {
        match self {
            Self::Transfer => 6,
            Self::Swap => 7,
            Self::AddLiquidity => 8,
            Self::RemoveLiquidity => 9,
            Self::Withdraw => 10,
            Self::MintNft => 12,
            Self::TransferNft => 13,
        }
    }
}

/// Fee paid to the gas account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasFee {
    pub gas_account_index: AccountIndex,
    pub gas_fee_asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub gas_fee_asset_amount: Amount,
}

impl GasFee {
    fn write(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.gas_account_index);
        writer.write_i64(self.gas_fee_asset_id);
        writer.write_packed_fee(&self.gas_fee_asset_amount)
    }
}

/// Move a fungible asset to another account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxInfo {
    pub from_account_index: AccountIndex,
    pub to_account_index: AccountIndex,
    /// Hex digest of the receiver's name, binds the signature to the receiver
    pub to_account_name_hash: String,
    pub asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_amount: Amount,
    pub gas: GasFee,
    pub memo: String,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl TransferTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_i64(self.to_account_index);
        writer.write_bytes32_hex(&self.to_account_name_hash)?;
        writer.write_i64(self.gas.gas_account_index);
        writer.write_i64(self.asset_id);
        writer.write_packed_amount(&self.asset_amount)?;
        writer.write_i64(self.gas.gas_fee_asset_id);
        writer.write_packed_fee(&self.gas.gas_fee_asset_amount)?;
        Ok(())
    }
}

/// Hand an nft to another account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNftTxInfo {
    pub from_account_index: AccountIndex,
    pub to_account_index: AccountIndex,
    pub to_account_name_hash: String,
    pub nft_index: NftIndex,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl TransferNftTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_i64(self.to_account_index);
        writer.write_bytes32_hex(&self.to_account_name_hash)?;
        writer.write_i64(self.nft_index);
        self.gas.write(writer)
    }
}

/// Create an nft owned by `to_account_index`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintNftTxInfo {
    pub creator_account_index: AccountIndex,
    pub to_account_index: AccountIndex,
    pub to_account_name_hash: String,
    /// Index assigned by the sequencer before signing
    pub nft_index: NftIndex,
    pub nft_content_hash: String,
    pub nft_collection_id: i64,
    /// Royalty in basis points
    pub creator_treasury_rate: i64,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl MintNftTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.creator_account_index);
        writer.write_i64(self.to_account_index);
        writer.write_bytes32_hex(&self.to_account_name_hash)?;
        writer.write_i64(self.nft_index);
        writer.write_bytes32_hex(&self.nft_content_hash)?;
        writer.write_i64(self.creator_treasury_rate);
        writer.write_i64(self.nft_collection_id);
        self.gas.write(writer)
    }
}

/// Burn an L2 balance to be released on L1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawTxInfo {
    pub from_account_index: AccountIndex,
    pub asset_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_amount: Amount,
    /// L1 receiver
    pub to_address: String,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl WithdrawTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_address(&self.to_address)?;
        writer.write_i64(self.asset_id);
        // Withdrawals sign the exact amount
        writer.write_amount(&self.asset_amount)?;
        self.gas.write(writer)
    }
}

/// Deposit both assets of a pair for lp shares
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityTxInfo {
    pub from_account_index: AccountIndex,
    pub pair_index: PairIndex,
    #[serde(with = "amount_serde")]
    pub asset_a_amount: Amount,
    /// Upper bound on the asset b taken from the account
    #[serde(with = "amount_serde")]
    pub asset_b_amount: Amount,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl AddLiquidityTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_i64(self.pair_index);
        writer.write_packed_amount(&self.asset_a_amount)?;
        writer.write_packed_amount(&self.asset_b_amount)?;
        self.gas.write(writer)
    }
}

/// Redeem lp shares for both assets of a pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityTxInfo {
    pub from_account_index: AccountIndex,
    pub pair_index: PairIndex,
    #[serde(with = "amount_serde")]
    pub asset_a_min_amount: Amount,
    #[serde(with = "amount_serde")]
    pub asset_b_min_amount: Amount,
    #[serde(with = "amount_serde")]
    pub lp_amount: Amount,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl RemoveLiquidityTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_i64(self.pair_index);
        writer.write_packed_amount(&self.asset_a_min_amount)?;
        writer.write_packed_amount(&self.asset_b_min_amount)?;
        writer.write_packed_amount(&self.lp_amount)?;
        self.gas.write(writer)
    }
}

/// Sell `asset_a_amount` of one side of a pair for the other side
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTxInfo {
    pub from_account_index: AccountIndex,
    pub pair_index: PairIndex,
    /// Asset sold, either side of the pair
    pub asset_a_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_a_amount: Amount,
    /// Asset bought
    pub asset_b_id: AssetId,
    #[serde(with = "amount_serde")]
    pub asset_b_min_amount: Amount,
    pub gas: GasFee,
    pub expired_at: i64,
    pub nonce: Nonce,
    pub sig: String,
}

impl SwapTxInfo {
    fn write_message(&self, writer: &mut FieldWriter) -> Result<(), EncodingError> {
        writer.write_i64(self.from_account_index);
        writer.write_i64(self.pair_index);
        writer.write_i64(self.asset_a_id);
        writer.write_packed_amount(&self.asset_a_amount)?;
        writer.write_i64(self.asset_b_id);
        writer.write_packed_amount(&self.asset_b_min_amount)?;
        self.gas.write(writer)
    }
}

/// Signed L2 transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionInfo {
    Transfer(TransferTxInfo),
    TransferNft(TransferNftTxInfo),
    MintNft(MintNftTxInfo),
    Withdraw(WithdrawTxInfo),
    AddLiquidity(AddLiquidityTxInfo),
    RemoveLiquidity(RemoveLiquidityTxInfo),
    Swap(SwapTxInfo),
}

impl TransactionInfo {
    /// Transaction type
    pub fn tx_type(&self) -> TxType {
        match self {
            Self::Transfer(_) => TxType::Transfer,
            Self::TransferNft(_) => TxType::TransferNft,
            Self::MintNft(_) => TxType::MintNft,
            Self::Withdraw(_) => TxType::Withdraw,
            Self::AddLiquidity(_) => TxType::AddLiquidity,
            Self::RemoveLiquidity(_) => TxType::RemoveLiquidity,
            Self::Swap(_) => TxType::Swap,
        }
    }

    /// Account whose key signs the transaction and whose nonce it consumes
    pub fn signer_account_index(&self) -> AccountIndex {
        match self {
            Self::Transfer(tx) => tx.from_account_index,
            Self::TransferNft(tx) => tx.from_account_index,
            Self::MintNft(tx) => tx.creator_account_index,
            Self::Withdraw(tx) => tx.from_account_index,
            Self::AddLiquidity(tx) => tx.from_account_index,
            Self::RemoveLiquidity(tx) => tx.from_account_index,
            Self::Swap(tx) => tx.from_account_index,
        }
    }

    pub fn nonce(&self) -> Nonce {
        match self {
            Self::Transfer(tx) => tx.nonce,
            Self::TransferNft(tx) => tx.nonce,
            Self::MintNft(tx) => tx.nonce,
            Self::Withdraw(tx) => tx.nonce,
            Self::AddLiquidity(tx) => tx.nonce,
            Self::RemoveLiquidity(tx) => tx.nonce,
            Self::Swap(tx) => tx.nonce,
        }
    }

    /// Expiry as unix milliseconds
    pub fn expired_at(&self) -> i64 {
        match self {
            Self::Transfer(tx) => tx.expired_at,
            Self::TransferNft(tx) => tx.expired_at,
            Self::MintNft(tx) => tx.expired_at,
            Self::Withdraw(tx) => tx.expired_at,
            Self::AddLiquidity(tx) => tx.expired_at,
            Self::RemoveLiquidity(tx) => tx.expired_at,
            Self::Swap(tx) => tx.expired_at,
        }
    }

    pub fn gas(&self) -> &GasFee {
        match self {
            Self::Transfer(tx) => &tx.gas,
            Self::TransferNft(tx) => &tx.gas,
            Self::MintNft(tx) => &tx.gas,
            Self::Withdraw(tx) => &tx.gas,
            Self::AddLiquidity(tx) => &tx.gas,
            Self::RemoveLiquidity(tx) => &tx.gas,
            Self::Swap(tx) => &tx.gas,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Self::Transfer(tx) => &tx.sig,
            Self::TransferNft(tx) => &tx.sig,
            Self::MintNft(tx) => &tx.sig,
            Self::Withdraw(tx) => &tx.sig,
            Self::AddLiquidity(tx) => &tx.sig,
            Self::RemoveLiquidity(tx) => &tx.sig,
            Self::Swap(tx) => &tx.sig,
        }
    }

    fn signature_mut(&mut self) -> &mut String {
        match self {
            Self::Transfer(tx) => &mut tx.sig,
            Self::TransferNft(tx) => &mut tx.sig,
            Self::MintNft(tx) => &mut tx.sig,
            Self::Withdraw(tx) => &mut tx.sig,
            Self::AddLiquidity(tx) => &mut tx.sig,
            Self::RemoveLiquidity(tx) => &mut tx.sig,
            Self::Swap(tx) => &mut tx.sig,
        }
    }

    /// Hash of the signed fields: type tag, per-type fields, expiry, nonce
    pub fn msg_hash(&self) -> Result<Hash, EncodingError> {
        let mut writer = FieldWriter::new();
        writer.write_i64(self.tx_type().as_i64());
        match self {
            Self::Transfer(tx) => tx.write_message(&mut writer)?,
            Self::TransferNft(tx) => tx.write_message(&mut writer)?,
            Self::MintNft(tx) => tx.write_message(&mut writer)?,
            Self::Withdraw(tx) => tx.write_message(&mut writer)?,
            Self::AddLiquidity(tx) => tx.write_message(&mut writer)?,
            Self::RemoveLiquidity(tx) => tx.write_message(&mut writer)?,
            Self::Swap(tx) => tx.write_message(&mut writer)?,
        }
        writer.write_i64(self.expired_at());
        writer.write_i64(self.nonce());
        Ok(writer.hash())
    }

    /// Fill in the signature
    pub fn sign(&mut self, signer: &TxSigner) -> Result<(), EncodingError> {
        let hash = self.msg_hash()?;
        *self.signature_mut() = signer.sign(&hash)?;
        Ok(())
    }

    /// Canonical raw form, as stored and hashed by the mempool
    pub fn to_raw(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoding::account_name_hash, types::amount_from_i64};

    fn gas() -> GasFee {
        GasFee {
            gas_account_index: 1,
            gas_fee_asset_id: 0,
            gas_fee_asset_amount: amount_from_i64(10),
        }
    }

    fn transfer() -> TransactionInfo {
        TransactionInfo::Transfer(TransferTxInfo {
            from_account_index: 2,
            to_account_index: 3,
            to_account_name_hash: account_name_hash("bob.legend").unwrap(),
            asset_id: 0,
            asset_amount: amount_from_i64(100),
            gas: gas(),
            memo: String::new(),
            expired_at: 1_700_000_000_000,
            nonce: 5,
            sig: String::new(),
        })
    }

    #[test]
    fn test_tx_type_tags() {
        assert_eq!(TxType::Transfer.as_i64(), 6);
        assert_eq!(TxType::Withdraw.as_i64(), 10);
        assert_eq!(TxType::TransferNft.as_i64(), 13);
        assert_eq!(transfer().tx_type(), TxType::Transfer);
    }

    #[test]
    fn test_msg_hash_covers_fields() {
        let tx = transfer();
        let hash = tx.msg_hash().unwrap();
        assert_eq!(hash, tx.msg_hash().unwrap());

        let mut other = tx.clone();
        if let TransactionInfo::Transfer(inner) = &mut other {
            inner.nonce = 6;
        }
        assert_ne!(hash, other.msg_hash().unwrap());

        // the signature is not part of the message
        let mut signed = tx.clone();
        signed.sign(&TxSigner::from_bytes([3; 32]).unwrap()).unwrap();
        assert_eq!(hash, signed.msg_hash().unwrap());
        assert!(signed.signature().starts_with("0x"));
    }

    #[test]
    fn test_unpackable_amount_is_encoding_error() {
        let mut tx = transfer();
        if let TransactionInfo::Transfer(inner) = &mut tx {
            inner.gas.gas_fee_asset_amount = amount_from_i64(2049);
        }
        assert!(matches!(tx.msg_hash(), Err(EncodingError::InvalidPackedAmount(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let tx = transfer();
        let raw = tx.to_raw().unwrap();
        assert!(raw.contains(r#""type":"Transfer""#));
        assert!(raw.contains(r#""asset_amount":"100""#));
        let parsed: TransactionInfo = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, tx);
    }
}
