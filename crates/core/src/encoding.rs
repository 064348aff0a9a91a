//! Canonical field encoding
//!
//! Every signed value is written as a fixed-width big-endian field of
//! [`FIELD_SIZE`] bytes. The output is hashed for signatures, so the layout
//! must stay byte-identical across implementations.

use alloy_primitives::U256;

use crate::{
    constants::{ADDRESS_SIZE, FIELD_SIZE, NIL_L1_ADDRESS},
    crypto::{keccak256, PublicKey},
    error::EncodingError,
    packed::{to_packed_amount, to_packed_fee},
    types::{Amount, Hash},
};

/// Append-only buffer of canonical fields
#[derive(Clone, Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Keccak-256 of the written fields
    pub fn hash(&self) -> Hash {
        keccak256(&self.buf)
    }

    fn write_field(&mut self, field: &[u8; FIELD_SIZE]) {
        self.buf.extend_from_slice(field);
    }

    /// Write an integer. Only the magnitude is encoded.
    pub fn write_i64(&mut self, value: i64) {
        let mut field = [0u8; FIELD_SIZE];
        field[FIELD_SIZE - 8..].copy_from_slice(&value.unsigned_abs().to_be_bytes());
        self.write_field(&field);
    }

    /// Write a non-negative 256-bit amount
    pub fn write_amount(&mut self, value: &Amount) -> Result<(), EncodingError> {
        if value.is_negative() {
            return Err(EncodingError::EncodingOverflow);
        }
        self.write_field(&value.into_raw().to_be_bytes::<FIELD_SIZE>());
        Ok(())
    }

    /// Write a base-10 integer string
    pub fn write_numeric_str(&mut self, value: &str) -> Result<(), EncodingError> {
        let field = parse_numeric_field(value)?;
        self.write_field(&field);
        Ok(())
    }

    /// Write an L1 address, left-padded to a full field
    pub fn write_address(&mut self, address: &str) -> Result<(), EncodingError> {
        let mut field = [0u8; FIELD_SIZE];
        if address != NIL_L1_ADDRESS {
            let raw = decode_address(address)?;
            field[FIELD_SIZE - ADDRESS_SIZE..].copy_from_slice(&raw);
        }
        self.write_field(&field);
        Ok(())
    }

    /// Write an account name
    pub fn write_account_name(&mut self, name: &str) -> Result<(), EncodingError> {
        let field = account_name_field(name)?;
        self.write_field(&field);
        Ok(())
    }

    /// Write both coordinates of a public key
    pub fn write_public_key(&mut self, public_key: &PublicKey) {
        let (x, y) = public_key.coordinates();
        self.write_field(&x);
        self.write_field(&y);
    }

    /// Write a 32-byte hex digest such as an nft content hash
    pub fn write_bytes32_hex(&mut self, digest: &str) -> Result<(), EncodingError> {
        let invalid = || EncodingError::InvalidDigest(digest.to_string());
        let raw = hex::decode(digest.strip_prefix("0x").unwrap_or(digest)).map_err(|_| invalid())?;
        let field: [u8; FIELD_SIZE] = raw.try_into().map_err(|_| invalid())?;
        self.write_field(&field);
        Ok(())
    }

    /// Write an amount in its packed form
    pub fn write_packed_amount(&mut self, amount: &Amount) -> Result<(), EncodingError> {
        let packed = to_packed_amount(amount)?;
        self.write_i64(packed);
        Ok(())
    }

    /// Write a fee in its packed form
    pub fn write_packed_fee(&mut self, fee: &Amount) -> Result<(), EncodingError> {
        let packed = to_packed_fee(fee)?;
        self.write_i64(packed);
        Ok(())
    }
}

fn parse_numeric_field(value: &str) -> Result<[u8; FIELD_SIZE], EncodingError> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EncodingError::InvalidNumericString(value.to_string()));
    }
    let parsed = U256::from_str_radix(digits, 10).map_err(|_| EncodingError::EncodingOverflow)?;
    if negative && !parsed.is_zero() {
        return Err(EncodingError::EncodingOverflow);
    }
    Ok(parsed.to_be_bytes::<FIELD_SIZE>())
}

/// Decode a `0x`-prefixed 20-byte L1 address
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_SIZE], EncodingError> {
    let invalid = || EncodingError::InvalidAddress(address.to_string());
    if address.len() != 2 + 2 * ADDRESS_SIZE {
        return Err(invalid());
    }
    let body = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    let raw = hex::decode(body).map_err(|_| invalid())?;
    raw.try_into().map_err(|_| invalid())
}

/// Account name reduced to a field: the name bytes as a big-endian integer
pub fn account_name_field(name: &str) -> Result<[u8; FIELD_SIZE], EncodingError> {
    let bytes = name.as_bytes();
    if bytes.len() > FIELD_SIZE {
        return Err(EncodingError::EncodingOverflow);
    }
    let mut field = [0u8; FIELD_SIZE];
    field[FIELD_SIZE - bytes.len()..].copy_from_slice(bytes);
    Ok(field)
}

/// Hex digest of an account name, as signed by transfers
pub fn account_name_hash(name: &str) -> Result<String, EncodingError> {
    let field = account_name_field(name)?;
    Ok(hex::encode(keccak256(&field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::amount_from_i64;

    const ADDRESS: &str = "0x5b38da6a701c568545dcfcb03fcb875f56beddc4";

    #[test]
    fn test_address_round_trip() {
        let raw = decode_address(ADDRESS).unwrap();
        assert_eq!(format!("0x{}", hex::encode(raw)), ADDRESS);

        let mut writer = FieldWriter::new();
        writer.write_address(ADDRESS).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), FIELD_SIZE);
        assert_eq!(&bytes[..FIELD_SIZE - ADDRESS_SIZE], &[0u8; 12]);
        assert_eq!(&bytes[FIELD_SIZE - ADDRESS_SIZE..], &raw);
    }

    #[test]
    fn test_nil_address_is_zero_field() {
        let mut writer = FieldWriter::new();
        writer.write_address(NIL_L1_ADDRESS).unwrap();
        assert_eq!(writer.as_bytes(), &[0u8; FIELD_SIZE]);
    }

    #[test]
    fn test_malformed_addresses() {
        for address in [
            "",
            "5b38da6a701c568545dcfcb03fcb875f56beddc4",
            "0x5b38da6a701c568545dcfcb03fcb875f56bedd",
            "0x5b38da6a701c568545dcfcb03fcb875f56beddzz",
            "1x5b38da6a701c568545dcfcb03fcb875f56beddc4",
        ] {
            let mut writer = FieldWriter::new();
            assert_eq!(
                writer.write_address(address),
                Err(EncodingError::InvalidAddress(address.to_string())),
                "{address}"
            );
        }
    }

    #[test]
    fn test_write_i64_drops_sign() {
        let mut positive = FieldWriter::new();
        positive.write_i64(258);
        let mut negative = FieldWriter::new();
        negative.write_i64(-258);
        assert_eq!(positive.as_bytes(), negative.as_bytes());
        assert_eq!(&positive.as_bytes()[30..], &[1, 2]);
    }

    #[test]
    fn test_numeric_strings() {
        let mut writer = FieldWriter::new();
        writer.write_numeric_str("1000").unwrap();
        let mut expected = FieldWriter::new();
        expected.write_amount(&amount_from_i64(1000)).unwrap();
        assert_eq!(writer.as_bytes(), expected.as_bytes());

        let too_big = "1".repeat(80);
        assert_eq!(writer.write_numeric_str(&too_big), Err(EncodingError::EncodingOverflow));
        assert_eq!(writer.write_numeric_str("-5"), Err(EncodingError::EncodingOverflow));
        assert_eq!(
            writer.write_numeric_str("12a"),
            Err(EncodingError::InvalidNumericString("12a".into()))
        );
        assert_eq!(
            writer.write_numeric_str(""),
            Err(EncodingError::InvalidNumericString(String::new()))
        );
        assert_eq!(writer.write_amount(&amount_from_i64(-1)), Err(EncodingError::EncodingOverflow));
    }

    #[test]
    fn test_account_name_field() {
        let field = account_name_field("alice.legend").unwrap();
        assert_eq!(&field[FIELD_SIZE - 12..], b"alice.legend");
        assert!(field[..FIELD_SIZE - 12].iter().all(|b| *b == 0));
        assert_eq!(account_name_field(&"a".repeat(33)), Err(EncodingError::EncodingOverflow));

        let hash = account_name_hash("alice.legend").unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, account_name_hash("alice.legend").unwrap());
        assert_ne!(hash, account_name_hash("bob.legend").unwrap());
    }

    #[test]
    fn test_bytes32_hex() {
        let mut writer = FieldWriter::new();
        writer.write_bytes32_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(writer.as_bytes(), &[0xab; FIELD_SIZE]);
        assert!(matches!(writer.write_bytes32_hex("abcd"), Err(EncodingError::InvalidDigest(_))));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encode = || {
            let mut writer = FieldWriter::new();
            writer.write_i64(6);
            writer.write_address(ADDRESS).unwrap();
            writer.write_packed_fee(&amount_from_i64(1000)).unwrap();
            writer.hash()
        };
        assert_eq!(encode(), encode());
    }
}
