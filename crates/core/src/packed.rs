//! Packed amount representation
//!
//! Amounts signed by users are compressed to a decimal float: a mantissa
//! followed by a 5-bit base-10 exponent. Transfer amounts use a 35-bit
//! mantissa, fees an 11-bit one.

use alloy_primitives::{I256, U256};

use crate::{error::EncodingError, types::Amount};

const EXPONENT_BITS: u32 = 5;
const MAX_EXPONENT: u64 = (1 << EXPONENT_BITS) - 1;
const AMOUNT_MANTISSA_BITS: u32 = 35;
const FEE_MANTISSA_BITS: u32 = 11;

/// Pack a transfer amount. Fails unless the amount is exactly representable.
pub fn to_packed_amount(amount: &Amount) -> Result<i64, EncodingError> {
    pack(amount, AMOUNT_MANTISSA_BITS, true)
}

/// Pack a fee. Fails unless the fee is exactly representable.
pub fn to_packed_fee(fee: &Amount) -> Result<i64, EncodingError> {
    pack(fee, FEE_MANTISSA_BITS, true)
}

/// Round an amount down to the closest packable value
pub fn clean_packed_amount(amount: &Amount) -> Result<Amount, EncodingError> {
    let packed = pack(amount, AMOUNT_MANTISSA_BITS, false)?;
    unpack(packed)
}

/// Round a fee down to the closest packable value
pub fn clean_packed_fee(fee: &Amount) -> Result<Amount, EncodingError> {
    let packed = pack(fee, FEE_MANTISSA_BITS, false)?;
    unpack(packed)
}

/// Expand a packed amount or fee
pub fn unpack(packed: i64) -> Result<Amount, EncodingError> {
    if packed < 0 {
        return Err(EncodingError::InvalidPackedAmount(packed.to_string()));
    }
    let exponent = packed as u64 & MAX_EXPONENT;
    let mut value = U256::from(packed as u64 >> EXPONENT_BITS);
    let ten = U256::from(10u8);
    for _ in 0..exponent {
        value = value
            .checked_mul(ten)
            .ok_or_else(|| EncodingError::InvalidPackedAmount(packed.to_string()))?;
    }
    Ok(I256::from_raw(value))
}

fn pack(amount: &Amount, mantissa_bits: u32, exact: bool) -> Result<i64, EncodingError> {
    let invalid = || EncodingError::InvalidPackedAmount(amount.to_string());
    if amount.is_negative() {
        return Err(invalid());
    }

    let max_mantissa = U256::from((1u64 << mantissa_bits) - 1);
    let ten = U256::from(10u8);
    let mut mantissa = amount.into_raw();
    let mut exponent = 0u64;

    while mantissa > max_mantissa {
        if exact && !(mantissa % ten).is_zero() {
            return Err(invalid());
        }
        mantissa /= ten;
        exponent += 1;
        if exponent > MAX_EXPONENT {
            return Err(invalid());
        }
    }

    let mantissa = u64::try_from(mantissa).map_err(|_| invalid())?;
    Ok(((mantissa << EXPONENT_BITS) | exponent) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> Amount {
        I256::from_dec_str(s).unwrap()
    }

    #[test]
    fn test_to_packed_amount() {
        let packed = to_packed_amount(&amount("34359738361")).unwrap();
        assert_eq!(packed, 34_359_738_361 << 5);
        assert_eq!(unpack(packed).unwrap(), amount("34359738361"));
    }

    #[test]
    fn test_to_packed_fee() {
        let packed = to_packed_fee(&amount("100000000000000")).unwrap();
        assert_eq!(packed, (1000 << 5) | 11);
        assert_eq!(unpack(packed).unwrap(), amount("100000000000000"));
    }

    #[test]
    fn test_lossy_values_rejected() {
        assert!(matches!(
            to_packed_fee(&amount("2049")),
            Err(EncodingError::InvalidPackedAmount(_))
        ));
        assert_eq!(clean_packed_fee(&amount("2049")).unwrap(), amount("2040"));
        assert_eq!(clean_packed_amount(&amount("34359738368")).unwrap(), amount("34359738360"));
    }

    #[test]
    fn test_negative_and_huge_rejected() {
        assert!(to_packed_amount(&amount("-1")).is_err());
        // 2^35 * 10^32 needs an exponent above 31
        let huge = format!("34359738367{}", "0".repeat(32));
        assert!(to_packed_amount(&amount(&huge)).is_err());
        assert!(unpack(-1).is_err());
    }
}
