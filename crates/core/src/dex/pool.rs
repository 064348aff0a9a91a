//! Constant-product pool math
//!
//! All arithmetic is checked 256-bit integer math, rounding down. Rates are
//! basis points of [`FEE_RATE_BASE`].

use crate::{
    constants::FEE_RATE_BASE,
    dex::DexError,
    types::{amount_from_i64, Amount, AssetId, LiquidityDelta, LiquidityInfo},
};

fn mul(a: Amount, b: Amount) -> Result<Amount, DexError> {
    a.checked_mul(b).ok_or(DexError::Overflow)
}

fn add(a: Amount, b: Amount) -> Result<Amount, DexError> {
    a.checked_add(b).ok_or(DexError::Overflow)
}

fn sub(a: Amount, b: Amount) -> Result<Amount, DexError> {
    a.checked_sub(b).ok_or(DexError::Overflow)
}

fn div(a: Amount, b: Amount) -> Result<Amount, DexError> {
    if b.is_zero() {
        return Err(DexError::Overflow);
    }
    a.checked_div(b).ok_or(DexError::Overflow)
}

/// Integer square root, rounded down. Negative input yields zero.
pub fn isqrt(n: Amount) -> Amount {
    if n <= Amount::ONE {
        return if n.is_negative() { Amount::ZERO } else { n };
    }
    let two = amount_from_i64(2);
    let mut x = n;
    let mut y = x / two + x % two;
    while y < x {
        x = y;
        y = (x + n / x) / two;
    }
    x
}

fn check_rates(pool: &LiquidityInfo) -> Result<(), DexError> {
    let valid = (0..=FEE_RATE_BASE).contains(&pool.fee_rate)
        && (0..=pool.fee_rate).contains(&pool.treasury_rate);
    if valid {
        Ok(())
    } else {
        Err(DexError::InvalidRates(pool.pair_index))
    }
}

fn is_empty(pool: &LiquidityInfo) -> bool {
    pool.asset_a.is_zero() || pool.asset_b.is_zero() || pool.lp_amount.is_zero()
}

/// Lp shares owed to the treasury for fees accrued since `k_last`
pub fn treasury_lp(pool: &LiquidityInfo) -> Result<Amount, DexError> {
    check_rates(pool)?;
    if pool.treasury_rate == 0 || pool.k_last.is_zero() {
        return Ok(Amount::ZERO);
    }
    let root_k = isqrt(mul(pool.asset_a, pool.asset_b)?);
    let root_k_last = isqrt(pool.k_last);
    if root_k <= root_k_last {
        return Ok(Amount::ZERO);
    }

    let treasury_rate = amount_from_i64(pool.treasury_rate);
    let fee_rate = amount_from_i64(pool.fee_rate);
    let numerator = mul(mul(pool.lp_amount, sub(root_k, root_k_last)?)?, treasury_rate)?;
    let denominator = add(
        mul(sub(fee_rate, treasury_rate)?, root_k)?,
        mul(treasury_rate, root_k_last)?,
    )?;
    if denominator.is_zero() {
        return Ok(Amount::ZERO);
    }
    div(numerator, denominator)
}

fn pool_delta(
    pool: &LiquidityInfo,
    asset_a_delta: Amount,
    asset_b_delta: Amount,
    lp_delta: Amount,
    k_last: Amount,
) -> LiquidityDelta {
    LiquidityDelta {
        pair_index: pool.pair_index,
        asset_a_id: pool.asset_a_id,
        asset_a_delta,
        asset_b_id: pool.asset_b_id,
        asset_b_delta,
        lp_delta,
        k_last,
        fee_rate: pool.fee_rate,
        treasury_account_index: pool.treasury_account_index,
        treasury_rate: pool.treasury_rate,
    }
}

/// Result of depositing into a pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddLiquidityOutcome {
    /// Asset b actually taken
    pub asset_b_amount: Amount,
    /// Shares minted to the depositor
    pub lp_amount: Amount,
    /// Shares minted to the treasury
    pub treasury_lp: Amount,
    pub pool_delta: LiquidityDelta,
}

/// Deposit `asset_a_amount` and at most `max_asset_b_amount`.
/// An empty pool takes both amounts as given.
pub fn add_liquidity(
    pool: &LiquidityInfo,
    asset_a_amount: Amount,
    max_asset_b_amount: Amount,
) -> Result<AddLiquidityOutcome, DexError> {
    if asset_a_amount <= Amount::ZERO || max_asset_b_amount <= Amount::ZERO {
        return Err(DexError::NonPositiveAmount);
    }

    let (asset_b_amount, lp_amount, treasury) = if is_empty(pool) {
        check_rates(pool)?;
        let lp = isqrt(mul(asset_a_amount, max_asset_b_amount)?);
        (max_asset_b_amount, lp, Amount::ZERO)
    } else {
        let treasury = treasury_lp(pool)?;
        let asset_b_amount = div(mul(asset_a_amount, pool.asset_b)?, pool.asset_a)?;
        if asset_b_amount > max_asset_b_amount {
            return Err(DexError::AboveMaximum {
                required: asset_b_amount,
                maximum: max_asset_b_amount,
            });
        }
        let total_lp = add(pool.lp_amount, treasury)?;
        let lp = div(mul(asset_a_amount, total_lp)?, pool.asset_a)?;
        (asset_b_amount, lp, treasury)
    };
    if asset_b_amount.is_zero() || lp_amount.is_zero() {
        return Err(DexError::NonPositiveAmount);
    }

    let k_last = mul(add(pool.asset_a, asset_a_amount)?, add(pool.asset_b, asset_b_amount)?)?;
    let pool_delta =
        pool_delta(pool, asset_a_amount, asset_b_amount, add(lp_amount, treasury)?, k_last);
    Ok(AddLiquidityOutcome { asset_b_amount, lp_amount, treasury_lp: treasury, pool_delta })
}

/// Result of redeeming shares
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveLiquidityOutcome {
    pub asset_a_amount: Amount,
    pub asset_b_amount: Amount,
    pub treasury_lp: Amount,
    pub pool_delta: LiquidityDelta,
}

/// Redeem `lp_amount` shares, requiring at least the given minimums back
pub fn remove_liquidity(
    pool: &LiquidityInfo,
    lp_amount: Amount,
    min_asset_a_amount: Amount,
    min_asset_b_amount: Amount,
) -> Result<RemoveLiquidityOutcome, DexError> {
    if lp_amount <= Amount::ZERO
        || min_asset_a_amount.is_negative()
        || min_asset_b_amount.is_negative()
    {
        return Err(DexError::NonPositiveAmount);
    }
    if is_empty(pool) {
        return Err(DexError::EmptyPool(pool.pair_index));
    }
    if lp_amount > pool.lp_amount {
        return Err(DexError::AboveMaximum { required: lp_amount, maximum: pool.lp_amount });
    }

    let treasury = treasury_lp(pool)?;
    let total_lp = add(pool.lp_amount, treasury)?;
    let asset_a_amount = div(mul(lp_amount, pool.asset_a)?, total_lp)?;
    let asset_b_amount = div(mul(lp_amount, pool.asset_b)?, total_lp)?;
    if asset_a_amount < min_asset_a_amount {
        return Err(DexError::BelowMinimum { actual: asset_a_amount, minimum: min_asset_a_amount });
    }
    if asset_b_amount < min_asset_b_amount {
        return Err(DexError::BelowMinimum { actual: asset_b_amount, minimum: min_asset_b_amount });
    }

    let k_last = mul(sub(pool.asset_a, asset_a_amount)?, sub(pool.asset_b, asset_b_amount)?)?;
    let pool_delta = pool_delta(
        pool,
        -asset_a_amount,
        -asset_b_amount,
        sub(treasury, lp_amount)?,
        k_last,
    );
    Ok(RemoveLiquidityOutcome { asset_a_amount, asset_b_amount, treasury_lp: treasury, pool_delta })
}

/// Result of a swap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Amount of the bought asset received
    pub asset_b_amount: Amount,
    pub pool_delta: LiquidityDelta,
}

/// Sell `amount_in` of `asset_in` for the pool's other asset
pub fn swap(
    pool: &LiquidityInfo,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_in: Amount,
    min_amount_out: Amount,
) -> Result<SwapOutcome, DexError> {
    check_rates(pool)?;
    if amount_in <= Amount::ZERO || min_amount_out.is_negative() {
        return Err(DexError::NonPositiveAmount);
    }
    let forward = if asset_in == pool.asset_a_id && asset_out == pool.asset_b_id {
        true
    } else if asset_in == pool.asset_b_id && asset_out == pool.asset_a_id {
        false
    } else {
        let asset_id = if asset_in == pool.asset_a_id || asset_in == pool.asset_b_id {
            asset_out
        } else {
            asset_in
        };
        return Err(DexError::AssetMismatch { pair_index: pool.pair_index, asset_id });
    };
    if is_empty(pool) {
        return Err(DexError::EmptyPool(pool.pair_index));
    }

    let (reserve_in, reserve_out) =
        if forward { (pool.asset_a, pool.asset_b) } else { (pool.asset_b, pool.asset_a) };
    let base = amount_from_i64(FEE_RATE_BASE);
    let amount_in_with_fee = mul(amount_in, amount_from_i64(FEE_RATE_BASE - pool.fee_rate))?;
    let numerator = mul(amount_in_with_fee, reserve_out)?;
    let denominator = add(mul(reserve_in, base)?, amount_in_with_fee)?;
    let amount_out = div(numerator, denominator)?;
    if amount_out.is_zero() {
        return Err(DexError::NonPositiveAmount);
    }
    if amount_out < min_amount_out {
        return Err(DexError::BelowMinimum { actual: amount_out, minimum: min_amount_out });
    }

    let (asset_a_delta, asset_b_delta) =
        if forward { (amount_in, -amount_out) } else { (-amount_out, amount_in) };
    let pool_delta = pool_delta(pool, asset_a_delta, asset_b_delta, Amount::ZERO, pool.k_last);
    Ok(SwapOutcome { asset_b_amount: amount_out, pool_delta })
}
