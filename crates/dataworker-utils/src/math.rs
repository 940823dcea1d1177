// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Checked arithmetic over token amounts and fixed-point fee percentages.
//!
//! Amounts are unsigned 256-bit integers, balances are signed 256-bit, and fee
//! percentages are signed fixed-point with an implicit 1e18 scale. Every
//! operation here is checked; overflow surfaces as [`Error::Arithmetic`]
//! instead of wrapping.

use ethers::types::{I256, U256};

use crate::{Error, Result};

/// The implicit fixed-point scale for fee percentages (1e18).
pub fn wad() -> I256 {
    I256::exp10(18)
}

/// Checked addition of two unsigned amounts.
pub fn checked_add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(Error::Arithmetic("unsigned addition overflow"))
}

/// Checked addition of two signed balances.
pub fn checked_add_signed(a: I256, b: I256) -> Result<I256> {
    a.checked_add(b).ok_or(Error::Arithmetic("signed addition overflow"))
}

/// Checked subtraction of two signed balances.
pub fn checked_sub_signed(a: I256, b: I256) -> Result<I256> {
    a.checked_sub(b).ok_or(Error::Arithmetic("signed subtraction overflow"))
}

/// Converts an unsigned amount into the signed domain.
pub fn to_signed(amount: U256) -> Result<I256> {
    I256::try_from(amount).map_err(|_| Error::Arithmetic("amount exceeds signed 256-bit range"))
}

/// Computes `amount * pct / 1e18`, rounding toward zero.
///
/// The multiplication saturates to the fixed-point scale before division, so
/// the result carries the full precision of the 1e18 scale.
pub fn percentage(amount: U256, pct: I256) -> Result<I256> {
    let amount = to_signed(amount)?;
    let scaled = amount
        .checked_mul(pct)
        .ok_or(Error::Arithmetic("percentage multiplication overflow"))?;
    scaled
        .checked_div(wad())
        .ok_or(Error::Arithmetic("percentage division overflow"))
}

/// The fee taken out of `amount` at `fee_pct`. Fails on a negative result.
pub fn fee_amount(amount: U256, fee_pct: I256) -> Result<U256> {
    let fee = percentage(amount, fee_pct)?;
    if fee.is_negative() {
        return Err(Error::Arithmetic("negative fee amount"));
    }
    Ok(fee.unsigned_abs())
}

/// The portion of `amount` left after deducting a fee of `fee_pct`.
///
/// A negative `fee_pct` (a rebate) increases the result; a fee above 100%
/// would drive the result negative and is rejected.
pub fn amount_net_of_fee(amount: U256, fee_pct: I256) -> Result<U256> {
    let fee = percentage(amount, fee_pct)?;
    let net = checked_sub_signed(to_signed(amount)?, fee)?;
    if net.is_negative() {
        return Err(Error::Arithmetic("fee exceeds amount"));
    }
    Ok(net.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(tenths_of_percent: i64) -> I256 {
        // 1 tenth of a percent == 1e15 at the 1e18 scale.
        I256::from(tenths_of_percent) * I256::exp10(15)
    }

    #[test]
    fn percentage_rounds_toward_zero() {
        // 10% of 1005 is 100.5, which truncates to 100.
        let result = percentage(U256::from(1005u64), pct(100)).unwrap();
        assert_eq!(result, I256::from(100));
    }

    #[test]
    fn net_of_fee_deducts_the_scaled_fee() {
        let net = amount_net_of_fee(U256::from(1000u64), pct(100)).unwrap();
        assert_eq!(net, U256::from(900u64));
        let fee = fee_amount(U256::from(1000u64), pct(100)).unwrap();
        assert_eq!(fee, U256::from(100u64));
    }

    #[test]
    fn negative_fee_is_a_rebate() {
        let net = amount_net_of_fee(U256::from(1000u64), pct(-100)).unwrap();
        assert_eq!(net, U256::from(1100u64));
    }

    #[test]
    fn fee_above_full_amount_is_rejected() {
        let too_much = I256::exp10(18) * I256::from(2);
        assert!(amount_net_of_fee(U256::from(1000u64), too_much).is_err());
    }

    #[test]
    fn unsigned_overflow_is_caught() {
        assert!(checked_add(U256::MAX, U256::from(1u64)).is_err());
    }
}
