//! USDC amount handling across the UI and protocol boundaries.
//!
//! Amounts arrive as decimal strings from the form and leave as minor-unit
//! integers (6 decimal places) in calldata. Parsing floors anything beyond
//! 6 fractional digits; it never rounds up, so a user can never be charged
//! more than they typed.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")]
    Parse(String),
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount exceeds the representable USDC range")]
    OutOfRange,
}

/// A strictly positive USDC amount stored in minor units (10^-6 USDC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UsdcAmount {
    minor_units: u128,
}

impl UsdcAmount {
    pub const DECIMALS: u32 = 6;

    const SCALE: u128 = 1_000_000;

    /// Minor-unit representation for contract calls.
    pub fn to_minor_units(self) -> U256 {
        U256::from(self.minor_units)
    }

    /// Reconstructs an amount from a minor-unit integer, e.g. an on-chain
    /// balance read. Zero and values beyond the decimal range are rejected.
    pub fn from_minor_units(units: U256) -> Result<Self, AmountError> {
        let minor_units: u128 = units.try_into().map_err(|_| AmountError::OutOfRange)?;
        if minor_units == 0 {
            return Err(AmountError::NotPositive);
        }
        // Display goes through Decimal, whose 96-bit mantissa must hold the
        // minor units.
        if Decimal::try_from_i128_with_scale(
            i128::try_from(minor_units).map_err(|_| AmountError::OutOfRange)?,
            Self::DECIMALS,
        )
        .is_err()
        {
            return Err(AmountError::OutOfRange);
        }

        Ok(Self { minor_units })
    }

    /// Decimal view with trailing zeros stripped.
    pub fn as_decimal(self) -> Decimal {
        Decimal::try_from_i128_with_scale(self.minor_units as i128, Self::DECIMALS)
            .expect("checked at construction")
            .normalize()
    }
}

impl FromStr for UsdcAmount {
    type Err = AmountError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parsed =
            Decimal::from_str(text.trim()).map_err(|_| AmountError::Parse(text.to_string()))?;

        if parsed.is_sign_negative() || parsed.is_zero() {
            return Err(AmountError::NotPositive);
        }

        // Floor to 6 fractional digits before scaling.
        let floored = parsed.trunc_with_scale(Self::DECIMALS);
        if floored.is_zero() {
            return Err(AmountError::NotPositive);
        }

        let scaled = floored
            .checked_mul(Decimal::from(Self::SCALE))
            .ok_or(AmountError::OutOfRange)?;
        let minor_units = scaled.to_u128().ok_or(AmountError::OutOfRange)?;

        Ok(Self { minor_units })
    }
}

impl fmt::Display for UsdcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}
