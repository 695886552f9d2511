//! Decimal money amounts with stablecoin currency tagging.
//!
//! All monetary math in the platform goes through [`Money`] so that totals
//! stay exact decimals end to end. Rounding only happens at the display
//! boundary and conversion to ledger base units refuses to lose precision.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from monetary arithmetic and conversions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Arithmetic across two different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// Amount out of range for the operation.
    #[error("amount overflow")]
    Overflow,

    /// Negative amount where only non-negative amounts are valid.
    #[error("negative amount: {0}")]
    Negative(Decimal),

    /// The amount has more fractional digits than the ledger token supports.
    #[error("amount {amount} does not fit in {decimals} base-unit decimals")]
    PrecisionLoss { amount: Decimal, decimals: u32 },
}

/// Stablecoin currencies accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Celo Dollar.
    #[default]
    Cusd,
    Usdc,
    Usdt,
}

impl Currency {
    /// Ticker code as used on the wire.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Cusd => "CUSD",
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
        }
    }

    /// Display symbol. All supported stablecoins track the US dollar.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        "$"
    }

    /// Parse a ticker code (case-insensitive).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "CUSD" => Some(Self::Cusd),
            "USDC" => Some(Self::Usdc),
            "USDT" => Some(Self::Usdt),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., whole dollars).
    pub amount: Decimal,
    /// Stablecoin currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] when the currencies differ and
    /// [`MoneyError::Overflow`] when the sum exceeds the decimal range.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Multiply by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the product exceeds the decimal range.
    pub fn checked_mul_quantity(self, quantity: u32) -> Result<Self, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Multiply by a decimal rate (e.g., a tax rate).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the product exceeds the decimal range.
    pub fn checked_mul_rate(self, rate: Decimal) -> Result<Self, MoneyError> {
        let amount = self
            .amount
            .checked_mul(rate)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Convert to the ledger's base-unit integer representation.
    ///
    /// `decimals` is the token's base-unit scale (18 for cUSD). The conversion
    /// is exact: an amount with finer precision than the token supports is
    /// rejected rather than rounded.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative amounts,
    /// [`MoneyError::PrecisionLoss`] when the amount does not scale to an
    /// integer, and [`MoneyError::Overflow`] when the scaled value does not
    /// fit the decimal range.
    pub fn to_base_units(&self, decimals: u32) -> Result<u128, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative(self.amount));
        }
        let scale = 10u64
            .checked_pow(decimals)
            .ok_or(MoneyError::Overflow)?;
        let scaled = self
            .amount
            .checked_mul(Decimal::from(scale))
            .ok_or(MoneyError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::PrecisionLoss {
                amount: self.amount,
                decimals,
            });
        }
        scaled.to_u128().ok_or(MoneyError::Overflow)
    }

    /// Format for display (e.g., `$19.99`). Rounds to two decimal places;
    /// this is the only place amounts are rounded.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec("10.00"), Currency::Cusd);
        let b = Money::new(dec("2.50"), Currency::Cusd);
        let sum = a.checked_add(b).expect("same currency");
        assert_eq!(sum.amount, dec("12.50"));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::new(dec("10.00"), Currency::Cusd);
        let b = Money::new(dec("2.50"), Currency::Usdc);
        assert!(matches!(
            a.checked_add(b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_mul_quantity() {
        let price = Money::new(dec("9.99"), Currency::Cusd);
        let line = price.checked_mul_quantity(3).expect("no overflow");
        assert_eq!(line.amount, dec("29.97"));
    }

    #[test]
    fn test_to_base_units_exact() {
        let m = Money::new(dec("22.00"), Currency::Cusd);
        assert_eq!(
            m.to_base_units(18).expect("exact conversion"),
            22_000_000_000_000_000_000
        );
    }

    #[test]
    fn test_to_base_units_small_scale() {
        let m = Money::new(dec("1.25"), Currency::Usdc);
        assert_eq!(m.to_base_units(6).expect("exact conversion"), 1_250_000);
    }

    #[test]
    fn test_to_base_units_rejects_precision_loss() {
        let m = Money::new(dec("0.123"), Currency::Usdc);
        assert!(matches!(
            m.to_base_units(2),
            Err(MoneyError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn test_to_base_units_rejects_negative() {
        let m = Money::new(dec("-1.00"), Currency::Cusd);
        assert!(matches!(m.to_base_units(18), Err(MoneyError::Negative(_))));
    }

    #[test]
    fn test_display_pads_to_cents() {
        let m = Money::new(dec("2.5"), Currency::Cusd);
        assert_eq!(m.display(), "$2.50");
        // The stored amount is untouched.
        assert_eq!(m.amount, dec("2.5"));
    }
}
