//! # Money Types
//!
//! Currency and amount types. Amounts are always integer minor units
//! (cents for USD) so totals never accumulate float error.

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    CHF,
    JPY,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::JPY => "jpy",
        }
    }

    /// Parse a currency code, case-insensitive
    pub fn parse(code: &str) -> MarketResult<Self> {
        match code.to_ascii_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            "chf" => Ok(Currency::CHF),
            "jpy" => Ok(Currency::JPY),
            other => Err(MarketError::validation(
                "currency",
                format!("unsupported currency: {other}"),
            )),
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, the rest have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert a decimal amount to the smallest currency unit
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(i32::from(self.decimal_places()));
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(i32::from(self.decimal_places()));
        amount as f64 / divisor
    }

    fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF ",
            Currency::JPY => "¥",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// An amount in the smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Money {
    /// Create from a decimal amount (e.g. 29.99)
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Multiply by a quantity
    pub fn times(&self, quantity: u32) -> MarketResult<Money> {
        let amount = self
            .amount
            .checked_mul(i64::from(quantity))
            .ok_or_else(Self::overflow)?;
        Ok(Self {
            amount,
            currency: self.currency,
        })
    }

    /// Add two amounts; fails if the currencies differ
    pub fn checked_add(&self, other: &Money) -> MarketResult<Money> {
        if self.currency != other.currency {
            return Err(MarketError::CurrencyMismatch {
                expected: self.currency.to_string(),
                found: other.currency.to_string(),
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(Self::overflow)?;
        Ok(Money {
            amount,
            currency: self.currency,
        })
    }

    fn overflow() -> MarketError {
        MarketError::validation("amount", "exceeds the supported range")
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        let symbol = self.currency.symbol();
        if self.currency.decimal_places() == 0 {
            format!("{}{}", symbol, self.amount)
        } else {
            format!("{}{:.2}", symbol, self.as_decimal())
        }
    }
}
