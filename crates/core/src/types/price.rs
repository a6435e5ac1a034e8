//! Type-safe price representation using decimal arithmetic.
//!
//! Vendors report money as a decimal string plus an ISO 4217 code
//! (`{"amount": "19.5", "currencyCode": "USD"}`). [`Price::parse`] turns that
//! pair into a [`Price`] so the storefront can sum cart lines without float
//! rounding and render them consistently.

use core::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is not a decimal number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// The amount is negative.
    #[error("amount cannot be negative: {0}")]
    Negative(String),
    /// The currency code is not supported.
    #[error("unsupported currency code: {0}")]
    UnsupportedCurrency(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Create a price from minor units (cents).
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }

    /// Parse a vendor amount string and currency code.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not a non-negative decimal or the
    /// currency is not supported.
    pub fn parse(amount: &str, currency_code: &str) -> Result<Self, PriceError> {
        let trimmed = amount.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| PriceError::InvalidAmount(trimmed.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PriceError::Negative(trimmed.to_string()));
        }
        let currency_code = currency_code.parse()?;
        Ok(Self::new(value, currency_code))
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add two prices of the same currency.
    ///
    /// Returns `None` when the currencies differ.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency_code != other.currency_code {
            return None;
        }
        Some(Self::new(self.amount + other.amount, self.currency_code))
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Format for display (e.g., "$19.99").
    ///
    /// Always renders two decimal places, rounding half away from zero.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{}{rounded:.2}", self.currency_code.symbol())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes the storefront sells in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Three-letter code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(PriceError::UnsupportedCurrency(other.to_string())),
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
