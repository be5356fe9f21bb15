//! Monetary amounts and currency conversion.

pub mod rate;

use serde::{Deserialize, Serialize};

pub use rate::{resolve_rate, ExchangeRate, RateError, RateSource, DEFAULT_USD_TO_EUR};

/// Currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollars.
    #[default]
    Usd,
    /// Euros.
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: f64,
    pub currency: Currency,
}

impl Amount {
    /// Create a new amount in USD.
    #[must_use]
    pub fn usd(value: f64) -> Self {
        Self {
            value,
            currency: Currency::Usd,
        }
    }

    /// Format with the currency symbol and two decimals (e.g. "$1.23", "-€4.00").
    #[must_use]
    pub fn format(&self) -> String {
        let sign = if self.value < 0.0 { "-" } else { "" };
        format!("{sign}{}{:.2}", self.currency.symbol(), self.value.abs())
    }
}

/// A value in the base currency together with its converted counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub base: Amount,
    pub converted: Amount,
}

impl Money {
    /// Convert a base-currency value with `rate`.
    #[must_use]
    pub fn new(value: f64, rate: &ExchangeRate) -> Self {
        Self {
            base: Amount {
                value,
                currency: rate.base,
            },
            converted: rate.convert(value),
        }
    }

    /// Base-currency value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.base.value
    }
}
