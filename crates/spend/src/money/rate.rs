//! Best-effort exchange rate lookup.
//!
//! The rate is resolved once at startup and then passed around as a plain
//! value. Any problem fetching it falls back to [`DEFAULT_USD_TO_EUR`].

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Amount, Currency};

/// USD to EUR as of 2024-05-20.
pub const DEFAULT_USD_TO_EUR: f64 = 0.919_606;

/// Public endpoint returning the latest USD rates.
pub const DEFAULT_RATE_URL: &str = "https://open.er-api.com/v6/latest/USD";

/// How long the startup lookup may take.
pub const RATE_FETCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors from the rate lookup. Never fatal.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rates endpoint returned {0}")]
    Status(u16),

    #[error("no {0} rate in response")]
    Missing(Currency),

    #[error("rate {0} is not a positive number")]
    Invalid(f64),
}

/// Where a rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Live,
    Fallback,
}

/// Fixed conversion from a base currency into a quote currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate {
    pub base: Currency,
    pub quote: Currency,
    pub rate: f64,
    pub source: RateSource,
}

impl ExchangeRate {
    /// A USD to EUR rate that was not fetched.
    #[must_use]
    pub fn fixed(rate: f64) -> Self {
        Self {
            base: Currency::Usd,
            quote: Currency::Eur,
            rate,
            source: RateSource::Fallback,
        }
    }

    /// The built-in USD to EUR rate.
    #[must_use]
    pub fn fallback() -> Self {
        Self::fixed(DEFAULT_USD_TO_EUR)
    }

    /// Convert a base-currency value.
    #[must_use]
    pub fn convert(&self, value: f64) -> Amount {
        Amount {
            value: value * self.rate,
            currency: self.quote,
        }
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self::fallback()
    }
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Fetch the USD to EUR rate from `url`.
///
/// # Errors
///
/// Returns an error if the request fails, times out, or carries no usable rate.
pub async fn fetch_rate(client: &Client, url: &str, timeout: Duration) -> Result<f64, RateError> {
    debug!(url = %url, "Fetching exchange rate");

    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RateError::Status(status.as_u16()));
    }

    let body: RatesResponse = response.json().await?;
    let rate = body
        .rates
        .get(Currency::Eur.code())
        .copied()
        .ok_or(RateError::Missing(Currency::Eur))?;

    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(RateError::Invalid(rate))
    }
}

/// Resolve the rate once, falling back to the built-in constant on any error.
pub async fn resolve_rate(client: &Client, url: &str) -> ExchangeRate {
    match fetch_rate(client, url, RATE_FETCH_TIMEOUT).await {
        Ok(rate) => ExchangeRate {
            rate,
            source: RateSource::Live,
            ..ExchangeRate::fallback()
        },
        Err(error) => {
            warn!(error = %error, fallback = DEFAULT_USD_TO_EUR, "Using fallback exchange rate");
            ExchangeRate::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert() {
        let rate = ExchangeRate::fixed(0.92);
        let converted = rate.convert(100.0);
        assert!((converted.value - 92.0).abs() < 1e-9);
        assert_eq!(converted.currency, Currency::Eur);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = ExchangeRate::fallback().convert(250.0);
        let b = ExchangeRate::default().convert(250.0);
        assert_eq!(a, b);
        assert!((a.value - 250.0 * DEFAULT_USD_TO_EUR).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unreachable_source_falls_back() {
        let client = Client::new();
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let rate = resolve_rate(&client, "http://127.0.0.1:9/latest").await;
        assert_eq!(rate.source, RateSource::Fallback);
        assert!((rate.rate - DEFAULT_USD_TO_EUR).abs() < f64::EPSILON);
    }
}
