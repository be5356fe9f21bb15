//! Reduction of raw query results into report records.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::money::{ExchangeRate, Money};

/// One row of a report before ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord<K> {
    /// Identifying dimension values.
    pub key: K,
    /// Latest observation, or the primary value in join mode.
    pub current: Money,
    /// Earliest observation, or the secondary value in join mode.
    pub reference: Money,
    /// Signed difference between the two.
    pub delta: Money,
}

impl<K> DerivedRecord<K> {
    /// Replace the key, keeping the amounts.
    pub fn map_key<L>(self, f: impl FnOnce(K) -> L) -> DerivedRecord<L> {
        DerivedRecord {
            key: f(self.key),
            current: self.current,
            reference: self.reference,
            delta: self.delta,
        }
    }
}

/// First/last reduction of a chronological series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesDelta {
    pub first: f64,
    pub last: f64,
    pub delta: f64,
}

impl SeriesDelta {
    /// Reduce a series to its endpoints.
    ///
    /// A single point gives a zero delta with both endpoints equal to it; an
    /// empty series is all zeros.
    #[must_use]
    pub fn from_amounts(amounts: &[f64]) -> Self {
        match (amounts.first(), amounts.last()) {
            (Some(&first), Some(&last)) => Self {
                first,
                last,
                delta: last - first,
            },
            _ => Self {
                first: 0.0,
                last: 0.0,
                delta: 0.0,
            },
        }
    }
}

/// Series-delta mode: `current` is the last point, `reference` the first.
#[must_use]
pub fn series_record<K>(key: K, amounts: &[f64], rate: &ExchangeRate) -> DerivedRecord<K> {
    let reduced = SeriesDelta::from_amounts(amounts);
    DerivedRecord {
        key,
        current: Money::new(reduced.last, rate),
        reference: Money::new(reduced.first, rate),
        delta: Money::new(reduced.delta, rate),
    }
}

/// Join mode: attach the secondary value to each primary entry by key.
///
/// A key missing from `secondary` counts as zero. The delta is
/// `secondary - primary`, and records keep the primary order.
pub fn join_records<K, I>(
    primary: I,
    secondary: &HashMap<K, f64>,
    rate: &ExchangeRate,
) -> Vec<DerivedRecord<K>>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, f64)>,
{
    primary
        .into_iter()
        .map(|(key, value)| {
            let other = secondary.get(&key).copied().unwrap_or(0.0);
            DerivedRecord {
                current: Money::new(value, rate),
                reference: Money::new(other, rate),
                delta: Money::new(other - value, rate),
                key,
            }
        })
        .collect()
}
