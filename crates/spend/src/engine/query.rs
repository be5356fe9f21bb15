//! Query descriptors and the cartesian query builder.

use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A time interval could not be formed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid interval {start}..{end}: start must be before end")]
pub struct InvalidInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeInterval {
    /// # Errors
    ///
    /// Returns [`InvalidInterval`] unless `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidInterval> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidInterval { start, end })
        }
    }

    /// The `months` full calendar months before the month containing `today`.
    ///
    /// `last_full_months(2024-05-17, 3)` is `2024-02-01..2024-05-01`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInterval`] when `months` is zero.
    pub fn last_full_months(today: NaiveDate, months: u32) -> Result<Self, InvalidInterval> {
        let end = first_of_month(today);
        let start = end.checked_sub_months(Months::new(months)).unwrap_or(end);
        Self::new(start, end)
    }

    /// The single day starting at `day`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInterval`] when `day` is the last representable date.
    pub fn single_day(day: NaiveDate) -> Result<Self, InvalidInterval> {
        let end = day.checked_add_days(Days::new(1)).unwrap_or(day);
        Self::new(day, end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day - Days::new(u64::from(day.day0()))
}

/// An axis of variation for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionKey {
    LinkedAccount,
    Service,
    Region,
}

impl DimensionKey {
    /// Name used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinkedAccount => "LINKED_ACCOUNT",
            Self::Service => "SERVICE",
            Self::Region => "REGION",
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality constraint on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionFilter {
    pub key: DimensionKey,
    pub value: String,
}

impl DimensionFilter {
    #[must_use]
    pub fn new(key: DimensionKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// A dimension and the ordered, distinct values to expand it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub key: DimensionKey,
    pub values: Vec<String>,
}

impl Dimension {
    #[must_use]
    pub fn new<I, S>(key: DimensionKey, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// One unit of independent work: a tuple of dimension values and an interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub filters: Vec<DimensionFilter>,
    pub interval: TimeInterval,
}

impl QueryDescriptor {
    /// Value of `key` in this descriptor, if constrained.
    #[must_use]
    pub fn value(&self, key: DimensionKey) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for filter in &self.filters {
            write!(f, "{}={} ", filter.key, filter.value)?;
        }
        write!(f, "[{}]", self.interval)
    }
}

/// Expand dimension lists into their cartesian product.
///
/// Descriptors come out in lexicographic product order, the first dimension
/// varying slowest. Any empty value list, or no dimensions at all, yields no
/// descriptors.
#[must_use]
pub fn build_queries(dimensions: &[Dimension], interval: TimeInterval) -> Vec<QueryDescriptor> {
    if dimensions.is_empty() || dimensions.iter().any(|d| d.values.is_empty()) {
        return Vec::new();
    }

    let mut tuples: Vec<Vec<DimensionFilter>> = vec![Vec::new()];
    for dimension in dimensions {
        let mut expanded = Vec::with_capacity(tuples.len() * dimension.values.len());
        for prefix in &tuples {
            for value in &dimension.values {
                let mut tuple = prefix.clone();
                tuple.push(DimensionFilter::new(dimension.key, value.clone()));
                expanded.push(tuple);
            }
        }
        tuples = expanded;
    }

    tuples
        .into_iter()
        .map(|filters| QueryDescriptor { filters, interval })
        .collect()
}
