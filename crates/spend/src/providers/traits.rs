//! Billing service traits and common types.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::query::{DimensionFilter, DimensionKey, QueryDescriptor, TimeInterval};

/// Errors that can occur while talking to a billing service.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Authentication or authorization error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A monetary amount could not be read as a number.
    #[error("Invalid amount for {field}: {value:?}")]
    Parse { field: &'static str, value: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),
}

/// Parse a monetary amount as returned by the billing APIs (`"12.3456"`).
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the text is not a finite number.
pub fn parse_amount(field: &'static str, value: &str) -> Result<f64, ProviderError> {
    match value.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(ProviderError::Parse {
            field,
            value: value.to_string(),
        }),
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Lifecycle status of a member account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    PendingClosure,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::PendingClosure => write!(f, "PENDING_CLOSURE"),
        }
    }
}

/// A member account of the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Twelve digit account ID.
    pub id: String,
    /// Friendly account name.
    pub name: String,
    /// Account status.
    pub status: AccountStatus,
}

impl Account {
    /// Whether the account is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }
}

// ============================================================================
// Cost queries
// ============================================================================

/// Request for a monthly cost time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostQuery {
    /// Time period, end exclusive.
    pub interval: TimeInterval,
    /// Equality constraints, combined with AND.
    pub filters: Vec<DimensionFilter>,
    /// Optional dimension to group results by.
    pub group_by: Option<DimensionKey>,
}

impl CostQuery {
    /// Unfiltered query over an interval.
    #[must_use]
    pub fn new(interval: TimeInterval) -> Self {
        Self {
            interval,
            filters: Vec::new(),
            group_by: None,
        }
    }

    /// Add an equality constraint.
    #[must_use]
    pub fn with_filter(mut self, key: DimensionKey, value: impl Into<String>) -> Self {
        self.filters.push(DimensionFilter::new(key, value));
        self
    }

    /// Group the results by a dimension.
    #[must_use]
    pub fn grouped_by(mut self, key: DimensionKey) -> Self {
        self.group_by = Some(key);
        self
    }
}

impl From<&QueryDescriptor> for CostQuery {
    fn from(descriptor: &QueryDescriptor) -> Self {
        Self {
            interval: descriptor.interval,
            filters: descriptor.filters.clone(),
            group_by: None,
        }
    }
}

/// Cost attributed to one group key within a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAmount {
    /// Group keys, one per grouping dimension.
    pub keys: Vec<String>,
    /// Cost in USD.
    pub amount: f64,
}

/// One reporting period of a cost series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPoint {
    /// Period start (inclusive).
    pub start: NaiveDate,
    /// Period end (exclusive).
    pub end: NaiveDate,
    /// Total cost in USD.
    pub amount: f64,
    /// Whether the period is still open and the figure may change.
    pub estimated: bool,
    /// Per-group amounts, when the query was grouped.
    pub groups: Vec<GroupAmount>,
}

/// Chronologically ordered cost series, one point per month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSeries {
    pub points: Vec<CostPoint>,
}

impl CostSeries {
    /// Point amounts in chronological order.
    #[must_use]
    pub fn amounts(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.amount).collect()
    }

    /// Amount of the group whose first key matches `key`, searching every
    /// period. The latest period wins when a key appears more than once.
    #[must_use]
    pub fn group_amount(&self, key: &str) -> Option<f64> {
        self.points
            .iter()
            .flat_map(|p| p.groups.iter())
            .filter(|g| g.keys.first().is_some_and(|k| k == key))
            .map(|g| g.amount)
            .last()
    }
}

/// Request for a cost forecast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    /// Forecast period, end exclusive.
    pub interval: TimeInterval,
    /// Equality constraints, combined with AND.
    pub filters: Vec<DimensionFilter>,
}

// ============================================================================
// Budgets
// ============================================================================

/// A cost budget with its calculated spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget name.
    pub name: String,
    /// Budgeted amount in USD.
    pub limit: f64,
    /// Actual spend so far in USD.
    pub actual_spend: f64,
    /// Forecasted spend for the period in USD.
    pub forecasted_spend: f64,
}

// ============================================================================
// Service traits
// ============================================================================

/// Cost and forecast queries.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Fetch a monthly cost series matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or an amount cannot be parsed.
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<CostSeries, ProviderError>;

    /// Fetch the mean forecast for the query period.
    ///
    /// Returns `Ok(None)` when the service has no data to forecast from,
    /// which happens for new and suspended accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the amount cannot be parsed.
    async fn cost_forecast(&self, query: &ForecastQuery) -> Result<Option<f64>, ProviderError>;
}

/// Supplies the value lists the query builder expands.
#[async_trait]
pub trait DimensionCatalog: Send + Sync {
    /// List every account of the organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    /// List the values a dimension took during the interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn dimension_values(
        &self,
        key: DimensionKey,
        interval: TimeInterval,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Budget lookups.
#[async_trait]
pub trait BudgetService: Send + Sync {
    /// ID of the organization's management account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn management_account_id(&self) -> Result<String, ProviderError>;

    /// List the budgets defined in an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or an amount cannot be parsed.
    async fn describe_budgets(&self, account_id: &str) -> Result<Vec<Budget>, ProviderError>;
}
