//! Billing service integrations.
//!
//! The engine only depends on the traits in this module; [`aws::AwsBilling`]
//! is the one production implementation.

pub mod aws;
mod traits;

pub use aws::{AwsBilling, AwsConfig};
pub use traits::{
    parse_amount, Account, AccountStatus, Budget, BudgetService, CostPoint, CostQuery,
    CostSeries, DimensionCatalog, ForecastQuery, GroupAmount, ProviderError, QueryService,
};
