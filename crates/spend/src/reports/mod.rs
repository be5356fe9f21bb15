//! Report flows built on the engine.
//!
//! Each flow takes a [`ReportContext`] holding the service handles, the
//! executor settings and the exchange rate resolved at startup.

pub mod accounts;
pub mod bills;
pub mod budgets;
pub mod change;
pub mod list;
pub mod switch;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::engine::{BatchError, BoundedExecutor, InvalidInterval};
use crate::money::ExchangeRate;
use crate::providers::{BudgetService, DimensionCatalog, ProviderError, QueryService};

pub use accounts::{accounts_report, AccountKey, AccountLine};
pub use bills::{bills_report, BillLine, DEFAULT_BILL_MONTHS};
pub use budgets::{budgets_report, BudgetLine};
pub use change::{change_report, ChangeKey, ChangeLine, ChangeOptions};
pub use list::list_report;
pub use switch::{switch_role_url, switch_url, SWITCH_ROLE_URL};

/// Errors surfaced by a report flow.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Interval(#[from] InvalidInterval),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account {0} is suspended")]
    AccountSuspended(String),

    #[error("no role name given; pass --role-name or set SPEND_SWITCH_ROLE_NAME")]
    MissingRoleName,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Everything a report needs, built once at startup.
#[derive(Clone)]
pub struct ReportContext {
    pub queries: Arc<dyn QueryService>,
    pub catalog: Arc<dyn DimensionCatalog>,
    pub budgets: Arc<dyn BudgetService>,
    pub executor: BoundedExecutor,
    pub rate: ExchangeRate,
    /// Reference date for every time window.
    pub today: NaiveDate,
}

impl ReportContext {
    /// Use one service for queries, the catalog and budgets.
    pub fn new<S>(
        service: Arc<S>,
        executor: BoundedExecutor,
        rate: ExchangeRate,
        today: NaiveDate,
    ) -> Self
    where
        S: QueryService + DimensionCatalog + BudgetService + 'static,
    {
        Self {
            queries: Arc::clone(&service) as Arc<dyn QueryService>,
            catalog: Arc::clone(&service) as Arc<dyn DimensionCatalog>,
            budgets: service,
            executor,
            rate,
            today,
        }
    }
}
