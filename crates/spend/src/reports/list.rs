//! Organization accounts by name.

use tracing::instrument;

use super::{ReportContext, ReportError};
use crate::engine::{rank, RankStrategy, Rankable};
use crate::providers::Account;

impl Rankable for Account {
    fn metric(&self) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Every account of the organization, sorted by name.
///
/// # Errors
///
/// Fails if the accounts cannot be listed.
#[instrument(skip(ctx))]
pub async fn list_report(ctx: &ReportContext) -> Result<Vec<Account>, ReportError> {
    let accounts = ctx.catalog.list_accounts().await?;
    Ok(rank(accounts, RankStrategy::ByName))
}
