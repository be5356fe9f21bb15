//! Closed monthly bills, newest first.

use serde::Serialize;
use tracing::instrument;

use super::{ReportContext, ReportError};
use crate::engine::TimeInterval;
use crate::money::Money;
use crate::providers::CostQuery;

/// Months shown by default.
pub const DEFAULT_BILL_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillLine {
    /// Month label, e.g. `April 2024`.
    pub month: String,
    pub start: chrono::NaiveDate,
    pub cost: Money,
}

/// Organization-wide cost for each of the last `months` full months.
///
/// Months the service still marks as estimated are left out.
///
/// # Errors
///
/// Fails if `months` is zero or the cost query fails.
#[instrument(skip(ctx), fields(today = %ctx.today))]
pub async fn bills_report(ctx: &ReportContext, months: u32) -> Result<Vec<BillLine>, ReportError> {
    let interval = TimeInterval::last_full_months(ctx.today, months)?;
    let series = ctx.queries.cost_and_usage(&CostQuery::new(interval)).await?;

    Ok(series
        .points
        .iter()
        .rev()
        .filter(|p| !p.estimated)
        .map(|p| BillLine {
            month: p.start.format("%B %Y").to_string(),
            start: p.start,
            cost: Money::new(p.amount, &ctx.rate),
        })
        .collect())
}
