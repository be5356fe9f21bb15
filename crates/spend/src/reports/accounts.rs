//! Last month's cost against this month's forecast, per account.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use super::{ReportContext, ReportError};
use crate::engine::{
    join_records, rank, Concurrency, DerivedRecord, DimensionFilter, DimensionKey, RankStrategy,
    TimeInterval,
};
use crate::providers::{CostQuery, ForecastQuery, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountKey {
    pub name: String,
    pub id: String,
    pub suspended: bool,
}

impl AsRef<str> for AccountKey {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// `current` is last month's cost, `reference` the forecast and `delta`
/// forecast minus cost.
pub type AccountLine = DerivedRecord<AccountKey>;

/// Cost and forecast for every account, sorted by name.
///
/// Both lookups run with one task per account, and the two batches run at
/// the same time. Accounts without forecast data show a forecast of zero.
///
/// # Errors
///
/// Fails if listing accounts fails or if any cost or forecast lookup fails.
#[instrument(skip(ctx), fields(today = %ctx.today))]
pub async fn accounts_report(ctx: &ReportContext) -> Result<Vec<AccountLine>, ReportError> {
    let accounts = ctx.catalog.list_accounts().await?;
    let cost_interval = TimeInterval::last_full_months(ctx.today, 1)?;
    let forecast_interval = TimeInterval::single_day(ctx.today)?;

    let ids: Vec<String> = accounts.iter().map(|a| a.id.clone()).collect();
    let executor = ctx.executor.with_concurrency(Concurrency::PerItem);

    let service = Arc::clone(&ctx.queries);
    let costs = executor.run(ids.clone(), move |id: String| {
        let service = Arc::clone(&service);
        async move {
            let query = CostQuery::new(cost_interval)
                .with_filter(DimensionKey::LinkedAccount, id.as_str())
                .grouped_by(DimensionKey::LinkedAccount);
            let series = service.cost_and_usage(&query).await?;
            Ok::<_, ProviderError>(series.group_amount(&id).unwrap_or(0.0))
        }
    });

    let service = Arc::clone(&ctx.queries);
    let forecasts = executor.run(ids, move |id: String| {
        let service = Arc::clone(&service);
        async move {
            let query = ForecastQuery {
                interval: forecast_interval,
                filters: vec![DimensionFilter::new(DimensionKey::LinkedAccount, id)],
            };
            service.cost_forecast(&query).await
        }
    });

    let (costs, forecasts) = tokio::try_join!(costs, forecasts)?;

    let costs: HashMap<String, f64> = costs
        .into_results()
        .into_iter()
        .map(|c| (c.descriptor, c.payload))
        .collect();
    let forecasts: HashMap<String, f64> = forecasts
        .into_results()
        .into_iter()
        .filter_map(|c| c.payload.map(|amount| (c.descriptor, amount)))
        .collect();
    debug!(
        accounts = accounts.len(),
        forecasts = forecasts.len(),
        "joined account costs"
    );

    let primary = accounts.iter().map(|a| {
        let cost = costs.get(&a.id).copied().unwrap_or(0.0);
        (a.id.clone(), cost)
    });
    let by_id: HashMap<&str, _> = accounts.iter().map(|a| (a.id.as_str(), a)).collect();

    let lines = join_records(primary, &forecasts, &ctx.rate)
        .into_iter()
        .map(|record| {
            record.map_key(|id| {
                let account = by_id.get(id.as_str());
                AccountKey {
                    name: account.map(|a| a.name.clone()).unwrap_or_default(),
                    suspended: account.is_some_and(|a| a.is_suspended()),
                    id,
                }
            })
        })
        .collect();

    Ok(rank(lines, RankStrategy::ByName))
}
