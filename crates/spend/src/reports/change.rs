//! Cost change per account, service and region.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use super::{ReportContext, ReportError};
use crate::engine::{
    build_queries, rank, series_record, DerivedRecord, Dimension, DimensionKey, QueryDescriptor,
    RankStrategy, TimeInterval,
};
use crate::providers::CostQuery;

/// Full months compared by default.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 3;

/// Rows shown by default.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOptions {
    pub months: u32,
    pub limit: usize,
}

impl Default for ChangeOptions {
    fn default() -> Self {
        Self {
            months: DEFAULT_LOOKBACK_MONTHS,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Identifies one change line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeKey {
    pub account_name: String,
    pub account_id: String,
    pub service: String,
    pub region: String,
}

impl AsRef<str> for ChangeKey {
    fn as_ref(&self) -> &str {
        &self.account_name
    }
}

/// `current` is the last month, `reference` the first, `delta` the change.
pub type ChangeLine = DerivedRecord<ChangeKey>;

/// Largest cost increases over the lookback window.
///
/// Queries every account × service × region combination, at most
/// `ctx.executor`'s limit at a time, and keeps the `options.limit` lines with
/// the biggest change between the first and last month.
///
/// # Errors
///
/// Fails if the catalog lookups fail or if any single query fails.
#[instrument(skip(ctx), fields(today = %ctx.today))]
pub async fn change_report(
    ctx: &ReportContext,
    options: ChangeOptions,
) -> Result<Vec<ChangeLine>, ReportError> {
    let interval = TimeInterval::last_full_months(ctx.today, options.months)?;

    let accounts = ctx.catalog.list_accounts().await?;
    let services = ctx
        .catalog
        .dimension_values(DimensionKey::Service, interval)
        .await?;
    let regions = ctx
        .catalog
        .dimension_values(DimensionKey::Region, interval)
        .await?;

    let names: HashMap<String, String> = accounts
        .iter()
        .map(|a| (a.id.clone(), a.name.clone()))
        .collect();

    let dimensions = [
        Dimension::new(DimensionKey::LinkedAccount, accounts.iter().map(|a| a.id.clone())),
        Dimension::new(DimensionKey::Service, services),
        Dimension::new(DimensionKey::Region, regions),
    ];
    let descriptors = build_queries(&dimensions, interval);

    info!(
        interval = %interval,
        accounts = dimensions[0].values.len(),
        services = dimensions[1].values.len(),
        regions = dimensions[2].values.len(),
        queries = descriptors.len(),
        "Querying cost changes"
    );

    let service = Arc::clone(&ctx.queries);
    let batch = ctx
        .executor
        .run(descriptors, move |descriptor: QueryDescriptor| {
            let service = Arc::clone(&service);
            async move { service.cost_and_usage(&CostQuery::from(&descriptor)).await }
        })
        .await?;

    let records = batch
        .into_submission_order()
        .into_iter()
        .map(|completed| {
            let value = |key| {
                completed
                    .descriptor
                    .value(key)
                    .unwrap_or_default()
                    .to_string()
            };
            let account_id = value(DimensionKey::LinkedAccount);
            let key = ChangeKey {
                account_name: names.get(&account_id).cloned().unwrap_or_default(),
                service: value(DimensionKey::Service),
                region: value(DimensionKey::Region),
                account_id,
            };
            series_record(key, &completed.payload.amounts(), &ctx.rate)
        })
        .collect();

    Ok(rank(
        records,
        RankStrategy::TopByMetric {
            limit: options.limit,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BatchError, BoundedExecutor, Concurrency, ExecutorConfig};
    use crate::providers::AccountStatus;
    use crate::reports::testing::{account, date, FakeBilling};
    use std::sync::atomic::Ordering;

    fn key(a: &str, s: &str, r: &str) -> (String, String, String) {
        (a.into(), s.into(), r.into())
    }

    fn fake() -> FakeBilling {
        FakeBilling {
            accounts: vec![
                account("111", "prod", AccountStatus::Active),
                account("222", "staging", AccountStatus::Active),
            ],
            services: vec!["EC2".into(), "S3".into()],
            regions: vec!["us-east-1".into()],
            series: HashMap::from([
                (key("111", "EC2", "us-east-1"), vec![100.0, 120.0, 150.0]),
                (key("111", "S3", "us-east-1"), vec![10.0, 5.0, 7.0]),
                (key("222", "EC2", "us-east-1"), vec![40.0, 60.0, 80.0]),
                (key("222", "S3", "us-east-1"), vec![20.0, 20.0, 30.0]),
            ]),
            ..FakeBilling::default()
        }
    }

    #[tokio::test]
    async fn test_ranks_biggest_increases_first() {
        let ctx = fake().context(date(2024, 5, 15));
        let lines = change_report(&ctx, ChangeOptions { months: 3, limit: 3 })
            .await
            .unwrap();

        let top: Vec<(&str, &str)> = lines
            .iter()
            .map(|l| (l.key.account_name.as_str(), l.key.service.as_str()))
            .collect();
        assert_eq!(
            top,
            vec![("prod", "EC2"), ("staging", "EC2"), ("staging", "S3")]
        );

        assert!((lines[0].delta.value() - 50.0).abs() < 1e-9);
        assert!((lines[0].current.value() - 150.0).abs() < 1e-9);
        assert!((lines[0].reference.value() - 100.0).abs() < 1e-9);
        assert_eq!(lines[0].key.account_id, "111");
        assert_eq!(lines[0].key.region, "us-east-1");
    }

    #[tokio::test]
    async fn test_equal_changes_keep_query_order() {
        // Earlier services answer last, so completion order is reversed.
        let fake = FakeBilling {
            accounts: vec![account("111", "prod", AccountStatus::Active)],
            services: vec!["EC2".into(), "S3".into(), "RDS".into()],
            regions: vec!["us-east-1".into()],
            series: HashMap::from([
                (key("111", "EC2", "us-east-1"), vec![10.0, 20.0]),
                (key("111", "S3", "us-east-1"), vec![30.0, 40.0]),
                (key("111", "RDS", "us-east-1"), vec![50.0, 60.0]),
            ]),
            delays: HashMap::from([
                ("EC2".to_string(), std::time::Duration::from_millis(80)),
                ("S3".to_string(), std::time::Duration::from_millis(40)),
            ]),
            ..FakeBilling::default()
        };
        let mut ctx = fake.context(date(2024, 5, 15));
        ctx.executor =
            BoundedExecutor::new(ExecutorConfig::default().with_concurrency(Concurrency::bounded(3)));

        let lines = change_report(&ctx, ChangeOptions { months: 2, limit: 2 })
            .await
            .unwrap();

        let services: Vec<&str> = lines.iter().map(|l| l.key.service.as_str()).collect();
        assert_eq!(services, vec!["EC2", "S3"]);
        assert!(lines.iter().all(|l| (l.delta.value() - 10.0).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_one_query_per_combination() {
        let fake = Arc::new(fake());
        let ctx = ReportContext::new(
            Arc::clone(&fake),
            BoundedExecutor::default(),
            crate::money::ExchangeRate::fixed(1.0),
            date(2024, 5, 15),
        );
        let lines = change_report(&ctx, ChangeOptions::default()).await.unwrap();

        assert_eq!(lines.len(), 4);
        assert_eq!(fake.cost_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_regions_means_no_queries() {
        let fake = FakeBilling {
            regions: Vec::new(),
            ..fake()
        };
        let lines = change_report(&fake.context(date(2024, 5, 15)), ChangeOptions::default())
            .await
            .unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_failing_query_fails_the_report() {
        let mut fake = FakeBilling {
            failing_service: Some("S3".into()),
            ..fake()
        };
        fake.accounts.truncate(1);
        let mut ctx = fake.context(date(2024, 5, 15));
        ctx.executor =
            BoundedExecutor::new(ExecutorConfig::default().with_concurrency(Concurrency::bounded(1)));

        let err = change_report(&ctx, ChangeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::Batch(BatchError::Query { index: 1, .. })
        ));
    }
}
