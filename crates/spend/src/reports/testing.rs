//! In-memory billing service for report tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::ReportContext;
use crate::engine::{BoundedExecutor, DimensionFilter, DimensionKey, TimeInterval};
use crate::money::ExchangeRate;
use crate::providers::{
    Account, AccountStatus, Budget, BudgetService, CostPoint, CostQuery, CostSeries,
    DimensionCatalog, ForecastQuery, GroupAmount, ProviderError, QueryService,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn account(id: &str, name: &str, status: AccountStatus) -> Account {
    Account {
        id: id.into(),
        name: name.into(),
        status,
    }
}

pub fn point(start: NaiveDate, amount: f64, estimated: bool) -> CostPoint {
    CostPoint {
        start,
        end: start.checked_add_months(chrono::Months::new(1)).unwrap(),
        amount,
        estimated,
        groups: Vec::new(),
    }
}

#[derive(Default)]
pub struct FakeBilling {
    pub accounts: Vec<Account>,
    pub services: Vec<String>,
    pub regions: Vec<String>,
    /// Monthly amounts keyed by (account, service, region).
    pub series: HashMap<(String, String, String), Vec<f64>>,
    /// Last month's cost per account, served to grouped queries.
    pub account_costs: HashMap<String, f64>,
    /// Forecast per account. Missing accounts have no forecast data.
    pub forecasts: HashMap<String, f64>,
    /// Served to unfiltered queries.
    pub totals: Vec<CostPoint>,
    pub budgets: Vec<Budget>,
    pub management_account: String,
    /// Queries filtered on this service fail.
    pub failing_service: Option<String>,
    /// Grouped cost queries for this account fail.
    pub failing_account: Option<String>,
    /// Forecasts for this account fail with a server error.
    pub failing_forecast: Option<String>,
    /// Queries filtered on a service sleep this long before answering.
    pub delays: HashMap<String, Duration>,
    pub cost_calls: AtomicUsize,
}

impl FakeBilling {
    pub fn context(self, today: NaiveDate) -> ReportContext {
        ReportContext::new(
            Arc::new(self),
            BoundedExecutor::default(),
            ExchangeRate::fixed(0.5),
            today,
        )
    }
}

fn filter_value(filters: &[DimensionFilter], key: DimensionKey) -> String {
    filters
        .iter()
        .find(|f| f.key == key)
        .map(|f| f.value.clone())
        .unwrap_or_default()
}

#[async_trait]
impl QueryService for FakeBilling {
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<CostSeries, ProviderError> {
        self.cost_calls.fetch_add(1, Ordering::SeqCst);

        if query.filters.is_empty() {
            return Ok(CostSeries {
                points: self.totals.clone(),
            });
        }

        let account = filter_value(&query.filters, DimensionKey::LinkedAccount);
        if query.group_by == Some(DimensionKey::LinkedAccount) {
            if self.failing_account.as_deref() == Some(account.as_str()) {
                return Err(ProviderError::Api {
                    status: 400,
                    code: "ValidationException".into(),
                    message: format!("bad account {account}"),
                });
            }
            let mut p = point(query.interval.start, 0.0, false);
            if let Some(&amount) = self.account_costs.get(&account) {
                p.amount = amount;
                p.groups.push(GroupAmount {
                    keys: vec![account],
                    amount,
                });
            }
            return Ok(CostSeries { points: vec![p] });
        }

        let service = filter_value(&query.filters, DimensionKey::Service);
        if let Some(delay) = self.delays.get(&service) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_service.as_deref() == Some(service.as_str()) {
            return Err(ProviderError::Api {
                status: 400,
                code: "ValidationException".into(),
                message: format!("bad service {service}"),
            });
        }
        let region = filter_value(&query.filters, DimensionKey::Region);
        let amounts = self
            .series
            .get(&(account, service, region))
            .cloned()
            .unwrap_or_default();

        let mut start = query.interval.start;
        let points = amounts
            .into_iter()
            .map(|amount| {
                let p = point(start, amount, false);
                start = p.end;
                p
            })
            .collect();
        Ok(CostSeries { points })
    }

    async fn cost_forecast(&self, query: &ForecastQuery) -> Result<Option<f64>, ProviderError> {
        let account = filter_value(&query.filters, DimensionKey::LinkedAccount);
        if self.failing_forecast.as_deref() == Some(account.as_str()) {
            return Err(ProviderError::Api {
                status: 500,
                code: "InternalServerError".into(),
                message: format!("forecast for {account} unavailable"),
            });
        }
        Ok(self.forecasts.get(&account).copied())
    }
}

#[async_trait]
impl DimensionCatalog for FakeBilling {
    async fn list_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        Ok(self.accounts.clone())
    }

    async fn dimension_values(
        &self,
        key: DimensionKey,
        _interval: TimeInterval,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(match key {
            DimensionKey::Service => self.services.clone(),
            DimensionKey::Region => self.regions.clone(),
            _ => Vec::new(),
        })
    }
}

#[async_trait]
impl BudgetService for FakeBilling {
    async fn management_account_id(&self) -> Result<String, ProviderError> {
        Ok(self.management_account.clone())
    }

    async fn describe_budgets(&self, account_id: &str) -> Result<Vec<Budget>, ProviderError> {
        if account_id == self.management_account {
            Ok(self.budgets.clone())
        } else {
            Err(ProviderError::NotFound(account_id.to_string()))
        }
    }
}
