//! AWS billing API client.
//!
//! Talks the AWS JSON 1.1 protocol: every call is a POST to the service
//! endpoint with the operation named in the `X-Amz-Target` header.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::models::{
    AwsBudget, AwsErrorBody, DateInterval, DescribeBudgetsRequest, DescribeBudgetsResponse,
    DescribeOrganizationResponse, DimensionValues, Expression, GetCostAndUsageRequest,
    GetCostAndUsageResponse, GetCostForecastRequest, GetCostForecastResponse,
    GetDimensionValuesRequest, GetDimensionValuesResponse, GroupDefinition, ListAccountsRequest,
    ListAccountsResponse, MetricValue, ResultByTime, Spend,
};
use crate::engine::query::{DimensionFilter, DimensionKey, TimeInterval};
use crate::providers::traits::{
    parse_amount, Account, AccountStatus, Budget, BudgetService, CostPoint, CostQuery,
    CostSeries, DimensionCatalog, ForecastQuery, GroupAmount, ProviderError, QueryService,
};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cost Explorer and Organizations only serve this region.
pub const DEFAULT_REGION: &str = "us-east-1";

const BUDGETS_ENDPOINT: &str = "https://budgets.amazonaws.com";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

const COST_METRIC: &str = "UnblendedCost";
const FORECAST_METRIC: &str = "UNBLENDED_COST";
const GRANULARITY: &str = "MONTHLY";

const CE_TARGET: &str = "AWSInsightsIndexService";
const ORGANIZATIONS_TARGET: &str = "AWSOrganizationsV20161128";
const BUDGETS_TARGET: &str = "AWSBudgetServiceGateway";

/// Error code Cost Explorer returns when there is nothing to forecast from.
const DATA_UNAVAILABLE: &str = "DataUnavailableException";

/// Connection settings for [`AwsBilling`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Region used to build the Cost Explorer and Organizations endpoints.
    pub region: String,
    /// Send every request here instead of the AWS endpoints.
    pub endpoint_url: Option<String>,
    /// HTTP timeout per request. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl AwsConfig {
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cost Explorer, Organizations and Budgets behind one client.
#[derive(Debug, Clone)]
pub struct AwsBilling {
    client: Client,
    cost_explorer: String,
    organizations: String,
    budgets: String,
}

impl AwsBilling {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is empty or the HTTP client cannot be
    /// created.
    pub fn new(config: &AwsConfig) -> Result<Self, ProviderError> {
        if config.region.trim().is_empty() {
            return Err(ProviderError::Config("AWS region is required".to_string()));
        }

        let mut builder =
            Client::builder().user_agent(concat!("spend/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ProviderError::Http)?;

        let (cost_explorer, organizations, budgets) = match &config.endpoint_url {
            Some(url) => {
                let url = url.trim_end_matches('/').to_string();
                (url.clone(), url.clone(), url)
            }
            None => (
                format!("https://ce.{}.amazonaws.com", config.region),
                format!("https://organizations.{}.amazonaws.com", config.region),
                BUDGETS_ENDPOINT.to_string(),
            ),
        };

        Ok(Self {
            client,
            cost_explorer,
            organizations,
            budgets,
        })
    }

    /// Make a JSON protocol call.
    async fn call<Req, Resp>(
        &self,
        endpoint: &str,
        target: &str,
        body: &Req,
    ) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        debug!(endpoint = %endpoint, target = %target, "AWS request");

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", target)
            .header(
                "X-Amz-Date",
                chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
            )
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Map the HTTP status and body to a result.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ProviderError::Serialization(e)
            });
        }

        let error: Option<AwsErrorBody> = serde_json::from_str(&text).ok();
        let code = error.as_ref().map(AwsErrorBody::code).unwrap_or_default();
        let message = error
            .and_then(|e| e.message)
            .unwrap_or_else(|| text.clone());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Auth(message)),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(message)),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited(message)),
            _ if code == "ThrottlingException" || code == "LimitExceededException" => {
                Err(ProviderError::RateLimited(message))
            }
            _ => Err(ProviderError::Api {
                status: status.as_u16(),
                code,
                message,
            }),
        }
    }

    fn target(service: &str, operation: &str) -> String {
        format!("{service}.{operation}")
    }

    fn period(interval: TimeInterval) -> DateInterval {
        DateInterval {
            start: interval.start,
            end: interval.end,
        }
    }

    /// Build a filter expression. Cost Explorer rejects an `And` with fewer
    /// than two operands, so a single constraint is sent bare.
    fn filter_expression(filters: &[DimensionFilter]) -> Option<Expression> {
        let mut expressions: Vec<Expression> = filters
            .iter()
            .map(|f| Expression {
                and: None,
                dimensions: Some(DimensionValues {
                    key: f.key.as_str().to_string(),
                    values: vec![f.value.clone()],
                }),
            })
            .collect();

        match expressions.len() {
            0 => None,
            1 => expressions.pop(),
            _ => Some(Expression {
                and: Some(expressions),
                dimensions: None,
            }),
        }
    }

    fn metric_amount(metrics: &HashMap<String, MetricValue>) -> Result<f64, ProviderError> {
        metrics
            .get(COST_METRIC)
            .map_or(Ok(0.0), |m| parse_amount("Amount", &m.amount))
    }

    fn convert_result(result: &ResultByTime) -> Result<CostPoint, ProviderError> {
        let groups = result
            .groups
            .iter()
            .map(|g| {
                Ok(GroupAmount {
                    keys: g.keys.clone(),
                    amount: Self::metric_amount(&g.metrics)?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(CostPoint {
            start: result.time_period.start,
            end: result.time_period.end,
            amount: Self::metric_amount(&result.total)?,
            estimated: result.estimated,
            groups,
        })
    }

    /// Grouped results can split one period across pages. Later pages only
    /// add groups; the period total is taken from the first page.
    fn merge_point(points: &mut Vec<CostPoint>, point: CostPoint) {
        match points
            .iter_mut()
            .find(|p| p.start == point.start && p.end == point.end)
        {
            Some(existing) => {
                existing.groups.extend(point.groups);
                existing.estimated |= point.estimated;
            }
            None => points.push(point),
        }
    }

    fn spend_amount(field: &'static str, spend: Option<&Spend>) -> Result<f64, ProviderError> {
        spend.map_or(Ok(0.0), |s| parse_amount(field, &s.amount))
    }

    fn convert_budget(budget: &AwsBudget) -> Result<Budget, ProviderError> {
        let calculated = budget.calculated_spend.as_ref();
        Ok(Budget {
            name: budget.budget_name.clone(),
            limit: Self::spend_amount("BudgetLimit", budget.budget_limit.as_ref())?,
            actual_spend: Self::spend_amount(
                "ActualSpend",
                calculated.and_then(|c| c.actual_spend.as_ref()),
            )?,
            forecasted_spend: Self::spend_amount(
                "ForecastedSpend",
                calculated.and_then(|c| c.forecasted_spend.as_ref()),
            )?,
        })
    }

    fn convert_status(status: &str) -> AccountStatus {
        match status {
            "SUSPENDED" => AccountStatus::Suspended,
            "PENDING_CLOSURE" => AccountStatus::PendingClosure,
            _ => AccountStatus::Active,
        }
    }
}

#[async_trait]
impl QueryService for AwsBilling {
    #[instrument(skip(self), fields(provider = "aws"))]
    async fn cost_and_usage(&self, query: &CostQuery) -> Result<CostSeries, ProviderError> {
        let target = Self::target(CE_TARGET, "GetCostAndUsage");
        let mut request = GetCostAndUsageRequest {
            time_period: Self::period(query.interval),
            granularity: GRANULARITY.to_string(),
            metrics: vec![COST_METRIC.to_string()],
            filter: Self::filter_expression(&query.filters),
            group_by: query
                .group_by
                .map(|key| GroupDefinition {
                    kind: "DIMENSION".to_string(),
                    key: key.as_str().to_string(),
                })
                .into_iter()
                .collect(),
            next_page_token: None,
        };

        let mut points = Vec::new();
        loop {
            let response: GetCostAndUsageResponse =
                self.call(&self.cost_explorer, &target, &request).await?;
            for result in &response.results_by_time {
                Self::merge_point(&mut points, Self::convert_result(result)?);
            }

            match response.next_page_token {
                Some(token) if !token.is_empty() => request.next_page_token = Some(token),
                _ => break,
            }
        }

        Ok(CostSeries { points })
    }

    #[instrument(skip(self), fields(provider = "aws"))]
    async fn cost_forecast(&self, query: &ForecastQuery) -> Result<Option<f64>, ProviderError> {
        let request = GetCostForecastRequest {
            time_period: Self::period(query.interval),
            metric: FORECAST_METRIC.to_string(),
            granularity: GRANULARITY.to_string(),
            filter: Self::filter_expression(&query.filters),
        };

        let response: GetCostForecastResponse = match self
            .call(
                &self.cost_explorer,
                &Self::target(CE_TARGET, "GetCostForecast"),
                &request,
            )
            .await
        {
            Ok(response) => response,
            Err(ProviderError::Api { code, message, .. }) if code == DATA_UNAVAILABLE => {
                debug!(message = %message, "No forecast data");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mean = response
            .forecast_results_by_time
            .first()
            .and_then(|r| r.mean_value.as_deref())
            .or(response.total.as_ref().map(|t| t.amount.as_str()));

        mean.map(|value| parse_amount("MeanValue", value)).transpose()
    }
}

#[async_trait]
impl DimensionCatalog for AwsBilling {
    #[instrument(skip(self), fields(provider = "aws"))]
    async fn list_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let target = Self::target(ORGANIZATIONS_TARGET, "ListAccounts");
        let mut request = ListAccountsRequest::default();
        let mut accounts = Vec::new();

        loop {
            let response: ListAccountsResponse =
                self.call(&self.organizations, &target, &request).await?;
            accounts.extend(response.accounts.into_iter().map(|a| Account {
                status: Self::convert_status(&a.status),
                id: a.id,
                name: a.name,
            }));

            match response.next_token {
                Some(token) if !token.is_empty() => request.next_token = Some(token),
                _ => break,
            }
        }

        debug!(count = accounts.len(), "Listed accounts");
        Ok(accounts)
    }

    #[instrument(skip(self), fields(provider = "aws"))]
    async fn dimension_values(
        &self,
        key: DimensionKey,
        interval: TimeInterval,
    ) -> Result<Vec<String>, ProviderError> {
        let target = Self::target(CE_TARGET, "GetDimensionValues");
        let mut request = GetDimensionValuesRequest {
            time_period: Self::period(interval),
            dimension: key.as_str().to_string(),
            next_page_token: None,
        };
        let mut values = Vec::new();

        loop {
            let response: GetDimensionValuesResponse =
                self.call(&self.cost_explorer, &target, &request).await?;
            values.extend(response.dimension_values.into_iter().map(|v| v.value));

            match response.next_page_token {
                Some(token) if !token.is_empty() => request.next_page_token = Some(token),
                _ => break,
            }
        }

        Ok(values)
    }
}

#[async_trait]
impl BudgetService for AwsBilling {
    #[instrument(skip(self), fields(provider = "aws"))]
    async fn management_account_id(&self) -> Result<String, ProviderError> {
        let response: DescribeOrganizationResponse = self
            .call(
                &self.organizations,
                &Self::target(ORGANIZATIONS_TARGET, "DescribeOrganization"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(response.organization.master_account_id)
    }

    #[instrument(skip(self), fields(provider = "aws"))]
    async fn describe_budgets(&self, account_id: &str) -> Result<Vec<Budget>, ProviderError> {
        let target = Self::target(BUDGETS_TARGET, "DescribeBudgets");
        let mut request = DescribeBudgetsRequest {
            account_id: account_id.to_string(),
            next_token: None,
        };
        let mut budgets = Vec::new();

        loop {
            let response: DescribeBudgetsResponse =
                self.call(&self.budgets, &target, &request).await?;
            for budget in &response.budgets {
                budgets.push(Self::convert_budget(budget)?);
            }

            match response.next_token {
                Some(token) if !token.is_empty() => request.next_token = Some(token),
                _ => break,
            }
        }

        Ok(budgets)
    }
}
