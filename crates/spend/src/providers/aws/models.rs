//! AWS JSON protocol request and response models.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsErrorBody {
    /// Fully qualified error type, e.g. `com.amazonaws.ce#DataUnavailableException`.
    #[serde(rename = "__type")]
    pub kind: Option<String>,
    #[serde(alias = "Message")]
    pub message: Option<String>,
}

impl AwsErrorBody {
    /// Short error code without the namespace prefix.
    #[must_use]
    pub fn code(&self) -> String {
        self.kind
            .as_deref()
            .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
            .unwrap_or_default()
    }
}

// ============================================================================
// Cost Explorer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimensionValues {
    pub key: String,
    pub values: Vec<String>,
}

/// Filter expression. Exactly one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Expression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<DimensionValues>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupDefinition {
    #[serde(rename = "Type")]
    pub kind: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostAndUsageRequest {
    pub time_period: DateInterval,
    pub granularity: String,
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: DateInterval,
    #[serde(default)]
    pub total: HashMap<String, MetricValue>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostAndUsageResponse {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostForecastRequest {
    pub time_period: DateInterval,
    pub metric: String,
    pub granularity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForecastResult {
    pub time_period: Option<DateInterval>,
    pub mean_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostForecastResponse {
    pub total: Option<MetricValue>,
    #[serde(default)]
    pub forecast_results_by_time: Vec<ForecastResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetDimensionValuesRequest {
    pub time_period: DateInterval,
    pub dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimensionValue {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetDimensionValuesResponse {
    #[serde(default)]
    pub dimension_values: Vec<DimensionValue>,
    pub next_page_token: Option<String>,
}

// ============================================================================
// Organizations
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAccountsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationAccount {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<OrganizationAccount>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organization {
    pub master_account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeOrganizationResponse {
    pub organization: Organization,
}

// ============================================================================
// Budgets
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeBudgetsRequest {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Spend {
    pub amount: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalculatedSpend {
    pub actual_spend: Option<Spend>,
    pub forecasted_spend: Option<Spend>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsBudget {
    pub budget_name: String,
    pub budget_limit: Option<Spend>,
    pub calculated_spend: Option<CalculatedSpend>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeBudgetsResponse {
    #[serde(default)]
    pub budgets: Vec<AwsBudget>,
    pub next_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strips_namespace() {
        let body: AwsErrorBody = serde_json::from_str(
            r#"{"__type":"com.amazonaws.ce#DataUnavailableException","Message":"no data"}"#,
        )
        .unwrap();
        assert_eq!(body.code(), "DataUnavailableException");
        assert_eq!(body.message.as_deref(), Some("no data"));

        let bare: AwsErrorBody = serde_json::from_str(r#"{"__type":"ThrottlingException"}"#).unwrap();
        assert_eq!(bare.code(), "ThrottlingException");
    }

    #[test]
    fn test_request_serializes_pascal_case() {
        let request = GetCostAndUsageRequest {
            time_period: DateInterval {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            },
            granularity: "MONTHLY".into(),
            metrics: vec!["UnblendedCost".into()],
            filter: None,
            group_by: vec![GroupDefinition {
                kind: "DIMENSION".into(),
                key: "LINKED_ACCOUNT".into(),
            }],
            next_page_token: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["TimePeriod"]["Start"], "2024-01-01");
        assert_eq!(json["GroupBy"][0]["Type"], "DIMENSION");
        assert!(json.get("Filter").is_none());
        assert!(json.get("NextPageToken").is_none());
    }
}
