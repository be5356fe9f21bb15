//! Budgets of the management account.

use serde::Serialize;
use tracing::{debug, instrument};

use super::{ReportContext, ReportError};
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetLine {
    pub name: String,
    pub limit: Money,
    pub spend: Money,
    pub forecast: Money,
    /// Limit minus forecast. Negative means the forecast overshoots.
    pub delta: Money,
}

/// Every budget defined in the organization's management account, in the
/// order the service returns them.
///
/// # Errors
///
/// Fails if the management account or its budgets cannot be looked up.
#[instrument(skip(ctx))]
pub async fn budgets_report(ctx: &ReportContext) -> Result<Vec<BudgetLine>, ReportError> {
    let account_id = ctx.budgets.management_account_id().await?;
    debug!(account_id = %account_id, "describing budgets");
    let budgets = ctx.budgets.describe_budgets(&account_id).await?;

    Ok(budgets
        .into_iter()
        .map(|b| BudgetLine {
            limit: Money::new(b.limit, &ctx.rate),
            spend: Money::new(b.actual_spend, &ctx.rate),
            forecast: Money::new(b.forecasted_spend, &ctx.rate),
            delta: Money::new(b.limit - b.forecasted_spend, &ctx.rate),
            name: b.name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Budget;
    use crate::reports::testing::{date, FakeBilling};

    #[tokio::test]
    async fn test_delta_is_limit_minus_forecast() {
        let fake = FakeBilling {
            management_account: "999".into(),
            budgets: vec![
                Budget {
                    name: "monthly".into(),
                    limit: 1000.0,
                    actual_spend: 400.0,
                    forecasted_spend: 1200.0,
                },
                Budget {
                    name: "sandbox".into(),
                    limit: 100.0,
                    actual_spend: 10.0,
                    forecasted_spend: 20.0,
                },
            ],
            ..FakeBilling::default()
        };
        let lines = budgets_report(&fake.context(date(2024, 5, 10))).await.unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "monthly");
        assert!((lines[0].delta.value() + 200.0).abs() < 1e-9);
        assert!((lines[0].spend.converted.value - 200.0).abs() < 1e-9);
        assert!((lines[1].delta.value() - 80.0).abs() < 1e-9);
    }
}
