
//! Cost reports for AWS organizations.
//!
//! The crate fans a report out into many independent billing queries, runs
//! them with a bounded number in flight, and folds the results into ranked
//! report lines with amounts in USD and EUR.
//!
//! ## Layout
//!
//! - [`engine`] - query builder, bounded executor, result collector,
//!   aggregation and ranking
//! - [`money`] - amounts, currencies and the USD to EUR rate
//! - [`providers`] - billing service traits and the AWS implementation
//! - [`reports`] - the report flows served by the `spend` binary
//! - [`ui`] - table rendering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use spend::engine::BoundedExecutor;
//! use spend::money::resolve_rate;
//! use spend::providers::{AwsBilling, AwsConfig};
//! use spend::reports::{change_report, ChangeOptions, ReportContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let billing = Arc::new(AwsBilling::new(&AwsConfig::default())?);
//!     let rate = resolve_rate(&reqwest::Client::new(), spend::money::rate::DEFAULT_RATE_URL).await;
//!     let today = chrono::Utc::now().date_naive();
//!
//!     let ctx = ReportContext::new(billing, BoundedExecutor::default(), rate, today);
//!     for line in change_report(&ctx, ChangeOptions::default()).await? {
//!         println!(
//!             "{} {} {}: {}",
//!             line.key.account_name,
//!             line.key.service,
//!             line.key.region,
//!             line.delta.base.format()
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Custom queries
//!
//! Any list of dimensions can be expanded and executed directly:
//!
//! ```rust,ignore
//! use spend::engine::{build_queries, BoundedExecutor, Dimension, DimensionKey, TimeInterval};
//!
//! let interval = TimeInterval::last_full_months(today, 3)?;
//! let queries = build_queries(
//!     &[
//!         Dimension::new(DimensionKey::Service, ["Amazon S3", "AWS Lambda"]),
//!         Dimension::new(DimensionKey::Region, ["us-east-1", "eu-west-1"]),
//!     ],
//!     interval,
//! );
//!
//! let batch = BoundedExecutor::default()
//!     .run(queries, move |q| {
//!         let billing = Arc::clone(&billing);
//!         async move { billing.cost_and_usage(&CostQuery::from(&q)).await }
//!     })
//!     .await?;
//! ```

pub mod engine;
pub mod money;
pub mod providers;
pub mod reports;
pub mod ui;

pub use engine::{BatchError, BoundedExecutor, Concurrency, ExecutorConfig};
pub use money::{Amount, Currency, ExchangeRate, Money};
pub use providers::{AwsBilling, AwsConfig, ProviderError};
pub use reports::{ReportContext, ReportError};
