//! AWS Cost Explorer, Organizations and Budgets.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spend::providers::aws::{AwsBilling, AwsConfig};
//! use spend::providers::DimensionCatalog;
//!
//! let aws = AwsBilling::new(&AwsConfig::default())?;
//! for account in aws.list_accounts().await? {
//!     println!("{} {}", account.id, account.name);
//! }
//! ```

mod client;
mod models;

pub use client::{AwsBilling, AwsConfig, DEFAULT_REGION, DEFAULT_TIMEOUT_SECS};
