//! Spend CLI - cost reports for AWS organizations.
//!
//! This binary uses println! for report output on stdout. Logs go to stderr.

#![allow(clippy::disallowed_macros)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spend::engine::{Concurrency, ExecutorConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_QUERY_TIMEOUT};
use spend::money::rate::DEFAULT_RATE_URL;
use spend::money::{resolve_rate, ExchangeRate, RateSource};
use spend::providers::aws::DEFAULT_REGION;
use spend::providers::{AwsBilling, AwsConfig};
use spend::reports::change::{DEFAULT_LIMIT, DEFAULT_LOOKBACK_MONTHS};
use spend::reports::{
    accounts_report, bills_report, budgets_report, change_report, list_report, switch_url,
    ChangeOptions, ReportContext, DEFAULT_BILL_MONTHS,
};
use spend::{ui, BoundedExecutor};

/// Spend CLI - Cost reports for AWS organizations.
#[derive(Parser)]
#[command(name = "spend")]
#[command(about = "Cost reports for AWS organizations")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// AWS region used to sign and route requests
    #[arg(long, global = true, env = "SPEND_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Send every AWS request to this URL instead of the public endpoints
    #[arg(long, global = true, env = "SPEND_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Exchange rate endpoint
    #[arg(long, global = true, env = "SPEND_RATE_URL", default_value = DEFAULT_RATE_URL)]
    rate_url: String,

    /// Skip the rate lookup and use the built-in USD to EUR rate
    #[arg(long, global = true)]
    no_rate_fetch: bool,

    /// Maximum cost queries in flight
    #[arg(long, global = true, env = "SPEND_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Per-query timeout in seconds, also applied to each HTTP request (0 disables it)
    #[arg(long, global = true, env = "SPEND_QUERY_TIMEOUT_SECS", default_value_t = DEFAULT_QUERY_TIMEOUT.as_secs())]
    query_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Biggest cost increases per account, service and region
    Change {
        /// Full months to compare
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_MONTHS)]
        months: u32,

        /// Lines to show
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Last month's cost and this month's forecast per account
    Accounts,

    /// Monthly bills, newest first
    Bills {
        /// Full months to show
        #[arg(long, default_value_t = DEFAULT_BILL_MONTHS)]
        months: u32,
    },

    /// Budgets of the management account
    Budgets,

    /// List the organization's accounts
    List,

    /// Print the console switch-role URL for an account
    Switch {
        /// Account name or ID
        account: String,

        /// Role to assume in the target account
        #[arg(long, env = "SPEND_SWITCH_ROLE_NAME")]
        role_name: Option<String>,
    },
}

impl Commands {
    fn shows_money(&self) -> bool {
        !matches!(self, Self::List | Self::Switch { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("spend=debug,info")
    } else {
        EnvFilter::new("spend=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let shows_money = cli.command.shows_money();
    let rate = if cli.no_rate_fetch || !shows_money {
        ExchangeRate::fallback()
    } else {
        resolve_rate(&reqwest::Client::new(), &cli.rate_url).await
    };

    let query_timeout = (cli.query_timeout > 0).then(|| Duration::from_secs(cli.query_timeout));

    let aws = AwsConfig {
        region: cli.region.clone(),
        endpoint_url: cli.endpoint_url.clone(),
        timeout: query_timeout,
    };
    let billing = Arc::new(AwsBilling::new(&aws).context("Failed to create AWS client")?);

    let executor = BoundedExecutor::new(
        ExecutorConfig::default()
            .with_concurrency(Concurrency::bounded(cli.max_concurrency))
            .with_query_timeout(query_timeout),
    );

    let today = chrono::Utc::now().date_naive();
    let ctx = ReportContext::new(billing, executor, rate, today);
    let format = cli.format;

    tracing::debug!(
        region = %aws.region,
        concurrency = %executor.config().concurrency,
        rate = rate.rate,
        "Starting report"
    );

    match cli.command {
        Commands::Change { months, limit } => {
            let lines = change_report(&ctx, ChangeOptions { months, limit })
                .await
                .context("Failed to build change report")?;
            emit(format, &lines, || ui::change_table(&lines).to_string())?;
        }
        Commands::Accounts => {
            let lines = accounts_report(&ctx)
                .await
                .context("Failed to build accounts report")?;
            emit(format, &lines, || ui::accounts_table(&lines).to_string())?;
        }
        Commands::Bills { months } => {
            let lines = bills_report(&ctx, months)
                .await
                .context("Failed to build bills report")?;
            emit(format, &lines, || ui::bills_table(&lines).to_string())?;
        }
        Commands::Budgets => {
            let lines = budgets_report(&ctx)
                .await
                .context("Failed to build budgets report")?;
            emit(format, &lines, || ui::budgets_table(&lines).to_string())?;
        }
        Commands::List => {
            let accounts = list_report(&ctx).await.context("Failed to list accounts")?;
            emit(format, &accounts, || ui::account_list_table(&accounts).to_string())?;
        }
        Commands::Switch { account, role_name } => {
            let url = switch_url(&ctx, &account, role_name.as_deref())
                .await
                .with_context(|| format!("Failed to build switch URL for {account}"))?;
            match format {
                OutputFormat::Text => println!("{url}"),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "account": account, "url": url.as_str() }));
                }
            }
        }
    }

    if shows_money && format == OutputFormat::Text {
        print_rate(&rate);
    }

    Ok(())
}

fn emit<T: Serialize>(format: OutputFormat, records: &T, table: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", table()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(records).context("Failed to serialize report")?
        ),
    }
    Ok(())
}

fn print_rate(rate: &ExchangeRate) {
    let line = format!("1 {} = {:.6} {}", rate.base, rate.rate, rate.quote);
    match rate.source {
        RateSource::Live => eprintln!("{}", line.dimmed()),
        RateSource::Fallback => eprintln!("{} {}", line.yellow(), "(fallback rate)".yellow()),
    }
}
