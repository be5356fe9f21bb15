//! Fan-out/fan-in aggregation engine.
//!
//! ```text
//! dimensions ─▶ build_queries ─▶ BoundedExecutor ─▶ Collector ─▶ aggregate ─▶ rank
//! ```

pub mod aggregate;
pub mod collector;
pub mod executor;
pub mod query;
pub mod rank;

pub use aggregate::{join_records, series_record, DerivedRecord, SeriesDelta};
pub use collector::{Batch, BoxError, Collected, Collector, Completed, QueryFailure, QueryResult};
pub use executor::{
    BatchError, BatchStats, BoundedExecutor, Concurrency, ExecutorConfig, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_QUERY_TIMEOUT,
};
pub use query::{
    build_queries, Dimension, DimensionFilter, DimensionKey, InvalidInterval, QueryDescriptor,
    TimeInterval,
};
pub use rank::{rank, RankStrategy, Rankable};
