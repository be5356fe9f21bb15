//! Bounded concurrent execution of independent queries.
//!
//! ```text
//! items ──▶ dispatcher ──(permit)──▶ JoinSet task ──(mpsc)──▶ Collector
//!               ▲                          │
//!               └──── CancellationToken ◀──┘ first failure
//! ```
//!
//! At most K tasks run at once. The dispatcher waits for a permit before
//! spawning the next task, and stops dispatching as soon as any task fails.
//! Tasks already in flight are allowed to finish and are drained by the
//! collector, but the batch as a whole is reported as failed.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::collector::{Batch, BoxError, Collector, QueryFailure, QueryResult};

/// Default number of queries in flight for cartesian batches.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default per-call timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A batch did not complete successfully.
#[derive(Error, Debug)]
pub enum BatchError {
    /// A query failed or timed out.
    #[error("query {index} ({descriptor}) failed: {source}")]
    Query {
        index: usize,
        descriptor: String,
        #[source]
        source: QueryFailure,
    },

    /// Fewer results arrived than items were submitted.
    #[error("expected {expected} results, received {received}")]
    Incomplete { expected: usize, received: usize },

    /// A query task panicked or was aborted.
    #[error("query task failed: {0}")]
    Join(#[from] JoinError),

    /// The concurrency limiter was closed while dispatching.
    #[error("concurrency limiter closed")]
    Closed,
}

/// How many queries may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// At most this many.
    Bounded(NonZeroUsize),
    /// One task per item. Meant for small inputs such as the account list.
    PerItem,
}

impl Concurrency {
    /// Largest usable limit. The result channel holds one slot more than the
    /// limit and both sit on tokio semaphores.
    pub const MAX: usize = Semaphore::MAX_PERMITS - 1;

    /// Bounded concurrency; zero is treated as one and values above
    /// [`Self::MAX`] are capped.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self::Bounded(NonZeroUsize::new(limit.min(Self::MAX)).unwrap_or(NonZeroUsize::MIN))
    }

    /// Effective limit for a batch of `items`, never above [`Self::MAX`].
    #[must_use]
    pub fn limit_for(self, items: usize) -> usize {
        let limit = match self {
            Self::Bounded(limit) => limit.get(),
            Self::PerItem => items.max(1),
        };
        limit.min(Self::MAX)
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::bounded(DEFAULT_MAX_CONCURRENCY)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(limit) => write!(f, "{limit}"),
            Self::PerItem => write!(f, "per-item"),
        }
    }
}

/// Executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub concurrency: Concurrency,
    /// Upper bound for a single query. `None` trusts the service's own limits.
    pub query_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::default(),
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }
}

/// Counters describing a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Items handed to a worker.
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of queries observed running at once.
    pub peak_in_flight: usize,
}

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Runs a query function over many items with a concurrency cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedExecutor {
    config: ExecutorConfig,
}

impl BoundedExecutor {
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Same executor with a different concurrency setting.
    #[must_use]
    pub fn with_concurrency(self, concurrency: Concurrency) -> Self {
        Self::new(self.config.with_concurrency(concurrency))
    }

    /// Execute `query` once per item and collect every payload.
    ///
    /// # Errors
    ///
    /// Fails if any query fails or times out, if a task panics, or if a
    /// result goes missing. No partial batch is returned.
    #[instrument(skip_all, fields(items = items.len(), concurrency = %self.config.concurrency))]
    pub async fn run<D, T, E, F, Fut>(
        &self,
        items: Vec<D>,
        query: F,
    ) -> Result<Batch<D, T>, BatchError>
    where
        D: fmt::Display + Clone + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let expected = items.len();
        let limit = self.config.concurrency.limit_for(expected);
        let semaphore = Arc::new(Semaphore::new(limit));
        let cancel = CancellationToken::new();
        let gauge = Arc::new(InFlight::default());
        let query = Arc::new(query);

        let (tx, rx) = mpsc::channel(limit + 1);
        let collector = Collector::spawn(rx);
        let mut tasks = JoinSet::new();
        let mut submitted = 0;
        let mut panicked: Option<JoinError> = None;

        debug!(limit, "dispatching batch");

        for (index, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_| BatchError::Closed)?
                }
            };
            if cancel.is_cancelled() {
                break;
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(err) = joined {
                    cancel.cancel();
                    panicked.get_or_insert(err);
                }
            }
            if panicked.is_some() {
                break;
            }

            let tx = tx.clone();
            let query = Arc::clone(&query);
            let cancel = cancel.clone();
            let gauge = Arc::clone(&gauge);
            let timeout = self.config.query_timeout;
            submitted += 1;

            tasks.spawn(async move {
                gauge.enter();
                let descriptor = item.clone();
                let call = (*query)(item);
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(result) => result.map_err(|e| QueryFailure::Service(e.into())),
                        Err(_) => Err(QueryFailure::Timeout(limit)),
                    },
                    None => call.await.map_err(|e| QueryFailure::Service(e.into())),
                };
                gauge.leave();

                // Cancel before releasing the slot so the dispatcher never
                // starts another item after a failure.
                if outcome.is_err() {
                    cancel.cancel();
                }
                drop(permit);

                // The collector holds the receiver until every sender is gone.
                let _ = tx
                    .send(QueryResult {
                        index,
                        descriptor,
                        outcome,
                    })
                    .await;
            });
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                panicked.get_or_insert(err);
            }
        }

        let collected = collector.await?;
        if let Some(err) = panicked {
            return Err(BatchError::Join(err));
        }

        let stats = BatchStats {
            submitted,
            succeeded: collected.succeeded(),
            failed: collected.failed(),
            peak_in_flight: gauge.peak(),
        };
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            peak_in_flight = stats.peak_in_flight,
            cancelled = cancel.is_cancelled(),
            "batch finished"
        );

        collected.finish(expected, stats)
    }
}
