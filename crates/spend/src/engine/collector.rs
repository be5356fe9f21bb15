//! Streaming result collection for the bounded executor.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::executor::{BatchError, BatchStats};

/// Boxed error returned by a query function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single query produced no payload.
#[derive(Error, Debug)]
pub enum QueryFailure {
    /// The query function returned an error.
    #[error("{0}")]
    Service(#[source] BoxError),

    /// The query did not finish within the per-call timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one submitted work item.
#[derive(Debug)]
pub struct QueryResult<D, T> {
    /// Position of the item in the submitted sequence.
    pub index: usize,
    pub descriptor: D,
    pub outcome: Result<T, QueryFailure>,
}

/// A successful result, as handed to the aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<D, T> {
    /// Position of the item in the submitted sequence.
    pub index: usize,
    pub descriptor: D,
    pub payload: T,
}

/// Drains results from running tasks into memory.
///
/// The collector runs on its own task so that workers never wait on a slow
/// consumer, and stops once every sender has been dropped.
pub struct Collector;

impl Collector {
    /// Spawn the draining task.
    pub fn spawn<D, T>(
        mut receiver: mpsc::Receiver<QueryResult<D, T>>,
    ) -> JoinHandle<Collected<D, T>>
    where
        D: Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(async move {
            let mut results = Vec::new();
            while let Some(result) = receiver.recv().await {
                match &result.outcome {
                    Ok(_) => trace!(index = result.index, "query completed"),
                    Err(error) => warn!(index = result.index, error = %error, "query failed"),
                }
                results.push(result);
            }
            Collected { results }
        })
    }
}

/// Everything the collector received, in arrival order.
#[derive(Debug)]
pub struct Collected<D, T> {
    results: Vec<QueryResult<D, T>>,
}

impl<D, T> Collected<D, T> {
    /// Number of results received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of successful results.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    /// Number of failed results.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Turn the drained results into a batch.
    ///
    /// # Errors
    ///
    /// Returns the first failure in arrival order, or
    /// [`BatchError::Incomplete`] when fewer than `expected` results arrived.
    pub fn finish(self, expected: usize, stats: BatchStats) -> Result<Batch<D, T>, BatchError>
    where
        D: fmt::Display,
    {
        let mut completed = Vec::with_capacity(self.results.len());
        for result in self.results {
            match result.outcome {
                Ok(payload) => completed.push(Completed {
                    index: result.index,
                    descriptor: result.descriptor,
                    payload,
                }),
                Err(source) => {
                    return Err(BatchError::Query {
                        index: result.index,
                        descriptor: result.descriptor.to_string(),
                        source,
                    })
                }
            }
        }

        if completed.len() != expected {
            return Err(BatchError::Incomplete {
                expected,
                received: completed.len(),
            });
        }

        Ok(Batch {
            results: completed,
            stats,
        })
    }
}

/// A fully successful batch.
#[derive(Debug, Clone)]
pub struct Batch<D, T> {
    results: Vec<Completed<D, T>>,
    stats: BatchStats,
}

impl<D, T> Batch<D, T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Results in the order they completed.
    #[must_use]
    pub fn into_results(self) -> Vec<Completed<D, T>> {
        self.results
    }

    /// Results in the order the items were submitted.
    #[must_use]
    pub fn into_submission_order(mut self) -> Vec<Completed<D, T>> {
        self.results.sort_by_key(|c| c.index);
        self.results
    }
}
