//! Ordering and truncation of report records.

use std::cmp::Ordering;

use super::aggregate::DerivedRecord;

/// Anything the ranker can order.
pub trait Rankable {
    /// Primary metric for metric ranking.
    fn metric(&self) -> f64;

    /// Sort key for name ordering.
    fn name(&self) -> &str;
}

impl<K: AsRef<str>> Rankable for DerivedRecord<K> {
    fn metric(&self) -> f64 {
        self.delta.value()
    }

    fn name(&self) -> &str {
        self.key.as_ref()
    }
}

/// How a report is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankStrategy {
    /// Highest metric first, at most `limit` records.
    TopByMetric { limit: usize },
    /// Name ascending, nothing dropped.
    ByName,
}

/// Order `records` according to `strategy`.
///
/// Both strategies are stable: records that compare equal keep their input
/// order.
#[must_use]
pub fn rank<R: Rankable>(mut records: Vec<R>, strategy: RankStrategy) -> Vec<R> {
    match strategy {
        RankStrategy::TopByMetric { limit } => {
            records.sort_by(|a, b| descending(a.metric(), b.metric()));
            records.truncate(limit);
        }
        RankStrategy::ByName => records.sort_by(|a, b| a.name().cmp(b.name())),
    }
    records
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        delta: f64,
    }

    impl Rankable for Row {
        fn metric(&self) -> f64 {
            self.delta
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "w",
                delta: 5.0,
            },
            Row {
                name: "x",
                delta: -3.0,
            },
            Row {
                name: "y",
                delta: 10.0,
            },
            Row {
                name: "z",
                delta: 10.0,
            },
        ]
    }

    #[test]
    fn test_top_by_metric_keeps_tie_order() {
        let ranked = rank(rows(), RankStrategy::TopByMetric { limit: 2 });
        let names: Vec<&str> = ranked.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["y", "z"]);
    }

    #[test]
    fn test_limit_larger_than_input() {
        let ranked = rank(rows(), RankStrategy::TopByMetric { limit: 100 });
        let names: Vec<&str> = ranked.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["y", "z", "w", "x"]);
    }

    #[test]
    fn test_by_name_does_not_truncate() {
        let mut input = rows();
        input.reverse();
        let ranked = rank(input, RankStrategy::ByName);
        let names: Vec<&str> = ranked.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["w", "x", "y", "z"]);
    }

    #[test]
    fn test_zero_limit() {
        assert!(rank(rows(), RankStrategy::TopByMetric { limit: 0 }).is_empty());
    }
}
