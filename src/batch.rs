//! Concurrent batch k-NN query dispatch

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;

use tracing::debug;

use crate::engine::SearchIndex;
use crate::error::{Error, Result};
use crate::point::{DataPoint, PointId};

/// Clamp a requested worker count to something the batch can use.
///
/// Zero workers would never drain the queue, and more workers than queries
/// just idle, so the count is clamped to `1..=queries`.
pub(crate) fn clamp_workers(requested: usize, queries: usize) -> usize {
    requested.clamp(1, queries.max(1))
}

/// Run `queries.len()` independent k-NN searches over a shared read-only
/// structure, returning results in input order.
///
/// Work distribution is a shared queue of `(slot, query)` items popped
/// under a mutex; each worker writes its ranked ids back through a channel
/// keyed by slot, so scheduling order never affects result order. A failed
/// search aborts the whole batch: remaining workers observe the failure
/// flag between items and stop early, and the error reported is the one
/// from the failing query with the smallest input index.
pub(crate) fn knn_query_batch(
    index: &dyn SearchIndex,
    num_workers: usize,
    k: usize,
    queries: Vec<DataPoint>,
) -> Result<Vec<Vec<PointId>>> {
    let total = queries.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let workers = clamp_workers(num_workers, total);
    debug!("Dispatching {} queries across {} workers, k={}", total, workers, k);

    let queue: Mutex<VecDeque<(usize, DataPoint)>> =
        Mutex::new(queries.into_iter().enumerate().collect());
    let failed = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(usize, Result<Vec<PointId>>)>();

    thread::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let failed = &failed;
            s.spawn(move || loop {
                if failed.load(Ordering::Relaxed) {
                    break;
                }
                let item = queue.lock().unwrap().pop_front();
                let Some((slot, query)) = item else {
                    break;
                };
                let result = index.search(query.vector(), k);
                if result.is_err() {
                    failed.store(true, Ordering::Relaxed);
                }
                if tx.send((slot, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<Vec<PointId>> = vec![Vec::new(); total];
    let mut first_error: Option<(usize, Error)> = None;
    for (slot, result) in rx {
        match result {
            Ok(ids) => results[slot] = ids,
            Err(e) => match &first_error {
                Some((prev, _)) if *prev <= slot => {}
                _ => first_error = Some((slot, e)),
            },
        }
    }

    match first_error {
        Some((_, e)) => Err(e),
        None => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::params::Params;

    #[test]
    fn test_clamp_workers() {
        assert_eq!(clamp_workers(0, 10), 1);
        assert_eq!(clamp_workers(4, 10), 4);
        assert_eq!(clamp_workers(64, 10), 10);
        assert_eq!(clamp_workers(0, 0), 1);
    }

    /// Stub structure that echoes the query's first element as an id, or
    /// fails for negative queries.
    struct Echo;

    impl SearchIndex for Echo {
        fn build(&mut self, _params: &Params) -> Result<()> {
            Ok(())
        }
        fn save(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn load(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn set_query_time_params(&mut self, _params: &Params) -> Result<()> {
            Ok(())
        }
        fn search(&self, query: &[f32], _k: usize) -> Result<Vec<PointId>> {
            if query[0] < 0.0 {
                return Err(Error::DataFormat(format!("bad query {}", query[0])));
            }
            Ok(vec![query[0] as PointId])
        }
    }

    fn queries(values: &[f32]) -> Vec<DataPoint> {
        values.iter().map(|v| DataPoint::new(0, &[*v])).collect()
    }

    #[test]
    fn test_results_in_input_order() {
        let out = knn_query_batch(&Echo, 3, 1, queries(&[5.0, 1.0, 9.0, 2.0])).unwrap();
        assert_eq!(out, vec![vec![5], vec![1], vec![9], vec![2]]);
    }

    #[test]
    fn test_empty_batch() {
        let out = knn_query_batch(&Echo, 4, 1, Vec::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_worker_matches_many_workers() {
        let input: Vec<f32> = (0..50).map(|i| i as f32).collect();
        let sequential = knn_query_batch(&Echo, 1, 1, queries(&input)).unwrap();
        let parallel = knn_query_batch(&Echo, 8, 1, queries(&input)).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_failure_aborts_batch() {
        let err = knn_query_batch(&Echo, 2, 1, queries(&[1.0, -3.0, 2.0, -7.0])).unwrap_err();
        assert!(err.to_string().contains("bad query"));
    }

    #[test]
    fn test_sequential_failure_reports_first_failing_slot() {
        let err = knn_query_batch(&Echo, 1, 1, queries(&[1.0, -3.0, -7.0])).unwrap_err();
        assert!(err.to_string().contains("-3"));
    }
}
