//! Running independent units of work side by side.
//!
//! Units share nothing: each one opens its own client and owns its own
//! batch or pagination state, so a distributor is free to reorder them.

use futures_util::{StreamExt, TryStreamExt};
use rand::seq::SliceRandom;
use std::{cmp, future::Future};
use tokio_stream::{self as stream};

use crate::Error;

/// Default number of units in flight
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Executes independent units of work
pub trait WorkDistributor {
    /// Run `work` once per unit and collect the results
    ///
    /// Results come back in completion order. The first failing unit fails
    /// the whole run; units still in flight are dropped.
    fn run<U, R, F, Fut>(
        &self,
        units: Vec<U>,
        work: F,
    ) -> impl Future<Output = Result<Vec<R>, Error>>
    where
        F: Fn(U) -> Fut,
        Fut: Future<Output = Result<R, Error>>;
}

/// Runs up to `concurrency` units at a time on the calling task
#[derive(Clone, Copy, Debug)]
pub struct ConcurrentDistributor {
    concurrency: usize,
}

impl ConcurrentDistributor {
    /// Distributor keeping at most `concurrency` units in flight
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: cmp::max(1, concurrency),
        }
    }

    /// Maximum number of units in flight
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

impl Default for ConcurrentDistributor {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl WorkDistributor for ConcurrentDistributor {
    fn run<U, R, F, Fut>(
        &self,
        units: Vec<U>,
        work: F,
    ) -> impl Future<Output = Result<Vec<R>, Error>>
    where
        F: Fn(U) -> Fut,
        Fut: Future<Output = Result<R, Error>>,
    {
        let concurrency = cmp::max(1, units.len().min(self.concurrency));

        stream::iter(units.into_iter().map(work))
            .buffer_unordered(concurrency)
            .try_collect::<Vec<R>>()
    }
}

/// Shuffle units so they are not pinned to the worker that produced them
pub fn redistribute<U>(mut units: Vec<U>) -> Vec<U> {
    units.shuffle(&mut rand::thread_rng());
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_redistribute_keeps_every_unit() {
        let mut units = redistribute((0..100).collect::<Vec<_>>());
        units.sort_unstable();
        assert_eq!(units, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        assert_eq!(ConcurrentDistributor::new(0).concurrency(), 1);
        assert_eq!(
            ConcurrentDistributor::default().concurrency(),
            DEFAULT_CONCURRENCY
        );
    }

    #[tokio::test]
    async fn test_runs_every_unit() {
        let results = ConcurrentDistributor::new(3)
            .run((1..=6).collect(), |n: u32| async move { Ok(n * 10) })
            .await
            .unwrap();

        let mut results = results;
        results.sort_unstable();
        assert_eq!(results, vec![10, 20, 30, 40, 50, 60]);
    }

    #[tokio::test]
    async fn test_empty_units() {
        let results: Vec<u32> = ConcurrentDistributor::default()
            .run(Vec::<u32>::new(), |n| async move { Ok(n) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_limits_units_in_flight() {
        let in_flight_count = AtomicUsize::new(0);
        let peak_count = AtomicUsize::new(0);
        let (in_flight, peak) = (&in_flight_count, &peak_count);

        let _ = ConcurrentDistributor::new(2)
            .run((0..8).collect::<Vec<u32>>(), |_| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(peak_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_error_fails_the_run() {
        let err = ConcurrentDistributor::new(4)
            .run((0..4).collect::<Vec<u32>>(), |n| async move {
                if n == 2 {
                    Err(Error::Client("unit failed".into()))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Client(_)));
    }
}
