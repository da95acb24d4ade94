//! Sequential and worker-pool execution of work items.
//!
//! Both strategies return one result per executed item, tagged with the
//! item index and ordered by it, so the fold that follows sees the same
//! sequence no matter which strategy ran or in what order items finished.
//!
//! # Failures
//!
//! Sequential execution stops at the first failing item. On the pool, the
//! [`FailurePolicy`] decides:
//! - [`FailurePolicy::AbortOnFirst`]: items not yet started when a failure is
//!   seen are skipped; the lowest-index failure observed is reported.
//! - [`FailurePolicy::CollectAll`]: every item runs; the lowest-index failure
//!   is reported along with how many others failed.
//!
//! A kernel panic is caught and reported as a worker failure. No partial
//! result is ever returned alongside a failure.

use crate::core::error::{FacetError, FacetResult, FailureCause, TransformFailure};
use crate::execution::progress::ProgressTracker;
use crate::partition::work::WorkItem;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How work items are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One item at a time, in facet-outer, slice-inner order.
    #[default]
    Sequential,
    /// A fixed-size worker pool.
    Parallel {
        /// Pool size (0 = number of available processing units).
        workers: usize,
    },
}

/// What the pool does after an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop starting new items and report the earliest failure.
    #[default]
    AbortOnFirst,
    /// Finish every item, then report the earliest failure.
    CollectAll,
}

/// Runs work items under a fixed strategy.
#[derive(Clone)]
pub struct Executor {
    strategy: ExecutionStrategy,
    policy: FailurePolicy,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("strategy", &self.strategy)
            .field("policy", &self.policy)
            .field("workers", &self.workers())
            .finish()
    }
}

impl Executor {
    /// Create an executor. The worker pool, if any, is built here and
    /// keeps its size for the executor's lifetime.
    pub fn new(strategy: ExecutionStrategy, policy: FailurePolicy) -> FacetResult<Self> {
        let pool = match strategy {
            ExecutionStrategy::Sequential => None,
            ExecutionStrategy::Parallel { workers } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("facet-worker-{}", i))
                    .build()
                    .map_err(|e| {
                        FacetError::InvalidConfig(format!("failed to build worker pool: {}", e))
                    })?;
                Some(Arc::new(pool))
            }
        };
        Ok(Self {
            strategy,
            policy,
            pool,
        })
    }

    /// A sequential executor.
    pub fn sequential() -> Self {
        Self {
            strategy: ExecutionStrategy::Sequential,
            policy: FailurePolicy::AbortOnFirst,
            pool: None,
        }
    }

    /// The configured strategy.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// The configured failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Number of threads that execute items.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |pool| pool.current_num_threads())
    }

    /// Run `job` on every item.
    ///
    /// Returns `(item index, output)` pairs in ascending item order, or the
    /// failure that ended the run.
    pub fn run<T, F>(
        &self,
        items: &[WorkItem],
        tracker: &ProgressTracker,
        job: F,
    ) -> Result<Vec<(usize, T)>, TransformFailure>
    where
        T: Send,
        F: Fn(&WorkItem) -> Result<T, FailureCause> + Sync,
    {
        match &self.pool {
            None => self.run_sequential(items, tracker, &job),
            Some(pool) => self.run_parallel(pool, items, tracker, &job),
        }
    }

    fn run_sequential<T, F>(
        &self,
        items: &[WorkItem],
        tracker: &ProgressTracker,
        job: &F,
    ) -> Result<Vec<(usize, T)>, TransformFailure>
    where
        F: Fn(&WorkItem) -> Result<T, FailureCause>,
    {
        let mut results = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            match run_item(item, None, tracker, job) {
                Ok(output) => results.push((item.index, output)),
                Err(failure) => {
                    for skipped in &items[position + 1..] {
                        tracker.item_skipped(skipped.index);
                    }
                    return Err(failure);
                }
            }
        }
        Ok(results)
    }

    fn run_parallel<T, F>(
        &self,
        pool: &rayon::ThreadPool,
        items: &[WorkItem],
        tracker: &ProgressTracker,
        job: &F,
    ) -> Result<Vec<(usize, T)>, TransformFailure>
    where
        T: Send,
        F: Fn(&WorkItem) -> Result<T, FailureCause> + Sync,
    {
        let aborting = AtomicBool::new(false);
        let abort_on_first = self.policy == FailurePolicy::AbortOnFirst;

        debug!(
            "dispatching {} work items to {} workers",
            items.len(),
            pool.current_num_threads()
        );

        let outcomes: Vec<Option<Result<(usize, T), TransformFailure>>> = pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    if abort_on_first && aborting.load(Ordering::Acquire) {
                        tracker.item_skipped(item.index);
                        return None;
                    }
                    let outcome = run_item(item, rayon::current_thread_index(), tracker, job);
                    if outcome.is_err() {
                        aborting.store(true, Ordering::Release);
                    }
                    Some(outcome.map(|output| (item.index, output)))
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }

        if failures.is_empty() {
            return Ok(results);
        }
        failures.sort_by_key(|f| f.item);
        let extra = failures.len() - 1;
        let mut first = failures.swap_remove(0);
        first.additional_failures = extra;
        warn!("{} of {} work items failed", extra + 1, items.len());
        Err(first)
    }
}

/// Execute one item, converting errors and panics into a located failure.
fn run_item<T, F>(
    item: &WorkItem,
    worker: Option<usize>,
    tracker: &ProgressTracker,
    job: &F,
) -> Result<T, TransformFailure>
where
    F: Fn(&WorkItem) -> Result<T, FailureCause>,
{
    tracker.item_started(item);
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(item)))
        .unwrap_or_else(|payload| Err(FailureCause::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(output) => {
            tracker.item_completed(item.index, start.elapsed().as_millis() as u64);
            Ok(output)
        }
        Err(cause) => {
            let failure = TransformFailure {
                item: item.index,
                facet_index: item.facet_index(),
                slice_index: item.slice_index(),
                worker,
                cause,
                additional_failures: 0,
            };
            tracker.item_failed(&failure);
            Err(failure)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
