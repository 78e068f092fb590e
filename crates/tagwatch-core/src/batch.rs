// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Paced batching of subscription registrations.
//!
//! Servers cap how many monitored items a single request may create and how
//! fast they may be created. [`BatchPlan`] splits a list into contiguous,
//! order-preserving groups; [`BatchScheduler`] runs an async operation over
//! each group with a fixed pause between consecutive groups.

use std::future::Future;
use std::ops::Range;
use std::time::Duration;

// =============================================================================
// BatchPlan
// =============================================================================

/// Partition of `len` items into contiguous batches.
///
/// Every batch except possibly the last has exactly `batch_size` items. A
/// batch size of 0 means one batch holding everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    ranges: Vec<Range<usize>>,
    delay: Duration,
}

impl BatchPlan {
    /// Builds the plan for `len` items.
    pub fn new(len: usize, batch_size: usize, delay: Duration) -> Self {
        let step = if batch_size == 0 { len.max(1) } else { batch_size };
        let ranges = (0..len)
            .step_by(step)
            .map(|start| start..(start + step).min(len))
            .collect();
        Self { ranges, delay }
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` when there is nothing to schedule.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Size of each batch, in order.
    pub fn sizes(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.len()).collect()
    }

    /// Index ranges of each batch, in order.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Pause between consecutive batches.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Total time spent pausing when the plan runs.
    pub fn total_delay(&self) -> Duration {
        self.delay * self.len().saturating_sub(1) as u32
    }

    /// Slices `items` according to the plan.
    ///
    /// `items` must be at least as long as the plan was built for.
    pub fn batches<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = &'a [T]> + 'a {
        self.ranges.clone().into_iter().map(move |r| &items[r])
    }
}

// =============================================================================
// BatchScheduler
// =============================================================================

/// Runs an async operation over fixed-size batches with a pause in between.
///
/// Batches execute strictly in order and never overlap. No pause follows the
/// last batch.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tagwatch_core::BatchScheduler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = BatchScheduler::new(2, Duration::ZERO);
/// let sizes = scheduler.run(&[1, 2, 3, 4, 5], |batch| async move { batch.len() }).await;
/// assert_eq!(sizes, vec![2, 2, 1]);
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    batch_size: usize,
    delay: Duration,
}

impl BatchScheduler {
    /// Creates a scheduler. A `batch_size` of 0 disables batching.
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self { batch_size, delay }
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Configured inter-batch pause.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Plans `len` items.
    pub fn plan(&self, len: usize) -> BatchPlan {
        BatchPlan::new(len, self.batch_size, self.delay)
    }

    /// Applies `op` to each batch of `items` and collects the per-batch results.
    ///
    /// `op` is awaited to completion before the pause and the next batch.
    pub async fn run<'a, T, F, Fut, R>(&self, items: &'a [T], mut op: F) -> Vec<R>
    where
        F: FnMut(&'a [T]) -> Fut,
        Fut: Future<Output = R>,
    {
        let plan = self.plan(items.len());
        let total = plan.len();
        let mut results = Vec::with_capacity(total);

        for (index, batch) in plan.batches(items).enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tracing::trace!(
                    delay_ms = self.delay.as_millis() as u64,
                    "Pausing before next batch"
                );
                tokio::time::sleep(self.delay).await;
            }

            tracing::debug!(batch = index + 1, total, size = batch.len(), "Processing batch");
            results.push(op(batch).await);
        }

        results
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(1))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[test]
    fn test_plan_sizes() {
        let plan = BatchPlan::new(5, 2, Duration::ZERO);
        assert_eq!(plan.sizes(), vec![2, 2, 1]);
        assert_eq!(plan.ranges(), &[0..2, 2..4, 4..5]);

        assert_eq!(BatchPlan::new(4, 2, Duration::ZERO).sizes(), vec![2, 2]);
        assert_eq!(BatchPlan::new(3, 10, Duration::ZERO).sizes(), vec![3]);
    }

    #[test]
    fn test_plan_zero_batch_size_is_single_batch() {
        let plan = BatchPlan::new(7, 0, Duration::from_secs(1));
        assert_eq!(plan.sizes(), vec![7]);
        assert_eq!(plan.total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_plan_empty_input() {
        assert!(BatchPlan::new(0, 3, Duration::ZERO).is_empty());
        assert!(BatchPlan::new(0, 0, Duration::ZERO).is_empty());
    }

    #[test]
    fn test_plan_partitions_in_order() {
        let items: Vec<u32> = (0..23).collect();
        for size in 1..=25 {
            let plan = BatchPlan::new(items.len(), size, Duration::ZERO);
            let rejoined: Vec<u32> = plan.batches(&items).flatten().copied().collect();
            assert_eq!(rejoined, items, "batch size {size}");

            let sizes = plan.sizes();
            let (last, full) = sizes.split_last().unwrap();
            assert!(full.iter().all(|s| *s == size));
            assert!(*last >= 1 && *last <= size);
        }
    }

    #[test]
    fn test_batches_outlive_plan() {
        let items = [1, 2, 3];
        let batches: Vec<&[i32]> = {
            let plan = BatchPlan::new(items.len(), 2, Duration::ZERO);
            plan.batches(&items).collect()
        };
        assert_eq!(batches, vec![&[1, 2][..], &[3][..]]);
    }

    #[test]
    fn test_total_delay() {
        let plan = BatchPlan::new(5, 2, Duration::from_millis(250));
        assert_eq!(plan.total_delay(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pauses_between_batches_only() {
        let scheduler = BatchScheduler::new(2, Duration::from_secs(1));
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let items = ["a", "b", "c", "d", "e"];
        let sizes = scheduler
            .run(&items, |batch| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push((start.elapsed().as_secs(), batch.to_vec()));
                    batch.len()
                }
            })
            .await;

        assert_eq!(sizes, vec![2, 2, 1]);
        // two pauses, none after the last batch
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (0, vec!["a", "b"]));
        assert_eq!(seen[1], (1, vec!["c", "d"]));
        assert_eq!(seen[2], (2, vec!["e"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_empty_does_nothing() {
        let scheduler = BatchScheduler::new(2, Duration::from_secs(5));
        let start = Instant::now();
        let results: Vec<usize> = scheduler.run(&[] as &[u8], |b| async move { b.len() }).await;
        assert!(results.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_batches_do_not_overlap() {
        let scheduler = BatchScheduler::new(1, Duration::ZERO);
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let items = [1, 2, 3, 4];
        let overlaps = scheduler
            .run(&items, |_| {
                let active = Arc::clone(&active);
                async move {
                    let prev = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    prev
                }
            })
            .await;

        assert!(overlaps.iter().all(|p| *p == 0));
    }
}
