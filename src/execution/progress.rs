//! Progress tracking for facet runs.

use crate::core::error::TransformFailure;
use crate::partition::work::WorkItem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// A run has started.
    Started {
        /// Work items in the run.
        total_items: usize,
    },
    /// A work item has been handed to a kernel.
    ItemStarted {
        /// Work item index.
        item: usize,
        /// Facet of the item.
        facet_index: usize,
        /// Visibility slice of the item.
        slice_index: usize,
    },
    /// A work item has completed.
    ItemCompleted {
        /// Work item index.
        item: usize,
        /// Kernel time for the item.
        duration_ms: u64,
        /// Items completed so far.
        completed: usize,
        /// Work items in the run.
        total: usize,
    },
    /// A work item failed.
    ItemFailed {
        /// Work item index.
        item: usize,
        /// Failure description.
        message: String,
    },
    /// A work item was never started because the run was aborting.
    ItemSkipped {
        /// Work item index.
        item: usize,
    },
    /// Overall progress percentage.
    Progress {
        /// Share of items finished, skipped or failed.
        percent: f32,
        /// Time since the run started.
        elapsed_ms: u64,
        /// Estimate from the mean item duration.
        estimated_remaining_ms: Option<u64>,
    },
    /// The run has finished, successfully or not.
    Completed {
        /// Wall-clock time of the run.
        total_duration_ms: u64,
        /// Items that completed.
        items_processed: usize,
        /// Items that failed.
        items_failed: usize,
        /// Items never started.
        items_skipped: usize,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks work-item progress. Shared by reference across pool workers.
pub struct ProgressTracker {
    total_items: usize,
    completed_items: AtomicU64,
    failed_items: AtomicU64,
    skipped_items: AtomicU64,
    start_time: Option<Instant>,
    callback: Option<ProgressCallback>,
    /// Item durations for estimation.
    item_times: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            completed_items: AtomicU64::new(0),
            failed_items: AtomicU64::new(0),
            skipped_items: AtomicU64::new(0),
            start_time: None,
            callback: None,
            item_times: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Start tracking.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.send_update(ProgressUpdate::Started {
            total_items: self.total_items,
        });
    }

    /// Report that an item has started.
    pub fn item_started(&self, item: &WorkItem) {
        self.send_update(ProgressUpdate::ItemStarted {
            item: item.index,
            facet_index: item.facet_index(),
            slice_index: item.slice_index(),
        });
    }

    /// Report that an item has completed.
    pub fn item_completed(&self, item: usize, duration_ms: u64) {
        let completed = self.completed_items.fetch_add(1, Ordering::Relaxed) as usize + 1;
        self.item_times.lock().push(duration_ms);

        self.send_update(ProgressUpdate::ItemCompleted {
            item,
            duration_ms,
            completed,
            total: self.total_items,
        });
        self.send_progress_update();
    }

    /// Report that an item failed.
    pub fn item_failed(&self, failure: &TransformFailure) {
        self.failed_items.fetch_add(1, Ordering::Relaxed);
        self.send_update(ProgressUpdate::ItemFailed {
            item: failure.item,
            message: failure.to_string(),
        });
    }

    /// Report that an item was skipped.
    pub fn item_skipped(&self, item: usize) {
        self.skipped_items.fetch_add(1, Ordering::Relaxed);
        self.send_update(ProgressUpdate::ItemSkipped { item });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            items_processed: self.completed_items.load(Ordering::Relaxed) as usize,
            items_failed: self.failed_items.load(Ordering::Relaxed) as usize,
            items_skipped: self.skipped_items.load(Ordering::Relaxed) as usize,
        });
    }

    /// Number of items that completed successfully.
    pub fn completed(&self) -> usize {
        self.completed_items.load(Ordering::Relaxed) as usize
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_items == 0 {
            return 100.0;
        }
        let done = self.completed_items.load(Ordering::Relaxed)
            + self.failed_items.load(Ordering::Relaxed)
            + self.skipped_items.load(Ordering::Relaxed);
        (done as f32 / self.total_items as f32) * 100.0
    }

    /// Estimate remaining time in milliseconds from the mean item duration.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let times = self.item_times.lock();
        if times.is_empty() {
            return None;
        }
        let avg = times.iter().sum::<u64>() / times.len() as u64;
        let remaining = self.total_items.saturating_sub(times.len());
        Some(avg * remaining as u64)
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn send_progress_update(&self) {
        if self.callback.is_none() {
            return;
        }
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}
