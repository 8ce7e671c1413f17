//! Concurrent indexing driver
//!
//! Drives N videos through the layered indexer with a bounded degree of
//! parallelism chosen by the performance mode. Permits are acquired in
//! submission order, so a concurrency of one processes videos exactly as
//! submitted. Cancellation propagates cooperatively; in-flight transactions
//! finish and the affected videos report "cancelled".

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cancel::{CancelSource, CancelToken};
use crate::error::Result;
use crate::indexer::{IndexOutcome, LayeredIndexer};

/// Concurrency presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceMode {
    /// One task per logical CPU
    FullSpeed,
    /// Half the CPUs, at least two
    #[default]
    Balanced,
    /// Single task, with load-aware pre-sleeps on external calls
    Background,
}

impl PerformanceMode {
    pub fn concurrency(self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self {
            PerformanceMode::FullSpeed => cpus,
            PerformanceMode::Balanced => (cpus / 2).max(2),
            PerformanceMode::Background => 1,
        }
    }

    pub fn throttles_background(self) -> bool {
        matches!(self, PerformanceMode::Background)
    }
}

/// Aggregate counters across all scheduled videos
#[derive(Debug, Default)]
pub struct ScheduleTotals {
    pub succeeded: AtomicUsize,
    pub failed: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub clips_created: AtomicUsize,
    pub clips_analyzed: AtomicUsize,
    pub clips_embedded: AtomicUsize,
}

impl ScheduleTotals {
    fn record(&self, outcome: &IndexOutcome) {
        if outcome.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        } else if outcome.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.clips_created
            .fetch_add(outcome.clips_created, Ordering::Relaxed);
        self.clips_analyzed
            .fetch_add(outcome.clips_analyzed, Ordering::Relaxed);
        self.clips_embedded
            .fetch_add(outcome.clips_embedded, Ordering::Relaxed);
    }
}

/// Final report of one scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleReport {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub clips_created: usize,
    pub clips_analyzed: usize,
    pub clips_embedded: usize,
}

/// Per-video completion callback
pub type CompletionCallback = Arc<dyn Fn(&IndexOutcome) + Send + Sync>;

/// Bounded-concurrency scheduler over one folder's indexer
pub struct IndexScheduler {
    indexer: Arc<LayeredIndexer>,
    mode: PerformanceMode,
    cancel_source: CancelSource,
    cancel_token: CancelToken,
}

impl IndexScheduler {
    pub fn new(indexer: LayeredIndexer, mode: PerformanceMode) -> Self {
        let indexer = indexer.with_background_throttle(mode.throttles_background());
        let (cancel_source, cancel_token) = CancelSource::new();
        Self {
            indexer: Arc::new(indexer),
            mode,
            cancel_source,
            cancel_token,
        }
    }

    /// A token outside callers can use to cancel the whole run
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_source.cancel();
    }

    /// Index every path, reporting each completion through the callback
    ///
    /// Storage errors abort the run; per-video failures and cancellations
    /// are reported and counted but do not stop other videos.
    pub async fn run(
        &self,
        paths: Vec<PathBuf>,
        force: bool,
        on_complete: Option<CompletionCallback>,
    ) -> Result<ScheduleReport> {
        let concurrency = self.mode.concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let totals = Arc::new(ScheduleTotals::default());
        info!(
            "scheduling {} videos at concurrency {} ({:?})",
            paths.len(),
            concurrency,
            self.mode
        );

        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            // Acquire before spawning so submission order holds at low
            // concurrency and cancellation stops admitting new work
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if self.cancel_token.is_cancelled() {
                let outcome = cancelled_outcome(path);
                totals.record(&outcome);
                if let Some(cb) = &on_complete {
                    cb(&outcome);
                }
                continue;
            }

            let indexer = Arc::clone(&self.indexer);
            let token = self.cancel_token.clone();
            let totals = Arc::clone(&totals);
            let on_complete = on_complete.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = indexer.index_video(&path, force, &token).await;
                match result {
                    Ok(outcome) => {
                        totals.record(&outcome);
                        if let Some(cb) = &on_complete {
                            cb(&outcome);
                        }
                        Ok(())
                    }
                    Err(e) => {
                        warn!("storage failure indexing {}: {}", path.display(), e);
                        Err(e)
                    }
                }
            }));
        }

        let mut storage_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => storage_error = Some(e),
                Err(join_err) => {
                    warn!("indexer task panicked: {}", join_err);
                }
            }
        }
        if let Some(e) = storage_error {
            return Err(e);
        }

        Ok(ScheduleReport {
            succeeded: totals.succeeded.load(Ordering::Relaxed),
            failed: totals.failed.load(Ordering::Relaxed),
            cancelled: totals.cancelled.load(Ordering::Relaxed),
            clips_created: totals.clips_created.load(Ordering::Relaxed),
            clips_analyzed: totals.clips_analyzed.load(Ordering::Relaxed),
            clips_embedded: totals.clips_embedded.load(Ordering::Relaxed),
        })
    }
}

/// Outcome for work skipped after cancellation; never a failure
fn cancelled_outcome(video_path: PathBuf) -> IndexOutcome {
    IndexOutcome {
        video_path,
        success: false,
        clips_created: 0,
        clips_analyzed: 0,
        clips_embedded: 0,
        stt_skipped_no_audio: false,
        error: Some("cancelled".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_concurrency_bounds() {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(PerformanceMode::FullSpeed.concurrency(), cpus);
        assert!(PerformanceMode::Balanced.concurrency() >= 2);
        assert_eq!(PerformanceMode::Background.concurrency(), 1);
        assert!(PerformanceMode::Background.throttles_background());
        assert!(!PerformanceMode::Balanced.throttles_background());
    }

    #[test]
    fn test_totals_record_cancelled_separately() {
        let totals = ScheduleTotals::default();
        totals.record(&cancelled_outcome(PathBuf::from("/a.mp4")));
        assert_eq!(totals.cancelled.load(Ordering::Relaxed), 1);
        assert_eq!(totals.failed.load(Ordering::Relaxed), 0);
    }
}
