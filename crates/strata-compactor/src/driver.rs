//! Batch driver: one consolidation pass plus per-day merges.
//!
//! The driver owns the batch lifecycle: it folds the decoded event stream in
//! arrival order, partitions the net changes by day, and dispatches one merge
//! per affected day. Day workers are independent — disjoint inputs, disjoint
//! file paths — so they may run concurrently up to a configured limit. The
//! run completes only after every spawned worker has been joined.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use strata_core::{ChangeEvent, SnapshotStore};

use crate::consolidate::BatchAccumulator;
use crate::merge::{self, MergeOutcome};
use crate::partition;

/// Tuning for one batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum day merges in flight at once; 1 means strictly sequential.
    pub parallelism: usize,
    /// Consolidate and report the per-day plan without touching storage.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            dry_run: false,
        }
    }
}

/// Per-day result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    /// Snapshot written with this many rows.
    Updated {
        /// Row count of the new snapshot.
        rows: usize,
    },
    /// Snapshot removed: the day was emptied.
    Removed,
    /// Day emptied but the stale file could not be removed.
    RemoveFailed {
        /// Description of the removal failure.
        message: String,
    },
    /// Nothing to do for the day; storage untouched.
    Skipped,
    /// Merge failed; the prior snapshot is untouched.
    Failed {
        /// Description of the merge failure.
        message: String,
    },
    /// Not attempted because an earlier day's merge failed.
    Aborted,
}

/// Outcome of one day within a run.
#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    /// Calendar day, `YYYY-MM-DD`.
    pub day: String,
    /// What happened to the day's snapshot.
    #[serde(flatten)]
    pub outcome: DayOutcome,
}

/// Aggregate result of one batch run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Events consumed from the decoded stream.
    pub events_seen: usize,
    /// Events discarded by validation before consolidation.
    pub events_discarded: usize,
    /// Per-day outcomes, sorted by day.
    pub days: Vec<DayReport>,
    /// Wall-clock time for the whole run.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    /// True when no day failed to merge or to remove its emptied file.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.days.iter().any(|d| {
            matches!(
                d.outcome,
                DayOutcome::Failed { .. } | DayOutcome::RemoveFailed { .. } | DayOutcome::Aborted
            )
        })
    }
}

/// Runs one batch: consolidates `events` in arrival order, then merges each
/// affected day.
///
/// Malformed events are discarded and counted, never fatal. A day whose merge
/// fails is reported as [`DayOutcome::Failed`]; days not yet started when a
/// failure is observed are reported as [`DayOutcome::Aborted`]. Days already
/// in flight run to completion — they touch disjoint files, so a failure
/// elsewhere cannot corrupt them.
pub async fn run_batch(
    store: Arc<dyn SnapshotStore>,
    events: impl IntoIterator<Item = ChangeEvent>,
    options: &RunOptions,
) -> RunReport {
    let started = Instant::now();

    let mut batch = BatchAccumulator::new();
    let mut events_seen = 0usize;
    let mut events_discarded = 0usize;
    for event in events {
        events_seen += 1;
        if !event.is_valid() {
            events_discarded += 1;
            debug!(key = event.key, kind = ?event.kind, "discarding malformed event");
            continue;
        }
        batch.apply(event);
    }

    let net_keys = batch.len();
    let days = partition::partition_by_day(batch);
    info!(
        events = events_seen,
        discarded = events_discarded,
        net_changes = net_keys,
        days = days.len(),
        "batch consolidated"
    );

    if options.dry_run {
        let mut reports = Vec::with_capacity(days.len());
        for (day, changes) in &days {
            info!(
                day = %day,
                upserts = changes.upserts.len(),
                tombstones = changes.tombstones.len(),
                "dry run: would merge"
            );
            reports.push(DayReport {
                day: day.clone(),
                outcome: DayOutcome::Skipped,
            });
        }
        return RunReport {
            events_seen,
            events_discarded,
            days: reports,
            elapsed: started.elapsed(),
        };
    }

    let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
    let failed = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(days.len());
    for (day, changes) in days {
        let store = Arc::clone(&store);
        let permits = Arc::clone(&semaphore);
        let failed = Arc::clone(&failed);
        let task_day = day.clone();

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return DayReport {
                        day: task_day,
                        outcome: DayOutcome::Aborted,
                    }
                }
            };
            if failed.load(Ordering::Acquire) {
                return DayReport {
                    day: task_day,
                    outcome: DayOutcome::Aborted,
                };
            }

            let outcome = match merge::merge_day(store.as_ref(), &task_day, &changes).await {
                Ok(MergeOutcome::Updated { rows }) => DayOutcome::Updated { rows },
                Ok(MergeOutcome::Removed) => DayOutcome::Removed,
                Ok(MergeOutcome::RemoveFailed { message }) => DayOutcome::RemoveFailed { message },
                Ok(MergeOutcome::Skipped) => DayOutcome::Skipped,
                Err(e) => {
                    failed.store(true, Ordering::Release);
                    DayOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };
            DayReport {
                day: task_day,
                outcome,
            }
        });
        handles.push((day, handle));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (day, handle) in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => {
                failed.store(true, Ordering::Release);
                reports.push(DayReport {
                    day,
                    outcome: DayOutcome::Failed {
                        message: format!("merge task did not complete: {e}"),
                    },
                });
            }
        }
    }
    reports.sort_by(|a, b| a.day.cmp(&b.day));

    for report in &reports {
        match &report.outcome {
            DayOutcome::Updated { rows } => {
                info!(day = %report.day, rows, "day snapshot updated");
            }
            DayOutcome::Removed => info!(day = %report.day, "day snapshot removed"),
            DayOutcome::RemoveFailed { message } => {
                warn!(day = %report.day, message = %message, "emptied day file could not be removed");
            }
            DayOutcome::Skipped => info!(day = %report.day, "day skipped"),
            DayOutcome::Failed { message } => {
                error!(day = %report.day, message = %message, "day merge failed");
            }
            DayOutcome::Aborted => {
                warn!(day = %report.day, "day merge aborted after earlier failure");
            }
        }
    }

    RunReport {
        events_seen,
        events_discarded,
        days: reports,
        elapsed: started.elapsed(),
    }
}
