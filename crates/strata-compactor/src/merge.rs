//! Per-day read-modify-write merge of net changes into snapshot files.
//!
//! The engine never retains history: it loads a day's current rows, applies
//! tombstones then upserts, and writes back (or removes) the whole file.
//! The in-memory map strictly bounds both memory use and I/O for the pass.

use std::collections::HashMap;

use strata_core::{timefmt, Result, SnapshotStore};

use crate::partition::DayChanges;
use crate::snapshot::{self, SnapshotRow};

/// What a day merge did to the persisted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Snapshot written with this many surviving rows.
    Updated {
        /// Row count of the new snapshot.
        rows: usize,
    },
    /// No rows survived; the day has no file. Any prior file was removed.
    Removed,
    /// No rows survived but the stale file could not be removed.
    RemoveFailed {
        /// Description of the removal failure.
        message: String,
    },
    /// Both change sets were empty; storage untouched.
    Skipped,
}

/// File name of one day's snapshot.
#[must_use]
pub fn snapshot_name(day: &str) -> String {
    format!("{day}.parquet")
}

/// Merges one day's net changes into its snapshot file.
///
/// Tombstones are applied before upserts, so a reinsertion within the same
/// batch is never lost to its own tombstone. The resulting file holds at most
/// one row per `id`. The write replaces the file atomically; on failure the
/// prior snapshot survives.
///
/// # Errors
///
/// Returns an error if the existing snapshot cannot be read or decoded
/// (an unreadable file is never treated as empty — that would discard
/// durable rows), or if the replacement write fails. A failed removal of an
/// emptied day is reported through [`MergeOutcome::RemoveFailed`] instead so
/// it cannot poison other days.
pub async fn merge_day(
    store: &dyn SnapshotStore,
    day: &str,
    changes: &DayChanges,
) -> Result<MergeOutcome> {
    if changes.is_empty() {
        return Ok(MergeOutcome::Skipped);
    }

    let name = snapshot_name(day);

    let mut rows: HashMap<u64, SnapshotRow> = HashMap::new();
    let existed = match store.get(&name).await? {
        Some(bytes) => {
            for row in snapshot::decode_rows(&bytes)? {
                rows.insert(row.id, row);
            }
            true
        }
        None => false,
    };

    for key in &changes.tombstones {
        rows.remove(key);
    }

    for upsert in &changes.upserts {
        rows.insert(
            upsert.key,
            SnapshotRow {
                id: upsert.key,
                date_time: upsert.date_time.clone(),
                value: upsert.value,
                ts: timefmt::display_timestamp(upsert.source_ts),
            },
        );
    }

    if rows.is_empty() {
        if existed {
            if let Err(e) = store.remove(&name).await {
                return Ok(MergeOutcome::RemoveFailed {
                    message: e.to_string(),
                });
            }
        }
        return Ok(MergeOutcome::Removed);
    }

    let mut ordered: Vec<SnapshotRow> = rows.into_values().collect();
    ordered.sort_by_key(|row| row.id);

    let payload = snapshot::encode_rows(&ordered)?;
    store.replace(&name, payload).await?;
    Ok(MergeOutcome::Updated {
        rows: ordered.len(),
    })
}
