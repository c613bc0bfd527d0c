//! Day partitioning of consolidated net changes.
//!
//! The bucket key is the leading `YYYY-MM-DD` of the net change's final
//! display time. A net change whose date moved across events is not
//! relocated — the last event's day decides its bucket.

use std::collections::BTreeMap;

use strata_core::event::DAY_LEN;

use crate::consolidate::{BatchAccumulator, NetChange};

/// Calendar-day slice (`YYYY-MM-DD`) of a display date-time.
///
/// Display times shorter than a day identifier never reach this point
/// (validation discards them); the fallback keeps the function total.
#[must_use]
pub fn day_of(date_time: &str) -> &str {
    date_time.get(..DAY_LEN).unwrap_or(date_time)
}

/// Row image carried by an upsert into a day snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRow {
    /// Primary key.
    pub key: u64,
    /// Display date-time, verbatim from the final event.
    pub date_time: String,
    /// Row value; `None` is SQL NULL.
    pub value: Option<f64>,
    /// Source timestamp in epoch seconds; formatted at merge time.
    pub source_ts: u64,
}

/// Net changes routed to one calendar day's snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayChanges {
    /// Rows to insert-or-overwrite, at most one per key.
    pub upserts: Vec<UpsertRow>,
    /// Keys whose rows must be removed.
    pub tombstones: Vec<u64>,
}

impl DayChanges {
    /// True when the day carries no work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.tombstones.is_empty()
    }
}

/// Groups consolidated changes by the calendar day of their final display time.
///
/// The returned day set is the union of upsert days and tombstone days.
/// Ordering is deterministic: days ascend, rows and tombstones within a day
/// are sorted by key.
#[must_use]
pub fn partition_by_day(batch: BatchAccumulator) -> BTreeMap<String, DayChanges> {
    let mut days: BTreeMap<String, DayChanges> = BTreeMap::new();

    for (key, change) in batch.into_changes() {
        match change {
            NetChange::Upsert {
                date_time,
                value,
                source_ts,
                ..
            } => {
                let day = day_of(&date_time).to_string();
                days.entry(day).or_default().upserts.push(UpsertRow {
                    key,
                    date_time,
                    value,
                    source_ts,
                });
            }
            NetChange::Tombstone { date_time } => {
                let day = day_of(&date_time).to_string();
                days.entry(day).or_default().tombstones.push(key);
            }
        }
    }

    for changes in days.values_mut() {
        changes.upserts.sort_by_key(|row| row.key);
        changes.tombstones.sort_unstable();
    }
    days
}
