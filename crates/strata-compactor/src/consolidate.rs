//! Net-effect consolidation of change events.
//!
//! A batch of events is reduced, per primary key, to at most one net
//! operation: an upsert carrying the final row image, or a tombstone.
//! Events must be applied in the order they were produced — reordering
//! changes outcomes.
//!
//! The accumulator tracks where each row came from: a row first seen as an
//! insert never reached durable storage before this batch, so a later delete
//! in the same batch cancels the entry outright instead of emitting a
//! tombstone. Once an update has been applied the row is treated as durable
//! and a delete must produce a removal instruction.

use std::collections::HashMap;

use strata_core::{ChangeEvent, ChangeKind};

/// Whether a consolidated row was already durable before this batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// The row's lifetime started inside this batch (insert, or reinsert
    /// after a tombstone).
    CreatedInBatch,
    /// The row is known or assumed to exist in storage prior to this batch.
    PreExisting,
}

/// Net operation for one primary key after consolidation.
#[derive(Debug, Clone, PartialEq)]
pub enum NetChange {
    /// Insert-or-overwrite the row by key.
    Upsert {
        /// Display date-time of the final event, verbatim.
        date_time: String,
        /// Final row value; `None` is SQL NULL.
        value: Option<f64>,
        /// Final source timestamp in epoch seconds.
        source_ts: u64,
        /// Durability of the row prior to this batch.
        origin: RowOrigin,
    },
    /// Remove the row by key.
    Tombstone {
        /// Display date-time of the delete, used only for day bucketing.
        date_time: String,
    },
}

/// Per-batch consolidation state: at most one [`NetChange`] per touched key.
///
/// Owned by a single batch and discarded with it; this state never outlives
/// the run that produced it.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    changes: HashMap<u64, NetChange>,
}

impl BatchAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the per-key net state.
    ///
    /// Fields are replaced wholesale on every transition — an event always
    /// carries a full row image.
    pub fn apply(&mut self, event: ChangeEvent) {
        let ChangeEvent {
            kind,
            key,
            date_time,
            value,
            source_ts,
        } = event;

        match kind {
            ChangeKind::Insert => {
                // An insert normally marks the row as new in this batch. The
                // exception: with no intervening delete, a row already marked
                // pre-existing is still durable and must stay removable.
                let origin = match self.changes.get(&key) {
                    Some(NetChange::Upsert {
                        origin: RowOrigin::PreExisting,
                        ..
                    }) => RowOrigin::PreExisting,
                    _ => RowOrigin::CreatedInBatch,
                };
                self.changes.insert(
                    key,
                    NetChange::Upsert {
                        date_time,
                        value,
                        source_ts,
                        origin,
                    },
                );
            }
            ChangeKind::Update => {
                let origin = match self.changes.get(&key) {
                    Some(NetChange::Upsert {
                        origin: RowOrigin::CreatedInBatch,
                        ..
                    }) => RowOrigin::CreatedInBatch,
                    _ => RowOrigin::PreExisting,
                };
                self.changes.insert(
                    key,
                    NetChange::Upsert {
                        date_time,
                        value,
                        source_ts,
                        origin,
                    },
                );
            }
            ChangeKind::Delete => match self.changes.get(&key) {
                Some(NetChange::Upsert {
                    origin: RowOrigin::CreatedInBatch,
                    ..
                }) => {
                    // The row's entire lifetime was contained in this batch;
                    // nothing ever reached storage, so nothing to remove.
                    self.changes.remove(&key);
                }
                _ => {
                    self.changes.insert(key, NetChange::Tombstone { date_time });
                }
            },
        }
    }

    /// Number of keys with a pending net change.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when no key has a pending net change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Consumes the accumulator, yielding the per-key net changes.
    #[must_use]
    pub fn into_changes(self) -> HashMap<u64, NetChange> {
        self.changes
    }
}
