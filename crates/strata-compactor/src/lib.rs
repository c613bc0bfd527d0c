//! # strata-compactor
//!
//! Change-data-capture consolidation and compaction for one time-series table.
//!
//! A batch of captured row changes (insert/update/delete) is reduced to its
//! net effect per primary key, partitioned by calendar day, and merged into
//! per-day Parquet snapshot files that hold the table's durable state.
//!
//! ## Pipeline
//!
//! ```text
//! statement text ──decoder──▶ events ──consolidate──▶ net changes
//!        ──partition──▶ per-day change sets ──merge──▶ day snapshot files
//! ```
//!
//! Each stage is independent: the decoder is a line-oriented push parser, the
//! consolidator is a pure in-memory fold owned by one batch, and the merge
//! engine performs one read-modify-write cycle per affected day against a
//! [`strata_core::SnapshotStore`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod consolidate;
pub mod decoder;
pub mod driver;
pub mod merge;
pub mod partition;
pub mod snapshot;
pub mod verify;

pub use consolidate::{BatchAccumulator, NetChange, RowOrigin};
pub use decoder::EventDecoder;
pub use driver::{run_batch, DayOutcome, DayReport, RunOptions, RunReport};
pub use merge::{merge_day, MergeOutcome};
pub use partition::{partition_by_day, DayChanges, UpsertRow};
