//! # strata-core
//!
//! Shared primitives for the strata change-data-capture consolidation engine.
//!
//! This crate holds the pieces both the compactor and any future tooling need:
//!
//! - **Change events**: the decoded insert/update/delete record shape
//! - **Timestamp formatting**: epoch seconds to the fixed-offset display form
//! - **Snapshot storage**: the per-day object store seam, with a
//!   local-filesystem backend for production and an in-memory backend for tests
//!
//! The consolidation and merge logic itself lives in `strata-compactor`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod storage;
pub mod timefmt;

pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeKind};
pub use storage::{LocalStore, MemoryStore, SnapshotStore};
