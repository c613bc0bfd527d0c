//! Integrity scan of persisted day snapshots.
//!
//! Checks the storage invariants the merge engine is supposed to preserve:
//! every day file decodes, holds at most one row per `id`, and its
//! date-time columns have the display shape `YYYY-MM-DD HH:MM:SS`.
//!
//! A row whose `date_time` names a different day than its file is only a
//! warning: an update that moves a row's date keeps the row in its original
//! bucket, so such rows occur legitimately.

use std::collections::HashSet;

use serde::Serialize;

use strata_core::{Result, SnapshotStore};

use crate::snapshot;

/// Findings for one day file.
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    /// Object name, e.g. `2024-01-01.parquet`.
    pub name: String,
    /// Rows decoded from the file (0 when unreadable).
    pub rows: usize,
    /// Invariant violations; any entry fails the scan.
    pub problems: Vec<String>,
    /// Oddities worth reporting that do not fail the scan.
    pub warnings: Vec<String>,
}

impl FileCheck {
    /// True when the file upholds every invariant.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Scans every snapshot object in the store and checks the invariants.
///
/// # Errors
///
/// Returns an error if the store itself cannot be enumerated or read. A file
/// that exists but fails to decode is reported as a problem, not an error —
/// the scan continues with the remaining files.
pub async fn verify_store(store: &dyn SnapshotStore) -> Result<Vec<FileCheck>> {
    let mut checks = Vec::new();

    for name in store.list().await? {
        let Some(day) = name.strip_suffix(".parquet") else {
            continue;
        };
        let Some(bytes) = store.get(&name).await? else {
            // Raced away between list and read; nothing to check.
            continue;
        };

        let rows = match snapshot::decode_rows(&bytes) {
            Ok(rows) => rows,
            Err(e) => {
                checks.push(FileCheck {
                    name,
                    rows: 0,
                    problems: vec![format!("unreadable snapshot: {e}")],
                    warnings: Vec::new(),
                });
                continue;
            }
        };

        let mut problems = Vec::new();
        let mut warnings = Vec::new();
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.id) {
                problems.push(format!("duplicate id {}", row.id));
            }
            if !is_display_datetime(&row.date_time) {
                problems.push(format!(
                    "id {}: malformed date_time '{}'",
                    row.id, row.date_time
                ));
            }
            if !is_display_datetime(&row.ts) {
                problems.push(format!("id {}: malformed ts '{}'", row.id, row.ts));
            }
            if !row.date_time.starts_with(day) {
                warnings.push(format!(
                    "id {}: date_time '{}' outside file day {day}",
                    row.id, row.date_time
                ));
            }
        }

        checks.push(FileCheck {
            name,
            rows: rows.len(),
            problems,
            warnings,
        });
    }

    Ok(checks)
}

/// True for strings shaped `YYYY-MM-DD HH:MM:SS`.
fn is_display_datetime(s: &str) -> bool {
    const SHAPE: &[u8; 19] = b"dddd-dd-dd dd:dd:dd";
    let bytes = s.as_bytes();
    if bytes.len() != SHAPE.len() {
        return false;
    }
    bytes.iter().zip(SHAPE).all(|(&c, &p)| match p {
        b'd' => c.is_ascii_digit(),
        sep => c == sep,
    })
}
