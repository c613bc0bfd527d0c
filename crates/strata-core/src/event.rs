//! Decoded row-level change events for the replicated table.

/// Kind of captured row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Row was inserted.
    Insert,
    /// Row was updated; the event carries the full after-image.
    Update,
    /// Row was deleted.
    Delete,
}

/// Number of leading bytes of a display date-time that identify its day.
pub const DAY_LEN: usize = 10;

/// One decoded change for the replicated time-series table.
///
/// An event always carries a full row image; consolidation replaces fields
/// wholesale, never merges them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// Primary key. Zero is reserved and never names a real row.
    pub key: u64,
    /// Display date-time in the form `YYYY-MM-DD HH:MM:SS`. Deletes carry it
    /// too; it decides which day file the change lands in.
    pub date_time: String,
    /// Row value. `None` is SQL NULL. Meaningful for inserts and updates only.
    pub value: Option<f64>,
    /// Source timestamp in seconds since the Unix epoch. Must be nonzero for
    /// inserts and updates; ignored for deletes.
    pub source_ts: u64,
}

impl ChangeEvent {
    /// Whether this event may enter consolidation.
    ///
    /// Invalid events are discarded (and counted) before they reach the
    /// consolidator: a zero key, a display time too short to name a day, a
    /// zero source timestamp on an insert/update, or a non-finite value.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.key == 0 {
            return false;
        }
        if self.date_time.len() < DAY_LEN || !self.date_time.is_char_boundary(DAY_LEN) {
            return false;
        }
        match self.kind {
            ChangeKind::Delete => true,
            ChangeKind::Insert | ChangeKind::Update => {
                self.source_ts != 0 && self.value.map_or(true, f64::is_finite)
            }
        }
    }
}
