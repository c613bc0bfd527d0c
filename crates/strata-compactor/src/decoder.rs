//! Line decoder for captured statement text of the replicated table.
//!
//! The input is the pseudo-SQL a binlog dump prints for row events: a
//! statement header naming the table, `WHERE` / `SET` clause markers, and
//! `@N=value` field lines. The decoder is a push parser driven by an explicit
//! clause state machine; it recognizes exactly three statement shapes for one
//! configured table and extracts four numbered fields per statement:
//!
//! - `@1` — primary key (integer)
//! - `@3` — display date-time (quoted string)
//! - `@4` — value (numeric literal or the literal token `NULL`)
//! - `@6` — source timestamp (integer)
//!
//! Field lines are read from the row image that matters: the `SET` clause
//! (after-image) for inserts and updates, the `WHERE` clause for deletes.
//! Statements for other tables close the current statement and are otherwise
//! ignored. A leading `### ` marker, as printed by `mysqlbinlog -v`, is
//! tolerated on every line.

use strata_core::{ChangeEvent, ChangeKind};

/// Clause currently being scanned within a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Idle,
    InWhereClause,
    InSetClause,
}

/// Classification of a statement header line.
enum HeaderMatch {
    /// Header for the configured table.
    Target(ChangeKind),
    /// Header for some other table; its field lines must not be captured.
    Foreign,
}

/// Fields captured so far for one open statement.
#[derive(Debug)]
struct PendingStatement {
    kind: ChangeKind,
    key: Option<String>,
    date_time: Option<String>,
    value: Option<String>,
    source_ts: Option<String>,
}

impl PendingStatement {
    fn new(kind: ChangeKind) -> Self {
        Self {
            kind,
            key: None,
            date_time: None,
            value: None,
            source_ts: None,
        }
    }

    /// Parses the captured fields into an event, or `None` if a required
    /// field is missing or fails to parse.
    fn into_event(self) -> Option<ChangeEvent> {
        let key: u64 = self.key?.trim().parse().ok()?;
        let date_time = self.date_time?;

        let (value, source_ts) = match self.kind {
            ChangeKind::Delete => (None, 0),
            ChangeKind::Insert | ChangeKind::Update => {
                let raw = self.value?;
                let value = if raw == "NULL" {
                    None
                } else {
                    Some(raw.parse::<f64>().ok()?)
                };
                let source_ts: u64 = self.source_ts?.trim().parse().ok()?;
                (value, source_ts)
            }
        };

        Some(ChangeEvent {
            kind: self.kind,
            key,
            date_time,
            value,
            source_ts,
        })
    }
}

/// Streaming decoder for one table's captured statement text.
#[derive(Debug)]
pub struct EventDecoder {
    insert_header: String,
    update_header: String,
    delete_header: String,
    clause: Clause,
    pending: Option<PendingStatement>,
    discarded: usize,
}

impl EventDecoder {
    /// Creates a decoder for statements against `` `schema`.`table` ``.
    #[must_use]
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            insert_header: format!("INSERT INTO `{schema}`.`{table}`"),
            update_header: format!("UPDATE `{schema}`.`{table}`"),
            delete_header: format!("DELETE FROM `{schema}`.`{table}`"),
            clause: Clause::Idle,
            pending: None,
            discarded: 0,
        }
    }

    /// Feeds one input line. Returns a decoded event when the line closes a
    /// complete statement for the configured table.
    pub fn feed_line(&mut self, line: &str) -> Option<ChangeEvent> {
        let line = line.trim();
        let line = line.strip_prefix("###").map_or(line, str::trim_start);
        if line.is_empty() {
            return None;
        }

        if let Some(header) = self.classify_header(line) {
            let finished = self.take_pending();
            self.clause = Clause::Idle;
            self.pending = match header {
                HeaderMatch::Target(kind) => Some(PendingStatement::new(kind)),
                HeaderMatch::Foreign => None,
            };
            return finished;
        }

        match line {
            "WHERE" => self.clause = Clause::InWhereClause,
            "SET" => self.clause = Clause::InSetClause,
            _ => {
                if line.starts_with('@') {
                    self.capture_field(line);
                }
            }
        }
        None
    }

    /// Flushes the statement still open at end of input.
    pub fn finish(&mut self) -> Option<ChangeEvent> {
        self.clause = Clause::Idle;
        self.take_pending()
    }

    /// Number of statements dropped because a required field was missing or
    /// failed to parse.
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn classify_header(&self, line: &str) -> Option<HeaderMatch> {
        if line == self.insert_header {
            return Some(HeaderMatch::Target(ChangeKind::Insert));
        }
        if line == self.update_header {
            return Some(HeaderMatch::Target(ChangeKind::Update));
        }
        if line == self.delete_header {
            return Some(HeaderMatch::Target(ChangeKind::Delete));
        }
        if line.starts_with("INSERT INTO `")
            || line.starts_with("UPDATE `")
            || line.starts_with("DELETE FROM `")
        {
            return Some(HeaderMatch::Foreign);
        }
        None
    }

    fn capture_field(&mut self, line: &str) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let wanted_clause = match pending.kind {
            ChangeKind::Insert | ChangeKind::Update => Clause::InSetClause,
            ChangeKind::Delete => Clause::InWhereClause,
        };
        if self.clause != wanted_clause {
            return;
        }

        let Some((col, raw)) = line.split_once('=') else {
            return;
        };
        let raw = raw.trim();
        match col {
            "@1" => pending.key = Some(raw.to_string()),
            "@3" => pending.date_time = Some(unquote(raw).to_string()),
            "@4" => pending.value = Some(raw.to_string()),
            "@6" => pending.source_ts = Some(raw.to_string()),
            _ => {}
        }
    }

    fn take_pending(&mut self) -> Option<ChangeEvent> {
        let pending = self.pending.take()?;
        match pending.into_event() {
            Some(event) => Some(event),
            None => {
                self.discarded += 1;
                None
            }
        }
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(text: &str) -> (Vec<ChangeEvent>, usize) {
        let mut decoder = EventDecoder::new("enexory", "api_data_timeseries");
        let mut events: Vec<ChangeEvent> = text
            .lines()
            .filter_map(|line| decoder.feed_line(line))
            .collect();
        events.extend(decoder.finish());
        (events, decoder.discarded())
    }

    #[test]
    fn decodes_an_insert_from_the_set_clause() {
        let text = "\
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @1=7
  @2=12
  @3='2024-01-01 10:00:00'
  @4=3.5
  @5=0
  @6=1704103200
";
        let (events, discarded) = decode_all(text);
        assert_eq!(discarded, 0);
        assert_eq!(
            events,
            vec![ChangeEvent {
                kind: ChangeKind::Insert,
                key: 7,
                date_time: "2024-01-01 10:00:00".to_string(),
                value: Some(3.5),
                source_ts: 1_704_103_200,
            }]
        );
    }

    #[test]
    fn update_takes_the_after_image() {
        let text = "\
UPDATE `enexory`.`api_data_timeseries`
WHERE
  @1=7
  @3='2024-01-01 10:00:00'
  @4=1.0
  @6=1704103200
SET
  @1=7
  @3='2024-01-01 11:00:00'
  @4=2.5
  @6=1704106800
";
        let (events, _) = decode_all(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Update);
        assert_eq!(events[0].date_time, "2024-01-01 11:00:00");
        assert_eq!(events[0].value, Some(2.5));
        assert_eq!(events[0].source_ts, 1_704_106_800);
    }

    #[test]
    fn delete_takes_the_where_image() {
        let text = "\
DELETE FROM `enexory`.`api_data_timeseries`
WHERE
  @1=9
  @3='2024-01-02 08:30:00'
  @4=4.0
  @6=1704180600
";
        let (events, _) = decode_all(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Delete);
        assert_eq!(events[0].key, 9);
        assert_eq!(events[0].date_time, "2024-01-02 08:30:00");
        assert_eq!(events[0].value, None, "deletes carry no value");
        assert_eq!(events[0].source_ts, 0);
    }

    #[test]
    fn null_token_decodes_to_none() {
        let text = "\
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @1=7
  @3='2024-01-01 10:00:00'
  @4=NULL
  @6=1704103200
";
        let (events, _) = decode_all(text);
        assert_eq!(events[0].value, None);
    }

    #[test]
    fn unparseable_value_discards_the_statement() {
        let text = "\
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @1=7
  @3='2024-01-01 10:00:00'
  @4=not-a-number
  @6=1704103200
";
        let (events, discarded) = decode_all(text);
        assert!(events.is_empty());
        assert_eq!(discarded, 1);
    }

    #[test]
    fn foreign_table_statements_are_ignored() {
        let text = "\
INSERT INTO `enexory`.`other_table`
SET
  @1=999
  @3='2024-01-01 10:00:00'
  @4=1.0
  @6=1704103200
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @1=7
  @3='2024-01-01 10:00:00'
  @4=3.5
  @6=1704103200
";
        let (events, discarded) = decode_all(text);
        assert_eq!(discarded, 0, "foreign statements are not counted as drops");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, 7);
    }

    #[test]
    fn header_finalizes_the_previous_statement() {
        let text = "\
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @1=1
  @3='2024-01-01 10:00:00'
  @4=1.0
  @6=1704103200
DELETE FROM `enexory`.`api_data_timeseries`
WHERE
  @1=2
  @3='2024-01-01 11:00:00'
  @4=1.0
  @6=1704103200
";
        let (events, _) = decode_all(text);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, 1);
        assert_eq!(events[1].key, 2);
    }

    #[test]
    fn tolerates_binlog_comment_markers() {
        let text = "\
### INSERT INTO `enexory`.`api_data_timeseries`
### SET
###   @1=7
###   @3='2024-01-01 10:00:00'
###   @4=3.5
###   @6=1704103200
";
        let (events, _) = decode_all(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, 7);
    }

    #[test]
    fn statement_missing_its_key_is_discarded() {
        let text = "\
INSERT INTO `enexory`.`api_data_timeseries`
SET
  @3='2024-01-01 10:00:00'
  @4=3.5
  @6=1704103200
";
        let (events, discarded) = decode_all(text);
        assert!(events.is_empty());
        assert_eq!(discarded, 1);
    }
}
