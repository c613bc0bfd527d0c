//! Parquet encoding/decoding for day snapshot files.
//!
//! This module defines the canonical schema of one day's snapshot — the
//! storage contract every reader of the data directory depends on:
//!
//! | column      | type    | nullable |
//! |-------------|---------|----------|
//! | `id`        | UInt64  | no       |
//! | `date_time` | Utf8    | no       |
//! | `value`     | Float64 | yes      |
//! | `ts`        | Utf8    | no       |
//!
//! `ts` is stored already display-formatted (see `strata_core::timefmt`),
//! not as a raw epoch count. Keep changes backwards-compatible.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array as _, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use strata_core::{Error, Result};

/// One persisted row of a day snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    /// Primary key; unique within one day file.
    pub id: u64,
    /// Display date-time, `YYYY-MM-DD HH:MM:SS`.
    pub date_time: String,
    /// Row value; `None` round-trips as a Parquet null.
    pub value: Option<f64>,
    /// Source timestamp, already display-formatted.
    pub ts: String,
}

fn day_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::UInt64, false),
        Field::new("date_time", DataType::Utf8, false),
        Field::new("value", DataType::Float64, true),
        Field::new("ts", DataType::Utf8, false),
    ]))
}

/// Returns the snapshot schema, for contract tests and external consumers.
#[must_use]
pub fn snapshot_schema() -> Schema {
    (*day_schema()).clone()
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("strata-compactor".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encodes rows into one Parquet payload.
///
/// # Errors
///
/// Returns an error if the record batch cannot be built or the Parquet write
/// fails.
pub fn encode_rows(rows: &[SnapshotRow]) -> Result<Bytes> {
    let schema = day_schema();

    let ids = UInt64Array::from(rows.iter().map(|r| r.id).collect::<Vec<_>>());
    let date_times = StringArray::from(
        rows.iter()
            .map(|r| Some(r.date_time.as_str()))
            .collect::<Vec<_>>(),
    );
    let values = Float64Array::from(rows.iter().map(|r| r.value).collect::<Vec<_>>());
    let ts = StringArray::from(rows.iter().map(|r| Some(r.ts.as_str())).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ids),
            Arc::new(date_times),
            Arc::new(values),
            Arc::new(ts),
        ],
    )
    .map_err(|e| Error::Snapshot {
        message: format!("record batch build failed: {e}"),
    })?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))
        .map_err(|e| Error::Snapshot {
            message: format!("parquet writer init failed: {e}"),
        })?;
    writer.write(&batch).map_err(|e| Error::Snapshot {
        message: format!("parquet write failed: {e}"),
    })?;
    writer.close().map_err(|e| Error::Snapshot {
        message: format!("parquet close failed: {e}"),
    })?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decodes one day snapshot payload into rows.
///
/// # Errors
///
/// Returns an error if the payload is not valid Parquet or a required column
/// is missing or mistyped. Corruption is surfaced, never treated as empty.
pub fn decode_rows(bytes: &Bytes) -> Result<Vec<SnapshotRow>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| Error::Snapshot {
            message: format!("parquet reader init failed: {e}"),
        })?
        .build()
        .map_err(|e| Error::Snapshot {
            message: format!("parquet reader build failed: {e}"),
        })?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::Snapshot {
            message: format!("parquet read batch failed: {e}"),
        })?;

        let id = col_u64(&batch, "id")?;
        let date_time = col_string(&batch, "date_time")?;
        let value = col_f64(&batch, "value")?;
        let ts = col_string(&batch, "ts")?;

        for row in 0..batch.num_rows() {
            out.push(SnapshotRow {
                id: id.value(row),
                date_time: date_time.value(row).to_string(),
                value: if value.is_null(row) {
                    None
                } else {
                    Some(value.value(row))
                },
                ts: ts.value(row).to_string(),
            });
        }
    }
    Ok(out)
}

fn col_u64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| Error::Snapshot {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| Error::Snapshot {
            message: format!("column '{name}' is not UInt64Array"),
        })
}

fn col_string<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| Error::Snapshot {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Snapshot {
            message: format!("column '{name}' is not StringArray"),
        })
}

fn col_f64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| Error::Snapshot {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Snapshot {
            message: format!("column '{name}' is not Float64Array"),
        })
}
