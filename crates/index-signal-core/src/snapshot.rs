//! Parquet snapshots of a candle window, for replaying a fetch offline.
//!
//! Written files use the plain `timestamp, Open, High, Low, Close, Volume`
//! layout. Reading also accepts tables exported with an instrument grouping
//! level in the column names and integer or differently-scaled timestamps.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, TimestampMicrosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field as ArrowField, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::candle::Candle;
use crate::error::SignalError;
use crate::table::{CandleColumns, Field};

const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "datetime", "date"];

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

pub fn candle_schema() -> Schema {
    let mut fields = vec![ArrowField::new("timestamp", utc_micros(), false)];
    fields.extend(
        Field::ALL
            .iter()
            .map(|f| ArrowField::new(f.as_str(), DataType::Float64, true)),
    );
    Schema::new(fields)
}

/// Normalise a time column to microseconds. Zoned timestamps already hold UTC
/// instants and keep their zone; naive timestamps, dates and integers are read
/// as UTC.
fn timestamp_micros(column: &ArrayRef) -> Result<ArrayRef, SignalError> {
    let target = match column.data_type() {
        DataType::Timestamp(_, tz) => DataType::Timestamp(TimeUnit::Microsecond, tz.clone()),
        _ => DataType::Timestamp(TimeUnit::Microsecond, None),
    };
    Ok(cast(column, &target)?)
}

pub fn candles_to_record_batch(candles: &[Candle]) -> Result<RecordBatch, SignalError> {
    let schema = Arc::new(candle_schema());

    let timestamps: Vec<i64> = candles
        .iter()
        .map(|c| c.timestamp.timestamp_micros())
        .collect();

    let mut columns: Vec<ArrayRef> =
        vec![Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC"))];
    for field in Field::ALL {
        // NaN gaps are stored as nulls
        let values: Float64Array = candles
            .iter()
            .map(|c| Some(c.field(field)).filter(|v| !v.is_nan()))
            .collect();
        columns.push(Arc::new(values));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn record_batch_to_candles(batch: &RecordBatch) -> Result<Vec<Candle>, SignalError> {
    let schema = batch.schema();
    let ts_index = schema
        .fields()
        .iter()
        .position(|f| TIMESTAMP_COLUMNS.contains(&f.name().to_ascii_lowercase().as_str()))
        .ok_or_else(|| SignalError::InvalidData("expected timestamp column".into()))?;

    let ts_array = timestamp_micros(batch.column(ts_index))?;
    let ts_array = ts_array
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| SignalError::InvalidData("expected timestamp column".into()))?;

    let mut timestamps = Vec::with_capacity(batch.num_rows());
    for i in 0..ts_array.len() {
        if ts_array.is_null(i) {
            return Err(SignalError::InvalidData(format!("null timestamp at row {i}")));
        }
        let micros = ts_array.value(i);
        let timestamp = chrono::DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| SignalError::InvalidData(format!("invalid timestamp: {micros}")))?;
        timestamps.push(timestamp);
    }

    let mut columns = CandleColumns::new(timestamps);
    for (i, field) in schema.fields().iter().enumerate() {
        if i == ts_index || !field.data_type().is_numeric() {
            continue;
        }
        let values = cast(batch.column(i), &DataType::Float64)?;
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| SignalError::InvalidData(format!("expected numeric {}", field.name())))?;
        columns.push(
            field.name(),
            values.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        )?;
    }

    columns.into_candles()
}

pub fn write_parquet(path: &Path, candles: &[Candle]) -> Result<(), SignalError> {
    let batch = candles_to_record_batch(candles)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

/// Read every row group of a snapshot, sorted by timestamp.
pub fn read_parquet(path: &Path) -> Result<Vec<Candle>, SignalError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut all_candles = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut candles = record_batch_to_candles(&batch)?;
        all_candles.append(&mut candles);
    }

    all_candles.sort_by_key(|c| c.timestamp);
    Ok(all_candles)
}
