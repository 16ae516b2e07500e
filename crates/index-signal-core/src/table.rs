use std::fmt;

use chrono::{DateTime, Utc};

use crate::candle::Candle;
use crate::error::SignalError;

/// A candle field as it appears in a column-oriented table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    /// Fields a table must carry before any signal can be computed.
    pub const REQUIRED: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Open => "Open",
            Field::High => "High",
            Field::Low => "Low",
            Field::Close => "Close",
            Field::Volume => "Volume",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Field::Open),
            "high" => Some(Field::High),
            "low" => Some(Field::Low),
            "close" => Some(Field::Close),
            "volume" => Some(Field::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a possibly multi-level column name to its candle field.
///
/// Tables exported with an instrument grouping level name their columns as
/// tuples, e.g. `('Close', '^NSEI')`. The first level is the field. Plain
/// names match case-insensitively. Returns `None` for anything else
/// (`Adj Close`, `Dividends`, ...).
pub fn flatten_column_name(name: &str) -> Option<Field> {
    let trimmed = name.trim();
    let first_level = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => inner.split(',').next().unwrap_or(""),
        None => trimmed,
    };
    Field::parse(first_level.trim().trim_matches(|c| c == '\'' || c == '"'))
}

/// Column-oriented candle data keyed by possibly grouped column names.
#[derive(Debug, Default)]
pub struct CandleColumns {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<(Field, Vec<f64>)>,
}

impl CandleColumns {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    /// Add a column under its raw name. Names that do not flatten to a candle
    /// field are ignored, as is a second column for an already-seen field.
    pub fn push(&mut self, name: &str, values: Vec<f64>) -> Result<(), SignalError> {
        let Some(field) = flatten_column_name(name) else {
            tracing::debug!(column = name, "ignoring non-candle column");
            return Ok(());
        };
        if values.len() != self.timestamps.len() {
            return Err(SignalError::InvalidData(format!(
                "column {name} has {} rows, expected {}",
                values.len(),
                self.timestamps.len()
            )));
        }
        if self.columns.iter().any(|(f, _)| *f == field) {
            tracing::debug!(column = name, %field, "duplicate field column ignored");
            return Ok(());
        }
        self.columns.push((field, values));
        Ok(())
    }

    fn column(&self, field: Field) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_slice())
    }

    /// Assemble candles sorted by timestamp. A missing volume column reads as
    /// zero volume; a missing price column is an error.
    pub fn into_candles(self) -> Result<Vec<Candle>, SignalError> {
        for field in Field::REQUIRED {
            if self.column(field).is_none() {
                return Err(SignalError::MissingColumn(field));
            }
        }

        let get = |field: Field, i: usize| self.column(field).map(|c| c[i]);
        let mut candles: Vec<Candle> = (0..self.timestamps.len())
            .map(|i| Candle {
                timestamp: self.timestamps[i],
                open: get(Field::Open, i).unwrap_or(f64::NAN),
                high: get(Field::High, i).unwrap_or(f64::NAN),
                low: get(Field::Low, i).unwrap_or(f64::NAN),
                close: get(Field::Close, i).unwrap_or(f64::NAN),
                volume: get(Field::Volume, i).unwrap_or(0.0),
            })
            .collect();

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flattens_tuple_names() {
        assert_eq!(flatten_column_name("('Close', '^NSEI')"), Some(Field::Close));
        assert_eq!(flatten_column_name("(\"High\", \"^NSEBANK\")"), Some(Field::High));
        assert_eq!(flatten_column_name("('Adj Close', '^NSEI')"), None);
    }

    #[test]
    fn flattens_plain_names_case_insensitively() {
        assert_eq!(flatten_column_name("Open"), Some(Field::Open));
        assert_eq!(flatten_column_name("volume"), Some(Field::Volume));
        assert_eq!(flatten_column_name(" LOW "), Some(Field::Low));
        assert_eq!(flatten_column_name("timestamp"), None);
    }

    fn timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 3, 45, 0).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::minutes(5 * i as i64))
            .collect()
    }

    #[test]
    fn assembles_grouped_columns() {
        let mut cols = CandleColumns::new(timestamps(2));
        cols.push("('Open', '^NSEI')", vec![1.0, 2.0]).unwrap();
        cols.push("('High', '^NSEI')", vec![3.0, 4.0]).unwrap();
        cols.push("('Low', '^NSEI')", vec![0.5, 1.5]).unwrap();
        cols.push("('Close', '^NSEI')", vec![2.0, 3.0]).unwrap();
        cols.push("('Volume', '^NSEI')", vec![10.0, 20.0]).unwrap();
        cols.push("('Adj Close', '^NSEI')", vec![2.0, 3.0]).unwrap();

        let candles = cols.into_candles().unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 3.0);
        assert_eq!(candles[1].volume, 20.0);
    }

    #[test]
    fn missing_price_column_is_error() {
        let mut cols = CandleColumns::new(timestamps(1));
        cols.push("Open", vec![1.0]).unwrap();
        cols.push("High", vec![1.0]).unwrap();
        cols.push("Low", vec![1.0]).unwrap();

        match cols.into_candles() {
            Err(SignalError::MissingColumn(Field::Close)) => {}
            other => panic!("expected missing Close column, got {other:?}"),
        }
    }

    #[test]
    fn missing_volume_reads_as_zero() {
        let mut cols = CandleColumns::new(timestamps(1));
        for name in ["Open", "High", "Low", "Close"] {
            cols.push(name, vec![1.0]).unwrap();
        }
        let candles = cols.into_candles().unwrap();
        assert_eq!(candles[0].volume, 0.0);
    }

    #[test]
    fn mismatched_column_length_is_error() {
        let mut cols = CandleColumns::new(timestamps(2));
        assert!(cols.push("Open", vec![1.0]).is_err());
    }
}
