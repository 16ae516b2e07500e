use thiserror::Error;

use crate::table::Field;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("candle table is empty")]
    EmptyInput,

    #[error("candle table has no {0} column")]
    MissingColumn(Field),

    #[error("latest candle has no usable {field} price")]
    InvalidPrice { field: Field },

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("cannot compute {indicator} over an empty series")]
    EmptySeries { indicator: &'static str },

    #[error("{indicator} period must be >= 1")]
    ZeroPeriod { indicator: &'static str },
}
