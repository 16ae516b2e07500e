//! Signal computation for index candles: indicator series, a threshold
//! rule engine, and next-candle classifier inference.

pub mod candle;
pub mod classifier;
pub mod error;
pub mod features;
pub mod fill;
pub mod indicators;
pub mod predict;
pub mod round;
pub mod signal;
pub mod snapshot;
pub mod table;
pub mod timeframe;

pub use predict::predict_next;
pub use signal::generate_signal;
