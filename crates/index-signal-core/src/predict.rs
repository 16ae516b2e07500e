//! Next-candle direction from the trained classifier.
//!
//! Precondition: the candles must have the bar size the classifier was trained
//! on. Nothing here can check that; callers gate on
//! [`Interval::classifier_supported`](crate::timeframe::Interval::classifier_supported).

use std::fmt;

use serde::Serialize;

use crate::candle::Candle;
use crate::classifier::Classifier;
use crate::error::SignalError;
use crate::features::FeatureFrame;
use crate::fill;
use crate::round;

/// Most recent candles the pipeline looks at.
pub const WINDOW: usize = 200;
/// Fewest candles worth scoring.
pub const MIN_CANDLES: usize = 60;

/// Class label the classifier uses for an up move.
const UP_LABEL: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "NOT_ENOUGH_DATA")]
    NotEnoughData,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::NotEnoughData => "NOT_ENOUGH_DATA",
        })
    }
}

/// Predicted direction with confidence in percent (0-100, two decimals).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub direction: Direction,
    pub confidence: f64,
}

impl PredictionResult {
    pub fn not_enough_data() -> Self {
        Self {
            direction: Direction::NotEnoughData,
            confidence: 0.0,
        }
    }
}

/// Score the latest candle with `model`.
///
/// A window shorter than [`MIN_CANDLES`] is not an error: it yields
/// `NOT_ENOUGH_DATA` with zero confidence and the model is never called.
/// Feature names the model expects but the pipeline does not produce are
/// scored as 0.0.
pub fn predict_next(
    candles: &[Candle],
    model: &dyn Classifier,
) -> Result<PredictionResult, SignalError> {
    let start = candles.len().saturating_sub(WINDOW);
    let mut window = candles[start..].to_vec();
    fill::fill_candle_gaps(&mut window);

    if window.len() < MIN_CANDLES {
        tracing::debug!(
            candles = window.len(),
            required = MIN_CANDLES,
            "not enough candles to predict"
        );
        return Ok(PredictionResult::not_enough_data());
    }

    let mut frame = FeatureFrame::compute(&window)?;
    frame.tail(WINDOW);
    frame.fill_gaps();

    let Some(row) = frame.latest() else {
        return Ok(PredictionResult::not_enough_data());
    };

    if !model.classes().contains(&UP_LABEL) {
        return Err(SignalError::Model(format!(
            "classifier has no up class {UP_LABEL} among {:?}",
            model.classes()
        )));
    }

    let (vector, missing) = row.align(model.feature_names());
    if !missing.is_empty() {
        tracing::debug!(?missing, "model features not computed, scoring as 0");
    }

    let proba = model.predict_proba(&vector)?;
    let label = model.predict(&vector)?;
    let best = proba.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let result = PredictionResult {
        direction: if label == UP_LABEL {
            Direction::Up
        } else {
            Direction::Down
        },
        confidence: round::percent(best),
    };
    tracing::debug!(direction = %result.direction, confidence = result.confidence, "classifier prediction");
    Ok(result)
}
