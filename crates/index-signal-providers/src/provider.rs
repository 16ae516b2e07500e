use async_trait::async_trait;
use index_signal_core::candle::Candle;
use index_signal_core::timeframe::Interval;

use crate::error::ProviderError;

/// Trait for fetching recent intraday candles from an external source.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// Provider name (for logging/display).
    fn name(&self) -> &str;

    /// Fetch the candles of the last `range` (e.g. `5d`) at the given bar size.
    /// Returns candles sorted by timestamp, possibly empty outside trading
    /// hours on a fresh listing.
    async fn fetch_recent(
        &self,
        symbol: &str,
        interval: Interval,
        range: &str,
    ) -> Result<Vec<Candle>, ProviderError>;
}
