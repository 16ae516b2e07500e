use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use index_signal_core::candle::Candle;
use index_signal_core::timeframe::Interval;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::provider::CandleProvider;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart API provider.
/// No authentication required. Intraday bars reach back ~60 days (1m: 7 days).
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(YAHOO_CHART_URL.to_string())
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::builder().user_agent("Mozilla/5.0").build()?,
            base_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Convert a chart result into candles.
///
/// A bar with some prices missing is kept with `NaN` in those fields so the
/// gap can be filled downstream; a bar with no price at all is dropped.
fn parse_yahoo_result(result: &YahooResult) -> Result<Vec<Candle>, ProviderError> {
    let Some(timestamps) = result.timestamp.as_ref() else {
        return Ok(Vec::new());
    };

    let Some(quote) = result.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    let price = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();
    let mut candles = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let prices = [
            price(&quote.open, i),
            price(&quote.high, i),
            price(&quote.low, i),
            price(&quote.close, i),
        ];
        if prices.iter().all(Option::is_none) {
            continue;
        }
        let [open, high, low, close] = prices.map(|p| p.unwrap_or(f64::NAN));
        let volume = price(&quote.volume, i).unwrap_or(0.0);

        let timestamp = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| ProviderError::Parse(format!("invalid unix timestamp: {ts}")))?;

        candles.push(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(candles)
}

#[async_trait]
impl CandleProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_recent(
        &self,
        symbol: &str,
        interval: Interval,
        range: &str,
    ) -> Result<Vec<Candle>, ProviderError> {
        tracing::debug!(symbol, %interval, range, "requesting chart");

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, symbol))
            .query(&[("range", range), ("interval", interval.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 60,
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                message: body,
            });
        }

        let body: YahooResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("failed to parse response: {e}")))?;

        let mut candles = candles_from_response(body)?;
        if candles.is_empty() {
            return Err(ProviderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        tracing::debug!(symbol, candles = candles.len(), "chart received");
        Ok(candles)
    }
}

fn candles_from_response(body: YahooResponse) -> Result<Vec<Candle>, ProviderError> {
    if let Some(error) = body.chart.error {
        return Err(ProviderError::Api {
            status: 0,
            message: format!("{}: {}", error.code, error.description),
        });
    }

    let results = body
        .chart
        .result
        .ok_or_else(|| ProviderError::Parse("no results in response".into()))?;

    match results.first() {
        Some(result) => parse_yahoo_result(result),
        None => Ok(Vec::new()),
    }
}
