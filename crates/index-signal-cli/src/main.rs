use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use index_signal_core::candle::Candle;
use index_signal_core::classifier::{Classifier, ForestClassifier};
use index_signal_core::predict::{PredictionResult, predict_next};
use index_signal_core::signal::{SignalResult, generate_signal};
use index_signal_core::snapshot;
use index_signal_core::timeframe::{Interval, to_exchange_time};
use index_signal_providers::provider::CandleProvider;
use index_signal_providers::yahoo::YahooProvider;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "index-signal",
    about = "Live index monitor: rule-based trade signal and next-candle prediction"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Trained next-candle classifier (JSON forest export)
    #[arg(long, default_value = "models/next_candle.json")]
    model: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Instrument to monitor
    #[arg(short, long, default_value = "^NSEI", value_parser = ["^NSEI", "^NSEBANK"])]
    symbol: String,

    /// Candle size: 1m, 5m, 15m
    #[arg(short, long, default_value = "15m")]
    interval: Interval,

    /// History to fetch (Yahoo range, e.g. 1d, 5d)
    #[arg(long, default_value = "5d")]
    range: String,

    /// Read candles from a Parquet snapshot instead of fetching
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rule-based trade signal for the latest candle
    Signal {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Next-candle direction from the trained classifier (5m only)
    Predict {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh both panels on a timer until interrupted
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between refreshes
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(10..=120))]
        refresh: u64,
    },

    /// Fetch recent candles and save them as a Parquet snapshot
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

async fn load_candles(source: &SourceArgs) -> Result<Vec<Candle>> {
    if let Some(path) = &source.input {
        let candles = snapshot::read_parquet(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        info!("{}: read {} candle(s)", path.display(), candles.len());
        return Ok(candles);
    }

    let provider = YahooProvider::new().context("failed to create Yahoo provider")?;
    let candles = provider
        .fetch_recent(&source.symbol, source.interval, &source.range)
        .await
        .with_context(|| format!("failed to fetch {} {}", source.symbol, source.interval))?;
    info!(
        "{} {}: fetched {} candle(s) from {}",
        source.symbol,
        source.interval,
        candles.len(),
        provider.name()
    );
    Ok(candles)
}

fn load_model(path: &Path) -> Result<ForestClassifier> {
    ForestClassifier::load(path)
        .with_context(|| format!("failed to load classifier from {}", path.display()))
}

fn print_market(candles: &[Candle]) {
    println!("== Market Data ==");
    let start = candles.len().saturating_sub(5);
    for c in &candles[start..] {
        println!(
            "{}  O {:>10.2}  H {:>10.2}  L {:>10.2}  C {:>10.2}  V {:>10.0}",
            to_exchange_time(&c.timestamp).format("%Y-%m-%d %H:%M"),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        );
    }
}

fn print_signal(result: &SignalResult) {
    println!("== Trade Signal ==");
    println!(
        "Signal: {:<9} Confidence: {:>3} %   Trend: {}",
        result.signal.to_string(),
        (result.confidence * 100.0) as i64,
        result.trend
    );
    println!(
        "Suggested SL: {:<10} Suggested TP: {:<10} Risk Level: {}",
        result.stop_loss, result.take_profit, result.risk
    );
    println!("Price: {}", result.price);
}

fn print_prediction(result: &PredictionResult) {
    println!("== Next Candle Prediction ==");
    println!(
        "Direction: {:<16} Confidence: {} %",
        result.direction.to_string(),
        result.confidence
    );
}

fn cmd_signal(candles: &[Candle], json: bool) -> Result<()> {
    let result = generate_signal(candles).context("signal engine failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_signal(&result);
    }
    Ok(())
}

/// Message shown instead of a prediction when the bar size does not match
/// what the classifier was trained on.
fn timeframe_warning(interval: Interval) -> Option<String> {
    (!interval.classifier_supported()).then(|| {
        format!("Next-candle prediction works only on the 5m timeframe (got {interval}). Switch to 5m.")
    })
}

fn cmd_predict(candles: &[Candle], model: &dyn Classifier, json: bool) -> Result<()> {
    let result = predict_next(candles, model).context("prediction failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_prediction(&result);
    }
    Ok(())
}

/// One refresh: every panel reports its own failure and the rest still render.
async fn refresh_once(source: &SourceArgs, model: Option<&ForestClassifier>) {
    let candles = match load_candles(source).await {
        Ok(candles) => candles,
        Err(e) => {
            println!("Error fetching data: {e:#}");
            return;
        }
    };

    print_market(&candles);

    if let Err(e) = cmd_signal(&candles, false) {
        println!("Signal engine error: {e:#}");
    }

    if let Some(warning) = timeframe_warning(source.interval) {
        println!("{warning}");
        return;
    }
    match model {
        Some(model) => {
            if let Err(e) = cmd_predict(&candles, model, false) {
                println!("Prediction error: {e:#}");
            }
        }
        None => println!("Next-candle prediction unavailable: no classifier loaded"),
    }
}

async fn cmd_watch(source: &SourceArgs, model_path: &Path, refresh: u64) -> Result<()> {
    let model = match load_model(model_path) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("{e:#}");
            None
        }
    };

    info!(
        "watching {} {} every {refresh}s",
        source.symbol, source.interval
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(refresh));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                println!();
                println!(
                    "--- {} {} @ {} IST ---",
                    source.symbol,
                    source.interval,
                    to_exchange_time(&chrono::Utc::now()).format("%H:%M:%S")
                );
                refresh_once(source, model.as_ref()).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}

async fn cmd_fetch(source: &SourceArgs, out: &Path) -> Result<()> {
    let candles = load_candles(source).await?;
    snapshot::write_parquet(out, &candles)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!("wrote {} candle(s) to {}", candles.len(), out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    match &cli.command {
        Commands::Signal { source, json } => {
            let candles = load_candles(source).await?;
            cmd_signal(&candles, *json)?;
        }
        Commands::Predict { source, json } => {
            if let Some(warning) = timeframe_warning(source.interval) {
                warn!("{warning}");
                return Ok(());
            }
            let model = load_model(&cli.model)?;
            let candles = load_candles(source).await?;
            cmd_predict(&candles, &model, *json)?;
        }
        Commands::Watch { source, refresh } => {
            cmd_watch(source, &cli.model, *refresh).await?;
        }
        Commands::Fetch { source, out } => {
            cmd_fetch(source, out).await?;
        }
    }

    Ok(())
}
