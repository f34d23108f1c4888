//! Market data loading
//!
//! Daily bars come from the Yahoo Finance chart API or from local CSV files.
//! Both sources return bars oldest first with unique timestamps; an empty
//! series means "no data" and is not an error at this layer.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use crate::{Bar, Symbol};

// =============================================================================
// Constants
// =============================================================================

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REQUEST_TIMEOUT_SECS: u64 = 30;
// The chart endpoint rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) supertrend-scanner/0.1";

/// Bar interval; the scanner only works on daily bars
pub const INTERVAL: &str = "1d";

// =============================================================================
// Source selection
// =============================================================================

/// Where bars are loaded from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Yahoo,
    Csv,
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" => Ok(DataSource::Yahoo),
            "csv" => Ok(DataSource::Csv),
            _ => Err(format!("Unknown data source: {}. Use 'yahoo' or 'csv'", s)),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Yahoo => write!(f, "yahoo"),
            DataSource::Csv => write!(f, "csv"),
        }
    }
}

/// Anything that can produce a daily bar series for an instrument
pub trait BarSource: Send + Sync {
    /// Fetch daily bars covering the last `lookback_days`, oldest first
    fn fetch(&self, symbol: &Symbol, lookback_days: u32) -> Result<Vec<Bar>>;
}

/// Sort oldest first and drop duplicate timestamps
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.datetime);
    bars.dedup_by_key(|b| b.datetime);
    bars
}

// =============================================================================
// Yahoo Finance
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Convert a chart API payload into bars
///
/// Rows with any missing price are dropped (non-trading placeholders), as are
/// rows that fail bar validation.
pub fn parse_chart(response: ChartResponse) -> Result<Vec<Bar>> {
    if let Some(err) = response.chart.error {
        anyhow::bail!("Yahoo chart error {}: {}", err.code, err.description);
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let mut bars = Vec::with_capacity(result.timestamp.len());

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let row = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = row else {
            debug!("Skipping incomplete row at {}", ts);
            continue;
        };

        let datetime = DateTime::from_timestamp(ts, 0)
            .with_context(|| format!("Invalid timestamp {}", ts))?;
        match Bar::new(datetime, open, high, low, close) {
            Ok(bar) => bars.push(bar),
            Err(e) => debug!("Skipping invalid row at {}: {}", datetime.format("%Y-%m-%d"), e),
        }
    }

    Ok(normalize_bars(bars))
}

/// Fetch daily bars from the Yahoo Finance chart API (no API key required)
pub struct YahooFinanceFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooFinanceFetcher {
    /// Create a new fetcher
    pub fn new() -> Result<Self> {
        Self::with_base_url(YAHOO_CHART_URL)
    }

    /// Create a fetcher against another chart endpoint (mirrors, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl BarSource for YahooFinanceFetcher {
    fn fetch(&self, symbol: &Symbol, lookback_days: u32) -> Result<Vec<Bar>> {
        let end_time = Utc::now();
        let start_time = end_time - Duration::days(lookback_days as i64);
        let url = format!("{}/{}", self.base_url, symbol.as_str());

        debug!(
            "Fetching {} {} bars from {} to {}",
            symbol,
            INTERVAL,
            start_time.format("%Y-%m-%d"),
            end_time.format("%Y-%m-%d")
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", start_time.timestamp().to_string()),
                ("period2", end_time.timestamp().to_string()),
                ("interval", INTERVAL.to_string()),
            ])
            .send()
            .context("Failed to send request")?;

        if !response.status().is_success() {
            anyhow::bail!("API returned status: {}", response.status());
        }

        let payload: ChartResponse = response.json().context("Failed to parse response")?;
        let bars = parse_chart(payload)?;

        info!("Fetched {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Load OHLC data from a CSV file with a `datetime,open,high,low,close[,volume]` layout
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = parse_datetime(dt_str)
            .with_context(|| format!("Failed to parse datetime: {}", dt_str))?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse {} in row {}", name, row_idx + 1))
        };

        let bar = Bar::new(
            datetime,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
        )
        .with_context(|| format!("Invalid bar in row {}", row_idx + 1))?;
        bars.push(bar);
    }

    Ok(bars)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.and_utc());
    }
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .map(|ndt| ndt.and_utc())
        .context("Invalid date")
}

/// Reads `{data_dir}/{SYMBOL}_1d.csv` files
pub struct CsvBarSource {
    pub data_dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", symbol.as_str(), INTERVAL))
    }
}

impl BarSource for CsvBarSource {
    fn fetch(&self, symbol: &Symbol, lookback_days: u32) -> Result<Vec<Bar>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            anyhow::bail!("Data file not found: {}", path.display());
        }

        let mut bars = normalize_bars(
            load_csv(&path).with_context(|| format!("Failed to load data for {}", symbol))?,
        );

        // Window is anchored on the last bar so stale files still produce a report
        if let Some(last) = bars.last().map(|b| b.datetime) {
            let start = last - Duration::days(lookback_days as i64);
            bars.retain(|b| b.datetime >= start);
        }

        info!("Loaded {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

// =============================================================================
// Tests
// =============================================================================
