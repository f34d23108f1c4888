//! Configuration management
//!
//! Handles loading and parsing of the JSON scanner configuration. Every section
//! has defaults, so running without a config file scans the built-in watchlist.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::DataSource;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Instruments to scan, in report order
    pub instruments: Vec<String>,
    /// Provider suffix stripped from identifiers for display (`BTC-USD` -> `BTC`)
    pub display_suffix: String,
    /// Calendar days of daily bars to request
    pub lookback_days: u32,
    pub indicator: IndicatorConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            instruments: [
                "BTC-USD", "ETH-USD", "SOL-USD", "PEPE-USD", "WIF-USD", "NVDA", "TSLA", "MSTR",
                "COIN", "AAPL", "AMD",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            display_suffix: "-USD".to_string(),
            lookback_days: 90,
            indicator: IndicatorConfig::default(),
            data: DataConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ScannerConfig =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the indicator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            anyhow::bail!("'instruments' must list at least one instrument");
        }
        if self.indicator.atr_period == 0 {
            anyhow::bail!("'indicator.atr_period' must be at least 1");
        }
        if !(self.indicator.multiplier.is_finite() && self.indicator.multiplier > 0.0) {
            anyhow::bail!(
                "'indicator.multiplier' must be a positive number, got {}",
                self.indicator.multiplier
            );
        }
        if self.lookback_days == 0 {
            anyhow::bail!("'lookback_days' must be at least 1");
        }
        if self.output.variable.trim().is_empty() {
            anyhow::bail!("'output.variable' must not be empty");
        }
        Ok(())
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.instruments.iter().map(Symbol::new).collect()
    }
}

/// SuperTrend parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub atr_period: usize,
    pub multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            atr_period: 10,
            multiplier: 3.0,
        }
    }
}

/// Market data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSource,
    /// Directory of `{SYMBOL}_1d.csv` files, used by the CSV source
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            source: DataSource::Yahoo,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Dashboard data file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Name of the JavaScript constant bound to the report array
    pub variable: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: PathBuf::from("dashboard_data.js"),
            variable: "stockData".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instruments.len(), 11);
        assert_eq!(config.indicator.atr_period, 10);
        assert_eq!(config.indicator.multiplier, 3.0);
        assert_eq!(config.output.variable, "stockData");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "instruments": ["NVDA", "ETH-USD"], "indicator": { "multiplier": 2.5 } }"#;
        let config: ScannerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.symbols(), vec![Symbol::new("NVDA"), Symbol::new("ETH-USD")]);
        assert_eq!(config.indicator.atr_period, 10);
        assert_eq!(config.indicator.multiplier, 2.5);
        assert_eq!(config.data.source, DataSource::Yahoo);
        assert_eq!(config.lookback_days, 90);
    }

    #[test]
    fn test_source_parses_lowercase() {
        let json = r#"{ "data": { "source": "csv", "data_dir": "fixtures" } }"#;
        let config: ScannerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.data.source, DataSource::Csv);
        assert_eq!(config.data.data_dir, PathBuf::from("fixtures"));
    }

    #[test]
    fn test_bundled_watchlist_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/watchlist.json");
        let config = ScannerConfig::from_file(path).unwrap();

        assert_eq!(config.instruments, ScannerConfig::default().instruments);
        assert_eq!(config.output.path, PathBuf::from("dashboard_data.js"));
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let mut config = ScannerConfig::default();
        config.indicator.atr_period = 0;
        assert!(config.validate().is_err());

        let mut config = ScannerConfig::default();
        config.indicator.multiplier = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScannerConfig::default();
        config.instruments.clear();
        assert!(config.validate().is_err());
    }
}
