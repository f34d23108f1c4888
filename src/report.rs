//! Asset reports and the dashboard data file
//!
//! The dashboard loads a JavaScript file binding one constant to the report
//! array, e.g. `const stockData = [ ... ];`.

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::supertrend::FlipEvent;
use crate::Trend;

/// Final per-instrument summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    #[serde(rename = "token")]
    pub symbol: String,
    pub trend: Trend,
    #[serde(rename = "pct_change")]
    pub pct_change_since_flip: f64,
    #[serde(rename = "days_since_flip")]
    pub bars_since_flip: usize,
    #[serde(rename = "price")]
    pub current_price: f64,
}

impl AssetReport {
    /// Combine the current bar and the located flip into a report
    pub fn build(symbol: impl Into<String>, current_price: f64, in_uptrend: bool, flip: &FlipEvent) -> Self {
        let pct_change =
            (current_price - flip.price_at_flip) / flip.price_at_flip * 100.0;

        AssetReport {
            symbol: symbol.into(),
            trend: Trend::from_uptrend(in_uptrend),
            pct_change_since_flip: round_2dp(pct_change),
            bars_since_flip: flip.bars_since_flip,
            current_price: round_2dp(current_price),
        }
    }
}

/// Round to two decimal places, midpoint to even
///
/// Rounds the exact binary value of `value`, so `2.675` (stored as
/// `2.67499999...`) becomes `2.67`. Non-finite input is returned unchanged.
pub fn round_2dp(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| {
            let mantissa = d.mantissa().to_f64()?;
            Some(mantissa / 10f64.powi(d.scale() as i32))
        })
        .unwrap_or(value)
}

/// Render the report array as a JavaScript constant binding
pub fn render_report(reports: &[AssetReport], variable: &str) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    reports
        .serialize(&mut serializer)
        .context("Failed to serialize reports")?;

    let json = String::from_utf8(buf).context("Serialized report is not valid UTF-8")?;
    Ok(format!("const {} = {};", variable, json))
}

/// Write the dashboard data file, replacing any previous contents
pub fn write_report(path: impl AsRef<Path>, reports: &[AssetReport], variable: &str) -> Result<()> {
    let path = path.as_ref();
    let contents = render_report(reports, variable)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    fs::write(path, contents)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;

    info!("Saved {} reports to {}", reports.len(), path.display());
    Ok(())
}

/// Parse the contents of a dashboard data file back into reports
pub fn parse_report(contents: &str, variable: &str) -> Result<Vec<AssetReport>> {
    let prefix = format!("const {} =", variable);
    let body = contents
        .trim()
        .strip_prefix(&prefix)
        .with_context(|| format!("Missing `{}` binding", prefix))?;
    let body = body.trim_end().strip_suffix(';').unwrap_or(body);

    serde_json::from_str(body.trim()).context("Failed to parse report JSON")
}

/// Print a summary table of the run
pub fn print_summary(reports: &[AssetReport], skipped: usize) {
    println!("\n{}", "=".repeat(60));
    println!("SUPERTREND SCAN");
    println!("{}", "=".repeat(60));
    println!(
        "{:<10} {:<8} {:>12} {:>10} {:>14}",
        "Token", "Trend", "Price", "Bars", "Since Flip"
    );
    println!("{}", "-".repeat(60));

    for report in reports {
        println!(
            "{:<10} {:<8} {:>12.2} {:>10} {:>13.2}%",
            report.symbol,
            report.trend,
            report.current_price,
            report.bars_since_flip,
            report.pct_change_since_flip
        );
    }

    println!("{}", "=".repeat(60));
    println!("  Reported: {}  Skipped: {}", reports.len(), skipped);
    println!("{}", "=".repeat(60));
}
