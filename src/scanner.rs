//! Watchlist scanning
//!
//! Runs the SuperTrend pipeline for each instrument independently. A failing
//! instrument is recorded and skipped; it never aborts the rest of the batch.

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::data::BarSource;
use crate::error::{ScanError, ScanResult};
use crate::report::AssetReport;
use crate::supertrend::{locate_flip, supertrend};
use crate::{Bar, Symbol};

/// Analyze an already-loaded bar series
pub fn analyze_bars(
    symbol: &Symbol,
    bars: &[Bar],
    config: &ScannerConfig,
) -> ScanResult<AssetReport> {
    let states = supertrend(bars, config.indicator.atr_period, config.indicator.multiplier)?;

    // supertrend() already refused series shorter than period + 1
    let (Some(last), Some(flip)) = (states.last(), locate_flip(&states)) else {
        return Err(ScanError::InsufficientHistory {
            bars: bars.len(),
            required: config.indicator.atr_period + 1,
        });
    };

    let report = AssetReport::build(
        symbol.display_name(&config.display_suffix),
        last.close,
        last.in_uptrend,
        &flip,
    );

    debug!(
        "{}: {} at {:.2}, flip {} bars ago at {:.2}",
        symbol, report.trend, last.close, flip.bars_since_flip, flip.price_at_flip
    );

    Ok(report)
}

/// Fetch and analyze one instrument
pub fn scan_instrument<S: BarSource + ?Sized>(
    source: &S,
    symbol: &Symbol,
    config: &ScannerConfig,
) -> ScanResult<AssetReport> {
    let bars = source
        .fetch(symbol, config.lookback_days)
        .map_err(|e| ScanError::retrieval(&e))?;

    analyze_bars(symbol, &bars, config)
}

/// Reports for the instruments that succeeded and the reasons the rest were skipped
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<AssetReport>,
    pub failures: Vec<(Symbol, ScanError)>,
}

/// Scan the whole watchlist
///
/// Instruments run on the rayon pool unless `sequential` is set. Either way the
/// outcome keeps watchlist order.
pub fn run_batch<S: BarSource + ?Sized>(
    source: &S,
    config: &ScannerConfig,
    sequential: bool,
    progress_bar: ProgressBar,
) -> BatchOutcome {
    let symbols = config.symbols();
    info!(
        "Scanning {} instruments (period={}, multiplier={}, {})",
        symbols.len(),
        config.indicator.atr_period,
        config.indicator.multiplier,
        if sequential { "sequential" } else { "parallel" }
    );

    let scan = |symbol: &Symbol| {
        let result = scan_instrument(source, symbol, config);
        progress_bar.inc(1);
        (symbol.clone(), result)
    };

    let results: Vec<(Symbol, ScanResult<AssetReport>)> = if sequential {
        symbols.iter().map(scan).collect()
    } else {
        symbols.par_iter().map(scan).collect()
    };

    progress_bar.finish_and_clear();

    let mut outcome = BatchOutcome::default();
    for (symbol, result) in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                warn!("Skipping {}: {}", symbol, e);
                outcome.failures.push((symbol, e));
            }
        }
    }

    info!(
        "Scan complete: {} reported, {} skipped",
        outcome.reports.len(),
        outcome.failures.len()
    );

    outcome
}
