//! Volatility indicators
//!
//! True range and its rolling simple average (ATR). The rolling mean is the
//! `ta` crate's `SimpleMovingAverage`.

use ta::indicators::SimpleMovingAverage;
use ta::Next;

use crate::error::{ScanError, ScanResult};
use crate::Bar;

/// Rolling simple mean over `period` samples
///
/// Entry `i` is `None` until the window holds `period` samples, so over a true
/// range series the first value lands at `period - 1`. `atr` masks that entry
/// because sample 0 has no previous close, which seats the ATR at `period`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let Ok(mut window) = SimpleMovingAverage::new(period) else {
        return vec![None; values.len()];
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mean = window.next(value);
            (i + 1 >= period).then_some(mean)
        })
        .collect()
}

/// True range of each bar against the previous close
///
/// The first bar has no previous close and is `high - low`.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut prev_close: Option<f64> = None;

    bars.iter()
        .map(|bar| {
            let range = bar.high - bar.low;
            let tr = match prev_close {
                Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
                None => range,
            };
            prev_close = Some(bar.close);
            tr
        })
        .collect()
}

/// Minimum number of bars needed to seat an ATR of `period`
pub fn required_bars(period: usize) -> usize {
    period + 1
}

/// Calculate Average True Range as a simple moving average of true range
///
/// The returned series has one entry per bar. Entries before index `period` are
/// `None`; entry `i >= period` is the mean of true range over `[i-period+1, i]`.
pub fn atr(bars: &[Bar], period: usize) -> ScanResult<Vec<Option<f64>>> {
    let required = required_bars(period);
    if period == 0 || bars.len() < required {
        return Err(ScanError::InsufficientHistory {
            bars: bars.len(),
            required,
        });
    }

    let tr = true_range(bars);

    let seated = sma(&tr, period)
        .into_iter()
        .enumerate()
        .map(|(i, value)| if i < period { None } else { value })
        .collect();

    Ok(seated)
}
