//! SuperTrend band tracking and flip location
//!
//! `BandTracker` is the stateful core: each bar's final bands are derived from
//! that bar's basic bands and the previous bar's final bands and trend. The
//! series is built in one forward pass, appending one immutable `BandState` per
//! bar; nothing already appended is revisited.

use crate::error::ScanResult;
use crate::indicators;
use crate::Bar;

/// Band levels for a bar with a seated ATR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub atr: f64,
    pub midpoint: f64,
    pub basic_upper: f64,
    pub basic_lower: f64,
    pub final_upper: f64,
    pub final_lower: f64,
}

/// Per-bar indicator output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    pub close: f64,
    /// `None` until the ATR window is seated
    pub bands: Option<Bands>,
    pub in_uptrend: bool,
}

/// Forward-pass state machine over bars
///
/// A close beyond the previous final upper (lower) band sets the trend up
/// (down) and both bands restart from the bar's basic values. Inside the
/// channel the trend carries over and the active band ratchets.
#[derive(Debug, Clone)]
pub struct BandTracker {
    multiplier: f64,
    prev: Option<(Bands, bool)>,
}

impl BandTracker {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            prev: None,
        }
    }

    /// Consume the next bar and its ATR, returning the finalized state for that bar
    pub fn next(&mut self, bar: &Bar, atr: Option<f64>) -> BandState {
        let Some(atr) = atr else {
            // Unseated bars default to uptrend and leave the carried state alone
            return BandState {
                close: bar.close,
                bands: None,
                in_uptrend: true,
            };
        };

        let midpoint = bar.midpoint();
        let basic_upper = midpoint + self.multiplier * atr;
        let basic_lower = midpoint - self.multiplier * atr;

        let (in_uptrend, final_upper, final_lower) = match self.prev {
            None => (true, basic_upper, basic_lower),
            Some((prev, prev_uptrend)) => {
                let crossed_up = bar.close > prev.final_upper;
                let crossed_down = bar.close < prev.final_lower;

                if crossed_up || crossed_down {
                    // A cross resets both bands, whether or not the trend changes
                    (crossed_up, basic_upper, basic_lower)
                } else if prev_uptrend {
                    // Lower band never steps down inside the channel during an uptrend
                    (true, basic_upper, basic_lower.max(prev.final_lower))
                } else {
                    // Upper band never steps up inside the channel during a downtrend
                    (false, basic_upper.min(prev.final_upper), basic_lower)
                }
            }
        };

        let bands = Bands {
            atr,
            midpoint,
            basic_upper,
            basic_lower,
            final_upper,
            final_lower,
        };
        self.prev = Some((bands, in_uptrend));

        BandState {
            close: bar.close,
            bands: Some(bands),
            in_uptrend,
        }
    }
}

/// Compute the full SuperTrend state series for a bar series
///
/// Fails with `InsufficientHistory` when fewer than `period + 1` bars are given.
pub fn supertrend(bars: &[Bar], period: usize, multiplier: f64) -> ScanResult<Vec<BandState>> {
    let atr = indicators::atr(bars, period)?;
    let mut tracker = BandTracker::new(multiplier);

    Ok(bars
        .iter()
        .zip(atr)
        .map(|(bar, atr)| tracker.next(bar, atr))
        .collect())
}

/// Most recent trend change, relative to the last bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlipEvent {
    pub price_at_flip: f64,
    pub bars_since_flip: usize,
}

/// Scan backward from the last bar for the most recent trend change
///
/// The flip is the first bar of the current trend run. With no change in the
/// window, the current bar stands in for it. Returns `None` for an empty series.
pub fn locate_flip(states: &[BandState]) -> Option<FlipEvent> {
    let last_index = states.len().checked_sub(1)?;
    let last = &states[last_index];
    let target = last.in_uptrend;

    // Index 0 is never inspected
    let flip_index = (1..last_index)
        .rev()
        .find(|&i| states[i].in_uptrend != target)
        .map(|i| i + 1);

    let (price_at_flip, bars_since_flip) = match flip_index {
        Some(i) => (states[i].close, last_index - i),
        None => (last.close, 0),
    };

    // A zero close would make the change undefined
    let price_at_flip = if price_at_flip == 0.0 {
        last.close
    } else {
        price_at_flip
    };

    Some(FlipEvent {
        price_at_flip,
        bars_since_flip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, Utc};

    fn flat_bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc::now() - Duration::days(closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Bar::new_unchecked(start + Duration::days(i as i64), close, 110.0, 90.0, close)
            })
            .collect()
    }

    fn state(close: f64, in_uptrend: bool) -> BandState {
        BandState {
            close,
            bands: None,
            in_uptrend,
        }
    }

    #[test]
    fn test_first_seated_bar_starts_uptrend_with_basic_bands() {
        let bars = flat_bars(&[100.0; 11]);
        let states = supertrend(&bars, 10, 3.0).unwrap();

        assert!(states[..10].iter().all(|s| s.bands.is_none() && s.in_uptrend));

        let seated = states[10].bands.unwrap();
        assert!(states[10].in_uptrend);
        assert_abs_diff_eq!(seated.atr, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(seated.final_upper, 160.0, epsilon = 1e-9);
        assert_abs_diff_eq!(seated.final_lower, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lower_band_ratchets_in_uptrend() {
        let mut tracker = BandTracker::new(1.0);
        let now = Utc::now();

        let first = tracker.next(&Bar::new_unchecked(now, 100.0, 110.0, 90.0, 100.0), Some(10.0));
        assert_eq!(first.bands.unwrap().final_lower, 90.0);

        // Basic lower drops to 80; carried 90 holds
        let second = tracker.next(&Bar::new_unchecked(now, 95.0, 100.0, 80.0, 95.0), Some(10.0));
        let bands = second.bands.unwrap();
        assert!(second.in_uptrend);
        assert_eq!(bands.basic_lower, 80.0);
        assert_eq!(bands.final_lower, 90.0);
        // Opposite band follows the basic value
        assert_eq!(bands.final_upper, 100.0);

        // Close 100 touches the upper band without crossing; basic lower 100 replaces 90
        let third = tracker.next(&Bar::new_unchecked(now, 100.0, 110.0, 100.0, 100.0), Some(5.0));
        assert!(third.in_uptrend);
        assert_eq!(third.bands.unwrap().final_lower, 100.0);
    }

    #[test]
    fn test_cross_in_trend_direction_resets_bands() {
        let mut tracker = BandTracker::new(1.0);
        let now = Utc::now();

        tracker.next(&Bar::new_unchecked(now, 100.0, 110.0, 90.0, 100.0), Some(10.0));

        // Close 115 above final upper 110 while already up: no ratchet, lower drops to 80
        let breakout = tracker.next(&Bar::new_unchecked(now, 100.0, 130.0, 70.0, 115.0), Some(20.0));
        let bands = breakout.bands.unwrap();
        assert!(breakout.in_uptrend);
        assert_eq!(bands.final_lower, 80.0);
        assert_eq!(bands.final_upper, 120.0);

        // Close 85 stays above the reset lower band, so the uptrend holds
        let pullback = tracker.next(&Bar::new_unchecked(now, 90.0, 100.0, 80.0, 85.0), Some(5.0));
        assert!(pullback.in_uptrend);
        assert_eq!(pullback.bands.unwrap().final_lower, 85.0);
    }

    #[test]
    fn test_upper_band_ratchets_in_downtrend_and_resets_on_flip() {
        let mut tracker = BandTracker::new(1.0);
        let now = Utc::now();

        tracker.next(&Bar::new_unchecked(now, 100.0, 110.0, 90.0, 100.0), Some(10.0));

        // Close 85 below final lower 90: flip, bands reset to this bar's basics
        let flip = tracker.next(&Bar::new_unchecked(now, 88.0, 95.0, 85.0, 85.0), Some(10.0));
        let bands = flip.bands.unwrap();
        assert!(!flip.in_uptrend);
        assert_eq!(bands.final_upper, bands.basic_upper);
        assert_eq!(bands.final_lower, bands.basic_lower);
        assert_eq!(bands.final_upper, 100.0);

        // Basic upper rises to 110; carried 100 holds while the downtrend lasts
        let held = tracker.next(&Bar::new_unchecked(now, 95.0, 105.0, 95.0, 95.0), Some(10.0));
        let bands = held.bands.unwrap();
        assert!(!held.in_uptrend);
        assert_eq!(bands.basic_upper, 110.0);
        assert_eq!(bands.final_upper, 100.0);

        // Close above carried upper flips back up
        let back = tracker.next(&Bar::new_unchecked(now, 101.0, 105.0, 95.0, 101.0), Some(10.0));
        assert!(back.in_uptrend);
        assert_eq!(back.bands.unwrap().final_lower, 90.0);
    }

    #[test]
    fn test_exact_band_touch_keeps_trend() {
        let mut tracker = BandTracker::new(1.0);
        let now = Utc::now();

        tracker.next(&Bar::new_unchecked(now, 100.0, 110.0, 90.0, 100.0), Some(10.0));
        let touch = tracker.next(&Bar::new_unchecked(now, 90.0, 110.0, 90.0, 90.0), Some(10.0));

        assert!(touch.in_uptrend);
    }

    #[test]
    fn test_locate_flip_finds_start_of_current_run() {
        let states = vec![
            state(10.0, true),
            state(11.0, true),
            state(12.0, false),
            state(13.0, false),
            state(14.0, true),
            state(15.0, true),
            state(16.0, true),
        ];

        let flip = locate_flip(&states).unwrap();

        assert_eq!(flip.price_at_flip, 14.0);
        assert_eq!(flip.bars_since_flip, 2);
        // Idempotent
        assert_eq!(locate_flip(&states), Some(flip));
    }

    #[test]
    fn test_locate_flip_without_change_uses_current_bar() {
        let states = vec![state(10.0, false), state(11.0, true), state(12.0, true)];

        // Index 0 differs but is outside the scanned range
        let flip = locate_flip(&states).unwrap();
        assert_eq!(flip.price_at_flip, 12.0);
        assert_eq!(flip.bars_since_flip, 0);
    }

    #[test]
    fn test_locate_flip_on_last_bar() {
        let states = vec![state(10.0, true), state(11.0, true), state(9.0, false)];

        let flip = locate_flip(&states).unwrap();
        assert_eq!(flip.price_at_flip, 9.0);
        assert_eq!(flip.bars_since_flip, 0);
    }

    #[test]
    fn test_locate_flip_zero_price_falls_back_to_current() {
        let states = vec![
            state(10.0, true),
            state(11.0, true),
            state(0.0, false),
            state(8.0, false),
        ];

        let flip = locate_flip(&states).unwrap();
        assert_eq!(flip.price_at_flip, 8.0);
        assert_eq!(flip.bars_since_flip, 1);
    }

    #[test]
    fn test_locate_flip_short_series() {
        assert_eq!(locate_flip(&[]), None);

        let single = locate_flip(&[state(5.0, false)]).unwrap();
        assert_eq!(single.price_at_flip, 5.0);
        assert_eq!(single.bars_since_flip, 0);
    }
}
