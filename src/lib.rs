//! SuperTrend Watchlist Scanner
//!
//! Computes the SuperTrend indicator over daily bars for a watchlist and
//! reports, per instrument, the current trend, how many bars ago it last
//! flipped and the move since that flip. The reports are written as a
//! JavaScript data file for a dashboard.

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod report;
pub mod scanner;
pub mod supertrend;
pub mod types;

pub use config::ScannerConfig;
pub use error::{ScanError, ScanResult};
pub use report::AssetReport;
pub use types::*;
