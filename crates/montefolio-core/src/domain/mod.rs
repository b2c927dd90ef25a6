//! # Domain Models
//!
//! Canonical types shared by every stage of the pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CanonicalRow`] | Normalized row before cleaning (optional prices) |
//! | [`Bar`] | Validated daily OHLCV bar |
//! | [`CalibrationStats`] | Per-ticker log-return mean and standard deviation |
//! | [`SimulationRow`] | One simulated (trial, ticker, year) outcome |
//! | [`RawSimulationRow`] | Loosely typed simulation row awaiting coercion |
//! | [`Symbol`] | Validated, upper-cased ticker |
//! | [`TradingDate`] | Calendar date serialized as `YYYY-MM-DD` |

mod bar;
mod simulation;
mod symbol;
mod timestamp;

pub use bar::{Bar, CanonicalRow, BAR_COLUMNS};
pub use simulation::{CalibrationStats, RawSimulationRow, SimulationRow, SIMULATION_COLUMNS};
pub(crate) use symbol::canonical_ticker;
pub use symbol::Symbol;
pub use timestamp::{from_unix_seconds, parse_datetime, TradingDate};
