use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column order of the simulation table.
pub const SIMULATION_COLUMNS: [&str; 10] = [
    "id",
    "simulation_num",
    "ticker",
    "year",
    "starting_value",
    "ending_value",
    "annual_return",
    "cumulative_return",
    "volatility",
    "probability_of_gain",
];

/// Per-ticker daily log-return statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStats {
    pub ticker: String,
    pub mean_log_return: f64,
    pub stdev_log_return: f64,
    /// Number of log returns the statistics were computed from.
    pub sample_size: usize,
}

/// One simulated year for one ticker in one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRow {
    pub id: u64,
    pub simulation_num: u64,
    pub ticker: String,
    pub year: u32,
    pub starting_value: f64,
    pub ending_value: f64,
    pub annual_return: f64,
    pub cumulative_return: f64,
    pub volatility: f64,
    /// 1.0 when this row ended above its starting value, else 0.0.
    pub probability_of_gain: f64,
}

/// Loosely typed simulation row, as read back from JSON or another store.
///
/// Every cell is kept as a raw JSON value until [`crate::results::coerce_rows`]
/// coerces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSimulationRow {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub simulation_num: Value,
    #[serde(default)]
    pub ticker: Value,
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub starting_value: Value,
    #[serde(default)]
    pub ending_value: Value,
    #[serde(default)]
    pub annual_return: Value,
    #[serde(default)]
    pub cumulative_return: Value,
    #[serde(default)]
    pub volatility: Value,
    #[serde(default, alias = "probability")]
    pub probability_of_gain: Value,
}
