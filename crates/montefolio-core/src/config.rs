use serde::{Deserialize, Serialize};

use crate::calibrate::StdDevConvention;
use crate::{CoreError, ValidationError};

pub const DEFAULT_TRADING_DAYS_PER_YEAR: usize = 252;
pub const DEFAULT_BATCH_UNITS: usize = 1024;

/// Tunables for calibration and simulation.
///
/// Every field has a default so partial JSON files deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Length of one simulated year block.
    pub trading_days_per_year: usize,
    /// (simulation, ticker) units generated per in-memory batch.
    pub batch_units: usize,
    pub stdev_convention: StdDevConvention,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trading_days_per_year: DEFAULT_TRADING_DAYS_PER_YEAR,
            batch_units: DEFAULT_BATCH_UNITS,
            stdev_convention: StdDevConvention::Population,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trading_days_per_year == 0 {
            return Err(ValidationError::ZeroTradingDays);
        }
        if self.batch_units == 0 {
            return Err(ValidationError::ZeroBatchUnits);
        }
        Ok(())
    }

    pub fn from_json(input: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SimulationConfig::from_json(r#"{"stdev_convention": "sample"}"#)
            .expect("config");
        assert_eq!(config.stdev_convention, StdDevConvention::Sample);
        assert_eq!(config.trading_days_per_year, 252);
        assert_eq!(config.batch_units, 1024);
    }

    #[test]
    fn rejects_zero_batch_units() {
        let err = SimulationConfig::from_json(r#"{"batch_units": 0}"#).expect_err("must fail");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::ZeroBatchUnits)
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = SimulationConfig::from_json(r#"{"days": 5}"#).expect_err("must fail");
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
