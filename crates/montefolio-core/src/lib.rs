//! Core pipeline for montefolio.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Provider payload shapes and schema normalization
//! - Cleaning, return calibration, and Monte Carlo simulation
//! - Response envelope and structured errors
//!
//! Everything here is synchronous and in memory. Fetching and persistence
//! live in other crates.

pub mod calibrate;
pub mod clean;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod pipeline;
pub mod results;
pub mod simulate;
pub mod source;

pub use calibrate::{calibrate, calibrate_table, StdDevConvention};
pub use clean::{clean, CleanReport};
pub use config::SimulationConfig;
pub use domain::{
    from_unix_seconds, parse_datetime, Bar, CalibrationStats, CanonicalRow, RawSimulationRow,
    SimulationRow, Symbol, TradingDate, BAR_COLUMNS, SIMULATION_COLUMNS,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::{CoreError, ValidationError};
pub use normalize::{Normalized, SchemaNormalizer};
pub use payload::{CandleResponse, Column, ColumnKey, Payload, RawTable, TableShape};
pub use pipeline::{transform_extracted, Transformed};
pub use results::{coerce_rows, finalize};
pub use simulate::{SimulationEngine, SimulationOutput, SimulationRequest};
pub use source::ProviderId;
