//! Monte Carlo simulation of per-ticker portfolio value.
//!
//! Every `(simulation, ticker)` pair is one *unit*: a path of
//! `years * trading_days_per_year` daily log returns drawn from
//! `Normal(mean, stdev)` of that ticker's calibration. Paths are cut into
//! consecutive year blocks and each block is scored against the same
//! starting value, so years do not compound.
//!
//! Units are generated in batches of [`SimulationConfig::batch_units`] rows
//! of a `(units, days)` matrix. Each unit owns an RNG seeded from the master
//! seed and its own coordinates, so output does not depend on batch size or
//! on how rayon schedules rows.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::calibrate::StdDevConvention;
use crate::config::SimulationConfig;
use crate::{CalibrationStats, CoreError, SimulationRow, Symbol, ValidationError};

/// Validated simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    tickers: Vec<String>,
    portfolio_value: f64,
    years: u32,
    num_simulations: u64,
    seed: Option<u64>,
}

impl SimulationRequest {
    /// Tickers are parsed as [`Symbol`]s (same form as cleaned bars) and
    /// deduplicated in request order.
    pub fn new<I, S>(
        tickers: I,
        portfolio_value: f64,
        years: u32,
        num_simulations: u64,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique = Vec::new();
        for ticker in tickers {
            let ticker = String::from(Symbol::parse(ticker.as_ref())?);
            if !unique.contains(&ticker) {
                unique.push(ticker);
            }
        }

        if unique.is_empty() {
            return Err(ValidationError::EmptyTickerSet);
        }
        if !portfolio_value.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "portfolio_value",
            });
        }
        if portfolio_value <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "portfolio_value",
            });
        }
        if years == 0 {
            return Err(ValidationError::ZeroYears);
        }

        Ok(Self {
            tickers: unique,
            portfolio_value,
            years,
            num_simulations,
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn portfolio_value(&self) -> f64 {
        self.portfolio_value
    }

    pub fn years(&self) -> u32 {
        self.years
    }

    pub fn num_simulations(&self) -> u64 {
        self.num_simulations
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Capital allotted to each ticker, counting every requested ticker.
    pub fn starting_value(&self) -> f64 {
        self.portfolio_value / self.tickers.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    /// Rows in `(simulation_num, ticker, year)` order with sequential ids.
    pub rows: Vec<SimulationRow>,
    /// Seed that reproduces this run.
    pub master_seed: u64,
    /// Requested tickers that had no calibration and were not simulated.
    pub skipped_tickers: Vec<String>,
}

/// Ticker taking part in a run.
#[derive(Debug, Clone, Copy)]
struct ActiveTicker<'a> {
    ticker: &'a str,
    /// Position in the request, used for seeding.
    request_index: usize,
    returns: Normal<f64>,
}

/// One year of one unit, before an id is assigned.
#[derive(Debug, Clone, Copy)]
struct YearOutcome {
    year: u32,
    ending_value: f64,
    volatility: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(
        &self,
        request: &SimulationRequest,
        stats: &BTreeMap<String, CalibrationStats>,
    ) -> Result<SimulationOutput, CoreError> {
        let master_seed = request
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen::<u64>());

        let mut active = Vec::new();
        let mut skipped_tickers = Vec::new();
        for (request_index, ticker) in request.tickers.iter().enumerate() {
            match stats.get(ticker) {
                Some(stats) => active.push(ActiveTicker {
                    ticker,
                    request_index,
                    returns: return_distribution(stats)?,
                }),
                None => {
                    warn!(ticker = %ticker, "no calibration for ticker, skipping");
                    skipped_tickers.push(ticker.clone());
                }
            }
        }

        let days_per_year = self.config.trading_days_per_year;
        let total_days = request.years as usize * days_per_year;
        let total_units = request.num_simulations * active.len() as u64;
        let starting_value = request.starting_value();

        let mut outcomes: Vec<(u64, usize, Vec<YearOutcome>)> =
            Vec::with_capacity(usize::try_from(total_units).unwrap_or(0));
        if total_units > 0 {
            let batch = self.config.batch_units as u64;
            for first in (0..total_units).step_by(self.config.batch_units) {
                let units = (total_units - first).min(batch) as usize;
                let draws = self.draw_batch(&active, master_seed, first, units, total_days);
                let scored = draws
                    .axis_iter(Axis(0))
                    .into_par_iter()
                    .map(|path| {
                        score_path(
                            path,
                            starting_value,
                            days_per_year,
                            self.config.stdev_convention,
                        )
                    })
                    .collect::<Vec<_>>();

                for (offset, years) in scored.into_iter().enumerate() {
                    let unit = first + offset as u64;
                    let (simulation_num, active_index) = unit_coordinates(unit, active.len());
                    outcomes.push((simulation_num, active_index, years));
                }
                debug!(first_unit = first, units, "simulated batch");
            }
        }

        let rows = outcomes
            .into_iter()
            .flat_map(|(simulation_num, active_index, years)| {
                let ticker = active[active_index].ticker;
                years
                    .into_iter()
                    .map(move |outcome| (simulation_num, ticker, outcome))
            })
            .enumerate()
            .map(|(id, (simulation_num, ticker, outcome))| {
                let growth = outcome.ending_value / starting_value;
                SimulationRow {
                    id: id as u64,
                    simulation_num,
                    ticker: ticker.to_owned(),
                    year: outcome.year,
                    starting_value,
                    ending_value: outcome.ending_value,
                    annual_return: growth.powf(1.0 / f64::from(outcome.year)) - 1.0,
                    cumulative_return: growth - 1.0,
                    volatility: outcome.volatility,
                    probability_of_gain: if outcome.ending_value > starting_value {
                        1.0
                    } else {
                        0.0
                    },
                }
            })
            .collect::<Vec<_>>();

        info!(
            rows = rows.len(),
            tickers = active.len(),
            simulations = request.num_simulations,
            years = request.years,
            master_seed,
            "simulation finished"
        );
        Ok(SimulationOutput {
            rows,
            master_seed,
            skipped_tickers,
        })
    }

    /// Fills a `(units, total_days)` matrix of daily log returns.
    fn draw_batch(
        &self,
        active: &[ActiveTicker<'_>],
        master_seed: u64,
        first_unit: u64,
        units: usize,
        total_days: usize,
    ) -> Array2<f64> {
        let mut draws = Array2::<f64>::zeros((units, total_days));
        draws
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(offset, mut path)| {
                let unit = first_unit + offset as u64;
                let (simulation_num, active_index) = unit_coordinates(unit, active.len());
                let ticker = &active[active_index];
                let mut rng = ChaCha8Rng::seed_from_u64(unit_seed(
                    master_seed,
                    simulation_num,
                    ticker.request_index,
                ));
                for cell in path.iter_mut() {
                    *cell = ticker.returns.sample(&mut rng);
                }
            });
        draws
    }
}

fn return_distribution(stats: &CalibrationStats) -> Result<Normal<f64>, CoreError> {
    let distribution_error = |reason: String| CoreError::Distribution {
        ticker: stats.ticker.clone(),
        reason,
    };
    if !stats.mean_log_return.is_finite() {
        return Err(distribution_error(format!(
            "mean log return {} is not finite",
            stats.mean_log_return
        )));
    }
    Normal::new(stats.mean_log_return, stats.stdev_log_return)
        .map_err(|error| distribution_error(error.to_string()))
}

/// Scores one path year by year against a fixed starting value.
fn score_path(
    path: ArrayView1<'_, f64>,
    starting_value: f64,
    days_per_year: usize,
    convention: StdDevConvention,
) -> Vec<YearOutcome> {
    let annualizer = (days_per_year as f64).sqrt();
    path.exact_chunks(days_per_year)
        .into_iter()
        .zip(1u32..)
        .map(|(block, year)| {
            let growth = block.iter().map(|sample| sample.exp()).product::<f64>();
            let stdev = convention
                .mean_stdev(block)
                .map_or(0.0, |(_, stdev)| stdev);
            YearOutcome {
                year,
                ending_value: starting_value * growth,
                volatility: stdev * annualizer,
            }
        })
        .collect()
}

/// Maps a unit index to `(simulation_num, active ticker index)`, simulation major.
fn unit_coordinates(unit: u64, active_tickers: usize) -> (u64, usize) {
    let width = active_tickers as u64;
    (unit / width, (unit % width) as usize)
}

fn unit_seed(master_seed: u64, simulation_num: u64, ticker_index: usize) -> u64 {
    splitmix64(splitmix64(master_seed ^ splitmix64(simulation_num)) ^ ticker_index as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
