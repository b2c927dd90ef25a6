//! Command-line arguments for montefolio.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `normalize` | Normalize and clean a captured provider payload |
//! | `simulate` | Calibrate returns and run the Monte Carlo simulation |
//! | `results` | Coerce and sort loosely typed simulation rows |
//!
//! Global options: `--format`, `--pretty`, `--strict`, `--warehouse`, `--config`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "montefolio",
    author,
    version,
    about = "Normalize stock bars and simulate portfolio outcomes"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Persist bars and simulation rows to the DuckDB warehouse
    /// (`$MONTEFOLIO_HOME/cache/warehouse.duckdb`).
    #[arg(long, global = true, default_value_t = false)]
    pub warehouse: bool,

    /// JSON file overriding simulation defaults.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Table,
    /// Single JSON envelope.
    Json,
    /// Envelope metadata line followed by one line per row.
    Ndjson,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize and clean a captured provider payload into bars.
    ///
    ///   montefolio normalize --source yfinance --input history.json
    Normalize(NormalizeArgs),

    /// Run a Monte Carlo simulation from payloads or stored history.
    ///
    ///   montefolio simulate --source yfinance --input history.json --tickers AAPL,MSFT
    ///   montefolio simulate --from-warehouse --tickers AAPL --seed 42
    Simulate(SimulateArgs),

    /// Coerce and sort simulation rows read from a JSON array.
    Results(ResultsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PayloadArgs {
    /// Provider the payload came from (yfinance, finnhub).
    #[arg(long)]
    pub source: Option<String>,

    /// Payload files captured from the provider.
    #[arg(long = "input", value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Ticker for flat tables and candle records that do not name one.
    #[arg(long)]
    pub fallback_ticker: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,

    /// Calibrate from bars already stored in the warehouse.
    #[arg(long, default_value_t = false, conflicts_with = "inputs")]
    pub from_warehouse: bool,

    /// Tickers to simulate; the portfolio is split evenly across them.
    #[arg(long, required = true, value_delimiter = ',')]
    pub tickers: Vec<String>,

    #[arg(long, default_value_t = 100_000.0)]
    pub portfolio_value: f64,

    #[arg(long, default_value_t = 1)]
    pub years: u32,

    #[arg(long, default_value_t = 1_000)]
    pub simulations: u64,

    /// Seed for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct ResultsArgs {
    /// JSON array of simulation rows.
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simulate_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "montefolio",
            "simulate",
            "--source",
            "yfinance",
            "--input",
            "a.json",
            "--input",
            "b.json",
            "--tickers",
            "AAPL,msft",
            "--years",
            "2",
            "--seed",
            "42",
            "--format",
            "ndjson",
            "--warehouse",
        ])
        .expect("parse");

        assert_eq!(cli.format, OutputFormat::Ndjson);
        assert!(cli.warehouse);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.payload.inputs.len(), 2);
        assert_eq!(args.tickers, vec!["AAPL", "msft"]);
        assert_eq!(args.years, 2);
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.simulations, 1_000);
    }

    #[test]
    fn simulate_requires_tickers() {
        let err = Cli::try_parse_from(["montefolio", "simulate", "--from-warehouse"])
            .expect_err("must fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn warehouse_history_conflicts_with_inputs() {
        let err = Cli::try_parse_from([
            "montefolio",
            "simulate",
            "--from-warehouse",
            "--input",
            "a.json",
            "--tickers",
            "AAPL",
        ])
        .expect_err("must fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
