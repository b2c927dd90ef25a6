//! DuckDB persistence for cleaned bars and simulation runs.
//!
//! The warehouse owns transactions: each ingest call commits all of its
//! rows or none of them.

pub mod migrations;
pub mod pool;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, params_from_iter, Connection};
use montefolio_core::{Bar, Column, RawSimulationRow, RawTable, SimulationRow};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

pub use pool::{AccessMode, ConnectionPool, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("query rejected: {0}")]
    QueryRejected(String),
}

impl WarehouseError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuckDb(_) => "warehouse.duckdb",
            Self::Io(_) => "warehouse.io",
            Self::QueryRejected(_) => "warehouse.query_rejected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Config rooted at `home`, with the database under `home/cache`.
    pub fn at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("cache").join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::at(resolve_home())
    }
}

/// Rows written by one ingest call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub rows: usize,
}

#[derive(Clone)]
pub struct Warehouse {
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path, config.max_pool_size);
        let connection = pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        drop(connection);

        Ok(Self { pool })
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Upserts bars keyed by `(ticker, date)`; later ingests overwrite earlier ones.
    pub fn ingest_bars(
        &self,
        source: &str,
        request_id: &str,
        bars: &[Bar],
    ) -> Result<IngestReport, WarehouseError> {
        if bars.is_empty() {
            return Ok(IngestReport { rows: 0 });
        }

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let mut statement = connection.prepare(
                r#"
INSERT OR REPLACE INTO stock_data (
    ticker, date, open, high, low, close, adj_close, volume, source, updated_at
) VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
"#,
            )?;
            for bar in bars {
                statement.execute(params![
                    bar.ticker,
                    bar.date.to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.adj_close,
                    bar.volume,
                    source,
                ])?;
            }
            log_ingest(&connection, request_id, "stock_data", Some(source), bars.len())
        })();
        finalize_transaction(&connection, result)?;

        info!(rows = bars.len(), source, "ingested bars");
        Ok(IngestReport { rows: bars.len() })
    }

    /// Inserts one simulation run; `run_id` scopes the per-run row ids.
    pub fn ingest_simulations(
        &self,
        run_id: &str,
        rows: &[SimulationRow],
    ) -> Result<IngestReport, WarehouseError> {
        if run_id.trim().is_empty() {
            return Err(WarehouseError::QueryRejected(String::from(
                "run_id must not be empty",
            )));
        }
        if rows.is_empty() {
            return Ok(IngestReport { rows: 0 });
        }

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let mut statement = connection.prepare(
                r#"
INSERT INTO simulation (
    run_id, id, simulation_num, ticker, year, starting_value, ending_value,
    annual_return, cumulative_return, volatility, probability_of_gain
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
            )?;
            for row in rows {
                statement.execute(params![
                    run_id,
                    row.id,
                    row.simulation_num,
                    row.ticker,
                    row.year,
                    row.starting_value,
                    row.ending_value,
                    row.annual_return,
                    row.cumulative_return,
                    row.volatility,
                    row.probability_of_gain,
                ])?;
            }
            log_ingest(&connection, run_id, "simulation", None, rows.len())
        })();
        finalize_transaction(&connection, result)?;

        info!(rows = rows.len(), run_id, "ingested simulation run");
        Ok(IngestReport { rows: rows.len() })
    }

    /// Stored adjusted-close history as a `ticker`/`date`/`adj_close` table.
    ///
    /// An empty `tickers` slice loads every ticker.
    pub fn load_history(&self, tickers: &[String]) -> Result<RawTable, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let filter = if tickers.is_empty() {
            String::new()
        } else {
            format!("WHERE ticker IN ({})", placeholders(tickers.len()))
        };
        let sql = format!(
            "SELECT ticker, CAST(date AS VARCHAR), adj_close FROM stock_data {filter} ORDER BY ticker, date"
        );

        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params_from_iter(tickers.iter()))?;
        let (mut ticker_cells, mut date_cells, mut close_cells) = (Vec::new(), Vec::new(), Vec::new());
        while let Some(row) = rows.next()? {
            ticker_cells.push(Value::String(row.get(0)?));
            date_cells.push(Value::String(row.get(1)?));
            close_cells.push(json!(row.get::<_, f64>(2)?));
        }

        debug!(rows = ticker_cells.len(), tickers = tickers.len(), "loaded history");
        Ok(RawTable::new(
            Vec::new(),
            vec![
                Column::single("ticker", ticker_cells),
                Column::single("date", date_cells),
                Column::single("adj_close", close_cells),
            ],
        ))
    }

    /// Reads a stored run back as loosely typed rows, in id order.
    pub fn load_simulations(&self, run_id: &str) -> Result<Vec<RawSimulationRow>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            r#"
SELECT id, simulation_num, ticker, year, starting_value, ending_value,
       annual_return, cumulative_return, volatility, probability_of_gain
FROM simulation WHERE run_id = ? ORDER BY id
"#,
        )?;
        let rows = statement.query_map(params![run_id], |row| {
            Ok(RawSimulationRow {
                id: json!(row.get::<_, u64>(0)?),
                simulation_num: json!(row.get::<_, u64>(1)?),
                ticker: json!(row.get::<_, String>(2)?),
                year: json!(row.get::<_, u32>(3)?),
                starting_value: json!(row.get::<_, f64>(4)?),
                ending_value: json!(row.get::<_, f64>(5)?),
                annual_return: json!(row.get::<_, f64>(6)?),
                cumulative_return: json!(row.get::<_, f64>(7)?),
                volatility: json!(row.get::<_, f64>(8)?),
                probability_of_gain: json!(row.get::<_, f64>(9)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_rows(&self, table: &str) -> Result<u64, WarehouseError> {
        let table = match table {
            "stock_data" | "simulation" | "ingest_log" => table,
            other => {
                return Err(WarehouseError::QueryRejected(format!(
                    "unknown table '{other}'"
                )))
            }
        };
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let count: i64 =
            connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn log_ingest(
    connection: &Connection,
    request_id: &str,
    dataset: &str,
    source: Option<&str>,
    row_count: usize,
) -> Result<(), WarehouseError> {
    connection.execute(
        "INSERT INTO ingest_log (request_id, dataset, source, row_count, status) VALUES (?, ?, ?, ?, 'ok')",
        params![request_id, dataset, source, row_count as u64],
    )?;
    Ok(())
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("MONTEFOLIO_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".montefolio");
    }

    PathBuf::from(".montefolio")
}
