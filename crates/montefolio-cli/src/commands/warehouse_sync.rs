//! Best-effort persistence; callers turn failures into envelope warnings.

use montefolio_core::{Bar, ProviderId, RawTable, SimulationRow};
use montefolio_warehouse::{Warehouse, WarehouseError};
use tracing::warn;
use uuid::Uuid;

pub fn sync_bars(source: ProviderId, bars: &[Bar]) -> Result<(), WarehouseError> {
    if bars.is_empty() {
        return Ok(());
    }

    let warehouse = Warehouse::open_default()?;
    let request_id = format!("bars:{}", Uuid::new_v4());
    warehouse
        .ingest_bars(source.as_str(), &request_id, bars)
        .inspect_err(|error| warn!(%error, "bar sync failed"))?;
    Ok(())
}

/// Stores one simulation run and returns its run id.
pub fn sync_simulation(rows: &[SimulationRow]) -> Result<String, WarehouseError> {
    let warehouse = Warehouse::open_default()?;
    let run_id = Uuid::new_v4().to_string();
    warehouse
        .ingest_simulations(&run_id, rows)
        .inspect_err(|error| warn!(%error, "simulation sync failed"))?;
    Ok(run_id)
}

pub fn load_history(tickers: &[String]) -> Result<RawTable, WarehouseError> {
    Warehouse::open_default()?.load_history(tickers)
}
