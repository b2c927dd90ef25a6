use std::collections::BTreeMap;

use montefolio_core::{
    calibrate, calibrate_table, finalize, CalibrationStats, SimulationConfig, SimulationEngine,
    SimulationRequest,
};
use serde_json::json;

use crate::cli::SimulateArgs;
use crate::error::CliError;

use super::normalize::transform_inputs;
use super::{warehouse_sync, CommandResult};

pub fn run(
    args: &SimulateArgs,
    config: &SimulationConfig,
    sync: bool,
) -> Result<CommandResult, CliError> {
    let mut request = SimulationRequest::new(
        &args.tickers,
        args.portfolio_value,
        args.years,
        args.simulations,
    )?;
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }

    let mut source_chain = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let stats = if args.from_warehouse {
        let history = warehouse_sync::load_history(request.tickers())
            .map_err(|error| CliError::Command(format!("warehouse history unavailable: {error}")))?;
        source_chain.push(String::from("warehouse"));
        calibrate_table(&history, config.stdev_convention)?
    } else {
        let inputs = transform_inputs(&args.payload)?;
        source_chain.push(inputs.source.to_string());
        warnings.extend(inputs.warnings);
        errors.extend(inputs.errors);
        if sync {
            if let Err(error) = warehouse_sync::sync_bars(inputs.source, &inputs.bars) {
                warnings.push(format!("warehouse sync (bars) failed: {error}"));
            }
        }
        calibrate(&inputs.bars, config.stdev_convention)
    };

    let engine = SimulationEngine::new(*config)?;
    let output = engine.run(&request, &stats)?;
    warnings.extend(
        output
            .skipped_tickers
            .iter()
            .map(|ticker| format!("ticker '{ticker}' has insufficient history and was not simulated")),
    );

    let rows = finalize(output.rows);
    let mut run_id = None;
    if sync {
        match warehouse_sync::sync_simulation(&rows) {
            Ok(id) => {
                run_id = Some(id);
                if !source_chain.iter().any(|source| source == "warehouse") {
                    source_chain.push(String::from("warehouse"));
                }
            }
            Err(error) => warnings.push(format!("warehouse sync (simulation) failed: {error}")),
        }
    }

    let data = json!({
        "master_seed": output.master_seed,
        "run_id": run_id,
        "calibration": calibration_summary(&stats),
        "row_count": rows.len(),
        "rows": serde_json::to_value(&rows)?,
    });
    Ok(CommandResult::ok(data, source_chain)
        .with_warnings(warnings)
        .with_errors(errors))
}

fn calibration_summary(stats: &BTreeMap<String, CalibrationStats>) -> serde_json::Value {
    stats
        .values()
        .map(|stats| {
            (
                stats.ticker.clone(),
                json!({
                    "mean_log_return": stats.mean_log_return,
                    "stdev_log_return": stats.stdev_log_return,
                    "sample_size": stats.sample_size,
                }),
            )
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}
