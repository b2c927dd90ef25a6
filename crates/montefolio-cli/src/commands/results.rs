use std::fs;

use montefolio_core::{coerce_rows, RawSimulationRow};
use serde_json::json;

use crate::cli::ResultsArgs;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &ResultsArgs) -> Result<CommandResult, CliError> {
    let raw = fs::read_to_string(&args.input)?;
    let rows: Vec<RawSimulationRow> = serde_json::from_str(&raw)?;
    let rows = coerce_rows(rows)?;

    let data = json!({
        "row_count": rows.len(),
        "rows": serde_json::to_value(&rows)?,
    });
    Ok(CommandResult::ok(data, vec![String::from("file")]))
}
