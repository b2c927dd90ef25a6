use montefolio_core::{clean, transform_extracted, Bar, CanonicalRow, EnvelopeError, ProviderId};
use serde_json::json;
use tracing::{debug, warn};

use crate::cli::{NormalizeArgs, PayloadArgs};
use crate::error::CliError;

use super::{normalizer, parse_source, read_payload, warehouse_sync, CommandResult};

/// Bars merged from every input file.
pub(super) struct TransformedInputs {
    pub source: ProviderId,
    pub bars: Vec<Bar>,
    pub dropped_rows: usize,
    pub warnings: Vec<String>,
    /// Files that failed while others succeeded.
    pub errors: Vec<EnvelopeError>,
}

pub(super) fn transform_inputs(args: &PayloadArgs) -> Result<TransformedInputs, CliError> {
    let source = parse_source(args)?;
    if args.inputs.is_empty() {
        return Err(CliError::Command(String::from(
            "at least one --input file is required",
        )));
    }

    let normalizer = normalizer(args);
    let mut rows = Vec::new();
    let mut dropped_rows = 0;
    let mut warnings = Vec::new();
    let mut failures = Vec::new();
    for path in &args.inputs {
        let transformed = match read_payload(path).and_then(|payload| {
            transform_extracted(&payload, source, &normalizer).map_err(CliError::from)
        }) {
            Ok(transformed) => transformed,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "input failed");
                failures.push((path, error));
                continue;
            }
        };
        debug!(path = %path.display(), bars = transformed.bars.len(), "transformed input");
        dropped_rows += transformed.report.dropped();
        warnings.extend(
            transformed
                .warnings
                .into_iter()
                .map(|warning| format!("{}: {warning}", path.display())),
        );
        rows.extend(transformed.bars.into_iter().map(CanonicalRow::from));
    }

    // A batch where every file failed is a failed batch.
    if failures.len() == args.inputs.len() {
        return Err(failures.swap_remove(0).1);
    }
    let errors = failures
        .into_iter()
        .map(|(path, error)| EnvelopeError::new(error.code(), format!("{}: {error}", path.display())))
        .collect::<Result<Vec<_>, _>>()?;

    // Files may overlap; a second pass dedups across them.
    let (bars, report) = clean(rows);
    Ok(TransformedInputs {
        source,
        bars,
        dropped_rows: dropped_rows + report.duplicates,
        warnings,
        errors,
    })
}

pub fn run(args: &NormalizeArgs, sync: bool) -> Result<CommandResult, CliError> {
    let inputs = transform_inputs(&args.payload)?;
    let mut source_chain = vec![inputs.source.to_string()];

    let mut warehouse_warning = None;
    if sync {
        match warehouse_sync::sync_bars(inputs.source, &inputs.bars) {
            Ok(()) => source_chain.push(String::from("warehouse")),
            Err(error) => warehouse_warning = Some(format!("warehouse sync (bars) failed: {error}")),
        }
    }

    let data = json!({
        "source": inputs.source.as_str(),
        "row_count": inputs.bars.len(),
        "dropped_rows": inputs.dropped_rows,
        "rows": serde_json::to_value(&inputs.bars)?,
    });

    let mut result = CommandResult::ok(data, source_chain)
        .with_warnings(inputs.warnings)
        .with_errors(inputs.errors);
    if let Some(warning) = warehouse_warning {
        result = result.with_warning(warning);
    }
    Ok(result)
}
