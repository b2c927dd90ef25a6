//! Final shaping of simulation rows before they leave the core.

use serde_json::Value;

use crate::{CoreError, RawSimulationRow, SimulationRow};

/// Sanitizes typed rows and sorts them by `(ticker, simulation_num, year)`.
///
/// Tickers are upper-cased and non-finite floats become `0.0`.
pub fn finalize(mut rows: Vec<SimulationRow>) -> Vec<SimulationRow> {
    for row in &mut rows {
        row.ticker = row.ticker.trim().to_ascii_uppercase();
        for value in [
            &mut row.starting_value,
            &mut row.ending_value,
            &mut row.annual_return,
            &mut row.cumulative_return,
            &mut row.volatility,
            &mut row.probability_of_gain,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
    }
    sort_rows(&mut rows);
    rows
}

/// Coerces loosely typed rows, then sorts them like [`finalize`].
pub fn coerce_rows(rows: Vec<RawSimulationRow>) -> Result<Vec<SimulationRow>, CoreError> {
    let mut coerced = rows
        .into_iter()
        .enumerate()
        .map(|(index, raw)| coerce_row(index, raw))
        .collect::<Result<Vec<_>, _>>()?;
    sort_rows(&mut coerced);
    Ok(coerced)
}

fn sort_rows(rows: &mut [SimulationRow]) {
    rows.sort_by(|left, right| {
        left.ticker
            .cmp(&right.ticker)
            .then(left.simulation_num.cmp(&right.simulation_num))
            .then(left.year.cmp(&right.year))
    });
}

fn coerce_row(row: usize, raw: RawSimulationRow) -> Result<SimulationRow, CoreError> {
    let year = integer_cell("year", row, &raw.year)?;
    let year = u32::try_from(year).map_err(|_| invalid_cell("year", row, &raw.year))?;

    Ok(SimulationRow {
        id: integer_cell("id", row, &raw.id)?,
        simulation_num: integer_cell("simulation_num", row, &raw.simulation_num)?,
        ticker: text_cell(&raw.ticker).to_ascii_uppercase(),
        year,
        starting_value: float_cell(&raw.starting_value),
        ending_value: float_cell(&raw.ending_value),
        annual_return: float_cell(&raw.annual_return),
        cumulative_return: float_cell(&raw.cumulative_return),
        volatility: float_cell(&raw.volatility),
        probability_of_gain: float_cell(&raw.probability_of_gain),
    })
}

fn invalid_cell(column: &str, row: usize, value: &Value) -> CoreError {
    CoreError::InvalidCell {
        column: column.to_owned(),
        row,
        value: value.to_string(),
    }
}

fn integer_cell(column: &str, row: usize, value: &Value) -> Result<u64, CoreError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && *float >= 0.0 && *float <= u64::MAX as f64)
                .map(|float| float as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid_cell(column, row, value))
}

fn float_cell(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|float| float.is_finite()).unwrap_or(0.0)
}

fn text_cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
