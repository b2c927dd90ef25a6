use ::duckdb::{params, Connection};
use tracing::info;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_stock_and_simulation",
        sql: r#"
CREATE TABLE IF NOT EXISTS stock_data (
    ticker TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    adj_close DOUBLE NOT NULL,
    volume UBIGINT NOT NULL,
    source TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(ticker, date)
);

CREATE TABLE IF NOT EXISTS simulation (
    run_id TEXT NOT NULL,
    id UBIGINT NOT NULL,
    simulation_num UBIGINT NOT NULL,
    ticker TEXT NOT NULL,
    year UINTEGER NOT NULL,
    starting_value DOUBLE NOT NULL,
    ending_value DOUBLE NOT NULL,
    annual_return DOUBLE NOT NULL,
    cumulative_return DOUBLE NOT NULL,
    volatility DOUBLE NOT NULL,
    probability_of_gain DOUBLE NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(run_id, id)
);

CREATE TABLE IF NOT EXISTS ingest_log (
    request_id TEXT NOT NULL,
    dataset TEXT NOT NULL,
    source TEXT,
    row_count UBIGINT NOT NULL,
    status TEXT NOT NULL,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_simulation_ticker ON simulation(run_id, ticker, simulation_num, year);
CREATE INDEX IF NOT EXISTS idx_ingest_log_dataset_ts ON ingest_log(dataset, timestamp);
"#,
    },
];

/// Applies every migration not yet recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params![migration.version],
        )?;
        info!(version = migration.version, "applied warehouse migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let connection = Connection::open_in_memory().expect("connection");
        apply_migrations(&connection).expect("first");
        apply_migrations(&connection).expect("second");

        let versions: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(versions, MIGRATIONS.len() as i64);
    }
}
