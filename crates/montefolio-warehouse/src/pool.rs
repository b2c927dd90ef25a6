//! Pooled DuckDB connections.
//!
//! Connections are opened lazily and handed back to the pool when the
//! [`PooledConnection`] guard drops. Idle connections are kept per access
//! mode, up to `max_idle` each.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    const fn slot(self) -> usize {
        match self {
            Self::ReadOnly => 0,
            Self::ReadWrite => 1,
        }
    }
}

struct PoolShared {
    db_path: PathBuf,
    max_idle: usize,
    idle: Mutex<[Vec<Connection>; 2]>,
}

#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                idle: Mutex::new([Vec::new(), Vec::new()]),
            }),
        }
    }

    /// Reuses an idle connection for `mode` or opens a new one.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .shared
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")[mode.slot()]
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                trace!(path = %self.shared.db_path.display(), ?mode, "opening duckdb connection");
                open_connection(&self.shared.db_path, mode)?
            }
        };

        Ok(PooledConnection {
            mode,
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }
}

/// Connection checked out of a [`ConnectionPool`].
pub struct PooledConnection {
    mode: AccessMode,
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection taken before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let mut idle = self
            .shared
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let slot = &mut idle[self.mode.slot()];
        if slot.len() < self.shared.max_idle {
            slot.push(connection);
        }
    }
}

fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    if mode == AccessMode::ReadOnly {
        // Older embedded builds reject this; reads never issue writes anyway.
        let _ = connection.execute_batch("SET access_mode = 'READ_ONLY';");
    }
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn returns_connections_to_the_pool() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::new(temp.path().join("pool.duckdb"), 1);

        {
            let connection = pool.acquire(AccessMode::ReadWrite).expect("acquire");
            connection
                .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
                .expect("write");
        }

        let idle = pool.shared.idle.lock().expect("lock")[AccessMode::ReadWrite.slot()].len();
        assert_eq!(idle, 1);

        let connection = pool.acquire(AccessMode::ReadWrite).expect("reacquire");
        let value: i32 = connection
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .expect("read");
        assert_eq!(value, 7);
    }
}
