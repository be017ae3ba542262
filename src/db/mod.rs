pub mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

use crate::errors::AppError;

/// Handle to the ledger database.
///
/// Holds no connection of its own: every operation opens a fresh connection
/// so requests share nothing in-process and all coordination happens in the
/// store's locks.
#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
    lock_timeout: Duration,
}

impl Database {
    /// Opens the database at `path`, applies pragmas and runs pending migrations.
    pub fn open(path: impl AsRef<Path>, lock_timeout: Duration) -> anyhow::Result<Self> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
            lock_timeout,
        };

        let conn = db.connect().context("failed to open database")?;
        let _: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .context("failed to enable WAL")?;
        migrations::run_migrations(&conn)?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(self.lock_timeout)?;
        Ok(conn)
    }

    /// Runs `f` on a blocking worker with its own connection.
    pub async fn run<F, T, E>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || -> Result<T, AppError> {
            let mut conn = db.connect()?;
            f(&mut conn).map_err(Into::into)
        })
        .await
        .map_err(|e| AppError::Internal(format!("database worker failed: {e}")))?
    }
}
