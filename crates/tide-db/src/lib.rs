//! # tide-db
//!
//! libSQL persistence for Tide: assignments and plan reference data,
//! the append-only anchor store, reconstructed daily states, external feeds,
//! the durable recompute queue, forward projections and operational alerts.
//!
//! Every repository method lives on [`service::TideService`]; `TideDb` is the
//! raw connection handle with migrations, ID generation and lock retry.

pub mod alerts;
pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod service;
mod test_support;

use error::DatabaseError;
use libsql::Builder;
use retry::{RetryConfig, is_transient_lock_error};

/// Central database handle.
pub struct TideDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    retry: RetryConfig,
}

impl TideDb {
    /// Open a local database at the given path, or `:memory:`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Wait briefly for other writers before surfacing SQLITE_BUSY.
        conn.query("PRAGMA busy_timeout = 2000", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;

        let tide_db = Self {
            db,
            conn,
            retry: RetryConfig::default(),
        };
        tide_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(tide_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"anc-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .query_with(
                "SELECT ?1 || '-' || lower(hex(randomblob(4)))",
                vec![prefix.into()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }

    /// Execute a statement, retrying transient lock errors with backoff.
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` for non-transient failures or once the
    /// retry budget is spent.
    pub async fn execute_with(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<u64, DatabaseError> {
        let mut attempt = 1;
        loop {
            match self
                .conn
                .execute(sql, libsql::params_from_iter(params.clone()))
                .await
            {
                Ok(n) => return Ok(n),
                Err(e) if attempt < self.retry.max_attempts && is_transient_lock_error(&e) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "database locked, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run a query, retrying transient lock errors with backoff.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` for non-transient failures or once the
    /// retry budget is spent.
    pub async fn query_with(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let mut attempt = 1;
        loop {
            match self
                .conn
                .query(sql, libsql::params_from_iter(params.clone()))
                .await
            {
                Ok(rows) => return Ok(rows),
                Err(e) if attempt < self.retry.max_attempts && is_transient_lock_error(&e) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "database locked, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
