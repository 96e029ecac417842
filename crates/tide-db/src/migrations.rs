//! Embedded schema migrations.
//!
//! Each migration runs once, inside a transaction, and is recorded by name
//! in `schema_migrations`. Opening an existing store applies only the
//! migrations it has not seen yet.

use chrono::Utc;

use crate::TideDb;
use crate::error::DatabaseError;
use crate::helpers::fmt_datetime;

/// Applied in order. Never edit or reorder a shipped entry; append a new one.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_initial", include_str!("../migrations/001_initial.sql")),
    ("002_task_claims", include_str!("../migrations/002_task_claims.sql")),
];

impl TideDb {
    /// Apply every embedded migration not yet recorded.
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    name TEXT PRIMARY KEY,
                    applied_at TEXT NOT NULL
                 )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Migration(format!("schema_migrations: {e}")))?;

        let applied = self.applied_migrations().await?;
        for (name, sql) in MIGRATIONS {
            if applied.iter().any(|done| done == name) {
                continue;
            }
            let tx = self.conn.transaction().await?;
            tx.execute_batch(sql)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
                libsql::params![*name, fmt_datetime(Utc::now())],
            )
            .await?;
            tx.commit().await?;
            tracing::debug!(migration = name, "migration applied");
        }
        Ok(())
    }

    /// Names of migrations already applied to this store.
    pub(crate) async fn applied_migrations(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT name FROM schema_migrations ORDER BY name", ())
            .await?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(row.get::<String>(0)?);
        }
        Ok(names)
    }
}
