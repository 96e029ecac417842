//! Service layer over the raw database handle.
//!
//! `TideService` wraps `TideDb` and the ops `AlertTrail`. All repository
//! methods are implemented as `impl TideService` blocks under `repos/`.

use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::TideDb;
use crate::alerts::AlertTrail;
use crate::error::DatabaseError;

pub struct TideService {
    db: TideDb,
    alerts: AlertTrail,
    enqueue_lock: Mutex<()>,
}

impl TideService {
    /// Create a new service wrapping a local database.
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `alert_dir` - Directory for the JSONL alert trail; `None` disables it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the alert
    /// directory cannot be created.
    pub async fn new_local(
        db_path: &str,
        alert_dir: Option<PathBuf>,
    ) -> Result<Self, DatabaseError> {
        let db = TideDb::open_local(db_path).await?;
        let alerts = match alert_dir {
            Some(dir) => AlertTrail::new(dir)?,
            None => AlertTrail::disabled(),
        };
        Ok(Self::from_db(db, alerts))
    }

    /// In-memory service with the alert trail disabled.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if migrations fail.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        Self::new_local(":memory:", None).await
    }

    #[must_use]
    pub fn from_db(db: TideDb, alerts: AlertTrail) -> Self {
        Self {
            db,
            alerts,
            enqueue_lock: Mutex::new(()),
        }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &TideDb {
        &self.db
    }

    #[must_use]
    pub const fn alert_trail(&self) -> &AlertTrail {
        &self.alerts
    }

    /// Serializes the read-merge-write of queue dedupe within this process.
    pub(crate) const fn enqueue_lock(&self) -> &Mutex<()> {
        &self.enqueue_lock
    }
}
