//! Operational alerts: table rows plus the JSONL trail.

use chrono::{SubsecRound, Utc};

use tide_core::ids::PREFIX_ALERT;

use crate::alerts::OpsAlert;
use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, parse_datetime};
use crate::service::TideService;

impl TideService {
    /// Record an alert in the `alerts` table and append it to the trail.
    pub async fn raise_alert(
        &self,
        kind: &str,
        subject: &str,
        message: &str,
        attempts: u32,
    ) -> Result<OpsAlert, DatabaseError> {
        let alert = OpsAlert {
            id: self.db().generate_id(PREFIX_ALERT).await?,
            kind: kind.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
            attempts,
            // stored with microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.db()
            .execute_with(
                "INSERT INTO alerts (id, kind, subject, message, attempts, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                vec![
                    alert.id.as_str().into(),
                    kind.into(),
                    subject.into(),
                    message.into(),
                    i64::from(attempts).into(),
                    fmt_datetime(alert.created_at).into(),
                ],
            )
            .await?;
        self.alert_trail().append(&alert)?;
        Ok(alert)
    }

    /// Alerts, newest first.
    pub async fn list_alerts(&self, limit: u32) -> Result<Vec<OpsAlert>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT id, kind, subject, message, attempts, created_at
                 FROM alerts ORDER BY created_at DESC, id LIMIT ?1",
                vec![i64::from(limit).into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let attempts: i64 = row.get(4)?;
            out.push(OpsAlert {
                id: row.get(0)?,
                kind: row.get(1)?,
                subject: row.get(2)?,
                message: row.get(3)?,
                attempts: u32::try_from(attempts).unwrap_or_default(),
                created_at: parse_datetime(&row.get::<String>(5)?)?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::TideDb;
    use crate::alerts::{AlertTrail, KIND_TASK_RETRY_EXHAUSTED};
    use crate::service::TideService;
    use tempfile::TempDir;

    #[tokio::test]
    async fn alert_reaches_table_and_trail() {
        let dir = TempDir::new().unwrap();
        let db = TideDb::open_local(":memory:").await.unwrap();
        let svc = TideService::from_db(db, AlertTrail::new(dir.path()).unwrap());

        let alert = svc
            .raise_alert(KIND_TASK_RETRY_EXHAUSTED, "rct-1", "reconstruct failed", 3)
            .await
            .unwrap();
        assert!(alert.id.starts_with("alr-"));

        let listed = svc.list_alerts(10).await.unwrap();
        assert_eq!(listed, vec![alert.clone()]);
        assert_eq!(svc.alert_trail().read_all().unwrap(), vec![alert]);
    }
}
