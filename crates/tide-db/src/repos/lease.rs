//! Named leases keeping periodic jobs (the nightly sweep) to one holder.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::helpers::fmt_datetime;
use crate::service::TideService;

impl TideService {
    /// Try to take lease `name` for `holder` until `now + ttl`.
    ///
    /// Succeeds when the lease is free, expired, or already held by `holder`.
    pub async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| DatabaseError::InvalidState(format!("lease ttl: {e}")))?;
        let mut rows = self
            .db()
            .query_with(
                "INSERT INTO sweep_leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    holder = excluded.holder,
                    expires_at = excluded.expires_at
                 WHERE sweep_leases.expires_at <= ?4 OR sweep_leases.holder = excluded.holder
                 RETURNING holder",
                vec![
                    name.into(),
                    holder.into(),
                    fmt_datetime(expires_at).into(),
                    fmt_datetime(now).into(),
                ],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Release a lease held by `holder`. Releasing someone else's lease is a no-op.
    pub async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "DELETE FROM sweep_leases WHERE name = ?1 AND holder = ?2",
                vec![name.into(), holder.into()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::helpers::test_service;
    use chrono::Utc;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn second_holder_is_refused_until_expiry() {
        let svc = test_service().await;
        let now = Utc::now();
        assert!(svc.try_acquire_lease("nightly", "w-1", HOUR, now).await.unwrap());
        assert!(!svc.try_acquire_lease("nightly", "w-2", HOUR, now).await.unwrap());
        // re-entrant for the same holder
        assert!(svc.try_acquire_lease("nightly", "w-1", HOUR, now).await.unwrap());

        let after = now + chrono::Duration::hours(2);
        assert!(svc.try_acquire_lease("nightly", "w-2", HOUR, after).await.unwrap());
    }

    #[tokio::test]
    async fn release_frees_the_lease() {
        let svc = test_service().await;
        let now = Utc::now();
        svc.try_acquire_lease("nightly", "w-1", HOUR, now).await.unwrap();
        svc.release_lease("nightly", "w-2").await.unwrap();
        assert!(!svc.try_acquire_lease("nightly", "w-2", HOUR, now).await.unwrap());
        svc.release_lease("nightly", "w-1").await.unwrap();
        assert!(svc.try_acquire_lease("nightly", "w-2", HOUR, now).await.unwrap());
    }
}
