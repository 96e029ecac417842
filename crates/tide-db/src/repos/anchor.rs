//! Anchor repository: append-only.
//!
//! No update or delete path exists and the schema rejects both with
//! triggers. Corrections are appended as new anchors and win ties by
//! `recorded_seq`. Replaying an identical normalized anchor is a no-op.

use chrono::{NaiveDate, Utc};

use tide_core::entities::{Anchor, NewAnchor};
use tide_core::ids::PREFIX_ANCHOR;
use tide_core::window::DateWindow;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_date, fmt_datetime, get_opt_string, opt, parse_date, parse_datetime, parse_enum,
    parse_json, to_json,
};
use crate::service::TideService;

const SELECT_COLS: &str = "id, source_type, source_id, cohort_id, assignment_id, occurred_on, \
     population_delta, average_weight_g, trust_tier, recorded_seq, raw, created_at";

fn row_to_anchor(row: &libsql::Row) -> Result<Anchor, DatabaseError> {
    Ok(Anchor {
        id: row.get(0)?,
        source_type: parse_enum(&row.get::<String>(1)?)?,
        source_id: row.get(2)?,
        cohort_id: row.get(3)?,
        assignment_id: get_opt_string(row, 4)?,
        occurred_on: parse_date(&row.get::<String>(5)?)?,
        population_delta: row.get(6)?,
        average_weight_g: row.get::<Option<f64>>(7)?,
        trust_tier: parse_enum(&row.get::<String>(8)?)?,
        recorded_seq: row.get(9)?,
        raw: parse_json(&row.get::<String>(10)?)?,
        created_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

impl TideService {
    /// Append a normalized anchor.
    ///
    /// Returns `None` when an identical anchor from the same source record was
    /// already stored.
    pub async fn append_anchor(&self, new: &NewAnchor) -> Result<Option<Anchor>, DatabaseError> {
        let id = self.db().generate_id(PREFIX_ANCHOR).await?;
        let now = Utc::now();
        let trust_tier = new.trust_tier();

        let mut rows = self
            .db()
            .query_with(
                "INSERT INTO anchors (id, source_type, source_id, cohort_id, assignment_id,
                    occurred_on, population_delta, average_weight_g, trust_tier, raw, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT DO NOTHING
                 RETURNING recorded_seq",
                vec![
                    id.as_str().into(),
                    new.source_type.as_str().into(),
                    new.source_id.as_str().into(),
                    new.cohort_id.as_str().into(),
                    opt(new.assignment_id.clone()),
                    fmt_date(new.occurred_on).into(),
                    new.population_delta.into(),
                    opt(new.average_weight_g),
                    trust_tier.as_str().into(),
                    to_json(&new.raw)?.into(),
                    fmt_datetime(now).into(),
                ],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            tracing::debug!(source_id = %new.source_id, "anchor already recorded, skipped");
            return Ok(None);
        };

        Ok(Some(Anchor {
            id,
            source_type: new.source_type,
            source_id: new.source_id.clone(),
            cohort_id: new.cohort_id.clone(),
            assignment_id: new.assignment_id.clone(),
            occurred_on: new.occurred_on,
            population_delta: new.population_delta,
            average_weight_g: new.average_weight_g,
            trust_tier,
            recorded_seq: row.get(0)?,
            raw: new.raw.clone(),
            created_at: now,
        }))
    }

    /// Assignment-linked anchors within `window`, ordered by day then record order.
    pub async fn list_assignment_anchors(
        &self,
        assignment_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<Anchor>, DatabaseError> {
        self.collect_anchors(
            &format!(
                "SELECT {SELECT_COLS} FROM anchors
                 WHERE assignment_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3
                 ORDER BY occurred_on, recorded_seq"
            ),
            vec![
                assignment_id.into(),
                fmt_date(window.start).into(),
                fmt_date(window.end).into(),
            ],
        )
        .await
    }

    /// Mortality recorded at cohort level only (no assignment link) within `window`.
    pub async fn list_cohort_level_mortality(
        &self,
        cohort_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<Anchor>, DatabaseError> {
        self.collect_anchors(
            &format!(
                "SELECT {SELECT_COLS} FROM anchors
                 WHERE cohort_id = ?1 AND assignment_id IS NULL AND source_type = 'mortality'
                   AND occurred_on >= ?2 AND occurred_on <= ?3
                 ORDER BY occurred_on, recorded_seq"
            ),
            vec![
                cohort_id.into(),
                fmt_date(window.start).into(),
                fmt_date(window.end).into(),
            ],
        )
        .await
    }

    /// Ids of assignments with an anchor that occurred on or after `since`, or
    /// was recorded on or after `since` (late backfills). Cohort-level anchors
    /// count for every assignment of the cohort.
    pub async fn assignments_touched_since(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<String>, DatabaseError> {
        let since_day = fmt_date(since);
        let mut rows = self
            .db()
            .query_with(
                "SELECT DISTINCT a.id FROM assignments a
                 JOIN anchors n
                   ON n.assignment_id = a.id
                   OR (n.assignment_id IS NULL AND n.cohort_id = a.cohort_id)
                 WHERE n.occurred_on >= ?1 OR n.created_at >= ?1
                 ORDER BY a.id",
                vec![since_day.into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<String>(0)?);
        }
        Ok(out)
    }

    async fn collect_anchors(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<Anchor>, DatabaseError> {
        let mut rows = self.db().query_with(sql, params).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_anchor(&row)?);
        }
        Ok(out)
    }
}
