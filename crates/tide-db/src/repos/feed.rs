//! External feeds: measured temperatures, temperature profiles and feed consumption.

use tide_core::entities::{FeedRecord, ProfilePoint, TemperatureReading};
use tide_core::window::DateWindow;

use crate::error::DatabaseError;
use crate::helpers::{fmt_date, parse_date};
use crate::service::TideService;

impl TideService {
    pub async fn upsert_temperature_reading(
        &self,
        reading: &TemperatureReading,
    ) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO temperature_readings (assignment_id, day, temperature_c)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(assignment_id, day) DO UPDATE SET temperature_c = excluded.temperature_c",
                vec![
                    reading.assignment_id.as_str().into(),
                    fmt_date(reading.day).into(),
                    reading.temperature_c.into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_profile_point(&self, point: &ProfilePoint) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO profile_points (profile_id, day, temperature_c)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(profile_id, day) DO UPDATE SET temperature_c = excluded.temperature_c",
                vec![
                    point.profile_id.as_str().into(),
                    fmt_date(point.day).into(),
                    point.temperature_c.into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_feed_record(&self, record: &FeedRecord) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO feed_records (assignment_id, day, feed_kg, cost)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(assignment_id, day) DO UPDATE SET
                    feed_kg = excluded.feed_kg, cost = excluded.cost",
                vec![
                    record.assignment_id.as_str().into(),
                    fmt_date(record.day).into(),
                    record.feed_kg.into(),
                    record.cost.into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_temperature_readings(
        &self,
        assignment_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<TemperatureReading>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT assignment_id, day, temperature_c FROM temperature_readings
                 WHERE assignment_id = ?1 AND day >= ?2 AND day <= ?3 ORDER BY day",
                window_params(assignment_id, window),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(TemperatureReading {
                assignment_id: row.get(0)?,
                day: parse_date(&row.get::<String>(1)?)?,
                temperature_c: row.get(2)?,
            });
        }
        Ok(out)
    }

    pub async fn list_profile_points(
        &self,
        profile_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<ProfilePoint>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT profile_id, day, temperature_c FROM profile_points
                 WHERE profile_id = ?1 AND day >= ?2 AND day <= ?3 ORDER BY day",
                window_params(profile_id, window),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(ProfilePoint {
                profile_id: row.get(0)?,
                day: parse_date(&row.get::<String>(1)?)?,
                temperature_c: row.get(2)?,
            });
        }
        Ok(out)
    }

    pub async fn list_feed_records(
        &self,
        assignment_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<FeedRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT assignment_id, day, feed_kg, cost FROM feed_records
                 WHERE assignment_id = ?1 AND day >= ?2 AND day <= ?3 ORDER BY day",
                window_params(assignment_id, window),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(FeedRecord {
                assignment_id: row.get(0)?,
                day: parse_date(&row.get::<String>(1)?)?,
                feed_kg: row.get(2)?,
                cost: row.get(3)?,
            });
        }
        Ok(out)
    }
}

fn window_params(key: &str, window: &DateWindow) -> Vec<libsql::Value> {
    vec![
        key.into(),
        fmt_date(window.start).into(),
        fmt_date(window.end).into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{d, test_service};

    #[tokio::test]
    async fn readings_are_windowed_and_replaceable() {
        let svc = test_service().await;
        for day in 1..=4 {
            svc.upsert_temperature_reading(&TemperatureReading {
                assignment_id: "asg-1".into(),
                day: d(5, day),
                temperature_c: 10.0,
            })
            .await
            .unwrap();
        }
        svc.upsert_temperature_reading(&TemperatureReading {
            assignment_id: "asg-1".into(),
            day: d(5, 2),
            temperature_c: 12.5,
        })
        .await
        .unwrap();

        let window = DateWindow::new(d(5, 2), d(5, 3)).unwrap();
        let readings = svc.list_temperature_readings("asg-1", &window).await.unwrap();
        assert_eq!(readings.len(), 2);
        assert!((readings[0].temperature_c - 12.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn profile_and_feed_roundtrip() {
        let svc = test_service().await;
        svc.upsert_profile_point(&ProfilePoint {
            profile_id: "prof-1".into(),
            day: d(5, 1),
            temperature_c: 9.0,
        })
        .await
        .unwrap();
        svc.upsert_feed_record(&FeedRecord {
            assignment_id: "asg-1".into(),
            day: d(5, 1),
            feed_kg: 120.0,
            cost: 210.0,
        })
        .await
        .unwrap();

        let window = DateWindow::single(d(5, 1));
        assert_eq!(svc.list_profile_points("prof-1", &window).await.unwrap().len(), 1);
        let feed = svc.list_feed_records("asg-1", &window).await.unwrap();
        assert!((feed[0].feed_kg - 120.0).abs() < f64::EPSILON);
    }
}
