//! View history store
//!
//! Durable record of which content a visitor has seen/clicked/read, plus the
//! append-only interest event log. Correctness of duplicate `seen` recording
//! rests on the partial unique index in the schema, not on application
//! locking: concurrent `record_view(seen)` calls for the same pair are safe
//! and idempotent by construction.

use chrono::{DateTime, Utc};
use driftfeed_common::models::{InterestReport, ViewHistoryRecord, ViewType};
use driftfeed_common::time;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Store over the `view_history` and `interest_events` tables
#[derive(Clone)]
pub struct ViewHistoryStore {
    pool: SqlitePool,
}

impl ViewHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a view for a visitor.
    ///
    /// For `seen`, insert-or-ignore against the unique index makes the call
    /// idempotent: a replay returns the id of the surviving original row.
    /// `clicked`/`read` always insert a new row.
    pub async fn record_view(
        &self,
        visitor_key: &str,
        content_id: Uuid,
        view_type: ViewType,
        dwell_seconds: Option<f64>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let occurred_at = time::now();

        match view_type {
            ViewType::Seen => {
                sqlx::query(
                    "INSERT OR IGNORE INTO view_history \
                     (id, visitor_key, content_id, view_type, occurred_at, dwell_seconds) \
                     VALUES (?, ?, ?, 'seen', ?, ?)",
                )
                .bind(id.to_string())
                .bind(visitor_key)
                .bind(content_id.to_string())
                .bind(occurred_at)
                .bind(dwell_seconds)
                .execute(&self.pool)
                .await?;

                // Ours on first insert, the original's on replays
                let surviving: String = sqlx::query_scalar(
                    "SELECT id FROM view_history \
                     WHERE visitor_key = ? AND content_id = ? AND view_type = 'seen'",
                )
                .bind(visitor_key)
                .bind(content_id.to_string())
                .fetch_one(&self.pool)
                .await?;

                parse_row_id(&surviving)
            }
            ViewType::Clicked | ViewType::Read => {
                sqlx::query(
                    "INSERT INTO view_history \
                     (id, visitor_key, content_id, view_type, occurred_at, dwell_seconds) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(visitor_key)
                .bind(content_id.to_string())
                .bind(view_type.as_str())
                .bind(occurred_at)
                .bind(dwell_seconds)
                .execute(&self.pool)
                .await?;

                Ok(id)
            }
        }
    }

    /// Serve-time `seen` recording: losing a dedup signal degrades
    /// personalization quality but must never block content delivery.
    pub async fn record_seen_best_effort(&self, visitor_key: &str, content_id: Uuid) {
        if let Err(e) = self.record_view(visitor_key, content_id, ViewType::Seen, None).await {
            warn!(
                "Failed to record seen view for visitor={} content={}: {}",
                visitor_key, content_id, e
            );
        }
    }

    /// All content ids this visitor has a `seen` record for.
    ///
    /// Reflects every prior seen write for the key at read time
    /// (read-your-writes within one visitor's session).
    pub async fn seen_ids(&self, visitor_key: &str) -> Result<HashSet<Uuid>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT content_id FROM view_history WHERE visitor_key = ? AND view_type = 'seen'",
        )
        .bind(visitor_key)
        .fetch_all(&self.pool)
        .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for raw in rows {
            match Uuid::parse_str(&raw) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => warn!("Skipping malformed content id in view_history: {}", raw),
            }
        }
        Ok(ids)
    }

    /// Paginated history for a visitor, newest first
    pub async fn history(
        &self,
        visitor_key: &str,
        view_type: Option<ViewType>,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ViewHistoryRecord>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 500);
        let offset = (page - 1) * page_size;

        let rows: Vec<(String, String, String, String, DateTime<Utc>, Option<f64>)> =
            match view_type {
                Some(vt) => {
                    sqlx::query_as(
                        "SELECT id, visitor_key, content_id, view_type, occurred_at, dwell_seconds \
                         FROM view_history WHERE visitor_key = ? AND view_type = ? \
                         ORDER BY occurred_at DESC, id DESC LIMIT ? OFFSET ?",
                    )
                    .bind(visitor_key)
                    .bind(vt.as_str())
                    .bind(page_size)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as(
                        "SELECT id, visitor_key, content_id, view_type, occurred_at, dwell_seconds \
                         FROM view_history WHERE visitor_key = ? \
                         ORDER BY occurred_at DESC, id DESC LIMIT ? OFFSET ?",
                    )
                    .bind(visitor_key)
                    .bind(page_size)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
                }
            };

        rows.into_iter()
            .map(|(id, visitor_key, content_id, view_type, occurred_at, dwell_seconds)| {
                Ok(ViewHistoryRecord {
                    id: parse_row_id(&id)?,
                    visitor_key,
                    content_id: parse_row_id(&content_id)?,
                    view_type: ViewType::parse(&view_type)
                        .ok_or_else(|| Error::Internal(format!("bad view_type: {}", view_type)))?,
                    occurred_at,
                    dwell_seconds,
                })
            })
            .collect()
    }

    /// Visitor-initiated history clearing. Returns the number of rows deleted.
    pub async fn clear_history(
        &self,
        visitor_key: &str,
        view_type: Option<ViewType>,
    ) -> Result<u64> {
        let result = match view_type {
            Some(vt) => {
                sqlx::query("DELETE FROM view_history WHERE visitor_key = ? AND view_type = ?")
                    .bind(visitor_key)
                    .bind(vt.as_str())
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM view_history WHERE visitor_key = ?")
                    .bind(visitor_key)
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }

    /// Append one interest event (write-once)
    pub async fn record_interest(
        &self,
        visitor_key: &str,
        report: &InterestReport,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO interest_events \
             (id, visitor_key, content_id, interest_score, hover_duration_ms, \
              movement_detected, slowdown_count, click_count, was_afk, trigger_kind, occurred_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(visitor_key)
        .bind(report.content_id.to_string())
        .bind(report.interest_score.max(0))
        .bind(report.hover_duration_ms.max(0))
        .bind(report.movement_detected)
        .bind(report.slowdown_count)
        .bind(report.click_count)
        .bind(report.was_afk)
        .bind(report.trigger.as_str())
        .bind(time::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Re-parent all session-scoped rows to an authenticated user id.
    ///
    /// Runs in a single transaction so readers observe either the fully
    /// pre-migration or fully post-migration state. Session `seen` rows that
    /// duplicate an existing user `seen` row are dropped inside the same
    /// transaction, which both avoids unique-index conflicts and makes the
    /// operation idempotent. Returns the number of rows re-pointed.
    pub async fn migrate_ownership(&self, session_key: &str, user_key: &str) -> Result<u64> {
        if session_key == user_key {
            return Err(Error::BadRequest(
                "session key and user key are identical".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::MigrationConflict(e.to_string()))?;

        let migrated = async {
            sqlx::query(
                "DELETE FROM view_history \
                 WHERE visitor_key = ? AND view_type = 'seen' AND content_id IN \
                 (SELECT content_id FROM view_history WHERE visitor_key = ? AND view_type = 'seen')",
            )
            .bind(session_key)
            .bind(user_key)
            .execute(&mut *tx)
            .await?;

            let views = sqlx::query("UPDATE view_history SET visitor_key = ? WHERE visitor_key = ?")
                .bind(user_key)
                .bind(session_key)
                .execute(&mut *tx)
                .await?;

            let events =
                sqlx::query("UPDATE interest_events SET visitor_key = ? WHERE visitor_key = ?")
                    .bind(user_key)
                    .bind(session_key)
                    .execute(&mut *tx)
                    .await?;

            Ok::<u64, sqlx::Error>(views.rows_affected() + events.rows_affected())
        }
        .await
        .map_err(|e| Error::MigrationConflict(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::MigrationConflict(e.to_string()))?;

        Ok(migrated)
    }
}

fn parse_row_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::Internal(format!("malformed row id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftfeed_common::db::init_memory_database;
    use driftfeed_common::models::InterestTrigger;

    async fn setup() -> ViewHistoryStore {
        let pool = init_memory_database().await.unwrap();
        ViewHistoryStore::new(pool)
    }

    fn report(content_id: Uuid, score: i64) -> InterestReport {
        InterestReport {
            content_id,
            interest_score: score,
            hover_duration_ms: 4200,
            movement_detected: true,
            slowdown_count: 2,
            click_count: 1,
            was_afk: false,
            trigger: InterestTrigger::HoverEnd,
        }
    }

    #[tokio::test]
    async fn seen_recording_is_idempotent() {
        let store = setup().await;
        let content = Uuid::new_v4();

        let first = store
            .record_view("sess-1", content, ViewType::Seen, None)
            .await
            .unwrap();
        let second = store
            .record_view("sess-1", content, ViewType::Seen, None)
            .await
            .unwrap();
        let third = store
            .record_view("sess-1", content, ViewType::Seen, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);

        let records = store.history("sess-1", Some(ViewType::Seen), 1, 50).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn clicked_and_read_rows_repeat() {
        let store = setup().await;
        let content = Uuid::new_v4();

        let a = store
            .record_view("sess-1", content, ViewType::Clicked, None)
            .await
            .unwrap();
        let b = store
            .record_view("sess-1", content, ViewType::Clicked, None)
            .await
            .unwrap();
        store
            .record_view("sess-1", content, ViewType::Read, Some(32.5))
            .await
            .unwrap();

        assert_ne!(a, b);
        let records = store.history("sess-1", None, 1, 50).await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn seen_ids_reflect_prior_writes() {
        let store = setup().await;
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        store.record_view("sess-1", c1, ViewType::Seen, None).await.unwrap();
        store.record_view("sess-1", c2, ViewType::Seen, None).await.unwrap();
        // Clicks don't count as seen
        store.record_view("sess-1", Uuid::new_v4(), ViewType::Clicked, None).await.unwrap();
        // Other visitors don't leak
        store.record_view("sess-2", Uuid::new_v4(), ViewType::Seen, None).await.unwrap();

        let ids = store.seen_ids("sess-1").await.unwrap();
        assert_eq!(ids, HashSet::from([c1, c2]));
    }

    #[tokio::test]
    async fn clear_history_reports_deleted_count() {
        let store = setup().await;
        let content = Uuid::new_v4();

        store.record_view("sess-1", content, ViewType::Seen, None).await.unwrap();
        store.record_view("sess-1", content, ViewType::Clicked, None).await.unwrap();
        store.record_view("sess-1", content, ViewType::Clicked, None).await.unwrap();

        let deleted = store.clear_history("sess-1", Some(ViewType::Clicked)).await.unwrap();
        assert_eq!(deleted, 2);

        let deleted = store.clear_history("sess-1", None).await.unwrap();
        assert_eq!(deleted, 1);

        assert!(store.seen_ids("sess-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn migration_moves_rows_and_is_idempotent() {
        let store = setup().await;
        let shared = Uuid::new_v4();
        let session_only = Uuid::new_v4();

        // User already saw `shared`; session saw both
        store.record_view("user-9", shared, ViewType::Seen, None).await.unwrap();
        store.record_view("sess-1", shared, ViewType::Seen, None).await.unwrap();
        store.record_view("sess-1", session_only, ViewType::Seen, None).await.unwrap();
        store.record_interest("sess-1", &report(session_only, 72)).await.unwrap();

        let moved = store.migrate_ownership("sess-1", "user-9").await.unwrap();
        // 1 view row (session_only) + 1 interest event; the duplicate was dropped
        assert_eq!(moved, 2);

        let ids = store.seen_ids("user-9").await.unwrap();
        assert_eq!(ids, HashSet::from([shared, session_only]));
        assert!(store.seen_ids("sess-1").await.unwrap().is_empty());

        // Replaying the migration is a no-op
        let moved = store.migrate_ownership("sess-1", "user-9").await.unwrap();
        assert_eq!(moved, 0);
    }

    #[tokio::test]
    async fn migration_rejects_identical_keys() {
        let store = setup().await;
        let err = store.migrate_ownership("k", "k").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn interest_events_clamp_negative_scores() {
        let store = setup().await;
        let content = Uuid::new_v4();
        store.record_interest("sess-1", &report(content, -5)).await.unwrap();

        let pool = store.pool.clone();
        let stored: i64 =
            sqlx::query_scalar("SELECT interest_score FROM interest_events WHERE visitor_key = 'sess-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, 0);
    }
}
