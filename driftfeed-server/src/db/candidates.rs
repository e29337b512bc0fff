//! Candidate retrieval
//!
//! Content candidates are owned by the ingestion subsystem and already
//! deduplicated by source; this layer only reads them. Exclusion of seen
//! ids happens in Rust after an oversampled fetch, which keeps the SQL free
//! of unbounded placeholder lists.

use chrono::{DateTime, Utc};
use driftfeed_common::models::ContentCandidate;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

/// Read-only source of content candidates
#[derive(Clone)]
pub struct CandidateSource {
    pool: sqlx::SqlitePool,
}

type CandidateRow = (String, String, String, String, String, f64, DateTime<Utc>);

impl CandidateSource {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch up to `limit` candidates, excluding `excluded` ids and matching
    /// `category` if present. Results favour trending and recent items so
    /// the scorer sees the strongest part of the pool first.
    pub async fn fetch_candidates(
        &self,
        category: Option<&str>,
        excluded: &HashSet<Uuid>,
        limit: i64,
    ) -> Result<Vec<ContentCandidate>> {
        // Oversample so post-exclusion still fills the request
        let fetch_limit = limit.saturating_add(excluded.len() as i64);

        let rows: Vec<CandidateRow> = match category {
            Some(cat) => {
                sqlx::query_as(
                    "SELECT id, category, title, description, tags, trend_score, published_at \
                     FROM content WHERE category = ? \
                     ORDER BY trend_score DESC, published_at DESC, id ASC LIMIT ?",
                )
                .bind(cat)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, category, title, description, tags, trend_score, published_at \
                     FROM content \
                     ORDER BY trend_score DESC, published_at DESC, id ASC LIMIT ?",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut candidates = Vec::with_capacity(limit as usize);
        for (id, category, title, description, tags, trend_score, published_at) in rows {
            let id = match Uuid::parse_str(&id) {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping content row with malformed id: {}", id);
                    continue;
                }
            };
            if excluded.contains(&id) {
                continue;
            }

            let tags: Vec<String> = serde_json::from_str(&tags).unwrap_or_else(|_| {
                warn!("Content {} has malformed tags JSON, treating as empty", id);
                Vec::new()
            });

            candidates.push(ContentCandidate {
                id,
                category,
                title,
                description,
                tags,
                trend_score: trend_score.clamp(0.0, 1.0),
                published_at,
            });

            if candidates.len() as i64 >= limit {
                break;
            }
        }

        Ok(candidates)
    }
}
