//! Visitor profile builder
//!
//! Rebuilds the derived `VisitorProfile` projection on demand from the
//! trailing interaction window: category affinity from weighted view
//! history, keywords from clicked/read titles, interests from the tags of
//! high-interest content. Failures map to `ProfileUnavailable`; callers
//! recover with the neutral profile rather than failing the page.

use driftfeed_common::models::VisitorProfile;
use driftfeed_common::time;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Ranked categories kept in a profile
const TOP_CATEGORIES: usize = 5;
/// Keywords kept in a profile
const TOP_KEYWORDS: usize = 20;
/// Interest tags kept in a profile
const TOP_INTERESTS: usize = 10;
/// Minimum token length for a title word to count as a keyword
const MIN_KEYWORD_LEN: usize = 4;
/// Interest events at or above this score contribute interest tags
const INTEREST_SCORE_FLOOR: i64 = 50;
/// Recent titles scanned for keywords
const KEYWORD_TITLE_LIMIT: i64 = 50;

/// Engagement weights for category ranking
const WEIGHT_READ: &str = "WHEN 'read' THEN 5 WHEN 'clicked' THEN 3 ELSE 1";

/// Builds visitor profiles from view history and interest events
#[derive(Clone)]
pub struct ProfileBuilder {
    pool: SqlitePool,
}

impl ProfileBuilder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Build the profile for `visitor_key` over the last `window_days` days
    pub async fn build(&self, visitor_key: &str, window_days: i64) -> Result<VisitorProfile> {
        let since = time::window_start(time::now(), window_days);

        let top_categories = self.top_categories(visitor_key, since).await?;
        let keywords = self.keywords(visitor_key, since).await?;
        let interests = self.interests(visitor_key, since).await?;

        Ok(VisitorProfile {
            top_categories,
            keywords,
            interests,
        })
    }

    async fn top_categories(
        &self,
        visitor_key: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT c.category FROM view_history v \
             JOIN content c ON c.id = v.content_id \
             WHERE v.visitor_key = ? AND v.occurred_at >= ? \
             GROUP BY c.category \
             ORDER BY SUM(CASE v.view_type {} END) DESC, c.category ASC \
             LIMIT {}",
            WEIGHT_READ, TOP_CATEGORIES
        );

        sqlx::query_scalar(&sql)
            .bind(visitor_key)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::ProfileUnavailable(e.to_string()))
    }

    async fn keywords(
        &self,
        visitor_key: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT c.title FROM view_history v \
             JOIN content c ON c.id = v.content_id \
             WHERE v.visitor_key = ? AND v.view_type IN ('clicked', 'read') \
             AND v.occurred_at >= ? \
             ORDER BY v.occurred_at DESC LIMIT ?",
        )
        .bind(visitor_key)
        .bind(since)
        .bind(KEYWORD_TITLE_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::ProfileUnavailable(e.to_string()))?;

        let mut counts: HashMap<String, u32> = HashMap::new();
        for title in titles {
            for token in title
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
            {
                *counts.entry(token.to_lowercase()).or_insert(0) += 1;
            }
        }

        Ok(rank_by_count(counts, TOP_KEYWORDS))
    }

    async fn interests(
        &self,
        visitor_key: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>> {
        let tag_blobs: Vec<String> = sqlx::query_scalar(
            "SELECT c.tags FROM interest_events e \
             JOIN content c ON c.id = e.content_id \
             WHERE e.visitor_key = ? AND e.interest_score >= ? AND e.occurred_at >= ?",
        )
        .bind(visitor_key)
        .bind(INTEREST_SCORE_FLOOR)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::ProfileUnavailable(e.to_string()))?;

        let mut counts: HashMap<String, u32> = HashMap::new();
        for blob in tag_blobs {
            let tags: Vec<String> = serde_json::from_str(&blob).unwrap_or_default();
            for tag in tags {
                let tag = tag.to_lowercase();
                if !tag.is_empty() {
                    *counts.entry(tag).or_insert(0) += 1;
                }
            }
        }

        Ok(rank_by_count(counts, TOP_INTERESTS))
    }
}

/// Order by descending count, ties alphabetical for determinism
fn rank_by_count(counts: HashMap<String, u32>, keep: usize) -> Vec<String> {
    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(keep).map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ViewHistoryStore;
    use driftfeed_common::db::init_memory_database;
    use driftfeed_common::models::{InterestReport, InterestTrigger, ViewType};
    use uuid::Uuid;

    async fn seed_content(
        pool: &SqlitePool,
        category: &str,
        title: &str,
        tags: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO content (id, category, title, description, tags, trend_score, published_at) \
             VALUES (?, ?, ?, '', ?, 0.5, ?)",
        )
        .bind(id.to_string())
        .bind(category)
        .bind(title)
        .bind(tags)
        .bind(time::now())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn empty_history_builds_neutral_profile() {
        let pool = init_memory_database().await.unwrap();
        let builder = ProfileBuilder::new(pool);
        let profile = builder.build("sess-1", 30).await.unwrap();
        assert!(profile.is_neutral());
    }

    #[tokio::test]
    async fn reads_outweigh_views_in_category_ranking() {
        let pool = init_memory_database().await.unwrap();
        let store = ViewHistoryStore::new(pool.clone());

        // Three seen sport items vs one read technology item
        for _ in 0..3 {
            let id = seed_content(&pool, "sport", "match report", "[]").await;
            store.record_view("sess-1", id, ViewType::Seen, None).await.unwrap();
        }
        let tech = seed_content(&pool, "technology", "compiler deep dive", "[]").await;
        store.record_view("sess-1", tech, ViewType::Read, Some(120.0)).await.unwrap();

        let builder = ProfileBuilder::new(pool);
        let profile = builder.build("sess-1", 30).await.unwrap();
        assert_eq!(profile.top_categories[0], "technology");
        assert_eq!(profile.top_categories[1], "sport");
    }

    #[tokio::test]
    async fn keywords_come_from_clicked_and_read_titles_only() {
        let pool = init_memory_database().await.unwrap();
        let store = ViewHistoryStore::new(pool.clone());

        let clicked = seed_content(&pool, "technology", "Borrow checker internals", "[]").await;
        store.record_view("sess-1", clicked, ViewType::Clicked, None).await.unwrap();

        let only_seen = seed_content(&pool, "sport", "Unrelated marathon recap", "[]").await;
        store.record_view("sess-1", only_seen, ViewType::Seen, None).await.unwrap();

        let builder = ProfileBuilder::new(pool);
        let profile = builder.build("sess-1", 30).await.unwrap();

        assert!(profile.keywords.contains(&"borrow".to_string()));
        assert!(profile.keywords.contains(&"internals".to_string()));
        assert!(!profile.keywords.contains(&"marathon".to_string()));
        // Short tokens are dropped
        assert!(!profile.keywords.iter().any(|k| k.chars().count() < 4));
    }

    #[tokio::test]
    async fn interests_require_high_scoring_events() {
        let pool = init_memory_database().await.unwrap();
        let store = ViewHistoryStore::new(pool.clone());

        let hot = seed_content(&pool, "technology", "t", "[\"compilers\",\"rustc\"]").await;
        let cold = seed_content(&pool, "technology", "t", "[\"gossip\"]").await;

        let mut report = InterestReport {
            content_id: hot,
            interest_score: 80,
            hover_duration_ms: 9000,
            movement_detected: true,
            slowdown_count: 3,
            click_count: 1,
            was_afk: false,
            trigger: InterestTrigger::HoverEnd,
        };
        store.record_interest("sess-1", &report).await.unwrap();

        report.content_id = cold;
        report.interest_score = 12;
        store.record_interest("sess-1", &report).await.unwrap();

        let builder = ProfileBuilder::new(pool);
        let profile = builder.build("sess-1", 30).await.unwrap();

        assert!(profile.interests.contains(&"compilers".to_string()));
        assert!(profile.interests.contains(&"rustc".to_string()));
        assert!(!profile.interests.contains(&"gossip".to_string()));
    }
}
