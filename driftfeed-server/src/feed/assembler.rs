//! Feed assembler
//!
//! Orchestrates one feed page: seen-set exclusion, candidate retrieval,
//! pure scoring, deterministic ordering, diversity injection, cursor
//! minting, and serve-time seen recording. No cross-request state lives
//! here; everything shared sits behind the view history store.

use chrono::{DateTime, Utc};
use driftfeed_common::cursor::Cursor;
use driftfeed_common::models::{ContentCandidate, VisitorProfile};
use driftfeed_common::params::FeedParams;
use driftfeed_common::time;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{CandidateSource, ViewHistoryStore};
use crate::error::{Error, Result};
use crate::feed::scorer;

/// One feed page request, cursor already decoded (or absent)
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub visitor_key: String,
    pub page_size: i64,
    pub cursor: Option<Cursor>,
    pub category: Option<String>,
}

/// Scored candidate as returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub category: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub trend_score: f64,
    pub published_at: DateTime<Utc>,
    pub relevance: f64,
    pub display_score: f64,
}

/// One page of the feed
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Assembles scored, deduplicated, cursor-paginated feed pages
#[derive(Clone)]
pub struct FeedAssembler {
    store: ViewHistoryStore,
    candidates: CandidateSource,
    params: FeedParams,
}

impl FeedAssembler {
    pub fn new(store: ViewHistoryStore, candidates: CandidateSource, params: FeedParams) -> Self {
        Self {
            store,
            candidates,
            params,
        }
    }

    /// Assemble one page under the configured time bound.
    ///
    /// The feed sits on a user-facing scroll path: exceeding the bound
    /// yields a retryable `Timeout` rather than a hang. Only page assembly
    /// counts against the budget; seen recording runs after the page is
    /// committed, so a timeout can never land after items were marked seen
    /// (which would hide a page the visitor never received).
    pub async fn assemble_bounded(
        &self,
        request: &FeedRequest,
        profile: &VisitorProfile,
    ) -> Result<FeedPage> {
        let budget = Duration::from_millis(self.params.request_timeout_ms);
        let page = tokio::time::timeout(budget, self.build_page(request, profile))
            .await
            .map_err(|_| Error::Timeout)??;

        self.record_served(&request.visitor_key, &page.items).await;
        Ok(page)
    }

    /// Assemble one feed page
    pub async fn assemble(
        &self,
        request: &FeedRequest,
        profile: &VisitorProfile,
    ) -> Result<FeedPage> {
        let page = self.build_page(request, profile).await?;
        self.record_served(&request.visitor_key, &page.items).await;
        Ok(page)
    }

    async fn build_page(
        &self,
        request: &FeedRequest,
        profile: &VisitorProfile,
    ) -> Result<FeedPage> {
        let page_index = match &request.cursor {
            Some(cursor) => cursor.page + 1,
            None => 1,
        };

        // Every Nth page ignores the category filter so off-filter content
        // can break the filter bubble; other pages honour it
        let diversity_page = page_index % self.params.diversity_interval == 0;
        let category = if diversity_page {
            None
        } else {
            request.category.as_deref()
        };

        let seen = self.store.seen_ids(&request.visitor_key).await?;

        // +1 beyond the slice so has_more can be decided without a recount
        let pool_limit = request
            .page_size
            .saturating_mul(self.params.candidate_multiplier)
            .saturating_add(1);
        let pool = self
            .candidates
            .fetch_candidates(category, &seen, pool_limit)
            .await?;

        let now = time::now();
        let mut scored: Vec<(f64, f64, ContentCandidate)> = pool
            .into_iter()
            .map(|candidate| {
                let (relevance, display) = scorer::score_candidate(&candidate, profile, now);
                (relevance, display, candidate)
            })
            .collect();

        scored.sort_by(|a, b| rank_key(b.1, b.2.id, a.1, a.2.id));

        // Serve-time seen recording is what prevents re-serving; the cursor
        // only guards the tie region at the page boundary, where an item
        // sharing the last-served score could slip back in if its seen
        // record was lost. Items at other scores pass freely, which keeps
        // diversity pages (whose scores are unrelated to the filtered
        // pool's) intact.
        if let Some(cursor) = &request.cursor {
            scored.retain(|(_, display, candidate)| {
                !tied_at_or_before(*display, candidate.id, cursor.last_score, cursor.last_id)
            });
        }

        let has_more = scored.len() as i64 > request.page_size;
        scored.truncate(request.page_size as usize);

        let items: Vec<FeedItem> = scored
            .into_iter()
            .map(|(relevance, display_score, c)| FeedItem {
                id: c.id,
                category: c.category,
                title: c.title,
                description: c.description,
                tags: c.tags,
                trend_score: c.trend_score,
                published_at: c.published_at,
                relevance,
                display_score,
            })
            .collect();

        let next_cursor = items.last().map(|last| {
            Cursor {
                page: page_index,
                last_score: last.display_score,
                last_id: last.id,
            }
            .encode(&self.params.cursor_secret)
        });

        Ok(FeedPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Mark every item on a committed page as seen for this visitor.
    ///
    /// Recording happens at serve time; the client's viewport-based
    /// confirmation is an independent second layer.
    async fn record_served(&self, visitor_key: &str, items: &[FeedItem]) {
        for item in items {
            self.store
                .record_seen_best_effort(visitor_key, item.id)
                .await;
        }
    }
}

/// Descending display score, ascending id tie-break.
/// Arguments ordered so `sort_by(|a, b| rank_key(b.., a..))` sorts descending.
fn rank_key(score_b: f64, id_b: Uuid, score_a: f64, id_a: Uuid) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then_with(|| id_a.cmp(&id_b))
}

/// Whether `(score, id)` ties the cursor score without ranking after it.
/// Bit equality: the cursor transports the score bits exactly.
fn tied_at_or_before(score: f64, id: Uuid, cursor_score: f64, cursor_id: Uuid) -> bool {
    score.to_bits() == cursor_score.to_bits() && id <= cursor_id
}
