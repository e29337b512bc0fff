//! Feed endpoint
//!
//! The feed degrades gracefully instead of erroring: an invalid cursor
//! restarts pagination from page 1, and an unavailable profile falls back
//! to neutral scoring. Only a missing visitor key or an exhausted time
//! budget produce error responses.

use axum::extract::{Query, State};
use axum::Json;
use driftfeed_common::cursor::Cursor;
use driftfeed_common::models::VisitorProfile;
use serde::Deserialize;
use tracing::{debug, warn};

use super::VisitorIdentity;
use crate::db::{CandidateSource, ViewHistoryStore};
use crate::feed::{FeedAssembler, FeedPage, FeedRequest, ProfileBuilder};
use crate::error::Result;
use crate::AppState;

/// Query parameters for the feed endpoint
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub page_size: Option<i64>,
    pub cursor: Option<String>,
    pub category: Option<String>,
}

/// GET /api/feed
pub async fn get_feed(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let page_size = state.params.clamp_page_size(query.page_size);

    // Invalid or stale cursors fail closed to page 1
    let cursor = query.cursor.as_deref().and_then(|token| {
        let decoded = Cursor::decode(token, &state.params.cursor_secret);
        if decoded.is_none() {
            debug!(
                "Invalid cursor from visitor {}, restarting from page 1",
                visitor.key
            );
        }
        decoded
    });

    let profile = match ProfileBuilder::new(state.db.clone())
        .build(&visitor.key, state.params.profile_window_days)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            warn!(
                "Profile unavailable for visitor {}, serving neutral feed: {}",
                visitor.key, e
            );
            VisitorProfile::neutral()
        }
    };

    let assembler = FeedAssembler::new(
        ViewHistoryStore::new(state.db.clone()),
        CandidateSource::new(state.db.clone()),
        state.params.clone(),
    );

    let request = FeedRequest {
        visitor_key: visitor.key,
        page_size,
        cursor,
        category: query.category,
    };

    let page = assembler.assemble_bounded(&request, &profile).await?;
    Ok(Json(page))
}
