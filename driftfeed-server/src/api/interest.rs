//! Interest event intake
//!
//! Fire-and-forget from the client's perspective: the endpoint always
//! acknowledges with 202. A storage failure loses one analytics signal,
//! which must never surface to the UI.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use driftfeed_common::models::InterestReport;
use tracing::warn;

use super::VisitorIdentity;
use crate::db::ViewHistoryStore;
use crate::AppState;

/// POST /api/interest-event
pub async fn post_interest_event(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Json(report): Json<InterestReport>,
) -> StatusCode {
    let store = ViewHistoryStore::new(state.db.clone());
    if let Err(e) = store.record_interest(&visitor.key, &report).await {
        warn!(
            "Failed to record interest event for visitor={} content={}: {}",
            visitor.key, report.content_id, e
        );
    }

    StatusCode::ACCEPTED
}
