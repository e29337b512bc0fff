//! View history endpoints: recording, seen-set query, listing, clearing

use axum::extract::{Query, State};
use axum::Json;
use driftfeed_common::models::{ViewHistoryRecord, ViewType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VisitorIdentity;
use crate::db::ViewHistoryStore;
use crate::error::{Error, Result};
use crate::AppState;

/// Body of POST /api/view-record
#[derive(Debug, Deserialize)]
pub struct ViewRecordBody {
    pub content_id: Uuid,
    pub view_type: ViewType,
    pub dwell_seconds: Option<f64>,
}

/// Response of POST /api/view-record
#[derive(Debug, Serialize)]
pub struct ViewRecordResponse {
    pub id: Uuid,
}

/// POST /api/view-record
///
/// Client-side confirmation layer: clicks and dwell-confirmed reads, plus
/// viewport-based `seen` confirmations (idempotent against the serve-time
/// record).
pub async fn post_view_record(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Json(body): Json<ViewRecordBody>,
) -> Result<Json<ViewRecordResponse>> {
    if let Some(dwell) = body.dwell_seconds {
        if !dwell.is_finite() || dwell < 0.0 {
            return Err(Error::BadRequest("dwell_seconds must be non-negative".to_string()));
        }
    }

    let store = ViewHistoryStore::new(state.db.clone());
    let id = store
        .record_view(&visitor.key, body.content_id, body.view_type, body.dwell_seconds)
        .await?;

    Ok(Json(ViewRecordResponse { id }))
}

/// Response of GET /api/seen-ids
#[derive(Debug, Serialize)]
pub struct SeenIdsResponse {
    pub ids: Vec<Uuid>,
}

/// GET /api/seen-ids
pub async fn get_seen_ids(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
) -> Result<Json<SeenIdsResponse>> {
    let store = ViewHistoryStore::new(state.db.clone());
    let mut ids: Vec<Uuid> = store.seen_ids(&visitor.key).await?.into_iter().collect();
    ids.sort();

    Ok(Json(SeenIdsResponse { ids }))
}

/// Query parameters for GET /api/history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub view_type: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Response of GET /api/history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<ViewHistoryRecord>,
    pub page: i64,
    pub page_size: i64,
}

/// GET /api/history
///
/// Paginated view history, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let view_type = parse_view_type(query.view_type.as_deref())?;
    let page = query.page.unwrap_or(1).max(1);
    let page_size = state.params.clamp_page_size(query.page_size);

    let store = ViewHistoryStore::new(state.db.clone());
    let records = store.history(&visitor.key, view_type, page, page_size).await?;

    Ok(Json(HistoryResponse {
        records,
        page,
        page_size,
    }))
}

/// Query parameters for DELETE /api/history
#[derive(Debug, Deserialize)]
pub struct ClearHistoryQuery {
    pub view_type: Option<String>,
}

/// Response of DELETE /api/history
#[derive(Debug, Serialize)]
pub struct ClearHistoryResponse {
    pub deleted_count: u64,
}

/// DELETE /api/history
///
/// Visitor-initiated history clearing, optionally limited to one view type.
pub async fn delete_history(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Query(query): Query<ClearHistoryQuery>,
) -> Result<Json<ClearHistoryResponse>> {
    let view_type = parse_view_type(query.view_type.as_deref())?;

    let store = ViewHistoryStore::new(state.db.clone());
    let deleted_count = store.clear_history(&visitor.key, view_type).await?;

    Ok(Json(ClearHistoryResponse { deleted_count }))
}

fn parse_view_type(raw: Option<&str>) -> Result<Option<ViewType>> {
    match raw {
        None => Ok(None),
        Some(s) => ViewType::parse(s)
            .map(Some)
            .ok_or_else(|| Error::BadRequest(format!("unknown view_type: {}", s))),
    }
}
