//! Identity migration endpoint
//!
//! Runs once, off the feed request path, when a session-tracked visitor
//! authenticates. The store performs the whole migration in one
//! transaction; on conflict the caller retries the operation as a whole.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::VisitorIdentity;
use crate::db::ViewHistoryStore;
use crate::error::{Error, Result};
use crate::AppState;

/// Body of POST /api/identity/migrate
#[derive(Debug, Deserialize)]
pub struct MigrateBody {
    /// The anonymous session key whose history should be re-parented
    pub session_key: String,
}

/// Response of POST /api/identity/migrate
#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    /// Rows re-pointed to the user id (0 on an idempotent replay)
    pub migrated: u64,
}

/// POST /api/identity/migrate
pub async fn post_migrate_identity(
    State(state): State<AppState>,
    visitor: VisitorIdentity,
    Json(body): Json<MigrateBody>,
) -> Result<Json<MigrateResponse>> {
    if !visitor.authenticated {
        return Err(Error::BadRequest(
            "identity migration requires an authenticated visitor".to_string(),
        ));
    }
    if body.session_key.trim().is_empty() {
        return Err(Error::BadRequest("session_key must not be empty".to_string()));
    }

    let store = ViewHistoryStore::new(state.db.clone());
    let migrated = store.migrate_ownership(&body.session_key, &visitor.key).await?;

    info!(
        "Migrated {} history rows from session {} to user {}",
        migrated, body.session_key, visitor.key
    );

    Ok(Json(MigrateResponse { migrated }))
}
