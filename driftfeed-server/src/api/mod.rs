//! HTTP API handlers for driftfeed-server

pub mod feed;
pub mod health;
pub mod history;
pub mod identity;
pub mod interest;

pub use feed::get_feed;
pub use health::health_routes;
pub use history::{delete_history, get_history, get_seen_ids, post_view_record};
pub use identity::post_migrate_identity;
pub use interest::post_interest_event;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;

/// Visitor identity resolved from request headers.
///
/// The core only requires a stable visitor key and whether it belongs to an
/// authenticated user; session issuance lives in the gateway. Exactly one
/// key is active per request - session token or user id, never both.
#[derive(Debug, Clone)]
pub struct VisitorIdentity {
    pub key: String,
    pub authenticated: bool,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for VisitorIdentity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("x-visitor-key")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::BadRequest("missing X-Visitor-Key header".to_string()))?
            .to_string();

        let authenticated = parts
            .headers
            .get("x-visitor-authenticated")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(VisitorIdentity { key, authenticated })
    }
}
