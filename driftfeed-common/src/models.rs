//! Shared models for the feed personalization core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engagement tier recorded per content item per visitor.
///
/// Tiers escalate: `seen` (served in a feed page), `clicked` (opened),
/// `read` (dwell-confirmed). At most one `seen` row exists per
/// `(visitor_key, content_id)` pair; `clicked` and `read` may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Seen,
    Clicked,
    Read,
}

impl ViewType {
    /// Stable string form used in the database and query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Seen => "seen",
            ViewType::Clicked => "clicked",
            ViewType::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seen" => Some(ViewType::Seen),
            "clicked" => Some(ViewType::Clicked),
            "read" => Some(ViewType::Read),
            _ => None,
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What caused an interest evaluation to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestTrigger {
    /// Pointer left the card (or touch ended)
    HoverEnd,
    /// Card scrolled out of the viewport
    ViewportExit,
}

impl InterestTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestTrigger::HoverEnd => "hover_end",
            InterestTrigger::ViewportExit => "viewport_exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hover_end" => Some(InterestTrigger::HoverEnd),
            "viewport_exit" => Some(InterestTrigger::ViewportExit),
            _ => None,
        }
    }
}

impl std::fmt::Display for InterestTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of one content item at scoring time.
///
/// Owned by the ingestion subsystem; read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCandidate {
    pub id: Uuid,
    pub category: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Externally supplied popularity signal in [0, 1]
    pub trend_score: f64,
    pub published_at: DateTime<Utc>,
}

/// Derived per-visitor affinity projection.
///
/// Rebuilt on demand from the recent interaction window; never persisted
/// verbatim and has no independent lifecycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitorProfile {
    /// Categories ranked by recent interaction frequency, strongest first
    pub top_categories: Vec<String>,
    /// Keywords harvested from clicked/read content titles
    pub keywords: Vec<String>,
    /// Explicit or inferred interest tags
    pub interests: Vec<String>,
}

impl VisitorProfile {
    /// Neutral profile used when no history exists or the builder fails.
    /// Scoring falls back to relevance 0.5 for a neutral profile.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        self.top_categories.is_empty() && self.keywords.is_empty() && self.interests.is_empty()
    }
}

/// One row of a visitor's view history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewHistoryRecord {
    pub id: Uuid,
    pub visitor_key: String,
    pub content_id: Uuid,
    pub view_type: ViewType,
    pub occurred_at: DateTime<Utc>,
    pub dwell_seconds: Option<f64>,
}

/// Interest event payload as reported by the client-side detector.
///
/// This is the wire body of `POST /api/interest-event`; the server adds
/// the visitor key and timestamp when persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestReport {
    pub content_id: Uuid,
    pub interest_score: i64,
    pub hover_duration_ms: i64,
    pub movement_detected: bool,
    pub slowdown_count: i64,
    pub click_count: i64,
    pub was_afk: bool,
    pub trigger: InterestTrigger,
}

/// Persisted interest event (write-once, append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestEvent {
    pub id: Uuid,
    pub visitor_key: String,
    pub content_id: Uuid,
    pub interest_score: i64,
    pub hover_duration_ms: i64,
    pub movement_detected: bool,
    pub slowdown_count: i64,
    pub click_count: i64,
    pub was_afk: bool,
    pub trigger: InterestTrigger,
    pub occurred_at: DateTime<Utc>,
}
