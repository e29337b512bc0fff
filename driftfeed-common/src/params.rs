//! Tunable parameters
//!
//! Feed-side parameters are database-backed (settings table) and loaded once
//! at startup; detector thresholds are compiled defaults that callers may
//! override per card. Both are plain structs passed explicitly rather than
//! process-wide singletons.

use crate::db::get_setting;
use crate::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Feed assembly and profile-building parameters
#[derive(Debug, Clone)]
pub struct FeedParams {
    /// Default items per feed page
    ///
    /// Valid range: [1, max_page_size]
    /// Default: 20
    pub page_size: i64,

    /// Upper bound on client-requested page size
    ///
    /// Default: 100
    pub max_page_size: i64,

    /// Every Nth page drops the category filter to inject diversity
    ///
    /// Valid range: >= 2 (1 would disable category filtering entirely)
    /// Default: 3
    pub diversity_interval: u32,

    /// Candidate pool size as a multiple of page size.
    /// Oversampling leaves room for post-exclusion slicing and has_more.
    ///
    /// Default: 3
    pub candidate_multiplier: i64,

    /// Bound on feed assembly wall time before a retryable failure
    ///
    /// Default: 10000 ms
    pub request_timeout_ms: u64,

    /// Interaction window for visitor profile rebuilding
    ///
    /// Default: 30 days
    pub profile_window_days: i64,

    /// Keyed-hash secret for cursor integrity tags (per-database)
    pub cursor_secret: String,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_page_size: 100,
            diversity_interval: 3,
            candidate_multiplier: 3,
            request_timeout_ms: 10_000,
            profile_window_days: 30,
            cursor_secret: String::new(),
        }
    }
}

impl FeedParams {
    /// Load parameters from the settings table, falling back to defaults
    /// for missing or unparseable values.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let mut params = Self::default();

        params.page_size = load_numeric(pool, "feed_page_size", params.page_size).await?;
        params.max_page_size =
            load_numeric(pool, "feed_max_page_size", params.max_page_size).await?;
        params.diversity_interval =
            load_numeric(pool, "feed_diversity_interval", params.diversity_interval).await?;
        params.candidate_multiplier =
            load_numeric(pool, "feed_candidate_multiplier", params.candidate_multiplier).await?;
        params.request_timeout_ms =
            load_numeric(pool, "feed_request_timeout_ms", params.request_timeout_ms).await?;
        params.profile_window_days =
            load_numeric(pool, "profile_window_days", params.profile_window_days).await?;

        params.cursor_secret = get_setting(pool, "cursor_secret").await?.unwrap_or_default();
        if params.cursor_secret.is_empty() {
            warn!("cursor_secret missing from settings; cursors will not survive restarts");
        }

        if params.diversity_interval < 2 {
            warn!(
                "feed_diversity_interval {} below minimum, using 2",
                params.diversity_interval
            );
            params.diversity_interval = 2;
        }

        Ok(params)
    }

    /// Clamp a client-requested page size into the allowed range
    pub fn clamp_page_size(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size)
    }
}

async fn load_numeric<T: std::str::FromStr + Copy>(
    pool: &SqlitePool,
    key: &str,
    default: T,
) -> Result<T> {
    match get_setting(pool, key).await? {
        Some(raw) => match raw.parse() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!("Setting '{}' has unparseable value '{}', using default", key, raw);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Interest detector thresholds
///
/// Defaults reproduce the observed production behavior; the AFK penalty and
/// slowdown bonus remain additive in one evaluation, which is a tunable
/// interaction rather than a hard invariant.
#[derive(Debug, Clone)]
pub struct SenseParams {
    /// Pointer travel below this distance counts as micro-movement noise
    ///
    /// Default: 20.0 px
    pub micro_movement_px: f64,

    /// Pointer travel at or above this distance counts as real movement
    ///
    /// Default: 5.0 px
    pub movement_px: f64,

    /// Hover velocity below this marks careful reading (slowdown)
    ///
    /// Default: 0.3 px/ms
    pub hover_slowdown_px_per_ms: f64,

    /// Velocity sampler period while hovering
    ///
    /// Default: 100 ms
    pub sampler_period_ms: u64,

    /// AFK checker period while hovering
    ///
    /// Default: 1000 ms
    pub afk_check_period_ms: u64,

    /// No movement for this long flags AFK
    ///
    /// Default: 5000 ms
    pub afk_threshold_ms: u64,

    /// Hover duration cap for the duration bonus
    ///
    /// Default: 30000 ms
    pub hover_cap_ms: u64,

    /// Rolling window for instantaneous hover velocity
    ///
    /// Default: 1000 ms
    pub velocity_window_ms: u64,

    /// Minimum score for an evaluation to be reported
    ///
    /// Default: 50
    pub report_threshold: i64,

    /// Page-scroll velocity crossing that counts as a scroll slowdown
    ///
    /// Default: 2.0 px/ms
    pub scroll_slowdown_px_per_ms: f64,
}

impl Default for SenseParams {
    fn default() -> Self {
        Self {
            micro_movement_px: 20.0,
            movement_px: 5.0,
            hover_slowdown_px_per_ms: 0.3,
            sampler_period_ms: 100,
            afk_check_period_ms: 1000,
            afk_threshold_ms: 5000,
            hover_cap_ms: 30_000,
            velocity_window_ms: 1000,
            report_threshold: 50,
            scroll_slowdown_px_per_ms: 2.0,
        }
    }
}
