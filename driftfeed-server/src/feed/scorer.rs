//! Relevance scorer
//!
//! Pure functions only: no I/O, no clock reads. The caller supplies `now`
//! so two calls with identical inputs always return identical output.
//!
//! Relevance captures the personalization component in [0, 1]; the final
//! rank value blends it with the externally supplied trend score:
//! `display_score = relevance * 0.4 + trend_score * 0.6`.

use chrono::{DateTime, Utc};
use driftfeed_common::models::{ContentCandidate, VisitorProfile};
use driftfeed_common::time::within_hours;

/// Neutral relevance used when no profile signal exists
const NEUTRAL: f64 = 0.5;

/// Weight of the category-affinity term
const CATEGORY_WEIGHT: f64 = 0.3;
/// Weight of the keyword-match term
const KEYWORD_WEIGHT: f64 = 0.2;
/// Weight of the tag-overlap term
const TAG_WEIGHT: f64 = 0.1;
/// Weight of the recency term
const RECENCY_WEIGHT: f64 = 0.1;
/// Recency bonus window
const RECENCY_HOURS: i64 = 24;

/// Blend weights for the final rank value
const RELEVANCE_BLEND: f64 = 0.4;
const TREND_BLEND: f64 = 0.6;

/// Personalization relevance of `candidate` for `profile`, in [0, 1].
///
/// A neutral (empty) profile yields exactly 0.5 so unpersonalized visitors
/// rank purely on trend and recency-free blending.
pub fn relevance(candidate: &ContentCandidate, profile: &VisitorProfile, now: DateTime<Utc>) -> f64 {
    if profile.is_neutral() {
        return NEUTRAL;
    }

    let mut score = NEUTRAL;

    score += CATEGORY_WEIGHT * category_match_weight(&candidate.category, &profile.top_categories);

    if keyword_match(candidate, &profile.keywords) {
        score += KEYWORD_WEIGHT;
    }

    if tag_overlap(&candidate.tags, &profile.interests) {
        score += TAG_WEIGHT;
    }

    if within_hours(candidate.published_at, now, RECENCY_HOURS) {
        score += RECENCY_WEIGHT;
    }

    score.clamp(0.0, 1.0)
}

/// Final blended rank value in [0, 1]
pub fn display_score(relevance: f64, trend_score: f64) -> f64 {
    relevance * RELEVANCE_BLEND + trend_score.clamp(0.0, 1.0) * TREND_BLEND
}

/// Convenience: relevance and display score in one call
pub fn score_candidate(
    candidate: &ContentCandidate,
    profile: &VisitorProfile,
    now: DateTime<Utc>,
) -> (f64, f64) {
    let rel = relevance(candidate, profile, now);
    (rel, display_score(rel, candidate.trend_score))
}

/// Rank-weighted category affinity: the visitor's 1st category scores
/// highest, decaying linearly to the last ranked category; unranked
/// categories contribute nothing.
fn category_match_weight(category: &str, top_categories: &[String]) -> f64 {
    if top_categories.is_empty() {
        return 0.0;
    }

    match top_categories
        .iter()
        .position(|c| c.eq_ignore_ascii_case(category))
    {
        Some(rank) => (top_categories.len() - rank) as f64 / top_categories.len() as f64,
        None => 0.0,
    }
}

/// Any profile keyword appears in the candidate title or description
/// (case-insensitive substring match)
fn keyword_match(candidate: &ContentCandidate, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let title = candidate.title.to_lowercase();
    let description = candidate.description.to_lowercase();
    keywords
        .iter()
        .map(|k| k.to_lowercase())
        .any(|k| !k.is_empty() && (title.contains(&k) || description.contains(&k)))
}

fn tag_overlap(tags: &[String], interests: &[String]) -> bool {
    tags.iter()
        .any(|t| interests.iter().any(|i| i.eq_ignore_ascii_case(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use driftfeed_common::time;
    use uuid::Uuid;

    fn candidate(category: &str, title: &str, tags: &[&str], trend: f64) -> ContentCandidate {
        ContentCandidate {
            id: Uuid::new_v4(),
            category: category.to_string(),
            title: title.to_string(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            trend_score: trend,
            published_at: time::now() - Duration::hours(48),
        }
    }

    fn profile() -> VisitorProfile {
        VisitorProfile {
            top_categories: vec!["technology".into(), "science".into()],
            keywords: vec!["rust".into()],
            interests: vec!["compilers".into()],
        }
    }

    #[test]
    fn neutral_profile_scores_half() {
        let c = candidate("technology", "Rust 2.0 released", &["compilers"], 0.8);
        assert_eq!(relevance(&c, &VisitorProfile::neutral(), time::now()), 0.5);
    }

    #[test]
    fn relevance_is_pure_and_deterministic() {
        let c = candidate("technology", "Rust 2.0 released", &["compilers"], 0.8);
        let p = profile();
        let now = time::now();
        assert_eq!(relevance(&c, &p, now), relevance(&c, &p, now));
    }

    #[test]
    fn full_match_hits_the_upper_bound() {
        let mut c = candidate("technology", "Rust 2.0 released", &["compilers"], 0.8);
        c.published_at = time::now();
        let r = relevance(&c, &profile(), time::now());
        // 0.5 + 0.3 (top category) + 0.2 (keyword) + 0.1 (tags) + 0.1 (fresh) = 1.2, clamped
        assert_eq!(r, 1.0);
    }

    #[test]
    fn first_category_outranks_second() {
        let first = candidate("technology", "headline", &[], 0.5);
        let second = candidate("science", "headline", &[], 0.5);
        let now = time::now();
        let p = profile();
        assert!(relevance(&first, &p, now) > relevance(&second, &p, now));
        // Second-ranked category still beats an unranked one
        let unranked = candidate("sport", "headline", &[], 0.5);
        assert!(relevance(&second, &p, now) > relevance(&unranked, &p, now));
    }

    #[test]
    fn keyword_match_is_case_insensitive_over_title_and_description() {
        let mut c = candidate("sport", "RUST tournament", &[], 0.5);
        let p = VisitorProfile {
            keywords: vec!["rust".into()],
            top_categories: vec!["x".into()],
            interests: vec![],
        };
        let now = time::now();
        let with_kw = relevance(&c, &p, now);
        c.title = "tournament".into();
        let without_kw = relevance(&c, &p, now);
        assert!((with_kw - without_kw - 0.2).abs() < 1e-9);

        c.description = "a rusty affair".into();
        assert!((relevance(&c, &p, now) - with_kw).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let now = time::now();
        let p = profile();
        let extremes = [
            candidate("technology", "rust rust rust", &["compilers"], 1.0),
            candidate("none", "", &[], 0.0),
        ];
        for c in &extremes {
            let (rel, display) = score_candidate(c, &p, now);
            assert!((0.0..=1.0).contains(&rel));
            assert!((0.0..=1.0).contains(&display));
        }
    }

    #[test]
    fn display_score_blends_relevance_and_trend() {
        assert!((display_score(0.5, 0.5) - 0.5).abs() < 1e-9);
        assert!((display_score(1.0, 0.0) - 0.4).abs() < 1e-9);
        assert!((display_score(0.0, 1.0) - 0.6).abs() < 1e-9);
        // Out-of-range trend input is clamped, keeping output bounded
        assert!(display_score(1.0, 2.0) <= 1.0);
    }
}
