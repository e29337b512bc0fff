//! Per-card interest detector
//!
//! A small state machine that watches pointer activity over one content
//! card and decides, when the interaction ends, whether the visitor was
//! genuinely engaged. All inputs carry a millisecond timestamp supplied
//! by the caller, so the machine itself never reads a clock.
//!
//! States:
//! - `Idle`: no active hover; clicks still accumulate (the touch path has
//!   no hover), anchoring a new interaction at the first tap
//! - `Hovering`: accumulating signals; periodic velocity and AFK checks apply
//! - `Reported`: the last evaluation crossed the report threshold
//!
//! Evaluation fires exactly once per interaction: hover end closes a hover,
//! viewport exit closes any unfinalized interaction, hovered or not.
//! Whichever fires first wins; the loser of that race is a no-op.

use std::collections::VecDeque;

use driftfeed_common::models::{InterestReport, InterestTrigger};
use driftfeed_common::params::SenseParams;
use uuid::Uuid;

/// Detector lifecycle state for one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Idle,
    Hovering,
    Reported,
}

/// Outcome of one finished hover evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub content_id: Uuid,
    /// Final score, floored at zero and rounded to the nearest integer.
    pub score: i64,
    /// Uncapped hover duration in milliseconds.
    pub hover_duration_ms: u64,
    pub movement_detected: bool,
    pub slowdown_count: u32,
    pub scroll_slowdown_count: u32,
    pub micro_movement_count: u32,
    pub click_count: u32,
    pub was_afk: bool,
    pub trigger: InterestTrigger,
    /// True when the score reached the report threshold.
    pub reported: bool,
}

impl Evaluation {
    /// Wire-format report for the interest event endpoint.
    pub fn to_report(&self) -> InterestReport {
        InterestReport {
            content_id: self.content_id,
            interest_score: self.score,
            hover_duration_ms: self.hover_duration_ms as i64,
            movement_detected: self.movement_detected,
            slowdown_count: self.slowdown_count as i64,
            click_count: self.click_count as i64,
            was_afk: self.was_afk,
            trigger: self.trigger,
        }
    }
}

/// Interest detector for a single content card.
pub struct InterestDetector {
    content_id: Uuid,
    tuning: SenseParams,
    state: CardState,

    hover_started_ms: u64,
    last_position: Option<(f64, f64)>,
    /// Rolling window of movement samples (x, y, timestamp_ms) used by
    /// the periodic velocity sampler. Only real movements (distance at
    /// or above the movement threshold) enter the window.
    window: VecDeque<(f64, f64, u64)>,

    movement_detected: bool,
    micro_movements: u32,
    slowdowns: u32,
    scroll_slowdowns: u32,
    clicks: u32,

    afk: bool,
    afk_since_ms: u64,
    last_activity_ms: u64,

    /// True while an interaction is accumulating. Cleared by evaluation,
    /// so the hover-end / viewport-exit race resolves to exactly one report.
    active: bool,
}

impl InterestDetector {
    pub fn new(content_id: Uuid, tuning: SenseParams) -> Self {
        Self {
            content_id,
            tuning,
            state: CardState::Idle,
            hover_started_ms: 0,
            last_position: None,
            window: VecDeque::new(),
            movement_detected: false,
            micro_movements: 0,
            slowdowns: 0,
            scroll_slowdowns: 0,
            clicks: 0,
            afk: false,
            afk_since_ms: 0,
            last_activity_ms: 0,
            active: false,
        }
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn content_id(&self) -> Uuid {
        self.content_id
    }

    /// Reset every accumulator and anchor a new interaction at `now_ms`.
    fn begin(&mut self, now_ms: u64) {
        self.hover_started_ms = now_ms;
        self.last_position = None;
        self.window.clear();
        self.movement_detected = false;
        self.micro_movements = 0;
        self.slowdowns = 0;
        self.scroll_slowdowns = 0;
        self.clicks = 0;
        self.afk = false;
        self.afk_since_ms = 0;
        self.last_activity_ms = now_ms;
        self.active = true;
    }

    /// Pointer entered the card. Starts a fresh hover, resetting every
    /// accumulator from any previous interaction with this card.
    pub fn pointer_enter(&mut self, x: f64, y: f64, now_ms: u64) {
        self.begin(now_ms);
        self.state = CardState::Hovering;
        self.last_position = Some((x, y));
    }

    /// Pointer moved while over the card.
    ///
    /// Tiny displacements below the micro-movement threshold only bump the
    /// noise counter; displacements at or above the movement threshold set
    /// the movement flag, clear AFK, and feed the velocity window.
    pub fn pointer_move(&mut self, x: f64, y: f64, now_ms: u64) {
        if self.state != CardState::Hovering {
            return;
        }
        let Some((px, py)) = self.last_position else {
            self.last_position = Some((x, y));
            return;
        };
        let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();

        if distance < self.tuning.micro_movement_px {
            self.micro_movements += 1;
        }
        if distance >= self.tuning.movement_px {
            self.movement_detected = true;
            self.afk = false;
            self.last_activity_ms = now_ms;
            self.window.push_back((x, y, now_ms));
        }
        self.last_position = Some((x, y));
    }

    /// Click (or tap) on the card. Counts in any state: touch interfaces
    /// produce taps without a preceding hover, so a click outside a hover
    /// anchors a new interaction at the tap instant.
    pub fn click(&mut self, now_ms: u64) {
        if !self.active {
            self.begin(now_ms);
        }
        self.clicks += 1;
        self.afk = false;
        self.last_activity_ms = now_ms;
    }

    /// Periodic velocity sample (driven by the card runner).
    ///
    /// Prunes movement samples older than the velocity window, then
    /// compares net displacement over the window against the hover
    /// slowdown threshold. A slowdown is deliberate slow travel, so it
    /// only counts once real movement has been seen.
    pub fn sample_velocity(&mut self, now_ms: u64) {
        if self.state != CardState::Hovering {
            return;
        }
        while let Some(&(_, _, t)) = self.window.front() {
            if t + self.tuning.velocity_window_ms < now_ms {
                self.window.pop_front();
            } else {
                break;
            }
        }
        if self.window.len() < 2 {
            return;
        }
        let (Some(&(fx, fy, ft)), Some(&(lx, ly, lt))) =
            (self.window.front(), self.window.back())
        else {
            return;
        };
        let dt = lt.saturating_sub(ft);
        if dt == 0 {
            return;
        }
        let velocity = ((lx - fx).powi(2) + (ly - fy).powi(2)).sqrt() / dt as f64;
        if self.movement_detected && velocity < self.tuning.hover_slowdown_px_per_ms {
            self.slowdowns += 1;
        }
    }

    /// Periodic AFK check (driven by the card runner). Marks the visitor
    /// away after the inactivity threshold; the timestamp of the
    /// transition anchors the away-time penalty at evaluation.
    pub fn check_afk(&mut self, now_ms: u64) {
        if self.state != CardState::Hovering || self.afk {
            return;
        }
        if now_ms.saturating_sub(self.last_activity_ms) >= self.tuning.afk_threshold_ms {
            self.afk = true;
            self.afk_since_ms = now_ms;
        }
    }

    /// Add page-scroll slowdown crossings drained from the scroll
    /// coordinator for this card.
    pub fn add_scroll_slowdowns(&mut self, count: u32) {
        if self.active {
            self.scroll_slowdowns += count;
        }
    }

    /// Pointer left the card. Evaluates the hover unless viewport exit
    /// already did.
    pub fn pointer_leave(&mut self, now_ms: u64) -> Option<Evaluation> {
        if self.state != CardState::Hovering || !self.active {
            return None;
        }
        Some(self.evaluate(now_ms, InterestTrigger::HoverEnd))
    }

    /// Card left the viewport. Forces an immediate evaluation of any
    /// unfinalized interaction, hovered or not; an interaction that
    /// already evaluated is a no-op.
    pub fn viewport_exit(&mut self, now_ms: u64) -> Option<Evaluation> {
        if !self.active {
            return None;
        }
        Some(self.evaluate(now_ms, InterestTrigger::ViewportExit))
    }

    fn evaluate(&mut self, now_ms: u64, trigger: InterestTrigger) -> Evaluation {
        let raw_hover_ms = now_ms.saturating_sub(self.hover_started_ms);
        let capped_ms = raw_hover_ms.min(self.tuning.hover_cap_ms);

        let mut score = capped_ms as f64 / 1000.0 * 2.0;
        if self.movement_detected && !self.afk {
            score += 10.0;
        }
        score += self.slowdowns as f64 * 5.0;
        score += self.clicks as f64 * 30.0;
        score += self.scroll_slowdowns as f64 * 3.0;
        if self.micro_movements > 10 {
            score -= 5.0;
        }
        if self.afk {
            let away_secs = now_ms.saturating_sub(self.afk_since_ms) as f64 / 1000.0;
            score -= away_secs * 3.0;
        }
        if raw_hover_ms < 1500 && !self.movement_detected {
            score -= 10.0;
        }

        let score = score.max(0.0).round() as i64;
        let reported = score >= self.tuning.report_threshold;

        let evaluation = Evaluation {
            content_id: self.content_id,
            score,
            hover_duration_ms: raw_hover_ms,
            movement_detected: self.movement_detected,
            slowdown_count: self.slowdowns,
            scroll_slowdown_count: self.scroll_slowdowns,
            micro_movement_count: self.micro_movements,
            click_count: self.clicks,
            was_afk: self.afk,
            trigger,
            reported,
        };

        self.active = false;
        self.state = if reported {
            CardState::Reported
        } else {
            CardState::Idle
        };

        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> InterestDetector {
        InterestDetector::new(Uuid::new_v4(), SenseParams::default())
    }

    #[test]
    fn afk_hover_scores_below_threshold() {
        let mut d = detector();
        d.pointer_enter(100.0, 100.0, 0);
        // Runner ticks the AFK check once per second; the pointer never moves.
        for t in (1000..=6000).step_by(1000) {
            d.check_afk(t);
        }
        let eval = d.pointer_leave(6000).unwrap();
        // 6s hover = 12, minus 1s away at -3/s = 9
        assert_eq!(eval.score, 9);
        assert!(eval.was_afk);
        assert!(!eval.reported);
        assert_eq!(d.state(), CardState::Idle);
    }

    #[test]
    fn single_click_does_not_clear_threshold() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.click(100);
        let eval = d.pointer_leave(200).unwrap();
        // 0.2s hover = 0.4, +30 click, -10 short-hover-no-movement
        assert_eq!(eval.score, 20);
        assert!(!eval.reported);
    }

    #[test]
    fn double_click_clears_threshold() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.click(100);
        d.click(150);
        let eval = d.pointer_leave(200).unwrap();
        // 0.4 + 60 - 10 = 50.4, rounds to 50, at threshold
        assert_eq!(eval.score, 50);
        assert!(eval.reported);
        assert_eq!(d.state(), CardState::Reported);
    }

    #[test]
    fn movement_bonus_applies() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.pointer_move(100.0, 100.0, 500);
        let eval = d.pointer_leave(2000).unwrap();
        // 4 hover + 10 movement
        assert_eq!(eval.score, 14);
        assert!(eval.movement_detected);
    }

    #[test]
    fn micro_movement_noise_is_penalized() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        // Twelve 3px jitters: below the movement threshold, all micro
        let mut x = 0.0;
        for i in 0..12 {
            x += 3.0;
            d.pointer_move(x, 0.0, 100 + i * 50);
        }
        let eval = d.pointer_leave(2000).unwrap();
        assert_eq!(eval.micro_movement_count, 12);
        assert!(!eval.movement_detected);
        // 4 hover - 5 jitter penalty; no short-hover penalty at 2s
        assert_eq!(eval.score, 0);
    }

    #[test]
    fn slow_deliberate_travel_counts_slowdowns() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.pointer_move(50.0, 0.0, 100);
        d.pointer_move(55.0, 0.0, 600);
        // Net 5px over 500ms = 0.01 px/ms, well under the threshold
        d.sample_velocity(700);
        let eval = d.pointer_leave(1600).unwrap();
        assert_eq!(eval.slowdown_count, 1);
        // 3.2 hover + 10 movement + 5 slowdown
        assert_eq!(eval.score, 18);
    }

    #[test]
    fn slowdown_requires_prior_movement() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.sample_velocity(100);
        d.sample_velocity(200);
        let eval = d.pointer_leave(2000).unwrap();
        assert_eq!(eval.slowdown_count, 0);
    }

    #[test]
    fn hover_duration_is_capped() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.pointer_move(100.0, 0.0, 500);
        let eval = d.pointer_leave(90_000).unwrap();
        // Capped at 30s = 60, plus movement bonus
        assert_eq!(eval.score, 70);
        assert_eq!(eval.hover_duration_ms, 90_000);
    }

    #[test]
    fn viewport_exit_wins_race_with_hover_end() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.pointer_move(100.0, 0.0, 500);
        let eval = d.viewport_exit(1000).unwrap();
        assert_eq!(eval.trigger, InterestTrigger::ViewportExit);
        assert!(d.pointer_leave(1001).is_none());
    }

    #[test]
    fn hover_end_wins_race_with_viewport_exit() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        let eval = d.pointer_leave(1000).unwrap();
        assert_eq!(eval.trigger, InterestTrigger::HoverEnd);
        assert!(d.viewport_exit(1001).is_none());
    }

    #[test]
    fn viewport_exit_without_any_interaction_is_ignored() {
        let mut d = detector();
        assert!(d.viewport_exit(1000).is_none());
    }

    #[test]
    fn taps_without_hover_are_scored_on_viewport_exit() {
        let mut d = detector();
        d.click(100);
        d.click(150);
        let eval = d.viewport_exit(200).unwrap();
        assert_eq!(eval.trigger, InterestTrigger::ViewportExit);
        assert_eq!(eval.click_count, 2);
        // 0.1s anchored at the first tap = 0.2, +60 clicks, -10 short-no-movement
        assert_eq!(eval.score, 50);
        assert!(eval.reported);
        assert_eq!(d.state(), CardState::Reported);
    }

    #[test]
    fn single_tap_without_hover_stays_below_threshold() {
        let mut d = detector();
        d.click(100);
        let eval = d.viewport_exit(200).unwrap();
        // 0.2 + 30 - 10 short-no-movement
        assert_eq!(eval.score, 20);
        assert!(!eval.reported);
        assert_eq!(d.state(), CardState::Idle);
    }

    #[test]
    fn tap_interaction_anchors_at_the_first_tap() {
        let mut d = detector();
        d.click(5000);
        let eval = d.viewport_exit(5100).unwrap();
        assert_eq!(eval.hover_duration_ms, 100);
    }

    #[test]
    fn tap_after_an_evaluated_hover_starts_fresh() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.click(100);
        assert!(d.pointer_leave(200).is_some());

        d.click(1000);
        let eval = d.viewport_exit(1100).unwrap();
        assert_eq!(eval.click_count, 1);
        assert_eq!(eval.hover_duration_ms, 100);
    }

    #[test]
    fn movement_clears_afk() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.check_afk(5000);
        assert!(d.afk);
        d.pointer_move(100.0, 0.0, 5500);
        let eval = d.pointer_leave(6000).unwrap();
        assert!(!eval.was_afk);
        // 12 hover + 10 movement
        assert_eq!(eval.score, 22);
    }

    #[test]
    fn scroll_slowdowns_add_to_score() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.add_scroll_slowdowns(2);
        let eval = d.pointer_leave(2000).unwrap();
        assert_eq!(eval.scroll_slowdown_count, 2);
        // 4 hover + 6 scroll slowdowns; 2s hover avoids the short-hover penalty
        assert_eq!(eval.score, 10);
    }

    #[test]
    fn reentry_resets_accumulators() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        d.click(100);
        d.click(150);
        let first = d.pointer_leave(200).unwrap();
        assert!(first.reported);

        d.pointer_enter(0.0, 0.0, 10_000);
        let second = d.pointer_leave(12_000).unwrap();
        assert_eq!(second.click_count, 0);
        assert_eq!(second.score, 4);
    }

    #[test]
    fn floor_never_goes_negative() {
        let mut d = detector();
        d.pointer_enter(0.0, 0.0, 0);
        let eval = d.pointer_leave(100).unwrap();
        // 0.2 - 10 short-hover floors at 0
        assert_eq!(eval.score, 0);
    }
}
