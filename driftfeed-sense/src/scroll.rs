//! Page-scroll coordinator
//!
//! One coordinator exists per page. Cards register while hovered and the
//! coordinator tallies, per card, how many times the page scroll velocity
//! crossed from fast to slow while that card was registered. The card
//! runner drains the tally into the detector just before evaluation.
//!
//! Each card gets its own crossing tally with its own previous-velocity
//! edge, so a card registered mid-scroll does not inherit a crossing that
//! happened before it was hovered.

use std::collections::HashMap;

use uuid::Uuid;

#[derive(Debug, Default)]
struct CrossingTally {
    prev_velocity: Option<f64>,
    count: u32,
}

/// Shared scroll-velocity tracker for one page of cards.
#[derive(Debug)]
pub struct ScrollCoordinator {
    slowdown_threshold_px_per_ms: f64,
    last_sample: Option<(f64, u64)>,
    cards: HashMap<Uuid, CrossingTally>,
}

impl ScrollCoordinator {
    pub fn new(slowdown_threshold_px_per_ms: f64) -> Self {
        Self {
            slowdown_threshold_px_per_ms,
            last_sample: None,
            cards: HashMap::new(),
        }
    }

    /// Record a page scroll position sample. Computes velocity against the
    /// previous sample and advances every registered card's crossing edge.
    pub fn on_scroll(&mut self, position_px: f64, now_ms: u64) {
        let previous = self.last_sample.replace((position_px, now_ms));
        let Some((prev_pos, prev_ms)) = previous else {
            return;
        };
        let dt = now_ms.saturating_sub(prev_ms);
        if dt == 0 {
            return;
        }
        let velocity = (position_px - prev_pos).abs() / dt as f64;

        for tally in self.cards.values_mut() {
            if let Some(prev) = tally.prev_velocity {
                if prev >= self.slowdown_threshold_px_per_ms
                    && velocity < self.slowdown_threshold_px_per_ms
                {
                    tally.count += 1;
                }
            }
            tally.prev_velocity = Some(velocity);
        }
    }

    /// Start tracking crossings for a card (called on hover start).
    /// Re-registering resets the card's tally.
    pub fn register(&mut self, card: Uuid) {
        self.cards.insert(card, CrossingTally::default());
    }

    /// Stop tracking a card and return its accumulated crossings.
    pub fn deregister(&mut self, card: Uuid) -> u32 {
        self.cards.remove(&card).map(|t| t.count).unwrap_or(0)
    }

    /// Take a card's accumulated crossings without deregistering it.
    pub fn take_slowdowns(&mut self, card: Uuid) -> u32 {
        match self.cards.get_mut(&card) {
            Some(tally) => std::mem::take(&mut tally.count),
            None => 0,
        }
    }
}
