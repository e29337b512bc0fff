//! Card runner
//!
//! Owns one detector per visible card and drives it from two sources:
//! UI events arriving on a channel, and the periodic velocity/AFK timers
//! that only run while the card is hovered. The runner is the only
//! component that reads a clock; the detector sees millisecond offsets
//! from the card's spawn instant.
//!
//! Scroll slowdowns live in the shared [`ScrollCoordinator`]; the runner
//! registers the card on hover start and drains the tally into the
//! detector right before any evaluation.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use driftfeed_common::params::SenseParams;

use crate::detector::{CardState, Evaluation, InterestDetector};
use crate::reporter::ReporterHandle;
use crate::scroll::ScrollCoordinator;

/// UI events a card forwards to its runner.
#[derive(Debug, Clone)]
pub enum CardEvent {
    PointerEnter { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    Click,
    PointerLeave,
    ViewportExit,
}

/// Sending side of a card's event channel.
#[derive(Debug, Clone)]
pub struct CardHandle {
    tx: mpsc::Sender<CardEvent>,
}

impl CardHandle {
    /// Forward a UI event. Events for a torn-down card are ignored.
    pub async fn send(&self, event: CardEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// Spawn the runner task for one card.
///
/// The task ends when the handle is dropped; an active hover at that
/// point is evaluated as a viewport exit so the interaction is not lost.
pub fn spawn_card(
    content_id: Uuid,
    tuning: SenseParams,
    coordinator: Arc<Mutex<ScrollCoordinator>>,
    reporter: ReporterHandle,
) -> (CardHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let task = tokio::spawn(run_card(content_id, tuning, coordinator, reporter, rx));
    (CardHandle { tx }, task)
}

async fn run_card(
    content_id: Uuid,
    tuning: SenseParams,
    coordinator: Arc<Mutex<ScrollCoordinator>>,
    reporter: ReporterHandle,
    mut rx: mpsc::Receiver<CardEvent>,
) {
    let started = Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;

    let mut sampler = interval(std::time::Duration::from_millis(tuning.sampler_period_ms));
    sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut afk_timer = interval(std::time::Duration::from_millis(tuning.afk_check_period_ms));
    afk_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut detector = InterestDetector::new(content_id, tuning);

    loop {
        let hovering = detector.state() == CardState::Hovering;
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(CardEvent::PointerEnter { x, y }) => {
                        detector.pointer_enter(x, y, now_ms());
                        coordinator.lock().await.register(content_id);
                        // Restart the periodic checks for this hover
                        sampler.reset();
                        afk_timer.reset();
                    }
                    Some(CardEvent::PointerMove { x, y }) => {
                        detector.pointer_move(x, y, now_ms());
                    }
                    Some(CardEvent::Click) => {
                        detector.click(now_ms());
                    }
                    Some(CardEvent::PointerLeave) => {
                        finish_interaction(&mut detector, &coordinator, &reporter, now_ms(), false)
                            .await;
                    }
                    Some(CardEvent::ViewportExit) => {
                        finish_interaction(&mut detector, &coordinator, &reporter, now_ms(), true)
                            .await;
                    }
                    None => {
                        // Card torn down; close out any unfinalized interaction
                        finish_interaction(&mut detector, &coordinator, &reporter, now_ms(), true)
                            .await;
                        return;
                    }
                }
            }
            _ = sampler.tick(), if hovering => {
                detector.sample_velocity(now_ms());
            }
            _ = afk_timer.tick(), if hovering => {
                detector.check_afk(now_ms());
            }
        }
    }
}

/// Drain scroll slowdowns, evaluate the interaction, and report if
/// warranted. Tap-only interactions never hovered, so the detector decides
/// whether anything is left to evaluate.
async fn finish_interaction(
    detector: &mut InterestDetector,
    coordinator: &Arc<Mutex<ScrollCoordinator>>,
    reporter: &ReporterHandle,
    now_ms: u64,
    viewport_exit: bool,
) {
    let crossings = coordinator.lock().await.deregister(detector.content_id());
    detector.add_scroll_slowdowns(crossings);

    let evaluation = if viewport_exit {
        detector.viewport_exit(now_ms)
    } else {
        detector.pointer_leave(now_ms)
    };
    if let Some(evaluation) = evaluation {
        dispatch(&evaluation, reporter);
    }
}

fn dispatch(evaluation: &Evaluation, reporter: &ReporterHandle) {
    if evaluation.reported {
        reporter.report(evaluation.to_report());
    } else {
        debug!(
            "Interest evaluation for {} scored {} ({}), below threshold",
            evaluation.content_id, evaluation.score, evaluation.trigger
        );
    }
}
