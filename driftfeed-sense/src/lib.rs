//! # Driftfeed Sense
//!
//! Client-side engagement detection core:
//! - Per-card interest detector state machine (`Idle -> Hovering ->
//!   (Idle | Reported)`) that separates genuine reading behavior from
//!   incidental pointer/touch noise
//! - Scroll coordinator context object feeding page-scroll slowdown
//!   signals to hovering cards
//! - Async card runner that drives the detector's periodic sampler and
//!   AFK checker
//! - Best-effort interest reporter (bounded queue, fire-and-forget HTTP)
//!
//! The detector itself is deterministic: every input carries a millisecond
//! timestamp supplied by the caller, so the state machine is testable with
//! literal inputs and the runner is the only place that touches a clock.

pub mod detector;
pub mod reporter;
pub mod runner;
pub mod scroll;

pub use detector::{CardState, Evaluation, InterestDetector};
pub use reporter::ReporterHandle;
pub use runner::{spawn_card, CardEvent, CardHandle};
pub use scroll::ScrollCoordinator;
