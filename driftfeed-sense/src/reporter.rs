//! Best-effort interest reporter
//!
//! Evaluations that cross the report threshold are queued on a bounded
//! channel and forwarded to the feed service by a background task. A full
//! queue or a dead forwarder drops the report with a warning; interest
//! events are advisory and must never stall the card runner.

use driftfeed_common::models::InterestReport;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forwarder retries a failed POST this many times before dropping.
const RETRY_ATTEMPTS: u32 = 2;
/// Base delay between retries; doubles per attempt.
const RETRY_BASE_MS: u64 = 200;

/// Cheap clonable handle used by card runners to enqueue reports.
#[derive(Debug, Clone)]
pub struct ReporterHandle {
    tx: mpsc::Sender<InterestReport>,
}

impl ReporterHandle {
    /// Enqueue a report without waiting. Drops and warns when the queue
    /// is full or the forwarder has shut down.
    pub fn report(&self, report: InterestReport) {
        if let Err(e) = self.tx.try_send(report) {
            match e {
                mpsc::error::TrySendError::Full(r) => {
                    warn!("Interest report queue full; dropping report for {}", r.content_id);
                }
                mpsc::error::TrySendError::Closed(r) => {
                    warn!("Interest reporter is gone; dropping report for {}", r.content_id);
                }
            }
        }
    }
}

/// Create a reporter handle and the receiving end of its queue.
///
/// Tests consume the receiver directly; production passes it to
/// [`spawn_forwarder`].
pub fn channel(capacity: usize) -> (ReporterHandle, mpsc::Receiver<InterestReport>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ReporterHandle { tx }, rx)
}

/// Create a reporter whose queue drains to `POST {base_url}/api/interest-event`.
pub fn spawn_reporter(base_url: String, capacity: usize) -> ReporterHandle {
    let (handle, rx) = channel(capacity);
    tokio::spawn(forward_reports(base_url, rx));
    handle
}

/// Forward queued reports over HTTP until the queue closes.
pub async fn forward_reports(base_url: String, mut rx: mpsc::Receiver<InterestReport>) {
    let client = reqwest::Client::new();
    let endpoint = format!("{}/api/interest-event", base_url.trim_end_matches('/'));

    while let Some(report) = rx.recv().await {
        let mut delivered = false;
        for attempt in 0..=RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    RETRY_BASE_MS << (attempt - 1),
                ))
                .await;
            }
            match client.post(&endpoint).json(&report).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "Reported interest {} for {} ({})",
                        report.interest_score, report.content_id, report.trigger
                    );
                    delivered = true;
                    break;
                }
                Ok(response) => {
                    warn!(
                        "Interest report for {} rejected with {} (attempt {})",
                        report.content_id,
                        response.status(),
                        attempt + 1
                    );
                }
                Err(e) => {
                    warn!(
                        "Interest report for {} failed: {} (attempt {})",
                        report.content_id, e, attempt + 1
                    );
                }
            }
        }
        if !delivered {
            warn!("Dropping interest report for {}", report.content_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftfeed_common::models::InterestTrigger;
    use uuid::Uuid;

    fn report() -> InterestReport {
        InterestReport {
            content_id: Uuid::new_v4(),
            interest_score: 62,
            hover_duration_ms: 8000,
            movement_detected: true,
            slowdown_count: 2,
            click_count: 1,
            was_afk: false,
            trigger: InterestTrigger::HoverEnd,
        }
    }

    #[tokio::test]
    async fn reports_reach_the_queue() {
        let (handle, mut rx) = channel(4);
        handle.report(report());
        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.interest_score, 62);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (handle, mut rx) = channel(1);
        handle.report(report());
        handle.report(report()); // dropped, queue holds one
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_drops_without_panicking() {
        let (handle, rx) = channel(1);
        drop(rx);
        handle.report(report());
    }
}
