use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tollgate_core::GateError;

use crate::ledger::ApprovalLedger;
use crate::record::{ApprovalRecord, Verdict};

/// `decided_by` recorded on approvals denied for being stale.
pub const TIMEOUT_DECIDER: &str = "system:timeout";

/// Deny every pending approval older than `max_age`.
///
/// Expiry is an ordinary decision: an approval decided concurrently by a
/// human keeps that decision and is skipped here.
pub fn expire_pending(ledger: &ApprovalLedger, max_age: Duration) -> Vec<ApprovalRecord> {
    let now = Utc::now();
    let mut expired = Vec::new();

    for record in ledger.list_pending() {
        let age = (now - record.created_at).to_std().unwrap_or_default();
        if age < max_age {
            continue;
        }
        match ledger.decide(
            record.approval_id,
            Verdict::Denied,
            TIMEOUT_DECIDER,
            Some("timeout".to_string()),
        ) {
            Ok(denied) => expired.push(denied),
            Err(GateError::ApprovalAlreadyDecided { id, decision }) => {
                debug!(approval_id = %id, %decision, "approval decided before expiry");
            }
            Err(e) => warn!(approval_id = %record.approval_id, error = %e, "failed to expire approval"),
        }
    }

    if !expired.is_empty() {
        info!(count = expired.len(), max_age_secs = max_age.as_secs(), "expired stale approvals");
    }
    expired
}

/// How the background sweeper runs.
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    pub interval: Duration,
    /// `None` disables expiry; the sweeper then only picks up external decisions.
    pub max_age: Option<Duration>,
}

/// Periodically pull external decisions from the store and expire stale
/// approvals. Abort the handle to stop.
pub fn spawn_sweeper(ledger: Arc<ApprovalLedger>, policy: SweepPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(policy.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = policy.interval.as_secs(),
            max_age_secs = policy.max_age.map(|d| d.as_secs()),
            "approval sweeper started"
        );

        loop {
            ticker.tick().await;
            if let Err(e) = ledger.refresh() {
                warn!(error = %e, "approval refresh failed");
            }
            if let Some(max_age) = policy.max_age {
                expire_pending(&ledger, max_age);
            }
        }
    })
}
