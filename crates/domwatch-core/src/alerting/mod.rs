//! Alert state tracker
//!
//! Turns a stream of check results into a minimal set of alert signals.
//!
//! ## Emission policies
//!
//! - **Threshold** (`http`, `ssl` by default): one "triggered" event when a
//!   run of non-ok results reaches the threshold, silence while the run
//!   continues, one "recovered" event on the first `ok` after it.
//! - **Immediate** (everything else): one event per non-ok result.
//!
//! ## Ordering of effects
//!
//! ```text
//! CheckResult ─▶ transition() ─▶ store.put_alert_state() ─▶ emitter.send_async()
//!                 (pure)          (authoritative)            (best effort)
//! ```
//!
//! The state row is written before anything is emitted, and emission cannot
//! fail the call. Results are applied in processing order; a late-arriving
//! stale result is not reconciled against `finished_at`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{AlertMode, CheckPolicy, DEFAULT_ALERT_THRESHOLD};
use crate::error::Result;
use crate::model::{AlertKey, AlertState, CheckResult, CheckStatus};
use crate::traits::event_emitter::{EVENT_ALERT_RECOVERED, EVENT_ALERT_TRIGGERED, EVENT_CHECK_FAILED};
use crate::traits::{
    AlertMetadata, AlertPayload, AlertStateStore, AlertTransition, EmitOptions, EventEmitter,
    Severity,
};

/// What a single result did to an alert row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Threshold reached; alert is now active
    Triggered { threshold: u32, consecutive_failures: u32 },
    /// Active alert cleared by an `ok` result
    Recovered { threshold: u32, consecutive_failures: u32 },
    /// Immediate-class failure
    Immediate { consecutive_failures: u32 },
    /// Failure counted, threshold not reached yet
    Counting { consecutive_failures: u32 },
    /// Failure while the alert is already active
    Suppressed { consecutive_failures: u32 },
    /// `ok` with no active alert
    Healthy,
}

impl AlertDecision {
    /// Whether this decision produces an outbound event
    pub fn emits(&self) -> bool {
        matches!(
            self,
            AlertDecision::Triggered { .. }
                | AlertDecision::Recovered { .. }
                | AlertDecision::Immediate { .. }
        )
    }
}

/// Apply one result to an alert row
///
/// Pure state transition; callers persist `state` afterwards.
pub fn transition(
    state: &mut AlertState,
    status: CheckStatus,
    mode: AlertMode,
    now: DateTime<Utc>,
) -> AlertDecision {
    if !status.is_failure() {
        let run_length = state.consecutive_failure_count;
        state.consecutive_failure_count = 0;

        if !state.alert_active {
            return AlertDecision::Healthy;
        }

        state.alert_active = false;
        state.recovered_at = Some(now);
        let threshold = match mode {
            AlertMode::Threshold { threshold } => threshold,
            AlertMode::Immediate => DEFAULT_ALERT_THRESHOLD,
        };
        return AlertDecision::Recovered {
            threshold,
            consecutive_failures: run_length,
        };
    }

    state.consecutive_failure_count = state.consecutive_failure_count.saturating_add(1);
    let count = state.consecutive_failure_count;

    match mode {
        AlertMode::Immediate => AlertDecision::Immediate {
            consecutive_failures: count,
        },
        AlertMode::Threshold { .. } if state.alert_active => AlertDecision::Suppressed {
            consecutive_failures: count,
        },
        AlertMode::Threshold { threshold } if count >= threshold => {
            state.alert_active = true;
            state.alerted_at = Some(now);
            AlertDecision::Triggered {
                threshold,
                consecutive_failures: count,
            }
        }
        AlertMode::Threshold { .. } => AlertDecision::Counting {
            consecutive_failures: count,
        },
    }
}

/// Alert state tracker
///
/// Callers must serialize `process` per `(domain_id, check_type)`; the
/// `Monitor` does this with a lease.
pub struct AlertTracker {
    store: Arc<dyn AlertStateStore>,
    emitter: Arc<dyn EventEmitter>,
}

impl AlertTracker {
    pub fn new(store: Arc<dyn AlertStateStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self { store, emitter }
    }

    /// Fetch-or-create the row, apply the result, persist, then emit
    ///
    /// # Returns
    ///
    /// - `Ok(AlertDecision)`: The committed decision
    /// - `Err(Error)`: Store failure; nothing was emitted
    pub async fn process(&self, result: &CheckResult, policy: CheckPolicy) -> Result<AlertDecision> {
        let key = (result.domain_id, result.check_type);
        let mut state = match self.store.get_alert_state(key).await? {
            Some(state) => state,
            None => {
                debug!(
                    "First result for domain {} check {}, creating alert state",
                    result.domain_id, result.check_type
                );
                AlertState::new(result.domain_id, result.check_type)
            }
        };

        let decision = transition(&mut state, result.status, policy.alert, Utc::now());
        self.store.put_alert_state(&state).await?;

        match decision {
            AlertDecision::Triggered { consecutive_failures, .. } => info!(
                "Alert triggered for domain {} check {} after {} consecutive failures",
                result.domain_id, result.check_type, consecutive_failures
            ),
            AlertDecision::Recovered { .. } => info!(
                "Alert recovered for domain {} check {}",
                result.domain_id, result.check_type
            ),
            other => debug!(
                "Domain {} check {}: {:?}",
                result.domain_id, result.check_type, other
            ),
        }

        if decision.emits() {
            self.emit(result, decision);
        }

        Ok(decision)
    }

    /// Current row for a key, if any
    pub async fn state(&self, key: AlertKey) -> Result<Option<AlertState>> {
        self.store.get_alert_state(key).await
    }

    fn emit(&self, result: &CheckResult, decision: AlertDecision) {
        let (event_type, metadata, severity) = match decision {
            AlertDecision::Triggered {
                threshold,
                consecutive_failures,
            } => (
                EVENT_ALERT_TRIGGERED,
                Some(AlertMetadata {
                    alert_state: AlertTransition::Triggered,
                    threshold,
                    consecutive_failures,
                }),
                Severity::Error,
            ),
            AlertDecision::Recovered {
                threshold,
                consecutive_failures,
            } => (
                EVENT_ALERT_RECOVERED,
                Some(AlertMetadata {
                    alert_state: AlertTransition::Recovered,
                    threshold,
                    consecutive_failures,
                }),
                Severity::Info,
            ),
            AlertDecision::Immediate { .. } => {
                let severity = match result.status {
                    CheckStatus::Warn => Severity::Warning,
                    _ => Severity::Error,
                };
                (EVENT_CHECK_FAILED, None, severity)
            }
            _ => return,
        };

        let payload = AlertPayload {
            event_type: event_type.to_string(),
            domain_id: result.domain_id,
            check_type: result.check_type,
            status: result.status,
            metadata,
            error_message: result.error_message.clone(),
        };

        let options = EmitOptions::new(severity)
            .with_fingerprint(format!("health:{}:{}", result.domain_id, result.check_type))
            .with_context(serde_json::json!({
                "finished_at": result.finished_at,
                "status_code": result.status_code,
            }));

        self.emitter.send_async(event_type, payload, options);
    }
}
