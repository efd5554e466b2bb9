// # Event Emitter Trait
//
// Outbound side of the alerting pipeline. The tracker decides *whether* a
// signal goes out; the emitter only delivers it.
//
// Emission is fire-and-forget: `send_async` returns nothing and must never
// block or fail the caller. Delivery retries, if any, belong to the emitter.

use serde::{Deserialize, Serialize};

use crate::model::{CheckStatus, CheckType, DomainId};

/// Event type for a threshold alert that just fired
pub const EVENT_ALERT_TRIGGERED: &str = "health_check.alert_triggered";

/// Event type for a threshold alert that just cleared
pub const EVENT_ALERT_RECOVERED: &str = "health_check.alert_recovered";

/// Event type for an immediate-class failure
pub const EVENT_CHECK_FAILED: &str = "health_check.failed";

/// Edge reported by a threshold alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTransition {
    Triggered,
    Recovered,
}

/// Threshold bookkeeping attached to threshold-class events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub alert_state: AlertTransition,
    pub threshold: u32,
    pub consecutive_failures: u32,
}

/// Outbound alert payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub event_type: String,
    pub domain_id: DomainId,
    pub check_type: CheckType,
    pub status: CheckStatus,
    /// Absent for immediate-class events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AlertMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Delivery hints for the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitOptions {
    pub severity: Severity,
    /// Groups events about the same condition
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl EmitOptions {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            fingerprint: None,
            context: serde_json::Value::Null,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Trait for event collector clients
///
/// Implementations must be non-blocking. Errors are logged and swallowed;
/// they never propagate to the tracker.
pub trait EventEmitter: Send + Sync {
    fn send_async(&self, event_type: &str, payload: AlertPayload, options: EmitOptions);
}
