//! Configuration types for the domwatch system
//!
//! This module defines all configuration structures used throughout the crate.

use crate::model::{CheckType, Domain};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Consecutive failures before a threshold-class check raises an alert
pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomwatchConfig {
    /// Ingestion pipeline settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// DNS auto-fix and record reconciliation settings
    #[serde(default)]
    pub remediation: RemediationConfig,
}

impl DomwatchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.monitor.validate()?;
        self.remediation.validate()?;
        Ok(())
    }
}

/// How a check type turns failures into events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlertMode {
    /// Every non-ok result emits an event
    Immediate,
    /// Emit once when the failure run reaches `threshold`, then once on recovery
    Threshold { threshold: u32 },
}

/// Per check-type policy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPolicy {
    pub alert: AlertMode,

    /// Whether results of this type open and close uptime incidents
    #[serde(default)]
    pub tracks_incidents: bool,
}

impl CheckPolicy {
    pub fn immediate() -> Self {
        Self {
            alert: AlertMode::Immediate,
            tracks_incidents: false,
        }
    }

    pub fn threshold(threshold: u32) -> Self {
        Self {
            alert: AlertMode::Threshold { threshold },
            tracks_incidents: false,
        }
    }

    pub fn with_incidents(mut self) -> Self {
        self.tracks_incidents = true;
        self
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Policy table keyed by check type
    ///
    /// Types missing from the table fall back to immediate alerting
    /// without incident tracking.
    #[serde(default = "default_check_policies")]
    pub check_policies: HashMap<CheckType, CheckPolicy>,

    /// Lifetime of a per-key lease before another worker may take it over
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// How long `handle` waits for a busy key before giving up
    #[serde(default = "default_lease_wait_ms")]
    pub lease_wait_ms: u64,

    /// Capacity of the channel feeding the event collector
    ///
    /// When full, events are dropped with a warning. State mutations are
    /// never affected.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl MonitorConfig {
    /// Policy for a check type
    pub fn policy(&self, check_type: CheckType) -> CheckPolicy {
        self.check_policies
            .get(&check_type)
            .copied()
            .unwrap_or_else(CheckPolicy::immediate)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn lease_wait(&self) -> Duration {
        Duration::from_millis(self.lease_wait_ms)
    }

    /// Validate the monitor configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (check_type, policy) in &self.check_policies {
            if let AlertMode::Threshold { threshold: 0 } = policy.alert {
                return Err(crate::Error::config(format!(
                    "Alert threshold for {} must be > 0",
                    check_type
                )));
            }
        }
        if self.lease_ttl_secs == 0 {
            return Err(crate::Error::config("Lease TTL must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_policies: default_check_policies(),
            lease_ttl_secs: default_lease_ttl_secs(),
            lease_wait_ms: default_lease_wait_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_check_policies() -> HashMap<CheckType, CheckPolicy> {
    CheckType::ALL
        .into_iter()
        .map(|check_type| {
            let policy = match check_type {
                CheckType::Http | CheckType::Ssl => {
                    CheckPolicy::threshold(DEFAULT_ALERT_THRESHOLD)
                }
                CheckType::Uptime | CheckType::Downtime => CheckPolicy::immediate().with_incidents(),
                _ => CheckPolicy::immediate(),
            };
            (check_type, policy)
        })
        .collect()
}

fn default_lease_ttl_secs() -> u64 {
    300
}

fn default_lease_wait_ms() -> u64 {
    5_000
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// DNS remediation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Domain name suffixes for which remediation is permitted
    #[serde(default = "default_eligible_suffixes")]
    pub eligible_suffixes: Vec<String>,

    /// Message returned for domains outside the eligible category
    #[serde(default = "default_ineligible_message")]
    pub ineligible_message: String,

    /// Bound on every registrar and DNS lookup call (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TTL for records created by auto-fix
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    #[serde(default = "default_spf_value")]
    pub spf_value: String,

    #[serde(default = "default_dmarc_value")]
    pub dmarc_value: String,

    #[serde(default = "default_caa_value")]
    pub caa_value: String,
}

impl RemediationConfig {
    /// Whether automated DNS changes are permitted for `domain`
    pub fn is_eligible(&self, domain: &Domain) -> bool {
        if domain.remediation_eligible {
            return true;
        }
        let name = domain.name.trim_end_matches('.').to_ascii_lowercase();
        self.eligible_suffixes
            .iter()
            .any(|suffix| name.ends_with(&suffix.to_ascii_lowercase()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the remediation configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if self.default_ttl == 0 {
            return Err(crate::Error::config("Default TTL must be > 0"));
        }
        if !self.spf_value.starts_with("v=spf1") {
            return Err(crate::Error::config("SPF value must start with v=spf1"));
        }
        if !self.dmarc_value.starts_with("v=DMARC1") {
            return Err(crate::Error::config("DMARC value must start with v=DMARC1"));
        }
        Ok(())
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            eligible_suffixes: default_eligible_suffixes(),
            ineligible_message: default_ineligible_message(),
            request_timeout_secs: default_request_timeout_secs(),
            default_ttl: default_ttl(),
            spf_value: default_spf_value(),
            dmarc_value: default_dmarc_value(),
            caa_value: default_caa_value(),
        }
    }
}

fn default_eligible_suffixes() -> Vec<String> {
    vec![".au".to_string()]
}

fn default_ineligible_message() -> String {
    "DNS auto-fix is only available for Australian (.au) domains.".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_ttl() -> u32 {
    3600
}

fn default_spf_value() -> String {
    "v=spf1 a mx ~all".to_string()
}

fn default_dmarc_value() -> String {
    "v=DMARC1; p=none;".to_string()
}

fn default_caa_value() -> String {
    "0 issue \"letsencrypt.org\"".to_string()
}
