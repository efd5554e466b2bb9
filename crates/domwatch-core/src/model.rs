//! Domain model shared by the trackers and the remediation services

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a monitored domain
pub type DomainId = u64;

/// Category of health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Http,
    Ssl,
    Dns,
    Uptime,
    Downtime,
    Platform,
    Hosting,
    EmailSecurity,
    Reputation,
}

impl CheckType {
    /// Every known check type
    pub const ALL: [CheckType; 9] = [
        CheckType::Http,
        CheckType::Ssl,
        CheckType::Dns,
        CheckType::Uptime,
        CheckType::Downtime,
        CheckType::Platform,
        CheckType::Hosting,
        CheckType::EmailSecurity,
        CheckType::Reputation,
    ];

    /// Wire name of the check type
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Http => "http",
            CheckType::Ssl => "ssl",
            CheckType::Dns => "dns",
            CheckType::Uptime => "uptime",
            CheckType::Downtime => "downtime",
            CheckType::Platform => "platform",
            CheckType::Hosting => "hosting",
            CheckType::EmailSecurity => "email_security",
            CheckType::Reputation => "reputation",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckType::ALL
            .into_iter()
            .find(|check| check.as_str() == s)
            .ok_or_else(|| crate::Error::invalid_input(format!("Unknown check type: {}", s)))
    }
}

/// Outcome of a single probe run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Anything other than `ok` counts as a failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, CheckStatus::Ok)
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inbound fact produced by an external probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub domain_id: DomainId,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CheckResult {
    /// Create a result with no optional probe fields
    pub fn new(
        domain_id: DomainId,
        check_type: CheckType,
        status: CheckStatus,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            domain_id,
            check_type,
            status,
            finished_at,
            started_at: None,
            status_code: None,
            error_message: None,
        }
    }

    /// Set the probe start time
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Set the HTTP status code reported by the probe
    pub fn with_status_code(mut self, status_code: i32) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the probe error message
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Key of an alert state row
pub type AlertKey = (DomainId, CheckType);

/// Per `(domain, check type)` alerting state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub domain_id: DomainId,
    pub check_type: CheckType,
    pub consecutive_failure_count: u32,
    pub alert_active: bool,
    pub alerted_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
}

impl AlertState {
    /// Fresh state for a pair seen for the first time
    pub fn new(domain_id: DomainId, check_type: CheckType) -> Self {
        Self {
            domain_id,
            check_type,
            consecutive_failure_count: 0,
            alert_active: false,
            alerted_at: None,
            recovered_at: None,
        }
    }

    pub fn key(&self) -> AlertKey {
        (self.domain_id, self.check_type)
    }
}

/// A downtime window for a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeIncident {
    pub id: u64,
    pub domain_id: DomainId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
}

impl UptimeIncident {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of the window; open incidents are measured up to `now`
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now).signed_duration_since(self.started_at)
    }
}

/// Incident row before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncident {
    pub domain_id: DomainId,
    pub started_at: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
}

/// A monitored domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    /// Explicit remediation flag; the configured suffix policy also applies
    #[serde(default)]
    pub remediation_eligible: bool,
}

impl Domain {
    pub fn new(id: DomainId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            remediation_eligible: false,
        }
    }

    /// Mark the domain as eligible regardless of its name
    pub fn with_remediation_eligible(mut self, eligible: bool) -> Self {
        self.remediation_eligible = eligible;
        self
    }
}

/// Local mirror of a registrar DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: u64,
    pub domain_id: DomainId,
    pub host: String,
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    pub priority: Option<u16>,
    /// Registrar-assigned id; `None` means the row was never pushed
    pub record_id: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Mirror row before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDnsRecord {
    pub domain_id: DomainId,
    pub host: String,
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    pub priority: Option<u16>,
    pub record_id: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Credential for a registrar reseller account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarCredential {
    pub id: u64,
    pub registrar: String,
    pub reseller_id: String,
    pub api_key: String,
    pub active: bool,
}

// Keeps the API key out of logs
impl fmt::Debug for RegistrarCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarCredential")
            .field("id", &self.id)
            .field("registrar", &self.registrar)
            .field("reseller_id", &self.reseller_id)
            .field("api_key", &"<REDACTED>")
            .field("active", &self.active)
            .finish()
    }
}
