// # Registrar Client Trait
//
// Defines the interface to a domain registrar's DNS management API.
//
// The registrar is the source of truth for DNS records. The core only
// depends on this contract; the wire protocol lives in the client
// implementation.
//
// ## Usage
//
// ```rust,ignore
// use domwatch_core::traits::{RegistrarClient, RecordData};
//
// let records = client.get_dns_records("example.com.au").await?;
// let response = client
//     .add_dns_record("example.com.au", &RecordData::new("@", "TXT", "v=spf1 a mx ~all", 3600))
//     .await?;
// if !response.is_ok() {
//     // the registrar refused the change
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::RegistrarCredential;

/// Status string the registrar uses for success
pub const REGISTRAR_STATUS_OK: &str = "OK";

/// A DNS record as reported by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarRecord {
    /// Registrar-assigned id
    pub record_id: Option<String>,
    pub host: String,
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    pub priority: Option<u16>,
}

impl RegistrarRecord {
    /// Case-insensitive type match
    pub fn is_type(&self, record_type: &str) -> bool {
        self.record_type.eq_ignore_ascii_case(record_type)
    }
}

/// Fields of a record to create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordData {
    pub host: String,
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    #[serde(default)]
    pub priority: Option<u16>,
}

impl RecordData {
    pub fn new(
        host: impl Into<String>,
        record_type: impl Into<String>,
        value: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            host: host.into(),
            record_type: record_type.into(),
            value: value.into(),
            ttl,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Registrar reply to a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarResponse {
    pub status: String,
    /// Set by create calls
    #[serde(default)]
    pub record_id: Option<String>,
    /// Registrar's explanation when `status` is not OK
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RegistrarResponse {
    pub fn ok() -> Self {
        Self {
            status: REGISTRAR_STATUS_OK.to_string(),
            record_id: None,
            error_message: None,
        }
    }

    pub fn created(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            ..Self::ok()
        }
    }

    pub fn failed(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            record_id: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == REGISTRAR_STATUS_OK
    }

    /// Operator-facing explanation of a non-OK reply
    pub fn failure_message(&self) -> String {
        match &self.error_message {
            Some(message) if !message.is_empty() => message.clone(),
            _ => format!("Registrar returned status {}", self.status),
        }
    }
}

/// Trait for registrar DNS API clients
///
/// # Trust Level: Untrusted
///
/// Clients are isolated, stateless and single-shot:
/// - One API call per method invocation
/// - No retry or backoff (retry belongs to the calling task)
/// - No access to local stores
///
/// A transport failure is an `Err`. A reply with `status != "OK"` is
/// returned as `Ok(response)` and interpreted by the caller.
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// Fetch all records for a domain
    ///
    /// # Returns
    ///
    /// - `Ok(Some(records))`: Current record set (possibly empty)
    /// - `Ok(None)`: The registrar returned no record list
    /// - `Err(Error)`: Transport failure
    async fn get_dns_records(
        &self,
        domain: &str,
    ) -> Result<Option<Vec<RegistrarRecord>>, crate::Error>;

    /// Create a record; on success the response carries the new record id
    async fn add_dns_record(
        &self,
        domain: &str,
        record: &RecordData,
    ) -> Result<RegistrarResponse, crate::Error>;

    /// Replace the record identified by `record_id`
    async fn update_dns_record(
        &self,
        domain: &str,
        record_id: &str,
        record: &RecordData,
    ) -> Result<RegistrarResponse, crate::Error>;

    /// Delete the record identified by `record_id`
    async fn delete_dns_record(
        &self,
        domain: &str,
        record_id: &str,
    ) -> Result<RegistrarResponse, crate::Error>;

    /// Registrar name (for logging/debugging)
    fn registrar_name(&self) -> &'static str;
}

/// Builds a client bound to one credential
pub trait RegistrarClientFactory: Send + Sync {
    /// Create a RegistrarClient for a credential
    ///
    /// The factory must not log `credential.api_key`.
    fn create(
        &self,
        credential: &RegistrarCredential,
    ) -> Result<Box<dyn RegistrarClient>, crate::Error>;
}

/// Answers which registrar credential remediation should use
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// The first credential marked active, if any
    async fn first_active(&self) -> Result<Option<RegistrarCredential>, crate::Error>;
}
