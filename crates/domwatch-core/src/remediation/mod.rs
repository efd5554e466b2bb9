//! Operator-triggered DNS remediation
//!
//! Two services share the same registrar plumbing:
//!
//! - [`AutoFixEngine`]: one-click fixes for common misconfigurations
//!   (SPF, DMARC, CAA)
//! - [`RecordService`]: create/update/delete of individual records, mirrored
//!   locally after the registrar accepts the change
//!
//! Both fail closed and report structured outcomes instead of errors. The
//! registrar is always mutated before the local mirror, and every remote
//! call is single-shot and bounded by the request timeout.

mod autofix;
mod records;

pub use autofix::{AutoFixEngine, FixType};
pub use records::{RecordService, SUPPORTED_RECORD_TYPES};

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{DnsRecord, RegistrarCredential};
use crate::traits::{
    CredentialSource, RecordData, RegistrarClient, RegistrarClientFactory, RegistrarRecord,
    RegistrarResponse,
};

/// Result of an auto-fix request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixOutcome {
    pub ok: bool,
    pub message: String,
}

impl FixOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Result of a record save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub ok: bool,
    /// Input field the failure refers to, for form-style callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Mirror row after a successful save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DnsRecord>,
}

impl SaveOutcome {
    pub fn saved(record: DnsRecord) -> Self {
        Self {
            ok: true,
            error_field: None,
            message: None,
            record: Some(record),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_field: Some(field.to_string()),
            message: Some(message.into()),
            record: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_field: None,
            message: Some(message.into()),
            record: None,
        }
    }
}

/// Result of a record delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeleteOutcome {
    pub fn deleted() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// Fixed list of credentials, typically loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Vec<RegistrarCredential>,
}

impl StaticCredentials {
    pub fn new(credentials: Vec<RegistrarCredential>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn first_active(&self) -> Result<Option<RegistrarCredential>> {
        Ok(self.credentials.iter().find(|c| c.active).cloned())
    }
}

/// Resolves a registrar client for remediation calls
#[derive(Clone)]
pub(crate) struct RegistrarAccess {
    credentials: Arc<dyn CredentialSource>,
    factory: Arc<dyn RegistrarClientFactory>,
    timeout: Duration,
}

impl RegistrarAccess {
    pub(crate) fn new(
        credentials: Arc<dyn CredentialSource>,
        factory: Arc<dyn RegistrarClientFactory>,
        timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            factory,
            timeout,
        }
    }

    /// Client bound to the first active credential
    ///
    /// The error side is the operator-facing message.
    pub(crate) async fn connect(&self) -> std::result::Result<RegistrarSession, String> {
        let credential = match self.credentials.first_active().await {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err("No active registrar credential is configured.".to_string()),
            Err(e) => {
                warn!("Failed to load registrar credentials: {}", e);
                return Err(format!("Could not load registrar credentials: {}", e));
            }
        };

        let client = self.factory.create(&credential).map_err(|e| {
            warn!(
                "Failed to create {} client for credential {}: {}",
                credential.registrar, credential.id, e
            );
            format!("Could not connect to registrar: {}", e.upstream_message())
        })?;

        debug!(
            "Using {} credential {} for remediation",
            client.registrar_name(),
            credential.id
        );

        Ok(RegistrarSession {
            client,
            timeout: self.timeout,
        })
    }
}

/// Registrar client with every call bounded by the request timeout
///
/// Non-OK replies are turned into `Error::Registrar` carrying the
/// registrar's own message.
pub(crate) struct RegistrarSession {
    client: Box<dyn RegistrarClient>,
    timeout: Duration,
}

impl RegistrarSession {
    pub(crate) async fn records(&self, domain: &str) -> Result<Vec<RegistrarRecord>> {
        bounded(self.timeout, self.client.get_dns_records(domain))
            .await?
            .ok_or_else(|| {
                Error::registrar(format!("Registrar returned no DNS records for {}", domain))
            })
    }

    pub(crate) async fn add(&self, domain: &str, record: &RecordData) -> Result<RegistrarResponse> {
        accepted(bounded(self.timeout, self.client.add_dns_record(domain, record)).await?)
    }

    pub(crate) async fn update(
        &self,
        domain: &str,
        record_id: &str,
        record: &RecordData,
    ) -> Result<RegistrarResponse> {
        accepted(
            bounded(
                self.timeout,
                self.client.update_dns_record(domain, record_id, record),
            )
            .await?,
        )
    }

    pub(crate) async fn delete(&self, domain: &str, record_id: &str) -> Result<RegistrarResponse> {
        accepted(bounded(self.timeout, self.client.delete_dns_record(domain, record_id)).await?)
    }
}

fn accepted(response: RegistrarResponse) -> Result<RegistrarResponse> {
    if response.is_ok() {
        Ok(response)
    } else {
        Err(Error::registrar(response.failure_message()))
    }
}

/// Run a remote call under a timeout; expiry becomes `Error::Timeout`
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(timeout)),
    }
}
