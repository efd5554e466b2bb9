//! Registrar-backed record editing with a local mirror
//!
//! The registrar is mutated first; the mirror row follows only after the
//! registrar accepted the change. A failed registrar call leaves the mirror
//! untouched.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{DeleteOutcome, RegistrarAccess, SaveOutcome};
use crate::config::RemediationConfig;
use crate::model::{DnsRecord, Domain, NewDnsRecord};
use crate::traits::{CredentialSource, DnsRecordStore, RecordData, RegistrarClientFactory};

/// Record types accepted by `save_record`
pub const SUPPORTED_RECORD_TYPES: &[&str] =
    &["A", "AAAA", "CAA", "CNAME", "MX", "NS", "SRV", "TXT"];

/// DNS record reconciliation service
pub struct RecordService {
    registrar: RegistrarAccess,
    store: Arc<dyn DnsRecordStore>,
    config: RemediationConfig,
}

impl RecordService {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        factory: Arc<dyn RegistrarClientFactory>,
        store: Arc<dyn DnsRecordStore>,
        config: RemediationConfig,
    ) -> Self {
        let registrar = RegistrarAccess::new(credentials, factory, config.request_timeout());
        Self {
            registrar,
            store,
            config,
        }
    }

    /// Create a record, or update the one mirrored as `existing_record_id`
    ///
    /// `existing_record_id` is the local mirror id; the registrar's own id
    /// is read from that row.
    pub async fn save_record(
        &self,
        domain: &Domain,
        data: RecordData,
        existing_record_id: Option<u64>,
    ) -> SaveOutcome {
        if !self.config.is_eligible(domain) {
            return SaveOutcome::invalid("domain", self.config.ineligible_message.clone());
        }

        let data = match normalize(data) {
            Ok(data) => data,
            Err((field, message)) => return SaveOutcome::invalid(field, message),
        };

        match existing_record_id {
            Some(local_id) => self.update(domain, local_id, data).await,
            None => self.create(domain, data).await,
        }
    }

    async fn update(&self, domain: &Domain, local_id: u64, data: RecordData) -> SaveOutcome {
        let existing = match self.store.get_dns_record(local_id).await {
            Ok(Some(row)) if row.domain_id == domain.id => row,
            Ok(_) => return SaveOutcome::invalid("record", "DNS record not found."),
            Err(e) => {
                error!("Failed to load DNS record {}: {}", local_id, e);
                return SaveOutcome::failed(format!("Could not load DNS record: {}", e));
            }
        };

        let Some(record_id) = existing.record_id.clone() else {
            return SaveOutcome::invalid(
                "record",
                "This record was never synced to the registrar and cannot be updated.",
            );
        };

        let session = match self.registrar.connect().await {
            Ok(session) => session,
            Err(message) => return SaveOutcome::failed(message),
        };

        if let Err(e) = session.update(&domain.name, &record_id, &data).await {
            warn!(
                "Registrar rejected update of record {} on {}: {}",
                record_id, domain.name, e
            );
            return SaveOutcome::failed(e.upstream_message());
        }

        let row = DnsRecord {
            host: data.host,
            record_type: data.record_type,
            value: data.value,
            ttl: data.ttl,
            priority: data.priority,
            synced_at: Some(Utc::now()),
            ..existing
        };
        match self.store.update_dns_record(&row).await {
            Ok(()) => {
                info!(
                    "Updated {} record {} on {}",
                    row.record_type, record_id, domain.name
                );
                SaveOutcome::saved(row)
            }
            Err(e) => {
                error!(
                    "Registrar updated record {} on {} but the mirror write failed: {}",
                    record_id, domain.name, e
                );
                SaveOutcome::failed(format!(
                    "The registrar was updated but the local copy could not be saved: {}",
                    e
                ))
            }
        }
    }

    async fn create(&self, domain: &Domain, data: RecordData) -> SaveOutcome {
        let session = match self.registrar.connect().await {
            Ok(session) => session,
            Err(message) => return SaveOutcome::failed(message),
        };

        let response = match session.add(&domain.name, &data).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Registrar rejected new {} record on {}: {}",
                    data.record_type, domain.name, e
                );
                return SaveOutcome::failed(e.upstream_message());
            }
        };

        if response.record_id.is_none() {
            warn!(
                "Registrar created a {} record on {} without returning its id",
                data.record_type, domain.name
            );
        }

        let new_row = NewDnsRecord {
            domain_id: domain.id,
            host: data.host,
            record_type: data.record_type,
            value: data.value,
            ttl: data.ttl,
            priority: data.priority,
            record_id: response.record_id,
            synced_at: Some(Utc::now()),
        };
        match self.store.insert_dns_record(new_row).await {
            Ok(row) => {
                info!(
                    "Created {} record {} on {}",
                    row.record_type,
                    row.record_id.as_deref().unwrap_or("-"),
                    domain.name
                );
                SaveOutcome::saved(row)
            }
            Err(e) => {
                error!(
                    "Registrar created a record on {} but the mirror write failed: {}",
                    domain.name, e
                );
                SaveOutcome::failed(format!(
                    "The registrar was updated but the local copy could not be saved: {}",
                    e
                ))
            }
        }
    }

    /// Delete a mirrored record, from the registrar first when it was synced
    pub async fn delete_record(&self, domain: &Domain, local_id: u64) -> DeleteOutcome {
        let row = match self.store.get_dns_record(local_id).await {
            Ok(Some(row)) if row.domain_id == domain.id => row,
            Ok(_) => return DeleteOutcome::failed("DNS record not found."),
            Err(e) => {
                error!("Failed to load DNS record {}: {}", local_id, e);
                return DeleteOutcome::failed(format!("Could not load DNS record: {}", e));
            }
        };

        if let Some(record_id) = row.record_id.as_deref() {
            let session = match self.registrar.connect().await {
                Ok(session) => session,
                Err(message) => return DeleteOutcome::failed(message),
            };

            if let Err(e) = session.delete(&domain.name, record_id).await {
                warn!(
                    "Registrar rejected delete of record {} on {}: {}",
                    record_id, domain.name, e
                );
                return DeleteOutcome::failed(e.upstream_message());
            }
        }

        match self.store.delete_dns_record(local_id).await {
            Ok(()) => {
                info!(
                    "Deleted {} record {} on {}",
                    row.record_type, local_id, domain.name
                );
                DeleteOutcome::deleted()
            }
            Err(e) => {
                error!("Failed to delete mirror row {}: {}", local_id, e);
                DeleteOutcome::failed(format!("Could not delete the local record: {}", e))
            }
        }
    }
}

/// Trim, upper-case the type, and reject unusable input
fn normalize(data: RecordData) -> Result<RecordData, (&'static str, String)> {
    let host = data.host.trim().to_string();
    let record_type = data.record_type.trim().to_ascii_uppercase();
    let value = data.value.trim().to_string();

    if host.is_empty() {
        return Err(("host", "Host is required.".to_string()));
    }
    if !SUPPORTED_RECORD_TYPES.contains(&record_type.as_str()) {
        return Err((
            "type",
            format!("Unsupported record type: {}", data.record_type.trim()),
        ));
    }
    if value.is_empty() {
        return Err(("value", "Value is required.".to_string()));
    }
    if data.ttl == 0 {
        return Err(("ttl", "TTL must be greater than zero.".to_string()));
    }
    if matches!(record_type.as_str(), "MX" | "SRV") && data.priority.is_none() {
        return Err((
            "priority",
            format!("Priority is required for {} records.", record_type),
        ));
    }

    Ok(RecordData {
        host,
        record_type,
        value,
        ttl: data.ttl,
        priority: data.priority,
    })
}
