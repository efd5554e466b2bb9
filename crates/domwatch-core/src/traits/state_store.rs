// # State Store Traits
//
// Defines the persistence interfaces for the only mutable shared state the
// core owns:
//
// - Alert state rows, one per (domain, check type)
// - Uptime incident rows, append-only, at most one open per domain
// - The local mirror of registrar DNS records
//
// ## Implementations
//
// - `MemoryStateStore`: in-process maps, lost on restart
// - `FileStateStore`: JSON file with atomic writes and backup recovery
//
// ## Usage
//
// ```rust,ignore
// use domwatch_core::traits::AlertStateStore;
// use domwatch_core::model::{AlertState, CheckType};
//
// let state = store
//     .get_alert_state((42, CheckType::Http))
//     .await?
//     .unwrap_or_else(|| AlertState::new(42, CheckType::Http));
// store.put_alert_state(&state).await?;
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    AlertKey, AlertState, DnsRecord, DomainId, NewDnsRecord, NewIncident, UptimeIncident,
};

/// Storage for per-key alert state
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Callers serialize writes
/// per key through `KeyedLeases`; the store only guarantees that each call
/// is atomic on its own.
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores perform I/O for durability but never decide transitions. The
/// `AlertTracker` owns every mutation of an alert row.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Get the state row for a key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(AlertState))`: The stored row
    /// - `Ok(None)`: The pair has never been seen
    /// - `Err(Error)`: Storage error
    async fn get_alert_state(&self, key: AlertKey) -> Result<Option<AlertState>, crate::Error>;

    /// Create or replace the state row for `state.key()`
    async fn put_alert_state(&self, state: &AlertState) -> Result<(), crate::Error>;

    /// All alert rows for a domain, ordered by check type
    async fn list_alert_states(&self, domain_id: DomainId)
    -> Result<Vec<AlertState>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures
    /// all changes are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Storage for uptime incidents
///
/// Rows are never deleted. The only mutation after insert is setting
/// `ended_at` on an open row.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// The open incident (`ended_at IS NULL`) for a domain, if any
    async fn find_open_incident(
        &self,
        domain_id: DomainId,
    ) -> Result<Option<UptimeIncident>, crate::Error>;

    /// Insert a new open incident and return it with its assigned id
    async fn insert_incident(&self, incident: NewIncident)
    -> Result<UptimeIncident, crate::Error>;

    /// Set `ended_at` on an incident
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: No incident with that id
    async fn close_incident(
        &self,
        incident_id: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<UptimeIncident, crate::Error>;

    /// All incidents for a domain, oldest first
    async fn list_incidents(&self, domain_id: DomainId)
    -> Result<Vec<UptimeIncident>, crate::Error>;
}

/// Storage for the local DNS record mirror
///
/// The mirror is a cache of registrar state. Writes here must only follow a
/// successful registrar mutation.
#[async_trait]
pub trait DnsRecordStore: Send + Sync {
    async fn get_dns_record(&self, id: u64) -> Result<Option<DnsRecord>, crate::Error>;

    /// Insert a mirror row and return it with its assigned id
    async fn insert_dns_record(&self, record: NewDnsRecord) -> Result<DnsRecord, crate::Error>;

    /// Replace an existing mirror row
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: No row with `record.id`
    async fn update_dns_record(&self, record: &DnsRecord) -> Result<(), crate::Error>;

    /// Delete a mirror row (no error if it does not exist)
    async fn delete_dns_record(&self, id: u64) -> Result<(), crate::Error>;

    /// All mirror rows for a domain, ordered by id
    async fn list_dns_records(&self, domain_id: DomainId) -> Result<Vec<DnsRecord>, crate::Error>;
}
