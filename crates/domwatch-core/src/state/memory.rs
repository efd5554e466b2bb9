// # Memory State Store
//
// In-memory implementation of the store traits.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First failure after a restart starts a fresh consecutive-failure run
// - Open incidents are forgotten, so a still-failing domain opens a new one
//
// ## When to Use
//
// - Testing environments
// - Embedding where the host application persists state itself

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::tables::StateTables;
use crate::Error;
use crate::model::{
    AlertKey, AlertState, DnsRecord, DomainId, NewDnsRecord, NewIncident, UptimeIncident,
};
use crate::traits::{AlertStateStore, DnsRecordStore, IncidentStore};

/// In-memory state store implementation
///
/// All tables live behind one RwLock. Cloning shares the same tables.
///
/// # Example
///
/// ```rust,no_run
/// use domwatch_core::state::MemoryStateStore;
/// use domwatch_core::traits::AlertStateStore;
/// use domwatch_core::model::{AlertState, CheckType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     store.put_alert_state(&AlertState::new(1, CheckType::Http)).await?;
///     assert!(store.get_alert_state((1, CheckType::Http)).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<StateTables>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alert rows in the store
    pub async fn alert_count(&self) -> usize {
        self.inner.read().await.alert_count()
    }
}

#[async_trait]
impl AlertStateStore for MemoryStateStore {
    async fn get_alert_state(&self, key: AlertKey) -> Result<Option<AlertState>, Error> {
        Ok(self.inner.read().await.get_alert(key))
    }

    async fn put_alert_state(&self, state: &AlertState) -> Result<(), Error> {
        self.inner.write().await.put_alert(state);
        Ok(())
    }

    async fn list_alert_states(&self, domain_id: DomainId) -> Result<Vec<AlertState>, Error> {
        Ok(self.inner.read().await.list_alerts(domain_id))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MemoryStateStore {
    async fn find_open_incident(
        &self,
        domain_id: DomainId,
    ) -> Result<Option<UptimeIncident>, Error> {
        Ok(self.inner.read().await.find_open_incident(domain_id))
    }

    async fn insert_incident(&self, incident: NewIncident) -> Result<UptimeIncident, Error> {
        Ok(self.inner.write().await.insert_incident(incident))
    }

    async fn close_incident(
        &self,
        incident_id: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<UptimeIncident, Error> {
        self.inner.write().await.close_incident(incident_id, ended_at)
    }

    async fn list_incidents(&self, domain_id: DomainId) -> Result<Vec<UptimeIncident>, Error> {
        Ok(self.inner.read().await.list_incidents(domain_id))
    }
}

#[async_trait]
impl DnsRecordStore for MemoryStateStore {
    async fn get_dns_record(&self, id: u64) -> Result<Option<DnsRecord>, Error> {
        Ok(self.inner.read().await.get_record(id))
    }

    async fn insert_dns_record(&self, record: NewDnsRecord) -> Result<DnsRecord, Error> {
        Ok(self.inner.write().await.insert_record(record))
    }

    async fn update_dns_record(&self, record: &DnsRecord) -> Result<(), Error> {
        self.inner.write().await.update_record(record)
    }

    async fn delete_dns_record(&self, id: u64) -> Result<(), Error> {
        self.inner.write().await.delete_record(id);
        Ok(())
    }

    async fn list_dns_records(&self, domain_id: DomainId) -> Result<Vec<DnsRecord>, Error> {
        Ok(self.inner.read().await.list_records(domain_id))
    }
}
