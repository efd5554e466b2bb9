// # State Tables
//
// Plain in-memory tables shared by every store implementation. Stores wrap
// a `StateTables` in a lock and add their own durability on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Error;
use crate::model::{
    AlertKey, AlertState, DnsRecord, DomainId, NewDnsRecord, NewIncident, UptimeIncident,
};

/// Snapshot of all persisted rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StateTables {
    /// Keyed by `"{domain_id}:{check_type}"` so the map survives JSON
    #[serde(default)]
    alerts: BTreeMap<String, AlertState>,
    #[serde(default)]
    incidents: BTreeMap<u64, UptimeIncident>,
    #[serde(default)]
    dns_records: BTreeMap<u64, DnsRecord>,
    #[serde(default)]
    next_incident_id: u64,
    #[serde(default)]
    next_record_id: u64,
}

fn alert_key(key: AlertKey) -> String {
    format!("{}:{}", key.0, key.1)
}

impl StateTables {
    pub(crate) fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub(crate) fn get_alert(&self, key: AlertKey) -> Option<AlertState> {
        self.alerts.get(&alert_key(key)).cloned()
    }

    pub(crate) fn put_alert(&mut self, state: &AlertState) {
        self.alerts.insert(alert_key(state.key()), state.clone());
    }

    pub(crate) fn list_alerts(&self, domain_id: DomainId) -> Vec<AlertState> {
        let mut states: Vec<AlertState> = self
            .alerts
            .values()
            .filter(|state| state.domain_id == domain_id)
            .cloned()
            .collect();
        states.sort_by_key(|state| state.check_type);
        states
    }

    pub(crate) fn find_open_incident(&self, domain_id: DomainId) -> Option<UptimeIncident> {
        self.incidents
            .values()
            .find(|incident| incident.domain_id == domain_id && incident.is_open())
            .cloned()
    }

    pub(crate) fn insert_incident(&mut self, incident: NewIncident) -> UptimeIncident {
        self.next_incident_id += 1;
        let row = UptimeIncident {
            id: self.next_incident_id,
            domain_id: incident.domain_id,
            started_at: incident.started_at,
            ended_at: None,
            status_code: incident.status_code,
            error_message: incident.error_message,
        };
        self.incidents.insert(row.id, row.clone());
        row
    }

    pub(crate) fn close_incident(
        &mut self,
        incident_id: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<UptimeIncident, Error> {
        let incident = self
            .incidents
            .get_mut(&incident_id)
            .ok_or_else(|| Error::not_found(format!("Incident {}", incident_id)))?;
        incident.ended_at = Some(ended_at);
        Ok(incident.clone())
    }

    pub(crate) fn list_incidents(&self, domain_id: DomainId) -> Vec<UptimeIncident> {
        self.incidents
            .values()
            .filter(|incident| incident.domain_id == domain_id)
            .cloned()
            .collect()
    }

    pub(crate) fn get_record(&self, id: u64) -> Option<DnsRecord> {
        self.dns_records.get(&id).cloned()
    }

    pub(crate) fn insert_record(&mut self, record: NewDnsRecord) -> DnsRecord {
        self.next_record_id += 1;
        let row = DnsRecord {
            id: self.next_record_id,
            domain_id: record.domain_id,
            host: record.host,
            record_type: record.record_type,
            value: record.value,
            ttl: record.ttl,
            priority: record.priority,
            record_id: record.record_id,
            synced_at: record.synced_at,
        };
        self.dns_records.insert(row.id, row.clone());
        row
    }

    pub(crate) fn update_record(&mut self, record: &DnsRecord) -> Result<(), Error> {
        let row = self
            .dns_records
            .get_mut(&record.id)
            .ok_or_else(|| Error::not_found(format!("DNS record {}", record.id)))?;
        *row = record.clone();
        Ok(())
    }

    pub(crate) fn delete_record(&mut self, id: u64) {
        self.dns_records.remove(&id);
    }

    pub(crate) fn list_records(&self, domain_id: DomainId) -> Vec<DnsRecord> {
        self.dns_records
            .values()
            .filter(|record| record.domain_id == domain_id)
            .cloned()
            .collect()
    }
}
