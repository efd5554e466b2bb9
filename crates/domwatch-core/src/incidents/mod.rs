//! Uptime incident tracker
//!
//! Keeps a contiguous record of downtime windows per domain, independent of
//! alert suppression: a failing uptime result opens a window if none is
//! open, the next `ok` result closes it at that result's `finished_at`.
//!
//! Callers must serialize `process` per domain.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{CheckResult, DomainId, NewIncident, UptimeIncident};
use crate::traits::IncidentStore;

/// What a single result did to a domain's incidents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentChange {
    Opened(UptimeIncident),
    Closed(UptimeIncident),
    /// Failure while an incident is already open
    StillOpen { incident_id: u64 },
    /// `ok` with nothing open
    Unchanged,
}

/// Uptime incident tracker
pub struct IncidentTracker {
    store: Arc<dyn IncidentStore>,
}

impl IncidentTracker {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    /// Apply one uptime-class result
    pub async fn process(&self, result: &CheckResult) -> Result<IncidentChange> {
        let open = self.store.find_open_incident(result.domain_id).await?;

        if result.status.is_failure() {
            if let Some(incident) = open {
                debug!(
                    "Domain {} still down, incident {} remains open",
                    result.domain_id, incident.id
                );
                return Ok(IncidentChange::StillOpen {
                    incident_id: incident.id,
                });
            }

            let incident = self
                .store
                .insert_incident(NewIncident {
                    domain_id: result.domain_id,
                    started_at: result.started_at.unwrap_or_else(Utc::now),
                    status_code: result.status_code,
                    error_message: result.error_message.clone(),
                })
                .await?;
            info!(
                "Opened uptime incident {} for domain {}",
                incident.id, result.domain_id
            );
            return Ok(IncidentChange::Opened(incident));
        }

        match open {
            Some(incident) => {
                let closed = self
                    .store
                    .close_incident(incident.id, result.finished_at)
                    .await?;
                info!(
                    "Closed uptime incident {} for domain {} after {}s",
                    closed.id,
                    result.domain_id,
                    closed.duration(result.finished_at).num_seconds()
                );
                Ok(IncidentChange::Closed(closed))
            }
            None => Ok(IncidentChange::Unchanged),
        }
    }

    /// The open incident for a domain, if any
    pub async fn open_incident(&self, domain_id: DomainId) -> Result<Option<UptimeIncident>> {
        self.store.find_open_incident(domain_id).await
    }

    /// All incidents for a domain, oldest first
    pub async fn incidents(&self, domain_id: DomainId) -> Result<Vec<UptimeIncident>> {
        self.store.list_incidents(domain_id).await
    }

    /// Total downtime for a domain; open incidents count up to `now`
    pub async fn total_downtime(
        &self,
        domain_id: DomainId,
        now: DateTime<Utc>,
    ) -> Result<chrono::Duration> {
        let incidents = self.store.list_incidents(domain_id).await?;
        Ok(incidents
            .iter()
            .fold(chrono::Duration::zero(), |total, incident| {
                total + incident.duration(now)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckStatus, CheckType};
    use crate::state::MemoryStateStore;
    use chrono::{Duration, TimeZone};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
    }

    fn uptime(status: CheckStatus, minute: u32) -> CheckResult {
        CheckResult::new(5, CheckType::Uptime, status, at(minute)).with_started_at(at(minute))
    }

    #[tokio::test]
    async fn repeated_failures_keep_one_incident_open() {
        let tracker = IncidentTracker::new(Arc::new(MemoryStateStore::new()));

        let first = tracker
            .process(&uptime(CheckStatus::Fail, 0).with_status_code(503))
            .await
            .unwrap();
        let IncidentChange::Opened(incident) = first else {
            panic!("expected an opened incident, got {:?}", first);
        };
        assert_eq!(incident.status_code, Some(503));
        assert_eq!(incident.started_at, at(0));

        let second = tracker.process(&uptime(CheckStatus::Fail, 1)).await.unwrap();
        assert_eq!(second, IncidentChange::StillOpen { incident_id: incident.id });
        assert_eq!(tracker.incidents(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ok_closes_at_finish_time() {
        let tracker = IncidentTracker::new(Arc::new(MemoryStateStore::new()));
        tracker.process(&uptime(CheckStatus::Fail, 0)).await.unwrap();

        let change = tracker.process(&uptime(CheckStatus::Ok, 10)).await.unwrap();
        let IncidentChange::Closed(closed) = change else {
            panic!("expected a closed incident, got {:?}", change);
        };
        assert_eq!(closed.ended_at, Some(at(10)));
        assert_eq!(closed.duration(at(59)), Duration::minutes(10));
        assert!(tracker.open_incident(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ok_without_open_incident_is_noop() {
        let tracker = IncidentTracker::new(Arc::new(MemoryStateStore::new()));
        let change = tracker.process(&uptime(CheckStatus::Ok, 0)).await.unwrap();
        assert_eq!(change, IncidentChange::Unchanged);
        assert!(tracker.incidents(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_downtime_counts_open_incident_to_now() {
        let tracker = IncidentTracker::new(Arc::new(MemoryStateStore::new()));
        tracker.process(&uptime(CheckStatus::Fail, 0)).await.unwrap();
        tracker.process(&uptime(CheckStatus::Ok, 5)).await.unwrap();
        tracker.process(&uptime(CheckStatus::Warn, 20)).await.unwrap();

        let total = tracker.total_downtime(5, at(30)).await.unwrap();
        assert_eq!(total, Duration::minutes(15));
    }
}
