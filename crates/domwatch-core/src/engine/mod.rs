//! Ingestion pipeline
//!
//! The Monitor is responsible for:
//! - Serializing work per key with leases
//! - Feeding every result to the alert tracker
//! - Feeding uptime-class results to the incident tracker
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ CheckResult │──────────────┐
//! └─────────────┘              │
//!                              ▼
//!                     ┌──────────────┐
//!                     │   Monitor    │── lease(domain, check) [+ lease(domain)]
//!                     └──────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!      ┌──────────────┐               ┌─────────────────┐
//!      │ AlertTracker │               │ IncidentTracker │
//!      │  (always)    │               │ (uptime class)  │
//!      └──────────────┘               └─────────────────┘
//!              │
//!              ▼
//!      ┌──────────────┐
//!      │ EventEmitter │ (state edges only)
//!      └──────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::alerting::{AlertDecision, AlertTracker};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::incidents::{IncidentChange, IncidentTracker};
use crate::lease::{KeyedLeases, LeaseKey};
use crate::model::CheckResult;
use crate::traits::{AlertStateStore, EventEmitter, IncidentStore};

/// Effects of one ingested result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleOutcome {
    pub alert: AlertDecision,
    /// `None` when the check type does not track incidents
    pub incident: Option<IncidentChange>,
}

/// Health-check ingestion pipeline
///
/// ## Lifecycle
///
/// 1. Create with [`Monitor::new()`]
/// 2. Either call [`Monitor::handle()`] per result from an external task
///    runner, or drive a channel with [`Monitor::run()`]
/// 3. Stores are flushed when `run()` returns
///
/// ## Threading
///
/// `handle` may be called concurrently. Results for the same key are
/// serialized by leases and applied in lease acquisition order.
pub struct Monitor {
    alerts: AlertTracker,
    incidents: IncidentTracker,
    alert_store: Arc<dyn AlertStateStore>,
    leases: KeyedLeases,
    config: MonitorConfig,
}

impl Monitor {
    /// Create a new monitor
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the configuration is invalid
    pub fn new(
        alert_store: Arc<dyn AlertStateStore>,
        incident_store: Arc<dyn IncidentStore>,
        emitter: Arc<dyn EventEmitter>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            alerts: AlertTracker::new(Arc::clone(&alert_store), emitter),
            incidents: IncidentTracker::new(incident_store),
            alert_store,
            leases: KeyedLeases::new(),
            config,
        })
    }

    /// Ingest one check result
    ///
    /// # Returns
    ///
    /// - `Ok(HandleOutcome)`: All state changes committed
    /// - `Err(Error)`: Lease or store failure; the caller's retry wrapper
    ///   decides what to do
    pub async fn handle(&self, result: &CheckResult) -> Result<HandleOutcome> {
        let policy = self.config.policy(result.check_type);
        let ttl = self.config.lease_ttl();
        let wait = self.config.lease_wait();

        // Always alert key first, then domain key
        let _alert_lease = self
            .leases
            .acquire(LeaseKey::Alert(result.domain_id, result.check_type), ttl, wait)
            .await?;
        let _domain_lease = if policy.tracks_incidents {
            Some(
                self.leases
                    .acquire(LeaseKey::Domain(result.domain_id), ttl, wait)
                    .await?,
            )
        } else {
            None
        };

        let alert = self.alerts.process(result, policy).await?;
        let incident = if policy.tracks_incidents {
            Some(self.incidents.process(result).await?)
        } else {
            None
        };

        Ok(HandleOutcome { alert, incident })
    }

    /// Incident tracker, for reporting queries
    pub fn incidents(&self) -> &IncidentTracker {
        &self.incidents
    }

    /// Alert tracker, for reporting queries
    pub fn alerts(&self) -> &AlertTracker {
        &self.alerts
    }

    /// Consume results from a channel until it closes or Ctrl-C
    pub async fn run(&self, results: mpsc::Receiver<CheckResult>) -> Result<()> {
        self.run_internal(results, None).await
    }

    /// Consume results until the channel closes or `shutdown_rx` fires
    pub async fn run_with_shutdown(
        &self,
        results: mpsc::Receiver<CheckResult>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(results, Some(shutdown_rx)).await
    }

    async fn run_internal(
        &self,
        mut results: mpsc::Receiver<CheckResult>,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!("Monitor started");

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    received = results.recv() => match received {
                        Some(result) => self.handle_logged(&result).await,
                        None => break,
                    },
                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    received = results.recv() => match received {
                        Some(result) => self.handle_logged(&result).await,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.alert_store.flush().await?;
        info!("State flushed, monitor stopped");
        Ok(())
    }

    async fn handle_logged(&self, result: &CheckResult) {
        match self.handle(result).await {
            Ok(outcome) => debug!(
                "Handled {} result for domain {}: {:?}",
                result.check_type, result.domain_id, outcome
            ),
            // Keep consuming; redelivery is the producer's concern
            Err(e) => error!(
                "Failed to handle {} result for domain {}: {}",
                result.check_type, result.domain_id, e
            ),
        }
    }
}
