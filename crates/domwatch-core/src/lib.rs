// # domwatch-core
//
// Core library for domain health alerting and DNS remediation.
//
// ## Architecture Overview
//
// Ingestion (driven by probe results):
// - **Monitor**: Serializes results per key and feeds the trackers
// - **AlertTracker**: Threshold/immediate alert state machine per (domain, check)
// - **IncidentTracker**: Contiguous uptime downtime windows per domain
// - **EventEmitter**: Fire-and-forget delivery of alert edges
//
// Remediation (driven by operators):
// - **AutoFixEngine**: One-click SPF/DMARC/CAA fixes at the registrar
// - **RecordService**: Record create/update/delete with a local mirror
// - **RegistrarClient** / **DnsLookup**: Injected remote capabilities
//
// Shared:
// - **State stores**: Alert rows, incidents, DNS record mirror
// - **KeyedLeases**: Per-key mutual exclusion with bounded lifetime
//
// ## Design Principles
//
// 1. **State before signal**: Rows are committed before events are emitted
// 2. **Registrar first**: The local mirror only follows accepted changes
// 3. **Fail closed**: Remediation reports a no-op when in doubt
// 4. **Library-First**: The daemon is a thin shell over this crate

pub mod alerting;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod incidents;
pub mod lease;
pub mod model;
pub mod remediation;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use alerting::{AlertDecision, AlertTracker};
pub use config::{AlertMode, CheckPolicy, DomwatchConfig, MonitorConfig, RemediationConfig};
pub use emitter::{ChannelEmitter, EmittedEvent};
pub use engine::{HandleOutcome, Monitor};
pub use error::{Error, Result};
pub use incidents::{IncidentChange, IncidentTracker};
pub use lease::{KeyedLeases, LeaseKey};
pub use model::{CheckResult, CheckStatus, CheckType, Domain, DomainId};
pub use remediation::{
    AutoFixEngine, DeleteOutcome, FixOutcome, RecordService, SaveOutcome, StaticCredentials,
};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{DnsLookup, EventEmitter, RegistrarClient};
