//! Core traits for the domwatch system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AlertStateStore`], [`IncidentStore`], [`DnsRecordStore`]: persistence
//! - [`RegistrarClient`]: registrar DNS API
//! - [`DnsLookup`]: authoritative DNS answers
//! - [`EventEmitter`]: fire-and-forget signal delivery

pub mod dns_lookup;
pub mod event_emitter;
pub mod registrar;
pub mod state_store;

pub use dns_lookup::{DnsLookup, LookupRecord};
pub use event_emitter::{
    AlertMetadata, AlertPayload, AlertTransition, EmitOptions, EventEmitter, Severity,
};
pub use registrar::{
    CredentialSource, RecordData, RegistrarClient, RegistrarClientFactory, RegistrarRecord,
    RegistrarResponse,
};
pub use state_store::{AlertStateStore, DnsRecordStore, IncidentStore};
