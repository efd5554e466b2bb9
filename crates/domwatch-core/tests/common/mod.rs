//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on what reached the
//! registrar, the resolver and the event collector, not just on outcomes.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use domwatch_core::error::{Error, Result};
use domwatch_core::model::{CheckResult, CheckStatus, CheckType, Domain, RegistrarCredential};
use domwatch_core::traits::{
    AlertPayload, DnsLookup, EmitOptions, EventEmitter, LookupRecord, RecordData,
    RegistrarClient, RegistrarClientFactory, RegistrarRecord, RegistrarResponse,
};
use domwatch_core::{
    AutoFixEngine, MemoryStateStore, Monitor, MonitorConfig, RecordService, RemediationConfig,
    StaticCredentials,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What `get_dns_records` answers
#[derive(Debug, Clone)]
pub enum ReadMode {
    Records,
    /// `Ok(None)`
    Missing,
    /// Transport error with this message
    Fail(String),
}

#[derive(Debug, Default)]
struct RegistrarState {
    records: Vec<RegistrarRecord>,
    added: Vec<RecordData>,
    updated: Vec<(String, RecordData)>,
    deleted: Vec<String>,
    next_id: u64,
}

/// In-memory registrar that records every call
///
/// Cloning shares state, so a test keeps one handle while the factory hands
/// out others.
#[derive(Clone)]
pub struct RecordingRegistrar {
    state: Arc<Mutex<RegistrarState>>,
    read_mode: Arc<Mutex<ReadMode>>,
    write_failure: Arc<Mutex<Option<RegistrarResponse>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    get_calls: Arc<AtomicUsize>,
    add_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

impl RecordingRegistrar {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistrarState {
                next_id: 1000,
                ..RegistrarState::default()
            })),
            read_mode: Arc::new(Mutex::new(ReadMode::Records)),
            write_failure: Arc::new(Mutex::new(None)),
            delay: Arc::new(Mutex::new(None)),
            get_calls: Arc::new(AtomicUsize::new(0)),
            add_calls: Arc::new(AtomicUsize::new(0)),
            update_calls: Arc::new(AtomicUsize::new(0)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Seed the registrar's record set
    pub fn with_records(self, records: Vec<RegistrarRecord>) -> Self {
        self.state.lock().unwrap().records = records;
        self
    }

    pub fn set_read_mode(&self, mode: ReadMode) {
        *self.read_mode.lock().unwrap() = mode;
    }

    /// Make every mutation return this non-OK reply
    pub fn fail_writes(&self, status: &str, message: &str) {
        *self.write_failure.lock().unwrap() = Some(RegistrarResponse::failed(status, message));
    }

    /// Delay every call, for timeout tests
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn get_call_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn add_call_count(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Any call at all
    pub fn total_call_count(&self) -> usize {
        self.get_call_count() + self.write_call_count()
    }

    pub fn write_call_count(&self) -> usize {
        self.add_call_count() + self.update_call_count() + self.delete_call_count()
    }

    pub fn added(&self) -> Vec<RecordData> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn updated(&self) -> Vec<(String, RecordData)> {
        self.state.lock().unwrap().updated.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn records(&self) -> Vec<RegistrarRecord> {
        self.state.lock().unwrap().records.clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn write_failure(&self) -> Option<RegistrarResponse> {
        self.write_failure.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrarClient for RecordingRegistrar {
    async fn get_dns_records(&self, _domain: &str) -> Result<Option<Vec<RegistrarRecord>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mode = self.read_mode.lock().unwrap().clone();
        match mode {
            ReadMode::Records => Ok(Some(self.records())),
            ReadMode::Missing => Ok(None),
            ReadMode::Fail(message) => Err(Error::registrar(message)),
        }
    }

    async fn add_dns_record(&self, _domain: &str, record: &RecordData) -> Result<RegistrarResponse> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(failure) = self.write_failure() {
            return Ok(failure);
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let record_id = format!("rec-{}", state.next_id);
        state.added.push(record.clone());
        state.records.push(RegistrarRecord {
            record_id: Some(record_id.clone()),
            host: record.host.clone(),
            record_type: record.record_type.clone(),
            value: record.value.clone(),
            ttl: record.ttl,
            priority: record.priority,
        });
        Ok(RegistrarResponse::created(record_id))
    }

    async fn update_dns_record(
        &self,
        _domain: &str,
        record_id: &str,
        record: &RecordData,
    ) -> Result<RegistrarResponse> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(failure) = self.write_failure() {
            return Ok(failure);
        }

        let mut state = self.state.lock().unwrap();
        state.updated.push((record_id.to_string(), record.clone()));
        if let Some(existing) = state
            .records
            .iter_mut()
            .find(|r| r.record_id.as_deref() == Some(record_id))
        {
            existing.host = record.host.clone();
            existing.record_type = record.record_type.clone();
            existing.value = record.value.clone();
            existing.ttl = record.ttl;
            existing.priority = record.priority;
        }
        Ok(RegistrarResponse::ok())
    }

    async fn delete_dns_record(&self, _domain: &str, record_id: &str) -> Result<RegistrarResponse> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(failure) = self.write_failure() {
            return Ok(failure);
        }

        let mut state = self.state.lock().unwrap();
        state.deleted.push(record_id.to_string());
        state
            .records
            .retain(|r| r.record_id.as_deref() != Some(record_id));
        Ok(RegistrarResponse::ok())
    }

    fn registrar_name(&self) -> &'static str {
        "recording"
    }
}

/// Factory handing out clones of one recording registrar
pub struct RecordingFactory {
    registrar: RecordingRegistrar,
    created: AtomicUsize,
}

impl RecordingFactory {
    pub fn new(registrar: RecordingRegistrar) -> Self {
        Self {
            registrar,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RegistrarClientFactory for RecordingFactory {
    fn create(&self, _credential: &RegistrarCredential) -> Result<Box<dyn RegistrarClient>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.registrar.clone()))
    }
}

/// Resolver with canned answers per (host, type)
#[derive(Default)]
pub struct ScriptedLookup {
    answers: Mutex<HashMap<(String, String), Vec<LookupRecord>>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(self, host: &str, record_type: &str, data: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .entry((host.to_string(), record_type.to_string()))
            .or_default()
            .push(LookupRecord {
                name: host.to_string(),
                record_type: record_type.to_string(),
                ttl: 300,
                data: data.to_string(),
            });
        self
    }

    pub fn failing(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsLookup for ScriptedLookup {
    async fn lookup(&self, host: &str, record_type: &str) -> Result<Vec<LookupRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::lookup(message));
        }

        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(&(host.to_string(), record_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// One emitted event as seen by the collector
#[derive(Debug, Clone)]
pub struct CollectedEvent {
    pub event_type: String,
    pub payload: AlertPayload,
    pub options: EmitOptions,
}

/// Emitter that keeps every event in memory
#[derive(Default)]
pub struct CollectingEmitter {
    events: Mutex<Vec<CollectedEvent>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CollectedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventEmitter for CollectingEmitter {
    fn send_async(&self, event_type: &str, payload: AlertPayload, options: EmitOptions) {
        self.events.lock().unwrap().push(CollectedEvent {
            event_type: event_type.to_string(),
            payload,
            options,
        });
    }
}

/// Monitor over a fresh in-memory store with default policies
pub fn monitor() -> (Monitor, Arc<MemoryStateStore>, Arc<CollectingEmitter>) {
    let store = Arc::new(MemoryStateStore::new());
    let emitter = Arc::new(CollectingEmitter::new());
    let monitor = Monitor::new(
        store.clone(),
        store.clone(),
        emitter.clone(),
        MonitorConfig::default(),
    )
    .expect("default config is valid");
    (monitor, store, emitter)
}

/// Fixed clock for readable timestamps
pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
}

pub fn check(domain_id: u64, check_type: CheckType, status: CheckStatus, minute: u32) -> CheckResult {
    CheckResult::new(domain_id, check_type, status, at(minute)).with_started_at(at(minute))
}

pub fn eligible_domain() -> Domain {
    Domain::new(7, "example.com.au")
}

pub fn ineligible_domain() -> Domain {
    Domain::new(8, "example.com")
}

pub fn active_credentials() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::new(vec![RegistrarCredential {
        id: 1,
        registrar: "synergy".to_string(),
        reseller_id: "reseller-1".to_string(),
        api_key: "test-api-key".to_string(),
        active: true,
    }]))
}

pub fn registrar_record(id: &str, host: &str, record_type: &str, value: &str, ttl: u32) -> RegistrarRecord {
    RegistrarRecord {
        record_id: Some(id.to_string()),
        host: host.to_string(),
        record_type: record_type.to_string(),
        value: value.to_string(),
        ttl,
        priority: None,
    }
}

/// Auto-fix engine wired to the given doubles
pub fn autofix(registrar: &RecordingRegistrar, lookup: Arc<ScriptedLookup>) -> AutoFixEngine {
    autofix_with_config(registrar, lookup, RemediationConfig::default())
}

pub fn autofix_with_config(
    registrar: &RecordingRegistrar,
    lookup: Arc<ScriptedLookup>,
    config: RemediationConfig,
) -> AutoFixEngine {
    AutoFixEngine::new(
        active_credentials(),
        Arc::new(RecordingFactory::new(registrar.clone())),
        lookup,
        config,
    )
}

/// Record service over a fresh in-memory mirror
pub fn record_service(registrar: &RecordingRegistrar) -> (RecordService, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let service = RecordService::new(
        active_credentials(),
        Arc::new(RecordingFactory::new(registrar.clone())),
        store.clone(),
        RemediationConfig::default(),
    );
    (service, store)
}
