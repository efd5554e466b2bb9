//! Contract Test: Auto-Fix Safety
//!
//! Constraints verified:
//! - Preconditions are checked before any registrar call
//! - The registrar's record set is read before any write
//! - SPF/DMARC are updated in place, preserving id and TTL
//! - CAA is never written when the registrar or DNS already has one
//! - Lookup failures, timeouts and read failures are safe no-ops
//!
//! If this test fails, auto-fix may overwrite a customer's DNS policy.

mod common;

use common::*;
use domwatch_core::model::Domain;
use domwatch_core::{RemediationConfig, StaticCredentials};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn dmarc_is_created_when_absent() {
    let registrar = RecordingRegistrar::new()
        .with_records(vec![registrar_record("r1", "@", "A", "203.0.113.10", 3600)]);
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "dmarc").await;

    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(outcome.message, "Created new DMARC record.");
    assert_eq!(registrar.get_call_count(), 1);

    let added = registrar.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].host, "_dmarc");
    assert_eq!(added[0].record_type, "TXT");
    assert_eq!(added[0].value, "v=DMARC1; p=none;");
}

#[tokio::test]
async fn spf_is_updated_in_place_preserving_id_and_ttl() {
    let registrar = RecordingRegistrar::new().with_records(vec![registrar_record(
        "spf-1",
        "@",
        "TXT",
        "v=spf1 include:_spf.example.net -all",
        7200,
    )]);
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "spf").await;

    assert!(outcome.ok, "{}", outcome.message);
    assert!(outcome.message.starts_with("Updated existing SPF record"));
    assert_eq!(registrar.add_call_count(), 0);

    let updated = registrar.updated();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].0, "spf-1");
    assert_eq!(updated[0].1.ttl, 7200);
    assert_eq!(updated[0].1.value, "v=spf1 a mx ~all");
}

#[tokio::test]
async fn spf_is_created_when_absent() {
    let registrar = RecordingRegistrar::new().with_records(vec![registrar_record(
        "txt-1",
        "@",
        "TXT",
        "google-site-verification=abc",
        300,
    )]);
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "spf").await;

    assert!(outcome.ok);
    assert_eq!(outcome.message, "Created new SPF record.");
    assert_eq!(registrar.added()[0].ttl, 3600);
    assert_eq!(registrar.update_call_count(), 0);
}

#[tokio::test]
async fn caa_in_dns_blocks_creation() {
    let registrar = RecordingRegistrar::new();
    let lookup = Arc::new(
        ScriptedLookup::new().with_answer("example.com.au", "CAA", "0 issue \"digicert.com\""),
    );
    let engine = autofix(&registrar, lookup.clone());

    let outcome = engine.apply_fix(&eligible_domain(), "caa").await;

    assert!(!outcome.ok);
    assert!(outcome.message.contains("CAA"));
    assert_eq!(lookup.call_count(), 1);
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test]
async fn caa_at_registrar_blocks_creation() {
    let registrar = RecordingRegistrar::new().with_records(vec![registrar_record(
        "caa-1",
        "@",
        "caa",
        "0 issue \"sectigo.com\"",
        3600,
    )]);
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "caa").await;

    assert!(!outcome.ok);
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test]
async fn caa_lookup_failure_fails_closed() {
    let registrar = RecordingRegistrar::new();
    let lookup = Arc::new(ScriptedLookup::new().failing("Resolver returned SERVFAIL"));
    let engine = autofix(&registrar, lookup);

    let outcome = engine.apply_fix(&eligible_domain(), "caa").await;

    assert!(!outcome.ok);
    assert!(outcome.message.contains("SERVFAIL"));
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test]
async fn caa_is_created_when_both_sources_are_clear() {
    let registrar = RecordingRegistrar::new();
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "caa").await;

    assert!(outcome.ok, "{}", outcome.message);
    let added = registrar.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].record_type, "CAA");
    assert_eq!(added[0].value, "0 issue \"letsencrypt.org\"");
}

#[tokio::test]
async fn ineligible_domain_is_refused_without_calls() {
    let registrar = RecordingRegistrar::new();
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&ineligible_domain(), "spf").await;

    assert!(!outcome.ok);
    assert_eq!(outcome.message, RemediationConfig::default().ineligible_message);
    assert_eq!(registrar.total_call_count(), 0);
}

#[tokio::test]
async fn flagged_domain_is_eligible_regardless_of_suffix() {
    let registrar = RecordingRegistrar::new();
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));
    let domain = Domain::new(20, "example.com").with_remediation_eligible(true);

    let outcome = engine.apply_fix(&domain, "dmarc").await;

    assert!(outcome.ok, "{}", outcome.message);
}

#[tokio::test]
async fn missing_credential_is_refused_without_calls() {
    let registrar = RecordingRegistrar::new();
    let factory = Arc::new(RecordingFactory::new(registrar.clone()));
    let engine = domwatch_core::AutoFixEngine::new(
        Arc::new(StaticCredentials::new(Vec::new())),
        factory.clone(),
        Arc::new(ScriptedLookup::new()),
        RemediationConfig::default(),
    );

    let outcome = engine.apply_fix(&eligible_domain(), "spf").await;

    assert!(!outcome.ok);
    assert!(outcome.message.contains("No active registrar credential"));
    assert_eq!(factory.created_count(), 0);
    assert_eq!(registrar.total_call_count(), 0);
}

#[tokio::test]
async fn unknown_fix_type_is_refused_without_calls() {
    let registrar = RecordingRegistrar::new();
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "dkim").await;

    assert!(!outcome.ok);
    assert_eq!(outcome.message, "Unknown fix type: dkim");
    assert_eq!(registrar.total_call_count(), 0);
}

#[tokio::test]
async fn read_failure_surfaces_upstream_message() {
    let registrar = RecordingRegistrar::new();
    registrar.set_read_mode(ReadMode::Fail("Domain not found in reseller account".to_string()));
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "spf").await;

    assert!(!outcome.ok);
    assert_eq!(outcome.message, "Domain not found in reseller account");
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test]
async fn missing_record_list_is_a_failure() {
    let registrar = RecordingRegistrar::new();
    registrar.set_read_mode(ReadMode::Missing);
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "dmarc").await;

    assert!(!outcome.ok);
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test]
async fn write_rejection_surfaces_upstream_message() {
    let registrar = RecordingRegistrar::new();
    registrar.fail_writes("ERR_LOCKED", "Domain is locked");
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "dmarc").await;

    assert!(!outcome.ok);
    assert_eq!(outcome.message, "Domain is locked");
}

#[tokio::test(start_paused = true)]
async fn slow_registrar_times_out() {
    let registrar = RecordingRegistrar::new();
    registrar.set_delay(Duration::from_secs(120));
    let engine = autofix(&registrar, Arc::new(ScriptedLookup::new()));

    let outcome = engine.apply_fix(&eligible_domain(), "spf").await;

    assert!(!outcome.ok);
    assert_eq!(outcome.message, "Request timed out after 30s");
    assert_eq!(registrar.write_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_caa_lookup_times_out_without_writes() {
    let registrar = RecordingRegistrar::new();
    let lookup = Arc::new(ScriptedLookup::new().with_delay(Duration::from_secs(120)));
    let engine = autofix(&registrar, lookup.clone());

    let outcome = engine.apply_fix(&eligible_domain(), "caa").await;

    assert!(!outcome.ok);
    assert!(outcome.message.contains("Request timed out after 30s"), "{}", outcome.message);
    assert_eq!(lookup.call_count(), 1);
    assert_eq!(registrar.write_call_count(), 0);
}
