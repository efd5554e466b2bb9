//! One-click DNS fixes
//!
//! ```text
//! apply_fix(domain, fix_type)
//!   1. eligibility      ─▶ fixed wording on refusal
//!   2. credential       ─▶ "No active registrar credential ..."
//!   3. fix type         ─▶ "Unknown fix type: ..."
//!   4. registrar read   ─▶ upstream message on failure
//!   5. spf / dmarc      ─▶ update in place, else create
//!      caa              ─▶ create only if registrar AND resolver show none
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::{FixOutcome, RegistrarAccess, RegistrarSession, bounded};
use crate::config::RemediationConfig;
use crate::model::Domain;
use crate::traits::{
    CredentialSource, DnsLookup, RecordData, RegistrarClientFactory, RegistrarRecord,
};

/// Supported fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixType {
    Spf,
    Dmarc,
    Caa,
}

impl FixType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixType::Spf => "spf",
            FixType::Dmarc => "dmarc",
            FixType::Caa => "caa",
        }
    }
}

impl fmt::Display for FixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FixType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spf" => Ok(FixType::Spf),
            "dmarc" => Ok(FixType::Dmarc),
            "caa" => Ok(FixType::Caa),
            other => Err(format!("Unknown fix type: {}", other)),
        }
    }
}

/// A TXT policy record that is replaced in place when present
struct TxtPolicy<'a> {
    label: &'static str,
    host: &'static str,
    prefix: &'static str,
    value: &'a str,
}

/// DNS auto-fix engine
pub struct AutoFixEngine {
    registrar: RegistrarAccess,
    lookup: Arc<dyn DnsLookup>,
    config: RemediationConfig,
}

impl AutoFixEngine {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        factory: Arc<dyn RegistrarClientFactory>,
        lookup: Arc<dyn DnsLookup>,
        config: RemediationConfig,
    ) -> Self {
        let registrar = RegistrarAccess::new(credentials, factory, config.request_timeout());
        Self {
            registrar,
            lookup,
            config,
        }
    }

    /// Apply a fix to a domain's DNS
    ///
    /// Never returns an error: every failure is an `ok=false` outcome whose
    /// message is safe to show to the operator.
    pub async fn apply_fix(&self, domain: &Domain, fix_type: &str) -> FixOutcome {
        if !self.config.is_eligible(domain) {
            return FixOutcome::failure(self.config.ineligible_message.clone());
        }

        let session = match self.registrar.connect().await {
            Ok(session) => session,
            Err(message) => return FixOutcome::failure(message),
        };

        let fix = match fix_type.parse::<FixType>() {
            Ok(fix) => fix,
            Err(message) => return FixOutcome::failure(message),
        };

        let records = match session.records(&domain.name).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not read DNS records for {}: {}", domain.name, e);
                return FixOutcome::failure(e.upstream_message());
            }
        };

        let outcome = match fix {
            FixType::Spf => {
                let policy = TxtPolicy {
                    label: "SPF",
                    host: "@",
                    prefix: "v=spf1",
                    value: &self.config.spf_value,
                };
                self.fix_txt(&session, domain, &records, policy).await
            }
            FixType::Dmarc => {
                let policy = TxtPolicy {
                    label: "DMARC",
                    host: "_dmarc",
                    prefix: "v=DMARC1",
                    value: &self.config.dmarc_value,
                };
                self.fix_txt(&session, domain, &records, policy).await
            }
            FixType::Caa => self.fix_caa(&session, domain, &records).await,
        };

        if outcome.ok {
            info!("Applied {} fix to {}: {}", fix, domain.name, outcome.message);
        } else {
            warn!("{} fix for {} not applied: {}", fix, domain.name, outcome.message);
        }
        outcome
    }

    async fn fix_txt(
        &self,
        session: &RegistrarSession,
        domain: &Domain,
        records: &[RegistrarRecord],
        policy: TxtPolicy<'_>,
    ) -> FixOutcome {
        let existing = records.iter().find(|record| {
            record.is_type("TXT")
                && host_matches(&record.host, policy.host, &domain.name)
                && starts_with_ignore_case(&record.value, policy.prefix)
        });

        let Some(existing) = existing else {
            let data = RecordData::new(
                policy.host,
                "TXT",
                policy.value,
                self.config.default_ttl,
            );
            return match session.add(&domain.name, &data).await {
                Ok(_) => FixOutcome::success(format!("Created new {} record.", policy.label)),
                Err(e) => FixOutcome::failure(e.upstream_message()),
            };
        };

        if existing.value == policy.value {
            return FixOutcome::success(format!(
                "Existing {} record already set to {}.",
                policy.label, policy.value
            ));
        }

        // Without the registrar id an update would have to guess the target
        let Some(record_id) = existing.record_id.as_deref() else {
            return FixOutcome::failure(format!(
                "Existing {} record has no registrar id; no changes were made.",
                policy.label
            ));
        };

        let data = RecordData {
            host: existing.host.clone(),
            record_type: "TXT".to_string(),
            value: policy.value.to_string(),
            ttl: existing.ttl,
            priority: existing.priority,
        };
        match session.update(&domain.name, record_id, &data).await {
            Ok(_) => FixOutcome::success(format!(
                "Updated existing {} record to {}.",
                policy.label, policy.value
            )),
            Err(e) => FixOutcome::failure(e.upstream_message()),
        }
    }

    async fn fix_caa(
        &self,
        session: &RegistrarSession,
        domain: &Domain,
        records: &[RegistrarRecord],
    ) -> FixOutcome {
        if records.iter().any(|record| record.is_type("CAA")) {
            return FixOutcome::failure(
                "A CAA record already exists at the registrar; skipped to avoid overriding \
                 the existing certificate authority policy.",
            );
        }

        let published = bounded(
            self.config.request_timeout(),
            self.lookup.lookup(&domain.name, "CAA"),
        )
        .await;
        match published {
            Ok(answers) if answers.iter().any(|a| a.record_type.eq_ignore_ascii_case("CAA")) => {
                return FixOutcome::failure(
                    "A CAA record is already published in DNS; skipped to avoid overriding \
                     the existing certificate authority policy.",
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "{} CAA lookup for {} failed: {}",
                    self.lookup.resolver_name(),
                    domain.name,
                    e
                );
                return FixOutcome::failure(format!(
                    "Could not confirm existing CAA records via DNS ({}); no changes were made.",
                    e.upstream_message()
                ));
            }
        }

        let data = RecordData::new("@", "CAA", &self.config.caa_value, self.config.default_ttl);
        match session.add(&domain.name, &data).await {
            Ok(_) => FixOutcome::success("Created new CAA record."),
            Err(e) => FixOutcome::failure(e.upstream_message()),
        }
    }
}

/// Compare a registrar host against a relative name (`@` is the apex)
fn host_matches(record_host: &str, wanted: &str, domain_name: &str) -> bool {
    relative_host(record_host, domain_name) == relative_host(wanted, domain_name)
}

fn relative_host(host: &str, domain_name: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let domain = domain_name.trim().trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() || host == "@" || host == domain {
        return "@".to_string();
    }
    match host.strip_suffix(&format!(".{}", domain)) {
        Some(relative) => relative.to_string(),
        None => host,
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .trim_start_matches('"')
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
