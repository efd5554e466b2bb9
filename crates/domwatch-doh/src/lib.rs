// # DNS-over-HTTPS Lookup
//
// Authoritative DNS lookup over a JSON DNS-over-HTTPS endpoint
// (Cloudflare and Google both serve the `application/dns-json` format).
//
// ## Behavior
//
// - One HTTP GET per lookup, bounded by a request timeout
// - No retry, no caching (the caller decides what a failure means)
// - HTTP failures map to typed errors (429, 5xx, ...)
// - DNS `Status` 0 returns the answers of the requested type
// - NXDOMAIN (`Status` 3) is an empty answer, not an error
// - Any other DNS status is an error
//
// ## API Reference
//
// - Cloudflare: https://developers.cloudflare.com/1.1.1.1/encryption/dns-over-https/make-api-requests/dns-json/
// - Query: GET `/dns-query?name=example.com.au&type=CAA`
//   with `accept: application/dns-json`

use async_trait::async_trait;
use domwatch_core::traits::{DnsLookup, LookupRecord};
use domwatch_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare's public JSON endpoint
pub const CLOUDFLARE_DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

/// Default HTTP timeout for lookups (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const DNS_JSON: &str = "application/dns-json";

/// DNS response codes we distinguish
const RCODE_NOERROR: u32 = 0;
const RCODE_SERVFAIL: u32 = 2;
const RCODE_NXDOMAIN: u32 = 3;

/// DNS-over-HTTPS resolver
///
/// # Trust Level: Untrusted
///
/// Isolated, stateless and single-shot.
pub struct DohLookup {
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DohLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DohLookup")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DohLookup {
    /// Create a resolver for `endpoint` with the default timeout
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: Empty or non-HTTPS endpoint
    /// - `Err(Error::Http)`: The HTTP client could not be built
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_HTTP_TIMEOUT)
    }

    /// Resolver against Cloudflare's public endpoint
    pub fn cloudflare() -> Result<Self> {
        Self::new(CLOUDFLARE_DOH_ENDPOINT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(Error::config("DoH endpoint cannot be empty"));
        }
        if !endpoint.starts_with("https://") {
            return Err(Error::config(format!(
                "DoH endpoint must use https: {}",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DnsLookup for DohLookup {
    async fn lookup(&self, host: &str, record_type: &str) -> Result<Vec<LookupRecord>> {
        let record_type = record_type.to_ascii_uppercase();
        tracing::debug!("DoH lookup {} {} via {}", host, record_type, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", host), ("type", record_type.as_str())])
            .header(reqwest::header::ACCEPT, DNS_JSON)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::lookup(format!("DNS lookup for {} timed out", host))
                } else {
                    Error::lookup(format!("HTTP request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                400 => Error::lookup(format!(
                    "Resolver rejected query for {} {}: {}",
                    host, record_type, error_text
                )),
                429 => Error::lookup(format!(
                    "Resolver rate limit exceeded. Please retry later. Status: {}",
                    status
                )),
                500..=599 => Error::lookup(format!(
                    "Resolver server error (transient): {} - {}",
                    status, error_text
                )),
                _ => Error::lookup(format!("DNS lookup failed: {} - {}", status, error_text)),
            });
        }

        let body: DohResponse = response
            .json()
            .await
            .map_err(|e| Error::lookup(format!("Failed to parse resolver response: {}", e)))?;

        let records = answers_of_type(body, host, &record_type)?;
        tracing::debug!("DoH lookup {} {}: {} answer(s)", host, record_type, records.len());
        Ok(records)
    }

    fn resolver_name(&self) -> &'static str {
        "doh"
    }
}

/// JSON body of a DoH reply
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    name: String,
    #[serde(rename = "type")]
    record_type: u16,
    #[serde(rename = "TTL", default)]
    ttl: u32,
    data: String,
}

/// Interpret the DNS status and keep only answers of `record_type`
///
/// CNAME hops in the answer section are dropped.
fn answers_of_type(
    body: DohResponse,
    host: &str,
    record_type: &str,
) -> Result<Vec<LookupRecord>> {
    match body.status {
        RCODE_NOERROR => Ok(body
            .answer
            .into_iter()
            .map(|answer| LookupRecord {
                name: answer.name.trim_end_matches('.').to_string(),
                record_type: type_name(answer.record_type),
                ttl: answer.ttl,
                data: answer.data,
            })
            .filter(|record| record.record_type == record_type)
            .collect()),
        RCODE_NXDOMAIN => Ok(Vec::new()),
        RCODE_SERVFAIL => Err(Error::lookup(format!(
            "Resolver returned SERVFAIL for {} {}",
            host, record_type
        ))),
        other => Err(Error::lookup(format!(
            "DNS query for {} {} failed with status {}",
            host, record_type, other
        ))),
    }
}

/// Mnemonic for an RR type code
fn type_name(code: u16) -> String {
    let name = match code {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        257 => "CAA",
        other => return format!("TYPE{}", other),
    };
    name.to_string()
}
