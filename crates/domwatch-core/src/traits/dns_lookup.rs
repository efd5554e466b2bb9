// # DNS Lookup Trait
//
// Independent, authoritative view of a domain's published DNS. Remediation
// uses it to cross-check registrar state, which can lag behind what
// resolvers actually serve.
//
// ## Implementations
//
// - DNS-over-HTTPS: `domwatch-doh` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One answer record from a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub name: String,
    pub record_type: String,
    pub ttl: u32,
    pub data: String,
}

/// Trait for DNS lookup implementations
///
/// # Trust Level: Untrusted
///
/// Single-shot, no retries, no caching. A name that does not exist is an
/// empty answer, not an error.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Resolve `host` for `record_type` (e.g. "CAA", "TXT")
    async fn lookup(&self, host: &str, record_type: &str)
    -> Result<Vec<LookupRecord>, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
