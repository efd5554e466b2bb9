//! Per-key mutual exclusion with bounded lease lifetime
//!
//! The ingestion pipeline may process results for different domains
//! concurrently but must serialize work on the same key:
//!
//! - `(domain_id, check_type)` for the alert tracker
//! - `domain_id` for the incident tracker
//!
//! A lease expires after its TTL even if the guard is never dropped (a
//! worker stuck forever), after which another worker may take it over.
//! Dropping the guard releases the lease unless it was already taken over.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{CheckType, DomainId};

/// Re-check interval while waiting, so expired leases are noticed without a release
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Key guarded by a lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseKey {
    /// Alert state row
    Alert(DomainId, CheckType),
    /// Per-domain incident sequence
    Domain(DomainId),
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseKey::Alert(domain_id, check_type) => write!(f, "alert:{}:{}", domain_id, check_type),
            LeaseKey::Domain(domain_id) => write!(f, "domain:{}", domain_id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LeaseEntry {
    token: u64,
    expires_at: Instant,
}

type LeaseTable = HashMap<LeaseKey, LeaseEntry>;

/// Table of active leases
///
/// Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct KeyedLeases {
    table: Arc<Mutex<LeaseTable>>,
    released: Arc<Notify>,
    next_token: Arc<AtomicU64>,
}

impl KeyedLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_table(table: &Mutex<LeaseTable>) -> MutexGuard<'_, LeaseTable> {
        // A panic while holding the table leaves it structurally valid
        table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the lease if it is free or its holder's lifetime has run out
    pub fn try_acquire(&self, key: LeaseKey, ttl: Duration) -> Option<LeaseGuard> {
        let now = Instant::now();
        let mut table = Self::lock_table(&self.table);

        if let Some(entry) = table.get(&key) {
            if entry.expires_at > now {
                return None;
            }
            warn!("Lease {} expired, taking over from stale holder", key);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        table.insert(
            key,
            LeaseEntry {
                token,
                expires_at: now + ttl,
            },
        );

        Some(LeaseGuard {
            key,
            token,
            table: Arc::clone(&self.table),
            released: Arc::clone(&self.released),
        })
    }

    /// Wait up to `wait` for the lease on `key`
    ///
    /// # Returns
    ///
    /// - `Ok(LeaseGuard)`: The lease is held until the guard drops or `ttl` passes
    /// - `Err(Error::LeaseUnavailable)`: Another holder kept it for the whole wait
    pub async fn acquire(&self, key: LeaseKey, ttl: Duration, wait: Duration) -> Result<LeaseGuard> {
        let deadline = Instant::now() + wait;

        loop {
            let released = self.released.notified();

            if let Some(guard) = self.try_acquire(key, ttl) {
                return Ok(guard);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Gave up waiting for lease {}", key);
                return Err(Error::lease(key.to_string()));
            }

            let pause = (deadline - now).min(POLL_INTERVAL);
            let _ = tokio::time::timeout(pause, released).await;
        }
    }

    /// Whether `key` is currently held by a live lease
    pub fn is_held(&self, key: LeaseKey) -> bool {
        Self::lock_table(&self.table)
            .get(&key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

/// Held lease; released on drop
#[derive(Debug)]
pub struct LeaseGuard {
    key: LeaseKey,
    token: u64,
    table: Arc<Mutex<LeaseTable>>,
    released: Arc<Notify>,
}

impl LeaseGuard {
    pub fn key(&self) -> LeaseKey {
        self.key
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut table = KeyedLeases::lock_table(&self.table);
        // Only release what we still own; an expired lease may have moved on
        if table.get(&self.key).is_some_and(|entry| entry.token == self.token) {
            table.remove(&self.key);
        }
        drop(table);
        self.released.notify_waiters();
    }
}
