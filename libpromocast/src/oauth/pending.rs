//! Pending authorization attempts, keyed by state token
//!
//! Entries live for the duration of a single authorization round trip.
//! Each one is consumed exactly once; anything older than the TTL is
//! swept so an abandoned flow is neither a leak nor a replay window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State held between issuing an authorization URL and the callback.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub account_id: i64,
    pub code_verifier: Option<String>,
    created_at: Instant,
}

impl PendingAuthorization {
    pub fn new(account_id: i64, code_verifier: Option<String>) -> Self {
        Self {
            account_id,
            code_verifier,
            created_at: Instant::now(),
        }
    }
}

/// In-process store for pending authorizations.
///
/// Explicitly owned and injected (never a process-global), guarded by a
/// mutex so lookup-and-consume is one atomic step.
pub struct PendingStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingAuthorization>>,
}

impl PendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a pending authorization under its state token, sweeping
    /// expired entries while the lock is held.
    pub fn insert(&self, state: String, pending: PendingAuthorization) {
        let mut entries = self.entries.lock().expect("pending store lock poisoned");
        let ttl = self.ttl;
        entries.retain(|_, p| p.created_at.elapsed() < ttl);
        entries.insert(state, pending);
    }

    /// Remove and return the entry for a state token.
    ///
    /// Returns None for unknown, already-consumed, or expired tokens;
    /// the caller cannot distinguish these cases, by the same token an
    /// attacker cannot either.
    pub fn consume(&self, state: &str) -> Option<PendingAuthorization> {
        let mut entries = self.entries.lock().expect("pending store lock poisoned");
        let pending = entries.remove(state)?;
        if pending.created_at.elapsed() >= self.ttl {
            return None;
        }
        Some(pending)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("pending store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
