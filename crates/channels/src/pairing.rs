//! Allow-list / pairing store seam.
//!
//! Unrecognized DM senders receive a one-time pairing code and are held at
//! the gate until an operator approves them. The store is host-owned; this
//! crate only defines the contract plus an in-memory implementation used by
//! tests and single-process deployments.
//!
//! Two call shapes coexist in the wild: a legacy shape that predates
//! multi-account support and ignores account scoping, and a scoped shape
//! that partitions approvals per account. Rather than probing per call, the
//! store advertises the shape it implements via
//! [`PairingStore::supports_account_scope`] and callers drop the account id
//! when talking to a legacy host. The legacy shape stays supported until
//! hosts have migrated their pairing integrations.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use {async_trait::async_trait, rand::Rng};

use crate::error::{Error, Result};

/// Pairing codes use an unambiguous uppercase alphabet (no `0/O`, `1/I/L`).
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";
const CODE_LEN: usize = 8;

/// Read query against the allow store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingQuery {
    pub channel: String,
    /// `None` for legacy hosts that do not scope approvals per account.
    pub account_id: Option<String>,
}

/// Upsert of a pairing request for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingUpsert {
    pub channel: String,
    /// Platform identifier of the sender awaiting approval.
    pub id: String,
    /// Omitted when the host only implements the legacy shape.
    pub account_id: Option<String>,
    pub sender_name: Option<String>,
}

/// Result of a pairing upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingReceipt {
    /// The active pairing code for this sender (new or reused).
    pub code: String,
    /// Whether this upsert created a new request.
    pub created: bool,
}

/// Host-owned allow-list and pairing-request storage.
#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Whether this store understands per-account scoping. Legacy hosts
    /// return `false` and receive calls with the account id stripped.
    fn supports_account_scope(&self) -> bool {
        false
    }

    /// Read the approved sender identifiers for a channel (and account,
    /// when scoped).
    async fn read_allow_list(&self, query: PairingQuery) -> Result<Vec<String>>;

    /// Create or refresh a pairing request, issuing a code on first sight
    /// and reusing the in-flight code afterwards.
    async fn upsert_pairing_request(&self, req: PairingUpsert) -> Result<PairingReceipt>;

    /// Build the user-facing pairing prompt for a code.
    fn build_pairing_reply(&self, code: &str) -> String;
}

type ScopeKey = (String, Option<String>);

#[derive(Default)]
struct MemoryState {
    approved: HashMap<ScopeKey, HashSet<String>>,
    pending: HashMap<ScopeKey, HashMap<String, String>>,
}

/// In-memory [`PairingStore`] for tests and single-process hosts.
pub struct MemoryPairingStore {
    state: Mutex<MemoryState>,
    scoped: bool,
}

impl MemoryPairingStore {
    /// Store implementing the scoped (per-account) call shape.
    #[must_use]
    pub fn scoped() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            scoped: true,
        }
    }

    /// Store emulating a legacy host: approvals are channel-wide.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            scoped: false,
        }
    }

    fn key(&self, channel: &str, account_id: Option<&str>) -> ScopeKey {
        if self.scoped {
            (channel.to_string(), account_id.map(str::to_string))
        } else {
            // Legacy hosts collapse every account into one channel-wide scope.
            (channel.to_string(), None)
        }
    }

    /// Approve a sender, clearing any pending request.
    pub fn approve(&self, channel: &str, account_id: Option<&str>, id: &str) {
        let key = self.key(channel, account_id);
        let mut state = lock_state(&self.state);
        if let Some(pending) = state.pending.get_mut(&key) {
            pending.remove(id);
        }
        state.approved.entry(key).or_default().insert(id.to_string());
    }

    /// The in-flight pairing code for a sender, if any.
    #[must_use]
    pub fn pending_code(&self, channel: &str, account_id: Option<&str>, id: &str) -> Option<String> {
        let key = self.key(channel, account_id);
        let state = lock_state(&self.state);
        state.pending.get(&key).and_then(|p| p.get(id)).cloned()
    }
}

// A poisoned mutex only happens after a panic in another holder; recover the
// inner state rather than cascading the panic.
fn lock_state(state: &Mutex<MemoryState>) -> std::sync::MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl PairingStore for MemoryPairingStore {
    fn supports_account_scope(&self) -> bool {
        self.scoped
    }

    async fn read_allow_list(&self, query: PairingQuery) -> Result<Vec<String>> {
        if !self.scoped && query.account_id.is_some() {
            return Err(Error::invalid_input(
                "legacy pairing store called with account scope",
            ));
        }
        let key = self.key(&query.channel, query.account_id.as_deref());
        let state = lock_state(&self.state);
        let mut ids: Vec<String> = state
            .approved
            .get(&key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn upsert_pairing_request(&self, req: PairingUpsert) -> Result<PairingReceipt> {
        if !self.scoped && req.account_id.is_some() {
            return Err(Error::invalid_input(
                "legacy pairing store called with account scope",
            ));
        }
        let key = self.key(&req.channel, req.account_id.as_deref());
        let mut state = lock_state(&self.state);
        let pending = state.pending.entry(key).or_default();
        if let Some(code) = pending.get(&req.id) {
            return Ok(PairingReceipt {
                code: code.clone(),
                created: false,
            });
        }
        let code = generate_pairing_code();
        pending.insert(req.id, code.clone());
        Ok(PairingReceipt {
            code,
            created: true,
        })
    }

    fn build_pairing_reply(&self, code: &str) -> String {
        format!(
            "Access to this bot is not configured yet.\n\nAsk the bot owner to approve pairing code {code}."
        )
    }
}

/// Generate a random pairing code from the unambiguous alphabet.
fn generate_pairing_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}
