use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tokio_util::sync::CancellationToken;

use crate::config::FeishuConfig;

/// Shared account state map.
pub type AccountStateMap = Arc<RwLock<HashMap<String, AccountState>>>;

/// Per-account runtime state.
pub struct AccountState {
    pub account_id: String,
    /// Effective config for this account (overrides already folded in).
    pub config: FeishuConfig,
    /// Open id of the bot identity, once the transport has reported it.
    pub bot_open_id: Option<String>,
    pub cancel: CancellationToken,
}

// Lock poisoning only happens after a panic in another holder; recover the
// map rather than cascading the panic.
pub(crate) fn read_accounts(
    map: &RwLock<HashMap<String, AccountState>>,
) -> RwLockReadGuard<'_, HashMap<String, AccountState>> {
    map.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) fn write_accounts(
    map: &RwLock<HashMap<String, AccountState>>,
) -> RwLockWriteGuard<'_, HashMap<String, AccountState>> {
    map.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
