use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use skylark_channels::{
    plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus},
    ChannelEventSink, Error as ChannelError,
};

use crate::{
    accounts::resolve_credentials,
    config::FeishuConfig,
    state::{read_accounts, write_accounts, AccountState, AccountStateMap},
    CHANNEL_ID,
};

/// Feishu/Lark channel plugin.
///
/// The host transport owns the websocket/webhook connection and the send
/// API; it injects its outbound adapter and event sink here. This plugin
/// tracks which accounts are started and validates their config.
pub struct FeishuPlugin {
    accounts: AccountStateMap,
    outbound: Option<Arc<dyn ChannelOutbound>>,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
}

impl FeishuPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            outbound: None,
            event_sink: None,
        }
    }

    #[must_use]
    pub fn with_outbound(mut self, outbound: Arc<dyn ChannelOutbound>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn ChannelEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Shared handle to the account state map, for the event loop.
    #[must_use]
    pub fn accounts(&self) -> AccountStateMap {
        Arc::clone(&self.accounts)
    }

    /// Event sink the host provided, if any, for the event loop.
    #[must_use]
    pub fn event_sink(&self) -> Option<Arc<dyn ChannelEventSink>> {
        self.event_sink.clone()
    }

    /// List all started account IDs.
    #[must_use]
    pub fn account_ids(&self) -> Vec<String> {
        read_accounts(&self.accounts).keys().cloned().collect()
    }

    /// Record the bot open id the transport discovered for an account.
    pub fn set_bot_open_id(&self, account_id: &str, open_id: String) {
        if let Some(state) = write_accounts(&self.accounts).get_mut(account_id) {
            state.bot_open_id = Some(open_id);
        }
    }

    /// Update the in-memory config for a started account without a restart.
    /// Use for allowlist or policy changes that don't touch credentials.
    pub fn update_account_config(&self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let parsed: FeishuConfig = serde_json::from_value(config)?;
        let mut accounts = write_accounts(&self.accounts);
        match accounts.get_mut(account_id) {
            Some(state) => {
                state.config = parsed;
                Ok(())
            },
            None => Err(ChannelError::unknown_account(account_id).into()),
        }
    }
}

impl Default for FeishuPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for FeishuPlugin {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    fn name(&self) -> &str {
        "Feishu"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let parsed: FeishuConfig = serde_json::from_value(config)?;

        if resolve_credentials(&parsed).is_none() {
            return Err(
                ChannelError::invalid_input("feishu appId and appSecret are required").into(),
            );
        }
        let issues = parsed.validate();
        if !issues.is_empty() {
            return Err(
                ChannelError::invalid_input(format!("invalid feishu config: {}", issues.join("; ")))
                    .into(),
            );
        }

        info!(account_id, "starting feishu account");
        let mut accounts = write_accounts(&self.accounts);
        accounts.insert(
            account_id.to_string(),
            AccountState {
                account_id: account_id.to_string(),
                config: parsed,
                bot_open_id: None,
                cancel: CancellationToken::new(),
            },
        );
        Ok(())
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        let cancel = read_accounts(&self.accounts)
            .get(account_id)
            .map(|s| s.cancel.clone());

        if let Some(cancel) = cancel {
            info!(account_id, "stopping feishu account");
            cancel.cancel();
            write_accounts(&self.accounts).remove(account_id);
        } else {
            warn!(account_id, "feishu account not found");
        }
        Ok(())
    }

    fn outbound(&self) -> Option<&dyn ChannelOutbound> {
        self.outbound.as_deref()
    }

    fn status(&self) -> Option<&dyn ChannelStatus> {
        Some(self)
    }
}

#[async_trait]
impl ChannelStatus for FeishuPlugin {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot> {
        let accounts = read_accounts(&self.accounts);
        let snapshot = match accounts.get(account_id) {
            Some(state) => ChannelHealthSnapshot {
                connected: !state.cancel.is_cancelled(),
                account_id: account_id.to_string(),
                details: state
                    .config
                    .name
                    .clone()
                    .or_else(|| Some(format!("app: {}", state.config.app_id))),
            },
            None => ChannelHealthSnapshot {
                connected: false,
                account_id: account_id.to_string(),
                details: Some("account not started".into()),
            },
        };
        Ok(snapshot)
    }
}
