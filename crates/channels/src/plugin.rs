use {anyhow::Result, async_trait::async_trait};

// ── Channel events (pub/sub) ────────────────────────────────────────────────

/// Events emitted by channel plugins for real-time UI updates.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelEvent {
    InboundMessage {
        channel_type: String,
        account_id: String,
        peer_id: String,
        sender_name: Option<String>,
        access_granted: bool,
    },
    /// A pairing code was issued (or re-sent) to an unrecognized DM sender.
    PairingRequested {
        channel_type: String,
        account_id: String,
        peer_id: String,
        sender_name: Option<String>,
        code: String,
        created: bool,
    },
    /// A channel account was automatically disabled due to a runtime error.
    AccountDisabled {
        channel_type: String,
        account_id: String,
        reason: String,
    },
}

/// Sink for channel events. The gateway provides the concrete implementation.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Broadcast a channel event for real-time UI updates.
    async fn emit(&self, event: ChannelEvent);

    /// Hand an admitted inbound message off to the resolved agent session.
    /// The response is routed back to the originating channel via `reply_to`.
    async fn dispatch_to_chat(
        &self,
        text: &str,
        reply_to: ChannelReplyTarget,
        meta: ChannelMessageMeta,
    );

    /// Request disabling a channel account due to a runtime error.
    async fn request_disable_account(&self, channel_type: &str, account_id: &str, reason: &str);
}

/// Metadata about a channel message, carried alongside the dispatched body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelMessageMeta {
    pub channel_type: String,
    pub sender_name: Option<String>,
    pub sender_id: Option<String>,
    /// Agent the routing cascade selected.
    pub agent_id: String,
    /// Session key the downstream session system should use.
    pub session_key: String,
    /// Which binding rule matched (for observability).
    pub matched_by: String,
}

/// Where to send the response back.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelReplyTarget {
    pub channel_type: String,
    pub account_id: String,
    /// Chat/peer ID to send the reply to.
    pub chat_id: String,
    /// Message to thread the reply under, when the platform supports it.
    pub reply_to_message_id: Option<String>,
}

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "feishu").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start an account connection.
    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()>;

    /// Stop an account connection.
    async fn stop_account(&mut self, account_id: &str) -> Result<()>;

    /// Get outbound adapter for sending messages.
    fn outbound(&self) -> Option<&dyn ChannelOutbound>;

    /// Get status adapter for health checks.
    fn status(&self) -> Option<&dyn ChannelStatus>;
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, account_id: &str, to: &str, text: &str) -> Result<()>;

    /// Send structured card content. Defaults to plain text for platforms
    /// without a card surface.
    async fn send_card(&self, account_id: &str, to: &str, content: &str) -> Result<()> {
        self.send_text(account_id, to, content).await
    }
}

/// Probe channel account health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot>;
}

/// Channel health snapshot.
#[derive(Debug, Clone)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub account_id: String,
    pub details: Option<String>,
}
