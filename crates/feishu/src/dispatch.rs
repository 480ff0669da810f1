//! Inbound message dispatcher.
//!
//! One entry point per received message event: parse, resolve the account,
//! evaluate group/DM access, provision a per-user agent when configured,
//! resolve the agent route and hand the body to the event sink. Pairing and
//! denial branches stop before route resolution. Provisioning runs before
//! routing so a binding written by this very message is visible to the
//! cascade.

use {
    skylark_channels::{
        ChannelEvent, ChannelEventSink, ChannelMessageMeta, ChannelOutbound, ChannelReplyTarget,
        ConfigStore, PairingStore,
    },
    skylark_config::PeerKind,
    skylark_routing::{AgentRouter, RouteQuery},
    tracing::{debug, info, warn},
};

use crate::{
    accounts::resolve_account,
    config::FeishuConfig,
    dynamic_agent::maybe_create_dynamic_agent,
    error::{Context, Result},
    gate::{check_dm_access, check_group_access, GateOutcome},
    parser::{parse_message_event, MessageContext, MessageEvent},
    policy::{requires_mention, resolve_command_mention_bypass},
    CHANNEL_ID,
};

/// Collaborators the dispatcher needs, injected per host.
pub struct DispatchDeps<'a> {
    pub config_store: &'a dyn ConfigStore,
    pub pairing_store: &'a dyn PairingStore,
    pub router: &'a dyn AgentRouter,
    pub sink: &'a dyn ChannelEventSink,
    pub outbound: &'a dyn ChannelOutbound,
    /// Open id of the bot account receiving the event.
    pub bot_open_id: &'a str,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Body handed to the agent session.
    Dispatched { agent_id: String },
    /// Sender held at the pairing gate; the pairing prompt was sent.
    PairingReplySent { created: bool },
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingSender,
    EmptyBody,
    AccountDisabled,
    AccountUnconfigured,
    GroupNotAllowed,
    MentionRequired,
    AccessDenied,
}

/// Handle one message event for an account.
pub async fn handle_message(
    deps: &DispatchDeps<'_>,
    account_id: Option<&str>,
    event: &MessageEvent,
) -> Result<DispatchOutcome> {
    let mut cfg = deps
        .config_store
        .load_config()
        .await
        .context("loading config")?;
    let channel_cfg = FeishuConfig::from_channel_value(cfg.channels.feishu.as_ref());
    let account = resolve_account(&channel_cfg, account_id);

    if !account.enabled {
        debug!(account = %account.account_id, "account disabled, dropping message");
        return Ok(DispatchOutcome::Dropped(DropReason::AccountDisabled));
    }
    if !account.configured {
        warn!(account = %account.account_id, "account has no credentials, dropping message");
        return Ok(DispatchOutcome::Dropped(DropReason::AccountUnconfigured));
    }

    let ctx = parse_message_event(event, deps.bot_open_id);
    if ctx.sender_open_id.is_empty() {
        warn!(message_id = %ctx.message_id, "message without sender open id, dropping");
        return Ok(DispatchOutcome::Dropped(DropReason::MissingSender));
    }
    if ctx.content.is_empty() {
        debug!(message_id = %ctx.message_id, content_type = %ctx.content_type,
            "empty message body, dropping");
        return Ok(DispatchOutcome::Dropped(DropReason::EmptyBody));
    }

    let acfg = &account.config;

    if ctx.chat_type.is_direct() {
        match check_dm_access(deps.pairing_store, acfg, &account.account_id, &ctx).await? {
            GateOutcome::Authorized { .. } => {},
            GateOutcome::PairingPending { code, created, reply } => {
                send_reply(deps, &account.account_id, &ctx, &reply).await?;
                deps.sink
                    .emit(ChannelEvent::PairingRequested {
                        channel_type: CHANNEL_ID.to_string(),
                        account_id: account.account_id.clone(),
                        peer_id: ctx.sender_open_id.clone(),
                        sender_name: ctx.sender_name.clone(),
                        code,
                        created,
                    })
                    .await;
                return Ok(DispatchOutcome::PairingReplySent { created });
            },
            GateOutcome::Denied => {
                return deny(deps, &account.account_id, acfg, &ctx, DropReason::AccessDenied)
                    .await;
            },
        }

        // Before routing: a binding created for this very sender must be
        // visible to the cascade below.
        if let Some(dynamic_cfg) = acfg.dynamic_agents.as_ref().filter(|d| d.enabled) {
            let outcome = maybe_create_dynamic_agent(
                deps.config_store,
                dynamic_cfg,
                &ctx.sender_open_id,
                ctx.sender_name.as_deref(),
            )
            .await?;
            cfg = outcome.updated_cfg;
        }
    } else {
        match check_group_access(acfg, &ctx) {
            GateOutcome::Authorized { .. } => {},
            _ => {
                return deny(deps, &account.account_id, acfg, &ctx, DropReason::GroupNotAllowed)
                    .await;
            },
        }
        if requires_mention(acfg, ctx.chat_type, &ctx.chat_id)
            && !ctx.mentioned_bot
            && !command_bypasses_mention(acfg, &ctx)
        {
            debug!(chat = %ctx.chat_id, message_id = %ctx.message_id,
                "bot not mentioned, dropping group message");
            return Ok(DispatchOutcome::Dropped(DropReason::MentionRequired));
        }
    }

    let (peer_kind, peer_id) = if ctx.chat_type.is_direct() {
        (PeerKind::Direct, ctx.sender_open_id.as_str())
    } else {
        (PeerKind::Group, ctx.chat_id.as_str())
    };
    let route = deps.router.resolve_route(
        &RouteQuery {
            channel: CHANNEL_ID.to_string(),
            account_id: account.account_id.clone(),
            peer_kind,
            peer_id: peer_id.to_string(),
        },
        &cfg,
    )?;

    deps.sink
        .emit(ChannelEvent::InboundMessage {
            channel_type: CHANNEL_ID.to_string(),
            account_id: account.account_id.clone(),
            peer_id: peer_id.to_string(),
            sender_name: ctx.sender_name.clone(),
            access_granted: true,
        })
        .await;

    info!(account = %account.account_id, agent = %route.agent_id,
        matched_by = %route.matched_by, chat = %ctx.chat_id, "dispatching message");
    deps.sink
        .dispatch_to_chat(
            &ctx.content,
            ChannelReplyTarget {
                channel_type: CHANNEL_ID.to_string(),
                account_id: account.account_id.clone(),
                chat_id: ctx.chat_id.clone(),
                reply_to_message_id: Some(ctx.message_id.clone()),
            },
            ChannelMessageMeta {
                channel_type: CHANNEL_ID.to_string(),
                sender_name: ctx.sender_name.clone(),
                sender_id: Some(ctx.sender_id.clone()),
                agent_id: route.agent_id.clone(),
                session_key: route.session_key,
                matched_by: route.matched_by,
            },
        )
        .await;

    Ok(DispatchOutcome::Dispatched {
        agent_id: route.agent_id,
    })
}

/// Slash commands may bypass the mention requirement depending on the
/// configured mode. Under `single_bot` a command with extra user mentions is
/// assumed to address someone else and does not bypass.
fn command_bypasses_mention(cfg: &FeishuConfig, ctx: &MessageContext) -> bool {
    use skylark_channels::gating::MentionBypass;
    if !ctx.content.starts_with('/') {
        return false;
    }
    match resolve_command_mention_bypass(cfg, &ctx.chat_id) {
        MentionBypass::Always => true,
        MentionBypass::Never => false,
        MentionBypass::SingleBot => ctx.mention_targets.is_empty(),
    }
}

async fn deny(
    deps: &DispatchDeps<'_>,
    account_id: &str,
    cfg: &FeishuConfig,
    ctx: &MessageContext,
    reason: DropReason,
) -> Result<DispatchOutcome> {
    if let Some(reply) = cfg.access_denied_reply.as_deref().filter(|r| !r.is_empty()) {
        send_reply(deps, account_id, ctx, reply).await?;
    }
    deps.sink
        .emit(ChannelEvent::InboundMessage {
            channel_type: CHANNEL_ID.to_string(),
            account_id: account_id.to_string(),
            peer_id: ctx.sender_open_id.clone(),
            sender_name: ctx.sender_name.clone(),
            access_granted: false,
        })
        .await;
    Ok(DispatchOutcome::Dropped(reason))
}

async fn send_reply(
    deps: &DispatchDeps<'_>,
    account_id: &str,
    ctx: &MessageContext,
    text: &str,
) -> Result<()> {
    deps.outbound
        .send_text(account_id, &ctx.chat_id, text)
        .await
        .context("sending reply")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use {
        async_trait::async_trait,
        skylark_channels::MemoryPairingStore,
        skylark_config::{AgentDefaults, SkylarkConfig},
        skylark_routing::BindingRouter,
    };

    use super::*;
    use crate::parser::{EventMention, EventMessage, EventSender, MentionId, SenderId};

    const BOT: &str = "ou_bot";

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ChannelEvent>>,
        dispatched: Mutex<Vec<(String, ChannelReplyTarget, ChannelMessageMeta)>>,
    }

    #[async_trait]
    impl ChannelEventSink for RecordingSink {
        async fn emit(&self, event: ChannelEvent) {
            self.events.lock().unwrap().push(event);
        }

        async fn dispatch_to_chat(
            &self,
            text: &str,
            reply_to: ChannelReplyTarget,
            meta: ChannelMessageMeta,
        ) {
            self.dispatched
                .lock()
                .unwrap()
                .push((text.to_string(), reply_to, meta));
        }

        async fn request_disable_account(&self, _: &str, _: &str, _: &str) {}
    }

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ChannelOutbound for RecordingOutbound {
        async fn send_text(&self, account_id: &str, to: &str, text: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((account_id.to_string(), to.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Router wrapper that counts resolutions.
    struct CountingRouter {
        inner: BindingRouter,
        calls: AtomicUsize,
    }

    impl CountingRouter {
        fn new() -> Self {
            Self {
                inner: BindingRouter,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AgentRouter for CountingRouter {
        fn resolve_route(
            &self,
            query: &RouteQuery,
            config: &SkylarkConfig,
        ) -> skylark_routing::Result<skylark_routing::ResolvedRoute> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve_route(query, config)
        }
    }

    struct StaticConfigStore {
        cfg: Mutex<SkylarkConfig>,
    }

    #[async_trait]
    impl ConfigStore for StaticConfigStore {
        async fn load_config(&self) -> anyhow::Result<SkylarkConfig> {
            Ok(self.cfg.lock().unwrap().clone())
        }

        async fn write_config_file(&self, config: &SkylarkConfig) -> anyhow::Result<()> {
            *self.cfg.lock().unwrap() = config.clone();
            Ok(())
        }
    }

    fn base_config(channel: serde_json::Value) -> SkylarkConfig {
        let mut cfg = SkylarkConfig::default();
        cfg.agents.defaults = Some(AgentDefaults {
            id: "assistant".into(),
        });
        cfg.channels.feishu = Some(channel);
        cfg
    }

    fn channel_block() -> serde_json::Value {
        serde_json::json!({
            "appId": "cli_x",
            "appSecret": "secret_x",
        })
    }

    fn dm_event(text: &str) -> MessageEvent {
        MessageEvent {
            sender: Some(EventSender {
                sender_id: Some(SenderId {
                    open_id: Some("ou_sender".into()),
                    user_id: Some("u_sender".into()),
                }),
            }),
            message: EventMessage {
                message_id: "om_dm".into(),
                chat_id: "oc_dm".into(),
                chat_type: "p2p".into(),
                message_type: "text".into(),
                content: serde_json::json!({ "text": text }).to_string(),
                mentions: None,
                root_id: None,
                parent_id: None,
            },
        }
    }

    fn group_event(text: &str, mentions: Option<Vec<EventMention>>) -> MessageEvent {
        let mut event = dm_event(text);
        event.message.chat_id = "oc_group".into();
        event.message.chat_type = "group".into();
        event.message.mentions = mentions;
        event
    }

    fn bot_mention() -> EventMention {
        EventMention {
            key: Some("@_user_1".into()),
            name: Some("Bot".into()),
            id: Some(MentionId {
                open_id: Some(BOT.into()),
            }),
        }
    }

    struct Harness {
        config_store: StaticConfigStore,
        pairing_store: MemoryPairingStore,
        router: CountingRouter,
        sink: RecordingSink,
        outbound: RecordingOutbound,
    }

    impl Harness {
        fn new(cfg: SkylarkConfig) -> Self {
            Self {
                config_store: StaticConfigStore {
                    cfg: Mutex::new(cfg),
                },
                pairing_store: MemoryPairingStore::scoped(),
                router: CountingRouter::new(),
                sink: RecordingSink::default(),
                outbound: RecordingOutbound::default(),
            }
        }

        fn deps(&self) -> DispatchDeps<'_> {
            DispatchDeps {
                config_store: &self.config_store,
                pairing_store: &self.pairing_store,
                router: &self.router,
                sink: &self.sink,
                outbound: &self.outbound,
                bot_open_id: BOT,
            }
        }
    }

    #[tokio::test]
    async fn unknown_dm_sender_gets_pairing_reply_without_routing() {
        let harness = Harness::new(base_config(channel_block()));
        let outcome = handle_message(&harness.deps(), Some("default"), &dm_event("hi"))
            .await
            .expect("dispatch");
        assert!(matches!(outcome, DispatchOutcome::PairingReplySent { created: true }));

        let sent = harness.outbound.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "oc_dm");
        assert!(sent[0].2.contains("pairing code"));
        assert_eq!(harness.router.calls.load(Ordering::SeqCst), 0);
        assert!(harness.sink.dispatched.lock().unwrap().is_empty());

        let events = harness.sink.events.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [ChannelEvent::PairingRequested { created: true, .. }]
        ));
    }

    #[tokio::test]
    async fn approved_dm_sender_is_dispatched_to_default_agent() {
        let harness = Harness::new(base_config(channel_block()));
        harness.pairing_store.approve("feishu", Some("default"), "ou_sender");

        let outcome = handle_message(&harness.deps(), Some("default"), &dm_event("hello"))
            .await
            .expect("dispatch");
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                agent_id: "assistant".into()
            }
        );

        let dispatched = harness.sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        let (text, reply_to, meta) = &dispatched[0];
        assert_eq!(text, "hello");
        assert_eq!(reply_to.chat_id, "oc_dm");
        assert_eq!(reply_to.reply_to_message_id.as_deref(), Some("om_dm"));
        assert_eq!(meta.agent_id, "assistant");
        assert_eq!(meta.session_key, "feishu:default:ou_sender");
    }

    #[tokio::test]
    async fn dm_provisioning_routes_to_fresh_agent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut channel = channel_block();
        channel["dmPolicy"] = "open".into();
        channel["allowFrom"] = serde_json::json!(["*"]);
        channel["dynamicAgents"] = serde_json::json!({
            "enabled": true,
            "workspaceTemplate": dir.path().join("ws-{agentId}").to_string_lossy(),
            "agentDirTemplate": dir.path().join("agents/{agentId}").to_string_lossy(),
        });
        let harness = Harness::new(base_config(channel));

        let outcome = handle_message(&harness.deps(), Some("default"), &dm_event("hello"))
            .await
            .expect("dispatch");
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                agent_id: "feishu-ou_sender".into()
            }
        );

        // The binding written by this message was used for its own routing.
        let dispatched = harness.sink.dispatched.lock().unwrap();
        assert_eq!(dispatched[0].2.matched_by, "peer");
        let stored = harness.config_store.cfg.lock().unwrap();
        assert_eq!(stored.agents.list.len(), 1);
    }

    #[tokio::test]
    async fn group_message_without_mention_is_dropped() {
        let mut channel = channel_block();
        channel["groupPolicy"] = "open".into();
        let harness = Harness::new(base_config(channel));

        let outcome = handle_message(&harness.deps(), Some("default"), &group_event("hi", None))
            .await
            .expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::MentionRequired));
    }

    #[tokio::test]
    async fn group_mention_is_forwarded_with_clean_body() {
        let mut channel = channel_block();
        channel["groupPolicy"] = "open".into();
        let harness = Harness::new(base_config(channel));

        let event = group_event("@_user_1 status please", Some(vec![bot_mention()]));
        let outcome = handle_message(&harness.deps(), Some("default"), &event)
            .await
            .expect("dispatch");
        assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));

        let dispatched = harness.sink.dispatched.lock().unwrap();
        assert_eq!(dispatched[0].0, "status please");
        assert_eq!(dispatched[0].2.session_key, "feishu:default:oc_group");
    }

    #[tokio::test]
    async fn single_bot_command_bypasses_mention_requirement() {
        let mut channel = channel_block();
        channel["groupPolicy"] = "open".into();
        let harness = Harness::new(base_config(channel));

        let outcome =
            handle_message(&harness.deps(), Some("default"), &group_event("/status", None))
                .await
                .expect("dispatch");
        assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));

        // A command that also mentions another user does not bypass.
        let with_user = group_event(
            "/status @_user_2",
            Some(vec![EventMention {
                key: Some("@_user_2".into()),
                name: Some("Alice".into()),
                id: Some(MentionId {
                    open_id: Some("ou_alice".into()),
                }),
            }]),
        );
        let outcome = handle_message(&harness.deps(), Some("default"), &with_user)
            .await
            .expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::MentionRequired));
    }

    #[tokio::test]
    async fn disallowed_group_gets_denial_reply_when_configured() {
        let mut channel = channel_block();
        channel["accessDeniedReply"] = "not allowed here".into();
        let harness = Harness::new(base_config(channel));

        let event = group_event("@_user_1 hi", Some(vec![bot_mention()]));
        let outcome = handle_message(&harness.deps(), Some("default"), &event)
            .await
            .expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::GroupNotAllowed));

        let sent = harness.outbound.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, "not allowed here");
        let events = harness.sink.events.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [ChannelEvent::InboundMessage {
                access_granted: false,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn disabled_account_drops_before_parsing() {
        let mut channel = channel_block();
        channel["enabled"] = false.into();
        let harness = Harness::new(base_config(channel));

        let outcome = handle_message(&harness.deps(), Some("default"), &dm_event("hi"))
            .await
            .expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::AccountDisabled));
        assert_eq!(harness.router.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_channel_block_means_unconfigured() {
        let harness = Harness::new(base_config(serde_json::json!({})));
        let outcome = handle_message(&harness.deps(), None, &dm_event("hi"))
            .await
            .expect("dispatch");
        assert_eq!(
            outcome,
            DispatchOutcome::Dropped(DropReason::AccountUnconfigured)
        );
    }
}
