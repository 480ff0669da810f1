//! DM and group access gate.
//!
//! Direct messages pass through the configured `dm_policy`; under `pairing`
//! an unknown sender gets a pairing code and the message stops here, before
//! any route resolution. Hosts with a legacy pairing store receive calls
//! with the account id stripped (see
//! [`PairingStore::supports_account_scope`]).

use {
    skylark_channels::{PairingQuery, PairingStore, PairingUpsert},
    skylark_common::ChatType,
    tracing::{debug, info},
};

use crate::{
    config::FeishuConfig,
    error::Result,
    parser::MessageContext,
    policy::{is_group_allowed, resolve_allowlist_match, AllowlistMatch},
    CHANNEL_ID,
};

/// Decision for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Proceed to routing.
    Authorized {
        /// The allowlist entry that matched, when authorization came from
        /// config rather than the pairing store.
        matched: Option<AllowlistMatch>,
    },
    /// Sender is held at the gate; reply with the pairing prompt and stop.
    PairingPending {
        code: String,
        created: bool,
        reply: String,
    },
    /// Drop the message (optionally after a configured denial reply).
    Denied,
}

/// Evaluate access for a direct message.
pub async fn check_dm_access(
    store: &dyn PairingStore,
    cfg: &FeishuConfig,
    account_id: &str,
    ctx: &MessageContext,
) -> Result<GateOutcome> {
    use skylark_channels::gating::DmPolicy;

    let config_match = resolve_allowlist_match(
        &cfg.allow_from,
        &ctx.sender_open_id,
        ctx.sender_name.as_deref(),
    );

    match cfg.dm_policy {
        DmPolicy::Open | DmPolicy::Allowlist => match config_match {
            Some(matched) => Ok(GateOutcome::Authorized {
                matched: Some(matched),
            }),
            None => {
                debug!(sender = %ctx.sender_open_id, account = account_id,
                    "dm sender not in allowlist");
                Ok(GateOutcome::Denied)
            },
        },
        DmPolicy::Pairing => {
            if let Some(matched) = config_match {
                return Ok(GateOutcome::Authorized {
                    matched: Some(matched),
                });
            }
            let scope = store
                .supports_account_scope()
                .then(|| account_id.to_string());
            let approved = store
                .read_allow_list(PairingQuery {
                    channel: CHANNEL_ID.to_string(),
                    account_id: scope.clone(),
                })
                .await?;
            if approved.iter().any(|id| id == &ctx.sender_open_id) {
                return Ok(GateOutcome::Authorized { matched: None });
            }
            let receipt = store
                .upsert_pairing_request(PairingUpsert {
                    channel: CHANNEL_ID.to_string(),
                    id: ctx.sender_open_id.clone(),
                    account_id: scope,
                    sender_name: ctx.sender_name.clone(),
                })
                .await?;
            info!(sender = %ctx.sender_open_id, account = account_id,
                created = receipt.created, "pairing request pending");
            let reply = store.build_pairing_reply(&receipt.code);
            Ok(GateOutcome::PairingPending {
                code: receipt.code,
                created: receipt.created,
                reply,
            })
        },
    }
}

/// Evaluate access for a group chat message.
#[must_use]
pub fn check_group_access(cfg: &FeishuConfig, ctx: &MessageContext) -> GateOutcome {
    debug_assert_eq!(ctx.chat_type, ChatType::Group);
    if is_group_allowed(cfg, &ctx.chat_id) {
        GateOutcome::Authorized { matched: None }
    } else {
        GateOutcome::Denied
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use skylark_channels::{gating::DmPolicy, MemoryPairingStore};

    use super::*;

    fn dm_ctx(sender_open_id: &str) -> MessageContext {
        MessageContext {
            message_id: "om_1".into(),
            chat_id: "oc_dm".into(),
            chat_type: ChatType::Dm,
            sender_id: format!("u_{sender_open_id}"),
            sender_open_id: sender_open_id.into(),
            content: "hi".into(),
            ..Default::default()
        }
    }

    fn pairing_cfg() -> FeishuConfig {
        FeishuConfig {
            dm_policy: DmPolicy::Pairing,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unknown_dm_sender_gets_pairing_code_with_account_scope() {
        let store = MemoryPairingStore::scoped();
        let outcome = check_dm_access(&store, &pairing_cfg(), "default", &dm_ctx("ou_sender"))
            .await
            .expect("gate");
        let GateOutcome::PairingPending { code, created, reply } = outcome else {
            panic!("expected pairing outcome, got {outcome:?}");
        };
        assert!(created);
        assert!(reply.contains(&code));
        assert_eq!(
            store.pending_code("feishu", Some("default"), "ou_sender"),
            Some(code)
        );
    }

    #[tokio::test]
    async fn legacy_store_receives_unscoped_calls() {
        let store = MemoryPairingStore::legacy();
        let outcome = check_dm_access(&store, &pairing_cfg(), "default", &dm_ctx("ou_sender"))
            .await
            .expect("gate");
        assert!(matches!(outcome, GateOutcome::PairingPending { .. }));
        // The request landed in the channel-wide scope, not a per-account one.
        assert!(store.pending_code("feishu", None, "ou_sender").is_some());
    }

    #[tokio::test]
    async fn approved_sender_skips_re_pairing() {
        let store = MemoryPairingStore::scoped();
        store.approve("feishu", Some("default"), "ou_sender");
        let outcome = check_dm_access(&store, &pairing_cfg(), "default", &dm_ctx("ou_sender"))
            .await
            .expect("gate");
        assert_eq!(outcome, GateOutcome::Authorized { matched: None });
        assert!(store.pending_code("feishu", Some("default"), "ou_sender").is_none());
    }

    #[tokio::test]
    async fn config_allowlist_bypasses_store_under_pairing() {
        let store = MemoryPairingStore::scoped();
        let cfg = FeishuConfig {
            dm_policy: DmPolicy::Pairing,
            allow_from: vec!["ou_sender".into()],
            ..Default::default()
        };
        let outcome = check_dm_access(&store, &cfg, "default", &dm_ctx("ou_sender"))
            .await
            .expect("gate");
        assert!(matches!(outcome, GateOutcome::Authorized { matched: Some(_) }));
    }

    #[tokio::test]
    async fn allowlist_policy_denies_unknown_sender() {
        let store = MemoryPairingStore::scoped();
        let cfg = FeishuConfig {
            dm_policy: DmPolicy::Allowlist,
            allow_from: vec!["ou_other".into()],
            ..Default::default()
        };
        let outcome = check_dm_access(&store, &cfg, "default", &dm_ctx("ou_sender"))
            .await
            .expect("gate");
        assert_eq!(outcome, GateOutcome::Denied);
        // Denied senders never enter the pairing queue.
        assert!(store.pending_code("feishu", Some("default"), "ou_sender").is_none());
    }

    #[test]
    fn group_gate_follows_group_policy() {
        use skylark_channels::gating::GroupPolicy;
        let ctx = MessageContext {
            chat_id: "oc_chat".into(),
            chat_type: ChatType::Group,
            ..Default::default()
        };
        let cfg = FeishuConfig {
            group_policy: GroupPolicy::Disabled,
            ..Default::default()
        };
        assert_eq!(check_group_access(&cfg, &ctx), GateOutcome::Denied);

        let cfg = FeishuConfig {
            group_policy: GroupPolicy::Open,
            ..Default::default()
        };
        assert!(matches!(
            check_group_access(&cfg, &ctx),
            GateOutcome::Authorized { .. }
        ));
    }
}
