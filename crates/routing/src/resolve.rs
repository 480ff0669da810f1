use {
    skylark_config::{PeerKind, SkylarkConfig},
    tracing::debug,
};

use crate::error::{Error, Result};

/// Identity of one inbound message for routing purposes.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub channel: String,
    pub account_id: String,
    pub peer_kind: PeerKind,
    /// Sender open-id for DMs, chat id for groups.
    pub peer_id: String,
}

/// Resolved route: which agent handles this message and under which session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub agent_id: String,
    pub account_id: String,
    pub session_key: String,
    /// Which cascade step matched: `peer`, `account`, `channel`, or `default`.
    pub matched_by: String,
}

/// Routing collaborator consumed by channel dispatchers.
pub trait AgentRouter: Send + Sync {
    fn resolve_route(&self, query: &RouteQuery, config: &SkylarkConfig) -> Result<ResolvedRoute>;
}

/// Default router walking the config binding cascade.
#[derive(Default)]
pub struct BindingRouter;

impl AgentRouter for BindingRouter {
    fn resolve_route(&self, query: &RouteQuery, config: &SkylarkConfig) -> Result<ResolvedRoute> {
        resolve_agent_route(query, config)
    }
}

/// Resolve which agent should handle a message, following the binding cascade.
pub fn resolve_agent_route(query: &RouteQuery, config: &SkylarkConfig) -> Result<ResolvedRoute> {
    let candidates: Vec<_> = config
        .bindings
        .iter()
        .filter(|b| {
            b.match_rule.channel.eq_ignore_ascii_case(&query.channel)
                && b.match_rule.matches_account(&query.account_id)
        })
        .collect();

    // 1. Peer binding: exact peer kind + id.
    for binding in &candidates {
        if let Some(peer) = &binding.match_rule.peer {
            if peer.kind == query.peer_kind && peer.id == query.peer_id {
                return Ok(route(query, &binding.agent_id, "peer"));
            }
        }
    }

    // 2. Account binding: explicit (non-wildcard) account, no peer constraint.
    for binding in &candidates {
        if binding.match_rule.peer.is_none()
            && binding
                .match_rule
                .account_id
                .as_deref()
                .is_some_and(|a| a != "*")
        {
            return Ok(route(query, &binding.agent_id, "account"));
        }
    }

    // 3. Channel binding: wildcard or absent account, no peer constraint.
    for binding in &candidates {
        if binding.match_rule.peer.is_none() {
            return Ok(route(query, &binding.agent_id, "channel"));
        }
    }

    // 4. Default agent.
    if let Some(defaults) = &config.agents.defaults {
        debug!(agent_id = %defaults.id, "no binding matched, using default agent");
        return Ok(route(query, &defaults.id, "default"));
    }

    Err(Error::NoRoute {
        channel: query.channel.clone(),
        peer_id: query.peer_id.clone(),
    })
}

fn route(query: &RouteQuery, agent_id: &str, matched_by: &str) -> ResolvedRoute {
    ResolvedRoute {
        agent_id: agent_id.to_string(),
        account_id: query.account_id.clone(),
        session_key: format!("{}:{}:{}", query.channel, query.account_id, query.peer_id),
        matched_by: matched_by.to_string(),
    }
}
