//! On-demand per-user agent provisioning.
//!
//! The first authorized DM from a new user creates a dedicated agent with
//! its own workspace plus a direct-peer binding pointing at it. Creation is
//! serialized behind a process-wide lock: concurrent DM users would
//! otherwise race the config read-modify-write and clobber each other's
//! entries. Inside the lock the config is re-read, and re-read again right
//! before the final write, because the directory and metadata writes await
//! in between.

use std::{path::PathBuf, sync::OnceLock};

use {
    chrono::{SecondsFormat, Utc},
    skylark_channels::ConfigStore,
    skylark_config::{
        AgentBinding, AgentEntry, BindingMatch, PeerKind, PeerMatch, SkylarkConfig,
    },
    tokio::sync::Mutex,
    tracing::{info, warn},
};

use crate::{
    config::DynamicAgentConfig,
    error::{Error, Result},
    CHANNEL_ID,
};

const DEFAULT_WORKSPACE_TEMPLATE: &str = "~/.skylark/workspace-{agentId}";
const DEFAULT_AGENT_DIR_TEMPLATE: &str = "~/.skylark/agents/{agentId}/agent";

/// Outcome of a provisioning attempt.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    /// Whether this call wrote a new agent or binding.
    pub created: bool,
    /// Config as of the final read inside the lock; always at least as
    /// fresh as the caller's snapshot.
    pub updated_cfg: SkylarkConfig,
    pub agent_id: Option<String>,
}

fn create_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// The agent id provisioned for a DM sender. Open ids are already
/// filesystem-safe, so the id embeds them verbatim.
#[must_use]
pub fn dynamic_agent_id(sender_open_id: &str) -> String {
    format!("{CHANNEL_ID}-{sender_open_id}")
}

/// Create the per-user agent for a DM sender if it does not exist yet.
pub async fn maybe_create_dynamic_agent(
    store: &dyn ConfigStore,
    dynamic_cfg: &DynamicAgentConfig,
    sender_open_id: &str,
    sender_name: Option<&str>,
) -> Result<ProvisionOutcome> {
    let _guard = create_lock().lock().await;

    // The caller's snapshot may predate a concurrent creation.
    let cfg = store
        .load_config()
        .await
        .map_err(|e| Error::provisioning("reloading config", e))?;

    let has_binding = cfg.bindings.iter().any(|b| {
        b.match_rule.channel == CHANNEL_ID
            && b.match_rule
                .peer
                .as_ref()
                .is_some_and(|p| p.kind == PeerKind::Direct && p.id == sender_open_id)
    });
    if has_binding {
        return Ok(ProvisionOutcome {
            created: false,
            updated_cfg: cfg,
            agent_id: None,
        });
    }

    if let Some(max) = dynamic_cfg.max_agents {
        let count = cfg
            .agents
            .list
            .iter()
            .filter(|a| a.id.starts_with(&format!("{CHANNEL_ID}-")))
            .count();
        if count >= max {
            warn!(limit = max, sender = sender_open_id,
                "max dynamic agents reached, not provisioning");
            return Ok(ProvisionOutcome {
                created: false,
                updated_cfg: cfg,
                agent_id: None,
            });
        }
    }

    let agent_id = dynamic_agent_id(sender_open_id);

    // Partial recovery: the agent entry can exist while the binding is
    // missing (an earlier run died between the two writes).
    if cfg.agents.list.iter().any(|a| a.id == agent_id) {
        info!(agent = %agent_id, sender = sender_open_id, "agent exists, adding missing binding");
        let mut updated = cfg;
        updated.bindings.push(direct_binding(&agent_id, sender_open_id));
        store
            .write_config_file(&updated)
            .await
            .map_err(|e| Error::provisioning("writing recovered binding", e))?;
        return Ok(ProvisionOutcome {
            created: true,
            updated_cfg: updated,
            agent_id: Some(agent_id),
        });
    }

    let workspace = resolve_template(
        dynamic_cfg
            .workspace_template
            .as_deref()
            .unwrap_or(DEFAULT_WORKSPACE_TEMPLATE),
        sender_open_id,
        &agent_id,
    );
    let agent_dir = resolve_template(
        dynamic_cfg
            .agent_dir_template
            .as_deref()
            .unwrap_or(DEFAULT_AGENT_DIR_TEMPLATE),
        sender_open_id,
        &agent_id,
    );

    info!(agent = %agent_id, sender = sender_open_id,
        workspace = %workspace.display(), agent_dir = %agent_dir.display(),
        "creating dynamic agent");

    tokio::fs::create_dir_all(&workspace)
        .await
        .map_err(|e| Error::provisioning("creating workspace dir", e))?;
    tokio::fs::create_dir_all(&agent_dir)
        .await
        .map_err(|e| Error::provisioning("creating agent dir", e))?;

    // Metadata for external scripts; name is omitted when unknown.
    let mut meta = serde_json::json!({
        "openId": sender_open_id,
        "agentId": agent_id,
        "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    if let Some(name) = sender_name.filter(|n| !n.is_empty()) {
        meta["name"] = serde_json::Value::String(name.to_string());
    }
    let meta_path = agent_dir.join("meta.json");
    let body = serde_json::to_string_pretty(&meta).map_err(Error::from)? + "\n";
    tokio::fs::write(&meta_path, body)
        .await
        .map_err(|e| Error::provisioning("writing agent metadata", e))?;

    // The directory writes above awaited; re-read before the final write so
    // a concurrent non-provisioning config change is not lost.
    let mut updated = store
        .load_config()
        .await
        .map_err(|e| Error::provisioning("re-reading config before write", e))?;
    updated.agents.list.push(AgentEntry {
        id: agent_id.clone(),
        workspace: workspace.to_string_lossy().into_owned(),
        agent_dir: agent_dir.to_string_lossy().into_owned(),
    });
    updated.bindings.push(direct_binding(&agent_id, sender_open_id));
    store
        .write_config_file(&updated)
        .await
        .map_err(|e| Error::provisioning("writing provisioned config", e))?;

    Ok(ProvisionOutcome {
        created: true,
        updated_cfg: updated,
        agent_id: Some(agent_id),
    })
}

fn direct_binding(agent_id: &str, sender_open_id: &str) -> AgentBinding {
    AgentBinding {
        agent_id: agent_id.to_string(),
        match_rule: BindingMatch {
            channel: CHANNEL_ID.to_string(),
            account_id: Some("*".to_string()),
            peer: Some(PeerMatch {
                kind: PeerKind::Direct,
                id: sender_open_id.to_string(),
            }),
        },
    }
}

fn resolve_template(template: &str, sender_open_id: &str, agent_id: &str) -> PathBuf {
    let path = template
        .replace("{userId}", sender_open_id)
        .replace("{agentId}", agent_id);
    resolve_user_path(&path)
}

/// Expand a leading `~/` against the home directory.
fn resolve_user_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
