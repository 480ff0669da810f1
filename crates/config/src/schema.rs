use serde::{Deserialize, Serialize};

/// Root configuration document.
///
/// The channel sections are kept as raw JSON values; each channel crate owns
/// its typed view and its defaults, so an invalid channel block degrades to
/// that channel's documented defaults instead of failing the whole load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SkylarkConfig {
    pub agents: AgentsConfig,
    pub bindings: Vec<AgentBinding>,
    pub channels: ChannelsConfig,
}

/// Registered agents plus defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentsConfig {
    pub list: Vec<AgentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<AgentDefaults>,
}

/// One agent: its identity plus workspace and agent-dir paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentEntry {
    pub id: String,
    pub workspace: String,
    pub agent_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    /// Agent used when no binding matches.
    pub id: String,
}

/// Associates an inbound identity (channel + peer) with an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentBinding {
    pub agent_id: String,
    #[serde(rename = "match")]
    pub match_rule: BindingMatch,
}

/// Match criteria for a binding. `account_id` of `"*"` (or absent) matches
/// every account of the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BindingMatch {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerMatch {
    pub kind: PeerKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    Direct,
    Group,
}

/// Per-channel configuration blocks, untyped at this level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feishu: Option<serde_json::Value>,
}

impl BindingMatch {
    /// Whether this binding's account constraint matches `account_id`.
    #[must_use]
    pub fn matches_account(&self, account_id: &str) -> bool {
        match self.account_id.as_deref() {
            None | Some("*") => true,
            Some(bound) => bound.eq_ignore_ascii_case(account_id),
        }
    }
}
