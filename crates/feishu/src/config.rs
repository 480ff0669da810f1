use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    skylark_channels::gating::{DmPolicy, GroupPolicy, MentionBypass},
    tracing::warn,
};

use crate::tools::ToolsToggles;

/// Platform domain the credentials belong to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// feishu.cn (the primary domain).
    #[default]
    Feishu,
    /// larksuite.com (international).
    Lark,
}

/// How the host transport receives events for this account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Websocket,
    Webhook,
}

/// How outbound replies are rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain text messages, content passed through unchanged.
    #[default]
    Raw,
    /// Interactive card messages.
    Card,
}

/// Tool allow/deny lists for one group. Empty lists mean "no additional
/// restriction".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupToolPolicy {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Per-group override block, keyed by chat id (case-insensitive lookup).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_mention: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_command_mention_bypass: Option<MentionBypass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<GroupToolPolicy>,
}

/// On-demand per-user agent provisioning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DynamicAgentConfig {
    pub enabled: bool,
    /// Refuse provisioning once this many feishu agents exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_agents: Option<usize>,
    /// Workspace path template; `{userId}` and `{agentId}` are substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_template: Option<String>,
    /// Agent-dir path template; same substitutions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_dir_template: Option<String>,
}

/// Global Feishu channel configuration (`channels.feishu`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FeishuConfig {
    pub enabled: bool,
    pub app_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypt_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub connection_mode: ConnectionMode,
    pub webhook_path: String,
    pub render_mode: RenderMode,
    pub dm_policy: DmPolicy,
    pub group_policy: GroupPolicy,
    pub require_mention: bool,
    pub group_command_mention_bypass: MentionBypass,
    /// Allowlist entries: `*`, sender open-ids, sender names, or group chat
    /// ids (for `group_policy = allowlist`).
    pub allow_from: Vec<String>,
    /// Reply sent on an allowlist denial. `None` means drop silently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_denied_reply: Option<String>,
    pub groups: HashMap<String, GroupConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsToggles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_agents: Option<DynamicAgentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<HashMap<String, FeishuAccountConfig>>,
}

/// Per-account override block (`channels.feishu.accounts.<id>`).
///
/// Every field is optional; present fields win over the global value when the
/// account is resolved, except `enabled` which can only further restrict.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FeishuAccountConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_secret"
    )]
    pub app_secret: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypt_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_mode: Option<ConnectionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dm_policy: Option<DmPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_policy: Option<GroupPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_mention: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_command_mention_bypass: Option<MentionBypass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_from: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_denied_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<HashMap<String, GroupConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsToggles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_agents: Option<DynamicAgentConfig>,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id: String::new(),
            app_secret: Secret::new(String::new()),
            encrypt_key: None,
            verification_token: None,
            domain: Domain::default(),
            name: None,
            connection_mode: ConnectionMode::default(),
            webhook_path: "/feishu/events".to_string(),
            render_mode: RenderMode::default(),
            dm_policy: DmPolicy::default(),
            group_policy: GroupPolicy::default(),
            require_mention: true,
            group_command_mention_bypass: MentionBypass::default(),
            allow_from: Vec::new(),
            access_denied_reply: None,
            groups: HashMap::new(),
            tools: None,
            dynamic_agents: None,
            accounts: None,
        }
    }
}

impl FeishuConfig {
    /// Typed view of the `channels.feishu` block.
    ///
    /// Never fails: a missing or malformed block degrades to the documented
    /// defaults so a config edit can't take the whole channel down with a
    /// parse panic.
    #[must_use]
    pub fn from_channel_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            None => Self::default(),
            Some(v) => match serde_json::from_value(v.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(error = %e, "invalid channels.feishu block, using defaults");
                    Self::default()
                },
            },
        }
    }

    /// Configuration-level consistency checks. Returns one message per
    /// violation; an empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.dm_policy == DmPolicy::Open
            && !self.allow_from.iter().any(|entry| entry == "*")
        {
            issues.push(
                "channels.feishu.dmPolicy=\"open\" requires channels.feishu.allowFrom to include \"*\""
                    .to_string(),
            );
        }
        issues
    }
}

impl std::fmt::Debug for FeishuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuConfig")
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("dm_policy", &self.dm_policy)
            .field("group_policy", &self.group_policy)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for FeishuAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuAccountConfig")
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_opt_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
