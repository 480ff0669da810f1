//! Multi-account resolution.
//!
//! A config with no `accounts` map still exposes one implicit account named
//! [`DEFAULT_ACCOUNT_ID`] built from the top-level credentials. Account ids
//! are case-insensitive; resolution always lowercases.

use secrecy::{ExposeSecret, Secret};

use crate::{
    config::{Domain, FeishuAccountConfig, FeishuConfig},
    tools::ResolvedTools,
};

/// Account id used when no `accounts` map is configured.
pub const DEFAULT_ACCOUNT_ID: &str = "default";

/// App credentials after trimming and defaulting.
#[derive(Clone)]
pub struct FeishuCredentials {
    pub app_id: String,
    pub app_secret: Secret<String>,
    pub encrypt_key: Option<String>,
    pub verification_token: Option<String>,
    pub domain: Domain,
}

impl std::fmt::Debug for FeishuCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// One account with its per-account overrides already folded into an
/// effective config.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub account_id: String,
    /// Global toggle AND account toggle. A disabled channel disables every
    /// account no matter what the account block says.
    pub enabled: bool,
    /// Whether usable credentials are present.
    pub configured: bool,
    pub name: Option<String>,
    pub credentials: Option<FeishuCredentials>,
    /// Platform tool toggles, account layer over global over defaults.
    pub tools: ResolvedTools,
    pub config: FeishuConfig,
}

/// All account ids, lowercased, sorted and deduplicated. Falls back to the
/// implicit default account when no accounts map exists.
#[must_use]
pub fn list_account_ids(cfg: &FeishuConfig) -> Vec<String> {
    let mut ids: Vec<String> = cfg
        .accounts
        .as_ref()
        .map(|accounts| accounts.keys().map(|k| k.to_ascii_lowercase()).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return vec![DEFAULT_ACCOUNT_ID.to_string()];
    }
    ids.sort();
    ids.dedup();
    ids
}

/// The account id used when an event does not name one: `default` when
/// present, otherwise the first id in sorted order.
#[must_use]
pub fn resolve_default_account_id(cfg: &FeishuConfig) -> String {
    let ids = list_account_ids(cfg);
    if ids.iter().any(|id| id == DEFAULT_ACCOUNT_ID) {
        return DEFAULT_ACCOUNT_ID.to_string();
    }
    ids.into_iter()
        .next()
        .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string())
}

/// Trim credentials and apply the domain default. Blank app id or secret
/// means the account is not configured.
#[must_use]
pub fn resolve_credentials(cfg: &FeishuConfig) -> Option<FeishuCredentials> {
    let app_id = cfg.app_id.trim();
    let app_secret = cfg.app_secret.expose_secret().trim();
    if app_id.is_empty() || app_secret.is_empty() {
        return None;
    }
    Some(FeishuCredentials {
        app_id: app_id.to_string(),
        app_secret: Secret::new(app_secret.to_string()),
        encrypt_key: cfg
            .encrypt_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        verification_token: cfg
            .verification_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        domain: cfg.domain,
    })
}

/// Resolve one account: normalize the id, fold the account block over the
/// global config, then derive credentials and the enabled/configured flags.
#[must_use]
pub fn resolve_account(cfg: &FeishuConfig, account_id: Option<&str>) -> ResolvedAccount {
    let account_id = account_id
        .map(|id| id.trim().to_ascii_lowercase())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| resolve_default_account_id(cfg));

    let override_block = cfg.accounts.as_ref().and_then(|accounts| {
        accounts
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(&account_id))
            .map(|(_, v)| v)
    });

    let tools = ResolvedTools::resolve(&[
        cfg.tools.as_ref(),
        override_block.and_then(|b| b.tools.as_ref()),
    ]);
    let effective = merge_account(cfg, override_block);
    let credentials = resolve_credentials(&effective);
    let account_enabled = override_block.and_then(|b| b.enabled).unwrap_or(true);

    ResolvedAccount {
        enabled: cfg.enabled && account_enabled,
        configured: credentials.is_some(),
        name: effective.name.clone(),
        credentials,
        tools,
        config: effective,
        account_id,
    }
}

/// Accounts that are both enabled and configured, in sorted id order.
#[must_use]
pub fn list_enabled_accounts(cfg: &FeishuConfig) -> Vec<ResolvedAccount> {
    list_account_ids(cfg)
        .iter()
        .map(|id| resolve_account(cfg, Some(id)))
        .filter(|account| account.enabled && account.configured)
        .collect()
}

fn merge_account(cfg: &FeishuConfig, block: Option<&FeishuAccountConfig>) -> FeishuConfig {
    let mut out = cfg.clone();
    let Some(block) = block else {
        return out;
    };
    if let Some(v) = &block.name {
        out.name = Some(v.clone());
    }
    if let Some(v) = &block.app_id {
        out.app_id = v.clone();
    }
    if let Some(v) = &block.app_secret {
        out.app_secret = v.clone();
    }
    if let Some(v) = &block.encrypt_key {
        out.encrypt_key = Some(v.clone());
    }
    if let Some(v) = &block.verification_token {
        out.verification_token = Some(v.clone());
    }
    if let Some(v) = block.domain {
        out.domain = v;
    }
    if let Some(v) = block.connection_mode {
        out.connection_mode = v;
    }
    if let Some(v) = &block.webhook_path {
        out.webhook_path = v.clone();
    }
    if let Some(v) = block.render_mode {
        out.render_mode = v;
    }
    if let Some(v) = block.dm_policy {
        out.dm_policy = v;
    }
    if let Some(v) = block.group_policy {
        out.group_policy = v;
    }
    if let Some(v) = block.require_mention {
        out.require_mention = v;
    }
    if let Some(v) = block.group_command_mention_bypass {
        out.group_command_mention_bypass = v;
    }
    if let Some(v) = &block.allow_from {
        out.allow_from = v.clone();
    }
    if let Some(v) = &block.access_denied_reply {
        out.access_denied_reply = Some(v.clone());
    }
    if let Some(v) = &block.groups {
        out.groups = v.clone();
    }
    if let Some(v) = &block.tools {
        out.tools = Some(v.clone());
    }
    if let Some(v) = &block.dynamic_agents {
        out.dynamic_agents = Some(v.clone());
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        skylark_channels::gating::DmPolicy,
        std::collections::HashMap,
    };

    use super::*;

    fn cfg_with_accounts(accounts: HashMap<String, FeishuAccountConfig>) -> FeishuConfig {
        FeishuConfig {
            app_id: "cli_global".into(),
            app_secret: Secret::new("secret_global".into()),
            accounts: Some(accounts),
            ..Default::default()
        }
    }

    #[test]
    fn implicit_default_account_without_map() {
        let cfg = FeishuConfig {
            app_id: "  cli_x  ".into(),
            app_secret: Secret::new(" s ".into()),
            ..Default::default()
        };
        assert_eq!(list_account_ids(&cfg), vec!["default"]);
        let account = resolve_account(&cfg, None);
        assert_eq!(account.account_id, "default");
        assert!(account.enabled);
        assert!(account.configured);
        let creds = account.credentials.expect("credentials");
        assert_eq!(creds.app_id, "cli_x");
        assert_eq!(creds.app_secret.expose_secret(), "s");
        assert_eq!(creds.domain, Domain::Feishu);
    }

    #[test]
    fn account_ids_are_lowercased_and_sorted() {
        let mut accounts = HashMap::new();
        accounts.insert("TeamB".to_string(), FeishuAccountConfig::default());
        accounts.insert("teamA".to_string(), FeishuAccountConfig::default());
        let cfg = cfg_with_accounts(accounts);
        assert_eq!(list_account_ids(&cfg), vec!["teama", "teamb"]);
        assert_eq!(resolve_default_account_id(&cfg), "teama");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut accounts = HashMap::new();
        accounts.insert(
            "TeamA".to_string(),
            FeishuAccountConfig {
                app_id: Some("cli_team_a".into()),
                ..Default::default()
            },
        );
        let cfg = cfg_with_accounts(accounts);
        let account = resolve_account(&cfg, Some("TEAMA"));
        assert_eq!(account.account_id, "teama");
        assert_eq!(account.config.app_id, "cli_team_a");
    }

    #[test]
    fn global_disabled_wins_over_account_enabled() {
        let mut accounts = HashMap::new();
        accounts.insert(
            "teama".to_string(),
            FeishuAccountConfig {
                enabled: Some(true),
                ..Default::default()
            },
        );
        let mut cfg = cfg_with_accounts(accounts);
        cfg.enabled = false;
        let account = resolve_account(&cfg, Some("teama"));
        assert!(!account.enabled);
    }

    #[test]
    fn blank_credentials_leave_account_unconfigured() {
        let cfg = FeishuConfig {
            app_id: "   ".into(),
            app_secret: Secret::new("secret".into()),
            ..Default::default()
        };
        let account = resolve_account(&cfg, None);
        assert!(!account.configured);
        assert!(account.credentials.is_none());
    }

    #[test]
    fn account_overrides_fold_over_global() {
        let mut accounts = HashMap::new();
        accounts.insert(
            "teama".to_string(),
            FeishuAccountConfig {
                dm_policy: Some(DmPolicy::Open),
                allow_from: Some(vec!["*".into()]),
                ..Default::default()
            },
        );
        let cfg = cfg_with_accounts(accounts);
        let account = resolve_account(&cfg, Some("teama"));
        assert_eq!(account.config.dm_policy, DmPolicy::Open);
        assert_eq!(account.config.allow_from, vec!["*".to_string()]);
        // Untouched fields stay global.
        assert_eq!(account.config.app_id, "cli_global");
    }

    #[test]
    fn tool_toggles_layer_account_over_global() {
        use crate::tools::ToolsToggles;

        let mut accounts = HashMap::new();
        accounts.insert(
            "teama".to_string(),
            FeishuAccountConfig {
                tools: Some(ToolsToggles {
                    task: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let mut cfg = cfg_with_accounts(accounts);
        cfg.tools = Some(ToolsToggles {
            perm: Some(true),
            ..Default::default()
        });

        let account = resolve_account(&cfg, Some("teama"));
        assert!(account.tools.perm);
        assert!(!account.tools.task);
        assert!(account.tools.doc);
    }

    #[test]
    fn enabled_accounts_skip_unconfigured() {
        let mut accounts = HashMap::new();
        accounts.insert("ok".to_string(), FeishuAccountConfig::default());
        accounts.insert(
            "broken".to_string(),
            FeishuAccountConfig {
                app_id: Some("  ".into()),
                ..Default::default()
            },
        );
        let cfg = cfg_with_accounts(accounts);
        let enabled = list_enabled_accounts(&cfg);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].account_id, "ok");
    }
}
