//! Access policy evaluation.
//!
//! Allowlist entries can be the wildcard `*`, a sender open-id, a sender
//! display name, or (for group policy) a chat id. All comparisons are
//! case-insensitive after trimming; the wildcard always wins over more
//! specific entries.

use {
    skylark_channels::gating::{GroupPolicy, MentionBypass},
    skylark_common::ChatType,
};

use crate::config::{FeishuConfig, GroupConfig, GroupToolPolicy};

/// What kind of allowlist entry produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Wildcard,
    Id,
    Name,
}

/// A successful allowlist lookup. `match_key` is the matching entry,
/// lowercased, for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistMatch {
    pub source: MatchSource,
    pub match_key: String,
}

/// Check a sender against an allowlist. Precedence: wildcard, then open-id,
/// then display name.
#[must_use]
pub fn resolve_allowlist_match(
    allow_from: &[String],
    sender_id: &str,
    sender_name: Option<&str>,
) -> Option<AllowlistMatch> {
    let entries: Vec<&str> = allow_from
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect();

    if let Some(entry) = entries.iter().copied().find(|e| *e == "*") {
        return Some(AllowlistMatch {
            source: MatchSource::Wildcard,
            match_key: entry.to_string(),
        });
    }
    if let Some(entry) = entries
        .iter()
        .find(|e| e.eq_ignore_ascii_case(sender_id.trim()))
    {
        return Some(AllowlistMatch {
            source: MatchSource::Id,
            match_key: entry.to_ascii_lowercase(),
        });
    }
    if let Some(name) = sender_name.map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(entry) = entries.iter().find(|e| e.eq_ignore_ascii_case(name)) {
            return Some(AllowlistMatch {
                source: MatchSource::Name,
                match_key: entry.to_ascii_lowercase(),
            });
        }
    }
    None
}

/// Per-group override block for a chat id, if configured.
#[must_use]
pub fn resolve_group_config<'a>(cfg: &'a FeishuConfig, chat_id: &str) -> Option<&'a GroupConfig> {
    cfg.groups
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(chat_id.trim()))
        .map(|(_, v)| v)
}

/// Tool restrictions for a group; no group block means no restriction.
#[must_use]
pub fn resolve_group_tool_policy(cfg: &FeishuConfig, chat_id: &str) -> GroupToolPolicy {
    resolve_group_config(cfg, chat_id)
        .and_then(|g| g.tools.clone())
        .unwrap_or_default()
}

/// Whether messages from this group chat are processed at all.
#[must_use]
pub fn is_group_allowed(cfg: &FeishuConfig, chat_id: &str) -> bool {
    match cfg.group_policy {
        GroupPolicy::Disabled => false,
        GroupPolicy::Open => true,
        GroupPolicy::Allowlist => {
            resolve_allowlist_match(&cfg.allow_from, chat_id, None).is_some()
        },
    }
}

/// Whether a message must @-mention the bot to be handled. Direct messages
/// never require a mention; groups follow the group override, then the
/// global flag.
#[must_use]
pub fn requires_mention(cfg: &FeishuConfig, chat_type: ChatType, chat_id: &str) -> bool {
    if chat_type.is_direct() {
        return false;
    }
    resolve_group_config(cfg, chat_id)
        .and_then(|g| g.require_mention)
        .unwrap_or(cfg.require_mention)
}

/// Mention-bypass mode for slash commands in a group.
#[must_use]
pub fn resolve_command_mention_bypass(cfg: &FeishuConfig, chat_id: &str) -> MentionBypass {
    resolve_group_config(cfg, chat_id)
        .and_then(|g| g.group_command_mention_bypass)
        .unwrap_or(cfg.group_command_mention_bypass)
}
