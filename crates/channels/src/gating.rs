use serde::{Deserialize, Serialize};

/// DM access policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DmPolicy {
    /// Unknown senders receive a pairing code and must be approved
    /// out-of-band before messages are routed.
    #[default]
    Pairing,
    /// Only senders on the allowlist.
    Allowlist,
    /// Anyone can DM the bot. Valid only with an explicit `*` allowlist
    /// entry.
    Open,
}

/// Group access policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Only groups on the allowlist.
    #[default]
    Allowlist,
    /// Bot responds in all groups.
    Open,
    /// Groups disabled.
    Disabled,
}

/// When a command-style message may bypass the group mention requirement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MentionBypass {
    /// Commands always bypass the mention requirement.
    Always,
    /// Commands never bypass it.
    Never,
    /// Commands bypass it only when this bot is the sole integration
    /// addressed in the message.
    #[default]
    SingleBot,
}
