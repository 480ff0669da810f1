//! Feishu/Lark channel plugin for skylark.
//!
//! Receives pre-parsed message events from the host transport, decides
//! whether the sender is admitted (pairing / allowlist / open policy plus
//! group mention rules), resolves which account and agent should handle the
//! message, provisions per-user dynamic agents on demand, and hands the
//! message off to the session system.

pub mod accounts;
pub mod config;
pub mod dispatch;
pub mod dynamic_agent;
pub mod error;
pub mod gate;
pub mod markdown;
pub mod mention;
pub mod parser;
pub mod plugin;
pub mod policy;
pub mod state;
pub mod targets;
pub mod tools;

pub use {
    accounts::{resolve_account, ResolvedAccount, DEFAULT_ACCOUNT_ID},
    config::{FeishuAccountConfig, FeishuConfig},
    dispatch::{handle_message, DispatchDeps, DispatchOutcome},
    parser::{parse_message_event, MessageContext, MessageEvent},
    plugin::FeishuPlugin,
};

/// Channel identifier used in config, bindings, and pairing-store scopes.
pub const CHANNEL_ID: &str = "feishu";
