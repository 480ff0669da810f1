//! Feishu OpenAPI tool toggles.
//!
//! Each flag enables a family of document / workspace tools exposed to the
//! agent. Everything except permission management is on by default.

use serde::{Deserialize, Serialize};

/// Partial toggles as written in config. Unset fields inherit from the
/// defaults (or from the global block, for account overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolsToggles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wiki: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<bool>,
}

/// Fully resolved toggles after applying defaults and overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTools {
    pub doc: bool,
    pub wiki: bool,
    pub drive: bool,
    pub scopes: bool,
    pub perm: bool,
    pub task: bool,
}

impl Default for ResolvedTools {
    fn default() -> Self {
        Self {
            doc: true,
            wiki: true,
            drive: true,
            scopes: true,
            perm: false,
            task: true,
        }
    }
}

impl ResolvedTools {
    /// Layer partial toggle blocks over the defaults. Later layers win.
    #[must_use]
    pub fn resolve(layers: &[Option<&ToolsToggles>]) -> Self {
        let mut out = Self::default();
        for layer in layers.iter().flatten() {
            if let Some(v) = layer.doc {
                out.doc = v;
            }
            if let Some(v) = layer.wiki {
                out.wiki = v;
            }
            if let Some(v) = layer.drive {
                out.drive = v;
            }
            if let Some(v) = layer.scopes {
                out.scopes = v;
            }
            if let Some(v) = layer.perm {
                out.perm = v;
            }
            if let Some(v) = layer.task {
                out.task = v;
            }
        }
        out
    }
}
