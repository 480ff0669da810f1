//! Outbound target addressing.
//!
//! Delivery targets can be written as `chat:oc_x`, `user:ou_x`,
//! `open_id:ou_x` or a bare platform id. These helpers normalize the
//! written form and pick the `receive_id_type` the send API expects.

/// Identifier kind accepted by the message send API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    ChatId,
    OpenId,
    UserId,
}

impl IdType {
    /// The `receive_id_type` query value for this kind.
    #[must_use]
    pub fn as_receive_id_type(self) -> &'static str {
        match self {
            Self::ChatId => "chat_id",
            Self::OpenId => "open_id",
            Self::UserId => "user_id",
        }
    }
}

/// Infer the id kind from a bare id. `oc_` ids are chats, `ou_` ids are
/// open ids, any other plain token is a user id. Ids with separators the
/// platform never emits are rejected.
#[must_use]
pub fn detect_id_type(id: &str) -> Option<IdType> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    if id.starts_with("oc_") {
        return Some(IdType::ChatId);
    }
    if id.starts_with("ou_") {
        return Some(IdType::OpenId);
    }
    if id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Some(IdType::UserId);
    }
    None
}

/// Strip a `chat:` / `user:` / `open_id:` prefix (case-insensitive) and
/// trim. Blank input yields `None`.
#[must_use]
pub fn normalize_target(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    for prefix in ["chat:", "user:", "open_id:"] {
        if target.len() >= prefix.len() && target[..prefix.len()].eq_ignore_ascii_case(prefix) {
            let rest = target[prefix.len()..].trim();
            if rest.is_empty() {
                return None;
            }
            return Some(rest.to_string());
        }
    }
    Some(target.to_string())
}

/// Render a target in the prefixed written form. Chat ids get `chat:`,
/// open ids get `user:`, everything else stays bare.
#[must_use]
pub fn format_target(id: &str, id_type: Option<IdType>) -> String {
    match id_type.or_else(|| detect_id_type(id)) {
        Some(IdType::ChatId) => format!("chat:{id}"),
        Some(IdType::OpenId) => format!("user:{id}"),
        _ => id.to_string(),
    }
}

/// The `receive_id_type` to use when sending to a bare id.
#[must_use]
pub fn resolve_receive_id_type(id: &str) -> &'static str {
    if id.starts_with("oc_") {
        IdType::ChatId.as_receive_id_type()
    } else if id.starts_with("ou_") {
        IdType::OpenId.as_receive_id_type()
    } else {
        IdType::UserId.as_receive_id_type()
    }
}

/// Whether a string is recognizably a Feishu target: a known prefix form or
/// a bare `oc_` / `ou_` id.
#[must_use]
pub fn looks_like_feishu_id(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    lower.starts_with("chat:")
        || lower.starts_with("user:")
        || lower.starts_with("open_id:")
        || lower.starts_with("oc_")
        || lower.starts_with("ou_")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_id_types_from_prefix_and_pattern() {
        assert_eq!(detect_id_type("oc_123"), Some(IdType::ChatId));
        assert_eq!(detect_id_type("ou_123"), Some(IdType::OpenId));
        assert_eq!(detect_id_type("user_123"), Some(IdType::UserId));
        assert_eq!(detect_id_type("bad:id"), None);
    }

    #[test]
    fn normalizes_prefixes_case_insensitively() {
        assert_eq!(normalize_target(" chat:oc_1 ").as_deref(), Some("oc_1"));
        assert_eq!(normalize_target("USER:ou_1").as_deref(), Some("ou_1"));
        assert_eq!(normalize_target("open_id:ou_2").as_deref(), Some("ou_2"));
        assert_eq!(normalize_target("ou_3").as_deref(), Some("ou_3"));
        assert_eq!(normalize_target("   "), None);
        // A prefix with nothing after it is as empty as blank input.
        assert_eq!(normalize_target("chat:"), None);
        assert_eq!(normalize_target("user:  "), None);
    }

    #[test]
    fn formats_with_inferred_or_explicit_type() {
        assert_eq!(format_target("oc_1", None), "chat:oc_1");
        assert_eq!(format_target("ou_1", None), "user:ou_1");
        assert_eq!(format_target("foo", Some(IdType::ChatId)), "chat:foo");
        assert_eq!(format_target("foo", Some(IdType::OpenId)), "user:foo");
        assert_eq!(format_target("foo", None), "foo");
    }

    #[test]
    fn resolves_receive_id_type() {
        assert_eq!(resolve_receive_id_type("oc_1"), "chat_id");
        assert_eq!(resolve_receive_id_type("ou_1"), "open_id");
        assert_eq!(resolve_receive_id_type("u_1"), "user_id");
    }

    #[test]
    fn recognizes_feishu_target_strings() {
        assert!(looks_like_feishu_id("chat:oc_1"));
        assert!(looks_like_feishu_id("user:ou_1"));
        assert!(looks_like_feishu_id("open_id:ou_1"));
        assert!(looks_like_feishu_id("oc_1"));
        assert!(looks_like_feishu_id("ou_1"));
        assert!(!looks_like_feishu_id("plain-id"));
        assert!(!looks_like_feishu_id(""));
    }
}
