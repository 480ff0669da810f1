//! Mention extraction and outbound @-mention markup.
//!
//! Plain text messages and card messages use different mention syntaxes.
//! Inbound mention placeholders (`@_user_1` style keys) are stripped from
//! the message body before it reaches the agent.

/// A user to @-mention. `key` is the inbound placeholder the platform used,
/// when this target came from a received message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionTarget {
    pub open_id: String,
    pub name: Option<String>,
    pub key: Option<String>,
}

impl MentionTarget {
    #[must_use]
    pub fn new(open_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            open_id: open_id.into(),
            name,
            key: None,
        }
    }
}

/// Mention markup for a plain text message.
#[must_use]
pub fn format_mention_for_text(target: &MentionTarget) -> String {
    format!(
        "<at user_id=\"{}\">{}</at>",
        target.open_id,
        target.name.as_deref().unwrap_or("")
    )
}

/// Mention markup for a card message.
#[must_use]
pub fn format_mention_for_card(target: &MentionTarget) -> String {
    format!("<at id={}></at>", target.open_id)
}

/// Mention-everyone markup for a plain text message.
#[must_use]
pub fn format_mention_all_for_text() -> String {
    "<at user_id=\"all\">Everyone</at>".to_string()
}

/// Mention-everyone markup for a card message.
#[must_use]
pub fn format_mention_all_for_card() -> String {
    "<at id=all></at>".to_string()
}

/// Prefix `text` with text-style mention markup for each target. No targets
/// leaves the text untouched.
#[must_use]
pub fn build_mentioned_message(targets: &[MentionTarget], text: &str) -> String {
    build_prefixed(targets, text, format_mention_for_text)
}

/// Prefix `text` with card-style mention markup for each target.
#[must_use]
pub fn build_mentioned_card_content(targets: &[MentionTarget], text: &str) -> String {
    build_prefixed(targets, text, format_mention_for_card)
}

/// Strip mention placeholders from a message body and collapse the
/// surrounding whitespace.
#[must_use]
pub fn extract_message_body(text: &str, mention_keys: &[String]) -> String {
    let mut body = text.to_string();
    for key in mention_keys {
        if key.is_empty() {
            continue;
        }
        body = body.replace(key.as_str(), " ");
    }
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a message asks the bot to forward a mention to other users.
///
/// `targets` never includes the bot itself, so the trigger is the same in
/// DMs and groups: at least one other user was mentioned. A group message
/// mentioning only the bot has no targets and does not trigger forwarding,
/// whether or not the bot was mentioned alongside.
#[must_use]
pub fn is_mention_forward_request(targets: &[MentionTarget]) -> bool {
    !targets.is_empty()
}

fn build_prefixed(
    targets: &[MentionTarget],
    text: &str,
    format: impl Fn(&MentionTarget) -> String,
) -> String {
    if targets.is_empty() {
        return text.to_string();
    }
    let markup: Vec<String> = targets.iter().map(format).collect();
    format!("{} {}", markup.join(" "), text)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> MentionTarget {
        MentionTarget {
            open_id: "ou_alice".into(),
            name: Some("Alice".into()),
            key: Some("@_user_1".into()),
        }
    }

    #[test]
    fn text_and_card_markup() {
        assert_eq!(
            format_mention_for_text(&alice()),
            "<at user_id=\"ou_alice\">Alice</at>"
        );
        assert_eq!(format_mention_for_card(&alice()), "<at id=ou_alice></at>");
        assert_eq!(format_mention_all_for_text(), "<at user_id=\"all\">Everyone</at>");
        assert_eq!(format_mention_all_for_card(), "<at id=all></at>");
    }

    #[test]
    fn missing_name_keeps_empty_body() {
        let target = MentionTarget::new("ou_alice", None);
        assert_eq!(
            format_mention_for_text(&target),
            "<at user_id=\"ou_alice\"></at>"
        );
    }

    #[test]
    fn prepends_mentions_to_content() {
        let targets = vec![alice()];
        assert_eq!(
            build_mentioned_message(&targets, "hello"),
            "<at user_id=\"ou_alice\">Alice</at> hello"
        );
        assert_eq!(
            build_mentioned_card_content(&targets, "hello"),
            "<at id=ou_alice></at> hello"
        );
        assert_eq!(build_mentioned_message(&[], "hello"), "hello");
    }

    #[test]
    fn body_extraction_removes_placeholders_and_normalizes_spaces() {
        let body = extract_message_body(
            "@_user_1 hi @(x) there",
            &["@_user_1".to_string(), "@(x)".to_string()],
        );
        assert_eq!(body, "hi there");
    }

    #[test]
    fn forward_trigger_rules() {
        let targets = vec![alice()];
        // Any non-bot target triggers forwarding, bot mention not required.
        assert!(is_mention_forward_request(&targets));
        // Bot-only mentions produce no targets and never trigger it.
        assert!(!is_mention_forward_request(&[]));
    }
}
