//! Inbound message-event parsing.
//!
//! Raw `im.message.receive_v1` payloads become a [`MessageContext`] with the
//! mention placeholders stripped, rich-text posts flattened to plain lines
//! and the bot-mention flag resolved. Parsing never fails: a malformed
//! payload degrades to an empty body so the caller drops the message instead
//! of crashing the event loop.

use {
    serde::Deserialize,
    skylark_common::ChatType,
    tracing::warn,
};

use crate::mention::{extract_message_body, MentionTarget};

/// Wire shape of a message receive event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub sender: Option<EventSender>,
    pub message: EventMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSender {
    #[serde(default)]
    pub sender_id: Option<SenderId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SenderId {
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub message_id: String,
    pub chat_id: String,
    pub chat_type: String,
    pub message_type: String,
    /// JSON-encoded payload whose shape depends on `message_type`.
    pub content: String,
    #[serde(default)]
    pub mentions: Option<Vec<EventMention>>,
    #[serde(default)]
    pub root_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMention {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<MentionId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentionId {
    #[serde(default)]
    pub open_id: Option<String>,
}

/// Normalized view of one inbound message.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    pub message_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    /// Platform message type, e.g. `text` or `post`.
    pub content_type: String,
    /// Stable sender id for routing; prefers `user_id`, falls back to the
    /// open id.
    pub sender_id: String,
    pub sender_open_id: String,
    pub sender_name: Option<String>,
    /// Message body with mention placeholders removed.
    pub content: String,
    pub mentioned_bot: bool,
    pub has_any_mention: bool,
    /// Mentioned users other than the bot.
    pub mention_targets: Vec<MentionTarget>,
    pub root_id: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Deserialize)]
struct TextContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct PostContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Vec<Vec<PostNode>>,
}

#[derive(Deserialize)]
#[serde(tag = "tag")]
enum PostNode {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "at")]
    At {
        #[serde(default)]
        open_id: Option<String>,
        #[serde(default)]
        user_name: Option<String>,
    },
    #[serde(rename = "a")]
    Link {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        href: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Parse one message event against the receiving bot's open id.
#[must_use]
pub fn parse_message_event(event: &MessageEvent, bot_open_id: &str) -> MessageContext {
    let message = &event.message;
    let sender = event
        .sender
        .as_ref()
        .and_then(|s| s.sender_id.as_ref())
        .cloned()
        .unwrap_or_default();
    let sender_open_id = sender.open_id.clone().unwrap_or_default();
    let sender_id = sender
        .user_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| sender_open_id.clone());

    let mut ctx = MessageContext {
        message_id: message.message_id.clone(),
        chat_id: message.chat_id.clone(),
        chat_type: ChatType::from_platform(&message.chat_type),
        content_type: message.message_type.clone(),
        sender_id,
        sender_open_id,
        root_id: message.root_id.clone(),
        parent_id: message.parent_id.clone(),
        ..Default::default()
    };

    let mentions = message.mentions.as_deref().unwrap_or(&[]);
    ctx.has_any_mention = !mentions.is_empty();
    ctx.mentioned_bot = mentions.iter().any(|m| mention_open_id(m) == Some(bot_open_id));
    ctx.mention_targets = mentions
        .iter()
        .filter_map(|m| {
            let open_id = mention_open_id(m)?;
            if open_id == bot_open_id {
                return None;
            }
            Some(MentionTarget {
                open_id: open_id.to_string(),
                name: m.name.clone(),
                key: m.key.clone(),
            })
        })
        .collect();

    match message.message_type.as_str() {
        "text" => parse_text(message, mentions, &mut ctx),
        "post" => parse_post(message, bot_open_id, &mut ctx),
        other => {
            warn!(message_type = other, message_id = %message.message_id,
                "unsupported message type, ignoring body");
        },
    }
    ctx
}

fn mention_open_id(mention: &EventMention) -> Option<&str> {
    mention
        .id
        .as_ref()
        .and_then(|id| id.open_id.as_deref())
        .filter(|id| !id.is_empty())
}

fn parse_text(message: &EventMessage, mentions: &[EventMention], ctx: &mut MessageContext) {
    let raw = match serde_json::from_str::<TextContent>(&message.content) {
        Ok(c) => c.text,
        Err(e) => {
            warn!(error = %e, message_id = %message.message_id, "malformed text content");
            return;
        },
    };
    let keys: Vec<String> = mentions.iter().filter_map(|m| m.key.clone()).collect();
    ctx.content = extract_message_body(&raw, &keys);
}

fn parse_post(message: &EventMessage, bot_open_id: &str, ctx: &mut MessageContext) {
    let post = match serde_json::from_str::<PostContent>(&message.content) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, message_id = %message.message_id, "malformed post content");
            return;
        },
    };

    let mut lines: Vec<String> = Vec::new();
    if let Some(title) = post.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        lines.push(title.to_string());
    }
    for row in &post.content {
        let mut parts: Vec<String> = Vec::new();
        for node in row {
            match node {
                PostNode::Text { text } => parts.push(text.clone()),
                PostNode::At { open_id, user_name } => {
                    parts.push(format!("@{}", user_name.as_deref().unwrap_or("")));
                    let Some(open_id) = open_id.as_deref().filter(|id| !id.is_empty()) else {
                        continue;
                    };
                    ctx.has_any_mention = true;
                    if open_id == bot_open_id {
                        ctx.mentioned_bot = true;
                    } else if !ctx.mention_targets.iter().any(|t| t.open_id == open_id) {
                        ctx.mention_targets.push(MentionTarget {
                            open_id: open_id.to_string(),
                            name: user_name.clone(),
                            key: None,
                        });
                    }
                },
                PostNode::Link { text, href } => {
                    if let Some(s) = text.as_deref().or(href.as_deref()) {
                        parts.push(s.to_string());
                    }
                },
                PostNode::Unknown => {},
            }
        }
        let line = parts
            .join("")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    ctx.content = lines.join("\n");
}
