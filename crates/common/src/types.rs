use serde::{Deserialize, Serialize};

/// Kind of conversation an inbound message arrived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-on-one direct message (Feishu `p2p`).
    #[serde(alias = "p2p")]
    Dm,
    /// Group chat.
    #[default]
    Group,
}

impl ChatType {
    /// Parse the platform's `chat_type` field. Unknown values are treated as
    /// group chats so access policy defaults to the stricter path.
    #[must_use]
    pub fn from_platform(raw: &str) -> Self {
        match raw {
            "p2p" => Self::Dm,
            _ => Self::Group,
        }
    }

    #[must_use]
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Dm)
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dm => write!(f, "dm"),
            Self::Group => write!(f, "group"),
        }
    }
}
