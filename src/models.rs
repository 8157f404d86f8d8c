use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

/// Authenticated user as returned by `/api/user/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credits: u32,
}

/// Role of a single transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry in a conversation transcript. Immutable once appended; the wire
/// timestamp is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: now_millis(),
            is_image: false,
            image_url: None,
            is_published: None,
        }
    }

    /// `is_image` is the mode the prompt was sent in, not the presence of a
    /// URL: a generated image keeps its flag even when the URL is missing.
    pub fn assistant(content: impl Into<String>, is_image: bool, image_url: Option<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: now_millis(),
            is_image,
            image_url,
            is_published: None,
        }
    }
}

/// A named conversation owned by one user, ordered most-recent-first in the
/// session list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Sidebar preview: first message content when present, else the name.
    pub fn preview(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or(self.name.as_str())
    }
}

/// Entry in the shared gallery. The published-images endpoint has shipped
/// both `id`/`_id` and `content`/`imageUrl` over time.
#[derive(Debug, Clone, Deserialize)]
pub struct GalleryImage {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(rename = "content", alias = "imageUrl")]
    pub image_url: String,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
}

/// Generation mode for an outgoing prompt. The string form doubles as the
/// request path segment (`/api/message/{mode}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChatMode {
    Text,
    Image,
}

impl ChatMode {
    pub fn toggled(self) -> Self {
        match self {
            ChatMode::Text => ChatMode::Image,
            ChatMode::Image => ChatMode::Text,
        }
    }

    pub fn profile(self) -> &'static ModeProfile {
        &MODE_PROFILES[&self]
    }

    /// Credits charged per successful send in this mode.
    pub fn cost(self) -> u32 {
        self.profile().cost
    }
}

/// Static per-mode behavior.
#[derive(Debug)]
pub struct ModeProfile {
    pub cost: u32,
    pub label: &'static str,
    pub placeholder: &'static str,
}

pub static MODE_PROFILES: Lazy<HashMap<ChatMode, ModeProfile>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        ChatMode::Text,
        ModeProfile {
            cost: 1,
            label: "Text",
            placeholder: "Type your prompt here...",
        },
    );
    map.insert(
        ChatMode::Image,
        ModeProfile {
            cost: 2,
            label: "Image",
            placeholder: "Describe the image to generate...",
        },
    );
    debug_assert_eq!(map.len(), ChatMode::iter().count());
    map
});

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
