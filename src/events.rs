use anyhow::Result;
use std::time::{Duration, Instant};

use crate::api::AssistantReply;
use crate::models::{Conversation, GalleryImage, User};
use crate::ui::chat::SendAttempt;

/// Results of spawned network tasks, delivered back to the main loop over
/// an mpsc channel.
pub enum AppEvent {
    /// `/api/user/data` settled
    UserLoaded(Result<User>),

    /// `/api/chat/get` settled; `pin` forces selecting the most recent chat
    ConversationsLoaded { result: Result<Vec<Conversation>>, pin: bool },

    /// `/api/chat/create` settled
    ConversationCreated(Result<Conversation>),

    /// `/api/chat/delete` settled for the given conversation
    ConversationDeleted { id: String, result: Result<String> },

    /// `/api/message/{mode}` settled for an optimistic send
    SendSettled { attempt: SendAttempt, result: Result<AssistantReply> },

    /// `/api/user/published-images` settled
    ImagesLoaded(Result<Vec<GalleryImage>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-visible notification, the toast of the terminal world.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub created: Instant,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Notice {
            level,
            text: text.into(),
            created: Instant::now(),
        }
    }

    pub fn expired(&self, lifetime: Duration) -> bool {
        self.created.elapsed() >= lifetime
    }
}
