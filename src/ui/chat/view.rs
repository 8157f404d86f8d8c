//! Chat view: drives the optimistic send protocol against the backend.
//!
//! A send moves through Idle -> Sending -> Committed | RolledBack -> Idle.
//! The optimistic user message is rendered before the network call
//! resolves; a commit lands on the stored conversation by id (never on
//! "whatever is selected now"), a rollback pops the optimistic entry and
//! restores the prompt.

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
};
use tracing::{debug, info, warn};

use crate::api::AssistantReply;
use crate::events::Notice;
use crate::models::{ChatMode, Message};
use crate::session::Session;
use crate::ui::chat::composer::{Composer, ComposerResult};
use crate::ui::chat::transcript::Transcript;

/// Everything captured at the Idle -> Sending transition. The conversation
/// id is pinned here so a selection change during the request cannot
/// redirect the outcome.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    pub conversation_id: String,
    pub prompt: String,
    pub mode: ChatMode,
    pub publish: bool,
    pub generation: u64,
    pub user_message: Message,
}

/// What the app shell should do after a key reaches the chat view.
pub enum ChatAction {
    None,
    /// Dispatch this attempt to the backend.
    Send(SendAttempt),
    /// Synchronous rejection; no state was changed.
    Notify(Notice),
}

pub struct ChatView {
    composer: Composer,
    transcript: Transcript,
    /// Conversation the transcript currently renders.
    rendered_chat: Option<String>,
}

impl ChatView {
    pub fn new() -> Self {
        ChatView {
            composer: Composer::new(),
            transcript: Transcript::new(),
            rendered_chat: None,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.composer.set_focus(has_focus);
    }

    /// Keyboard entry point. Enter goes through the same submit path as any
    /// other trigger; scrolling and mode toggles are handled here too.
    pub fn handle_key(&mut self, key: KeyEvent, session: &mut Session) -> ChatAction {
        match key.code {
            KeyCode::PageUp => {
                self.transcript.scroll_up(5);
                return ChatAction::None;
            }
            KeyCode::PageDown => {
                self.transcript.scroll_down(5);
                return ChatAction::None;
            }
            KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.composer.toggle_mode();
                return ChatAction::None;
            }
            KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.composer.toggle_publish();
                return ChatAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(_) => self.submit(session),
            ComposerResult::None => ChatAction::None,
        }
    }

    /// Idle -> Sending. Preconditions are checked in order, each with its
    /// own rejection and no state change. On success the side effects are
    /// applied together: pin the target id, clear the composer, open the
    /// send ticket, append the optimistic user message.
    pub fn submit(&mut self, session: &mut Session) -> ChatAction {
        if session.is_sending() {
            // submit is disabled while a send is in flight; a duplicate
            // optimistic message must never appear
            debug!("submit ignored, send already in flight");
            return ChatAction::None;
        }
        if session.user().is_none() {
            return ChatAction::Notify(Notice::info("Login to send message"));
        }
        let trimmed = self.composer.content().trim().to_string();
        if trimmed.is_empty() {
            return ChatAction::Notify(Notice::info("Please enter a message"));
        }
        let Some(conversation_id) = session.selected_id().map(str::to_string) else {
            return ChatAction::Notify(Notice::info("No chat selected"));
        };

        let mode = self.composer.mode();
        let publish = mode == ChatMode::Image && self.composer.publish();
        let user_message = Message::user(trimmed.clone());

        let generation = session.begin_send(&conversation_id);
        self.composer.clear();
        self.rendered_chat = Some(conversation_id.clone());
        self.transcript.push(user_message.clone());

        info!(chat = %conversation_id, mode = mode.as_ref(), generation, "send started");
        ChatAction::Send(SendAttempt {
            conversation_id,
            prompt: trimmed,
            mode,
            publish,
            generation,
            user_message,
        })
    }

    /// Sending -> Committed | RolledBack, then back to Idle. Returns the
    /// notice to show, if any.
    pub fn apply_send_result(
        &mut self,
        session: &mut Session,
        attempt: SendAttempt,
        result: Result<AssistantReply>,
    ) -> Option<Notice> {
        let notice = match result {
            Ok(reply) => {
                self.commit(session, &attempt, reply);
                None
            }
            Err(error) => {
                warn!(chat = %attempt.conversation_id, %error, "send rolled back");
                self.composer.set_content(&attempt.prompt);
                // pop only when the last rendered entry is the optimistic
                // message itself: navigating away and back re-syncs the
                // transcript from the stored copy, which never contained it
                if self.rendered_chat.as_deref() == Some(&attempt.conversation_id)
                    && self.transcript.messages().last().is_some_and(|last| {
                        last.timestamp == attempt.user_message.timestamp
                            && last.content == attempt.user_message.content
                    })
                {
                    self.transcript.pop_last();
                }
                Some(Notice::error(error.to_string()))
            }
        };
        session.finish_send(attempt.generation);
        notice
    }

    fn commit(&mut self, session: &mut Session, attempt: &SendAttempt, reply: AssistantReply) {
        let is_image = attempt.mode == ChatMode::Image;
        let assistant = Message::assistant(
            reply.content,
            is_image,
            if is_image { reply.image_url } else { None },
        );

        // transcript for the stored conversation, not the rendered one: the
        // user may have navigated away while the request was in flight
        let Some(stored) = session.conversation(&attempt.conversation_id) else {
            warn!(chat = %attempt.conversation_id, "commit target deleted mid-flight");
            return;
        };
        let mut messages = stored.messages.clone();
        messages.push(attempt.user_message.clone());
        messages.push(assistant);

        session.upsert_conversation(&attempt.conversation_id, messages.clone(), Utc::now());
        session.debit_credits(attempt.mode.cost());

        if self.rendered_chat.as_deref() == Some(&attempt.conversation_id) {
            self.transcript.set_messages(messages);
        }
        info!(chat = %attempt.conversation_id, generation = attempt.generation, "send committed");
    }

    /// Selection-change effect: swap the transcript for the newly selected
    /// conversation's stored messages, but only when the id actually
    /// changed, so an in-flight optimistic append is not discarded.
    pub fn sync_selection(&mut self, session: &Session) {
        match session.selected_id() {
            Some(id) => {
                if self.rendered_chat.as_deref() != Some(id) {
                    let messages = session
                        .conversation(id)
                        .map(|c| c.messages.clone())
                        .unwrap_or_default();
                    self.rendered_chat = Some(id.to_string());
                    self.transcript.set_messages(messages);
                }
            }
            None => {
                if self.rendered_chat.is_some() {
                    self.rendered_chat = None;
                    self.transcript.set_messages(Vec::new());
                }
            }
        }
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(4)])
            .split(area);

        let sending = self
            .rendered_chat
            .as_deref()
            .is_some_and(|id| session.sending_to(id));
        self.transcript.render(chunks[0], buf, sending);
        ratatui::widgets::Widget::render(&self.composer, chunks[1], buf);
    }
}
