//! Conversation list: search, selection, deletion.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::models::Conversation;
use crate::session::Session;

/// What the app shell should do after a key reaches the sidebar.
#[derive(Debug, PartialEq)]
pub enum SidebarAction {
    None,
    /// Make this conversation the selected one.
    Select(String),
    /// Delete this conversation (external call).
    Delete(String),
    /// Create a new conversation (external call).
    NewChat,
}

pub struct Sidebar {
    search: String,
    highlighted: usize,
    has_focus: bool,
}

impl Sidebar {
    pub fn new() -> Self {
        Sidebar {
            search: String::new(),
            highlighted: 0,
            has_focus: false,
        }
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Conversations in stored order, narrowed by the search query.
    fn filtered<'a>(&self, session: &'a Session) -> Vec<&'a Conversation> {
        session
            .conversations()
            .iter()
            .filter(|c| matches_search(c, &self.search))
            .collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent, session: &Session) -> SidebarAction {
        if key.kind != KeyEventKind::Press {
            return SidebarAction::None;
        }

        let visible = self.filtered(session).len();
        match key.code {
            KeyCode::Up => {
                self.highlighted = self.highlighted.saturating_sub(1);
            }
            KeyCode::Down => {
                if visible > 0 {
                    self.highlighted = (self.highlighted + 1).min(visible - 1);
                }
            }
            KeyCode::Enter => {
                if let Some(chat) = self.filtered(session).get(self.highlighted) {
                    return SidebarAction::Select(chat.id.clone());
                }
            }
            KeyCode::Delete => {
                if let Some(chat) = self.filtered(session).get(self.highlighted) {
                    return SidebarAction::Delete(chat.id.clone());
                }
            }
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return SidebarAction::NewChat;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search.push(c);
                self.highlighted = 0;
            }
            KeyCode::Backspace => {
                self.search.pop();
                self.highlighted = 0;
            }
            KeyCode::Esc => {
                self.search.clear();
                self.highlighted = 0;
            }
            _ => {}
        }

        SidebarAction::None
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer, session: &Session) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Recent Chats ")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });
        let inner = block.inner(area);
        block.render(area, buf);

        let mut y = inner.y;
        let search_line = if self.search.is_empty() {
            Line::from(Span::styled(
                "Search conversations",
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::from(vec![
                Span::styled("/ ", Style::default().fg(Color::DarkGray)),
                Span::raw(self.search.clone()),
            ])
        };
        buf.set_line(inner.x, y, &search_line, inner.width);
        y += 1;

        let filtered = self.filtered(session);
        if self.highlighted >= filtered.len() {
            self.highlighted = filtered.len().saturating_sub(1);
        }

        for (index, chat) in filtered.iter().enumerate() {
            if y + 1 >= inner.y + inner.height {
                break;
            }

            let is_selected = session.selected_id() == Some(chat.id.as_str());
            let is_highlighted = self.has_focus && index == self.highlighted;
            let mut style = Style::default();
            if is_selected {
                style = style.fg(Color::Magenta);
            }
            if is_highlighted {
                style = style.add_modifier(Modifier::REVERSED);
            }

            let mut preview: String = chat.preview().chars().take(32).collect();
            if session.sending_to(&chat.id) {
                preview.push_str(" …");
            }
            buf.set_line(inner.x, y, &Line::from(Span::styled(preview, style)), inner.width);
            y += 1;

            let age = Line::from(Span::styled(
                relative_age(chat.updated_at, Utc::now()),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x + 2, y, &age, inner.width.saturating_sub(2));
            y += 1;
        }

        // footer: credit balance
        if inner.height > 1 {
            let credits = Line::from(vec![
                Span::styled("Credits: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    session.credits().to_string(),
                    Style::default().fg(Color::Yellow),
                ),
            ]);
            buf.set_line(inner.x, inner.y + inner.height - 1, &credits, inner.width);
        }
    }
}

/// Search matches against the first message's content when the conversation
/// has one, otherwise against its name. Case-insensitive.
pub fn matches_search(chat: &Conversation, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    match chat.messages.first() {
        Some(first) => first.content.to_lowercase().contains(&query),
        None => chat.name.to_lowercase().contains(&query),
    }
}

/// Compact "how long ago" label for the conversation list.
fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    if delta.num_seconds() < 60 {
        "just now".to_string()
    } else if delta.num_minutes() < 60 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_hours() < 24 {
        format!("{}h ago", delta.num_hours())
    } else {
        format!("{}d ago", delta.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use chrono::Duration;

    fn conversation(id: &str, name: &str, first_message: Option<&str>) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: None,
            name: name.to_string(),
            messages: first_message.map(Message::user).into_iter().collect(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_prefers_first_message_over_name() {
        let chat = conversation("a", "New Chat", Some("Plan my trip to Kyoto"));
        assert!(matches_search(&chat, "kyoto"));
        // the name is not consulted once a message exists
        assert!(!matches_search(&chat, "new chat"));
    }

    #[test]
    fn search_falls_back_to_name_for_empty_conversations() {
        let chat = conversation("a", "Holiday ideas", None);
        assert!(matches_search(&chat, "holiday"));
        assert!(!matches_search(&chat, "kyoto"));
    }

    #[test]
    fn empty_query_matches_everything() {
        let chat = conversation("a", "New Chat", None);
        assert!(matches_search(&chat, ""));
    }

    #[test]
    fn relative_age_buckets() {
        let now = Utc::now();
        assert_eq!(relative_age(now - Duration::seconds(5), now), "just now");
        assert_eq!(relative_age(now - Duration::minutes(7), now), "7m ago");
        assert_eq!(relative_age(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_age(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn typing_narrows_and_enter_selects() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![
                conversation("a", "New Chat", Some("rust borrow checker")),
                conversation("b", "New Chat", Some("dinner recipes")),
            ],
            true,
        );

        let mut sidebar = Sidebar::new();
        for c in "dinner".chars() {
            sidebar.handle_key(
                KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE),
                &session,
            );
        }
        let action = sidebar.handle_key(
            KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE),
            &session,
        );
        assert_eq!(action, SidebarAction::Select("b".to_string()));
    }

    #[test]
    fn delete_targets_highlighted_conversation() {
        let mut session = Session::new();
        session.replace_conversations(
            vec![conversation("a", "New Chat", None), conversation("b", "New Chat", None)],
            true,
        );

        let mut sidebar = Sidebar::new();
        sidebar.handle_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE), &session);
        let action = sidebar.handle_key(
            KeyEvent::new(KeyCode::Delete, KeyModifiers::NONE),
            &session,
        );
        assert_eq!(action, SidebarAction::Delete("b".to_string()));
    }
}
