//! Transcript display for the selected conversation.

use chrono::{TimeZone, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::models::{Message, MessageRole};

/// Renders the selected conversation's messages and keeps the view pinned
/// to the bottom as the transcript grows.
pub struct Transcript {
    messages: Vec<Message>,
    /// Lines scrolled up from the bottom; 0 means following new messages.
    scroll_from_bottom: usize,
    /// Message count at the last render. A count change re-engages follow
    /// mode exactly once, however many appends happened since the last
    /// frame.
    rendered_len: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript {
            messages: Vec::new(),
            scroll_from_bottom: 0,
            rendered_len: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Replace the whole transcript (selection change or committed send).
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Append the optimistic user message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove the optimistic user message after a rolled-back send.
    pub fn pop_last(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom += lines;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer, sending: bool) {
        // auto-scroll: one follow re-engagement per count change
        if self.messages.len() != self.rendered_len {
            self.rendered_len = self.messages.len();
            self.scroll_from_bottom = 0;
        }

        let block = Block::default().borders(Borders::ALL).title(" Conversation ");
        let inner = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() && !sending {
            let welcome = [
                Line::from(Span::styled("quickGPT", Style::default().fg(Color::Magenta))),
                Line::from(Span::raw("")),
                Line::from(Span::styled(
                    "Ask me anything",
                    Style::default().fg(Color::Gray),
                )),
            ];
            for (i, line) in welcome.iter().enumerate() {
                if i < inner.height as usize {
                    buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
                }
            }
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for message in &self.messages {
            all_lines.extend(render_message(message, inner.width));
            all_lines.push(Line::from(Span::raw("")));
        }

        if sending {
            all_lines.push(Line::from(Span::styled(
                "· · ·",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let height = inner.height as usize;
        let total = all_lines.len();
        let offset = self.scroll_from_bottom.min(total.saturating_sub(height));
        self.scroll_from_bottom = offset;
        let end = total - offset;
        let start = end.saturating_sub(height);
        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

fn render_message(message: &Message, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (who, style) = match message.role {
        MessageRole::User => ("you", Style::default().fg(Color::Blue)),
        MessageRole::Assistant => ("quickgpt", Style::default().fg(Color::Green)),
    };

    let when = Utc
        .timestamp_millis_opt(message.timestamp)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    lines.push(Line::from(Span::styled(
        format!("{who} {when} {}", "─".repeat(16)),
        Style::default().fg(Color::DarkGray),
    )));

    if message.is_image {
        let url = message
            .image_url
            .as_deref()
            .unwrap_or(message.content.as_str());
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled("[image] ", Style::default().fg(Color::Yellow)),
            Span::styled(url.to_string(), style),
        ]));
        return lines;
    }

    for content_line in wrap_text(&message.content, width.saturating_sub(2) as usize) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content_line, style),
        ]));
    }

    lines
}

/// Wrap text to fit within the given width
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.len() + word.len() + 1 <= width || current_line.is_empty() {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_text_breaks_long_lines() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn wrap_text_keeps_explicit_newlines() {
        let wrapped = wrap_text("line one\nline two", 40);
        assert_eq!(wrapped, vec!["line one", "line two"]);
    }

    #[test]
    fn append_reengages_follow_after_manual_scroll() {
        let mut transcript = Transcript::new();
        transcript.set_messages(vec![Message::user("a"), Message::user("b")]);
        let area = Rect::new(0, 0, 40, 6);
        let mut buf = Buffer::empty(area);
        transcript.render(area, &mut buf, false);

        transcript.scroll_up(3);
        transcript.push(Message::user("c"));
        transcript.push(Message::user("d"));
        let mut buf = Buffer::empty(area);
        transcript.render(area, &mut buf, false);
        // two appends coalesced into one jump back to the bottom
        assert_eq!(transcript.scroll_from_bottom, 0);
    }

    #[test]
    fn pop_last_removes_optimistic_entry() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("keep"));
        transcript.push(Message::user("optimistic"));
        let popped = transcript.pop_last().unwrap();
        assert_eq!(popped.content, "optimistic");
        assert_eq!(transcript.len(), 1);
    }
}
