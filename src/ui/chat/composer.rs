use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::models::ChatMode;

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter was pressed with non-blank content. The content is handed out
    /// untouched; clearing it is the submit protocol's side effect, so a
    /// rejected submit keeps what was typed.
    Submitted(String),
    None,
}

/// Prompt input for the chat view: text content plus the generation mode
/// and the gallery publish flag.
pub struct Composer {
    content: String,
    cursor: usize, // char index, not bytes
    mode: ChatMode,
    publish: bool,
    has_focus: bool,
}

impl Composer {
    pub fn new() -> Self {
        Composer {
            content: String::new(),
            cursor: 0,
            mode: ChatMode::Text,
            publish: false,
            has_focus: true,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the content, e.g. to restore a prompt after a rolled-back
    /// send.
    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.cursor = self.content.chars().count();
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    /// Publish flag; only meaningful in image mode.
    pub fn publish(&self) -> bool {
        self.publish
    }

    pub fn toggle_publish(&mut self) {
        self.publish = !self.publish;
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Handle key input. Enter submits, Shift+Enter inserts a newline.
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if !self.content.trim().is_empty() {
                    return ComposerResult::Submitted(self.content.clone());
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.content.chars().count() {
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.cursor < self.content.chars().count() {
                    self.cursor += 1;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.content.chars().count(),
            _ => {}
        }

        ComposerResult::None
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn title(&self) -> String {
        let profile = self.mode.profile();
        if self.mode == ChatMode::Image {
            let publish = if self.publish { "publish on" } else { "publish off" };
            format!(" {} · {} ({} credits) ", profile.label, publish, profile.cost)
        } else {
            format!(" {} ({} credit) ", profile.label, profile.cost)
        }
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder = Line::from(vec![Span::styled(
                self.mode.profile().placeholder,
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner.x, inner.y, &placeholder, inner.width);
        } else {
            let mut content = self.content.clone();
            if self.has_focus {
                let at = self
                    .byte_offset(self.cursor)
                    .min(content.len());
                content.insert(at, '▌');
            }

            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner.height as usize {
                    let line = Line::from(vec![Span::raw(line_text)]);
                    buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_submits_without_clearing() {
        let mut composer = Composer::new();
        type_text(&mut composer, "hello");
        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(result, ComposerResult::Submitted("hello".to_string()));
        assert_eq!(composer.content(), "hello");
    }

    #[test]
    fn enter_on_blank_content_does_nothing() {
        let mut composer = Composer::new();
        type_text(&mut composer, "   ");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::None);
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut composer = Composer::new();
        type_text(&mut composer, "a");
        let result = composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        assert_eq!(result, ComposerResult::None);
        assert_eq!(composer.content(), "a\n");
    }

    #[test]
    fn editing_handles_multibyte_content() {
        let mut composer = Composer::new();
        type_text(&mut composer, "héllo");
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "héll");
        composer.handle_key(press(KeyCode::Home));
        composer.handle_key(press(KeyCode::Delete));
        assert_eq!(composer.content(), "éll");
    }

    #[test]
    fn mode_and_publish_toggles() {
        let mut composer = Composer::new();
        assert_eq!(composer.mode(), ChatMode::Text);
        composer.toggle_mode();
        assert_eq!(composer.mode(), ChatMode::Image);
        assert!(!composer.publish());
        composer.toggle_publish();
        assert!(composer.publish());
    }
}
