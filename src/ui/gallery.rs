//! Shared gallery of published images. Independent of the session store:
//! fetched on open, refreshed on demand.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::models::GalleryImage;

#[derive(Debug, PartialEq)]
pub enum GalleryAction {
    None,
    /// Re-fetch the feed.
    Refresh,
    /// Return to the chat screen.
    Close,
}

enum GalleryState {
    Loading,
    Loaded(Vec<GalleryImage>),
    Failed(String),
}

pub struct GalleryView {
    state: GalleryState,
    scroll: usize,
}

impl GalleryView {
    pub fn new() -> Self {
        GalleryView {
            state: GalleryState::Loading,
            scroll: 0,
        }
    }

    pub fn set_loading(&mut self) {
        self.state = GalleryState::Loading;
        self.scroll = 0;
    }

    pub fn set_result(&mut self, result: Result<Vec<GalleryImage>>) {
        self.state = match result {
            Ok(images) => GalleryState::Loaded(images),
            Err(error) => GalleryState::Failed(error.to_string()),
        };
        self.scroll = 0;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> GalleryAction {
        if key.kind != KeyEventKind::Press {
            return GalleryAction::None;
        }

        match key.code {
            KeyCode::Esc => GalleryAction::Close,
            KeyCode::Char('r') => GalleryAction::Refresh,
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                GalleryAction::None
            }
            KeyCode::Down => {
                self.scroll += 1;
                GalleryAction::None
            }
            _ => GalleryAction::None,
        }
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Community Images (r refresh · Esc back) ");
        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line> = match &self.state {
            GalleryState::Loading => vec![Line::from(Span::styled(
                "Loading images...",
                Style::default().fg(Color::DarkGray),
            ))],
            GalleryState::Failed(error) => vec![
                Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                Line::from(Span::raw("")),
                Line::from(Span::styled(
                    "Press r to retry",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            GalleryState::Loaded(images) if images.is_empty() => vec![
                Line::from(Span::raw("No images available")),
                Line::from(Span::styled(
                    "Be the first to publish a generated image!",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            GalleryState::Loaded(images) => images
                .iter()
                .flat_map(|image| {
                    let author = image.user_name.as_deref().unwrap_or("Unknown");
                    [
                        Line::from(Span::styled(
                            image.image_url.clone(),
                            Style::default().fg(Color::Cyan),
                        )),
                        Line::from(Span::styled(
                            format!("  created by {author}"),
                            Style::default().fg(Color::DarkGray),
                        )),
                        Line::from(Span::raw("")),
                    ]
                })
                .collect(),
        };

        let height = inner.height as usize;
        self.scroll = self.scroll.min(lines.len().saturating_sub(height));
        for (i, line) in lines.iter().skip(self.scroll).take(height).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}
