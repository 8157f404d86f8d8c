//! Application shell: terminal lifecycle, event loop, background refresh,
//! and dispatch of network tasks.

use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend, layout::{Constraint, Direction, Layout}};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::events::{AppEvent, Notice, NoticeLevel};
use crate::session::{ListOutcome, Session};
use crate::ui::chat::{ChatAction, ChatView, SendAttempt};
use crate::ui::gallery::{GalleryAction, GalleryView};
use crate::ui::sidebar::{Sidebar, SidebarAction};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Chat,
    Gallery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Sidebar,
    Composer,
}

/// One iteration of the event loop, resolved before any state changes.
enum Turn {
    Terminal(Option<io::Result<Event>>),
    Task(Option<AppEvent>),
    Refresh,
    Redraw,
}

pub struct App {
    config: Config,
    /// None while unauthenticated; data fetches are suppressed.
    api: Option<ApiClient>,
    session: Session,
    sidebar: Sidebar,
    chat: ChatView,
    gallery: GalleryView,
    screen: Screen,
    focus: Focus,
    notices: Vec<Notice>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, token: Option<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let api = token.map(|token| ApiClient::new(config.server_url.clone(), token));

        let mut chat = ChatView::new();
        chat.set_focus(true);

        App {
            config,
            api,
            session: Session::new(),
            sidebar: Sidebar::new(),
            chat,
            gallery: GalleryView::new(),
            screen: Screen::Chat,
            focus: Focus::Composer,
            notices: Vec::new(),
            events_tx,
            events_rx,
            should_quit: false,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        install_panic_hook();

        if self.api.is_some() {
            self.spawn_fetch_user();
        } else {
            self.push_notice(Notice::info("Not logged in. Run `quickgpt login` first."));
        }

        let mut reader = EventStream::new();
        let mut refresh = tokio::time::interval(Duration::from_secs(
            self.config.ui.refresh_interval_secs.max(5),
        ));
        refresh.tick().await; // the first tick fires immediately
        let mut redraw = tokio::time::interval(Duration::from_millis(250));

        while !self.should_quit {
            self.draw(&mut terminal)?;

            // resolve the select into a plain value first so no branch
            // future is still borrowing self when the handler runs
            let turn = tokio::select! {
                maybe_event = reader.next() => Turn::Terminal(maybe_event),
                event = self.events_rx.recv() => Turn::Task(event),
                _ = refresh.tick() => Turn::Refresh,
                _ = redraw.tick() => Turn::Redraw,
            };

            match turn {
                Turn::Terminal(Some(Ok(Event::Key(key)))) => {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
                Turn::Terminal(_) => {}
                Turn::Task(Some(event)) => self.handle_app_event(event),
                Turn::Task(None) => break,
                Turn::Refresh => {
                    // background refresh; replace_conversations decides how
                    // it interacts with an in-flight send
                    if self.session.user().is_some() {
                        self.spawn_fetch_conversations(false);
                    }
                }
                Turn::Redraw => self.prune_notices(),
            }
        }

        restore_terminal()?;
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // global bindings first
        match key.code {
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('g') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.open_gallery();
                return;
            }
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.config.toggle_theme();
                if let Err(error) = self.config.save() {
                    warn!(%error, "failed to persist theme preference");
                }
                return;
            }
            _ => {}
        }

        if self.screen == Screen::Gallery {
            match self.gallery.handle_key(key) {
                GalleryAction::Refresh => self.open_gallery(),
                GalleryAction::Close => self.screen = Screen::Chat,
                GalleryAction::None => {}
            }
            return;
        }

        if key.code == KeyCode::Tab {
            self.focus = match self.focus {
                Focus::Sidebar => Focus::Composer,
                Focus::Composer => Focus::Sidebar,
            };
            self.sidebar.set_focus(self.focus == Focus::Sidebar);
            self.chat.set_focus(self.focus == Focus::Composer);
            return;
        }

        match self.focus {
            Focus::Sidebar => match self.sidebar.handle_key(key, &self.session) {
                SidebarAction::Select(id) => {
                    self.session.select(&id);
                    self.chat.sync_selection(&self.session);
                }
                SidebarAction::Delete(id) => self.spawn_delete_conversation(id),
                SidebarAction::NewChat => self.spawn_create_conversation(),
                SidebarAction::None => {}
            },
            Focus::Composer => match self.chat.handle_key(key, &mut self.session) {
                ChatAction::Send(attempt) => self.spawn_send(attempt),
                ChatAction::Notify(notice) => self.push_notice(notice),
                ChatAction::None => {}
            },
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::UserLoaded(Ok(user)) => {
                info!(name = %user.name, credits = user.credits, "user loaded");
                self.session.set_user(Some(user));
                // first load pins the most recent conversation
                self.spawn_fetch_conversations(true);
            }
            AppEvent::UserLoaded(Err(error)) => {
                self.push_notice(Notice::error(error.to_string()));
            }
            AppEvent::ConversationsLoaded { result: Ok(chats), pin } => {
                match self.session.replace_conversations(chats, pin) {
                    ListOutcome::NeedsConversation => self.spawn_create_conversation(),
                    ListOutcome::Installed => self.chat.sync_selection(&self.session),
                }
            }
            AppEvent::ConversationsLoaded { result: Err(error), .. } => {
                // no automatic retry; the next interval or a manual action
                // refetches
                self.push_notice(Notice::error(error.to_string()));
            }
            AppEvent::ConversationCreated(Ok(chat)) => {
                self.session.adopt_conversation(chat);
                self.chat.sync_selection(&self.session);
            }
            AppEvent::ConversationCreated(Err(error)) => {
                self.push_notice(Notice::error(error.to_string()));
            }
            AppEvent::ConversationDeleted { id, result: Ok(message) } => {
                self.session.remove_conversation(&id);
                self.chat.sync_selection(&self.session);
                self.push_notice(Notice::success(message));
                self.spawn_fetch_conversations(false);
            }
            AppEvent::ConversationDeleted { result: Err(error), .. } => {
                self.push_notice(Notice::error(error.to_string()));
            }
            AppEvent::SendSettled { attempt, result } => {
                if let Some(notice) =
                    self.chat.apply_send_result(&mut self.session, attempt, result)
                {
                    self.push_notice(notice);
                }
            }
            AppEvent::ImagesLoaded(result) => {
                self.gallery.set_result(result);
            }
        }
    }

    fn open_gallery(&mut self) {
        let Some(api) = self.api.clone() else {
            self.push_notice(Notice::info("Login to browse community images"));
            return;
        };
        self.screen = Screen::Gallery;
        self.gallery.set_loading();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_published_images().await;
            let _ = tx.send(AppEvent::ImagesLoaded(result));
        });
    }

    fn spawn_fetch_user(&self) {
        let Some(api) = self.api.clone() else { return };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_user().await;
            let _ = tx.send(AppEvent::UserLoaded(result));
        });
    }

    fn spawn_fetch_conversations(&self, pin: bool) {
        let Some(api) = self.api.clone() else { return };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_conversations().await;
            let _ = tx.send(AppEvent::ConversationsLoaded { result, pin });
        });
    }

    fn spawn_create_conversation(&mut self) {
        let Some(api) = self.api.clone() else {
            self.push_notice(Notice::info("Login to create a new chat"));
            return;
        };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.create_conversation().await;
            let _ = tx.send(AppEvent::ConversationCreated(result));
        });
    }

    fn spawn_delete_conversation(&self, id: String) {
        let Some(api) = self.api.clone() else { return };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.delete_conversation(&id).await;
            let _ = tx.send(AppEvent::ConversationDeleted { id, result });
        });
    }

    fn spawn_send(&self, attempt: SendAttempt) {
        let Some(api) = self.api.clone() else {
            error!("send dispatched without an authenticated client");
            return;
        };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api
                .send_message(
                    &attempt.conversation_id,
                    &attempt.prompt,
                    attempt.mode,
                    attempt.publish,
                )
                .await;
            let _ = tx.send(AppEvent::SendSettled { attempt, result });
        });
    }

    fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > 8 {
            self.notices.remove(0);
        }
    }

    fn prune_notices(&mut self) {
        let lifetime = Duration::from_millis(self.config.ui.notice_duration_ms);
        self.notices.retain(|n| !n.expired(lifetime));
    }

    fn draw(&mut self, terminal: &mut Tui) -> Result<()> {
        terminal.draw(|frame| {
            let area = frame.size();
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(5), Constraint::Length(1)])
                .split(area);

            let buf = frame.buffer_mut();
            let base = if self.config.dark_theme() {
                ratatui::style::Style::default()
                    .fg(ratatui::style::Color::White)
                    .bg(ratatui::style::Color::Reset)
            } else {
                ratatui::style::Style::default()
                    .fg(ratatui::style::Color::Black)
                    .bg(ratatui::style::Color::White)
            };
            buf.set_style(area, base);
            match self.screen {
                Screen::Chat => {
                    let columns = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints([Constraint::Length(32), Constraint::Min(20)])
                        .split(rows[0]);
                    self.sidebar.render(columns[0], buf, &self.session);
                    self.chat.render(columns[1], buf, &self.session);
                }
                Screen::Gallery => {
                    self.gallery.render(rows[0], buf);
                }
            }

            let status = match self.notices.last() {
                Some(notice) => {
                    let color = match notice.level {
                        NoticeLevel::Info => ratatui::style::Color::Cyan,
                        NoticeLevel::Success => ratatui::style::Color::Green,
                        NoticeLevel::Error => ratatui::style::Color::Red,
                    };
                    ratatui::text::Line::from(ratatui::text::Span::styled(
                        notice.text.clone(),
                        ratatui::style::Style::default().fg(color),
                    ))
                }
                None => ratatui::text::Line::from(ratatui::text::Span::styled(
                    "Tab focus · Ctrl+T mode · Ctrl+P publish · Ctrl+N new chat · Ctrl+G gallery · Ctrl+Q quit",
                    ratatui::style::Style::default().fg(ratatui::style::Color::DarkGray),
                )),
            };
            buf.set_line(rows[1].x, rows[1].y, &status, rows[1].width);
        })?;
        Ok(())
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stderr());
    Ok(Terminal::new(backend)?)
}

fn restore_terminal() -> Result<()> {
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Restore the terminal before the default panic output, or the message is
/// lost to the alternate screen.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}
