use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;

use suitedeck_core::{
    boot_effects, reduce, EntryKind, EnvironmentCheck, NoticeLevel, PanelAction, PanelEffect,
    PanelState, RunStatus, RuntimeAction, SelectionPhase, SourceView, StreamPhase, UserAction,
};
use suitedeck_exec::{perform, ConsoleBackend, HttpBackend};

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

pub fn run(
    backend: HttpBackend,
    state: PanelState,
    chunk_bytes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let _guard = TuiGuard;

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let mut app = App {
        backend,
        state,
        chunk_bytes,
        cursor: ListState::default(),
        opened_log: None,
        viewer: Viewer::Source,
    };
    run_app(&mut terminal, &mut app).map_err(|e| e.into())
}

enum UiEvent {
    Runtime(RuntimeAction),
    /// A host effect raised by a follow-up reduction on the worker side.
    Host(PanelEffect),
}

/// What the viewer pane shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Viewer {
    Source,
    Environment,
}

impl Viewer {
    fn toggled(self) -> Self {
        match self {
            Self::Source => Self::Environment,
            Self::Environment => Self::Source,
        }
    }
}

struct App {
    backend: HttpBackend,
    state: PanelState,
    chunk_bytes: usize,
    cursor: ListState,
    /// Resolved url of the last log the console offered.
    opened_log: Option<String>,
    viewer: Viewer,
}

impl App {
    fn selected_entry(&self) -> Option<&suitedeck_core::TreeEntry> {
        self.cursor
            .selected()
            .and_then(|idx| self.state.listing.entries.get(idx))
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.state.listing.entries.len();
        if len == 0 {
            self.cursor.select(None);
            return;
        }
        let current = self.cursor.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.cursor.select(Some(next as usize));
    }

    /// Backend work runs off the UI thread; results come back over `tx`.
    fn spawn_effect(&mut self, effect: PanelEffect, tx: &mpsc::Sender<UiEvent>) {
        match effect {
            PanelEffect::OpenLog { locator } => {
                let url = self.backend.resolve_locator(&locator);
                tracing::info!(%url, "log available");
                self.opened_log = Some(url);
            }
            PanelEffect::CopyToClipboard(locator) => {
                let url = self.backend.resolve_locator(&locator);
                let copied = arboard::Clipboard::new()
                    .and_then(|mut clipboard| clipboard.set_text(url.clone()))
                    .is_ok();
                let notice = if copied {
                    suitedeck_core::Notice::new(NoticeLevel::Info, format!("Copied {url}"))
                } else {
                    suitedeck_core::Notice::new(NoticeLevel::Warn, "Clipboard unavailable.")
                };
                self.state.raise(notice);
            }
            effect => {
                let backend = self.backend.clone();
                let gate = self.state.gate.clone();
                let chunk_bytes = self.chunk_bytes;
                let tx = tx.clone();
                thread::spawn(move || {
                    let forward = |action| {
                        let _ = tx.send(UiEvent::Runtime(action));
                    };
                    if let Some(host) = perform(&backend, &gate, chunk_bytes, effect, forward) {
                        let _ = tx.send(UiEvent::Host(host));
                    }
                });
            }
        }
    }

    fn apply(&mut self, action: PanelAction, tx: &mpsc::Sender<UiEvent>) {
        let listing_before = self.state.listing.path.clone();
        for effect in reduce(&mut self.state, action) {
            self.spawn_effect(effect, tx);
        }
        if self.state.listing.path != listing_before {
            self.cursor.select(None);
        }
        if self.cursor.selected().is_none() && !self.state.listing.entries.is_empty() {
            self.cursor.select(Some(0));
        }
    }

    fn cycle_root(&mut self, tx: &mpsc::Sender<UiEvent>) {
        let roots: Vec<_> = self.state.roots.iter().filter(|root| !root.is_extra).collect();
        if roots.is_empty() {
            return;
        }
        let idx = roots
            .iter()
            .position(|root| root.rel == self.state.selection.root)
            .map(|pos| (pos + 1) % roots.len())
            .unwrap_or(0);
        let next = roots[idx].rel.to_string();
        self.apply(PanelAction::User(UserAction::RootChanged(next)), tx);
    }

    fn cycle_tag(&mut self, tx: &mpsc::Sender<UiEvent>) {
        let selection = &self.state.selection;
        let next = selection
            .available_tags
            .next_after(selection.selected_tag.as_deref())
            .map(str::to_string);
        if let Some(tag) = next {
            self.apply(PanelAction::User(UserAction::TagChanged(tag)), tx);
        }
    }
}

enum KeyHandlerResult {
    Continue,
    Exit,
}

fn handle_key(key: event::KeyEvent, app: &mut App, tx: &mpsc::Sender<UiEvent>) -> KeyHandlerResult {
    if key.kind != KeyEventKind::Press {
        return KeyHandlerResult::Continue;
    }
    let user = |action| PanelAction::User(action);
    match key.code {
        KeyCode::Char('q') => return KeyHandlerResult::Exit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyHandlerResult::Exit
        }
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
        KeyCode::Enter => {
            let picked = app
                .selected_entry()
                .map(|entry| (entry.kind, UserAction::for_entry(entry)));
            if let Some((kind, action)) = picked {
                if kind == EntryKind::File {
                    app.viewer = Viewer::Source;
                }
                app.apply(user(action), tx);
            }
        }
        KeyCode::Backspace | KeyCode::Char('h') => app.apply(user(UserAction::NavigateUp), tx),
        KeyCode::Tab => app.cycle_root(tx),
        KeyCode::Char('t') => app.cycle_tag(tx),
        KeyCode::Char('r') => app.apply(user(UserAction::RunRequested), tx),
        KeyCode::Char('g') => app.apply(user(UserAction::RegressionRequested), tx),
        KeyCode::Char('i') => app.apply(user(UserAction::InstallRequested), tx),
        KeyCode::Char('l') => app.apply(user(UserAction::OpenLastLog), tx),
        KeyCode::Char('c') => app.apply(user(UserAction::CopyLastLog), tx),
        KeyCode::Char('e') => {
            app.viewer = Viewer::Environment;
            app.apply(user(UserAction::CheckEnvironmentRequested), tx);
        }
        KeyCode::Char('v') => app.viewer = app.viewer.toggled(),
        KeyCode::Esc => app.apply(user(UserAction::DismissNotice), tx),
        _ => {}
    }
    KeyHandlerResult::Continue
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let (tx, rx) = mpsc::channel();
    for effect in boot_effects() {
        app.spawn_effect(effect, &tx);
    }

    loop {
        while let Ok(event) = rx.try_recv() {
            match event {
                UiEvent::Runtime(action) => app.apply(PanelAction::Runtime(action), &tx),
                UiEvent::Host(effect) => app.spawn_effect(effect, &tx),
            }
        }

        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if let KeyHandlerResult::Exit = handle_key(key, app, &tx) {
                    return Ok(());
                }
            }
        }
    }
}

struct UiPalette {
    accent: Color,
    muted: Color,
    ok: Color,
    warning: Color,
    error: Color,
    border: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Cyan,
    muted: Color::DarkGray,
    ok: Color::Green,
    warning: Color::Yellow,
    error: Color::Red,
    border: Color::Gray,
};

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title(title)
}

fn ui(f: &mut ratatui::Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, rows[0], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[1]);
    render_tree(f, columns[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Percentage(45),
            Constraint::Min(4),
        ])
        .split(columns[1]);
    render_selection(f, right[0], &app.state);
    render_viewer(f, right[1], app);
    render_console(f, right[2], &app.state);

    render_notice(f, rows[2], app);
    render_action_bar(f, rows[3]);
}

fn render_header(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let state = &app.state;
    let run = match state.run {
        RunStatus::InFlight { .. } => {
            Span::styled("running", Style::default().fg(PALETTE.warning))
        }
        RunStatus::Detached { .. } => Span::styled(
            "running (previous root)",
            Style::default().fg(PALETTE.warning),
        ),
        RunStatus::Idle => Span::styled("idle", Style::default().fg(PALETTE.muted)),
    };
    let line = Line::from(vec![
        Span::styled("root ", Style::default().fg(PALETTE.muted)),
        Span::styled(
            state.selection.root.to_string(),
            Style::default().fg(PALETTE.accent),
        ),
        Span::styled("  dir ", Style::default().fg(PALETTE.muted)),
        Span::raw(state.selection.current_directory.to_string()),
        Span::styled("  run ", Style::default().fg(PALETTE.muted)),
        run,
        Span::styled("  backend ", Style::default().fg(PALETTE.muted)),
        Span::raw(app.backend.base_url().to_string()),
    ]);
    f.render_widget(Paragraph::new(line).block(panel("suitedeck")), area);
}

fn render_tree(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let gate = &app.state.gate;
    let items: Vec<ListItem> = app
        .state
        .listing
        .entries
        .iter()
        .map(|entry| {
            let (prefix, style) = match entry.kind {
                EntryKind::Directory => ("▸ ", Style::default().fg(PALETTE.accent)),
                EntryKind::File if gate.is_runnable(&entry.rel) => {
                    ("● ", Style::default().fg(PALETTE.ok))
                }
                EntryKind::File => ("  ", Style::default()),
            };
            ListItem::new(Line::from(vec![
                Span::styled(prefix, style),
                Span::styled(entry.name.clone(), style),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(panel("Tree"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, area, &mut app.cursor);
}

fn render_selection(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let selection = &state.selection;
    let file = selection
        .selected_file
        .as_ref()
        .map(|file| file.to_string())
        .unwrap_or_else(|| "-".to_string());
    let phase_color = match selection.phase {
        SelectionPhase::FileSelectedRunnableWithTag => PALETTE.ok,
        SelectionPhase::FileSelectedRunnableNoTag => PALETTE.warning,
        _ => PALETTE.muted,
    };

    let mut tags = vec![Span::styled("tags  ", Style::default().fg(PALETTE.muted))];
    if selection.tags_pending {
        tags.push(Span::styled("loading…", Style::default().fg(PALETTE.muted)));
    }
    for tag in selection.available_tags.iter() {
        let style = if selection.selected_tag.as_deref() == Some(tag) {
            Style::default()
                .fg(PALETTE.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        tags.push(Span::styled(tag.to_string(), style));
        tags.push(Span::raw(" "));
    }

    let run_label = if state.run_action_enabled() {
        Span::styled("enabled", Style::default().fg(PALETTE.ok))
    } else {
        Span::styled("disabled", Style::default().fg(PALETTE.muted))
    };
    let last = match &state.last_run {
        Some(record) => format!(
            "{} rc={}",
            record.run_id.as_deref().unwrap_or("?"),
            record
                .returncode
                .map(|rc| rc.to_string())
                .unwrap_or_else(|| "?".to_string())
        ),
        None => "-".to_string(),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("file  ", Style::default().fg(PALETTE.muted)),
            Span::raw(file),
        ]),
        Line::from(vec![
            Span::styled("state ", Style::default().fg(PALETTE.muted)),
            Span::styled(selection.phase.label(), Style::default().fg(phase_color)),
        ]),
        Line::from(tags),
        Line::from(vec![
            Span::styled("run   ", Style::default().fg(PALETTE.muted)),
            run_label,
        ]),
        Line::from(vec![
            Span::styled("last  ", Style::default().fg(PALETTE.muted)),
            Span::raw(last),
        ]),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .block(panel("Selection"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn viewer_lines(app: &App) -> (String, Vec<Line<'static>>) {
    let muted = |text: &str| vec![Line::styled(text.to_string(), Style::default().fg(PALETTE.muted))];
    match app.viewer {
        Viewer::Source => match app.state.source.as_ref() {
            None => ("File".to_string(), muted("Select a file to read it.")),
            Some(source) => {
                let title = format!("File: {}", source.file);
                let lines = match &source.view {
                    SourceView::Loading => muted("loading…"),
                    SourceView::Loaded(text) => {
                        text.lines().map(|line| Line::raw(line.to_string())).collect()
                    }
                    SourceView::Failed(message) => vec![Line::styled(
                        message.clone(),
                        Style::default().fg(PALETTE.error),
                    )],
                };
                (title, lines)
            }
        },
        Viewer::Environment => {
            let title = "Environment".to_string();
            match app.state.environment.as_ref() {
                None => (title, muted("Press e to check the backend environment.")),
                Some(EnvironmentCheck::Pending) => (title, muted("checking…")),
                Some(EnvironmentCheck::Failed(message)) => (
                    title,
                    vec![Line::styled(message.clone(), Style::default().fg(PALETTE.error))],
                ),
                Some(EnvironmentCheck::Ready(report)) => {
                    let headline = if report.ok { PALETTE.ok } else { PALETTE.warning };
                    let lines = report
                        .lines()
                        .into_iter()
                        .enumerate()
                        .map(|(idx, line)| {
                            if idx == 0 {
                                Line::styled(line, Style::default().fg(headline))
                            } else {
                                Line::raw(line)
                            }
                        })
                        .collect();
                    (title, lines)
                }
            }
        }
    }
}

fn render_viewer(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let (title, lines) = viewer_lines(app);
    f.render_widget(
        Paragraph::new(lines)
            .block(panel(&title))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_console(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let Some(console) = state.console.as_ref() else {
        f.render_widget(
            Paragraph::new("No stream yet. g runs regression, i installs requirements.")
                .style(Style::default().fg(PALETTE.muted))
                .block(panel("Console")),
            area,
        );
        return;
    };

    let mut title = format!("Console: {} ({})", console.kind.label(), console.phase.label());
    if let Some(count) = console.advisory_count {
        title.push_str(&format!(" {count} suites"));
    }
    let height = area.height.saturating_sub(2) as usize;
    let skip = console.buffer.len().saturating_sub(height);
    let lines: Vec<Line> = console
        .buffer
        .iter()
        .skip(skip)
        .map(|line| Line::raw(line.text.clone()))
        .collect();
    let border = match console.phase {
        StreamPhase::Failed { .. } => PALETTE.error,
        StreamPhase::Streaming | StreamPhase::Finalizing => PALETTE.warning,
        _ => PALETTE.border,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_notice(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let line = match (&app.state.notice, &app.opened_log) {
        (Some(notice), _) => {
            let color = match notice.level {
                NoticeLevel::Info => PALETTE.accent,
                NoticeLevel::Hint => PALETTE.ok,
                NoticeLevel::Warn => PALETTE.warning,
                NoticeLevel::Error => PALETTE.error,
            };
            let raised = notice.raised_at.with_timezone(&chrono::Local);
            Line::from(vec![
                Span::styled(
                    format!("{} ", raised.format("%H:%M:%S")),
                    Style::default().fg(PALETTE.muted),
                ),
                Span::styled(
                    format!("{} ", notice.level.label()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(notice.message.clone()),
            ])
        }
        (None, Some(url)) => Line::from(vec![
            Span::styled("log ", Style::default().fg(PALETTE.muted)),
            Span::raw(url.clone()),
        ]),
        (None, None) => Line::raw(""),
    };
    f.render_widget(Paragraph::new(line).block(panel("Notice")), area);
}

fn render_action_bar(f: &mut ratatui::Frame, area: Rect) {
    let keys = [
        ("↑↓", "move"),
        ("enter", "open"),
        ("h", "up"),
        ("tab", "root"),
        ("t", "tag"),
        ("r", "run"),
        ("g", "regression"),
        ("i", "install"),
        ("l", "log"),
        ("c", "copy log"),
        ("e", "check env"),
        ("v", "file/env"),
        ("esc", "dismiss"),
        ("q", "quit"),
    ];
    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(key, Style::default().fg(PALETTE.accent)));
        spans.push(Span::styled(
            format!(" {label}  "),
            Style::default().fg(PALETTE.muted),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).block(panel("Keys")), area);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use suitedeck_core::{BackendConfig, DirectoryListing, FileIdentity, Gate, RootEntry, TreeEntry};

    use super::*;

    fn app() -> App {
        App {
            backend: HttpBackend::new(&BackendConfig::default()).expect("client"),
            state: PanelState::new(Gate::default()),
            chunk_bytes: 64,
            cursor: ListState::default(),
            opened_log: None,
            viewer: Viewer::Source,
        }
    }

    fn root(name: &str, is_extra: bool) -> RootEntry {
        RootEntry {
            name: name.to_string(),
            rel: FileIdentity::new(name),
            is_extra,
        }
    }

    #[test]
    fn cursor_is_clamped_to_listing() {
        let mut app = app();
        app.state.listing = DirectoryListing {
            path: FileIdentity::default(),
            entries: ["a", "b"]
                .iter()
                .map(|name| TreeEntry {
                    name: name.to_string(),
                    rel: FileIdentity::new(*name),
                    kind: EntryKind::File,
                })
                .collect(),
        };

        app.move_cursor(5);
        assert_eq!(app.cursor.selected(), Some(1));
        app.move_cursor(-9);
        assert_eq!(app.cursor.selected(), Some(0));
        assert_eq!(app.selected_entry().map(|entry| entry.name.as_str()), Some("a"));
    }

    #[test]
    fn tab_cycles_suite_roots_only() {
        let mut app = app();
        let (tx, _rx) = mpsc::channel();
        app.state.roots = vec![root("parte1-api", false), root("readme.md", true), root("parte2-e2e", false)];
        app.state.selection = suitedeck_core::SelectionState::new(FileIdentity::new("parte1-api"));

        app.cycle_root(&tx);
        assert_eq!(app.state.selection.root, FileIdentity::new("parte2-e2e"));
        app.cycle_root(&tx);
        assert_eq!(app.state.selection.root, FileIdentity::new("parte1-api"));
    }

    #[test]
    fn environment_key_starts_a_check_and_shows_it() {
        let mut app = app();
        let (tx, _rx) = mpsc::channel();
        let key = event::KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE);

        handle_key(key, &mut app, &tx);

        assert_eq!(app.viewer, Viewer::Environment);
        assert_eq!(app.state.environment, Some(EnvironmentCheck::Pending));
        let (title, lines) = viewer_lines(&app);
        assert_eq!(title, "Environment");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn viewer_renders_loaded_file_text() {
        let mut app = app();
        let (tx, _rx) = mpsc::channel();
        let file = FileIdentity::new("parte1-api/README.md");
        app.apply(PanelAction::User(UserAction::FileSelected(file.to_string())), &tx);
        app.apply(
            PanelAction::Runtime(RuntimeAction::FileContentLoaded {
                file,
                content: "# Parte 1\nAPI tests".to_string(),
            }),
            &tx,
        );

        let (title, lines) = viewer_lines(&app);
        assert_eq!(title, "File: parte1-api/README.md");
        assert_eq!(lines.len(), 2);

        app.viewer = app.viewer.toggled();
        assert_eq!(viewer_lines(&app).0, "Environment");
    }

    #[test]
    fn quit_key_exits() {
        let mut app = app();
        let (tx, _rx) = mpsc::channel();
        let key = event::KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(matches!(handle_key(key, &mut app, &tx), KeyHandlerResult::Exit));
    }
}
