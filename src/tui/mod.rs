mod clipboard;
mod help;
mod state;

use crate::cli::{build_form, Cli};
use crate::client::PanelClient;
use crate::display::StatusStyle;
use crate::model::{PanelEvent, Task};
use crate::orchestrator::{self, UiCommand};
use crate::settings::PanelSettings;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Terminal,
};
use state::{visible_fields, KeyOutcome, UiState, TAB_DASHBOARD};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, settings: PanelSettings) -> Result<()> {
    // Unbounded channels keep pollers from ever waiting on the UI thread.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let client = PanelClient::new(&settings.base_url, settings.request_timeout)
        .context("build HTTP client")?;
    let form = build_form(&args);
    let initial_game = form.game;

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_state = UiState::new(form, settings.base_url.clone());
    let ui_handle = std::thread::spawn(move || run_threaded(ui_state, event_rx, cmd_tx));

    let res =
        orchestrator::run_controller(client, &settings, initial_game, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<PanelEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Every event carries a complete payload; applying it replaces the region.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match state.on_key(k.modifiers, k.code) {
                    KeyOutcome::Nothing => {}
                    KeyOutcome::Send(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyOutcome::Copy(text) => {
                        state.info = match clipboard::copy_to_clipboard(&text) {
                            Ok(()) => "Copied command to clipboard".into(),
                            Err(e) => format!("Copy failed: {e:#}"),
                        };
                    }
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
                // Redraw right away so edits feel immediate.
                terminal.draw(|f| draw(f.area(), f, &state)).ok();
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn style_for(style: StatusStyle) -> Style {
    match style {
        StatusStyle::Neutral => Style::default().fg(Color::Gray),
        StatusStyle::Progress => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        StatusStyle::Success => Style::default().fg(Color::Green),
        StatusStyle::Error => Style::default().fg(Color::Red),
        StatusStyle::Unclassified => Style::default(),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Dashboard"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("rl-run-panel"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_DASHBOARD => draw_dashboard(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)].as_ref())
        .split(main[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(14), Constraint::Min(3)].as_ref())
        .split(columns[0]);
    draw_form(left[0], f, state);
    draw_checkpoints(left[1], f, state);

    let banner_height = if state.status.banner.is_some() { 3 } else { 0 };
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(6),
                Constraint::Length(banner_height),
                Constraint::Min(3),
            ]
            .as_ref(),
        )
        .split(columns[1]);
    draw_status(right[0], f, state);
    if let Some(banner) = state.status.banner.as_ref() {
        let color = if banner.success {
            Color::Green
        } else {
            Color::Red
        };
        let p = Paragraph::new(Line::from(Span::styled(
            banner.message.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
        f.render_widget(p, right[1]);
    }
    draw_logs(right[2], f, state);

    let info = Paragraph::new(Line::from(vec![
        Span::styled("Info: ", Style::default().fg(Color::Gray)),
        Span::raw(state.info.clone()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(info, main[1]);
}

fn draw_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    for field in visible_fields(&state.form) {
        let focused = field == state.focus;
        let value = match (&state.editing, focused) {
            (Some(buf), true) => format!("{buf}_"),
            _ => state.field_value(field),
        };
        let label_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if focused { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(marker, label_style),
            Span::styled(format!("{:<14}", field.label()), label_style),
            Span::raw(value),
        ]));
    }
    let title = match state.form.task {
        Task::Train => "Run (train)",
        Task::Evaluate => "Run (evaluate)",
    };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_checkpoints(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let title = format!("Checkpoints ({})", state.form.game);
    let files = state.models.files();
    if files.is_empty() {
        let p = Paragraph::new("No saved checkpoints")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(p, area);
        return;
    }
    let items: Vec<ListItem> = files.iter().map(|f| ListItem::new(f.as_str())).collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().fg(Color::Magenta))
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    list_state.select(state.models.selected_index());
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let lines = vec![
        Line::from(vec![
            Span::styled("State: ", Style::default().fg(Color::Gray)),
            Span::styled(state.status.state_text.clone(), style_for(state.status.style)),
        ]),
        Line::from(vec![
            Span::styled("Command: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.command_text.clone()),
        ]),
        Line::from(vec![
            Span::styled("Server: ", Style::default().fg(Color::Gray)),
            Span::raw(state.base_url.clone()),
        ]),
        Line::from(vec![
            Span::styled("Updated: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status_updated_at.as_deref().unwrap_or("-").to_string()),
        ]),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

fn draw_logs(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Account for borders (1 row top and bottom)
    let viewport = area.height.saturating_sub(2) as usize;
    let offset = state.logs.max_scroll(viewport).min(u16::MAX as usize) as u16;
    let title = format!("Logs ({} lines)", state.logs.line_count);
    let p = Paragraph::new(state.logs.text.as_str())
        .scroll((offset, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}
