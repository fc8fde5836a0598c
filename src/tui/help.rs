use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("s", 11, "Start run with the current form"),
        key_line("x", 11, "Stop the active run"),
        key_line("y", 11, "Copy the current command to clipboard"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Form:"),
        key_line("↑/↓ j/k", 5, "Move between fields"),
        key_line("←/→ h/l", 5, "Change choice (task, environment, device, ...)"),
        key_line("enter", 7, "Edit text field / toggle; enter again to commit, esc to cancel"),
        key_line("[ / ]", 7, "Previous / next checkpoint"),
        Line::from(""),
        Line::from("Notes:"),
        Line::from("  Status and logs refresh on their own; the run state only changes once"),
        Line::from("  the server reports it. A run name you typed is kept when switching"),
        Line::from("  environments; an empty run name is sent as <environment>_run."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
