use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
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
            Span::styled("space", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("enter", Style::default().fg(Color::Magenta)),
            Span::raw("  Start/Stop"),
        ]),
        key_line("l", 15, "Toggle length (5/7 minutes)"),
        key_line("s", 15, "Cycle alert type"),
        key_line("t", 15, "Test alert (while stopped)"),
        key_line("?", 15, "Show/hide this help"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("     Quit"),
        ]),
        Line::from(""),
        Line::from("Alerts:"),
        Line::from("  1:00, one minute before the end, and the end (three flashes)."),
        Line::from("  The timer stops itself once 15 seconds have passed the end."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
