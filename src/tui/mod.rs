mod help;
mod state;

use crate::cli::Cli;
use crate::model::TimerEvent;
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure and task switching in the hot path.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TimerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let session = orchestrator::build_session(&args, event_tx);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(session, cmd_rx).await;

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
    args: Cli,
    mut event_rx: UnboundedReceiver<TimerEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // Screen idle stays suppressed for as long as the screen is up.
    let _idle_guard = orchestrator::inhibit_idle(&args);

    let mut state = UiState::default();
    if args.start_on_launch {
        let _ = cmd_tx.send(UiCommand::Start);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_draw = Instant::now() - tick_rate;
    let mut dirty = true;

    let res = loop {
        // Drain events without blocking to keep UI responsive; unbounded channel avoids backpressure.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
            dirty = true;
        }

        if dirty || last_draw.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_draw = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char(' ')) | (_, KeyCode::Enter) => {
                        let _ = cmd_tx.send(UiCommand::Toggle);
                    }
                    (_, KeyCode::Char('l')) => {
                        let _ = cmd_tx.send(UiCommand::SetLength(state.prefs.length.toggled()));
                    }
                    (_, KeyCode::Char('s')) => {
                        let _ = cmd_tx.send(UiCommand::SetSignal(state.prefs.signal.next()));
                    }
                    (_, KeyCode::Char('t')) => {
                        if state.test_alert_enabled() {
                            let _ = cmd_tx.send(UiCommand::TestAlert);
                        }
                    }
                    (_, KeyCode::Char('?')) => {
                        state.show_help = !state.show_help;
                    }
                    (_, KeyCode::Esc) => {
                        state.show_help = false;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (bg, fg) = if state.lit {
        (Color::White, Color::Black)
    } else {
        (Color::Black, Color::White)
    };
    let base = Style::default().bg(bg).fg(fg);
    f.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title("debate-timer")
            .style(base),
        area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Min(1),
                Constraint::Length(1), // time
                Constraint::Min(1),
                Constraint::Length(1), // start/stop
                Constraint::Min(1),
                Constraint::Length(1), // length picker
                Constraint::Length(1),
                Constraint::Length(1), // alert picker + test alert
                Constraint::Min(1),
                Constraint::Length(1), // status
            ]
            .as_ref(),
        )
        .split(area);

    let time_line = if state.running {
        Line::from(Span::styled(
            state.display.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            "Stopped",
            Style::default().add_modifier(Modifier::BOLD),
        ))
    };
    f.render_widget(
        Paragraph::new(time_line).alignment(Alignment::Center).style(base),
        chunks[1],
    );

    let (label, color) = if state.running {
        ("  Stop  ", Color::Red)
    } else {
        ("  Start  ", Color::Blue)
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            label,
            Style::default().bg(color).fg(Color::White),
        )))
        .alignment(Alignment::Center)
        .style(base),
        chunks[3],
    );

    let key = Style::default().fg(Color::Magenta);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw("Length: "),
            Span::styled(format!("{} min", state.prefs.length), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled("[l]", key),
        ]))
        .alignment(Alignment::Center)
        .style(base),
        chunks[5],
    );

    let test_style = if state.test_alert_enabled() {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw("Alert: "),
            Span::styled(state.prefs.signal.name(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled("[s]", key),
            Span::raw("    "),
            Span::styled("Test Alert", test_style),
            Span::raw(" "),
            Span::styled("[t]", if state.test_alert_enabled() { key } else { test_style }),
        ]))
        .alignment(Alignment::Center)
        .style(base),
        chunks[7],
    );

    let status_text = state.status_line();
    let mut status = vec![Span::styled(
        status_text.clone(),
        Style::default().fg(if state.lit { Color::Black } else { Color::Gray }),
    )];
    if status_text.is_empty() {
        status.push(Span::styled("Press ? for help", Style::default().fg(Color::DarkGray)));
    }
    f.render_widget(Paragraph::new(Line::from(status)).style(base), chunks[9]);

    if state.show_help {
        help::draw_help(centered(area, 70, 14), f);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
