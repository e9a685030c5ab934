use crate::model::{SignalMode, SpeechLength, StopReason, TimerEvent};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the last flashes of a completion alert take to play out.
const ALERT_SETTLE: Duration = Duration::from_secs(1);

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "debate-timer",
    version,
    about = "Speech timer with flash, vibration and sound alerts"
)]
pub struct Cli {
    /// Speech length in minutes (remembered for next time)
    #[arg(long, value_enum)]
    pub length: Option<SpeechLength>,

    /// Alert type (remembered for next time)
    #[arg(long, value_enum)]
    pub signal: Option<SignalMode>,

    /// Run without the TUI: start immediately and print progress to stderr
    #[arg(long)]
    pub text: bool,

    /// Fire one alert and exit
    #[arg(long)]
    pub test_alert: bool,

    /// LED used as torch: a name under /sys/class/leds or an absolute path to its directory
    #[arg(long)]
    pub torch_led: Option<String>,

    /// Shell command run for the chime (default: system sound player, then terminal bell)
    #[arg(long)]
    pub sound_command: Option<String>,

    /// Shell command run for haptic pulses; DEBATE_TIMER_HAPTIC holds the style
    #[arg(long)]
    pub haptic_command: Option<String>,

    /// Do not keep the screen awake
    #[arg(long)]
    pub no_idle_inhibit: bool,

    /// Preferences file (default: <config dir>/debate-timer/preferences.json)
    #[arg(long)]
    pub preferences: Option<std::path::PathBuf>,

    /// Start the timer as soon as the TUI opens
    #[arg(long)]
    pub start_on_launch: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.test_alert {
        return run_test_alert(args).await;
    }

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    run_text(args).await
}

/// Fire a single alert with the configured channels, let it finish, and exit.
async fn run_test_alert(args: Cli) -> Result<()> {
    let (evt_tx, _evt_rx) = mpsc::unbounded_channel::<TimerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let session = orchestrator::build_session(&args, evt_tx);
    let handle = tokio::spawn(orchestrator::run_controller(session, cmd_rx));

    let _ = cmd_tx.send(UiCommand::TestAlert);
    tokio::time::sleep(ALERT_SETTLE).await;
    let _ = cmd_tx.send(UiCommand::Quit);

    handle.await.context("timer controller task failed")?
}

async fn run_text(args: Cli) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TimerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let session = orchestrator::build_session(&args, evt_tx);
    let _idle_guard = orchestrator::inhibit_idle(&args);
    let handle = tokio::spawn(orchestrator::run_controller(session, cmd_rx));
    let _ = cmd_tx.send(UiCommand::Start);

    let mut prefs = None;
    loop {
        tokio::select! {
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    TimerEvent::Preferences { prefs: p } => prefs = Some(p),
                    TimerEvent::Started { at } => {
                        let detail = prefs
                            .map(|p| format!(" ({} minutes, {} alerts)", p.length, p.signal.name()))
                            .unwrap_or_default();
                        let _ = out_tx.send(OutputLine::Stderr(format!("Started at {at}{detail}")));
                    }
                    TimerEvent::Display { text } => {
                        let _ = out_tx.send(OutputLine::Stdout(text));
                    }
                    TimerEvent::Alert { milestone } => {
                        let _ = out_tx.send(OutputLine::Stderr(format!("== {} ==", milestone.label())));
                    }
                    TimerEvent::Info(info) => {
                        let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
                    }
                    TimerEvent::Stopped { reason } => {
                        let msg = match reason {
                            StopReason::Manual => "Stopped",
                            StopReason::Completed => {
                                tokio::time::sleep(ALERT_SETTLE).await;
                                "Time's up"
                            }
                        };
                        let _ = out_tx.send(OutputLine::Stderr(msg.into()));
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break;
                    }
                    TimerEvent::Flash { .. } => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(UiCommand::Stop);
            }
        }
    }

    let res = handle.await.context("timer controller task failed")?;

    drop(out_tx);
    let _ = out_handle.await;

    res
}
