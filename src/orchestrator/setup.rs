//! Wiring of preferences and alert channels from CLI arguments.

use super::controller::Session;
use crate::alert::system::{CommandHaptics, EventScreen, SysfsTorch, SystemChime, SystemdInhibit};
use crate::alert::devices::{IdleInhibitor, NoTorch, Torch};
use crate::alert::{AlertDispatcher, Channels};
use crate::cli::Cli;
use crate::model::{Preferences, TimerEvent};
use crate::prefs::{JsonFileStore, PreferenceStore};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Stored preferences with CLI overrides applied; overrides are persisted like a picker change.
fn load_preferences(args: &Cli, store: &mut dyn PreferenceStore) -> Preferences {
    let stored = Preferences::load(store);
    let prefs = Preferences {
        length: args.length.unwrap_or(stored.length),
        signal: args.signal.unwrap_or(stored.signal),
    };
    if prefs != stored {
        if let Err(e) = prefs.save(store) {
            tracing::warn!(error = %e, "could not persist command-line preferences");
        }
    }
    prefs
}

fn build_channels(args: &Cli, event_tx: UnboundedSender<TimerEvent>) -> Channels {
    let torch: Arc<dyn Torch> = match args.torch_led.as_deref() {
        Some(led) => {
            let torch = SysfsTorch::new(led);
            if !torch.is_available() {
                tracing::warn!(led, "torch LED not found, flashing the screen only");
            }
            Arc::new(torch)
        }
        None => Arc::new(NoTorch),
    };
    Channels::resolve(
        Arc::new(EventScreen::new(event_tx)),
        torch,
        Arc::new(CommandHaptics::new(args.haptic_command.clone())),
        Arc::new(SystemChime::new(args.sound_command.clone())),
    )
}

/// Build the controller-owned session for these arguments.
pub(crate) fn build_session(args: &Cli, event_tx: UnboundedSender<TimerEvent>) -> Session {
    let file_store = JsonFileStore::new(
        args.preferences
            .clone()
            .unwrap_or_else(JsonFileStore::default_path),
    );
    let path = file_store.path().display().to_string();
    let mut store: Box<dyn PreferenceStore> = Box::new(file_store);
    let prefs = load_preferences(args, store.as_mut());
    tracing::info!(
        path = %path,
        length = prefs.length.minutes(),
        signal = prefs.signal.name(),
        "preferences loaded"
    );
    let channels = build_channels(args, event_tx.clone());
    Session::new(prefs, store, AlertDispatcher::new(channels), event_tx)
}

/// Suppress screen idle once; the returned guard must live as long as the screen.
pub(crate) fn inhibit_idle(args: &Cli) -> Option<Box<dyn IdleInhibitor>> {
    if args.no_idle_inhibit {
        return None;
    }
    let inhibitor = SystemdInhibit::new();
    if !inhibitor.is_available() {
        tracing::debug!("no idle inhibitor on this system");
        return None;
    }
    match inhibitor.inhibit() {
        Ok(()) => Some(Box::new(inhibitor)),
        Err(e) => {
            tracing::warn!(error = %e, "screen idle suppression failed");
            None
        }
    }
}
