use crate::model::{Preferences, StopReason, TimerEvent};

/// Owned by the UI thread only; updated from controller events.
pub struct UiState {
    pub running: bool,
    pub display: String,
    /// Screen flash in progress.
    pub lit: bool,
    pub prefs: Preferences,
    pub info: String,
    /// Local wall-clock time the running session started.
    pub started_at: Option<String>,
    pub show_help: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            running: false,
            display: "0:00".into(),
            lit: false,
            prefs: Preferences::default(),
            info: String::new(),
            started_at: None,
            show_help: false,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: TimerEvent) {
        match ev {
            TimerEvent::Started { at } => {
                self.running = true;
                self.display = "0:00".into();
                self.info.clear();
                self.started_at = Some(at);
            }
            TimerEvent::Display { text } => self.display = text,
            TimerEvent::Alert { milestone } => self.info = milestone.label().into(),
            TimerEvent::Flash { lit } => self.lit = lit,
            TimerEvent::Stopped { reason } => {
                self.running = false;
                self.info = match reason {
                    StopReason::Manual => "Stopped".into(),
                    StopReason::Completed => format!("Time's up at {}", self.display),
                };
            }
            TimerEvent::Preferences { prefs } => self.prefs = prefs,
            TimerEvent::Info(info) => self.info = info.to_message(),
        }
    }

    /// Status text, with the start time appended while a session runs.
    pub fn status_line(&self) -> String {
        match (self.running, &self.started_at) {
            (true, Some(at)) if self.info.is_empty() => format!("Started at {at}"),
            (true, Some(at)) => format!("{} (started {at})", self.info),
            _ => self.info.clone(),
        }
    }

    /// Test Alert is only offered while stopped.
    pub fn test_alert_enabled(&self) -> bool {
        !self.running
    }
}
