use serde::{Deserialize, Serialize};
use std::fmt;

/// Speech length offered by the length picker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum SpeechLength {
    #[default]
    #[serde(rename = "5")]
    #[value(name = "5")]
    Five,
    #[serde(rename = "7")]
    #[value(name = "7")]
    Seven,
}

impl SpeechLength {
    pub fn minutes(self) -> u64 {
        match self {
            SpeechLength::Five => 5,
            SpeechLength::Seven => 7,
        }
    }

    pub fn from_minutes(minutes: u64) -> Option<Self> {
        match minutes {
            5 => Some(SpeechLength::Five),
            7 => Some(SpeechLength::Seven),
            _ => None,
        }
    }

    /// The other picker entry.
    pub fn toggled(self) -> Self {
        match self {
            SpeechLength::Five => SpeechLength::Seven,
            SpeechLength::Seven => SpeechLength::Five,
        }
    }
}

impl fmt::Display for SpeechLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minutes())
    }
}

/// Which channels an alert uses beyond the always-on flash. The serde name is the stored value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SignalMode {
    #[default]
    Flash,
    Vibrate,
    Sound,
}

impl SignalMode {
    /// Label shown by the alert-type picker.
    pub fn name(self) -> &'static str {
        match self {
            SignalMode::Flash => "Flash",
            SignalMode::Vibrate => "Vibrate",
            SignalMode::Sound => "Sound",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SignalMode::Flash => SignalMode::Vibrate,
            SignalMode::Vibrate => SignalMode::Sound,
            SignalMode::Sound => SignalMode::Flash,
        }
    }

    pub fn uses_haptics(self) -> bool {
        matches!(self, SignalMode::Vibrate | SignalMode::Sound)
    }

    pub fn uses_sound(self) -> bool {
        matches!(self, SignalMode::Sound)
    }
}

/// Milestone rule that produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    /// One minute elapsed.
    OneMinute,
    /// One minute before the end time.
    NearEnd,
    /// End time reached.
    EndReached,
    /// Fifteen seconds past the end; the session completes.
    Overtime,
    /// Fired by the Test Alert control.
    Test,
}

impl Milestone {
    pub fn label(self) -> &'static str {
        match self {
            Milestone::OneMinute => "One minute",
            Milestone::NearEnd => "One minute left",
            Milestone::EndReached => "Time",
            Milestone::Overtime => "Overtime, stopping",
            Milestone::Test => "Test alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashPattern {
    /// One 200 ms flash.
    Single,
    /// Flashes at +0, +400 and +800 ms.
    Triple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub milestone: Milestone,
    pub pattern: FlashPattern,
}

impl Alert {
    pub fn single(milestone: Milestone) -> Self {
        Self {
            milestone,
            pattern: FlashPattern::Single,
        }
    }

    pub fn triple(milestone: Milestone) -> Self {
        Self {
            milestone,
            pattern: FlashPattern::Triple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    Completed,
}

/// The two persisted preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub length: SpeechLength,
    pub signal: SignalMode,
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    Started {
        /// Local wall-clock start time, already formatted.
        at: String,
    },
    Display {
        text: String,
    },
    Alert {
        milestone: Milestone,
    },
    Flash {
        lit: bool,
    },
    Stopped {
        reason: StopReason,
    },
    Preferences {
        prefs: Preferences,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    TestAlertWhileRunning,
    PreferencesNotSaved { error: String },
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::TestAlertWhileRunning => "Test Alert is disabled while running".into(),
            InfoEvent::PreferencesNotSaved { error } => {
                format!("Preferences not saved: {error}")
            }
        }
    }
}
