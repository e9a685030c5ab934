//! Output channels an alert can drive.
//!
//! Every channel reports whether it is usable; [`Channels::resolve`] swaps unusable ones
//! for no-op fallbacks so the alert path never branches on hardware.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{0} is not available on this device")]
    Unavailable(&'static str),
    #[error("{what}: {source}")]
    Io {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

/// Haptic feedback styles. Not every generator supports every style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticStyle {
    /// Notification-style "error" pattern.
    Error,
    /// Plain vibration; the lowest common denominator.
    Buzz,
}

impl HapticStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            HapticStyle::Error => "error",
            HapticStyle::Buzz => "buzz",
        }
    }
}

impl fmt::Display for HapticStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full-screen color flash.
pub trait Screen: Send + Sync {
    fn set_lit(&self, lit: bool);
}

pub trait Torch: Send + Sync {
    fn is_available(&self) -> bool;
    fn set(&self, on: bool) -> Result<(), DeviceError>;
}

pub trait Haptics: Send + Sync {
    fn is_available(&self) -> bool;
    fn supports(&self, style: HapticStyle) -> bool;
    fn pulse(&self, style: HapticStyle) -> Result<(), DeviceError>;
}

/// Must return without waiting for playback to finish.
pub trait SoundPlayer: Send + Sync {
    fn is_available(&self) -> bool;
    fn play(&self) -> Result<(), DeviceError>;
}

/// Keeps the display awake while held.
pub trait IdleInhibitor: Send + Sync {
    fn is_available(&self) -> bool;
    fn inhibit(&self) -> Result<(), DeviceError>;
}

pub struct NoTorch;

impl Torch for NoTorch {
    fn is_available(&self) -> bool {
        false
    }

    fn set(&self, _on: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn is_available(&self) -> bool {
        false
    }

    fn supports(&self, _style: HapticStyle) -> bool {
        true
    }

    fn pulse(&self, _style: HapticStyle) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub struct NoSound;

impl SoundPlayer for NoSound {
    fn is_available(&self) -> bool {
        false
    }

    fn play(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// The resolved set of output channels shared by the dispatcher and its deferred tasks.
#[derive(Clone)]
pub struct Channels {
    pub screen: Arc<dyn Screen>,
    pub torch: Arc<dyn Torch>,
    pub haptics: Arc<dyn Haptics>,
    pub sound: Arc<dyn SoundPlayer>,
}

impl Channels {
    /// Replace unavailable channels with their no-op fallback.
    pub fn resolve(
        screen: Arc<dyn Screen>,
        torch: Arc<dyn Torch>,
        haptics: Arc<dyn Haptics>,
        sound: Arc<dyn SoundPlayer>,
    ) -> Self {
        let torch: Arc<dyn Torch> = if torch.is_available() {
            torch
        } else {
            Arc::new(NoTorch)
        };
        let haptics: Arc<dyn Haptics> = if haptics.is_available() {
            haptics
        } else {
            Arc::new(NoHaptics)
        };
        let sound: Arc<dyn SoundPlayer> = if sound.is_available() {
            sound
        } else {
            Arc::new(NoSound)
        };
        tracing::info!(
            torch = torch.is_available(),
            haptics = haptics.is_available(),
            sound = sound.is_available(),
            "alert channels resolved"
        );
        Self {
            screen,
            torch,
            haptics,
            sound,
        }
    }

    #[cfg(test)]
    pub fn screen_only(screen: Arc<dyn Screen>) -> Self {
        Self::resolve(
            screen,
            Arc::new(NoTorch),
            Arc::new(NoHaptics),
            Arc::new(NoSound),
        )
    }
}
