//! Channel implementations backed by the host system.

use super::devices::{
    DeviceError, HapticStyle, Haptics, IdleInhibitor, Screen, SoundPlayer, Torch,
};
use crate::model::TimerEvent;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

const LED_CLASS_DIR: &str = "/sys/class/leds";

/// Screen flash rendered by whichever presentation layer consumes the event stream.
pub struct EventScreen {
    tx: UnboundedSender<TimerEvent>,
}

impl EventScreen {
    pub fn new(tx: UnboundedSender<TimerEvent>) -> Self {
        Self { tx }
    }
}

impl Screen for EventScreen {
    fn set_lit(&self, lit: bool) {
        let _ = self.tx.send(TimerEvent::Flash { lit });
    }
}

/// Torch exposed through the Linux LED class (`/sys/class/leds/<name>`).
pub struct SysfsTorch {
    dir: PathBuf,
    max_brightness: Option<u32>,
}

impl SysfsTorch {
    /// Accepts either a bare LED name or a path to its directory.
    pub fn new(name_or_path: &str) -> Self {
        let candidate = Path::new(name_or_path);
        let dir = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            Path::new(LED_CLASS_DIR).join(name_or_path)
        };
        let max_brightness = std::fs::read_to_string(dir.join("max_brightness"))
            .ok()
            .and_then(|s| s.trim().parse().ok());
        Self {
            dir,
            max_brightness,
        }
    }
}

impl Torch for SysfsTorch {
    fn is_available(&self) -> bool {
        self.dir.join("brightness").exists()
    }

    fn set(&self, on: bool) -> Result<(), DeviceError> {
        let path = self.dir.join("brightness");
        let value = if on {
            self.max_brightness.unwrap_or(1)
        } else {
            0
        };
        std::fs::write(&path, value.to_string()).map_err(|source| DeviceError::Io {
            what: format!("write {}", path.display()),
            source,
        })
    }
}

/// Haptic pulse delegated to a user command; the style is passed as `DEBATE_TIMER_HAPTIC`.
pub struct CommandHaptics {
    command: Option<String>,
}

impl CommandHaptics {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }
}

impl Haptics for CommandHaptics {
    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    fn supports(&self, _style: HapticStyle) -> bool {
        true
    }

    fn pulse(&self, style: HapticStyle) -> Result<(), DeviceError> {
        let Some(command) = self.command.as_deref() else {
            return Err(DeviceError::Unavailable("haptics"));
        };
        let mut cmd = shell(command);
        cmd.env("DEBATE_TIMER_HAPTIC", style.as_str());
        spawn_detached(command, cmd)
    }
}

/// Chime through a user command, a system sound player, or the terminal bell.
pub struct SystemChime {
    command: Option<String>,
}

impl SystemChime {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }

    fn player_candidates() -> Vec<(&'static str, &'static str)> {
        if cfg!(target_os = "macos") {
            vec![
                ("afplay", "/System/Library/Sounds/Glass.aiff"),
                ("afplay", "/System/Library/Sounds/Ping.aiff"),
            ]
        } else if cfg!(target_os = "linux") {
            vec![
                ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
                ("paplay", "/usr/share/sounds/sound-icons/bell.wav"),
                ("aplay", "/usr/share/sounds/alsa/Front_Center.wav"),
            ]
        } else {
            Vec::new()
        }
    }

    fn ring_bell() -> Result<(), DeviceError> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|source| DeviceError::Io {
                what: "terminal bell".into(),
                source,
            })
    }
}

impl SoundPlayer for SystemChime {
    fn is_available(&self) -> bool {
        // The terminal bell is always there.
        true
    }

    fn play(&self) -> Result<(), DeviceError> {
        if let Some(command) = self.command.as_deref() {
            return spawn_detached(command, shell(command));
        }
        for (player, file) in Self::player_candidates() {
            if !Path::new(file).exists() {
                continue;
            }
            let mut cmd = Command::new(player);
            cmd.arg(file);
            match spawn_detached(player, cmd) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!(error = %e, player, "sound player unusable"),
            }
        }
        Self::ring_bell()
    }
}

/// Suppresses idle blanking by holding a `systemd-inhibit` child until dropped.
pub struct SystemdInhibit {
    child: Mutex<Option<Child>>,
}

impl SystemdInhibit {
    pub fn new() -> Self {
        Self {
            child: Mutex::new(None),
        }
    }
}

impl Default for SystemdInhibit {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleInhibitor for SystemdInhibit {
    fn is_available(&self) -> bool {
        cfg!(target_os = "linux") && on_path("systemd-inhibit")
    }

    fn inhibit(&self) -> Result<(), DeviceError> {
        let mut guard = self
            .child
            .lock()
            .map_err(|_| DeviceError::Unavailable("idle inhibitor"))?;
        if guard.is_some() {
            return Ok(());
        }
        let child = Command::new("systemd-inhibit")
            .args([
                "--what=idle",
                "--who=debate-timer",
                "--why=Speech timer running",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DeviceError::Command {
                command: "systemd-inhibit".into(),
                reason: e.to_string(),
            })?;
        tracing::info!(pid = child.id(), "screen idle suppressed");
        *guard = Some(child);
        Ok(())
    }
}

impl Drop for SystemdInhibit {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

/// Spawn with silenced stdio and reap the child on a helper thread.
fn spawn_detached(label: &str, mut cmd: Command) -> Result<(), DeviceError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| DeviceError::Command {
            command: label.to_string(),
            reason: e.to_string(),
        })?;
    let label = label.to_string();
    std::thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => {
            tracing::warn!(command = %label, %status, "alert command exited unsuccessfully")
        }
        Err(e) => tracing::warn!(command = %label, error = %e, "alert command wait failed"),
        _ => {}
    });
    Ok(())
}

fn on_path(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}
