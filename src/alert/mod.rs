//! Alert delivery.
//!
//! An alert is a 200 ms flash of the screen and torch, plus a haptic pulse and/or chime
//! depending on the signal mode. Flash-off and repeat flashes run as tokio tasks whose
//! handles are kept so a new or stopped session can cancel them.

pub mod devices;
pub mod system;

pub use devices::Channels;
use devices::HapticStyle;

use crate::model::{FlashPattern, SignalMode};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

const FLASH_LENGTH: Duration = Duration::from_millis(200);
const REPEAT_OFFSETS: [Duration; 2] = [Duration::from_millis(400), Duration::from_millis(800)];

pub struct AlertDispatcher {
    channels: Arc<Channels>,
    pending: Vec<JoinHandle<()>>,
}

impl AlertDispatcher {
    pub fn new(channels: Channels) -> Self {
        Self {
            channels: Arc::new(channels),
            pending: Vec::new(),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn fire(&mut self, pattern: FlashPattern, signal: SignalMode) {
        self.pending.retain(|h| !h.is_finished());

        self.flash();
        if signal.uses_haptics() {
            pulse(&self.channels);
        }
        if signal.uses_sound() {
            if let Err(e) = self.channels.sound.play() {
                tracing::warn!(error = %e, "chime failed");
            }
        }

        if pattern == FlashPattern::Triple {
            for offset in REPEAT_OFFSETS {
                let dispatcher = self.deferred();
                self.pending.push(tokio::spawn(async move {
                    tokio::time::sleep(offset).await;
                    flash_for(&dispatcher, FLASH_LENGTH).await;
                }));
            }
        }
    }

    /// Abort every scheduled flash and turn the flash off now.
    pub fn cancel_pending(&mut self) {
        let n = self.pending();
        for h in self.pending.drain(..) {
            h.abort();
        }
        set_flash(&self.channels, false);
        tracing::debug!(cancelled = n, "pending flashes cancelled");
    }

    /// Scheduled tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    fn flash(&mut self) {
        set_flash(&self.channels, true);
        let channels = self.deferred();
        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(FLASH_LENGTH).await;
            set_flash(&channels, false);
        }));
    }

    fn deferred(&self) -> Arc<Channels> {
        Arc::clone(&self.channels)
    }
}

async fn flash_for(channels: &Channels, length: Duration) {
    set_flash(channels, true);
    tokio::time::sleep(length).await;
    set_flash(channels, false);
}

fn set_flash(channels: &Channels, lit: bool) {
    channels.screen.set_lit(lit);
    if let Err(e) = channels.torch.set(lit) {
        tracing::warn!(error = %e, "torch could not be used");
    }
}

fn pulse(channels: &Channels) {
    let style = if channels.haptics.supports(HapticStyle::Error) {
        HapticStyle::Error
    } else {
        HapticStyle::Buzz
    };
    if let Err(e) = channels.haptics.pulse(style) {
        tracing::warn!(error = %e, %style, "haptic pulse failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::devices::{DeviceError, Haptics, Screen, SoundPlayer, Torch};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Screen(bool),
        Torch(bool),
        Haptic(HapticStyle),
        Chime,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        torch_fails: bool,
        only_buzz: bool,
    }

    impl Recorder {
        fn push(&self, c: Call) {
            self.calls.lock().unwrap().push(c);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, c: &Call) -> usize {
            self.calls().iter().filter(|x| *x == c).count()
        }
    }

    impl Screen for Recorder {
        fn set_lit(&self, lit: bool) {
            self.push(Call::Screen(lit));
        }
    }

    impl Torch for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        fn set(&self, on: bool) -> Result<(), DeviceError> {
            if self.torch_fails {
                return Err(DeviceError::Unavailable("torch"));
            }
            self.push(Call::Torch(on));
            Ok(())
        }
    }

    impl Haptics for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        fn supports(&self, style: HapticStyle) -> bool {
            !self.only_buzz || style == HapticStyle::Buzz
        }

        fn pulse(&self, style: HapticStyle) -> Result<(), DeviceError> {
            self.push(Call::Haptic(style));
            Ok(())
        }
    }

    impl SoundPlayer for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        fn play(&self) -> Result<(), DeviceError> {
            self.push(Call::Chime);
            Ok(())
        }
    }

    fn dispatcher(rec: &Arc<Recorder>) -> AlertDispatcher {
        AlertDispatcher::new(Channels::resolve(
            rec.clone(),
            rec.clone(),
            rec.clone(),
            rec.clone(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn single_flash_turns_off_after_200ms() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Single, SignalMode::Flash);
        assert_eq!(rec.calls(), vec![Call::Screen(true), Call::Torch(true)]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rec.count(&Call::Screen(false)), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rec.count(&Call::Screen(false)), 1);
        assert_eq!(rec.count(&Call::Torch(false)), 1);
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn triple_flashes_three_times_with_one_chime() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Triple, SignalMode::Sound);
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(rec.count(&Call::Screen(true)), 3);
        assert_eq!(rec.count(&Call::Screen(false)), 3);
        assert_eq!(rec.count(&Call::Chime), 1);
        assert_eq!(rec.count(&Call::Haptic(HapticStyle::Error)), 1);
        assert_eq!(rec.calls().last(), Some(&Call::Torch(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn vibrate_mode_pulses_without_chime() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Single, SignalMode::Vibrate);
        assert_eq!(rec.count(&Call::Haptic(HapticStyle::Error)), 1);
        assert_eq!(rec.count(&Call::Chime), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flash_mode_only_flashes() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Single, SignalMode::Flash);
        assert!(rec
            .calls()
            .iter()
            .all(|c| matches!(c, Call::Screen(_) | Call::Torch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_haptic_style_falls_back_to_buzz() {
        let rec = Arc::new(Recorder {
            only_buzz: true,
            ..Default::default()
        });
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Single, SignalMode::Vibrate);
        assert_eq!(rec.count(&Call::Haptic(HapticStyle::Buzz)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_stops_scheduled_flashes() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Triple, SignalMode::Flash);
        tokio::time::sleep(Duration::from_millis(100)).await;
        d.cancel_pending();
        assert_eq!(d.pending(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(rec.count(&Call::Screen(true)), 1);
        assert_eq!(rec.calls().last(), Some(&Call::Torch(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_torch_still_flashes_screen() {
        let rec = Arc::new(Recorder {
            torch_fails: true,
            ..Default::default()
        });
        let mut d = dispatcher(&rec);
        d.fire(FlashPattern::Single, SignalMode::Flash);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rec.calls(), vec![Call::Screen(true), Call::Screen(false)]);
    }
}
