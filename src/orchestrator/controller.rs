//! Session lifecycle controller.
//!
//! Owns the timer state machine and alert dispatcher, drives the 100 ms tick while a
//! session runs, and emits events for presentation layers.

use crate::alert::AlertDispatcher;
use crate::model::{
    Alert, FlashPattern, InfoEvent, Milestone, Preferences, SignalMode, SpeechLength,
    StopReason, TimerEvent,
};
use crate::prefs::PreferenceStore;
use crate::timer::{TimerConfig, TimerController};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};

pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Commands emitted by UI layers to control the timer.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start when stopped, stop when running.
    Toggle,
    Start,
    Stop,
    TestAlert,
    SetLength(SpeechLength),
    SetSignal(SignalMode),
    Quit,
}

/// Everything the controller task owns.
pub(crate) struct Session {
    timer: TimerController,
    dispatcher: AlertDispatcher,
    prefs: Preferences,
    store: Box<dyn PreferenceStore>,
    event_tx: UnboundedSender<TimerEvent>,
    ticker: Option<Interval>,
    last_display: Option<String>,
}

impl Session {
    pub(crate) fn new(
        prefs: Preferences,
        store: Box<dyn PreferenceStore>,
        dispatcher: AlertDispatcher,
        event_tx: UnboundedSender<TimerEvent>,
    ) -> Self {
        Self {
            timer: TimerController::new(TimerConfig::from(prefs)),
            dispatcher,
            prefs,
            store,
            event_tx,
            ticker: None,
            last_display: None,
        }
    }

    fn emit(&self, ev: TimerEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn start(&mut self) {
        let now = Instant::now();
        if let Err(e) = self.timer.start(now) {
            tracing::debug!(error = %e, "start ignored");
            return;
        }
        self.dispatcher.cancel_pending();

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.last_display = None;

        let at = local_clock_string();
        tracing::info!(
            end_minutes = self.timer.config().end_minutes,
            signal = self.prefs.signal.name(),
            started_at = %at,
            "timer started"
        );
        self.emit(TimerEvent::Started { at });
    }

    fn stop(&mut self) {
        // Cancel ticking before anything else so no tick can observe a half-stopped session.
        self.ticker = None;
        let flags = self.timer.flags();
        if !self.timer.stop() {
            return;
        }
        tracing::debug!(?flags, "milestones at stop");
        self.dispatcher.cancel_pending();
        self.last_display = None;
        tracing::info!("timer stopped");
        self.emit(TimerEvent::Stopped {
            reason: StopReason::Manual,
        });
    }

    fn tick(&mut self) {
        let Some(outcome) = self.timer.tick(Instant::now()) else {
            self.ticker = None;
            return;
        };

        if self.last_display.as_deref() != Some(outcome.display.as_str()) {
            self.last_display = Some(outcome.display.clone());
            self.emit(TimerEvent::Display {
                text: outcome.display,
            });
        }

        for alert in outcome.alerts {
            self.fire(alert);
        }

        if outcome.completed {
            // Pending flashes of the completion alert are left to finish.
            self.ticker = None;
            self.last_display = None;
            tracing::info!(elapsed = %outcome.elapsed, "timer completed");
            self.emit(TimerEvent::Stopped {
                reason: StopReason::Completed,
            });
        }
    }

    fn fire(&mut self, alert: Alert) {
        self.dispatcher
            .fire(alert.pattern, self.timer.config().signal_mode);
        self.emit(TimerEvent::Alert {
            milestone: alert.milestone,
        });
    }

    fn test_alert(&mut self) {
        if self.timer.is_running() {
            self.emit(TimerEvent::Info(InfoEvent::TestAlertWhileRunning));
            return;
        }
        self.fire(Alert {
            milestone: Milestone::Test,
            pattern: FlashPattern::Single,
        });
    }

    fn update_prefs(&mut self, prefs: Preferences) {
        if prefs == self.prefs {
            return;
        }
        self.prefs = prefs;
        self.timer.set_end_minutes(prefs.length.minutes());
        self.timer.set_signal_mode(prefs.signal);
        if let Err(e) = prefs.save(self.store.as_mut()) {
            tracing::warn!(error = %e, "preferences not saved");
            self.emit(TimerEvent::Info(InfoEvent::PreferencesNotSaved {
                error: e.to_string(),
            }));
        }
        self.emit(TimerEvent::Preferences { prefs });
    }

    /// Apply one command; returns false when the loop should exit.
    fn handle(&mut self, cmd: UiCommand) -> bool {
        match cmd {
            UiCommand::Toggle if self.timer.is_running() => self.stop(),
            UiCommand::Toggle | UiCommand::Start => self.start(),
            UiCommand::Stop => self.stop(),
            UiCommand::TestAlert => self.test_alert(),
            UiCommand::SetLength(length) => self.update_prefs(Preferences {
                length,
                ..self.prefs
            }),
            UiCommand::SetSignal(signal) => self.update_prefs(Preferences {
                signal,
                ..self.prefs
            }),
            UiCommand::Quit => return false,
        }
        true
    }
}

/// Run the session loop until `Quit` or until every command sender is gone.
pub(crate) async fn run_controller(
    mut session: Session,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    session.emit(TimerEvent::Preferences {
        prefs: session.prefs,
    });

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        if !session.handle(cmd) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // The interval only exists while running; otherwise this branch never resolves.
            _ = async {
                match session.ticker.as_mut() {
                    Some(t) => t.tick().await,
                    None => futures::future::pending().await,
                }
            } => {
                session.tick();
            }
        }
    }

    session.ticker = None;
    session.timer.stop();
    session.dispatcher.cancel_pending();
    tracing::debug!("controller exited");
    Ok(())
}

fn local_clock_string() -> String {
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .format(format)
        .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::devices::{DeviceError, HapticStyle, Haptics, NoTorch, Screen, SoundPlayer};
    use crate::alert::system::EventScreen;
    use crate::alert::Channels;
    use crate::prefs::{MemoryStore, KEY_END};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Counters {
        flashes: AtomicUsize,
        chimes: AtomicUsize,
        pulses: AtomicUsize,
    }

    impl Screen for Counters {
        fn set_lit(&self, lit: bool) {
            if lit {
                self.flashes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl Haptics for Counters {
        fn is_available(&self) -> bool {
            true
        }
        fn supports(&self, _style: HapticStyle) -> bool {
            true
        }
        fn pulse(&self, _style: HapticStyle) -> Result<(), DeviceError> {
            self.pulses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl SoundPlayer for Counters {
        fn is_available(&self) -> bool {
            true
        }
        fn play(&self) -> Result<(), DeviceError> {
            self.chimes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        counters: Arc<Counters>,
        cmd_tx: mpsc::UnboundedSender<UiCommand>,
        event_rx: mpsc::UnboundedReceiver<TimerEvent>,
        handle: tokio::task::JoinHandle<Result<()>>,
    }

    impl Harness {
        fn new(prefs: Preferences) -> Self {
            let counters = Arc::new(Counters::default());
            let channels = Channels::resolve(
                counters.clone(),
                Arc::new(NoTorch),
                counters.clone(),
                counters.clone(),
            );
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let session = Session::new(
                prefs,
                Box::new(MemoryStore::new()),
                AlertDispatcher::new(channels),
                event_tx,
            );
            let handle = tokio::spawn(run_controller(session, cmd_rx));
            Self {
                counters,
                cmd_tx,
                event_rx,
                handle,
            }
        }

        fn send(&self, cmd: UiCommand) {
            self.cmd_tx.send(cmd).unwrap();
        }

        fn drain(&mut self) -> Vec<TimerEvent> {
            let mut out = Vec::new();
            while let Ok(ev) = self.event_rx.try_recv() {
                out.push(ev);
            }
            out
        }

        fn chimes(&self) -> usize {
            self.counters.chimes.load(Ordering::SeqCst)
        }

        async fn advance_to(&self, since_start: Duration, started: Instant) {
            tokio::time::sleep_until(started + since_start).await;
        }
    }

    fn milestones(events: &[TimerEvent]) -> Vec<Milestone> {
        events
            .iter()
            .filter_map(|e| match e {
                TimerEvent::Alert { milestone } => Some(*milestone),
                _ => None,
            })
            .collect()
    }

    fn last_display(events: &[TimerEvent]) -> Option<String> {
        events.iter().rev().find_map(|e| match e {
            TimerEvent::Display { text } => Some(text.clone()),
            _ => None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn five_minute_sound_scenario() {
        let mut h = Harness::new(Preferences {
            length: SpeechLength::Five,
            signal: SignalMode::Sound,
        });
        // Time stays frozen until every task is idle, so the session starts at `t0`.
        let t0 = Instant::now();
        h.send(UiCommand::Start);

        h.advance_to(Duration::from_millis(60_050), t0).await;
        let ev = h.drain();
        assert!(ev.iter().any(|e| matches!(e, TimerEvent::Started { .. })));
        assert_eq!(milestones(&ev), vec![Milestone::OneMinute]);
        assert_eq!(last_display(&ev).as_deref(), Some("1:00"));
        assert_eq!(h.chimes(), 1);

        h.advance_to(Duration::from_millis(240_050), t0).await;
        assert_eq!(milestones(&h.drain()), vec![Milestone::NearEnd]);
        assert_eq!(h.chimes(), 2);

        h.advance_to(Duration::from_millis(301_050), t0).await;
        let ev = h.drain();
        assert_eq!(milestones(&ev), vec![Milestone::EndReached]);
        assert!(!ev.iter().any(|e| matches!(e, TimerEvent::Stopped { .. })));
        assert_eq!(h.chimes(), 3);

        h.advance_to(Duration::from_millis(317_000), t0).await;
        let ev = h.drain();
        assert_eq!(milestones(&ev), vec![Milestone::Overtime]);
        assert!(ev.iter().any(|e| matches!(
            e,
            TimerEvent::Stopped {
                reason: StopReason::Completed
            }
        )));
        assert_eq!(h.chimes(), 4);
        assert_eq!(h.counters.pulses.load(Ordering::SeqCst), 4);
        // Triple alerts repeat the flash: 1 + 1 + 3 + 3.
        assert_eq!(h.counters.flashes.load(Ordering::SeqCst), 8);

        // No ticks once completed.
        h.advance_to(Duration::from_secs(400), t0).await;
        assert!(h.drain().iter().all(|e| !matches!(e, TimerEvent::Display { .. })));

        h.send(UiCommand::Quit);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_stops_and_restart_counts_from_zero() {
        let mut h = Harness::new(Preferences::default());
        h.send(UiCommand::Toggle);
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(milestones(&h.drain()), vec![Milestone::OneMinute]);

        h.send(UiCommand::Toggle);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let ev = h.drain();
        assert!(ev.iter().any(|e| matches!(
            e,
            TimerEvent::Stopped {
                reason: StopReason::Manual
            }
        )));

        h.send(UiCommand::Toggle);
        tokio::time::sleep(Duration::from_millis(5_050)).await;
        let ev = h.drain();
        assert_eq!(last_display(&ev).as_deref(), Some("0:05"));
        assert!(milestones(&ev).is_empty());

        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(milestones(&h.drain()), vec![Milestone::OneMinute]);
        h.send(UiCommand::Quit);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_only_when_stopped() {
        let mut h = Harness::new(Preferences {
            length: SpeechLength::Seven,
            signal: SignalMode::Sound,
        });
        h.send(UiCommand::TestAlert);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let ev = h.drain();
        assert_eq!(milestones(&ev), vec![Milestone::Test]);
        assert!(!ev.iter().any(|e| matches!(e, TimerEvent::Started { .. })));
        assert_eq!(h.chimes(), 1);

        h.send(UiCommand::Start);
        h.send(UiCommand::TestAlert);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let ev = h.drain();
        assert!(milestones(&ev).is_empty());
        assert!(ev.iter().any(|e| matches!(
            e,
            TimerEvent::Info(InfoEvent::TestAlertWhileRunning)
        )));
        assert_eq!(h.chimes(), 1);
        h.send(UiCommand::Quit);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn length_change_is_persisted_and_applied() {
        let counters = Arc::new(Counters::default());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut session = Session::new(
            Preferences::default(),
            Box::new(MemoryStore::new()),
            AlertDispatcher::new(Channels::screen_only(counters)),
            event_tx,
        );
        assert!(session.handle(UiCommand::SetLength(SpeechLength::Seven)));
        assert_eq!(session.timer.config().end_minutes, 7);
        assert_eq!(session.store.get(KEY_END).unwrap().as_deref(), Some("7"));
        assert!(matches!(
            event_rx.try_recv(),
            Ok(TimerEvent::Preferences { prefs }) if prefs.length == SpeechLength::Seven
        ));

        // Same value again is a no-op.
        assert!(session.handle(UiCommand::SetLength(SpeechLength::Seven)));
        assert!(event_rx.try_recv().is_err());
        assert!(!session.handle(UiCommand::Quit));
    }

    /// A session whose screen flashes arrive on its own event channel.
    fn flashing_session() -> (Session, mpsc::UnboundedReceiver<TimerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let screen = Arc::new(EventScreen::new(event_tx.clone()));
        let session = Session::new(
            Preferences::default(),
            Box::new(MemoryStore::new()),
            AlertDispatcher::new(Channels::screen_only(screen)),
            event_tx,
        );
        (session, event_rx)
    }

    fn drain_rx(rx: &mut mpsc::UnboundedReceiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn lit_flashes(events: &[TimerEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, TimerEvent::Flash { lit: true }))
            .count()
    }

    /// Start, then tick at 5:01 and 5:16 so the session completes with a triple alert.
    async fn run_to_completion(session: &mut Session) {
        assert!(session.handle(UiCommand::Start));
        tokio::time::advance(Duration::from_secs(301)).await;
        session.tick();
        tokio::time::advance(Duration::from_secs(15)).await;
        session.tick();
        assert!(!session.timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_cancels_scheduled_flashes() {
        let (mut session, mut event_rx) = flashing_session();
        assert!(session.handle(UiCommand::Start));
        session.fire(Alert::triple(Milestone::EndReached));
        assert_eq!(session.dispatcher.pending(), 3);

        assert!(session.handle(UiCommand::Stop));
        let ev = drain_rx(&mut event_rx);
        assert_eq!(lit_flashes(&ev), 1);
        assert!(matches!(ev.last(), Some(TimerEvent::Stopped { .. })));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(lit_flashes(&drain_rx(&mut event_rx)), 0);
        assert_eq!(session.dispatcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_triple_flashes_all_three_times() {
        let (mut session, mut event_rx) = flashing_session();
        assert!(session.handle(UiCommand::Start));
        tokio::time::advance(Duration::from_secs(301)).await;
        session.tick();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drain_rx(&mut event_rx);

        tokio::time::advance(Duration::from_secs(13)).await;
        session.tick();
        assert!(!session.timer.is_running());
        tokio::time::sleep(Duration::from_secs(2)).await;
        let ev = drain_rx(&mut event_rx);
        assert_eq!(milestones(&ev), vec![Milestone::Overtime]);
        assert_eq!(lit_flashes(&ev), 3);
        assert!(matches!(
            ev.last(),
            Some(TimerEvent::Flash { lit: false })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_completion_cancels_its_flashes() {
        let (mut session, mut event_rx) = flashing_session();
        run_to_completion(&mut session).await;
        assert!(session.dispatcher.pending() > 0);
        drain_rx(&mut event_rx);

        assert!(session.handle(UiCommand::Start));
        tokio::time::sleep(Duration::from_secs(2)).await;
        let ev = drain_rx(&mut event_rx);
        assert!(matches!(ev.first(), Some(TimerEvent::Flash { lit: false })));
        assert_eq!(lit_flashes(&ev), 0);
        assert_eq!(session.dispatcher.pending(), 0);
    }
}
