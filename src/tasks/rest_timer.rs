//! Rest timer controller and its one-second tick loop
//!
//! [`RestTimer`] owns the single [`RestTimerState`] for the process. Every
//! transition that changes the state is pushed to subscribers over a watch
//! channel. The countdown is driven by a background tokio task that is
//! (re)spawned on start/reset and torn down on cancel or drop.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{interval_at, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::{RestClockError, Result},
    state::{RestTimerState, TimerMetadata, TimerPhase},
    utils::Clock,
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of applying one transition
#[derive(Debug, Clone)]
struct Transition {
    changed: bool,
    before: TimerPhase,
    state: RestTimerState,
}

/// State and notification channel shared with the tick loop
#[derive(Debug)]
struct TimerShared {
    state: Mutex<RestTimerState>,
    updates: watch::Sender<RestTimerState>,
}

impl TimerShared {
    /// Apply a transition and notify subscribers if it changed anything
    fn update<F>(&self, transition: F) -> Result<Transition>
    where
        F: FnOnce(&mut RestTimerState) -> bool,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RestClockError::LockPoisoned("rest timer state"))?;

        let before = state.phase();
        let changed = transition(&mut *state);
        let snapshot = state.clone();

        // Send while holding the lock so subscribers see transitions in order
        if changed {
            self.updates.send_replace(snapshot.clone());
        }

        Ok(Transition {
            changed,
            before,
            state: snapshot,
        })
    }
}

/// The process-wide rest timer
pub struct RestTimer {
    shared: Arc<TimerShared>,
    clock: Arc<dyn Clock>,
    warning_threshold: u64,
    ticker: Mutex<Option<CancellationToken>>,
}

impl RestTimer {
    /// Create an idle timer
    ///
    /// `warning_threshold` is the number of remaining seconds at or below
    /// which the countdown is flagged as about to finish.
    pub fn new(clock: Arc<dyn Clock>, warning_threshold: u64) -> Self {
        let (updates, _) = watch::channel(RestTimerState::idle());
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(RestTimerState::idle()),
                updates,
            }),
            clock,
            warning_threshold,
            ticker: Mutex::new(None),
        }
    }

    pub fn warning_threshold(&self) -> u64 {
        self.warning_threshold
    }

    /// Start a rest period, replacing any running one
    pub fn start_timer(&self, duration: u64, metadata: TimerMetadata) -> Result<RestTimerState> {
        if duration == 0 {
            return Err(RestClockError::InvalidDuration);
        }

        let mut ticker = self.lock_ticker()?;
        Self::stop_ticker(&mut ticker);

        let now = self.clock.now();
        let mut outcome = Ok(());
        let transition = self.shared.update(|state| {
            outcome = state.start(duration, metadata, now);
            outcome.is_ok()
        })?;
        outcome?;

        info!(
            duration,
            movement_id = ?transition.state.movement_id,
            workout_id = ?transition.state.workout_id,
            "Rest timer started"
        );
        *ticker = Some(self.spawn_ticker());
        Ok(transition.state)
    }

    pub fn pause_timer(&self) -> Result<RestTimerState> {
        let now = self.clock.now();
        let transition = self.shared.update(|state| state.pause(now))?;
        if transition.changed {
            info!(remaining = transition.state.remaining_time, "Rest timer paused");
        } else {
            debug!("Pause ignored while {}", transition.before.as_str());
        }
        Ok(transition.state)
    }

    pub fn resume_timer(&self) -> Result<RestTimerState> {
        let now = self.clock.now();
        let transition = self.shared.update(|state| state.resume(now))?;
        if transition.changed {
            info!(remaining = transition.state.remaining_time, "Rest timer resumed");
        } else {
            debug!("Resume ignored while {}", transition.before.as_str());
        }
        Ok(transition.state)
    }

    /// Restart the countdown from the full duration
    pub fn reset_timer(&self) -> Result<RestTimerState> {
        let mut ticker = self.lock_ticker()?;
        let now = self.clock.now();
        let transition = self.shared.update(|state| state.reset(now))?;

        if transition.changed {
            Self::stop_ticker(&mut ticker);
            *ticker = Some(self.spawn_ticker());
            info!(duration = transition.state.duration, "Rest timer reset");
        } else {
            debug!("Reset ignored while idle");
        }
        Ok(transition.state)
    }

    /// Return to idle from any phase and stop ticking
    pub fn cancel_timer(&self) -> Result<RestTimerState> {
        let mut ticker = self.lock_ticker()?;
        Self::stop_ticker(&mut ticker);

        let transition = self.shared.update(RestTimerState::cancel)?;
        if transition.changed {
            info!("Rest timer cancelled");
        }
        Ok(transition.state)
    }

    pub fn stop_timer(&self) -> Result<RestTimerState> {
        self.cancel_timer()
    }

    /// Add seconds to the current rest period
    pub fn add_time(&self, seconds: u64) -> Result<RestTimerState> {
        let mut ticker = self.lock_ticker()?;
        let transition = self.shared.update(|state| state.add_time(seconds))?;

        if !transition.changed {
            debug!("Add time ignored while {}", transition.before.as_str());
            return Ok(transition.state);
        }

        info!(seconds, remaining = transition.state.remaining_time, "Added rest time");
        if transition.before == TimerPhase::Completed {
            // The tick loop exits on completion, so bring it back
            Self::stop_ticker(&mut ticker);
            *ticker = Some(self.spawn_ticker());
        }
        Ok(transition.state)
    }

    pub fn snapshot(&self) -> Result<RestTimerState> {
        self.shared
            .state
            .lock()
            .map(|state| state.clone())
            .map_err(|_| RestClockError::LockPoisoned("rest timer state"))
    }

    /// Receive every state change as it happens
    pub fn subscribe(&self) -> watch::Receiver<RestTimerState> {
        self.shared.updates.subscribe()
    }

    pub fn progress_percentage(&self) -> Result<f64> {
        Ok(self.snapshot()?.progress_percentage())
    }

    pub fn is_warning(&self) -> Result<bool> {
        Ok(self.snapshot()?.is_warning(self.warning_threshold))
    }

    fn lock_ticker(&self) -> Result<MutexGuard<'_, Option<CancellationToken>>> {
        self.ticker
            .lock()
            .map_err(|_| RestClockError::LockPoisoned("rest timer ticker"))
    }

    fn stop_ticker(ticker: &mut Option<CancellationToken>) {
        if let Some(token) = ticker.take() {
            token.cancel();
        }
    }

    fn spawn_ticker(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        tokio::spawn(tick_loop(Arc::clone(&self.shared), cancel.clone()));
        cancel
    }
}

impl Drop for RestTimer {
    fn drop(&mut self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            Self::stop_ticker(&mut ticker);
        }
    }
}

/// Decrement the countdown once per second until it completes or is cancelled
async fn tick_loop(shared: Arc<TimerShared>, cancel: CancellationToken) {
    let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Rest timer tick loop cancelled");
                break;
            }
            _ = interval.tick() => {
                // A replacement timer may have taken over between the tick and the lock
                match shared.update(|state| !cancel.is_cancelled() && state.tick()) {
                    Ok(transition) => {
                        if transition.changed && transition.state.is_completed {
                            info!("Rest period complete");
                            break;
                        }
                        if !transition.state.is_active || transition.state.is_completed {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Rest timer tick failed: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{format_time, ManualClock};
    use chrono::{TimeZone, Utc};
    use tokio::time::sleep;

    fn started_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn timer_with_clock() -> (RestTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(started_at()));
        (RestTimer::new(clock.clone(), 10), clock)
    }

    fn timer() -> RestTimer {
        timer_with_clock().0
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_completion_for_any_duration() {
        for duration in [1, 5, 60] {
            let timer = timer();
            timer.start_timer(duration, TimerMetadata::default()).unwrap();
            sleep(secs(duration as f64 + 0.5)).await;

            let state = timer.snapshot().unwrap();
            assert!(state.is_completed, "duration {duration}");
            assert_eq!(state.remaining_time, 0);
            assert!(state.is_active);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_decrement_happens_after_one_second() {
        let timer = timer();
        timer.start_timer(30, TimerMetadata::default()).unwrap();
        sleep(secs(0.5)).await;
        assert_eq!(timer.snapshot().unwrap().remaining_time, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_remaining_time() {
        let (timer, clock) = timer_with_clock();
        timer.start_timer(10, TimerMetadata::default()).unwrap();
        sleep(secs(3.5)).await;
        clock.advance_secs(3);
        timer.pause_timer().unwrap();
        sleep(secs(5.0)).await;
        clock.advance_secs(5);

        let state = timer.snapshot().unwrap();
        assert_eq!(state.remaining_time, 7);
        assert!(state.is_paused);
        assert_eq!(state.paused_at, Some(started_at() + chrono::Duration::seconds(3)));

        let resumed = timer.resume_timer().unwrap();
        assert_eq!(resumed.start_time, Some(started_at() + chrono::Duration::seconds(5)));
        assert!(resumed.paused_at.is_none());

        sleep(secs(2.0)).await;
        assert_eq!(timer.snapshot().unwrap().remaining_time, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_from_full_duration() {
        let timer = timer();
        timer.start_timer(10, TimerMetadata::default()).unwrap();
        sleep(secs(4.5)).await;
        assert_eq!(timer.snapshot().unwrap().remaining_time, 6);

        let state = timer.reset_timer().unwrap();
        assert_eq!(state.remaining_time, 10);
        assert!(!state.is_completed);

        sleep(secs(2.5)).await;
        assert_eq!(timer.snapshot().unwrap().remaining_time, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_every_phase_yields_idle() {
        let timer = timer();

        timer.start_timer(30, TimerMetadata::for_movement("m1")).unwrap();
        sleep(secs(1.5)).await;
        let running = timer.cancel_timer().unwrap();

        timer.start_timer(30, TimerMetadata::for_movement("m1")).unwrap();
        timer.pause_timer().unwrap();
        let paused = timer.cancel_timer().unwrap();

        timer.start_timer(1, TimerMetadata::for_movement("m1")).unwrap();
        sleep(secs(1.5)).await;
        assert!(timer.snapshot().unwrap().is_completed);
        let completed = timer.stop_timer().unwrap();

        for state in [running, paused, completed] {
            assert!(!state.is_active);
            assert_eq!(state.remaining_time, 0);
            assert!(state.movement_id.is_none());
        }

        // No stray ticks after cancellation
        sleep(secs(10.0)).await;
        assert_eq!(timer.snapshot().unwrap(), RestTimerState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_twice_matches_pausing_once() {
        let timer = timer();
        timer.start_timer(20, TimerMetadata::default()).unwrap();
        sleep(secs(2.5)).await;

        let once = timer.pause_timer().unwrap();
        let twice = timer.pause_timer().unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_scenario_for_a_tagged_movement() {
        let timer = timer();
        let state = timer
            .start_timer(60, TimerMetadata::for_movement("m1"))
            .unwrap();
        assert_eq!(state.movement_id.as_deref(), Some("m1"));
        assert_eq!(timer.progress_percentage().unwrap(), 0.0);

        sleep(secs(30.5)).await;
        assert_eq!(timer.progress_percentage().unwrap(), 50.0);
        assert_eq!(format_time(timer.snapshot().unwrap().remaining_time), "0:30");
        assert!(!timer.is_warning().unwrap());

        sleep(secs(20.0)).await;
        assert!(timer.is_warning().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn add_time_brings_completed_timer_back() {
        let timer = timer();
        timer.start_timer(2, TimerMetadata::default()).unwrap();
        sleep(secs(2.5)).await;
        assert!(timer.snapshot().unwrap().is_completed);

        let state = timer.add_time(3).unwrap();
        assert!(!state.is_completed);
        assert_eq!(state.remaining_time, 3);

        sleep(secs(1.5)).await;
        assert_eq!(timer.snapshot().unwrap().remaining_time, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn add_time_extends_running_timer_without_double_ticking() {
        let timer = timer();
        timer.start_timer(10, TimerMetadata::default()).unwrap();
        sleep(secs(2.5)).await;
        timer.add_time(5).unwrap();
        sleep(secs(2.0)).await;

        let state = timer.snapshot().unwrap();
        assert_eq!(state.duration, 15);
        assert_eq!(state.remaining_time, 11);
    }

    #[tokio::test]
    async fn zero_duration_is_rejected_and_keeps_current_timer() {
        let timer = timer();
        timer.start_timer(45, TimerMetadata::default()).unwrap();
        assert_eq!(
            timer.start_timer(0, TimerMetadata::default()),
            Err(RestClockError::InvalidDuration)
        );
        assert_eq!(timer.snapshot().unwrap().duration, 45);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_receive_transitions() {
        let timer = timer();
        let mut rx = timer.subscribe();

        timer.start_timer(5, TimerMetadata::default()).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase(), TimerPhase::Running);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().remaining_time, 4);

        timer.pause_timer().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase(), TimerPhase::Paused);

        // Ignored transitions do not notify
        timer.resume_timer().unwrap();
        rx.changed().await.unwrap();
        timer.resume_timer().unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_releases_the_tick_loop() {
        let timer = timer();
        let mut rx = timer.subscribe();
        timer.start_timer(600, TimerMetadata::default()).unwrap();
        drop(timer);

        let drained = tokio::time::timeout(secs(5.0), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(drained.is_ok(), "tick loop should stop once the timer is dropped");
    }
}
