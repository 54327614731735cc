use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::COUNTDOWN_TICK_SECS;
use crate::scheduler::interval::{countdown_percent, PollConfig, RefreshInterval};

/// Emitted by the scheduler's timers. `generation` identifies the timer pair
/// that produced the event; events from a cancelled pair are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    FetchDue { generation: u64 },
    CountdownTick { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Manual,
    AutoIdle(RefreshInterval),
    AutoRunning(RefreshInterval),
}

/// What the caller should do after a scheduler transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FetchNow,
    Nothing,
}

/// The armed fetch timer and countdown ticker. Both tasks are aborted when the
/// pair is dropped.
struct TimerPair {
    generation: u64,
    fetch: JoinHandle<()>,
    tick: JoinHandle<()>,
}

impl Drop for TimerPair {
    fn drop(&mut self) {
        self.fetch.abort();
        self.tick.abort();
    }
}

/// Owns the refresh cadence. At most one timer pair exists at a time: every
/// transition cancels the current pair before arming a new one.
///
/// Arming spawns tokio tasks, so transitions into `AutoRunning` must happen
/// inside a runtime.
pub struct PollScheduler {
    interval: Option<RefreshInterval>,
    running: bool,
    countdown: f64,
    started_at: Option<Instant>,
    timers: Option<TimerPair>,
    generation: u64,
    timer_tx: mpsc::Sender<TimerEvent>,
}

impl PollScheduler {
    /// Starts in manual mode with no timers.
    pub fn new(timer_tx: mpsc::Sender<TimerEvent>) -> Self {
        Self {
            interval: None,
            running: false,
            countdown: 0.0,
            started_at: None,
            timers: None,
            generation: 0,
            timer_tx,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match (self.interval, self.running) {
            (None, _) => SchedulerState::Manual,
            (Some(i), false) => SchedulerState::AutoIdle(i),
            (Some(i), true) => SchedulerState::AutoRunning(i),
        }
    }

    pub fn config(&self) -> PollConfig {
        PollConfig {
            interval: self.interval,
            running: self.running,
            countdown: self.countdown,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timers.is_some()
    }

    /// `None` switches to manual mode. A concrete interval starts running
    /// immediately.
    pub fn select_interval(&mut self, interval: Option<RefreshInterval>) {
        self.cancel();
        self.interval = interval;
        match interval {
            Some(i) => {
                self.arm(i);
                info!(interval = %i, "Auto-refresh every {}", i.label());
            }
            None => info!("Refresh mode: manual"),
        }
    }

    /// Start/stop in auto modes. In manual mode this asks for a single fetch
    /// and leaves the state alone.
    pub fn toggle_run(&mut self) -> Trigger {
        let Some(interval) = self.interval else {
            return Trigger::FetchNow;
        };
        let was_running = self.running;
        self.cancel();
        if was_running {
            info!(interval = %interval, "Auto-refresh paused");
        } else {
            self.arm(interval);
            info!(interval = %interval, "Auto-refresh resumed");
        }
        Trigger::Nothing
    }

    /// Feed a timer event back in. Returns `FetchNow` when the current fetch
    /// timer fired.
    pub fn on_timer(&mut self, event: TimerEvent) -> Trigger {
        let current = self.timers.as_ref().map(|t| t.generation);
        match event {
            TimerEvent::FetchDue { generation } if Some(generation) == current => {
                self.started_at = Some(Instant::now());
                self.countdown = 0.0;
                Trigger::FetchNow
            }
            TimerEvent::CountdownTick { generation } if Some(generation) == current => {
                self.refresh_countdown();
                Trigger::Nothing
            }
            stale => {
                debug!(?stale, ?current, "Ignoring event from cancelled timer");
                Trigger::Nothing
            }
        }
    }

    /// Cancel all timers unconditionally.
    pub fn shutdown(&mut self) {
        self.cancel();
    }

    fn refresh_countdown(&mut self) {
        if let (Some(interval), Some(started_at)) = (self.interval, self.started_at) {
            self.countdown = countdown_percent(started_at.elapsed(), interval.duration());
        }
    }

    fn cancel(&mut self) {
        if let Some(timers) = self.timers.take() {
            debug!(generation = timers.generation, "Cancelling timer pair");
        }
        self.running = false;
        self.started_at = None;
        self.countdown = 0.0;
    }

    fn arm(&mut self, interval: RefreshInterval) {
        debug_assert!(self.timers.is_none(), "arming over a live timer pair");
        self.generation += 1;
        let generation = self.generation;
        let now = Instant::now();
        let period = interval.duration();
        let tick_period = Duration::from_secs(COUNTDOWN_TICK_SECS);

        let fetch_tx = self.timer_tx.clone();
        let fetch = tokio::spawn(async move {
            let mut ticker = interval_at(now + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if fetch_tx.send(TimerEvent::FetchDue { generation }).await.is_err() {
                    break;
                }
            }
        });

        let tick_tx = self.timer_tx.clone();
        let tick = tokio::spawn(async move {
            let mut ticker = interval_at(now + tick_period, tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tick_tx.send(TimerEvent::CountdownTick { generation }).await.is_err() {
                    break;
                }
            }
        });

        self.timers = Some(TimerPair { generation, fetch, tick });
        self.running = true;
        self.started_at = Some(now);
        self.countdown = 0.0;
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
