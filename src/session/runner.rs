use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::CHANNEL_CAPACITY;
use crate::error::{AppError, Result};
use crate::fetcher::SnapshotSource;
use crate::scheduler::{PollScheduler, RefreshInterval, TimerEvent, Trigger};
use crate::session::state::{Session, SessionView};
use crate::types::{now_ns, ControlMsg, SnapshotSeries};

/// A completed fetch, posted back to the session loop by the fetch task.
struct FetchOutcome {
    seq: u64,
    result: Result<SnapshotSeries>,
    elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub initial_interval: Option<RefreshInterval>,
    /// Issue one fetch as soon as the session starts.
    pub fetch_on_start: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_interval: None,
            fetch_on_start: true,
        }
    }
}

/// Renderer-side handle to a running session. Dropping every `control_tx`
/// clone ends the session and cancels its timers.
pub struct SessionHandle {
    pub control_tx: mpsc::Sender<ControlMsg>,
    pub view_rx: watch::Receiver<SessionView>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, msg: ControlMsg) -> Result<()> {
        self.control_tx
            .send(msg)
            .await
            .map_err(|e| AppError::ChannelSend(e.to_string()))
    }

    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    /// Close the control channel and wait for the session loop to finish.
    pub async fn close(self) {
        let SessionHandle { control_tx, task, .. } = self;
        drop(control_tx);
        let _ = task.await;
    }
}

/// Start the session loop on the current runtime.
pub fn spawn_session<S: SnapshotSource>(source: S, options: SessionOptions) -> SessionHandle {
    let (control_tx, control_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (timer_tx, timer_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (fetch_tx, fetch_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let session = Session::new(PollScheduler::new(timer_tx));
    let (view_tx, view_rx) = watch::channel(session.view());
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    let runner = SessionRunner {
        session,
        source: Arc::new(source),
        control_rx,
        timer_rx,
        fetch_tx,
        fetch_rx,
        view_tx,
        next_seq: 0,
        health: Arc::clone(&health),
        latency: Arc::clone(&latency),
    };
    let task = tokio::spawn(async move { runner.run(options).await });

    SessionHandle {
        control_tx,
        view_rx,
        health,
        latency,
        task,
    }
}

/// Serializes every session event (renderer command, timer fire, fetch
/// completion) through one loop so transitions never overlap.
struct SessionRunner<S: SnapshotSource> {
    session: Session,
    source: Arc<S>,
    control_rx: mpsc::Receiver<ControlMsg>,
    timer_rx: mpsc::Receiver<TimerEvent>,
    fetch_tx: mpsc::Sender<FetchOutcome>,
    fetch_rx: mpsc::Receiver<FetchOutcome>,
    view_tx: watch::Sender<SessionView>,
    next_seq: u64,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl<S: SnapshotSource> SessionRunner<S> {
    async fn run(mut self, options: SessionOptions) {
        if options.initial_interval.is_some() {
            self.session.select_interval(options.initial_interval);
        }
        if options.fetch_on_start {
            self.start_fetch();
        }
        self.publish();

        loop {
            tokio::select! {
                msg = self.control_rx.recv() => match msg {
                    Some(msg) => self.handle_control(msg),
                    None => break,
                },
                Some(event) = self.timer_rx.recv() => {
                    if self.session.on_timer(event) == Trigger::FetchNow {
                        self.start_fetch();
                    }
                }
                Some(outcome) = self.fetch_rx.recv() => self.handle_outcome(outcome),
            }
            self.publish();
        }

        self.session.shutdown();
        self.publish();
        info!("Session closed");
    }

    fn handle_control(&mut self, msg: ControlMsg) {
        debug!(?msg, "Control message");
        let trigger = match msg {
            ControlMsg::SelectInterval(interval) => {
                self.session.select_interval(interval);
                Trigger::Nothing
            }
            ControlMsg::ToggleRun => self.session.toggle_run(),
            ControlMsg::ManualFetch => self.session.manual_fetch(),
            ControlMsg::ToggleExpanded(id) => {
                self.session.toggle_expanded(id);
                Trigger::Nothing
            }
        };
        if trigger == Trigger::FetchNow {
            self.start_fetch();
        }
    }

    /// Fire-and-forget: the fetch task posts its outcome back to the loop.
    /// Overlapping fetches are not cancelled; whichever completes last wins.
    fn start_fetch(&mut self) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.session.fetch_started();

        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = source.fetch().await;
            let outcome = FetchOutcome {
                seq,
                result,
                elapsed: started.elapsed(),
            };
            let _ = tx.send(outcome).await;
        });
        debug!(seq, "Fetch started");
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        let FetchOutcome { seq, result, elapsed } = outcome;
        self.latency.record(elapsed);
        match &result {
            Ok(series) => {
                self.health.record_success(now_ns());
                info!(
                    event = "FETCH_APPLIED",
                    seq,
                    snapshots = series.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Fetch #{seq} applied: {} snapshot(s) in {}ms",
                    series.len(),
                    elapsed.as_millis(),
                );
            }
            Err(_) => self.health.record_failure(now_ns()),
        }
        self.session.apply_fetch(seq, result);
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.session.view());
    }
}
