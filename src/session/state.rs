use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzer::analyze;
use crate::error::AppError;
use crate::scheduler::{PollConfig, PollScheduler, RefreshInterval, SchedulerState, TimerEvent, Trigger};
use crate::types::{now_ns, DeltaIndex, Snapshot, SnapshotDelta, SnapshotSeries};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum FetchStatus {
    /// No fetch has completed yet.
    Pending,
    Ok,
    /// Last fetch failed; the series shown is from the last good fetch.
    Error(String),
}

/// Everything a renderer may read. Published after every session event.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub poll: PollConfig,
    pub series: SnapshotSeries,
    pub deltas: DeltaIndex,
    pub expanded: Option<i64>,
    pub status: FetchStatus,
    pub in_flight: usize,
    /// Nanosecond UTC epoch of the last applied fetch.
    pub last_updated_ns: Option<u64>,
}

impl SessionView {
    /// Snapshot and its comparisons, if the key is present in the series.
    pub fn detail(&self, prediction_id: i64) -> Option<(&Snapshot, &SnapshotDelta)> {
        let snapshot = self.series.get(prediction_id)?;
        let delta = self.deltas.get(&prediction_id)?;
        Some((snapshot, delta))
    }

    /// Detail for the expanded key. Nothing when no key is expanded or the
    /// key is gone from the latest series.
    pub fn expanded_detail(&self) -> Option<(&Snapshot, &SnapshotDelta)> {
        self.detail(self.expanded?)
    }
}

/// The view session: scheduler, latest series, its delta index and the
/// expanded row. Mutated only through the methods below; series and index
/// are always replaced together.
pub struct Session {
    scheduler: PollScheduler,
    series: SnapshotSeries,
    deltas: DeltaIndex,
    expanded: Option<i64>,
    status: FetchStatus,
    in_flight: usize,
    applied_seq: u64,
    last_updated_ns: Option<u64>,
}

impl Session {
    pub fn new(scheduler: PollScheduler) -> Self {
        Self {
            scheduler,
            series: SnapshotSeries::default(),
            deltas: DeltaIndex::new(),
            expanded: None,
            status: FetchStatus::Pending,
            in_flight: 0,
            applied_seq: 0,
            last_updated_ns: None,
        }
    }

    pub fn select_interval(&mut self, interval: Option<RefreshInterval>) {
        self.scheduler.select_interval(interval);
    }

    pub fn toggle_run(&mut self) -> Trigger {
        self.scheduler.toggle_run()
    }

    pub fn manual_fetch(&self) -> Trigger {
        Trigger::FetchNow
    }

    /// Expand `prediction_id`, or collapse it if it is already expanded.
    pub fn toggle_expanded(&mut self, prediction_id: i64) {
        self.expanded = if self.expanded == Some(prediction_id) {
            None
        } else {
            Some(prediction_id)
        };
    }

    pub fn on_timer(&mut self, event: TimerEvent) -> Trigger {
        self.scheduler.on_timer(event)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn fetch_started(&mut self) {
        self.in_flight += 1;
    }

    /// Apply a completed fetch. `seq` is the issue order of the fetch; a
    /// completion older than the last applied one still wins because it
    /// completed later.
    pub fn apply_fetch(&mut self, seq: u64, result: Result<SnapshotSeries, AppError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            Ok(series) => {
                if seq < self.applied_seq {
                    debug!(seq, applied_seq = self.applied_seq, "Applying out-of-order fetch completion");
                }
                if !series.is_chronological() {
                    warn!(
                        snapshots = series.len(),
                        "Series is not ordered most-recent-first; deltas pair by position"
                    );
                }
                self.deltas = analyze(&series.snapshots);
                self.series = series;
                self.applied_seq = seq;
                self.status = FetchStatus::Ok;
                self.last_updated_ns = Some(now_ns());
                if let Some(key) = self.expanded {
                    if !self.series.contains(key) {
                        info!(prediction_id = key, "Expanded snapshot no longer in series");
                    }
                }
            }
            Err(e) => {
                warn!(seq, "Fetch failed, keeping last series: {e}");
                self.status = FetchStatus::Error(e.to_string());
            }
        }
    }

    pub fn series(&self) -> &SnapshotSeries {
        &self.series
    }

    pub fn deltas(&self) -> &DeltaIndex {
        &self.deltas
    }

    pub fn expanded(&self) -> Option<i64> {
        self.expanded
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            poll: self.scheduler.config(),
            series: self.series.clone(),
            deltas: self.deltas.clone(),
            expanded: self.expanded,
            status: self.status.clone(),
            in_flight: self.in_flight,
            last_updated_ns: self.last_updated_ns,
        }
    }

    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trend;
    use tokio::sync::mpsc;

    fn session() -> Session {
        let (tx, _rx) = mpsc::channel(16);
        Session::new(PollScheduler::new(tx))
    }

    fn snap(id: i64, min: i64, yellows: f64) -> Snapshot {
        Snapshot {
            prediction_id: id,
            min,
            left_num_y: Some(yellows),
            ..Default::default()
        }
    }

    fn series(snapshots: Vec<Snapshot>) -> SnapshotSeries {
        SnapshotSeries::new(Some(1), snapshots)
    }

    #[test]
    fn expanding_toggles_a_single_key() {
        let mut s = session();
        assert_eq!(s.expanded(), None);
        s.toggle_expanded(5);
        assert_eq!(s.expanded(), Some(5));
        s.toggle_expanded(4);
        assert_eq!(s.expanded(), Some(4));
        s.toggle_expanded(4);
        assert_eq!(s.expanded(), None);
    }

    #[test]
    fn successful_fetch_replaces_series_and_index_together() {
        let mut s = session();
        s.fetch_started();
        s.apply_fetch(1, Ok(series(vec![snap(5, 10, 1.0), snap(4, 5, 0.0)])));

        assert_eq!(s.series().len(), 2);
        assert_eq!(s.deltas()[&5].left["num_y"].trend, Trend::Increased);
        assert_eq!(s.view().status, FetchStatus::Ok);
        assert_eq!(s.view().in_flight, 0);

        s.fetch_started();
        s.apply_fetch(2, Ok(series(vec![snap(9, 40, 2.0)])));
        assert_eq!(s.deltas().keys().copied().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn failed_fetch_keeps_last_good_state() {
        let mut s = session();
        s.fetch_started();
        s.apply_fetch(1, Ok(series(vec![snap(5, 10, 1.0), snap(4, 5, 0.0)])));
        let before = s.view();

        s.fetch_started();
        s.apply_fetch(2, Err(AppError::Config("connection refused".to_string())));

        let after = s.view();
        assert_eq!(after.series, before.series);
        assert_eq!(after.deltas, before.deltas);
        assert!(matches!(after.status, FetchStatus::Error(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn empty_fetch_clears_the_index() {
        let mut s = session();
        s.apply_fetch(1, Ok(series(vec![snap(5, 10, 1.0)])));
        s.apply_fetch(2, Ok(series(Vec::new())));
        assert!(s.deltas().is_empty());
        assert!(s.series().is_empty());
        assert_eq!(s.view().status, FetchStatus::Ok);
    }

    #[test]
    fn expanded_key_survives_refresh_and_vanishes_quietly() {
        let mut s = session();
        s.apply_fetch(1, Ok(series(vec![snap(5, 10, 1.0), snap(4, 5, 0.0)])));
        s.toggle_expanded(4);

        s.apply_fetch(2, Ok(series(vec![snap(6, 15, 1.0), snap(5, 10, 1.0), snap(4, 5, 0.0)])));
        let view = s.view();
        assert_eq!(view.expanded, Some(4));
        assert!(view.expanded_detail().is_some());

        s.apply_fetch(3, Ok(series(vec![snap(6, 15, 1.0)])));
        let view = s.view();
        assert_eq!(view.expanded, Some(4));
        assert!(view.expanded_detail().is_none());
    }

    #[test]
    fn manual_fetch_and_manual_toggle_both_request_a_fetch() {
        let mut s = session();
        assert_eq!(s.manual_fetch(), Trigger::FetchNow);
        assert_eq!(s.toggle_run(), Trigger::FetchNow);
        assert_eq!(s.scheduler_state(), SchedulerState::Manual);
    }
}
