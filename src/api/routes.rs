use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::analyzer::TRACKED_FIELDS;
use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::scheduler::{parse_interval, PollConfig};
use crate::session::{SessionHandle, SessionView};
use crate::types::{ControlMsg, FieldComparison, MatchMinute, Side, Snapshot};

#[derive(Clone)]
pub struct ApiState {
    pub view_rx: watch::Receiver<SessionView>,
    pub control_tx: mpsc::Sender<ControlMsg>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

impl ApiState {
    pub fn from_handle(handle: &SessionHandle) -> Self {
        Self {
            view_rx: handle.view_rx.clone(),
            control_tx: handle.control_tx.clone(),
            health: Arc::clone(&handle.health),
            latency: Arc::clone(&handle.latency),
        }
    }

    async fn send(&self, msg: ControlMsg) -> Result<(), AppError> {
        self.control_tx
            .send(msg)
            .await
            .map_err(|e| AppError::ChannelSend(e.to_string()))
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/session", get(get_session))
        .route("/snapshots/:id", get(get_snapshot_detail))
        .route("/control/interval", post(post_interval))
        .route("/control/toggle", post(post_toggle))
        .route("/control/fetch", post(post_fetch))
        .route("/control/expand/:id", post(post_expand))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct IntervalRequest {
    /// `30s`, `60s`, `300s`, `600s` or `manual`.
    pub interval: String,
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

#[derive(Serialize)]
pub struct FieldDetail {
    pub name: &'static str,
    pub label: &'static str,
    pub group: &'static str,
    pub current: String,
    pub comparison: Option<FieldComparison>,
}

#[derive(Serialize)]
pub struct SnapshotDetailResponse {
    pub prediction_id: i64,
    pub marker: MatchMinute,
    pub left_p: Option<f64>,
    pub draw_p: Option<f64>,
    pub right_p: Option<f64>,
    pub left: Vec<FieldDetail>,
    pub right: Vec<FieldDetail>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub sample_count: u64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub fetch: HealthSnapshot,
    pub poll: PollConfig,
    pub snapshots: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_session(State(state): State<ApiState>) -> Json<SessionView> {
    Json(state.view_rx.borrow().clone())
}

async fn get_snapshot_detail(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<SnapshotDetailResponse>, AppError> {
    let view = state.view_rx.borrow().clone();
    let (snapshot, delta) = view
        .detail(id)
        .ok_or_else(|| AppError::NotFound(format!("snapshot {id}")))?;

    Ok(Json(SnapshotDetailResponse {
        prediction_id: snapshot.prediction_id,
        marker: snapshot.marker(),
        left_p: snapshot.left_p,
        draw_p: snapshot.draw_p,
        right_p: snapshot.right_p,
        left: side_details(Side::Left, snapshot, delta.side(Side::Left)),
        right: side_details(Side::Right, snapshot, delta.side(Side::Right)),
    }))
}

fn side_details(
    side: Side,
    snapshot: &Snapshot,
    comparisons: &crate::types::SideComparison,
) -> Vec<FieldDetail> {
    TRACKED_FIELDS
        .iter()
        .map(|field| FieldDetail {
            name: field.name,
            label: field.label,
            group: field.group.title(),
            current: field
                .extract(side, snapshot)
                .map(|v| field.format.render(v))
                .unwrap_or_else(|| "-".to_string()),
            comparison: comparisons.get(field.name).copied(),
        })
        .collect()
}

async fn post_interval(
    State(state): State<ApiState>,
    Json(req): Json<IntervalRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let interval = parse_interval(&req.interval)?;
    state.send(ControlMsg::SelectInterval(interval)).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn post_toggle(State(state): State<ApiState>) -> Result<Json<AcceptedResponse>, AppError> {
    state.send(ControlMsg::ToggleRun).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn post_fetch(State(state): State<ApiState>) -> Result<Json<AcceptedResponse>, AppError> {
    state.send(ControlMsg::ManualFetch).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn post_expand(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<AcceptedResponse>, AppError> {
    state.send(ControlMsg::ToggleExpanded(id)).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let view = state.view_rx.borrow();
    Json(HealthResponse {
        fetch: state.health.snapshot(),
        poll: view.poll,
        snapshots: view.series.len(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.latency.percentiles();
    Json(LatencyResponse {
        p50_ms,
        p95_ms,
        p99_ms,
        sample_count: state.latency.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetcher::SnapshotSource;
    use crate::scheduler::RefreshInterval;
    use crate::session::{spawn_session, SessionOptions};
    use crate::types::{SnapshotSeries, Trend};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::time::Duration;

    struct FixedSource;

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn fetch(&self) -> Result<SnapshotSeries> {
            Ok(SnapshotSeries::new(
                Some(11077),
                vec![
                    Snapshot {
                        prediction_id: 5,
                        min: 10,
                        left_num_y: Some(1.0),
                        left_total_transfer_value: Some(52_000_000.0),
                        ..Default::default()
                    },
                    Snapshot {
                        prediction_id: 4,
                        min: 5,
                        left_num_y: Some(0.0),
                        left_total_transfer_value: Some(52_000_000.0),
                        ..Default::default()
                    },
                ],
            ))
        }
    }

    async fn settled_state() -> (ApiState, SessionHandle) {
        let handle = spawn_session(FixedSource, SessionOptions::default());
        tokio::time::sleep(Duration::from_millis(10)).await;
        (ApiState::from_handle(&handle), handle)
    }

    #[tokio::test(start_paused = true)]
    async fn session_endpoint_exposes_deltas() {
        let (state, _handle) = settled_state().await;
        let Json(view) = get_session(State(state)).await;

        assert_eq!(view.deltas[&5].left["num_y"].trend, Trend::Increased);
        assert_eq!(view.deltas[&4].left["num_y"].trend, Trend::Unchanged);
        assert_eq!(view.poll.interval, None);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["deltas"]["5"]["left"]["num_y"]["trend"], "increased");
        assert_eq!(json["status"]["state"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_detail_renders_every_tracked_field() {
        let (state, _handle) = settled_state().await;
        let Json(detail) = get_snapshot_detail(State(state), Path(5)).await.unwrap();

        assert_eq!(detail.marker, MatchMinute { minute: 10, added: 0 });
        assert_eq!(detail.left.len(), TRACKED_FIELDS.len());

        let total = detail.left.iter().find(|f| f.name == "total_value").unwrap();
        assert_eq!(total.current, "€52.0M");
        assert_eq!(total.comparison.map(|c| c.trend), Some(Trend::Unchanged));

        let defenders = detail.left.iter().find(|f| f.name == "num_z").unwrap();
        assert_eq!(defenders.current, "-");
        assert!(defenders.comparison.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_snapshot_is_404() {
        let (state, _handle) = settled_state().await;
        let err = get_snapshot_detail(State(state), Path(99)).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn control_endpoints_drive_the_session() {
        let (state, handle) = settled_state().await;

        let req = IntervalRequest { interval: "60s".to_string() };
        post_interval(State(state.clone()), Json(req)).await.unwrap();
        post_expand(State(state.clone()), Path(4)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let view = handle.view();
        assert_eq!(view.poll.interval, Some(RefreshInterval::Secs60));
        assert!(view.poll.running);
        assert_eq!(view.expanded, Some(4));

        post_toggle(State(state.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.view().poll.running);

        let req = IntervalRequest { interval: "45s".to_string() };
        let err = post_interval(State(state), Json(req)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_fetch_endpoint_triggers_a_fetch() {
        let (state, _handle) = settled_state().await;
        post_fetch(State(state.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let Json(health) = get_health(State(state.clone())).await;
        assert_eq!(health.fetch.fetches_ok, 2);
        assert_eq!(health.snapshots, 2);

        let Json(latency) = get_stats_latency(State(state)).await;
        assert_eq!(latency.sample_count, 2);
    }
}
