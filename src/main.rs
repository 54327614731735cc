use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use prediction_watch::analyzer::TRACKED_FIELDS;
use prediction_watch::api::routes::{router, ApiState};
use prediction_watch::config::Config;
use prediction_watch::error::Result;
use prediction_watch::fetcher::HttpSource;
use prediction_watch::session::{spawn_session, FetchStatus, SessionOptions, SessionView};
use prediction_watch::types::{Side, Trend};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Prediction source ---
    let source = HttpSource::new(&cfg)?;
    info!(
        "Watching game {} at {} (interval: {})",
        cfg.game_id,
        source.url(),
        cfg.initial_interval
            .map(|i| i.label())
            .unwrap_or("manual"),
    );

    // --- Session ---
    let handle = spawn_session(
        source,
        SessionOptions {
            initial_interval: cfg.initial_interval,
            fetch_on_start: true,
        },
    );

    // View logger: one summary line per applied fetch
    let view_rx = handle.view_rx.clone();
    tokio::spawn(async move { view_logger(view_rx).await });

    // --- HTTP API server ---
    let app = router(ApiState::from_handle(&handle));
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    handle.close().await;
    Ok(())
}

/// Logs the latest snapshot and its movements each time a new series lands.
async fn view_logger(mut rx: watch::Receiver<SessionView>) {
    let mut last_logged: Option<u64> = None;
    let mut last_error: Option<String> = None;

    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        match &view.status {
            FetchStatus::Error(msg) => {
                if last_error.as_deref() != Some(msg.as_str()) {
                    warn!(event = "FETCH_ERROR", "Fetch failed: {msg}");
                    last_error = Some(msg.clone());
                }
            }
            FetchStatus::Ok if view.last_updated_ns != last_logged => {
                last_logged = view.last_updated_ns;
                last_error = None;
                log_latest(&view);
            }
            _ => {}
        }
    }
}

fn log_latest(view: &SessionView) {
    let Some(latest) = view.series.latest() else {
        info!(event = "SERIES_EMPTY", "No snapshots published yet");
        return;
    };
    let Some(delta) = view.deltas.get(&latest.prediction_id) else {
        return;
    };

    let mut moves = Vec::new();
    for side in [Side::Left, Side::Right] {
        for field in TRACKED_FIELDS {
            if let Some(cmp) = delta.side(side).get(field.name) {
                if cmp.trend != Trend::Unchanged {
                    let glyph = if cmp.trend == Trend::Increased { "▲" } else { "▼" };
                    moves.push(format!("{side}.{} {glyph}", field.name));
                }
            }
        }
    }

    let pct = |p: Option<f64>| p.map(|v| format!("{:.1}%", v * 100.0)).unwrap_or_else(|| "-".to_string());
    info!(
        event = "SNAPSHOT",
        prediction_id = latest.prediction_id,
        minute = %latest.marker(),
        snapshots = view.series.len(),
        changed = moves.len(),
        "SNAPSHOT {} | {} | L {} D {} R {} | {}",
        latest.prediction_id,
        latest.marker(),
        pct(latest.left_p),
        pct(latest.draw_p),
        pct(latest.right_p),
        if moves.is_empty() { "no changes".to_string() } else { moves.join(", ") },
    );
}
