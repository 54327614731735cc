use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{Snapshot, SnapshotSeries};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseStats {
    pub api_total: usize,
    pub skipped_malformed: usize,
    /// The response carried no snapshot list at all.
    pub missing_list: bool,
}

/// Anything that can produce the current snapshot series for the watched
/// prediction event.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<SnapshotSeries>;
}

/// Fetches `GET /season/game/prediction?game_id=..&sort_type=DESC`.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .build()?;
        let url = format!(
            "{}/season/game/prediction?game_id={}&sort_type=DESC",
            cfg.prediction_api_url, cfg.game_id
        );
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch(&self) -> Result<SnapshotSeries> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Status(resp.status()));
        }
        let bytes = resp.bytes().await?;
        let (series, stats) = parse_prediction_body(&bytes)?;
        if stats.missing_list {
            warn!("Prediction response had no snapshot list; treating as empty");
        }
        if stats.skipped_malformed > 0 {
            warn!(
                skipped = stats.skipped_malformed,
                total = stats.api_total,
                "Skipped {} malformed snapshot(s)",
                stats.skipped_malformed,
            );
        }
        debug!(snapshots = series.len(), "Fetched prediction series");
        Ok(series)
    }
}

/// Decode raw response bytes. A body that is not JSON at all is an error;
/// anything past that is handled leniently by `parse_prediction_response`.
pub fn parse_prediction_body(bytes: &[u8]) -> Result<(SnapshotSeries, ParseStats)> {
    let body: serde_json::Value = serde_json::from_slice(bytes)?;
    Ok(parse_prediction_response(&body))
}

/// Parse a prediction response body.
///
/// Accepts `{ game_id, prediction_list }` as well as `{ entityId, snapshots }`.
/// A body without a list parses to an empty series. Entries whose
/// `prediction_id` or `min` is missing or unusable are skipped; any other
/// wrongly-typed field reads as absent and the entry is kept.
pub fn parse_prediction_response(v: &serde_json::Value) -> (SnapshotSeries, ParseStats) {
    let mut stats = ParseStats::default();

    let entity_id = ["game_id", "entityId", "entity_id"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|id| id.as_i64()));

    let items = ["prediction_list", "snapshots"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|l| l.as_array()));

    let Some(items) = items else {
        stats.missing_list = true;
        return (SnapshotSeries::new(entity_id, Vec::new()), stats);
    };

    stats.api_total = items.len();
    let snapshots: Vec<Snapshot> = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Snapshot>(item.clone()) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!("Skipping snapshot: {e}");
                stats.skipped_malformed += 1;
                None
            }
        })
        .collect();

    (SnapshotSeries::new(entity_id, snapshots), stats)
}
