use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as nanoseconds since the epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

// ---------------------------------------------------------------------------
// Match time marker
// ---------------------------------------------------------------------------

/// Elapsed match minute plus optional added time. Ordered lexicographically:
/// `45'+2` sorts after `45'` and before `46'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatchMinute {
    pub minute: i64,
    pub added: u32,
}

impl MatchMinute {
    pub fn new(minute: i64, added: u32) -> Self {
        Self { minute, added }
    }
}

impl std::fmt::Display for MatchMinute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.added > 0 {
            write!(f, "{}'+{}", self.minute, self.added)
        } else {
            write!(f, "{}'", self.minute)
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One prediction record at a point in match time, as delivered by the
/// prediction service. Every statistic is optional: an absent field is skipped
/// by the delta analyzer rather than treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub prediction_id: i64,
    pub min: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub plus_min: Option<i64>,

    #[serde(default, deserialize_with = "lenient")]
    pub left_coach_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_coach_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub referee_id: Option<i64>,

    // Line-up shape: goalkeepers, defenders, midfielders, forwards, unknown.
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_v: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_z: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_n: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_u: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_v: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_z: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_n: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_u: Option<f64>,

    // Cards
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_y2r: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_y2r: Option<f64>,

    // Goals: scored from play, penalties, own goals
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_goal_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_goal_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_num_goal_a: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_goal_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_goal_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_num_goal_a: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_goal_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_goal_score: Option<f64>,

    // Squad value
    #[serde(default, deserialize_with = "lenient")]
    pub left_total_transfer_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_total_transfer_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_avg_transfer_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_avg_transfer_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_right_transfer_value_div: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_left_transfer_value_div: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub left_avg_time_player_in_game: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_avg_time_player_in_game: Option<f64>,

    // Outcome
    #[serde(default, deserialize_with = "lenient")]
    pub res_event: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub draw_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub right_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub res_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub res: Option<i64>,

    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub updated_at: Option<String>,
}

/// Optional statistic: a wrongly typed value reads as absent instead of
/// rejecting the whole snapshot.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl Snapshot {
    /// Time marker; negative added time is clamped to zero.
    pub fn marker(&self) -> MatchMinute {
        let added = self.plus_min.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32;
        MatchMinute::new(self.min, added)
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Snapshots of one prediction event, most recent first as delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotSeries {
    pub entity_id: Option<i64>,
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotSeries {
    pub fn new(entity_id: Option<i64>, snapshots: Vec<Snapshot>) -> Self {
        Self { entity_id, snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, prediction_id: i64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.prediction_id == prediction_id)
    }

    pub fn contains(&self, prediction_id: i64) -> bool {
        self.get(prediction_id).is_some()
    }

    /// True if every snapshot is strictly newer than the one after it.
    pub fn is_chronological(&self) -> bool {
        self.snapshots
            .windows(2)
            .all(|pair| pair[0].marker() > pair[1].marker())
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }
}

// ---------------------------------------------------------------------------
// Delta classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increased,
    Decreased,
    Unchanged,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Increased => "increased",
            Trend::Decreased => "decreased",
            Trend::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldComparison {
    pub previous: f64,
    pub current: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Tracked field name → comparison for one side. Fields missing from either
/// snapshot are absent.
pub type SideComparison = BTreeMap<&'static str, FieldComparison>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotDelta {
    pub left: SideComparison,
    pub right: SideComparison,
}

impl SnapshotDelta {
    pub fn side(&self, side: Side) -> &SideComparison {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// prediction_id → per-side comparisons against the next-older snapshot.
pub type DeltaIndex = BTreeMap<i64, SnapshotDelta>;

// ---------------------------------------------------------------------------
// Session messages
// ---------------------------------------------------------------------------

/// Renderer-issued commands. These are the only ways a renderer may mutate the
/// session.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMsg {
    SelectInterval(Option<crate::scheduler::RefreshInterval>),
    ToggleRun,
    ManualFetch,
    ToggleExpanded(i64),
}
