use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};

/// The fixed set of auto-refresh cadences. Manual mode is `None` wherever an
/// `Option<RefreshInterval>` is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshInterval {
    #[serde(rename = "30s")]
    Secs30,
    #[serde(rename = "60s")]
    Secs60,
    #[serde(rename = "300s")]
    Secs300,
    #[serde(rename = "600s")]
    Secs600,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 4] = [
        RefreshInterval::Secs30,
        RefreshInterval::Secs60,
        RefreshInterval::Secs300,
        RefreshInterval::Secs600,
    ];

    pub fn duration(self) -> Duration {
        Duration::from_secs(match self {
            RefreshInterval::Secs30 => 30,
            RefreshInterval::Secs60 => 60,
            RefreshInterval::Secs300 => 300,
            RefreshInterval::Secs600 => 600,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            RefreshInterval::Secs30 => "30 sec",
            RefreshInterval::Secs60 => "1 min",
            RefreshInterval::Secs300 => "5 min",
            RefreshInterval::Secs600 => "10 min",
        }
    }
}

impl std::fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.duration().as_secs())
    }
}

/// Parse an interval selection. Accepts `30s`, `60s`, `300s`, `600s` (with or
/// without the `s`, or in milliseconds such as `30000`) and `manual`.
pub fn parse_interval(s: &str) -> Result<Option<RefreshInterval>> {
    let s = s.trim().to_ascii_lowercase();
    if s == "manual" || s.is_empty() {
        return Ok(None);
    }
    let digits = s.strip_suffix('s').unwrap_or(&s);
    let n: u64 = digits
        .parse()
        .map_err(|_| AppError::Config(format!("unknown refresh interval: {s}")))?;
    let secs = match n {
        n if n >= 1000 && n % 1000 == 0 => n / 1000,
        n if n >= 1000 => {
            return Err(AppError::Config(format!("unsupported refresh interval: {s}")));
        }
        n => n,
    };
    RefreshInterval::ALL
        .into_iter()
        .find(|i| i.duration().as_secs() == secs)
        .map(Some)
        .ok_or_else(|| AppError::Config(format!("unsupported refresh interval: {s}")))
}

/// Observable scheduler state handed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PollConfig {
    /// `None` means manual mode.
    pub interval: Option<RefreshInterval>,
    pub running: bool,
    /// Progress towards the next scheduled fetch, in [0, 100].
    pub countdown: f64,
}

/// `min(100, 100 × elapsed / interval)`, never negative.
pub fn countdown_percent(elapsed: Duration, interval: Duration) -> f64 {
    if interval.is_zero() {
        return 100.0;
    }
    let percent = elapsed.as_secs_f64() / interval.as_secs_f64() * 100.0;
    percent.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_form() {
        assert_eq!(parse_interval("manual").unwrap(), None);
        assert_eq!(parse_interval("30s").unwrap(), Some(RefreshInterval::Secs30));
        assert_eq!(parse_interval("60").unwrap(), Some(RefreshInterval::Secs60));
        assert_eq!(parse_interval("300000").unwrap(), Some(RefreshInterval::Secs300));
        assert_eq!(parse_interval(" 600S ").unwrap(), Some(RefreshInterval::Secs600));
    }

    #[test]
    fn rejects_unknown_intervals() {
        assert!(parse_interval("45s").is_err());
        assert!(parse_interval("often").is_err());
    }

    #[test]
    fn millisecond_form_must_be_whole_seconds() {
        assert_eq!(parse_interval("30000").unwrap(), Some(RefreshInterval::Secs30));
        assert!(parse_interval("30500").is_err());
        assert!(parse_interval("60999").is_err());
    }

    #[test]
    fn countdown_is_proportional() {
        let interval = Duration::from_secs(60);
        assert_eq!(countdown_percent(Duration::ZERO, interval), 0.0);
        assert_eq!(countdown_percent(Duration::from_secs(15), interval), 25.0);
        assert_eq!(countdown_percent(Duration::from_secs(60), interval), 100.0);
    }

    #[test]
    fn countdown_never_exceeds_one_hundred() {
        for interval in RefreshInterval::ALL {
            for factor in [1u32, 2, 10, 1000] {
                let pct = countdown_percent(interval.duration() * factor, interval.duration());
                assert!((0.0..=100.0).contains(&pct), "{interval}: {pct}");
            }
        }
        assert_eq!(countdown_percent(Duration::from_secs(5), Duration::ZERO), 100.0);
    }

    #[test]
    fn serializes_as_short_labels() {
        let json = serde_json::to_string(&RefreshInterval::Secs300).unwrap();
        assert_eq!(json, "\"300s\"");
        let back: RefreshInterval = serde_json::from_str("\"30s\"").unwrap();
        assert_eq!(back, RefreshInterval::Secs30);
    }
}
