use crossterm::event::KeyCode;

use prediction_watch::analyzer::TrackedField;
use prediction_watch::scheduler::RefreshInterval;
use prediction_watch::session::{SessionHandle, SessionView};
use prediction_watch::types::{ControlMsg, FieldComparison, Trend};

// ---------------------------------------------------------------------------
// Key bindings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    Control(ControlMsg),
    MoveDown,
    MoveUp,
    ToggleSelected,
}

pub fn command_for(code: KeyCode) -> Option<Command> {
    let cmd = match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char('1') => Command::Control(ControlMsg::SelectInterval(Some(RefreshInterval::Secs30))),
        KeyCode::Char('2') => Command::Control(ControlMsg::SelectInterval(Some(RefreshInterval::Secs60))),
        KeyCode::Char('3') => Command::Control(ControlMsg::SelectInterval(Some(RefreshInterval::Secs300))),
        KeyCode::Char('4') => Command::Control(ControlMsg::SelectInterval(Some(RefreshInterval::Secs600))),
        KeyCode::Char('5') | KeyCode::Char('m') | KeyCode::Char('M') => {
            Command::Control(ControlMsg::SelectInterval(None))
        }
        KeyCode::Char(' ') => Command::Control(ControlMsg::ToggleRun),
        KeyCode::Char('r') | KeyCode::Char('R') => Command::Control(ControlMsg::ManualFetch),
        KeyCode::Down | KeyCode::Char('j') => Command::MoveDown,
        KeyCode::Up | KeyCode::Char('k') => Command::MoveUp,
        KeyCode::Enter => Command::ToggleSelected,
        _ => return None,
    };
    Some(cmd)
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub handle: SessionHandle,
    pub view: SessionView,
    /// Cursor row, tracked by key so it stays put when new rows arrive.
    pub selected: Option<i64>,
    pub notice: Option<String>,
}

impl AppState {
    pub fn new(handle: SessionHandle) -> Self {
        let view = handle.view();
        Self {
            handle,
            view,
            selected: None,
            notice: None,
        }
    }

    /// Pull the latest published view.
    pub fn sync(&mut self) {
        self.view = self.handle.view();
    }

    pub fn selected_index(&self) -> Option<usize> {
        let key = self.selected?;
        self.view
            .series
            .snapshots
            .iter()
            .position(|s| s.prediction_id == key)
    }

    pub fn move_cursor(&mut self, down: bool) {
        let rows = &self.view.series.snapshots;
        if rows.is_empty() {
            self.selected = None;
            return;
        }
        let max = rows.len() - 1;
        let next = match self.selected_index() {
            None => 0,
            Some(i) if down => (i + 1).min(max),
            Some(i) => i.saturating_sub(1),
        };
        self.selected = Some(rows[next].prediction_id);
    }

    pub async fn send(&mut self, msg: ControlMsg) {
        if let Err(e) = self.handle.send(msg).await {
            self.notice = Some(e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_percent(p: Option<f64>) -> String {
    match p {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "—".to_string(),
    }
}

/// Split `width` cells between the three outcome probabilities. Missing
/// probabilities count as zero; the result always sums to `width` unless
/// every probability is zero.
pub fn bar_widths(left: Option<f64>, draw: Option<f64>, right: Option<f64>, width: u16) -> [u16; 3] {
    let probs = [left, draw, right].map(|p| p.unwrap_or(0.0).max(0.0));
    let total: f64 = probs.iter().sum();
    if total <= 0.0 || width == 0 {
        return [0, 0, 0];
    }
    let cells = width as f64;
    let left_w = (probs[0] / total * cells).round().min(cells) as u16;
    let draw_w = (probs[1] / total * cells).round().min((width - left_w) as f64) as u16;
    [left_w, draw_w, width - left_w - draw_w]
}

pub fn trend_glyph(trend: Trend) -> &'static str {
    match trend {
        Trend::Increased => "▲",
        Trend::Decreased => "▼",
        Trend::Unchanged => "=",
    }
}

/// `"▲ (€48.0M → €52.0M)"` style suffix for a detail row.
pub fn format_comparison(field: &TrackedField, cmp: &FieldComparison) -> String {
    format!(
        "{} ({} → {})",
        trend_glyph(cmp.trend),
        field.format.render(cmp.previous),
        field.format.render(cmp.current),
    )
}

pub fn countdown_label(view: &SessionView) -> String {
    match view.poll.interval {
        Some(i) if view.poll.running => {
            let remaining = i.duration().as_secs_f64() * (100.0 - view.poll.countdown) / 100.0;
            format!("next fetch in {:.0}s", remaining.max(0.0))
        }
        Some(_) => "paused".to_string(),
        None => "manual".to_string(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prediction_watch::analyzer::tracked_field;

    #[test]
    fn number_keys_select_intervals() {
        assert_eq!(
            command_for(KeyCode::Char('2')),
            Some(Command::Control(ControlMsg::SelectInterval(Some(RefreshInterval::Secs60))))
        );
        assert_eq!(
            command_for(KeyCode::Char('m')),
            Some(Command::Control(ControlMsg::SelectInterval(None)))
        );
        assert_eq!(command_for(KeyCode::Char(' ')), Some(Command::Control(ControlMsg::ToggleRun)));
        assert_eq!(command_for(KeyCode::Char('x')), None);
    }

    #[test]
    fn bar_widths_fill_the_row() {
        let w = bar_widths(Some(0.5), Some(0.25), Some(0.25), 40);
        assert_eq!(w, [20, 10, 10]);
        assert_eq!(w.iter().sum::<u16>(), 40);

        let w = bar_widths(Some(0.333), Some(0.333), Some(0.334), 10);
        assert_eq!(w.iter().sum::<u16>(), 10);

        assert_eq!(bar_widths(None, None, None, 10), [0, 0, 0]);
        assert_eq!(bar_widths(Some(1.0), None, None, 7), [7, 0, 0]);
    }

    #[test]
    fn comparison_shows_glyph_and_both_values() {
        let field = tracked_field("total_value").unwrap();
        let cmp = FieldComparison {
            previous: 48_000_000.0,
            current: 52_000_000.0,
            trend: Trend::Increased,
        };
        assert_eq!(format_comparison(field, &cmp), "▲ (€48.0M → €52.0M)");
    }

    #[test]
    fn percent_and_truncate() {
        assert_eq!(format_percent(Some(0.315)), "31.5%");
        assert_eq!(format_percent(None), "—");
        assert_eq!(truncate("connection refused", 10), "connectio…");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
