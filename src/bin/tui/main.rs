//! Terminal viewer. Runs its own session in-process and polls the prediction
//! service directly; it does not talk to a running `watcher`. Running both
//! binaries against the same game doubles the load on the prediction service.

mod app;

use std::fs::File;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::{
    bar_widths, command_for, countdown_label, format_comparison, format_percent, truncate, AppState,
    Command,
};
use prediction_watch::analyzer::TRACKED_FIELDS;
use prediction_watch::config::Config;
use prediction_watch::fetcher::HttpSource;
use prediction_watch::scheduler::RefreshInterval;
use prediction_watch::session::{spawn_session, FetchStatus, SessionOptions};
use prediction_watch::types::{ControlMsg, Side, Snapshot, SnapshotDelta, Trend};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to a file; stdout belongs to the alternate screen.
    let log_file = File::create(&cfg.log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let source = match HttpSource::new(&cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("HTTP client error: {e}");
            std::process::exit(1);
        }
    };
    info!("Viewer watching {}", source.url());

    let handle = spawn_session(
        source,
        SessionOptions {
            initial_interval: cfg.initial_interval,
            fetch_on_start: true,
        },
    );
    let mut app = AppState::new(handle);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.handle.close().await;
    info!("Viewer closed");
    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
) -> io::Result<()> {
    let frame_interval = Duration::from_millis(200);
    let mut table_state = TableState::default();

    loop {
        app.sync();
        table_state.select(app.selected_index());
        terminal.draw(|f| render(f, app, &mut table_state))?;

        if !event::poll(frame_interval)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match command_for(key.code) {
            Some(Command::Quit) => return Ok(()),
            Some(Command::Control(msg)) => app.send(msg).await,
            Some(Command::MoveDown) => app.move_cursor(true),
            Some(Command::MoveUp) => app.move_cursor(false),
            Some(Command::ToggleSelected) => {
                if let Some(key) = app.selected {
                    app.send(ControlMsg::ToggleExpanded(key)).await;
                }
            }
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();
    let show_gauge = app.view.poll.running;

    // Outer vertical split: header | countdown | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                          // header
            Constraint::Length(if show_gauge { 1 } else { 0 }), // countdown
            Constraint::Min(0),                             // body
            Constraint::Length(1),                          // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    if show_gauge {
        render_countdown(f, app, chunks[1]);
    }
    render_body(f, app, table_state, chunks[2]);
    render_footer(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let view = &app.view;
    let (status_text, status_color) = match &view.status {
        FetchStatus::Ok => ("● ok".to_string(), Color::Green),
        FetchStatus::Pending => ("◌ waiting".to_string(), Color::Yellow),
        FetchStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![Span::styled(
        " Prediction Watch  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    for (key, interval) in RefreshInterval::ALL.iter().enumerate() {
        spans.push(interval_button(
            key + 1,
            interval.label(),
            view.poll.interval == Some(*interval),
        ));
    }
    spans.push(interval_button(5, "manual", view.poll.interval.is_none()));

    let run_label = match view.poll.interval {
        None => "[r] fetch now",
        Some(_) if view.poll.running => "[space] stop auto",
        Some(_) => "[space] start auto",
    };
    spans.extend([
        Span::raw(" │ "),
        Span::styled(run_label, Style::default().fg(Color::White)),
        Span::raw(" │ "),
        Span::styled(status_text, Style::default().fg(status_color)),
    ]);
    if view.in_flight > 0 {
        spans.push(Span::styled(" ⟳", Style::default().fg(Color::Yellow)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn interval_button(key: usize, label: &str, active: bool) -> Span<'static> {
    let style = if active {
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {key}:{label} "), style)
}

fn render_countdown(f: &mut Frame, app: &AppState, area: Rect) {
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio((app.view.poll.countdown / 100.0).clamp(0.0, 1.0))
        .label(countdown_label(&app.view));
    f.render_widget(gauge, area);
}

fn render_body(f: &mut Frame, app: &AppState, table_state: &mut TableState, area: Rect) {
    // Horizontal split: snapshots (45%) | detail (55%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    render_snapshot_table(f, app, table_state, halves[0]);
    render_detail(f, app, halves[1]);
}

fn render_snapshot_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["", "Min", "Left", "Draw", "Right", "Outcome"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let bar_width = area.width.saturating_sub(34).max(6);
    let rows: Vec<Row> = app
        .view
        .series
        .snapshots
        .iter()
        .map(|s| {
            let marker = if app.view.expanded == Some(s.prediction_id) { "▾" } else { "▸" };
            Row::new(vec![
                Cell::from(marker).style(Style::default().fg(Color::DarkGray)),
                Cell::from(s.marker().to_string()),
                Cell::from(format_percent(s.left_p)).style(Style::default().fg(Color::LightRed)),
                Cell::from(format_percent(s.draw_p)).style(Style::default().fg(Color::LightBlue)),
                Cell::from(format_percent(s.right_p)).style(Style::default().fg(Color::LightGreen)),
                Cell::from(outcome_bar(s, bar_width)),
            ])
        })
        .collect();

    let title = format!(" SNAPSHOTS ({}) ", app.view.series.len());
    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Min(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn outcome_bar(s: &Snapshot, width: u16) -> Line<'static> {
    let [l, d, r] = bar_widths(s.left_p, s.draw_p, s.right_p, width);
    Line::from(vec![
        Span::styled("█".repeat(l as usize), Style::default().fg(Color::Red)),
        Span::styled("█".repeat(d as usize), Style::default().fg(Color::Blue)),
        Span::styled("█".repeat(r as usize), Style::default().fg(Color::Green)),
    ])
}

fn render_detail(f: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let Some((snapshot, delta)) = app.view.expanded_detail() else {
        let hint = Paragraph::new(Line::from(Span::styled(
            " select a row and press [enter] to expand",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block.title(" DETAIL "));
        f.render_widget(hint, area);
        return;
    };

    let title = format!(
        " DETAIL #{} @ {}  L {}  D {}  R {} ",
        snapshot.prediction_id,
        snapshot.marker(),
        format_percent(snapshot.left_p),
        format_percent(snapshot.draw_p),
        format_percent(snapshot.right_p),
    );
    let outer = block.title(Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let sides = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    for (side, pane) in [(Side::Left, sides[0]), (Side::Right, sides[1])] {
        let lines = side_lines(side, snapshot, delta);
        let title = match side {
            Side::Left => " Left ",
            Side::Right => " Right ",
        };
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title),
        );
        f.render_widget(paragraph, pane);
    }
}

fn side_lines(side: Side, snapshot: &Snapshot, delta: &SnapshotDelta) -> Vec<Line<'static>> {
    let comparisons = delta.side(side);
    let mut lines = Vec::new();
    let mut group = None;

    for field in TRACKED_FIELDS {
        if group != Some(field.group) {
            group = Some(field.group);
            lines.push(Line::from(Span::styled(
                field.group.title(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
        }

        let value = field
            .extract(side, snapshot)
            .map(|v| field.format.render(v))
            .unwrap_or_else(|| "—".to_string());
        let mut spans = vec![
            Span::raw(format!("  {:<14}", field.label)),
            Span::styled(format!("{value:>9} "), Style::default().fg(Color::White)),
        ];
        if let Some(cmp) = comparisons.get(field.name) {
            let color = match cmp.trend {
                Trend::Increased => Color::Green,
                Trend::Decreased => Color::Red,
                Trend::Unchanged => Color::DarkGray,
            };
            spans.push(Span::styled(format_comparison(field, cmp), Style::default().fg(color)));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let mut spans = vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[1-4/m] ", Style::default().fg(Color::Yellow)),
        Span::raw("interval  "),
        Span::styled("[space] ", Style::default().fg(Color::Yellow)),
        Span::raw("start/stop  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("fetch  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("move  "),
        Span::styled("[enter] ", Style::default().fg(Color::Yellow)),
        Span::raw("expand  "),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(truncate(notice, 40), Style::default().fg(Color::Red)));
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
