use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use gridsync_core::{
    Alert, ConnectionState, DemandMode, NotificationStore, Severity, SimulationApi, SyncController, SyncState,
    TrendHistory, TrendPoint,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph};
use ratatui::Terminal;

use crate::render;

const KEY_HELP: &str = "space auto-run  s step  +/- interval  r reset  t test alert  a ack  x remove  q quit";

type Metric = fn(&TrendPoint) -> Option<f64>;

const CHARTS: [(&str, &[(&str, Color, Metric)]); 3] = [
    (
        "Generation vs demand (kW)",
        &[
            ("generation", Color::Green, |p: &TrendPoint| Some(p.total_generation)),
            ("demand", Color::Yellow, |p: &TrendPoint| p.demand_kw),
        ],
    ),
    (
        "Grid and storage power (kW)",
        &[
            ("grid", Color::Cyan, |p: &TrendPoint| Some(p.total_grid_power)),
            ("storage", Color::Magenta, |p: &TrendPoint| Some(p.total_storage_power)),
        ],
    ),
    (
        "Stored energy (kWh)",
        &[("stored", Color::LightBlue, |p: &TrendPoint| Some(p.stored_energy_kwh))],
    ),
];

pub struct ViewerState {
    server: String,
    latest: SyncState,
    pub(crate) history: TrendHistory,
    pub(crate) alerts: NotificationStore,
    pub(crate) selected: usize,
    was_connected: bool,
    pub(crate) message: Option<String>,
}

impl ViewerState {
    pub fn new(server: String, initial: SyncState, history: usize, alerts: NotificationStore) -> Self {
        Self {
            server,
            latest: initial,
            history: TrendHistory::new(history),
            alerts,
            selected: 0,
            was_connected: false,
            message: None,
        }
    }

    /// Folds a controller update into the view. Connection transitions raise
    /// alerts; the very first connect does not count as a restore.
    pub fn update(&mut self, state: SyncState, now: DateTime<Utc>) {
        if let Some(snapshot) = &state.snapshot {
            self.history.record(snapshot, Some(state.demand.demand_kw));
        }

        if state.connection != self.latest.connection {
            match state.connection {
                ConnectionState::Disconnected if self.was_connected => {
                    let reason = state
                        .last_error
                        .as_ref()
                        .map(|e| e.message.as_str())
                        .unwrap_or("no response");
                    self.alerts.add(Alert::connection_lost(&self.server, reason, now));
                }
                ConnectionState::Connected if self.was_connected => {
                    self.alerts.add(Alert::connection_restored(&self.server, now));
                }
                _ => {}
            }
        }
        if state.connection == ConnectionState::Connected {
            self.was_connected = true;
        }
        self.latest = state;
    }

    /// The last action's result, or the key help before any action.
    pub fn feedback_line(&self) -> String {
        self.message.clone().unwrap_or_else(|| KEY_HELP.to_string())
    }

    pub fn selected_id(&self) -> Option<String> {
        self.alerts
            .grouped()
            .into_iter()
            .flat_map(|(_, alerts)| alerts)
            .nth(self.selected)
            .map(|a| a.id.clone())
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.alerts.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn acknowledge_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.alerts.acknowledge(&id);
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.alerts.remove(&id);
        }
        self.selected = self.selected.min(self.alerts.len().saturating_sub(1));
    }

    async fn handle_key<A: SimulationApi>(&mut self, controller: &SyncController<A>, code: KeyCode) {
        match code {
            KeyCode::Char(' ') => {
                let running = controller.toggle_auto_run();
                self.message = Some(if running { "auto-run started" } else { "auto-run stopped" }.to_string());
            }
            KeyCode::Char('s') => {
                self.message = Some(match controller.run_step(false).await {
                    Ok(outcome) => render::step(&outcome),
                    Err(err) => format!("step failed: {err}"),
                });
            }
            KeyCode::Char('+') | KeyCode::Char('-') => {
                let current = controller.auto_run().interval_secs;
                let wanted = if code == KeyCode::Char('+') {
                    current.saturating_add(1)
                } else {
                    current.saturating_sub(1)
                };
                self.message = Some(match controller.set_auto_interval(wanted) {
                    Ok(secs) => format!("auto-run interval {secs}s"),
                    Err(err) => err.to_string(),
                });
            }
            KeyCode::Char('r') => {
                self.message = Some(match controller.reset_simulation().await {
                    Ok(reply) => {
                        self.history.clear();
                        reply.message.unwrap_or_else(|| "simulation reset".to_string())
                    }
                    Err(err) => format!("reset failed: {err}"),
                });
            }
            KeyCode::Char('t') => self.alerts.add(Alert::test_alert(Utc::now())),
            KeyCode::Char('a') => self.acknowledge_selected(),
            KeyCode::Char('x') => self.remove_selected(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.select_prev(),
            _ => {}
        }
    }
}

pub async fn run_viewer<A: SimulationApi + 'static>(
    controller: Arc<SyncController<A>>,
    history: usize,
    sample_alerts: bool,
) -> Result<()> {
    let alerts = if sample_alerts {
        NotificationStore::with_sample_alerts(Utc::now())
    } else {
        NotificationStore::new()
    };
    let mut state = ViewerState::new(
        controller.config().base_url.clone(),
        controller.state(),
        history,
        alerts,
    );
    let mut updates = controller.subscribe();
    let poller = controller.spawn_poller(controller.config().poll_interval);
    let runner = controller.spawn_auto_runner();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = async {
        loop {
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => break,
                            code => state.handle_key(&*controller, code).await,
                        }
                    }
                }
            }

            if updates.has_changed()? {
                let latest = updates.borrow_and_update().clone();
                state.update(latest, Utc::now());
            }

            terminal.draw(|frame| draw_ui(frame.size(), frame, &state))?;
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    controller.reset_auto_run();
    runner.stop();
    poller.stop();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn draw_ui(area: Rect, frame: &mut ratatui::Frame<'_>, state: &ViewerState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    frame.render_widget(render_header(state), rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(rows[1]);

    let chart_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(cols[0]);

    for ((title, metrics), row_area) in CHARTS.iter().zip(chart_rows.iter().copied()) {
        render_trend_chart(frame, row_area, &state.history, title, metrics);
    }

    frame.render_widget(render_alerts(state), cols[1]);
}

fn render_header(state: &ViewerState) -> Paragraph<'static> {
    Paragraph::new(header_lines(state)).block(Block::default().borders(Borders::ALL).title("Status"))
}

pub fn header_lines(state: &ViewerState) -> Vec<Line<'static>> {
    let sync = &state.latest;
    let (label, color) = match sync.connection {
        ConnectionState::Connected => ("CONNECTED", Color::Green),
        ConnectionState::Disconnected => ("DISCONNECTED", Color::Red),
    };
    let clock = sync
        .snapshot
        .as_ref()
        .map(|s| s.environment.time.clone().unwrap_or_else(|| s.timestamp.clone()))
        .unwrap_or_else(|| "waiting for first snapshot...".to_string());
    let auto_run = sync.auto_run;
    let demand = match sync.demand.mode {
        DemandMode::Explicit => format!("explicit {}", render::kw(sync.demand.demand_kw)),
        DemandMode::Realistic => format!(
            "realistic {:.0} kWh/day (now {})",
            sync.demand.total_daily_kwh,
            render::kw(sync.demand.demand_kw)
        ),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("gridsync  ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                "  {}  failures={}  sim time {}",
                state.server, sync.consecutive_failures, clock
            )),
        ]),
        Line::from(format!(
            "auto-run {} every {}s, {} steps  demand {}  step {}h  unread alerts {}",
            if auto_run.is_running { "ON" } else { "off" },
            auto_run.interval_secs,
            auto_run.step_count,
            demand,
            sync.demand.timestep_hours,
            state.alerts.unread_count(),
        )),
    ];

    lines.push(Line::from(state.feedback_line()));
    if let Some(error) = &sync.last_error {
        lines.push(Line::from(Span::styled(
            format!("{:?} error: {}", error.source, error.message),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

fn render_trend_chart(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    history: &TrendHistory,
    title: &str,
    metrics: &[(&'static str, Color, Metric)],
) {
    let series: Vec<(&'static str, Color, Vec<(f64, f64)>)> = metrics
        .iter()
        .map(|(name, color, metric)| (*name, *color, history.series(*metric)))
        .collect();

    let x_max = history.len().saturating_sub(1).max(1) as f64;
    let y_bounds = bounds(series.iter().flat_map(|(_, _, points)| points.iter().map(|(_, y)| *y)));

    let datasets = series
        .iter()
        .map(|(name, color, points)| {
            Dataset::default()
                .name(*name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(*color))
                .data(points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .title("step")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{x_max:.0}"))]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.1}", y_bounds[0])),
                    Span::raw(format!("{:.1}", (y_bounds[0] + y_bounds[1]) / 2.0)),
                    Span::raw(format!("{:.1}", y_bounds[1])),
                ]),
        );

    frame.render_widget(chart, area);
}

fn render_alerts(state: &ViewerState) -> List<'static> {
    let mut items = Vec::new();
    let mut index = 0;
    for (severity, alerts) in state.alerts.grouped() {
        let color = severity_color(severity);
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} ({})", severity.label(), alerts.len()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))));
        for alert in alerts {
            let mut style = Style::default();
            if !alert.acknowledged {
                style = style.add_modifier(Modifier::BOLD);
            }
            if index == state.selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            items.push(ListItem::new(vec![
                Line::from(Span::styled(
                    format!(
                        "{} {} {}",
                        if alert.acknowledged { " " } else { "*" },
                        alert.created_at.format("%H:%M"),
                        alert.headline
                    ),
                    style,
                )),
                Line::from(Span::styled(
                    format!("    {}", alert.detail),
                    Style::default().fg(Color::Gray),
                )),
            ]));
            index += 1;
        }
    }

    let title = format!("Alerts ({} unread)", state.alerts.unread_count());
    List::new(items).block(Block::default().borders(Borders::ALL).title(title))
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Blue,
    }
}

pub fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut any = false;
    for y in values {
        min = min.min(y);
        max = max.max(y);
        any = true;
    }
    if !any {
        return [0.0, 1.0];
    }
    if (max - min).abs() < f64::EPSILON {
        [min - 1.0, max + 1.0]
    } else {
        let pad = (max - min) * 0.12;
        [min - pad, max + pad]
    }
}
