use crate::app::{format_hours, App, InputMode, NoticeKind, SettingsField, View};
use crate::session::{self, Filter};
use crate::timer::{Phase, Status};
use chrono::Local;
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{canvas::{Canvas, Points}, *},
};
use std::f64::consts::{FRAC_PI_2, TAU};

pub const THEMES: &[&str] = &["default", "nord", "dracula", "gruvbox"];
const RING_POINTS: usize = 720;

#[derive(Clone, Copy)]
pub struct Theme {
    pub pomodoro: Color,
    pub short_break: Color,
    pub long_break: Color,
    pub border: Color,
    pub accent: Color,
}

impl Theme {
    pub fn named(name: &str) -> Self {
        match name {
            "nord" => Self {
                pomodoro: Color::Rgb(136, 192, 208),
                short_break: Color::Rgb(191, 97, 106),
                long_break: Color::Rgb(163, 190, 140),
                border: Color::Rgb(94, 129, 172),
                accent: Color::Rgb(180, 142, 173),
            },
            "dracula" => Self {
                pomodoro: Color::Rgb(189, 147, 249),
                short_break: Color::Rgb(255, 85, 85),
                long_break: Color::Rgb(80, 250, 123),
                border: Color::Rgb(98, 114, 164),
                accent: Color::Rgb(255, 121, 198),
            },
            "gruvbox" => Self {
                pomodoro: Color::Rgb(254, 128, 25),
                short_break: Color::Rgb(251, 73, 52),
                long_break: Color::Rgb(184, 187, 38),
                border: Color::Rgb(213, 196, 161),
                accent: Color::Rgb(250, 189, 47),
            },
            _ => Self {
                pomodoro: Color::Rgb(100, 181, 246),
                short_break: Color::Rgb(255, 0, 100),
                long_break: Color::Rgb(0, 255, 150),
                border: Color::Rgb(0, 200, 255),
                accent: Color::Rgb(255, 100, 0),
            },
        }
    }

    fn phase(&self, phase: Phase) -> Color {
        match phase {
            Phase::Pomodoro => self.pomodoro,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }
}

pub fn render(f: &mut Frame, app: &App) {
    let theme = Theme::named(&app.theme_name);
    match app.view {
        View::Timer => render_timer(f, app, &theme),
        View::Tasks => render_tasks(f, app, &theme),
        View::Settings => render_settings(f, app, &theme),
        View::Help => render_help(f, &theme),
    }
}

fn panel<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// ============================================================================
// Timer View
// ============================================================================

fn render_timer(f: &mut Frame, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1), Constraint::Length(2)])
        .split(f.size());

    let header = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
        .title(Span::styled(" 🍅 POMOTERM ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
    f.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(chunks[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(body[1]);

    render_ring_panel(f, app, theme, body[0]);
    render_task_pane(f, app, theme, side[0]);
    render_stats_pane(f, app, theme, side[1]);
    render_notice(f, app, chunks[2]);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD));
    let controls = vec![
        Line::from(vec![
            key("Space"), Span::raw(" Pause/Resume  •  "),
            key("S"), Span::raw(" Skip  •  "),
            key("Esc"), Span::raw(" Stop  •  "),
            key("M"), Span::raw(" Music  •  "),
            key("E"), Span::raw(" Effects"),
        ]),
        Line::from(vec![
            key("T"), Span::raw(" Tasks  •  "),
            key("C"), Span::raw(" Settings  •  "),
            key("P"), Span::raw(" Preset  •  "),
            key("H"), Span::raw(" Help  •  "),
            key("Q"), Span::raw(" Quit"),
        ]),
    ];
    f.render_widget(
        Paragraph::new(controls).alignment(Alignment::Center).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn render_ring_panel(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let color = theme.phase(app.timer.phase());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(5), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    f.render_widget(
        Paragraph::new(app.timer.phase().name())
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        rows[0],
    );

    render_ring(f, app, color, rows[1]);

    let (status, status_color) = match app.timer.status() {
        Status::Running => (
            format!("{} RUNNING", if app.animation_frame < 10 { "●" } else { "○" }),
            Color::Green,
        ),
        Status::Paused => (
            format!("⏸  PAUSED{}", ".".repeat((app.animation_frame / 5) as usize % 4)),
            Color::Yellow,
        ),
        Status::Idle => ("■ READY  (Space to start)".to_string(), Color::Gray),
    };
    f.render_widget(
        Paragraph::new(status)
            .style(Style::default().fg(status_color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        rows[2],
    );

    let preset = app.timer.preset();
    let mut info = format!(
        "Pomodoro {} of {}",
        app.timer.cycle_position(),
        preset.cycle_length
    );
    if let Some(name) = &app.active_preset {
        info.push_str(&format!("  •  preset '{name}'"));
    }
    if app.timer.auto_start() {
        info.push_str("  •  auto");
    }
    let audio = if !app.audio.has_output() {
        "  •  no audio"
    } else {
        match (app.audio.music_enabled(), app.audio.effects_enabled()) {
            (true, true) => "  •  ♪ fx",
            (true, false) => "  •  ♪",
            (false, true) => "  •  fx",
            (false, false) => "  •  muted",
        }
    };
    info.push_str(audio);
    f.render_widget(
        Paragraph::new(info).style(Style::default().fg(Color::Gray)).alignment(Alignment::Center),
        rows[3],
    );
}

fn ring_points(from: f64, to: f64, radius: f64) -> Vec<(f64, f64)> {
    let start = (from * RING_POINTS as f64) as usize;
    let end = (to * RING_POINTS as f64) as usize;
    (start..end)
        .map(|i| {
            // Clockwise from twelve o'clock.
            let angle = FRAC_PI_2 - TAU * i as f64 / RING_POINTS as f64;
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

fn render_ring(f: &mut Frame, app: &App, color: Color, area: Rect) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    // Terminal cells are about twice as tall as wide.
    let half_width = area.width as f64 / (area.height as f64 * 2.0);
    let progress = app.timer.progress();
    let clock = format_clock(app.timer.remaining_secs());
    let char_width = 2.0 * half_width / area.width as f64;

    let mut done = Vec::new();
    let mut left = Vec::new();
    for radius in [0.92, 0.88, 0.84] {
        done.extend(ring_points(0.0, progress, radius));
        left.extend(ring_points(progress, 1.0, radius));
    }

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([-half_width, half_width])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            ctx.draw(&Points { coords: &left, color: Color::DarkGray });
            ctx.draw(&Points { coords: &done, color });
            let x = -(clock.len() as f64) * char_width / 2.0;
            ctx.print(
                x,
                0.0,
                Line::from(Span::styled(clock.clone(), Style::default().fg(color).add_modifier(Modifier::BOLD))),
            );
        });
    f.render_widget(canvas, area);
}

fn render_task_pane(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let items: Vec<ListItem> = if app.tasks.is_empty() {
        vec![ListItem::new(Span::styled("  No tasks. Press T to add one.", Style::default().fg(Color::DarkGray)))]
    } else {
        app.tasks
            .tasks()
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let selected = app.tasks.selected() == Some(idx);
                let mark = if task.done { "[x]" } else { "[ ]" };
                let style = match (task.done, selected) {
                    (true, _) => Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT),
                    (false, true) => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                    (false, false) => Style::default().fg(Color::Gray),
                };
                let prefix = if selected { "► " } else { "  " };
                ListItem::new(Line::from(vec![
                    Span::styled(prefix, Style::default().fg(theme.accent)),
                    Span::raw(format!("{mark} ")),
                    Span::styled(task.label.clone(), style),
                ]))
            })
            .collect()
    };
    f.render_widget(List::new(items).block(panel(" Tasks ", theme)), area);
}

fn stat_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("  {label}: ")),
        Span::styled(value, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ])
}

fn render_stats_pane(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let stats = app.tracker.stats();
    let now = Local::now();
    let today = session::today_tally(stats, &Filter::default(), now);
    let goal = app.settings.daily_goal_hours;

    let block = panel(" Stats ", theme);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(1)])
        .split(inner);

    let lines = vec![
        stat_line("This session", app.tracker.completed_this_run().to_string()),
        stat_line("Today", format!("{} ({:.1}h)", today.sessions, today.hours())),
        stat_line("All time", stats.completed_pomodoros.to_string()),
        stat_line("Focus total", format!("{:.1}h", stats.total_focus_seconds as f64 / 3600.0)),
    ];
    f.render_widget(Paragraph::new(lines), rows[0]);

    let ratio = session::goal_progress(stats, goal, now).clamp(0.0, 1.0);
    f.render_widget(
        LineGauge::default()
            .gauge_style(Style::default().fg(theme.accent))
            .label(format!("Goal {}h", format_hours(goal)))
            .ratio(ratio),
        rows[1],
    );
}

fn render_notice(f: &mut Frame, app: &App, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let (icon, color) = match notice.kind {
        NoticeKind::Info => ("ℹ", Color::Cyan),
        NoticeKind::Warning => ("⚠", Color::Yellow),
    };
    f.render_widget(
        Paragraph::new(format!("{icon} {}", notice.text))
            .style(Style::default().fg(color))
            .alignment(Alignment::Center),
        area,
    );
}

// ============================================================================
// Tasks View
// ============================================================================

fn render_tasks(f: &mut Frame, app: &App, theme: &Theme) {
    let area = centered_rect(80, 85, f.size());

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("📝 TASKS", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
        Line::from(""),
    ];

    let help = match app.mode {
        InputMode::AddingTask => "  Type task and press Enter to save  •  Esc to cancel",
        InputMode::EditingTask => "  Edit task and press Enter to save  •  Esc to cancel",
        InputMode::ConfirmingDelete => "  Y: Confirm  •  N/Esc: Cancel",
        _ => "  a: Add  •  e: Edit  •  x/Enter: Done  •  d: Delete  •  ↑↓/jk: Navigate  •  t/Esc: Close",
    };
    lines.push(Line::from(Span::styled(help, Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))));
    lines.push(Line::from(""));

    if matches!(app.mode, InputMode::AddingTask | InputMode::EditingTask) {
        let title = if app.mode == InputMode::AddingTask { "✏️  NEW TASK" } else { "✏️  EDITING" };
        lines.push(Line::from(Span::styled(format!("  {title}"), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))));
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(app.input.as_str(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::styled("█", Style::default().fg(Color::Green)),
        ]));
        lines.push(Line::from(""));
    }

    if app.mode == InputMode::ConfirmingDelete {
        if let Some(task) = app.tasks.selected_task() {
            lines.push(Line::from(Span::styled("  ⚠️  DELETE TASK?", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))));
            lines.push(Line::from(vec![Span::raw("  "), Span::styled(task.label.as_str(), Style::default().fg(Color::White))]));
            lines.push(Line::from(""));
        }
    }

    if app.tasks.is_empty() {
        lines.push(Line::from(Span::styled("  No tasks yet! Press 'a' to add one.", Style::default().fg(Color::Gray))));
    } else {
        let open = app.tasks.tasks().iter().filter(|t| !t.done).count();
        lines.push(Line::from(Span::styled(
            format!("  {open} OPEN  •  {} DONE", app.tasks.len() - open),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        for (idx, task) in app.tasks.tasks().iter().enumerate() {
            let selected = app.tasks.selected() == Some(idx);
            let style = if selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push(Line::from(vec![
                Span::styled(if selected { "► " } else { "  " }, Style::default().fg(theme.accent)),
                Span::raw(if task.done { "✓ " } else { "· " }),
                Span::styled(task.label.as_str(), style),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(panel(" Tasks ", theme)), area);
}

// ============================================================================
// Settings View
// ============================================================================

fn on_off(v: bool) -> String {
    if v { "ON".into() } else { "OFF".into() }
}

fn render_settings(f: &mut Frame, app: &App, theme: &Theme) {
    let area = centered_rect(70, 90, f.size());

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("⚙️  SETTINGS", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(
            "  ↑↓/jk: Navigate  •  Enter: Edit  •  Space: Toggle  •  ←→/hl: Themes",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let p = app.presets;
    let s = &app.settings;
    for field in SettingsField::ALL {
        let (label, value) = match field {
            SettingsField::Pomodoro => ("🎯 Pomodoro", format!("{} min", p.pomodoro)),
            SettingsField::ShortBreak => ("☕ Short Break", format!("{} min", p.short_break)),
            SettingsField::LongBreak => ("🌴 Long Break", format!("{} min", p.long_break)),
            SettingsField::CycleLength => ("🔄 Pomodoros Before Long Break", p.cycle_length.to_string()),
            SettingsField::AutoStart => ("▶️  Auto-Start Next Phase", on_off(s.auto_start)),
            SettingsField::Music => ("🎵 Background Music", on_off(s.music_enabled)),
            SettingsField::Effects => ("🔔 Sound Effects", on_off(s.effects_enabled)),
            SettingsField::Notifications => ("💬 Notifications", on_off(s.notifications)),
            SettingsField::DailyGoal => ("🏁 Daily Goal", format!("{}h", format_hours(s.daily_goal_hours))),
            SettingsField::Theme => ("🎨 Theme", format!("< {} >", app.theme_name)),
        };

        let selected = app.settings_field == field;
        lines.push(Line::from(""));
        if selected && app.mode == InputMode::EditingSetting {
            lines.push(Line::from(Span::styled(
                format!("  > {label}"),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(vec![
                Span::raw("    "),
                Span::styled(app.input.as_str(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::styled("█", Style::default().fg(Color::Green)),
            ]));
        } else {
            let (prefix, label_style, value_style) = if selected {
                (
                    "  > ",
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )
            } else {
                ("    ", Style::default().fg(Color::Gray), Style::default().fg(Color::DarkGray))
            };
            lines.push(Line::from(vec![Span::styled(prefix, label_style), Span::styled(label, label_style)]));
            lines.push(Line::from(vec![Span::raw("    "), Span::styled(value, value_style)]));
        }
    }

    f.render_widget(Paragraph::new(lines).block(panel(" Settings ", theme)), area);
}

// ============================================================================
// Help View
// ============================================================================

fn help_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw("    "),
        Span::styled(key, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {desc}")),
    ])
}

fn render_help(f: &mut Frame, theme: &Theme) {
    let area = centered_rect(70, 85, f.size());
    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled("⌨️  KEYBOARD SHORTCUTS", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from("  Timer:"),
        help_line("Space", "Pause / resume (starts an idle phase)"),
        help_line("S", "Skip to next phase (not counted)"),
        help_line("Esc", "Stop and reset to a fresh pomodoro"),
        help_line("M", "Toggle background music"),
        help_line("E", "Toggle sound effects"),
        help_line("P", "Cycle named presets"),
        Line::from(""),
        Line::from("  Navigation:"),
        help_line("T", "Tasks"),
        help_line("C", "Settings"),
        help_line("H / ?", "Toggle help"),
        help_line("Q / Ctrl+C", "Quit (state is saved)"),
        Line::from(""),
        Line::from(Span::styled(
            "💡 Stats and tasks are saved on every phase change, stop, task edit and exit",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];
    f.render_widget(Paragraph::new(help_text).block(panel(" Help ", theme)), area);
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RunOptions;
    use crate::audio::AudioLayer;
    use crate::store::{SavedState, Store};
    use crate::tasks::Task;
    use ratatui::backend::TestBackend;

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 32)).expect("terminal");
        terminal.draw(|f| render(f, app)).expect("draw");
        terminal.backend().buffer().content.iter().map(|c| c.symbol()).collect()
    }

    fn app() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let saved = SavedState {
            tasks: vec![Task { label: "refactor parser".into(), done: false }],
            ..SavedState::default()
        };
        let app = App::new(saved, Store::in_dir(dir.path()), AudioLayer::silent(false, false), RunOptions::default());
        (app, dir)
    }

    #[test]
    fn timer_view_shows_clock_tasks_and_stats() {
        let (app, _dir) = app();
        let text = screen_text(&app);
        assert!(text.contains("25:00"));
        assert!(text.contains("refactor parser"));
        assert!(text.contains("Stats"));
        assert!(text.contains("READY"));
    }

    #[test]
    fn every_view_renders() {
        let (mut app, _dir) = app();
        for view in [View::Tasks, View::Settings, View::Help] {
            app.view = view;
            assert!(!screen_text(&app).trim().is_empty());
        }
    }

    #[test]
    fn ring_arc_grows_with_progress() {
        assert!(ring_points(0.0, 0.0, 1.0).is_empty());
        assert_eq!(ring_points(0.0, 0.5, 1.0).len(), RING_POINTS / 2);
        let first = ring_points(0.0, 1.0, 1.0)[0];
        assert!(first.0.abs() < 1e-9 && (first.1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let fallback = Theme::named("nope");
        let default = Theme::named("default");
        assert_eq!(fallback.accent, default.accent);
    }
}
