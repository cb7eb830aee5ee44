use crate::app::{format_hours, RunOptions};
use crate::session::{self, Filter, SessionStats, SessionTracker};
use crate::store::{SavedState, Store, StoreError};
use crate::timer::Preset;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::fmt::Write as _;
use std::path::PathBuf;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "🍅 pomoterm - A Terminal Pomodoro Timer")]
pub struct Args {
    /// Pomodoro length for this run, e.g. 25, 25m, 1h, 90s
    #[arg(short, long, value_parser = parse_duration)]
    pub work: Option<u32>,
    /// Short break length for this run
    #[arg(short, long, value_parser = parse_duration)]
    pub rest: Option<u32>,
    /// Long break length for this run
    #[arg(short, long, value_parser = parse_duration)]
    pub long_break: Option<u32>,
    /// Pomodoros before a long break
    #[arg(short, long)]
    pub sessions: Option<u32>,
    /// Start the next phase automatically
    #[arg(long)]
    pub auto: bool,
    /// Attribute completed pomodoros to this task (added if missing)
    #[arg(long)]
    pub task: Option<String>,
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    #[arg(short = 't', long)]
    pub theme: Option<String>,
    #[arg(long)]
    pub no_sound: bool,
    #[arg(long, env = "POMOTERM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
    /// Directory holding music.{ogg,mp3,wav,flac}
    #[arg(long)]
    pub sounds_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Cmd>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Cmd {
    /// Print focus statistics
    Stats {
        #[arg(value_enum, default_value_t = Period::Today)]
        period: Period,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Check or set the daily focus goal
    Goal {
        #[command(subcommand)]
        action: Option<GoalAction>,
    },
    /// Manage named presets
    Preset {
        #[command(subcommand)]
        action: Option<PresetAction>,
    },
    /// Zero all statistics and history
    ResetStats {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Total,
    Tasks,
}

#[derive(Subcommand, Clone, Debug)]
pub enum GoalAction {
    Set { hours: f64 },
    Check,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PresetAction {
    /// Save minutes for work, short break, long break and the cycle length
    Save {
        name: String,
        work: u32,
        rest: u32,
        long_break: u32,
        sessions: u32,
    },
    /// Launch the timer with a saved preset
    Use { name: String },
    List,
    Delete { name: String },
}

/// Accepts `25`, `25m`, `1h30m`, `90s`; yields whole minutes.
pub fn parse_duration(s: &str) -> Result<u32, String> {
    let s = s.trim().to_lowercase();
    if let Ok(minutes) = s.parse::<f64>() {
        return to_minutes(minutes * 60.0);
    }

    let mut secs = 0.0;
    let mut num = String::new();
    for c in s.chars() {
        match c {
            '0'..='9' | '.' => num.push(c),
            'h' => { secs += num.parse::<f64>().map_err(|_| "Invalid hours")? * 3600.0; num.clear(); }
            'm' => { secs += num.parse::<f64>().map_err(|_| "Invalid minutes")? * 60.0; num.clear(); }
            's' => { secs += num.parse::<f64>().map_err(|_| "Invalid seconds")?; num.clear(); }
            _ => return Err("Invalid format".into()),
        }
    }
    if !num.is_empty() {
        return Err("Missing unit after number".into());
    }
    to_minutes(secs)
}

fn to_minutes(secs: f64) -> Result<u32, String> {
    let minutes = (secs / 60.0).round();
    if !minutes.is_finite() {
        Err("Invalid duration".into())
    } else if minutes < 1.0 {
        Err("Duration must be at least one minute".into())
    } else if minutes > f64::from(u32::MAX) {
        Err("Duration too long".into())
    } else {
        Ok(minutes as u32)
    }
}

impl Args {
    pub fn run_options(&self) -> RunOptions {
        let overridden = self.work.is_some()
            || self.rest.is_some()
            || self.long_break.is_some()
            || self.sessions.is_some();
        RunOptions {
            preset: overridden.then_some(Preset {
                pomodoro: self.work.unwrap_or(0),
                short_break: self.rest.unwrap_or(0),
                long_break: self.long_break.unwrap_or(0),
                cycle_length: self.sessions.unwrap_or(0),
            }),
            preset_name: None,
            auto_start: self.auto.then_some(true),
            no_sound: self.no_sound,
            task: self.task.clone(),
            tags: self.tags.clone(),
            theme: self.theme.clone(),
        }
    }
}

/// Zero fields of a partial override fall back to the stored preset.
pub fn merge_preset(stored: Preset, partial: Preset) -> Preset {
    let pick = |v: u32, fallback: u32| if v == 0 { fallback } else { v };
    Preset {
        pomodoro: pick(partial.pomodoro, stored.pomodoro),
        short_break: pick(partial.short_break, stored.short_break),
        long_break: pick(partial.long_break, stored.long_break),
        cycle_length: pick(partial.cycle_length, stored.cycle_length),
    }
}

// ============================================================================
// Subcommands
// ============================================================================

pub enum Next {
    Exit,
    Launch { name: String, preset: Preset },
}

pub fn run(cmd: Cmd, store: &Store, mut saved: SavedState) -> Result<Next, StoreError> {
    match cmd {
        Cmd::Stats { period, task, tag } => {
            let filter = Filter { task, tag };
            print!("{}", report(period, &saved.stats, &filter, Local::now()));
        }
        Cmd::Goal { action: Some(GoalAction::Set { hours }) } => {
            if !hours.is_finite() || hours <= 0.0 {
                println!("Goal must be a positive number of hours");
                return Ok(Next::Exit);
            }
            saved.settings.daily_goal_hours = hours;
            store.save(&saved)?;
            info!("daily goal set to {hours}h");
            println!("Daily goal set to {}h", format_hours(hours));
        }
        Cmd::Goal { action: None | Some(GoalAction::Check) } => {
            print!("{}", goal_report(&saved.stats, saved.settings.daily_goal_hours, Local::now()));
        }
        Cmd::Preset { action: Some(PresetAction::Save { name, work, rest, long_break, sessions }) } => {
            let preset = Preset { pomodoro: work, short_break: rest, long_break, cycle_length: sessions }.sanitized();
            saved.named_presets.insert(name.clone(), preset);
            store.save(&saved)?;
            println!("Preset '{name}' saved");
        }
        Cmd::Preset { action: Some(PresetAction::Use { name }) } => {
            return match saved.named_presets.get(&name) {
                Some(preset) => Ok(Next::Launch { name, preset: *preset }),
                None => {
                    println!("Preset '{name}' not found");
                    Ok(Next::Exit)
                }
            };
        }
        Cmd::Preset { action: Some(PresetAction::Delete { name }) } => {
            if saved.named_presets.remove(&name).is_some() {
                store.save(&saved)?;
                println!("Preset '{name}' deleted");
            } else {
                println!("Preset '{name}' not found");
            }
        }
        Cmd::Preset { action: None | Some(PresetAction::List) } => {
            print!("{}", preset_list(&saved));
        }
        Cmd::ResetStats { yes } => {
            if !yes {
                println!("This erases all statistics. Re-run with --yes to confirm.");
                return Ok(Next::Exit);
            }
            let mut tracker = SessionTracker::new(std::mem::take(&mut saved.stats));
            tracker.reset();
            saved.stats = tracker.snapshot();
            store.save(&saved)?;
            info!("statistics reset");
            println!("Statistics reset");
        }
    }
    Ok(Next::Exit)
}

pub fn report(period: Period, stats: &SessionStats, filter: &Filter, now: DateTime<Local>) -> String {
    let mut out = String::new();
    match period {
        Period::Today => {
            let t = session::today_tally(stats, filter, now);
            let _ = writeln!(out, "Today: {:.1}h ({} sessions)", t.hours(), t.sessions);
        }
        Period::Week => {
            let days = session::week_breakdown(stats, filter, now);
            if days.iter().all(|(_, t)| t.sessions == 0) {
                let _ = writeln!(out, "No data for this week");
            } else {
                let _ = writeln!(out, "This week:");
                for (day, t) in days.iter().filter(|(_, t)| t.sessions > 0) {
                    let _ = writeln!(out, "{} {}: {:.1}h ({} sessions)", day.format("%a"), day, t.hours(), t.sessions);
                }
            }
        }
        Period::Total => {
            let t = session::total_tally(stats, filter);
            let _ = writeln!(out, "Total: {:.1}h ({} sessions) since {}", t.hours(), t.sessions, stats.since);
        }
        Period::Tasks => {
            let tasks = session::by_task(stats, filter);
            if tasks.is_empty() {
                let _ = writeln!(out, "No task data found");
            } else {
                let _ = writeln!(out, "By task:");
                for (task, t) in tasks {
                    let _ = writeln!(out, "{task}: {:.1}h ({} sessions)", t.hours(), t.sessions);
                }
            }
        }
    }
    out
}

pub fn goal_report(stats: &SessionStats, goal: f64, now: DateTime<Local>) -> String {
    let hours = session::today_tally(stats, &Filter::default(), now).hours();
    let mut out = format!(
        "Today: {hours:.1}h / {}h ({:.1}%)\n",
        format_hours(goal),
        session::goal_progress(stats, goal, now) * 100.0
    );
    if hours >= goal {
        out.push_str("Goal achieved!\n");
    } else {
        let _ = writeln!(out, "Remaining: {:.1}h", goal - hours);
    }
    out
}

fn preset_list(saved: &SavedState) -> String {
    if saved.named_presets.is_empty() {
        return "No presets saved\n".into();
    }
    let mut out = String::from("Saved presets:\n");
    for (name, p) in &saved.named_presets {
        let _ = writeln!(
            out,
            "  {name}: {}m work, {}m break, {}m long break every {}",
            p.pomodoro, p.short_break, p.long_break, p.cycle_length
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Phase, PhaseComplete};
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn parses_duration_forms() {
        assert_eq!(parse_duration("25"), Ok(25));
        assert_eq!(parse_duration("25m"), Ok(25));
        assert_eq!(parse_duration("1h30m"), Ok(90));
        assert_eq!(parse_duration(" 2H "), Ok(120));
        assert_eq!(parse_duration("90s"), Ok(2));
        assert!(parse_duration("10s").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("1h30").is_err());
    }

    #[test]
    fn cli_parses_flags_and_subcommands() {
        let args = Args::try_parse_from(["pomoterm", "-w", "50m", "--tags", "a,b", "--auto"]).unwrap();
        assert_eq!(args.work, Some(50));
        assert_eq!(args.tags, vec!["a", "b"]);
        let opts = args.run_options();
        assert_eq!(opts.auto_start, Some(true));
        assert_eq!(merge_preset(Preset::default(), opts.preset.unwrap()).pomodoro, 50);
        assert_eq!(merge_preset(Preset::default(), opts.preset.unwrap()).short_break, 5);

        let args = Args::try_parse_from(["pomoterm", "stats", "week", "--tag", "deep"]).unwrap();
        assert!(matches!(args.command, Some(Cmd::Stats { period: Period::Week, .. })));

        let args = Args::try_parse_from(["pomoterm"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.run_options().preset.is_none());
    }

    #[test]
    fn preset_commands_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::in_dir(dir.path());
        let save = Cmd::Preset {
            action: Some(PresetAction::Save { name: "deep".into(), work: 50, rest: 10, long_break: 30, sessions: 3 }),
        };
        run(save, &store, store.load()).unwrap();

        let saved = store.load();
        assert_eq!(saved.named_presets["deep"].pomodoro, 50);
        assert!(preset_list(&saved).contains("deep: 50m work"));

        let launch = run(Cmd::Preset { action: Some(PresetAction::Use { name: "deep".into() }) }, &store, saved).unwrap();
        assert!(matches!(launch, Next::Launch { preset: Preset { pomodoro: 50, .. }, .. }));

        run(Cmd::Preset { action: Some(PresetAction::Delete { name: "deep".into() }) }, &store, store.load()).unwrap();
        assert!(store.load().named_presets.is_empty());
    }

    #[test]
    fn goal_set_and_reset_stats_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::in_dir(dir.path());
        let mut saved = store.load();
        saved.stats.completed_pomodoros = 9;
        store.save(&saved).unwrap();

        run(Cmd::Goal { action: Some(GoalAction::Set { hours: 6.0 }) }, &store, store.load()).unwrap();
        assert_eq!(store.load().settings.daily_goal_hours, 6.0);

        run(Cmd::ResetStats { yes: false }, &store, store.load()).unwrap();
        assert_eq!(store.load().stats.completed_pomodoros, 9);
        run(Cmd::ResetStats { yes: true }, &store, store.load()).unwrap();
        let reset = store.load().stats;
        assert_eq!(reset.completed_pomodoros, 0);
        assert_eq!(reset.total_focus_seconds, 0);
        assert!(reset.history.is_empty());
        assert_eq!(store.load().settings.daily_goal_hours, 6.0);
    }

    #[test]
    fn reports_render_tallies() {
        let now = Local.with_ymd_and_hms(2024, 5, 15, 18, 0, 0).unwrap();
        let mut tracker = SessionTracker::new(SessionStats::default());
        let done = PhaseComplete {
            phase: Phase::Pomodoro,
            next: Phase::ShortBreak,
            duration: Duration::from_secs(1800),
            started_at: None,
            cycle_count: 1,
        };
        tracker.record_completion(&done, Some("write"), &[], now);
        tracker.record_completion(&done, Some("write"), &[], now);
        let stats = tracker.snapshot();
        let all = Filter::default();

        assert_eq!(report(Period::Today, &stats, &all, now), "Today: 1.0h (2 sessions)\n");
        assert!(report(Period::Week, &stats, &all, now).contains("Wed 2024-05-15: 1.0h (2 sessions)"));
        assert!(report(Period::Total, &stats, &all, now).starts_with("Total: 1.0h (2 sessions)"));
        assert_eq!(report(Period::Tasks, &stats, &all, now), "By task:\nwrite: 1.0h (2 sessions)\n");
        assert_eq!(report(Period::Tasks, &SessionStats::default(), &all, now), "No task data found\n");

        let goal = goal_report(&stats, 2.0, now);
        assert!(goal.starts_with("Today: 1.0h / 2h (50.0%)"));
        assert!(goal.contains("Remaining: 1.0h"));
        assert!(goal_report(&stats, 1.0, now).contains("Goal achieved!"));
    }
}
