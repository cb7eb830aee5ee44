use crate::timer::{Phase, PhaseComplete};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_HISTORY: usize = 1000;
const DAILY_FMT: &str = "%Y-%m-%d";

// ============================================================================
// Data Models
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub seconds: u64,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub completed_pomodoros: u32,
    pub total_focus_seconds: u64,
    /// Day the counters started accumulating.
    #[serde(default = "today")]
    pub since: String,
    #[serde(default)]
    pub history: Vec<SessionRecord>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            completed_pomodoros: 0,
            total_focus_seconds: 0,
            since: today(),
            history: Vec::new(),
        }
    }
}

fn today() -> String {
    Local::now().format(DAILY_FMT).to_string()
}

// ============================================================================
// Tracker
// ============================================================================

/// Owns the live stats for one run. Counters only ever grow here; `reset`
/// is the single way back to zero.
#[derive(Debug)]
pub struct SessionTracker {
    stats: SessionStats,
    completed_this_run: u32,
}

impl SessionTracker {
    pub fn new(stats: SessionStats) -> Self {
        Self { stats, completed_this_run: 0 }
    }

    pub fn record_completion(
        &mut self,
        done: &PhaseComplete,
        task: Option<&str>,
        tags: &[String],
        now: DateTime<Local>,
    ) {
        let seconds = done.duration.as_secs();
        if done.phase == Phase::Pomodoro {
            self.stats.completed_pomodoros += 1;
            self.stats.total_focus_seconds += seconds;
            self.completed_this_run += 1;
        }

        let start = done
            .started_at
            .unwrap_or_else(|| now - ChronoDuration::seconds(seconds as i64));
        self.stats.history.push(SessionRecord {
            start,
            end: now,
            seconds,
            phase: done.phase,
            task: task.map(str::to_owned),
            tags: tags.to_vec(),
        });

        if self.stats.history.len() > MAX_HISTORY {
            let excess = self.stats.history.len() - MAX_HISTORY;
            self.stats.history.drain(..excess);
        }
    }

    pub fn snapshot(&self) -> SessionStats {
        self.stats.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn completed_this_run(&self) -> u32 {
        self.completed_this_run
    }

    pub fn reset(&mut self) {
        self.stats = SessionStats::default();
        self.completed_this_run = 0;
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tally {
    pub sessions: u32,
    pub seconds: u64,
}

impl Tally {
    fn add(&mut self, record: &SessionRecord) {
        self.sessions += 1;
        self.seconds += record.seconds;
    }

    pub fn hours(&self) -> f64 {
        self.seconds as f64 / 3600.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub task: Option<String>,
    pub tag: Option<String>,
}

impl Filter {
    fn matches(&self, record: &SessionRecord) -> bool {
        let task_ok = self
            .task
            .as_deref()
            .is_none_or(|t| record.task.as_deref() == Some(t));
        let tag_ok = self
            .tag
            .as_deref()
            .is_none_or(|t| record.tags.iter().any(|tag| tag == t));
        task_ok && tag_ok
    }
}

fn focus_records<'a>(
    stats: &'a SessionStats,
    filter: &'a Filter,
) -> impl Iterator<Item = &'a SessionRecord> + 'a {
    stats
        .history
        .iter()
        .filter(move |r| r.phase == Phase::Pomodoro && filter.matches(r))
}

pub fn today_tally(stats: &SessionStats, filter: &Filter, now: DateTime<Local>) -> Tally {
    let day = now.date_naive();
    let mut tally = Tally::default();
    for record in focus_records(stats, filter).filter(|r| r.start.date_naive() == day) {
        tally.add(record);
    }
    tally
}

/// Per-day tallies from Monday of the current week up to and including today.
pub fn week_breakdown(
    stats: &SessionStats,
    filter: &Filter,
    now: DateTime<Local>,
) -> Vec<(NaiveDate, Tally)> {
    let today = now.date_naive();
    let monday = today - ChronoDuration::days(i64::from(today.weekday().num_days_from_monday()));
    let mut days: Vec<(NaiveDate, Tally)> = monday
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|d| (d, Tally::default()))
        .collect();

    for record in focus_records(stats, filter) {
        let day = record.start.date_naive();
        if let Some((_, tally)) = days.iter_mut().find(|(d, _)| *d == day) {
            tally.add(record);
        }
    }
    days
}

/// With no filter this mirrors the persistent counters; with one it can only
/// see what is still in the bounded history.
pub fn total_tally(stats: &SessionStats, filter: &Filter) -> Tally {
    if filter.task.is_none() && filter.tag.is_none() {
        return Tally {
            sessions: stats.completed_pomodoros,
            seconds: stats.total_focus_seconds,
        };
    }
    let mut tally = Tally::default();
    for record in focus_records(stats, filter) {
        tally.add(record);
    }
    tally
}

/// Focus time grouped by task label, most hours first.
pub fn by_task(stats: &SessionStats, filter: &Filter) -> Vec<(String, Tally)> {
    let mut tasks: HashMap<String, Tally> = HashMap::new();
    for record in focus_records(stats, filter) {
        if let Some(task) = &record.task {
            tasks.entry(task.clone()).or_default().add(record);
        }
    }
    let mut tasks: Vec<_> = tasks.into_iter().collect();
    tasks.sort_by(|a, b| b.1.seconds.cmp(&a.1.seconds).then_with(|| a.0.cmp(&b.0)));
    tasks
}

/// Fraction of the daily goal reached today; may exceed 1.
pub fn goal_progress(stats: &SessionStats, goal_hours: f64, now: DateTime<Local>) -> f64 {
    if goal_hours <= 0.0 {
        return 0.0;
    }
    today_tally(stats, &Filter::default(), now).hours() / goal_hours
}
