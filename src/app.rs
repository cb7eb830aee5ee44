use crate::audio::{AudioError, AudioLayer, Cue};
use crate::session::SessionTracker;
use crate::store::{SavedState, Settings, Store};
use crate::tasks::TaskList;
use crate::timer::{Phase, PhaseComplete, Preset, Timer};
use crate::ui::THEMES;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info, warn};
use notify_rust::{Notification, Urgency};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const NOTICE_TTL: Duration = Duration::from_secs(5);

// ============================================================================
// Commands & Modes
// ============================================================================

/// Timer-level commands reachable from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    Skip,
    Stop,
    ToggleMusic,
    ToggleEffects,
    NextPreset,
    Show(View),
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum View {
    Timer,
    Tasks,
    Settings,
    Help,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InputMode {
    Normal,
    AddingTask,
    EditingTask,
    ConfirmingDelete,
    EditingSetting,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SettingsField {
    Pomodoro,
    ShortBreak,
    LongBreak,
    CycleLength,
    AutoStart,
    Music,
    Effects,
    Notifications,
    DailyGoal,
    Theme,
}

impl SettingsField {
    pub const ALL: [SettingsField; 10] = [
        Self::Pomodoro,
        Self::ShortBreak,
        Self::LongBreak,
        Self::CycleLength,
        Self::AutoStart,
        Self::Music,
        Self::Effects,
        Self::Notifications,
        Self::DailyGoal,
        Self::Theme,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    shown_at: Instant,
}

/// Per-run overrides from the command line; never written back as the
/// stored preset or settings.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub preset: Option<Preset>,
    pub preset_name: Option<String>,
    pub auto_start: Option<bool>,
    pub no_sound: bool,
    pub task: Option<String>,
    pub tags: Vec<String>,
    pub theme: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub timer: Timer,
    pub tracker: SessionTracker,
    pub tasks: TaskList,
    pub presets: Preset,
    pub named_presets: BTreeMap<String, Preset>,
    pub active_preset: Option<String>,
    pub settings: Settings,
    pub audio: AudioLayer,
    pub tags: Vec<String>,
    pub theme_name: String,
    pub view: View,
    pub mode: InputMode,
    pub input: String,
    pub settings_field: SettingsField,
    pub notice: Option<Notice>,
    pub animation_frame: u8,
    store: Store,
}

impl App {
    pub fn new(saved: SavedState, store: Store, mut audio: AudioLayer, opts: RunOptions) -> Self {
        let SavedState { presets, tasks, stats, settings, named_presets } = saved;

        let auto_start = opts.auto_start.unwrap_or(settings.auto_start);
        let timer = Timer::new(opts.preset.unwrap_or(presets), auto_start);

        if opts.no_sound {
            audio.set_music_enabled(false);
            audio.set_effects_enabled(false);
        }

        let mut tasks = TaskList::from(tasks);
        if let Some(label) = opts.task.as_deref() {
            tasks.focus_label(label);
        }

        let theme_name = opts.theme.unwrap_or_else(|| settings.theme.clone());

        Self {
            timer,
            tracker: SessionTracker::new(stats),
            tasks,
            presets,
            named_presets,
            active_preset: opts.preset_name,
            settings,
            audio,
            tags: opts.tags,
            theme_name,
            view: View::Timer,
            mode: InputMode::Normal,
            input: String::new(),
            settings_field: SettingsField::Pomodoro,
            notice: None,
            animation_frame: 0,
            store,
        }
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            presets: self.presets,
            tasks: self.tasks.to_vec(),
            stats: self.tracker.snapshot(),
            settings: self.settings.clone(),
            named_presets: self.named_presets.clone(),
        }
    }

    /// Persists everything; a failure becomes a notice, never an abort.
    pub fn checkpoint(&mut self, reason: &str) {
        debug!("checkpoint: {reason} -> {}", self.store.path().display());
        if let Err(e) = self.store.save(&self.saved_state()) {
            warn!("save after {reason} failed: {e}");
            self.warn(format!("Could not save: {e}"));
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice { text: text.into(), kind: NoticeKind::Info, shown_at: Instant::now() });
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice { text: text.into(), kind: NoticeKind::Warning, shown_at: Instant::now() });
    }

    fn audio_notice(&mut self, err: Option<AudioError>) {
        if let Some(e) = err {
            self.warn(format!("Audio: {e}"));
        }
    }

    pub fn sync_music(&mut self) {
        let err = self.audio.sync_music(self.timer.is_running());
        self.audio_notice(err);
    }

    pub fn tick(&mut self, elapsed: Duration) {
        if let Some(done) = self.timer.tick(elapsed) {
            self.on_phase_complete(done);
        }
        self.sync_music();

        self.animation_frame = self.animation_frame.wrapping_add(1) % 20;
        if self.notice.as_ref().is_some_and(|n| n.shown_at.elapsed() >= NOTICE_TTL) {
            self.notice = None;
        }
    }

    fn on_phase_complete(&mut self, done: PhaseComplete) {
        let task = self.tasks.current().map(str::to_owned);
        self.tracker.record_completion(&done, task.as_deref(), &self.tags, Local::now());
        info!(
            "{} complete ({}s), next {}",
            done.phase.label(),
            done.duration.as_secs(),
            done.next.label()
        );

        let cue = if done.phase == Phase::Pomodoro { Cue::FocusOver } else { Cue::BreakOver };
        let err = self.audio.cue(cue);
        self.audio_notice(err);

        if self.settings.notifications {
            let (title, body) = match done.next {
                Phase::LongBreak => ("Long Break Time! 🌴", "Great work! Take a longer break."),
                Phase::ShortBreak => ("Break Time! ☕", "Time for a short break."),
                Phase::Pomodoro => ("Back to Work! 🎯", "Let's focus on your next session."),
            };
            notify(title, body);
        }

        self.checkpoint("phase completion");
    }

    pub fn dispatch(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::TogglePause => self.timer.toggle(),
            Command::Skip => {
                let left = self.timer.remaining();
                let next = self.timer.skip();
                info!("skipped to {} with {}s left", next.label(), left.as_secs());
                let err = self.audio.cue(Cue::Skip);
                self.audio_notice(err);
            }
            Command::Stop => {
                info!("timer stopped after {} pomodoros this cycle", self.timer.cycle_count());
                self.timer.stop();
                self.checkpoint("stop");
            }
            Command::ToggleMusic => {
                self.settings.music_enabled = self.audio.toggle_music();
                let state = if self.settings.music_enabled { "on" } else { "off" };
                self.info(format!("Music {state}"));
            }
            Command::ToggleEffects => {
                self.settings.effects_enabled = self.audio.toggle_effects();
                let state = if self.settings.effects_enabled { "on" } else { "off" };
                self.info(format!("Sound effects {state}"));
            }
            Command::NextPreset => self.next_preset(),
            Command::Show(view) => {
                self.view = if self.view == view { View::Timer } else { view };
            }
            Command::Quit => return Flow::Quit,
        }
        self.sync_music();
        Flow::Continue
    }

    fn next_preset(&mut self) {
        if self.named_presets.is_empty() {
            self.info("No named presets; save one with `pomoterm preset save`");
            return;
        }
        let names: Vec<&String> = self.named_presets.keys().collect();
        let idx = self
            .active_preset
            .as_ref()
            .and_then(|cur| names.iter().position(|n| *n == cur))
            .map_or(0, |i| (i + 1) % names.len());
        let name = names[idx].clone();
        let preset = self.named_presets[&name];

        self.timer.set_preset(preset);
        self.info(format!(
            "Preset '{name}': {}m / {}m / {}m",
            preset.pomodoro, preset.short_break, preset.long_break
        ));
        self.active_preset = Some(name);
    }

    pub fn shutdown(&mut self) {
        if self.audio.music_playing() {
            self.audio.sync_music(false);
        }
        self.checkpoint("exit");
        info!("session ended with {} pomodoros", self.tracker.completed_this_run());
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.mode {
            InputMode::AddingTask | InputMode::EditingTask | InputMode::EditingSetting => {
                self.handle_text_input(key);
                return Flow::Continue;
            }
            InputMode::ConfirmingDelete => {
                self.handle_delete_confirm(key);
                return Flow::Continue;
            }
            InputMode::Normal => {}
        }

        match self.view {
            View::Tasks => self.handle_tasks_view(key),
            View::Settings => self.handle_settings_view(key),
            View::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q' | 'h' | '?')) {
                    self.view = View::Timer;
                }
            }
            View::Timer => {
                if let Some(cmd) = timer_keymap(key) {
                    return self.dispatch(cmd);
                }
            }
        }
        Flow::Continue
    }

    fn handle_text_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.input);
                match self.mode {
                    InputMode::AddingTask => {
                        if self.tasks.add(&text) {
                            self.checkpoint("task added");
                        }
                    }
                    InputMode::EditingTask => {
                        if self.tasks.edit_selected(&text) {
                            self.checkpoint("task edited");
                        }
                    }
                    InputMode::EditingSetting => self.apply_setting(&text),
                    _ => {}
                }
                self.mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                self.input.clear();
            }
            _ => {}
        }
    }

    fn handle_delete_confirm(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y' | 'Y') => {
                if self.tasks.remove_selected() {
                    self.checkpoint("task removed");
                }
                self.mode = InputMode::Normal;
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => self.mode = InputMode::Normal,
            _ => {}
        }
    }

    fn handle_tasks_view(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q' | 't') => self.view = View::Timer,
            KeyCode::Char('a' | 'n') => {
                self.input.clear();
                self.mode = InputMode::AddingTask;
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.tasks.selected_task() {
                    self.input = task.label.clone();
                    self.mode = InputMode::EditingTask;
                }
            }
            KeyCode::Char('x') | KeyCode::Enter => {
                if self.tasks.toggle_selected() {
                    self.checkpoint("task toggled");
                }
            }
            KeyCode::Char('d') => {
                if self.tasks.selected_task().is_some() {
                    self.mode = InputMode::ConfirmingDelete;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.tasks.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.tasks.select_prev(),
            _ => {}
        }
    }

    fn handle_settings_view(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q' | 'c') => self.view = View::Timer,
            KeyCode::Down | KeyCode::Char('j') => self.settings_field = self.settings_field.next(),
            KeyCode::Up | KeyCode::Char('k') => self.settings_field = self.settings_field.prev(),
            KeyCode::Enter | KeyCode::Char('e') => self.start_editing(),
            KeyCode::Char(' ') => self.toggle_setting(),
            KeyCode::Left | KeyCode::Char('h') => self.cycle_theme(false),
            KeyCode::Right | KeyCode::Char('l') => self.cycle_theme(true),
            _ => {}
        }
    }

    fn start_editing(&mut self) {
        let current = match self.settings_field {
            SettingsField::Pomodoro => self.presets.pomodoro.to_string(),
            SettingsField::ShortBreak => self.presets.short_break.to_string(),
            SettingsField::LongBreak => self.presets.long_break.to_string(),
            SettingsField::CycleLength => self.presets.cycle_length.to_string(),
            SettingsField::DailyGoal => format_hours(self.settings.daily_goal_hours),
            _ => return self.toggle_setting(),
        };
        self.input = current;
        self.mode = InputMode::EditingSetting;
    }

    fn apply_setting(&mut self, text: &str) {
        let text = text.trim();
        let in_range = |lo: u32, hi: u32| text.parse::<u32>().ok().filter(|v| (lo..=hi).contains(v));

        // The live preset may carry per-run overrides; only the edited field changes.
        let mut stored = self.presets;
        let mut live = self.timer.preset();
        let accepted = match self.settings_field {
            SettingsField::Pomodoro => in_range(1, 240)
                .map(|v| (stored.pomodoro, live.pomodoro) = (v, v))
                .is_some(),
            SettingsField::ShortBreak => in_range(1, 60)
                .map(|v| (stored.short_break, live.short_break) = (v, v))
                .is_some(),
            SettingsField::LongBreak => in_range(1, 120)
                .map(|v| (stored.long_break, live.long_break) = (v, v))
                .is_some(),
            SettingsField::CycleLength => in_range(1, 10)
                .map(|v| (stored.cycle_length, live.cycle_length) = (v, v))
                .is_some(),
            SettingsField::DailyGoal => match text.parse::<f64>() {
                Ok(h) if (0.5..=24.0).contains(&h) => {
                    self.settings.daily_goal_hours = h;
                    true
                }
                _ => false,
            },
            _ => false,
        };

        if !accepted {
            self.warn(format!("Invalid value '{text}'"));
            return;
        }
        self.presets = stored;
        if live != self.timer.preset() {
            self.active_preset = None;
            self.timer.set_preset(live);
        }
        self.checkpoint("settings change");
    }

    fn toggle_setting(&mut self) {
        match self.settings_field {
            SettingsField::AutoStart => {
                self.settings.auto_start = !self.settings.auto_start;
                self.timer.set_auto_start(self.settings.auto_start);
            }
            SettingsField::Music => {
                self.settings.music_enabled = self.audio.toggle_music();
                self.sync_music();
            }
            SettingsField::Effects => self.settings.effects_enabled = self.audio.toggle_effects(),
            SettingsField::Notifications => self.settings.notifications = !self.settings.notifications,
            _ => return,
        }
        self.checkpoint("settings change");
    }

    fn cycle_theme(&mut self, forward: bool) {
        if self.settings_field != SettingsField::Theme {
            return;
        }
        let idx = THEMES.iter().position(|&t| t == self.theme_name).unwrap_or(0);
        let new_idx = if forward {
            (idx + 1) % THEMES.len()
        } else {
            (idx + THEMES.len() - 1) % THEMES.len()
        };
        self.theme_name = THEMES[new_idx].into();
        self.settings.theme = self.theme_name.clone();
        self.checkpoint("settings change");
    }
}

pub fn timer_keymap(key: KeyEvent) -> Option<Command> {
    let cmd = match key.code {
        KeyCode::Char(' ') => Command::TogglePause,
        KeyCode::Char('s' | 'S') => Command::Skip,
        KeyCode::Char('m' | 'M') => Command::ToggleMusic,
        KeyCode::Char('e' | 'E') => Command::ToggleEffects,
        KeyCode::Esc => Command::Stop,
        KeyCode::Char('p') => Command::NextPreset,
        KeyCode::Char('t') => Command::Show(View::Tasks),
        KeyCode::Char('c') => Command::Show(View::Settings),
        KeyCode::Char('h' | '?') => Command::Show(View::Help),
        KeyCode::Char('q') => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

pub fn format_hours(h: f64) -> String {
    if h.fract() == 0.0 { format!("{}", h as u64) } else { format!("{h:.1}") }
}

// ============================================================================
// Utilities
// ============================================================================

fn notify(title: &str, body: &str) {
    let shown = Notification::new()
        .summary(title)
        .body(body)
        .appname("pomoterm")
        .icon("alarm-clock")
        .urgency(Urgency::Critical)
        .show();
    if let Err(e) = shown {
        warn!("desktop notification failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::Recorder;
    use crate::timer::Status;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn quiet_state() -> SavedState {
        SavedState {
            settings: Settings { notifications: false, ..Settings::default() },
            ..SavedState::default()
        }
    }

    fn app_with(saved: SavedState, opts: RunOptions) -> (App, TempDir, Recorder) {
        let dir = tempfile::tempdir().expect("tempdir");
        let rec = Recorder::default();
        let audio = AudioLayer::new(Box::new(rec.clone()), true, true);
        let app = App::new(saved, Store::in_dir(dir.path()), audio, opts);
        (app, dir, rec)
    }

    fn app() -> (App, TempDir, Recorder) {
        app_with(quiet_state(), RunOptions::default())
    }

    fn stored(dir: &TempDir) -> SavedState {
        Store::in_dir(dir.path()).load()
    }

    #[test]
    fn space_toggles_running() {
        let (mut app, _dir, _) = app();
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.timer.is_running());
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.timer.status(), Status::Paused);
    }

    #[test]
    fn natural_completion_records_and_saves() {
        let (mut app, dir, rec) = app();
        app.tasks.add("write");
        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_secs(1500));

        assert_eq!(app.timer.phase(), Phase::ShortBreak);
        assert_eq!(app.tracker.stats().completed_pomodoros, 1);
        assert_eq!(app.tracker.stats().history[0].task.as_deref(), Some("write"));
        assert!(rec.calls.borrow().contains(&"cue FocusOver".to_string()));

        let saved = stored(&dir);
        assert_eq!(saved.stats.completed_pomodoros, 1);
        assert_eq!(saved.stats.total_focus_seconds, 1500);
    }

    #[test]
    fn skip_never_credits() {
        let (mut app, _dir, rec) = app();
        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_secs(1000));
        app.handle_key(key(KeyCode::Char('s')));

        assert_eq!(app.timer.phase(), Phase::ShortBreak);
        assert_eq!(app.tracker.stats().completed_pomodoros, 0);
        assert!(app.tracker.stats().history.is_empty());
        assert!(rec.calls.borrow().contains(&"cue Skip".to_string()));
    }

    #[test]
    fn escape_stops_and_saves() {
        let (mut app, dir, _) = app();
        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_secs(60));
        app.handle_key(key(KeyCode::Esc));

        assert_eq!(app.timer.status(), Status::Idle);
        assert_eq!(app.timer.remaining_secs(), 1500);
        assert!(dir.path().join("state.json").exists());
    }

    #[test]
    fn music_follows_running_state() {
        let (mut app, _dir, rec) = app();
        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_millis(50));
        app.dispatch(Command::TogglePause);
        assert_eq!(*rec.calls.borrow(), vec!["start", "stop"]);
    }

    #[test]
    fn m_mutes_music_only() {
        let (mut app, _dir, _) = app();
        app.handle_key(key(KeyCode::Char('m')));
        assert!(!app.settings.music_enabled);
        assert!(app.settings.effects_enabled);
        assert!(!app.audio.music_enabled());
        assert!(app.audio.effects_enabled());
    }

    #[test]
    fn task_edits_are_checkpoints() {
        let (mut app, dir, _) = app();
        app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(app.view, View::Tasks);

        app.handle_key(key(KeyCode::Char('a')));
        for c in "plan week".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(stored(&dir).tasks[0].label, "plan week");

        app.handle_key(key(KeyCode::Char('x')));
        assert!(stored(&dir).tasks[0].done);

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('y')));
        assert!(stored(&dir).tasks.is_empty());
    }

    #[test]
    fn typing_in_task_input_does_not_trigger_commands() {
        let (mut app, _dir, _) = app();
        app.view = View::Tasks;
        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(key(KeyCode::Char('q')));
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.input, "q ");
        assert!(!app.timer.is_running());
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), Flow::Continue);
    }

    #[test]
    fn quit_keys() {
        let (mut app, _dir, _) = app();
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), Flow::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c), Flow::Quit);
    }

    #[test]
    fn run_overrides_are_not_persisted() {
        let opts = RunOptions {
            preset: Some(Preset { pomodoro: 50, ..Preset::default() }),
            auto_start: Some(true),
            no_sound: true,
            task: Some("deep work".into()),
            tags: vec!["focus".into()],
            ..RunOptions::default()
        };
        let (mut app, dir, _) = app_with(quiet_state(), opts);
        assert_eq!(app.timer.remaining_secs(), 3000);
        assert!(app.timer.auto_start());
        assert!(!app.audio.music_enabled());
        assert_eq!(app.tasks.current(), Some("deep work"));

        app.shutdown();
        let saved = stored(&dir);
        assert_eq!(saved.presets, Preset::default());
        assert!(!saved.settings.auto_start);
        assert!(saved.settings.music_enabled);
        assert_eq!(saved.tasks[0].label, "deep work");
    }

    #[test]
    fn settings_edit_updates_stored_preset() {
        let (mut app, dir, _) = app();
        app.view = View::Settings;
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input, "25");
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Char('4')));
        app.handle_key(key(KeyCode::Char('0')));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.timer.remaining_secs(), 2400);
        assert_eq!(stored(&dir).presets.pomodoro, 40);
    }

    #[test]
    fn settings_edit_keeps_other_run_overrides() {
        let opts = RunOptions {
            preset: Some(Preset { pomodoro: 50, ..Preset::default() }),
            ..RunOptions::default()
        };
        let (mut app, dir, _) = app_with(quiet_state(), opts);
        app.view = View::Settings;
        app.settings_field = SettingsField::ShortBreak;
        app.handle_key(key(KeyCode::Enter));
        app.input = "7".into();
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.timer.preset().pomodoro, 50);
        assert_eq!(app.timer.preset().short_break, 7);
        assert_eq!(app.timer.remaining_secs(), 3000);
        let saved = stored(&dir);
        assert_eq!(saved.presets.pomodoro, 25);
        assert_eq!(saved.presets.short_break, 7);
    }

    #[test]
    fn preset_switch_mid_pomodoro_credits_real_focus_time() {
        let mut saved = quiet_state();
        saved.named_presets.insert("long".into(), Preset { pomodoro: 50, ..Preset::default() });
        let (mut app, dir, _) = app_with(saved, RunOptions::default());

        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_secs(60));
        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(app.timer.preset().pomodoro, 50);
        let left = app.timer.remaining();
        app.tick(left);

        assert_eq!(app.tracker.stats().completed_pomodoros, 1);
        assert_eq!(app.tracker.stats().total_focus_seconds, 1500);
        assert_eq!(app.tracker.stats().history[0].seconds, 1500);
        assert_eq!(stored(&dir).stats.total_focus_seconds, 1500);
    }

    #[test]
    fn invalid_setting_is_rejected_with_notice() {
        let (mut app, _dir, _) = app();
        app.view = View::Settings;
        app.settings_field = SettingsField::CycleLength;
        app.handle_key(key(KeyCode::Enter));
        app.input = "99".into();
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.presets.cycle_length, 4);
        assert_eq!(app.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Warning));
    }

    #[test]
    fn named_presets_cycle() {
        let mut saved = quiet_state();
        saved.named_presets.insert("a".into(), Preset { pomodoro: 10, ..Preset::default() });
        saved.named_presets.insert("b".into(), Preset { pomodoro: 20, ..Preset::default() });
        let (mut app, _dir, _) = app_with(saved, RunOptions::default());

        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(app.active_preset.as_deref(), Some("a"));
        assert_eq!(app.timer.remaining_secs(), 600);
        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(app.timer.remaining_secs(), 1200);
        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(app.active_preset.as_deref(), Some("a"));
    }

    #[test]
    fn failed_save_surfaces_notice_and_keeps_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let audio = AudioLayer::silent(false, false);
        let mut app = App::new(quiet_state(), Store::in_dir(&blocker), audio, RunOptions::default());

        app.dispatch(Command::TogglePause);
        app.tick(Duration::from_secs(1500));

        assert_eq!(app.tracker.stats().completed_pomodoros, 1);
        assert_eq!(app.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Warning));
    }

    #[test]
    fn settings_fields_wrap() {
        assert_eq!(SettingsField::Theme.next(), SettingsField::Pomodoro);
        assert_eq!(SettingsField::Pomodoro.prev(), SettingsField::Theme);
    }
}
