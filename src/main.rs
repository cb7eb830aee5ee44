mod app;
mod audio;
mod cli;
mod session;
mod store;
mod tasks;
mod timer;
mod ui;

use app::{App, Flow};
use audio::AudioLayer;
use clap::Parser;
use cli::{Args, Next};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use env_logger::{Env, Target};
use log::info;
use ratatui::prelude::*;
use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use store::Store;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
const TICK_RATE: Duration = Duration::from_millis(50);
const LOG_FILE: &str = "pomoterm.log";

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("pomoterm")
}

/// The terminal belongs to the UI, so log records go to a file.
fn init_logging(data_dir: &Path) {
    if fs::create_dir_all(data_dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(data_dir.join(LOG_FILE)) else {
        return;
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    init_logging(&data_dir);
    info!("pomoterm {} starting, data dir {}", env!("CARGO_PKG_VERSION"), data_dir.display());

    let store = Store::in_dir(&data_dir);
    let saved = store.load();

    let mut opts = args.run_options();
    match args.command.clone() {
        Some(cmd) => match cli::run(cmd, &store, saved.clone())? {
            Next::Exit => return Ok(()),
            Next::Launch { name, preset } => {
                opts.preset = Some(preset);
                opts.preset_name = Some(name);
            }
        },
        None => opts.preset = opts.preset.map(|partial| cli::merge_preset(saved.presets, partial)),
    }

    let sounds_dir = args.sounds_dir.clone().unwrap_or_else(|| data_dir.join("sounds"));
    let (audio, audio_err) =
        AudioLayer::open(&sounds_dir, saved.settings.music_enabled, saved.settings.effects_enabled);
    let mut app = App::new(saved, store, audio, opts);
    if let Some(e) = audio_err {
        app.warn(format!("Audio: {e}"));
    }

    let res = run_tui(&mut app);
    close(&mut app, res, restore_terminal)
}

fn run_tui(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    run(&mut terminal, app)
}

/// Every step runs even when an earlier one fails.
fn restore_terminal() -> Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(io::stdout(), LeaveAlternateScreen, Show);
    raw?;
    screen?;
    Ok(())
}

/// State is saved before teardown, so a terminal error cannot lose it.
fn close(app: &mut App, res: Result<()>, restore: impl FnOnce() -> Result<()>) -> Result<()> {
    app.shutdown();
    let restored = restore();
    res.and(restored)
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) == Flow::Quit {
                    return Ok(());
                }
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_tick);
        if elapsed >= TICK_RATE {
            app.tick(elapsed);
            last_tick = now;
        }
    }
}
