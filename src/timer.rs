use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Phases & Presets
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Pomodoro,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pomodoro => "🎯 FOCUS TIME",
            Self::ShortBreak => "☕ SHORT BREAK",
            Self::LongBreak => "🌴 LONG BREAK",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }
}

/// Phase durations in whole minutes plus the number of pomodoros per cycle.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub pomodoro: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub cycle_length: u32,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            pomodoro: 25,
            short_break: 5,
            long_break: 15,
            cycle_length: 4,
        }
    }
}

impl Preset {
    pub fn minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Pomodoro => self.pomodoro,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    pub fn duration(&self, phase: Phase) -> Duration {
        Duration::from_secs(u64::from(self.minutes(phase)) * 60)
    }

    /// Zero-length phases and cycles would stall the state machine.
    pub fn sanitized(self) -> Self {
        Self {
            pomodoro: self.pomodoro.max(1),
            short_break: self.short_break.max(1),
            long_break: self.long_break.max(1),
            cycle_length: self.cycle_length.max(1),
        }
    }
}

// ============================================================================
// Timer State Machine
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Phase loaded at full length, countdown not started.
    Idle,
    Running,
    Paused,
}

/// Emitted by [`Timer::tick`] when the active phase runs out naturally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseComplete {
    pub phase: Phase,
    pub next: Phase,
    /// Time actually counted down in the phase, pauses excluded.
    pub duration: Duration,
    /// Wall-clock instant the phase first started running.
    pub started_at: Option<DateTime<Local>>,
    /// Natural pomodoro completions since the last stop, after this one.
    pub cycle_count: u32,
}

#[derive(Clone, Debug)]
pub struct Timer {
    preset: Preset,
    phase: Phase,
    remaining: Duration,
    elapsed: Duration,
    started_at: Option<DateTime<Local>>,
    status: Status,
    auto_start: bool,
    cycle_count: u32,
}

impl Timer {
    pub fn new(preset: Preset, auto_start: bool) -> Self {
        let preset = preset.sanitized();
        Self {
            preset,
            phase: Phase::Pomodoro,
            remaining: preset.duration(Phase::Pomodoro),
            elapsed: Duration::ZERO,
            started_at: None,
            status: Status::Idle,
            auto_start,
            cycle_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up so the display never shows 00:00 early.
    pub fn remaining_secs(&self) -> u64 {
        let secs = self.remaining.as_secs();
        if self.remaining.subsec_nanos() > 0 { secs + 1 } else { secs }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// 1-based position of the current (or upcoming) pomodoro within its cycle.
    pub fn cycle_position(&self) -> u32 {
        let done = self.cycle_count % self.preset.cycle_length;
        match self.phase {
            Phase::Pomodoro => done + 1,
            _ if done == 0 => self.preset.cycle_length,
            _ => done,
        }
    }

    pub fn phase_duration(&self) -> Duration {
        self.preset.duration(self.phase)
    }

    /// Elapsed fraction of the active phase, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let total = self.phase_duration().as_secs_f64();
        if total <= 0.0 {
            return 0.0;
        }
        (1.0 - self.remaining.as_secs_f64() / total).clamp(0.0, 1.0)
    }

    pub fn start(&mut self) {
        if self.status == Status::Idle {
            self.started_at = Some(Local::now());
        }
        self.status = Status::Running;
    }

    pub fn pause(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == Status::Paused {
            self.status = Status::Running;
        }
    }

    pub fn toggle(&mut self) {
        match self.status {
            Status::Running => self.pause(),
            Status::Paused => self.resume(),
            Status::Idle => self.start(),
        }
    }

    pub fn tick(&mut self, elapsed: Duration) -> Option<PhaseComplete> {
        if self.status != Status::Running {
            return None;
        }

        let step = elapsed.min(self.remaining);
        self.remaining -= step;
        self.elapsed += step;
        if !self.remaining.is_zero() {
            return None;
        }

        let phase = self.phase;
        let duration = self.elapsed;
        let started_at = self.started_at;
        let next = match phase {
            Phase::Pomodoro => {
                self.cycle_count += 1;
                if self.cycle_count % self.preset.cycle_length == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Pomodoro,
        };

        self.enter(next, true);
        Some(PhaseComplete {
            phase,
            next,
            duration,
            started_at,
            cycle_count: self.cycle_count,
        })
    }

    /// Jumps to the next phase without crediting the current one.
    pub fn skip(&mut self) -> Phase {
        let next = match self.phase {
            Phase::Pomodoro => Phase::ShortBreak,
            Phase::ShortBreak | Phase::LongBreak => Phase::Pomodoro,
        };
        let was_running = self.is_running();
        self.enter(next, was_running);
        next
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Pomodoro;
        self.remaining = self.preset.duration(Phase::Pomodoro);
        self.elapsed = Duration::ZERO;
        self.started_at = None;
        self.status = Status::Idle;
        self.cycle_count = 0;
    }

    pub fn set_preset(&mut self, preset: Preset) {
        self.preset = preset.sanitized();
        if self.status == Status::Idle {
            self.remaining = self.phase_duration();
        } else {
            self.remaining = self.remaining.min(self.phase_duration());
        }
    }

    pub fn set_auto_start(&mut self, auto_start: bool) {
        self.auto_start = auto_start;
    }

    fn enter(&mut self, phase: Phase, was_running: bool) {
        self.phase = phase;
        self.remaining = self.preset.duration(phase);
        self.elapsed = Duration::ZERO;
        self.started_at = None;
        self.status = Status::Idle;
        if was_running && self.auto_start {
            self.start();
        }
    }
}
