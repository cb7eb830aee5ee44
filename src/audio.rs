use log::{info, warn};
use rodio::{buffer::SamplesBuffer, Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SAMPLE_RATE: u32 = 44_100;
const MUSIC_STEM: &str = "music";
const MUSIC_EXTENSIONS: &[&str] = &["ogg", "mp3", "wav", "flac"];
const MUSIC_VOLUME: f32 = 0.35;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    Device(String),
    #[error("sound asset not found: {0}")]
    MissingAsset(String),
    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("playback failed: {0}")]
    Play(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    FocusOver,
    BreakOver,
    Skip,
}

/// Sound sink the [`AudioLayer`] drives. Implementations need not be
/// idempotent; the layer only calls `start_music` when music is off.
pub trait AudioOutput {
    fn play_cue(&mut self, cue: Cue) -> Result<(), AudioError>;
    fn start_music(&mut self) -> Result<(), AudioError>;
    fn stop_music(&mut self);
}

// ============================================================================
// Audio Layer
// ============================================================================

pub struct AudioLayer {
    output: Option<Box<dyn AudioOutput>>,
    music_enabled: bool,
    effects_enabled: bool,
    music_available: bool,
    music_on: bool,
}

impl AudioLayer {
    pub fn new(output: Box<dyn AudioOutput>, music_enabled: bool, effects_enabled: bool) -> Self {
        Self {
            output: Some(output),
            music_enabled,
            effects_enabled,
            music_available: true,
            music_on: false,
        }
    }

    /// No device at all; every call becomes a no-op.
    pub fn silent(music_enabled: bool, effects_enabled: bool) -> Self {
        Self {
            output: None,
            music_enabled,
            effects_enabled,
            music_available: false,
            music_on: false,
        }
    }

    /// Opens the default device. The error is returned alongside a silent
    /// layer so the caller can surface it without aborting.
    pub fn open(sounds_dir: &Path, music_enabled: bool, effects_enabled: bool) -> (Self, Option<AudioError>) {
        match RodioOutput::open(sounds_dir) {
            Ok(output) => {
                info!("audio output ready, sounds dir {}", sounds_dir.display());
                (Self::new(Box::new(output), music_enabled, effects_enabled), None)
            }
            Err(e) => {
                warn!("{e}; continuing without sound");
                (Self::silent(music_enabled, effects_enabled), Some(e))
            }
        }
    }

    pub fn music_enabled(&self) -> bool {
        self.music_enabled
    }

    pub fn effects_enabled(&self) -> bool {
        self.effects_enabled
    }

    pub fn music_playing(&self) -> bool {
        self.music_on
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn toggle_music(&mut self) -> bool {
        self.music_enabled = !self.music_enabled;
        if !self.music_enabled {
            self.stop_music();
        }
        self.music_enabled
    }

    pub fn toggle_effects(&mut self) -> bool {
        self.effects_enabled = !self.effects_enabled;
        self.effects_enabled
    }

    pub fn set_music_enabled(&mut self, enabled: bool) {
        if self.music_enabled != enabled {
            self.toggle_music();
        }
    }

    pub fn set_effects_enabled(&mut self, enabled: bool) {
        self.effects_enabled = enabled;
    }

    /// Plays a cue if effects are on. A failing cue is disabled for the rest
    /// of the run.
    pub fn cue(&mut self, cue: Cue) -> Option<AudioError> {
        if !self.effects_enabled {
            return None;
        }
        let output = self.output.as_mut()?;
        match output.play_cue(cue) {
            Ok(()) => None,
            Err(e) => {
                warn!("{e}; disabling sound effects");
                self.effects_enabled = false;
                Some(e)
            }
        }
    }

    /// Music follows the countdown: on while running, off otherwise.
    pub fn sync_music(&mut self, running: bool) -> Option<AudioError> {
        if running && self.music_enabled && self.music_available {
            self.start_music()
        } else {
            self.stop_music();
            None
        }
    }

    fn start_music(&mut self) -> Option<AudioError> {
        if self.music_on {
            return None;
        }
        let output = self.output.as_mut()?;
        match output.start_music() {
            Ok(()) => {
                self.music_on = true;
                None
            }
            Err(e) => {
                warn!("{e}; background music disabled");
                self.music_available = false;
                Some(e)
            }
        }
    }

    fn stop_music(&mut self) {
        if !self.music_on {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            output.stop_music();
        }
        self.music_on = false;
    }
}

// ============================================================================
// Rodio Output
// ============================================================================

pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sounds_dir: PathBuf,
    effects: Sink,
    music: Option<Sink>,
}

impl RodioOutput {
    pub fn open(sounds_dir: &Path) -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| AudioError::Device(e.to_string()))?;
        let effects = Sink::try_new(&handle).map_err(|e| AudioError::Device(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            sounds_dir: sounds_dir.to_path_buf(),
            effects,
            music: None,
        })
    }

    fn music_path(&self) -> Option<PathBuf> {
        MUSIC_EXTENSIONS
            .iter()
            .map(|ext| self.sounds_dir.join(format!("{MUSIC_STEM}.{ext}")))
            .find(|p| p.exists())
    }

    fn load_music(&self) -> Result<Sink, AudioError> {
        let path = self
            .music_path()
            .ok_or_else(|| AudioError::MissingAsset(self.sounds_dir.join(MUSIC_STEM).display().to_string()))?;
        let file = File::open(&path).map_err(|e| AudioError::Decode { path: path.clone(), reason: e.to_string() })?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| AudioError::Decode { path: path.clone(), reason: e.to_string() })?;

        let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::Play(e.to_string()))?;
        sink.set_volume(MUSIC_VOLUME);
        sink.append(source.repeat_infinite());
        info!("looping background music from {}", path.display());
        Ok(sink)
    }
}

impl AudioOutput for RodioOutput {
    fn play_cue(&mut self, cue: Cue) -> Result<(), AudioError> {
        let notes: &[(f32, u32)] = match cue {
            Cue::FocusOver => &[(880.0, 180), (660.0, 180), (523.25, 320)],
            Cue::BreakOver => &[(523.25, 180), (660.0, 180), (880.0, 320)],
            Cue::Skip => &[(440.0, 60)],
        };
        for &(freq, millis) in notes {
            self.effects.append(chime(freq, millis));
        }
        self.effects.play();
        Ok(())
    }

    fn start_music(&mut self) -> Result<(), AudioError> {
        if self.music.is_none() {
            self.music = Some(self.load_music()?);
        }
        if let Some(sink) = &self.music {
            sink.play();
        }
        Ok(())
    }

    fn stop_music(&mut self) {
        if let Some(sink) = &self.music {
            sink.pause();
        }
    }
}

/// Sine tone with a fast attack and exponential decay.
fn chime(freq: f32, millis: u32) -> SamplesBuffer<f32> {
    let len = (SAMPLE_RATE as u64 * u64::from(millis) / 1000) as usize;
    let samples: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let attack = (t * 200.0).min(1.0);
            let decay = (-t * 6.0).exp();
            (TAU * freq * t).sin() * attack * decay * 0.3
        })
        .collect();
    SamplesBuffer::new(1, SAMPLE_RATE, samples)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        pub calls: Rc<RefCell<Vec<String>>>,
        pub fail_music: bool,
        pub fail_cues: bool,
    }

    impl AudioOutput for Recorder {
        fn play_cue(&mut self, cue: Cue) -> Result<(), AudioError> {
            self.calls.borrow_mut().push(format!("cue {cue:?}"));
            if self.fail_cues {
                return Err(AudioError::Play("boom".into()));
            }
            Ok(())
        }

        fn start_music(&mut self) -> Result<(), AudioError> {
            self.calls.borrow_mut().push("start".into());
            if self.fail_music {
                return Err(AudioError::MissingAsset("music".into()));
            }
            Ok(())
        }

        fn stop_music(&mut self) {
            self.calls.borrow_mut().push("stop".into());
        }
    }

    fn layer(recorder: &Recorder) -> AudioLayer {
        AudioLayer::new(Box::new(recorder.clone()), true, true)
    }

    #[test]
    fn starting_music_twice_is_a_no_op() {
        let rec = Recorder::default();
        let mut audio = layer(&rec);
        audio.sync_music(true);
        audio.sync_music(true);
        assert_eq!(*rec.calls.borrow(), vec!["start"]);
        assert!(audio.music_playing());

        audio.sync_music(false);
        audio.sync_music(false);
        assert_eq!(*rec.calls.borrow(), vec!["start", "stop"]);
    }

    #[test]
    fn muting_music_leaves_effects_alone() {
        let rec = Recorder::default();
        let mut audio = layer(&rec);
        audio.sync_music(true);
        assert!(!audio.toggle_music());
        assert!(audio.effects_enabled());

        audio.cue(Cue::FocusOver);
        audio.sync_music(true);
        assert_eq!(*rec.calls.borrow(), vec!["start", "stop", "cue FocusOver"]);
    }

    #[test]
    fn muting_effects_leaves_music_alone() {
        let rec = Recorder::default();
        let mut audio = layer(&rec);
        assert!(!audio.toggle_effects());
        audio.cue(Cue::BreakOver);
        audio.sync_music(true);
        assert_eq!(*rec.calls.borrow(), vec!["start"]);
        assert!(audio.music_enabled());
    }

    #[test]
    fn missing_music_asset_disables_only_music() {
        let rec = Recorder { fail_music: true, ..Recorder::default() };
        let mut audio = layer(&rec);
        assert!(matches!(audio.sync_music(true), Some(AudioError::MissingAsset(_))));
        assert!(audio.sync_music(true).is_none());
        assert!(audio.cue(Cue::Skip).is_none());
        assert_eq!(*rec.calls.borrow(), vec!["start", "cue Skip"]);
    }

    #[test]
    fn failing_cue_disables_effects() {
        let rec = Recorder { fail_cues: true, ..Recorder::default() };
        let mut audio = layer(&rec);
        assert!(audio.cue(Cue::FocusOver).is_some());
        assert!(!audio.effects_enabled());
        assert!(audio.cue(Cue::FocusOver).is_none());
    }

    #[test]
    fn silent_layer_accepts_everything() {
        let mut audio = AudioLayer::silent(true, true);
        assert!(audio.sync_music(true).is_none());
        assert!(audio.cue(Cue::FocusOver).is_none());
        assert!(!audio.music_playing());
        assert!(!audio.has_output());
    }

    #[test]
    fn chime_length_matches_duration() {
        let tone = chime(440.0, 100);
        assert_eq!(tone.total_duration().map(|d| d.as_millis()), Some(100));
    }
}
