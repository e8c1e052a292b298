//! Narration playback.
//!
//! [`PlaybackController`] owns at most one live sound handle. Starting a new
//! narration always stops the previous handle first.

pub mod cpal_sink;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::ai::AiError;

/// Decoded PCM, interleaved when `channels > 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average interleaved channels into one.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("output device has no usable config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),
}

/// Why a narration request ended without sound.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Speech(#[from] AiError),
    #[error(transparent)]
    Device(#[from] AudioError),
}

/// Called once when a sound runs to completion, possibly from an audio thread.
pub type EndNotifier = Box<dyn FnOnce() + Send>;

pub trait SoundHandle {
    /// Halt output. Must tolerate being called after playback already ended.
    fn stop(&mut self);
}

pub trait AudioSink {
    /// Start playing `buffer` immediately.
    fn play(
        &mut self,
        buffer: &AudioBuffer,
        on_end: EndNotifier,
    ) -> Result<Box<dyn SoundHandle>, AudioError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleAction {
    /// Playback was running and has been stopped.
    Stopped,
    /// A narration is already being generated.
    Ignored,
    /// The caller should request speech and hand the result to
    /// [`PlaybackController::finish_generation`].
    Generate,
}

pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    current: Option<(u64, Box<dyn SoundHandle>)>,
    next_id: u64,
    playing: bool,
    generating: bool,
    on_end: Arc<dyn Fn(u64) + Send + Sync>,
}

impl PlaybackController {
    /// `on_end` receives the id of a handle that finished by itself; forward
    /// it to [`PlaybackController::handle_ended`] on the owning thread.
    pub fn new(sink: Box<dyn AudioSink>, on_end: Arc<dyn Fn(u64) + Send + Sync>) -> Self {
        Self {
            sink,
            current: None,
            next_id: 0,
            playing: false,
            generating: false,
            on_end,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn toggle(&mut self) -> ToggleAction {
        if self.playing {
            self.stop();
            return ToggleAction::Stopped;
        }
        if self.generating {
            return ToggleAction::Ignored;
        }
        self.generating = true;
        ToggleAction::Generate
    }

    /// Apply the outcome of a speech request started by [`toggle`](Self::toggle).
    pub fn finish_generation(
        &mut self,
        result: Result<AudioBuffer, AiError>,
    ) -> Result<(), PlaybackError> {
        self.generating = false;
        let buffer = result?;

        self.stop();
        self.next_id += 1;
        let id = self.next_id;
        let on_end = Arc::clone(&self.on_end);
        let handle = self.sink.play(&buffer, Box::new(move || on_end(id)))?;
        info!(id, secs = buffer.duration_secs(), "narration started");
        self.current = Some((id, handle));
        self.playing = true;
        Ok(())
    }

    /// Natural end of a handle. Ids from already replaced handles are ignored.
    pub fn handle_ended(&mut self, id: u64) {
        if matches!(self.current, Some((current, _)) if current == id) {
            debug!(id, "narration finished");
            self.current = None;
            self.playing = false;
        }
    }

    pub fn stop(&mut self) {
        if let Some((id, mut handle)) = self.current.take() {
            debug!(id, "stopping narration");
            handle.stop();
        }
        self.playing = false;
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Linear-interpolation resampling of a mono signal.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}
