//! Audio session lifecycle and the analysis facility behind it.
//!
//! [`AudioEngine`] owns at most one [`SampleSource`] at a time. Every frame
//! it pulls roughly one frame's worth of samples from that source, feeds
//! them to the [`Analyser`], and hands the byte spectrum and waveform to the
//! caller. With no active session it reports silence.

mod analyser;
#[cfg(feature = "microphone")]
mod microphone;
mod synth;
mod wav;

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{AudioConfig, Result, WAVEFORM_CENTER};

pub use analyser::Analyser;
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneSource;
pub use synth::{SynthwaveSource, DEMO_SECONDS};
pub use wav::WavSource;

/// Where the samples of a session come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Microphone,
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::File => "file",
            SourceKind::Microphone => "microphone",
            SourceKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// A request to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    File(PathBuf),
    Microphone,
    Synthetic,
}

impl SessionRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            SessionRequest::File(_) => SourceKind::File,
            SessionRequest::Microphone => SourceKind::Microphone,
            SessionRequest::Synthetic => SourceKind::Synthetic,
        }
    }
}

/// Supplies one frequency spectrum and one waveform per tick.
pub trait AnalysisSource {
    /// Length of both buffers passed to [`AnalysisSource::pull_frame`].
    fn bin_count(&self) -> usize;

    /// Fills `frequency` (0..=255 magnitudes) and `waveform` (128 = silence).
    /// Writes all-zero bins and a flat waveform when no session is active.
    fn pull_frame(&mut self, frequency: &mut [u8], waveform: &mut [u8]) -> Result<()>;
}

/// Start/stop surface of the capture collaborator.
pub trait SessionControl {
    /// Starts a new session, replacing the current one. On failure the
    /// previous session is left untouched.
    fn start(&mut self, request: SessionRequest) -> Result<()>;

    fn stop(&mut self);

    /// Kind of the running session, if any.
    fn active(&self) -> Option<SourceKind>;
}

/// A stream of mono `f32` samples.
pub trait SampleSource {
    fn kind(&self) -> SourceKind;

    fn sample_rate(&self) -> u32;

    /// Reads up to `out.len()` samples and returns how many were written.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// `true` once the source will never produce another sample.
    fn is_finished(&self) -> bool;
}

/// The session owner used by the scheduler in production.
pub struct AudioEngine {
    analyser: Analyser,
    source: Option<Box<dyn SampleSource>>,
    scratch: Vec<f32>,
    sample_rate: u32,
    frame_rate: u32,
}

impl AudioEngine {
    pub fn new(config: &AudioConfig, frame_rate: u32) -> Result<Self> {
        Ok(Self {
            analyser: Analyser::new(config)?,
            source: None,
            scratch: Vec::new(),
            sample_rate: config.sample_rate,
            frame_rate: frame_rate.max(1),
        })
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    /// Installs an already constructed source as the running session.
    pub fn start_source(&mut self, source: Box<dyn SampleSource>) {
        self.end_session();
        info!(
            kind = %source.kind(),
            sample_rate = source.sample_rate(),
            "audio session started"
        );
        self.source = Some(source);
    }

    fn open(&self, request: &SessionRequest) -> Result<Box<dyn SampleSource>> {
        match request {
            SessionRequest::File(path) => Ok(Box::new(WavSource::open(path)?)),
            SessionRequest::Synthetic => Ok(Box::new(SynthwaveSource::new(self.sample_rate))),
            SessionRequest::Microphone => open_microphone(),
        }
    }

    fn end_session(&mut self) {
        if let Some(previous) = self.source.take() {
            info!(kind = %previous.kind(), "audio session stopped");
        }
        self.analyser.reset();
    }

    fn write_silence(frequency: &mut [u8], waveform: &mut [u8]) {
        frequency.fill(0);
        waveform.fill(WAVEFORM_CENTER);
    }
}

impl AnalysisSource for AudioEngine {
    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn pull_frame(&mut self, frequency: &mut [u8], waveform: &mut [u8]) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            Self::write_silence(frequency, waveform);
            return Ok(());
        };

        let wanted = (source.sample_rate() / self.frame_rate).max(1) as usize;
        self.scratch.resize(wanted, 0.0);
        let read = source.read(&mut self.scratch);
        let finished = source.is_finished();
        self.analyser.push_samples(&self.scratch[..read]);

        let analysed = self.analyser.frequency_bytes(frequency);
        self.analyser.time_domain_bytes(waveform);

        if finished {
            info!("audio source exhausted");
            self.end_session();
        }
        analysed
    }
}

impl SessionControl for AudioEngine {
    fn start(&mut self, request: SessionRequest) -> Result<()> {
        let source = self.open(&request).map_err(|err| {
            warn!(kind = %request.kind(), %err, "could not start audio session");
            err
        })?;
        self.start_source(source);
        Ok(())
    }

    fn stop(&mut self) {
        self.end_session();
    }

    fn active(&self) -> Option<SourceKind> {
        self.source.as_ref().map(|source| source.kind())
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("analyser", &self.analyser)
            .field("active", &self.active())
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}

#[cfg(feature = "microphone")]
fn open_microphone() -> Result<Box<dyn SampleSource>> {
    Ok(Box::new(MicrophoneSource::open()?))
}

#[cfg(not(feature = "microphone"))]
fn open_microphone() -> Result<Box<dyn SampleSource>> {
    Err(crate::DeviceError::Unavailable("built without microphone support".into()).into())
}
