//! Core library for the Pulse audio-reactive visualiser.
//!
//! Audio flows one way through the crate on every tick: an
//! [`AnalysisSource`] produces a byte spectrum and waveform, the
//! [`FeatureExtractor`] turns them into an [`AudioSnapshot`], and the
//! [`FrameScheduler`] hands that one snapshot to the [`BeatDetector`], the
//! [`ParticleField`], the [`ModeDispatcher`] and the overlays. The result is
//! a [`Frame`] of surface-agnostic draw lists for a [`Surface`] to present.

pub mod analysis;
pub mod audio;
pub mod beat;
pub mod config;
pub mod effects;
pub mod error;
pub mod modes;
pub mod particles;
pub mod render;
pub mod scene;
pub mod theme;
pub mod timeline;

pub use analysis::{
    AudioSnapshot, BandLayout, FeatureExtractor, INTENSITY_FLOOR, MAX_MAGNITUDE, WAVEFORM_CENTER,
};
pub use audio::{
    Analyser, AnalysisSource, AudioEngine, SampleSource, SessionControl, SessionRequest,
    SourceKind, SynthwaveSource, WavSource,
};
pub use beat::{BeatDecision, BeatDetector, BeatEvent, BeatHistory, BpmEstimate};
pub use config::{AppConfig, AudioConfig, FieldConfig, SceneConfig, Settings};
pub use effects::{Effects, FrameEffects};
pub use error::{DeviceError, Result, VisualiserError};
pub use modes::{DispatchOutcome, Mode, ModeDispatcher, ModeInput, ModeRenderer};
pub use particles::{Bounds, Particle, ParticleField, ParticleKind};
pub use render::{CountingSurface, DrawCommand, DrawList, Layer, Paint, Shape, Surface};
pub use scene::PointCloud;
pub use theme::{Color, Theme, ThemePreset};
pub use timeline::{
    Controls, FixedRatePacer, FpsGrade, Frame, FramePacer, FrameScheduler, FrameStats,
    SchedulerState, Viewport,
};
