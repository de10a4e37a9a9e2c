use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Mode, Result, ThemePreset, VisualiserError};

const MAX_SENSITIVITY: f32 = 10.0;
const MAX_SPEED: f32 = 10.0;
const MAX_BLOOM: f32 = 100.0;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub field: FieldConfig,
    pub scene: SceneConfig,
    pub settings: Settings,
    pub theme: ThemePreset,
    pub mode: Mode,
    /// Display refresh rate the scheduler paces itself to.
    pub frame_rate: u32,
    /// Text of the always-on watermark overlay.
    pub watermark: String,
    /// Seed for particle and point-cloud placement. Random when absent.
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            field: FieldConfig::default(),
            scene: SceneConfig::default(),
            settings: Settings::default(),
            theme: ThemePreset::default(),
            mode: Mode::default(),
            frame_rate: 60,
            watermark: "PULSE".to_string(),
            seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects structural problems that clamping cannot repair. Runtime
    /// settings are sanitised separately and never fail.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        if self.frame_rate == 0 {
            return Err(VisualiserError::Config("frame_rate must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration of the analysis facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Analysis window length. Yields `fft_size / 2` frequency bins.
    pub fft_size: usize,
    /// Time constant of the spectrum's exponential smoothing, in `[0, 1)`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 512,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    /// Number of frequency bins (and waveform samples) per snapshot.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 8 || !self.fft_size.is_power_of_two() {
            return Err(VisualiserError::Config(format!(
                "fft_size must be a power of two of at least 8, got {}",
                self.fft_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(VisualiserError::Config("sample_rate must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(VisualiserError::Config(format!(
                "smoothing must lie in [0, 1), got {}",
                self.smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(VisualiserError::Config(
                "min_decibels must be below max_decibels".into(),
            ));
        }
        Ok(())
    }
}

/// Ambient particle field configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub ambient_count: usize,
    pub width: f32,
    pub height: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            ambient_count: 100,
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// 3D point cloud configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub point_count: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self { point_count: 5000 }
    }
}

/// User-facing knobs. Written by UI collaborators, read by the core once
/// per tick through [`Settings::sanitized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub sensitivity: f32,
    pub speed: f32,
    pub bloom: f32,
    pub auto_rotate: bool,
    pub beat_react: bool,
    pub mirror: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: 2.0,
            speed: 1.0,
            bloom: 50.0,
            auto_rotate: true,
            beat_react: true,
            mirror: false,
        }
    }
}

impl Settings {
    /// Returns a copy with every value clamped into its safe range.
    /// Non-finite values fall back to their defaults.
    pub fn sanitized(&self) -> Settings {
        let defaults = Settings::default();
        let clamped = Settings {
            sensitivity: clamp_finite(self.sensitivity, 0.0, MAX_SENSITIVITY, defaults.sensitivity),
            speed: clamp_finite(self.speed, 0.0, MAX_SPEED, defaults.speed),
            bloom: clamp_finite(self.bloom, 0.0, MAX_BLOOM, defaults.bloom),
            ..*self
        };

        if clamped != *self {
            tracing::debug!(requested = ?self, ?clamped, "clamped out-of-range settings");
        }
        clamped
    }

    /// Glow multiplier derived from `bloom`; 1.0 at the default of 50.
    pub fn glow_scale(&self) -> f32 {
        self.bloom / 50.0
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
