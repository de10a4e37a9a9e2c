use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, Result, WAVEFORM_CENTER};

/// Pull-based spectrum analyser over the most recent `fft_size` samples.
///
/// Produces byte spectra (smoothed, decibel-scaled, mapped onto 0..=255)
/// and byte waveforms (128 = silence), the two inputs of
/// [`crate::FeatureExtractor`].
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: Vec<f32>,
    cursor: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl Analyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        let fft_size = config.fft_size;
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);

        Ok(Self {
            fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: vec![0.0; fft_size],
            cursor: 0,
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins, and of waveform bytes per snapshot.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends mono samples, overwriting the oldest ones.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.history[self.cursor] = if sample.is_finite() { sample } else { 0.0 };
            self.cursor = (self.cursor + 1) % self.fft_size;
        }
    }

    /// Forgets all samples and the smoothing memory.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.cursor = 0;
    }

    /// Runs one analysis pass and writes `bin_count()` bytes into `out`.
    /// Each call advances the smoothing filter.
    pub fn frequency_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        for index in 0..self.fft_size {
            let sample = self.history[(self.cursor + index) % self.fft_size];
            self.input[index] = sample * self.window[index];
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        for (bin, (smoothed, value)) in self.smoothed.iter_mut().zip(&self.spectrum).enumerate() {
            let magnitude = value.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;

            if let Some(slot) = out.get_mut(bin) {
                let decibels = 20.0 * smoothed.log10();
                let level = 255.0 * (decibels - self.min_decibels) / range;
                *slot = if level.is_finite() {
                    level.clamp(0.0, 255.0) as u8
                } else {
                    0
                };
            }
        }

        Ok(())
    }

    /// Writes the most recent `out.len()` samples as bytes centred on 128.
    pub fn time_domain_bytes(&self, out: &mut [u8]) {
        let count = out.len().min(self.fft_size);
        let start = self.cursor + self.fft_size - count;
        for (index, slot) in out.iter_mut().enumerate() {
            if index >= count {
                *slot = WAVEFORM_CENTER;
                continue;
            }
            let sample = self.history[(start + index) % self.fft_size];
            *slot = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}
