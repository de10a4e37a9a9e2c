//! Per-tick feature extraction.
//!
//! Turns the byte spectrum and waveform delivered by the analysis facility
//! into an [`AudioSnapshot`]: the raw data plus normalised bass, mid, treble
//! and average energy scaled by the user's sensitivity. Values above 1.0 are
//! expected when sensitivity exceeds 1; they are an intentional over-drive.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

/// Largest value a frequency bin can hold.
pub const MAX_MAGNITUDE: f32 = 255.0;
/// Waveform byte that represents zero amplitude.
pub const WAVEFORM_CENTER: u8 = 128;
/// Particle intensity used when the average energy is exactly zero.
pub const INTENSITY_FLOOR: f32 = 0.1;

const BASS_FRACTION: f32 = 0.1;
const MID_END_FRACTION: f32 = 0.5;

/// Partition of `bins` frequency buckets into three contiguous, non-empty,
/// non-overlapping ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    bins: usize,
    bass_end: usize,
    mid_end: usize,
}

impl BandLayout {
    pub fn new(bins: usize) -> Result<Self> {
        if bins < 4 || !bins.is_power_of_two() {
            return Err(VisualiserError::InvalidInput(
                "bin count must be a power of two of at least 4",
            ));
        }

        let bass_end = ((bins as f32 * BASS_FRACTION).floor() as usize).max(1);
        let mid_end = ((bins as f32 * MID_END_FRACTION).floor() as usize).max(bass_end + 1);

        Ok(Self {
            bins,
            bass_end,
            mid_end,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn bass(&self) -> Range<usize> {
        0..self.bass_end
    }

    pub fn mid(&self) -> Range<usize> {
        self.bass_end..self.mid_end
    }

    pub fn treble(&self) -> Range<usize> {
        self.mid_end..self.bins
    }
}

/// One tick's audio features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    /// Magnitudes in increasing frequency order.
    pub frequency_bins: Vec<u8>,
    /// One analysis window of amplitude, centred on 128.
    pub waveform: Vec<u8>,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub average: f32,
}

impl AudioSnapshot {
    /// Neutral snapshot: no energy, flat waveform.
    pub fn silent(bins: usize) -> Self {
        Self {
            frequency_bins: vec![0; bins],
            waveform: vec![WAVEFORM_CENTER; bins],
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            average: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.frequency_bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency_bins.is_empty()
    }

    /// Bin `index` normalised to `[0, 1]`; zero past the end.
    pub fn bin(&self, index: usize) -> f32 {
        self.frequency_bins
            .get(index)
            .map(|&value| value as f32 / MAX_MAGNITUDE)
            .unwrap_or(0.0)
    }

    /// Like [`AudioSnapshot::bin`] but wraps the index around the spectrum.
    pub fn bin_wrapped(&self, index: usize) -> f32 {
        if self.frequency_bins.is_empty() {
            return 0.0;
        }
        self.bin(index % self.frequency_bins.len())
    }

    /// Energy that drives particle speed and size. Silence falls back to
    /// [`INTENSITY_FLOOR`] so the field never freezes.
    pub fn intensity(&self) -> f32 {
        if self.average > 0.0 {
            self.average
        } else {
            INTENSITY_FLOOR
        }
    }

    fn reset_silent(&mut self, bins: usize) {
        self.frequency_bins.clear();
        self.frequency_bins.resize(bins, 0);
        self.waveform.clear();
        self.waveform.resize(bins, WAVEFORM_CENTER);
        self.bass = 0.0;
        self.mid = 0.0;
        self.treble = 0.0;
        self.average = 0.0;
    }
}

/// Stateless converter from raw analyser output to [`AudioSnapshot`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    layout: BandLayout,
}

impl FeatureExtractor {
    pub fn new(bins: usize) -> Result<Self> {
        Ok(Self {
            layout: BandLayout::new(bins)?,
        })
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Builds a fresh snapshot. See [`FeatureExtractor::extract_into`].
    pub fn extract(&self, frequency: &[u8], waveform: &[u8], sensitivity: f32) -> AudioSnapshot {
        let mut snapshot = AudioSnapshot::silent(self.layout.bins());
        self.extract_into(frequency, waveform, sensitivity, &mut snapshot);
        snapshot
    }

    /// Overwrites `out` in place, reusing its buffers. Returns `false` and
    /// leaves a silent snapshot when the input does not match the layout.
    pub fn extract_into(
        &self,
        frequency: &[u8],
        waveform: &[u8],
        sensitivity: f32,
        out: &mut AudioSnapshot,
    ) -> bool {
        let bins = self.layout.bins();
        if frequency.len() != bins || waveform.len() != bins {
            tracing::warn!(
                expected = bins,
                frequency = frequency.len(),
                waveform = waveform.len(),
                "analysis data does not match the band layout, using silence"
            );
            out.reset_silent(bins);
            return false;
        }

        let gain = if sensitivity.is_finite() {
            sensitivity.max(0.0)
        } else {
            0.0
        };

        out.frequency_bins.clear();
        out.frequency_bins.extend_from_slice(frequency);
        out.waveform.clear();
        out.waveform.extend_from_slice(waveform);

        out.bass = band_level(frequency, self.layout.bass(), gain);
        out.mid = band_level(frequency, self.layout.mid(), gain);
        out.treble = band_level(frequency, self.layout.treble(), gain);
        out.average = band_level(frequency, 0..bins, gain);
        true
    }
}

fn band_level(frequency: &[u8], range: Range<usize>, gain: f32) -> f32 {
    let count = range.len();
    if count == 0 {
        return 0.0;
    }
    let sum: u32 = frequency[range].iter().map(|&value| value as u32).sum();
    (sum as f32 / count as f32) / MAX_MAGNITUDE * gain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_every_bin_exactly_once() {
        for bins in [4, 8, 16, 64, 256, 1024, 4096] {
            let layout = BandLayout::new(bins).unwrap();
            let mut seen = vec![0u8; bins];
            for range in [layout.bass(), layout.mid(), layout.treble()] {
                assert!(!range.is_empty(), "empty band for {bins} bins");
                for index in range {
                    seen[index] += 1;
                }
            }
            assert!(seen.iter().all(|&count| count == 1), "{bins} bins");
        }
    }

    #[test]
    fn default_layout_matches_ten_and_forty_percent() {
        let layout = BandLayout::new(256).unwrap();
        assert_eq!(layout.bass(), 0..25);
        assert_eq!(layout.mid(), 25..128);
        assert_eq!(layout.treble(), 128..256);
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(BandLayout::new(3).is_err());
        assert!(BandLayout::new(100).is_err());
    }

    #[test]
    fn sensitivity_scales_monotonically_and_may_overdrive() {
        let extractor = FeatureExtractor::new(256).unwrap();
        let frequency: Vec<u8> = (0..256).map(|i| (255 - i) as u8).collect();
        let waveform = vec![WAVEFORM_CENTER; 256];

        let mut previous = extractor.extract(&frequency, &waveform, 0.1);
        for step in 2..=40 {
            let sensitivity = step as f32 * 0.1;
            let next = extractor.extract(&frequency, &waveform, sensitivity);
            assert!(next.bass >= previous.bass);
            assert!(next.mid >= previous.mid);
            assert!(next.treble >= previous.treble);
            assert!(next.average >= previous.average);
            previous = next;
        }
        assert!(previous.bass > 1.0);
    }

    #[test]
    fn band_means_are_normalised() {
        let extractor = FeatureExtractor::new(256).unwrap();
        let mut frequency = vec![0u8; 256];
        frequency[..25].fill(255);
        let snapshot = extractor.extract(&frequency, &[WAVEFORM_CENTER; 256], 1.0);

        assert!((snapshot.bass - 1.0).abs() < 1e-6);
        assert_eq!(snapshot.mid, 0.0);
        assert_eq!(snapshot.treble, 0.0);
        assert!((snapshot.average - 25.0 / 256.0).abs() < 1e-6);
    }

    #[test]
    fn silence_yields_zero_scalars_and_intensity_floor() {
        let extractor = FeatureExtractor::new(256).unwrap();
        let snapshot = extractor.extract(&[0; 256], &[WAVEFORM_CENTER; 256], 2.0);

        assert_eq!(snapshot.average, 0.0);
        assert_eq!((snapshot.bass, snapshot.mid, snapshot.treble), (0.0, 0.0, 0.0));
        assert_eq!(snapshot.intensity(), INTENSITY_FLOOR);
    }

    #[test]
    fn mismatched_input_degrades_to_silence() {
        let extractor = FeatureExtractor::new(16).unwrap();
        let mut snapshot = extractor.extract(&[200; 16], &[0; 16], 1.0);
        assert!(snapshot.bass > 0.0);

        let fresh = extractor.extract_into(&[200; 8], &[0; 8], 1.0, &mut snapshot);
        assert!(!fresh);
        assert_eq!(snapshot, AudioSnapshot::silent(16));
    }

    #[test]
    fn negative_sensitivity_is_treated_as_zero() {
        let extractor = FeatureExtractor::new(8).unwrap();
        let snapshot = extractor.extract(&[255; 8], &[WAVEFORM_CENTER; 8], -4.0);
        assert_eq!(snapshot.average, 0.0);
    }

    #[test]
    fn bin_lookups_are_bounds_safe() {
        let snapshot = AudioSnapshot {
            frequency_bins: vec![0, 255],
            ..AudioSnapshot::silent(2)
        };
        assert_eq!(snapshot.bin(1), 1.0);
        assert_eq!(snapshot.bin(9), 0.0);
        assert_eq!(snapshot.bin_wrapped(3), 1.0);
    }
}
