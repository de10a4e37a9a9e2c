//! Beat detection over a rolling window of bass energy.
//!
//! A beat fires when the current bass exceeds a dynamic threshold derived
//! from the recent average, and enough ticks have passed since the previous
//! beat. The threshold never drops below [`THRESHOLD_FLOOR`], so silence can
//! not trigger beats however high the sensitivity is set.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Roughly one second of history at 60 ticks per second.
pub const HISTORY_LEN: usize = 43;
pub const THRESHOLD_RATIO: f32 = 1.3;
pub const THRESHOLD_FLOOR: f32 = 0.5;
/// Minimum number of ticks between two beats.
pub const REFRACTORY_TICKS: u64 = 10;

const ESTIMATE_MIN_SAMPLES: usize = 20;
const ESTIMATE_PEAK_LEVEL: f32 = 0.5;
const ESTIMATE_MIN_BPM: u32 = 60;
const ESTIMATE_MAX_BPM: u32 = 180;

/// Bounded FIFO of recent bass values.
#[derive(Debug, Clone)]
pub struct BeatHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl BeatHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a value, evicting the oldest one when full.
    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the stored values, 0 when empty.
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }
}

impl Default for BeatHistory {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

/// A beat that fired on `tick` with the given bass level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub tick: u64,
    pub bass: f32,
}

/// Everything the detector computed for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatDecision {
    pub average: f32,
    pub threshold: f32,
    pub event: Option<BeatEvent>,
}

/// Tempo *estimate* from the share of history samples above 0.5.
///
/// This is a display heuristic, not tempo tracking: it counts loud ticks,
/// not onsets, and is clamped to 60..=180.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmEstimate(pub u32);

impl BpmEstimate {
    pub fn from_history(history: &BeatHistory) -> Option<Self> {
        let len = history.len();
        if len <= ESTIMATE_MIN_SAMPLES {
            return None;
        }
        let peaks = history.iter().filter(|&v| v > ESTIMATE_PEAK_LEVEL).count();
        let raw = (peaks as f32 / len as f32 * 60.0 * 60.0).floor() as u32;
        Some(Self(raw.clamp(ESTIMATE_MIN_BPM, ESTIMATE_MAX_BPM)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BeatDetector {
    history: BeatHistory,
    last_beat: Option<u64>,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_len(len: usize) -> Self {
        Self {
            history: BeatHistory::new(len),
            last_beat: None,
        }
    }

    /// Records `bass` for `tick` and decides whether a beat fires.
    pub fn observe(&mut self, bass: f32, tick: u64) -> BeatDecision {
        let bass = if bass.is_finite() { bass.max(0.0) } else { 0.0 };
        self.history.push(bass);

        let average = self.history.mean();
        let threshold = (average * THRESHOLD_RATIO).max(THRESHOLD_FLOOR);
        let rested = self
            .last_beat
            .map(|last| tick.saturating_sub(last) >= REFRACTORY_TICKS)
            .unwrap_or(true);

        let event = if bass > threshold && rested {
            self.last_beat = Some(tick);
            tracing::trace!(tick, bass, threshold, "beat");
            Some(BeatEvent { tick, bass })
        } else {
            None
        };

        BeatDecision {
            average,
            threshold,
            event,
        }
    }

    /// Forgets everything; called when a session starts or stops.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_beat = None;
    }

    pub fn history(&self) -> &BeatHistory {
        &self.history
    }

    pub fn last_beat(&self) -> Option<u64> {
        self.last_beat
    }

    pub fn bpm_estimate(&self) -> Option<BpmEstimate> {
        BpmEstimate::from_history(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_length_tracks_ticks_until_full() {
        let mut detector = BeatDetector::new();
        for tick in 0..100u64 {
            detector.observe(0.2, tick);
            let expected = ((tick + 1) as usize).min(HISTORY_LEN);
            assert_eq!(detector.history().len(), expected);
        }
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = BeatHistory::new(3);
        for value in [1.0, 2.0, 3.0, 4.0] {
            history.push(value);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert!((history.mean() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn silence_never_fires() {
        let mut detector = BeatDetector::new();
        for tick in 0..500 {
            let decision = detector.observe(0.0, tick);
            assert!(decision.event.is_none());
            assert!(decision.threshold >= THRESHOLD_FLOOR);
        }
    }

    #[test]
    fn refractory_period_spaces_beats() {
        let mut detector = BeatDetector::new();
        let mut beats = Vec::new();
        for tick in 0..200u64 {
            let bass = if tick % 2 == 0 { 3.0 } else { 0.0 };
            if let Some(event) = detector.observe(bass, tick).event {
                beats.push(event.tick);
            }
        }

        assert!(beats.len() > 10);
        for pair in beats.windows(2) {
            assert!(pair[1] - pair[0] >= REFRACTORY_TICKS);
        }
    }

    #[test]
    fn sustained_bass_fires_until_the_average_catches_up() {
        let mut detector = BeatDetector::new();
        for tick in 0..HISTORY_LEN as u64 {
            detector.observe(0.0, tick);
        }
        let mut beats = Vec::new();
        for tick in HISTORY_LEN as u64..300 {
            if let Some(event) = detector.observe(5.0, tick).event {
                beats.push(event.tick);
            }
        }
        assert_eq!(beats, vec![43, 53, 63, 73]);
    }

    #[test]
    fn strong_bass_after_long_rest_fires() {
        let mut detector = BeatDetector::new();
        for tick in 0..HISTORY_LEN as u64 {
            detector.observe(0.4, tick);
        }
        let now = 100;
        detector.last_beat = Some(now - 20);

        // the new value joins the history before the mean is taken
        let decision = detector.observe(0.9, now);
        let mean = (0.4 * (HISTORY_LEN - 1) as f32 + 0.9) / HISTORY_LEN as f32;
        assert!((decision.threshold - mean * THRESHOLD_RATIO).abs() < 1e-5);
        assert_eq!(decision.event, Some(BeatEvent { tick: now, bass: 0.9 }));
        assert_eq!(detector.last_beat(), Some(now));
    }

    #[test]
    fn mean_of_point_four_gives_threshold_point_five_two() {
        let mut detector = BeatDetector::with_history_len(5);
        for (tick, bass) in [0.25, 0.25, 0.3, 0.3].into_iter().enumerate() {
            assert!(detector.observe(bass, tick as u64).event.is_none());
        }
        let now = 30;
        detector.last_beat = Some(now - 20);

        // history after the push: 0.25, 0.25, 0.3, 0.3, 0.9
        let decision = detector.observe(0.9, now);
        assert!((decision.average - 0.4).abs() < 1e-6);
        assert!((decision.threshold - 0.52).abs() < 1e-6);
        assert_eq!(decision.event, Some(BeatEvent { tick: now, bass: 0.9 }));
    }

    #[test]
    fn strong_bass_inside_refractory_is_ignored() {
        let mut detector = BeatDetector::new();
        for tick in 0..HISTORY_LEN as u64 {
            detector.observe(0.4, tick);
        }
        let now = 100;
        detector.last_beat = Some(now - 3);

        assert!(detector.observe(0.9, now).event.is_none());
        assert_eq!(detector.last_beat(), Some(now - 3));
    }

    #[test]
    fn detector_is_live_from_the_first_tick() {
        let mut detector = BeatDetector::new();
        let first = detector.observe(0.0, 0);
        assert_eq!(first.threshold, THRESHOLD_FLOOR);

        // two samples of history: mean 0.4, threshold 0.52
        let second = detector.observe(0.8, 1);
        assert!((second.threshold - 0.52).abs() < 1e-6);
        assert!(second.event.is_some());
    }

    #[test]
    fn reset_clears_history_and_refractory() {
        let mut detector = BeatDetector::new();
        detector.observe(0.0, 0);
        assert!(detector.observe(0.8, 1).event.is_some());
        detector.reset();
        assert!(detector.history().is_empty());
        assert_eq!(detector.last_beat(), None);
        detector.observe(0.0, 2);
        assert!(detector.observe(0.8, 3).event.is_some());
    }

    #[test]
    fn bpm_estimate_needs_enough_samples_and_is_clamped() {
        let mut history = BeatHistory::default();
        for _ in 0..20 {
            history.push(1.0);
        }
        assert_eq!(BpmEstimate::from_history(&history), None);

        history.push(1.0);
        assert_eq!(BpmEstimate::from_history(&history), Some(BpmEstimate(180)));

        history.clear();
        for _ in 0..HISTORY_LEN {
            history.push(0.1);
        }
        assert_eq!(BpmEstimate::from_history(&history), Some(BpmEstimate(60)));

        history.clear();
        for i in 0..40 {
            history.push(if i % 40 == 0 { 0.9 } else { 0.1 });
        }
        // 1 loud tick in 40 -> 90 bpm
        assert_eq!(BpmEstimate::from_history(&history), Some(BpmEstimate(90)));
    }
}
