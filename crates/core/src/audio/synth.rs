//! Built-in synthwave demo track.
//!
//! Three voices (sawtooth bass, filtered square arpeggio, sine pad) driven
//! by breakpoint automation, all fading out over the track's length.

use std::f32::consts::PI;

use super::{SampleSource, SourceKind};

/// Length of the demo in seconds.
pub const DEMO_SECONDS: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    /// Jump to the value at the given time.
    Set,
    /// Exponential glide from the previous breakpoint.
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    at: f32,
    value: f32,
    ramp: Ramp,
}

const fn set(at: f32, value: f32) -> Breakpoint {
    Breakpoint {
        at,
        value,
        ramp: Ramp::Set,
    }
}

const fn glide(at: f32, value: f32) -> Breakpoint {
    Breakpoint {
        at,
        value,
        ramp: Ramp::Exponential,
    }
}

const BASS_FREQUENCY: &[Breakpoint] = &[
    set(0.0, 55.0),
    glide(2.0, 110.0),
    glide(4.0, 55.0),
    set(4.0, 73.0),
    glide(6.0, 146.0),
];
const BASS_GAIN: &[Breakpoint] = &[set(0.0, 0.3), glide(DEMO_SECONDS, 0.01)];

const LEAD_FREQUENCY: &[Breakpoint] = &[
    set(0.0, 220.0),
    set(0.25, 277.0),
    set(0.5, 330.0),
    set(0.75, 440.0),
    set(1.0, 330.0),
    set(1.25, 277.0),
    set(1.5, 220.0),
    set(1.75, 165.0),
    set(2.0, 220.0),
];
const LEAD_CUTOFF: &[Breakpoint] = &[set(0.0, 800.0), glide(4.0, 3000.0), glide(8.0, 500.0)];
const LEAD_GAIN: &[Breakpoint] = &[set(0.0, 0.15), glide(DEMO_SECONDS, 0.01)];

const PAD_FREQUENCY: f32 = 440.0;
const PAD_GAIN: &[Breakpoint] = &[set(0.0, 0.1), glide(DEMO_SECONDS, 0.01)];

/// Value of an automation lane at `time`.
fn automation(lane: &[Breakpoint], time: f32) -> f32 {
    let Some(first) = lane.first() else {
        return 0.0;
    };

    let mut current = *first;
    for next in lane {
        if next.at <= time {
            current = *next;
            continue;
        }
        if next.ramp == Ramp::Exponential && next.at > current.at && current.value > 0.0 {
            let progress = (time - current.at) / (next.at - current.at);
            return current.value * (next.value / current.value).powf(progress);
        }
        break;
    }
    current.value
}

#[derive(Debug, Clone)]
pub struct SynthwaveSource {
    sample_rate: u32,
    position: u64,
    total: u64,
    bass_phase: f32,
    lead_phase: f32,
    pad_phase: f32,
    filtered: f32,
}

impl SynthwaveSource {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            sample_rate,
            position: 0,
            total: (DEMO_SECONDS * sample_rate as f32) as u64,
            bass_phase: 0.0,
            lead_phase: 0.0,
            pad_phase: 0.0,
            filtered: 0.0,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let rate = self.sample_rate as f32;
        let time = self.position as f32 / rate;

        let bass = sawtooth(self.bass_phase) * automation(BASS_GAIN, time);
        let lead_raw = square(self.lead_phase);
        let cutoff = automation(LEAD_CUTOFF, time).min(rate * 0.45);
        let alpha = 1.0 - (-2.0 * PI * cutoff / rate).exp();
        self.filtered += alpha * (lead_raw - self.filtered);
        let lead = self.filtered * automation(LEAD_GAIN, time);
        let pad = (2.0 * PI * self.pad_phase).sin() * automation(PAD_GAIN, time);

        self.bass_phase = advance_phase(self.bass_phase, automation(BASS_FREQUENCY, time), rate);
        self.lead_phase = advance_phase(self.lead_phase, automation(LEAD_FREQUENCY, time), rate);
        self.pad_phase = advance_phase(self.pad_phase, PAD_FREQUENCY, rate);
        self.position += 1;

        bass + lead + pad
    }
}

impl SampleSource for SynthwaveSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = self.total.saturating_sub(self.position) as usize;
        let count = out.len().min(remaining);
        for slot in &mut out[..count] {
            *slot = self.next_sample();
        }
        count
    }

    fn is_finished(&self) -> bool {
        self.position >= self.total
    }
}

fn advance_phase(phase: f32, frequency: f32, rate: f32) -> f32 {
    (phase + frequency / rate).fract()
}

fn sawtooth(phase: f32) -> f32 {
    2.0 * phase - 1.0
}

fn square(phase: f32) -> f32 {
    if phase < 0.5 {
        1.0
    } else {
        -1.0
    }
}
