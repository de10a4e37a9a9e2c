//! The frame scheduler and the clocks that drive it.
//!
//! One call to [`FrameScheduler::tick_at`] runs the whole pipeline for one
//! display refresh, in a fixed order:
//!
//! 1. advance the elapsed-time accumulator by `speed`;
//! 2. count the tick towards the frames-per-second figure;
//! 3. pull a snapshot from the audio source (silence without a session);
//! 4. run beat detection and, if `beat_react` is on, trigger beat effects;
//! 5. advance the particle field;
//! 6. draw the active mode, the overlays and the point cloud;
//! 7. mirror the main layer when `mirror` is on.
//!
//! Step 8, waiting for the next refresh, belongs to the [`FramePacer`] that
//! [`FrameScheduler::run`] is given. Every consumer reads the same snapshot
//! and the same sanitised [`Controls`] within a tick.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    audio::{AnalysisSource, SessionControl, SessionRequest},
    modes::{overlay, DispatchOutcome, Emblem, ModeInput},
    particles::Bounds,
    render::{DrawList, Layer, Surface},
    AppConfig, AudioSnapshot, BeatDetector, BeatEvent, BpmEstimate, Effects, FeatureExtractor,
    FieldConfig, FrameEffects, Mode, ModeDispatcher, ParticleField, PointCloud, Result, Settings,
    Theme, WAVEFORM_CENTER,
};

/// Opacity of the fade laid over the background layer each tick (0.1).
const BACKGROUND_FADE: u8 = 25;
/// Opacity of the fade laid over the main layer each tick (0.15).
const MAIN_FADE: u8 = 38;
const STRIP_HEIGHT: f32 = 100.0;
/// Largest edge a surface may have, in pixels. Longer edges are clamped.
pub const MAX_SURFACE_EDGE: f32 = 8192.0;
const EMBLEM_SUBTITLE: &str = "AUDIO VISUALISER";

/// Sizes of the four drawing surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub main: Bounds,
    pub background: Bounds,
    pub waveform: Bounds,
    pub spectrum: Bounds,
}

impl Viewport {
    /// Main and background cover the configured field; the two strips span
    /// its width.
    pub fn from_field(config: &FieldConfig) -> Self {
        let full = Bounds::new(config.width, config.height);
        let strip = Bounds::new(config.width, STRIP_HEIGHT);
        Self {
            main: full,
            background: full,
            waveform: strip,
            spectrum: strip,
        }
    }
}

impl Viewport {
    fn sanitized(&self) -> Viewport {
        Viewport {
            main: clamp_surface(self.main),
            background: clamp_surface(self.background),
            waveform: clamp_surface(self.waveform),
            spectrum: clamp_surface(self.spectrum),
        }
    }
}

/// Caps oversized edges. Degenerate sizes pass through and fail closed in
/// the drawing code.
fn clamp_surface(bounds: Bounds) -> Bounds {
    let cap = |edge: f32| if edge > MAX_SURFACE_EDGE { MAX_SURFACE_EDGE } else { edge };
    Bounds::new(cap(bounds.width), cap(bounds.height))
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_field(&FieldConfig::default())
    }
}

/// Everything the host may change between two ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub settings: Settings,
    pub theme: Theme,
    pub mode: Mode,
    pub viewport: Viewport,
}

impl Controls {
    fn sanitized(&self) -> Controls {
        let viewport = self.viewport.sanitized();
        if viewport != self.viewport {
            debug!(requested = ?self.viewport, ?viewport, "clamped oversized viewport");
        }
        Controls {
            settings: self.settings.sanitized(),
            viewport,
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Elapsed-time accumulator advanced by the speed setting every tick.
#[derive(Debug, Default, Clone)]
pub struct ElapsedClock {
    time: f32,
}

impl ElapsedClock {
    pub fn advance(&mut self, delta: f32) {
        self.time = (self.time + delta).max(0.0);
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

/// Counts ticks per wall-clock second.
#[derive(Debug, Default, Clone)]
pub struct ThroughputCounter {
    window_start: Option<Instant>,
    ticks: u32,
    fps: u32,
}

impl ThroughputCounter {
    /// Records one tick at `now`. Returns the new figure whenever a full
    /// second has elapsed since the window opened.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.ticks += 1;
        if now.saturating_duration_since(start) < Duration::from_secs(1) {
            return None;
        }
        self.fps = self.ticks;
        self.ticks = 0;
        self.window_start = Some(now);
        Some(self.fps)
    }

    /// Ticks counted in the last completed second, 0 before the first.
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

/// Colour band of the frames-per-second readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FpsGrade {
    Good,
    Fair,
    Poor,
}

impl FpsGrade {
    pub fn from_fps(fps: u32) -> Self {
        match fps {
            50.. => FpsGrade::Good,
            30..=49 => FpsGrade::Fair,
            _ => FpsGrade::Poor,
        }
    }
}

/// Readouts for the host's statistics panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameStats {
    pub fps: u32,
    pub grade: FpsGrade,
    pub bass_percent: u8,
    pub treble_percent: u8,
    /// `floor(average × 1000)`, shown with a "Hz" label. A display value,
    /// not a measured frequency.
    pub display_frequency: u32,
    pub bpm: Option<BpmEstimate>,
}

impl FrameStats {
    pub fn new(snapshot: &AudioSnapshot, fps: u32, bpm: Option<BpmEstimate>) -> Self {
        Self {
            fps,
            grade: FpsGrade::from_fps(fps),
            bass_percent: percent(snapshot.bass),
            treble_percent: percent(snapshot.treble),
            display_frequency: (snapshot.average * 1000.0).floor().max(0.0) as u32,
            bpm,
        }
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(&AudioSnapshot::silent(0), 0, None)
    }
}

fn percent(level: f32) -> u8 {
    if level.is_finite() {
        (level * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// One composed tick, handed to the [`Surface`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub tick: u64,
    pub time: f32,
    pub mode: Mode,
    pub theme: Theme,
    pub viewport: Viewport,
    pub snapshot: AudioSnapshot,
    pub beat: Option<BeatEvent>,
    pub effects: FrameEffects,
    pub stats: FrameStats,
    pub mirrored: bool,
    background: DrawList,
    main: DrawList,
    waveform: DrawList,
    spectrum: DrawList,
}

impl Frame {
    fn new(bins: usize, controls: &Controls) -> Self {
        Self {
            tick: 0,
            time: 0.0,
            mode: controls.mode,
            theme: controls.theme,
            viewport: controls.viewport,
            snapshot: AudioSnapshot::silent(bins),
            beat: None,
            effects: FrameEffects::default(),
            stats: FrameStats::default(),
            mirrored: false,
            background: DrawList::new(),
            main: DrawList::new(),
            waveform: DrawList::new(),
            spectrum: DrawList::new(),
        }
    }

    pub fn layer(&self, layer: Layer) -> &DrawList {
        match layer {
            Layer::Background => &self.background,
            Layer::Main => &self.main,
            Layer::Waveform => &self.waveform,
            Layer::Spectrum => &self.spectrum,
        }
    }

    /// Draw commands across all four layers.
    pub fn command_count(&self) -> usize {
        self.background.len() + self.main.len() + self.waveform.len() + self.spectrum.len()
    }
}

/// The platform's display-refresh primitive. Blocks until the next frame is
/// due and returns its timestamp, or `None` once no more frames should run.
pub trait FramePacer {
    fn next_frame(&mut self) -> Option<Instant>;
}

/// Sleeps to hold a fixed frame rate, optionally for a limited number of
/// frames.
#[derive(Debug, Clone)]
pub struct FixedRatePacer {
    interval: Duration,
    next: Option<Instant>,
    remaining: Option<u64>,
}

impl FixedRatePacer {
    pub fn new(fps: u32, limit: Option<u64>) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            next: None,
            remaining: limit,
        }
    }
}

impl FramePacer for FixedRatePacer {
    fn next_frame(&mut self) -> Option<Instant> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        let at = Instant::now();
        // after a long stall, restart the cadence instead of racing to catch up
        let base = if at > due + self.interval { at } else { due };
        self.next = Some(base + self.interval);
        Some(at)
    }
}

/// Top-level loop: owns every stateful subsystem and composes one
/// [`Frame`] per tick from a single snapshot.
pub struct FrameScheduler<S> {
    source: S,
    state: SchedulerState,
    controls: Controls,
    extractor: FeatureExtractor,
    detector: BeatDetector,
    field: ParticleField,
    dispatcher: ModeDispatcher,
    effects: Effects,
    cloud: PointCloud,
    clock: ElapsedClock,
    throughput: ThroughputCounter,
    watermark: Arc<str>,
    frequency: Vec<u8>,
    waveform: Vec<u8>,
    frame: Frame,
    next_tick: u64,
    session_was_active: bool,
}

impl<S: AnalysisSource + SessionControl> FrameScheduler<S> {
    /// Builds every subsystem from `config`. The scheduler starts `Idle`.
    pub fn new(source: S, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let bins = source.bin_count();
        let extractor = FeatureExtractor::new(bins)?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let cloud = PointCloud::new(&config.scene, &mut rng);
        let field = ParticleField::new(&config.field, StdRng::seed_from_u64(rng.gen()));

        let watermark: Arc<str> = Arc::from(config.watermark.as_str());
        let mut dispatcher = ModeDispatcher::new(seed);
        dispatcher.register(Box::new(Emblem::new(watermark.clone(), EMBLEM_SUBTITLE)));

        let controls = Controls {
            settings: config.settings,
            theme: config.theme.theme(),
            mode: config.mode,
            viewport: Viewport::from_field(&config.field),
        };
        debug!(seed, bins, mode = %config.mode, theme = %config.theme, "scheduler ready");

        Ok(Self {
            session_was_active: source.active().is_some(),
            source,
            state: SchedulerState::Idle,
            controls,
            extractor,
            detector: BeatDetector::new(),
            field,
            dispatcher,
            effects: Effects::new(),
            cloud,
            clock: ElapsedClock::default(),
            throughput: ThroughputCounter::default(),
            watermark,
            frequency: vec![0; bins],
            waveform: vec![WAVEFORM_CENTER; bins],
            frame: Frame::new(bins, &controls),
            next_tick: 0,
        })
    }

    /// Replaces the mode table, e.g. to bind custom renderers.
    pub fn with_dispatcher(mut self, dispatcher: ModeDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn resume(&mut self) {
        if self.state == SchedulerState::Idle {
            debug!("scheduler running");
            self.state = SchedulerState::Running;
        }
    }

    pub fn pause(&mut self) {
        if self.state == SchedulerState::Running {
            debug!("scheduler idle");
            self.state = SchedulerState::Idle;
        }
    }

    /// Starts an audio session and resumes ticking.
    ///
    /// A device error is returned but not fatal: the scheduler still
    /// resumes and renders silence. Any other error leaves everything as it
    /// was.
    pub fn start_session(&mut self, request: SessionRequest) -> Result<()> {
        let kind = request.kind();
        match self.source.start(request) {
            Ok(()) => {
                self.detector.reset();
                self.session_was_active = true;
                debug!(%kind, "session started, beat history cleared");
                self.resume();
                Ok(())
            }
            Err(err) if err.is_device() => {
                warn!(%kind, %err, "capture unavailable, rendering silence");
                self.resume();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Detaches from the audio source; later ticks see silence.
    pub fn stop_session(&mut self) {
        self.source.stop();
        self.detector.reset();
        self.session_was_active = false;
        debug!("session stopped, beat history cleared");
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.controls.mode != mode {
            info!(%mode, "mode changed");
        }
        self.controls.mode = mode;
    }

    /// Selects a mode by name. Unknown names select the default mode and
    /// return the error.
    pub fn set_mode_by_name(&mut self, name: &str) -> Result<()> {
        match name.parse::<Mode>() {
            Ok(mode) => {
                self.set_mode(mode);
                Ok(())
            }
            Err(err) => {
                warn!(%err, fallback = %Mode::default(), "falling back to the default mode");
                self.set_mode(Mode::default());
                Err(err)
            }
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        info!(primary = %theme.primary, "theme changed");
        self.controls.theme = theme;
    }

    /// Stored as given; sanitised at the start of every tick.
    pub fn set_settings(&mut self, settings: Settings) {
        self.controls.settings = settings;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.controls.viewport = viewport;
    }

    pub fn flash(&mut self) {
        self.effects.trigger_flash();
    }

    pub fn shake(&mut self) {
        self.effects.trigger_shake();
    }

    /// Bursts particles from the centre of the main surface.
    pub fn explode(&mut self) {
        let origin = self.controls.viewport.main.center();
        self.effects
            .explode(&mut self.field, origin, &self.controls.theme);
    }

    pub fn set_rainbow(&mut self, enabled: bool) {
        self.effects.set_rainbow(enabled);
    }

    pub fn set_pulse(&mut self, enabled: bool) {
        self.effects.set_pulse(enabled);
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &BeatDetector {
        &self.detector
    }

    pub fn point_cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.next_tick
    }

    pub fn tick(&mut self) -> Option<&Frame> {
        self.tick_at(Instant::now())
    }

    /// Runs one tick as if the display refreshed at `now`. Does nothing and
    /// returns `None` while idle.
    pub fn tick_at(&mut self, now: Instant) -> Option<&Frame> {
        if self.state == SchedulerState::Idle {
            return None;
        }
        let Controls {
            settings,
            theme,
            mode,
            viewport,
        } = self.controls.sanitized();
        let tick = self.next_tick;
        self.next_tick += 1;

        self.clock.advance(settings.speed);
        let time = self.clock.time();

        if let Some(fps) = self.throughput.record(now) {
            debug!(fps, "throughput");
        }

        self.pull_snapshot(settings.sensitivity);
        let frame = &mut self.frame;
        let bass = frame.snapshot.bass;
        let intensity = frame.snapshot.intensity();

        let decision = self.detector.observe(bass, tick);
        if let Some(event) = &decision.event {
            if settings.beat_react {
                self.effects.on_beat(event, &theme);
            }
        }
        let effects = self.effects.advance(bass);

        self.field.advance(intensity, viewport.background);

        frame.background.clear();
        frame.main.clear();
        frame.waveform.clear();
        frame.spectrum.clear();

        frame.background.rect(
            Vec2::ZERO,
            Vec2::new(viewport.background.width, viewport.background.height),
            theme.background.with_alpha(BACKGROUND_FADE),
        );
        self.field.draw_into(intensity, &theme, &mut frame.background);

        frame.main.rect(
            Vec2::ZERO,
            Vec2::new(viewport.main.width, viewport.main.height),
            theme.background.with_alpha(MAIN_FADE),
        );
        let input = ModeInput {
            snapshot: &frame.snapshot,
            theme: &theme,
            settings: &settings,
            time,
            bounds: viewport.main,
        };
        if let DispatchOutcome::Unbound = self.dispatcher.dispatch(mode, &input, &mut frame.main) {
            let fallback = Mode::default();
            warn!(%mode, %fallback, "no renderer bound, drawing the default mode");
            self.dispatcher.dispatch(fallback, &input, &mut frame.main);
        }
        overlay::watermark(&self.watermark, &theme, viewport.main, &mut frame.main);
        overlay::waveform_strip(&frame.snapshot, &theme, &settings, viewport.waveform, &mut frame.waveform);
        overlay::mini_spectrum(&frame.snapshot, &theme, &settings, viewport.spectrum, &mut frame.spectrum);
        self.cloud.update(&frame.snapshot, &settings, &theme, time);

        if settings.mirror {
            frame.main.mirror_horizontal(viewport.main.width);
        }

        frame.tick = tick;
        frame.time = time;
        frame.mode = mode;
        frame.theme = theme;
        frame.viewport = viewport;
        frame.beat = decision.event;
        frame.effects = effects;
        frame.mirrored = settings.mirror;
        frame.stats = FrameStats::new(
            &frame.snapshot,
            self.throughput.fps(),
            self.detector.bpm_estimate(),
        );
        Some(&self.frame)
    }

    /// Ticks while running and `pacer` grants frames, presenting each one.
    /// Returns the number of frames presented. Surface failures are logged
    /// and do not stop the loop.
    pub fn run(&mut self, pacer: &mut impl FramePacer, surface: &mut impl Surface) -> u64 {
        let mut presented = 0;
        while self.state == SchedulerState::Running {
            let Some(now) = pacer.next_frame() else {
                break;
            };
            let Some(frame) = self.tick_at(now) else {
                break;
            };
            if let Err(err) = surface.present(frame) {
                warn!(tick = frame.tick, %err, "surface rejected frame");
            }
            presented += 1;
        }
        presented
    }

    fn pull_snapshot(&mut self, sensitivity: f32) {
        if let Err(err) = self.source.pull_frame(&mut self.frequency, &mut self.waveform) {
            warn!(%err, "analysis failed, using silence");
            self.frequency.fill(0);
            self.waveform.fill(WAVEFORM_CENTER);
        }

        let active = self.source.active().is_some();
        if self.session_was_active && !active {
            debug!("session ended, beat history cleared");
            self.detector.reset();
        }
        self.session_was_active = active;

        self.extractor.extract_into(
            &self.frequency,
            &self.waveform,
            sensitivity,
            &mut self.frame.snapshot,
        );
    }
}

impl<S> std::fmt::Debug for FrameScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("controls", &self.controls)
            .field("ticks", &self.next_tick)
            .field("field", &self.field)
            .finish()
    }
}
