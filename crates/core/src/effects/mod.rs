//! Beat reactions and manual effects.
//!
//! Every effect is a countdown measured in ticks (60 ticks is roughly one
//! second). Triggers start or extend a countdown; [`Effects::advance`] is
//! called once per tick and reports which effects the host should show for
//! that frame.

use glam::Vec2;
use serde::Serialize;

use crate::{BeatEvent, Color, ParticleField, Theme};

/// Glow around the visualiser after a beat.
pub const BEAT_FLASH_TICKS: u32 = 6;
pub const BEAT_INDICATOR_TICKS: u32 = 9;
/// Whole-screen pulse after a strong beat.
pub const BEAT_PULSE_TICKS: u32 = 6;
/// Bass level above which a beat also pulses the screen.
pub const STRONG_BEAT_BASS: f32 = 1.2;
pub const FLASH_TICKS: u32 = 18;
pub const SHAKE_TICKS: u32 = 30;
pub const EXPLOSION_PARTICLES: usize = 50;

const HUE_STEP: f32 = 2.0;
const PULSE_MIN_BASS: f32 = 0.5;
const PULSE_DEPTH: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Countdown(u32);

impl Countdown {
    /// Restarting never shortens a countdown already running.
    fn start(&mut self, ticks: u32) {
        self.0 = self.0.max(ticks);
    }

    fn is_active(self) -> bool {
        self.0 > 0
    }

    fn tick(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }
}

/// What the host should apply to the frame being presented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameEffects {
    /// Glow colour around the visualiser, if a beat flash is showing.
    pub beat_flash: Option<Color>,
    pub beat_indicator: bool,
    pub beat_pulse: bool,
    pub flash: bool,
    pub shake: bool,
    /// Hue rotation in degrees while rainbow mode is on.
    pub hue_rotation: Option<f32>,
    /// Uniform scale of the visualiser surface.
    pub scale: f32,
}

impl Default for FrameEffects {
    fn default() -> Self {
        Self {
            beat_flash: None,
            beat_indicator: false,
            beat_pulse: false,
            flash: false,
            shake: false,
            hue_rotation: None,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Effects {
    beat_flash: Countdown,
    beat_flash_color: Color,
    beat_indicator: Countdown,
    beat_pulse: Countdown,
    flash: Countdown,
    shake: Countdown,
    rainbow: bool,
    hue: f32,
    pulse: bool,
    scale: f32,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            beat_flash: Countdown::default(),
            beat_flash_color: Color::WHITE,
            beat_indicator: Countdown::default(),
            beat_pulse: Countdown::default(),
            flash: Countdown::default(),
            shake: Countdown::default(),
            rainbow: false,
            hue: 0.0,
            pulse: false,
            scale: 1.0,
        }
    }
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reacts to a detected beat. Callers decide whether beat reactions are
    /// enabled.
    pub fn on_beat(&mut self, event: &BeatEvent, theme: &Theme) {
        self.beat_flash.start(BEAT_FLASH_TICKS);
        self.beat_flash_color = theme.primary;
        self.beat_indicator.start(BEAT_INDICATOR_TICKS);
        if event.bass > STRONG_BEAT_BASS {
            self.beat_pulse.start(BEAT_PULSE_TICKS);
        }
    }

    pub fn trigger_flash(&mut self) {
        self.flash.start(FLASH_TICKS);
    }

    pub fn trigger_shake(&mut self) {
        self.shake.start(SHAKE_TICKS);
    }

    /// Bursts particles out of `origin`, then flashes and shakes.
    pub fn explode(&mut self, field: &mut ParticleField, origin: Vec2, theme: &Theme) {
        field.spawn_explosion(origin, EXPLOSION_PARTICLES, theme);
        self.trigger_flash();
        self.trigger_shake();
    }

    pub fn set_rainbow(&mut self, enabled: bool) {
        self.rainbow = enabled;
    }

    pub fn rainbow(&self) -> bool {
        self.rainbow
    }

    pub fn set_pulse(&mut self, enabled: bool) {
        self.pulse = enabled;
        if !enabled {
            self.scale = 1.0;
        }
    }

    pub fn pulse(&self) -> bool {
        self.pulse
    }

    /// Steps every timer by one tick and returns what is visible on it.
    pub fn advance(&mut self, bass: f32) -> FrameEffects {
        if self.rainbow {
            self.hue = (self.hue + HUE_STEP) % 360.0;
        }
        if self.pulse && bass > PULSE_MIN_BASS {
            self.scale = 1.0 + bass * PULSE_DEPTH;
        }

        let summary = FrameEffects {
            beat_flash: self
                .beat_flash
                .is_active()
                .then_some(self.beat_flash_color),
            beat_indicator: self.beat_indicator.is_active(),
            beat_pulse: self.beat_pulse.is_active(),
            flash: self.flash.is_active(),
            shake: self.shake.is_active(),
            hue_rotation: self.rainbow.then_some(self.hue),
            scale: self.scale,
        };

        for countdown in [
            &mut self.beat_flash,
            &mut self.beat_indicator,
            &mut self.beat_pulse,
            &mut self.flash,
            &mut self.shake,
        ] {
            countdown.tick();
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{FieldConfig, ThemePreset};

    fn frames_active(effects: &mut Effects, pick: impl Fn(&FrameEffects) -> bool) -> usize {
        (0..60).filter(|_| pick(&effects.advance(0.0))).count()
    }

    #[test]
    fn beat_timers_run_for_their_tick_counts() {
        let theme = ThemePreset::Sunset.theme();
        let mut effects = Effects::new();
        effects.on_beat(&BeatEvent { tick: 0, bass: 0.9 }, &theme);

        let first = effects.advance(0.9);
        assert_eq!(first.beat_flash, Some(theme.primary));
        assert!(first.beat_indicator);
        assert!(!first.beat_pulse);

        let mut flash = effects.clone();
        assert_eq!(frames_active(&mut flash, |f| f.beat_flash.is_some()), 5);
        assert_eq!(frames_active(&mut effects, |f| f.beat_indicator), 8);
    }

    #[test]
    fn only_strong_beats_pulse_the_screen() {
        let theme = Theme::default();
        let mut effects = Effects::new();
        effects.on_beat(&BeatEvent { tick: 0, bass: 1.5 }, &theme);
        assert_eq!(frames_active(&mut effects, |f| f.beat_pulse), BEAT_PULSE_TICKS as usize);
    }

    #[test]
    fn retriggering_extends_but_never_shortens() {
        let mut effects = Effects::new();
        effects.trigger_shake();
        for _ in 0..25 {
            effects.advance(0.0);
        }
        effects.trigger_shake();
        assert_eq!(frames_active(&mut effects, |f| f.shake), SHAKE_TICKS as usize);

        effects.trigger_flash();
        effects.trigger_flash();
        assert_eq!(frames_active(&mut effects, |f| f.flash), FLASH_TICKS as usize);
    }

    #[test]
    fn rainbow_hue_wraps_at_a_full_turn() {
        let mut effects = Effects::new();
        assert_eq!(effects.advance(0.0).hue_rotation, None);

        effects.set_rainbow(true);
        assert_eq!(effects.advance(0.0).hue_rotation, Some(2.0));
        for _ in 0..178 {
            effects.advance(0.0);
        }
        assert_eq!(effects.advance(0.0).hue_rotation, Some(0.0));
    }

    #[test]
    fn pulse_holds_its_last_scale_until_disabled() {
        let mut effects = Effects::new();
        assert_eq!(effects.advance(2.0).scale, 1.0);

        effects.set_pulse(true);
        assert!((effects.advance(2.0).scale - 1.1).abs() < 1e-6);
        assert!((effects.advance(0.1).scale - 1.1).abs() < 1e-6);

        effects.set_pulse(false);
        assert_eq!(effects.advance(2.0).scale, 1.0);
    }

    #[test]
    fn explosion_spawns_particles_and_shakes() {
        let config = FieldConfig {
            ambient_count: 10,
            ..FieldConfig::default()
        };
        let mut field = ParticleField::new(&config, StdRng::seed_from_u64(5));
        let mut effects = Effects::new();
        effects.explode(&mut field, Vec2::new(640.0, 360.0), &Theme::default());

        assert_eq!(field.ephemeral_count(), EXPLOSION_PARTICLES);
        assert_eq!(field.ambient_count(), 10);
        let frame = effects.advance(0.0);
        assert!(frame.flash && frame.shake);
    }
}
