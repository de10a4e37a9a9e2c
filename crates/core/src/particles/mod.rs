//! Ambient and ephemeral particles.
//!
//! The field is the renderer's only long-lived simulation state. Ambient
//! particles are created once, never die and wrap around the field edges.
//! Ephemeral particles come from effects such as explosions; they fade out
//! over [`EPHEMERAL_LIFETIME_TICKS`] ticks and are compacted away in place.

use glam::Vec2;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{render::DrawList, Color, FieldConfig, Theme, INTENSITY_FLOOR};

/// Life lost by an ephemeral particle on every tick.
pub const DECAY_STEP: f32 = 0.02;
pub const EPHEMERAL_LIFETIME_TICKS: u32 = 50;
/// Opacity of a particle at full life.
pub const BASE_OPACITY: f32 = 0.5;

const AMBIENT_MAX_SPEED: f32 = 0.5;
const AMBIENT_MIN_SIZE: f32 = 1.0;
const AMBIENT_SIZE_SPREAD: f32 = 3.0;
const EXPLOSION_MAX_SPEED: f32 = 30.0;
const EXPLOSION_MIN_SIZE: f32 = 5.0;
const EXPLOSION_SIZE_SPREAD: f32 = 10.0;

/// Width and height of a drawing area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Positive, finite area.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Ambient,
    Ephemeral { age: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Current size; ephemeral particles shrink with their life.
    pub size: f32,
    base_size: f32,
    /// 1 for ambient particles, falling to 0 for ephemeral ones.
    pub life: f32,
    pub color: Option<Color>,
    pub kind: ParticleKind,
}

impl Particle {
    pub fn is_ambient(&self) -> bool {
        matches!(self.kind, ParticleKind::Ambient)
    }

    /// Ages an ephemeral particle by one tick. Returns `false` once dead.
    fn decay(&mut self) -> bool {
        let ParticleKind::Ephemeral { age } = &mut self.kind else {
            return true;
        };
        *age += 1;
        self.life = 1.0 - *age as f32 / EPHEMERAL_LIFETIME_TICKS as f32;
        self.size = self.base_size * self.life.max(0.0);
        self.life > 0.0
    }
}

pub struct ParticleField {
    ambient: Vec<Particle>,
    ephemeral: Vec<Particle>,
    rng: StdRng,
}

impl ParticleField {
    /// Scatters `config.ambient_count` ambient particles over the configured
    /// area.
    pub fn new(config: &FieldConfig, mut rng: StdRng) -> Self {
        let bounds = Bounds::new(config.width.max(1.0), config.height.max(1.0));
        let ambient = (0..config.ambient_count)
            .map(|_| {
                let size = rng.gen::<f32>() * AMBIENT_SIZE_SPREAD + AMBIENT_MIN_SIZE;
                Particle {
                    position: Vec2::new(
                        rng.gen::<f32>() * bounds.width,
                        rng.gen::<f32>() * bounds.height,
                    ),
                    velocity: Vec2::new(
                        (rng.gen::<f32>() - 0.5) * AMBIENT_MAX_SPEED,
                        (rng.gen::<f32>() - 0.5) * AMBIENT_MAX_SPEED,
                    ),
                    size,
                    base_size: size,
                    life: 1.0,
                    color: None,
                    kind: ParticleKind::Ambient,
                }
            })
            .collect();

        Self {
            ambient,
            ephemeral: Vec::new(),
            rng,
        }
    }

    pub fn ambient_count(&self) -> usize {
        self.ambient.len()
    }

    pub fn ephemeral_count(&self) -> usize {
        self.ephemeral.len()
    }

    pub fn ambient(&self) -> &[Particle] {
        &self.ambient
    }

    pub fn ephemeral(&self) -> &[Particle] {
        &self.ephemeral
    }

    /// Adds `count` short-lived particles bursting out of `origin` in the
    /// theme's primary colour.
    pub fn spawn_explosion(&mut self, origin: Vec2, count: usize, theme: &Theme) {
        self.ephemeral.reserve(count);
        for _ in 0..count {
            let size = self.rng.gen::<f32>() * EXPLOSION_SIZE_SPREAD + EXPLOSION_MIN_SIZE;
            let velocity = Vec2::new(
                (self.rng.gen::<f32>() - 0.5) * EXPLOSION_MAX_SPEED,
                (self.rng.gen::<f32>() - 0.5) * EXPLOSION_MAX_SPEED,
            );
            self.ephemeral.push(Particle {
                position: origin,
                velocity,
                size,
                base_size: size,
                life: 1.0,
                color: Some(theme.primary),
                kind: ParticleKind::Ephemeral { age: 0 },
            });
        }
    }

    /// Moves every particle one tick, wrapping ambient ones at `bounds` and
    /// dropping dead ephemeral ones.
    pub fn advance(&mut self, intensity: f32, bounds: Bounds) {
        let speed = 1.0 + 2.0 * sanitize_intensity(intensity);

        for particle in &mut self.ambient {
            particle.position += particle.velocity * speed;
            if bounds.is_drawable() {
                wrap(&mut particle.position, bounds);
            }
        }

        // retain_mut visits each element exactly once and keeps order
        self.ephemeral.retain_mut(|particle| {
            particle.position += particle.velocity * speed;
            particle.decay()
        });
    }

    /// Appends one circle per particle: ambient first, then ephemeral.
    pub fn draw_into(&self, intensity: f32, theme: &Theme, out: &mut DrawList) {
        let grow = 1.0 + sanitize_intensity(intensity);
        for (index, particle) in self.ambient.iter().enumerate() {
            let fallback = if index % 2 == 0 {
                theme.primary
            } else {
                theme.secondary
            };
            draw_particle(particle, particle.color.unwrap_or(fallback), grow, out);
        }
        for particle in &self.ephemeral {
            draw_particle(particle, particle.color.unwrap_or(theme.primary), grow, out);
        }
    }
}

impl std::fmt::Debug for ParticleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleField")
            .field("ambient", &self.ambient.len())
            .field("ephemeral", &self.ephemeral.len())
            .finish()
    }
}

fn draw_particle(particle: &Particle, color: Color, grow: f32, out: &mut DrawList) {
    out.circle(particle.position, particle.size * grow, color)
        .opacity(particle.life * BASE_OPACITY);
}

fn wrap(position: &mut Vec2, bounds: Bounds) {
    if position.x < 0.0 {
        position.x = bounds.width;
    }
    if position.x > bounds.width {
        position.x = 0.0;
    }
    if position.y < 0.0 {
        position.y = bounds.height;
    }
    if position.y > bounds.height {
        position.y = 0.0;
    }
}

fn sanitize_intensity(intensity: f32) -> f32 {
    if intensity.is_finite() {
        intensity.max(0.0)
    } else {
        INTENSITY_FLOOR
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{render::Shape, ThemePreset};

    fn field(ambient_count: usize) -> ParticleField {
        let config = FieldConfig {
            ambient_count,
            width: 200.0,
            height: 100.0,
        };
        ParticleField::new(&config, StdRng::seed_from_u64(42))
    }

    const BOUNDS: Bounds = Bounds::new(200.0, 100.0);

    #[test]
    fn explosion_dies_out_and_ambient_count_holds() {
        let mut field = field(100);
        let theme = ThemePreset::Cyberpunk.theme();
        field.spawn_explosion(BOUNDS.center(), 50, &theme);
        assert_eq!(field.ephemeral_count(), 50);

        let mut previous = field.ephemeral_count();
        for _ in 0..EPHEMERAL_LIFETIME_TICKS {
            field.advance(0.3, BOUNDS);
            assert!(field.ephemeral_count() <= previous);
            previous = field.ephemeral_count();
            assert_eq!(field.ambient_count(), 100);
        }
        assert_eq!(field.ephemeral_count(), 0);
    }

    #[test]
    fn ephemeral_particles_fade_and_shrink_with_life() {
        let mut field = field(0);
        field.spawn_explosion(Vec2::ZERO, 1, &ThemePreset::Ocean.theme());
        let start = field.ephemeral()[0];

        for _ in 0..25 {
            field.advance(0.0, BOUNDS);
        }
        let half = field.ephemeral()[0];
        assert!((half.life - 0.5).abs() < 1e-6);
        assert!((half.size - start.size * 0.5).abs() < 1e-4);
        assert_eq!(half.color, Some(ThemePreset::Ocean.theme().primary));
    }

    #[test]
    fn explosion_velocities_are_bounded_and_varied() {
        let mut field = field(0);
        field.spawn_explosion(Vec2::new(5.0, 5.0), 50, &Theme::default());
        let particles = field.ephemeral();
        assert!(particles
            .iter()
            .all(|p| p.velocity.x.abs() <= 15.0 && p.velocity.y.abs() <= 15.0));
        assert!(particles.iter().all(|p| p.position == Vec2::new(5.0, 5.0)));
        assert!(particles.windows(2).any(|w| w[0].velocity != w[1].velocity));
    }

    #[test]
    fn ambient_particles_wrap_at_the_edges() {
        let mut field = field(1);
        field.ambient[0].position = Vec2::new(199.9, 99.9);
        field.ambient[0].velocity = Vec2::new(0.5, 0.5);
        field.advance(0.0, BOUNDS);
        assert_eq!(field.ambient()[0].position, Vec2::new(0.0, 0.0));

        field.ambient[0].velocity = Vec2::new(-0.5, -0.5);
        field.advance(0.0, BOUNDS);
        assert_eq!(field.ambient()[0].position, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn speed_scales_with_intensity() {
        let mut field = field(1);
        field.ambient[0].position = Vec2::new(50.0, 50.0);
        field.ambient[0].velocity = Vec2::new(0.2, 0.0);

        field.advance(INTENSITY_FLOOR, BOUNDS);
        assert!((field.ambient()[0].position.x - (50.0 + 0.2 * 1.2)).abs() < 1e-5);

        field.advance(1.0, BOUNDS);
        assert!((field.ambient()[0].position.x - (50.24 + 0.6)).abs() < 1e-4);
    }

    #[test]
    fn removal_keeps_survivor_order() {
        let mut field = field(0);
        let theme = Theme::default();
        field.spawn_explosion(Vec2::ZERO, 3, &theme);
        for _ in 0..10 {
            field.advance(0.0, BOUNDS);
        }
        field.spawn_explosion(Vec2::ONE, 3, &theme);
        let late: Vec<Vec2> = field.ephemeral()[3..].iter().map(|p| p.velocity).collect();

        for _ in 0..(EPHEMERAL_LIFETIME_TICKS - 10) {
            field.advance(0.0, BOUNDS);
        }
        let survivors: Vec<Vec2> = field.ephemeral().iter().map(|p| p.velocity).collect();
        assert_eq!(survivors, late);
    }

    #[test]
    fn draw_instructions_follow_life_and_theme() {
        let mut field = field(2);
        let theme = ThemePreset::Sunset.theme();
        field.spawn_explosion(Vec2::ZERO, 1, &theme);

        let mut list = DrawList::new();
        field.draw_into(0.5, &theme, &mut list);
        let commands = list.commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].paint, theme.primary.into());
        assert_eq!(commands[1].paint, theme.secondary.into());
        assert!(commands.iter().all(|c| (c.opacity - 0.5).abs() < 1e-6));

        match commands[0].shape {
            Shape::Circle { radius, .. } => {
                assert!((radius - field.ambient()[0].size * 1.5).abs() < 1e-5)
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }
}
