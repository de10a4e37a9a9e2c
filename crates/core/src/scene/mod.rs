//! Parameter state for the 3D point-cloud layer.
//!
//! The cloud is drawn by an external mesh renderer; this module only keeps
//! positions, colours, rotation and scale up to date from the tick's audio.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::{rngs::StdRng, Rng};

use crate::{AudioSnapshot, SceneConfig, Settings, Theme};

const MIN_RADIUS: f32 = 20.0;
const RADIUS_SPREAD: f32 = 20.0;
const REST_RADIUS: f32 = 20.0;
const REACH: f32 = 15.0;
/// Share of the gap to the target radius closed per tick.
const EASE: f32 = 0.05;
const SPIN_Y: f32 = 0.002;
const SPIN_X: f32 = 0.001;
const BASS_SCALE: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct PointCloud {
    positions: Vec<Vec3>,
    colors: Vec<[f32; 3]>,
    rotation: Vec3,
    scale: f32,
}

impl PointCloud {
    /// Spreads `config.point_count` points uniformly over directions on a
    /// shell between radius 20 and 40, each with a random colour.
    pub fn new(config: &SceneConfig, rng: &mut StdRng) -> Self {
        let mut positions = Vec::with_capacity(config.point_count);
        let mut colors = Vec::with_capacity(config.point_count);

        for _ in 0..config.point_count {
            let theta = rng.gen::<f32>() * TAU;
            let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
            let radius = MIN_RADIUS + rng.gen::<f32>() * RADIUS_SPREAD;
            positions.push(Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            ));
            colors.push([rng.gen(), rng.gen(), rng.gen()]);
        }

        Self {
            positions,
            colors,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn update(&mut self, snapshot: &AudioSnapshot, settings: &Settings, theme: &Theme, time: f32) {
        if settings.auto_rotate {
            self.rotation.y += SPIN_Y * settings.speed;
            self.rotation.x += SPIN_X * settings.speed;
        }
        self.scale = 1.0 + snapshot.bass * BASS_SCALE;

        let bins = snapshot.len().max(1);
        for (index, position) in self.positions.iter_mut().enumerate() {
            let current = position.length();
            if current > 0.0 {
                let target = REST_RADIUS + snapshot.bin(index % bins) * REACH * settings.sensitivity;
                *position *= 1.0 - EASE + EASE * target / current;
            }
        }

        let primary = theme.primary.to_unit_rgb();
        let secondary = theme.secondary.to_unit_rgb();
        for (index, color) in self.colors.iter_mut().enumerate() {
            let t = ((time * 0.01 + index as f32 * 3.0 * 0.01).sin() + 1.0) / 2.0;
            for channel in 0..3 {
                color[channel] = primary[channel] * t + secondary[channel] * (1.0 - t);
            }
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Linear RGB per point, parallel to [`PointCloud::positions`].
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    /// Euler angles in radians.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{Color, FeatureExtractor};

    fn cloud(points: usize) -> PointCloud {
        let config = SceneConfig { point_count: points };
        PointCloud::new(&config, &mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn points_start_on_the_shell() {
        let cloud = cloud(500);
        assert_eq!(cloud.len(), 500);
        assert!(cloud
            .positions()
            .iter()
            .all(|p| (MIN_RADIUS - 1e-3..=MIN_RADIUS + RADIUS_SPREAD + 1e-3).contains(&p.length())));
        assert!(cloud
            .colors()
            .iter()
            .flatten()
            .all(|c| (0.0..1.0).contains(c)));
    }

    #[test]
    fn silence_pulls_points_to_the_rest_radius() {
        let mut cloud = cloud(64);
        let snapshot = AudioSnapshot::silent(256);
        let settings = Settings::default();
        for _ in 0..400 {
            cloud.update(&snapshot, &settings, &Theme::default(), 0.0);
        }
        assert!(cloud
            .positions()
            .iter()
            .all(|p| (p.length() - REST_RADIUS).abs() < 0.05));
    }

    #[test]
    fn loud_bins_push_points_outward() {
        let mut cloud = cloud(4);
        let snapshot = FeatureExtractor::new(8)
            .unwrap()
            .extract(&[255; 8], &[128; 8], 1.0);
        let settings = Settings {
            sensitivity: 1.0,
            ..Settings::default()
        };
        for _ in 0..400 {
            cloud.update(&snapshot, &settings, &Theme::default(), 0.0);
        }
        assert!(cloud
            .positions()
            .iter()
            .all(|p| (p.length() - 35.0).abs() < 0.05));
        assert!((cloud.scale() - 1.3).abs() < 1e-6);
    }

    #[test]
    fn rotation_only_advances_when_enabled() {
        let mut cloud = cloud(1);
        let snapshot = AudioSnapshot::silent(256);
        let mut settings = Settings {
            speed: 2.0,
            ..Settings::default()
        };
        cloud.update(&snapshot, &settings, &Theme::default(), 0.0);
        assert!((cloud.rotation().y - 0.004).abs() < 1e-7);
        assert!((cloud.rotation().x - 0.002).abs() < 1e-7);

        settings.auto_rotate = false;
        let before = cloud.rotation();
        cloud.update(&snapshot, &settings, &Theme::default(), 0.0);
        assert_eq!(cloud.rotation(), before);
    }

    #[test]
    fn colours_blend_between_primary_and_secondary() {
        let mut cloud = cloud(1);
        let theme = Theme {
            primary: Color::rgb(255, 0, 0),
            secondary: Color::rgb(0, 0, 255),
            ..Theme::default()
        };
        // sin(0) = 0 puts the first point halfway
        cloud.update(&AudioSnapshot::silent(256), &Settings::default(), &theme, 0.0);
        let [r, g, b] = cloud.colors()[0];
        assert!((r - 0.5).abs() < 1e-6);
        assert_eq!(g, 0.0);
        assert!((b - 0.5).abs() < 1e-6);
    }
}
