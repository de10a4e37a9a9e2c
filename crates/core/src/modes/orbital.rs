//! Modes built around bodies circling the surface centre.

use std::{
    f32::consts::{PI, TAU},
    sync::Arc,
};

use glam::Vec2;

use super::{scatter, Mode, ModeInput, ModeRenderer};
use crate::{
    render::{DrawList, Paint, TextAlign},
    Color, Result,
};

pub(super) fn nebula(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    let center = bounds.center();

    for cloud in 0..5 {
        let angle = (time * 0.01 + cloud as f32 * PI * 0.4) * settings.speed;
        let orbit = 100.0 + snapshot.bass * 150.0 + cloud as f32 * 30.0;
        let at = center + Vec2::new(angle.cos() * orbit * 0.5, angle.sin() * orbit * 0.3);
        let extent = 150.0 + snapshot.treble * 100.0;
        let paint = Paint::radial(
            at,
            extent,
            [
                (0.0, theme.primary.with_alpha(0x80)),
                (0.5, theme.secondary.with_alpha(0x40)),
                (1.0, Color::TRANSPARENT),
            ],
        );
        out.circle(at, extent, paint);
    }

    for star in 0..64 {
        let level = snapshot.bin(star * 4);
        let angle = star as f32 / 64.0 * TAU + time * 0.005;
        let distance = 50.0 + level * 200.0 * settings.sensitivity;
        let color = if level > 0.5 {
            theme.tertiary
        } else {
            theme.secondary
        };
        out.circle(center + Vec2::from_angle(angle) * distance, 2.0 + level * 5.0, color)
            .glow(input.glow(20.0), theme.primary);
    }
    Ok(())
}

pub(super) fn blackhole(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    let center = bounds.center();

    // accretion disk, flattened for perspective
    for ring in 0..20usize {
        let radius = 50.0 + ring as f32 * 15.0 + snapshot.bass * 30.0;
        let count = 60 + ring * 5;
        let color = match ring {
            0..=4 => theme.tertiary,
            5..=9 => theme.secondary,
            _ => theme.primary,
        };
        for index in 0..count {
            let level = snapshot.bin_wrapped(index + ring * 10);
            let angle = index as f32 / count as f32 * TAU
                + time * 0.02 * (1.0 + ring as f32 * 0.1) * settings.speed;
            let wobble = (angle * 3.0 + time * 0.1).sin() * 10.0 * level;
            let reach = radius + wobble;
            let at = center + Vec2::new(angle.cos() * reach, angle.sin() * reach * 0.3);
            out.circle(at, 2.0 + level * 4.0, color)
                .opacity(0.3 + level * 0.7);
        }
    }

    let horizon = Paint::radial(
        center,
        60.0,
        [
            (0.0, Color::BLACK),
            (0.7, Color::BLACK),
            (1.0, theme.primary.with_alpha(0x50)),
        ],
    );
    out.circle(center, 50.0 + snapshot.bass * 20.0, horizon);
    Ok(())
}

pub(super) fn galaxy(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    let center = bounds.center();
    const ARMS: usize = 4;
    const STARS_PER_ARM: usize = 150;
    let salt = time.to_bits();

    for arm in 0..ARMS {
        let arm_angle = arm as f32 / ARMS as f32 * TAU;
        for star in 0..STARS_PER_ARM {
            let index = arm * STARS_PER_ARM + star;
            let level = snapshot.bin_wrapped(index);
            let along = star as f32 / STARS_PER_ARM as f32;
            let distance = along * 200.0 + level * 50.0;
            let angle = arm_angle + along * TAU + time * 0.01 * settings.speed;
            let jitter = (scatter(index as u32, salt) - 0.5) * 30.0;
            let at = center
                + Vec2::new(
                    angle.cos() * distance + jitter,
                    angle.sin() * distance * 0.5 + jitter * 0.5,
                );
            let color = if along < 0.3 {
                theme.tertiary
            } else if along < 0.6 {
                theme.secondary
            } else {
                theme.primary
            };
            out.circle(at, 1.0 + level * 4.0, color)
                .opacity(0.5 + level * 0.5);
        }
    }

    let core = Paint::radial(
        center,
        50.0,
        [
            (0.0, theme.tertiary),
            (0.5, theme.primary.with_alpha(0x50)),
            (1.0, Color::TRANSPARENT),
        ],
    );
    out.circle(center, 50.0 + snapshot.bass * 30.0, core);
    Ok(())
}

/// Title card: a pulsing title ringed by orbiting particles above a strip of
/// spectrum bars.
#[derive(Debug, Clone)]
pub struct Emblem {
    title: Arc<str>,
    subtitle: Arc<str>,
}

impl Emblem {
    pub fn new(title: impl Into<Arc<str>>, subtitle: impl Into<Arc<str>>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }
}

impl Default for Emblem {
    fn default() -> Self {
        Self::new("PULSE", "AUDIO VISUALISER")
    }
}

impl ModeRenderer for Emblem {
    fn mode(&self) -> Mode {
        Mode::Emblem
    }

    fn render(&mut self, input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
        input.ensure_drawable()?;
        let ModeInput {
            snapshot,
            theme,
            settings,
            time,
            bounds,
        } = *input;
        let center = bounds.center();
        let bass = snapshot.bass;

        let backdrop = Paint::radial(
            center,
            300.0 + bass * 100.0,
            [
                (0.0, theme.primary.with_alpha(0x30)),
                (0.5, theme.secondary.with_alpha(0x15)),
                (1.0, Color::TRANSPARENT),
            ],
        );
        out.rect(Vec2::ZERO, Vec2::new(bounds.width, bounds.height), backdrop);

        let palette = [theme.primary, theme.secondary, theme.tertiary];
        for index in 0..100usize {
            let level = snapshot.bin(index * 2);
            let angle = index as f32 / 100.0 * TAU + time * 0.02 * settings.speed;
            let orbit = 200.0 + level * 150.0 + (time * 0.05 + index as f32).sin() * 50.0;
            let at = center + Vec2::new(angle.cos() * orbit, angle.sin() * orbit * 0.6);
            out.circle(at, 2.0 + level * 6.0, palette[index % 3])
                .glow(input.glow(15.0), theme.primary);
        }

        let scale = 1.0 + bass * 0.15;
        let title_anchor = center - Vec2::new(0.0, 30.0 + 20.0 * scale);
        let lettering = Paint::linear(
            title_anchor - Vec2::new(100.0, 30.0) * scale,
            title_anchor + Vec2::new(100.0, 30.0) * scale,
            [
                (0.0, theme.primary),
                (0.5, theme.secondary),
                (1.0, theme.tertiary),
            ],
        );
        out.text(
            title_anchor,
            self.title.clone(),
            (60.0 + bass * 20.0) * scale,
            TextAlign::Center,
            lettering,
        )
        .glow(input.glow(30.0 + snapshot.treble * 50.0), theme.primary);

        out.text(
            center + Vec2::new(0.0, 130.0),
            self.subtitle.clone(),
            16.0,
            TextAlign::Center,
            theme.secondary,
        );

        let bar_width = bounds.width / 64.0;
        for bar in 0..64usize {
            let level = snapshot.bin(bar * 4);
            let height = level * 80.0 * settings.sensitivity;
            let top = bounds.height - height;
            let paint = Paint::linear(
                Vec2::new(0.0, bounds.height),
                Vec2::new(0.0, top),
                [(0.0, theme.primary), (1.0, theme.secondary)],
            );
            out.rect(
                Vec2::new(bar as f32 * bar_width + 1.0, top),
                Vec2::new(bar_width - 2.0, height),
                paint,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modes::tests::{input, loud_snapshot},
        render::Shape,
        AudioSnapshot, Settings, Theme,
    };

    #[test]
    fn nebula_draws_clouds_then_stars() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        nebula(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 5 + 64);
        assert!(matches!(list.commands()[0].paint, Paint::Radial { .. }));
        // the first bins are the loudest
        assert_eq!(list.commands()[5].paint, theme.tertiary.into());
        assert_eq!(list.commands()[5].glow.map(|g| g.blur), Some(20.0));
    }

    #[test]
    fn blackhole_ring_counts() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        blackhole(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        let disk: usize = (0..20).map(|ring| 60 + ring * 5).sum();
        assert_eq!(list.len(), disk + 1);
        assert!(list.commands()[..disk]
            .iter()
            .all(|c| (c.opacity - 0.3).abs() < 1e-6));
    }

    #[test]
    fn galaxy_is_deterministic_for_a_given_time() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let input = input(&snapshot, &theme, &settings);

        let mut first = DrawList::new();
        let mut second = DrawList::new();
        galaxy(&input, &mut first).unwrap();
        galaxy(&input, &mut second).unwrap();
        assert_eq!(first.commands(), second.commands());
        assert_eq!(first.len(), 4 * 150 + 1);
    }

    #[test]
    fn emblem_uses_its_title() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut emblem = Emblem::new("HELLO", "WORLD");
        let mut list = DrawList::new();
        emblem
            .render(&input(&snapshot, &theme, &settings), &mut list)
            .unwrap();

        let texts: Vec<&str> = list
            .commands()
            .iter()
            .filter_map(|c| match &c.shape {
                Shape::Text { content, .. } => Some(&**content),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["HELLO", "WORLD"]);
        assert_eq!(list.len(), 1 + 100 + 2 + 64);
    }
}
