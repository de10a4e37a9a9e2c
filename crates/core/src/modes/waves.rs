//! Line- and curve-based modes that sweep across the surface.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use super::{scatter, ModeInput};
use crate::{
    render::{DrawList, Paint},
    Color, Result,
};

pub(super) fn dna(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    const SEGMENTS: usize = 50;
    let center_y = bounds.height / 2.0;

    for segment in 0..SEGMENTS {
        let x = segment as f32 / SEGMENTS as f32 * bounds.width;
        let level = snapshot.bin(segment * 5);
        let phase = time * 0.05 * settings.speed + segment as f32 * 0.3;
        let amplitude = 80.0 + level * 100.0 * settings.sensitivity;
        let upper = Vec2::new(x, center_y + phase.sin() * amplitude);
        let lower = Vec2::new(x, center_y + (phase + PI).sin() * amplitude);
        let radius = 8.0 + level * 10.0;

        out.circle(upper, radius, theme.primary)
            .glow(input.glow(15.0), theme.primary);
        out.circle(lower, radius, theme.secondary)
            .glow(input.glow(15.0), theme.secondary);
        if segment % 3 == 0 {
            out.line(upper, lower, 3.0, theme.tertiary.with_alpha(0x80));
        }
    }
    Ok(())
}

pub(super) fn terrain(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    const ROWS: usize = 30;
    const COLS: usize = 50;
    let cell = Vec2::new(bounds.width / COLS as f32, bounds.height / ROWS as f32);
    let scroll = steps(time * 0.1 * settings.speed);

    for row in 0..ROWS {
        let points = (0..=COLS).map(|col| {
            let level = snapshot.bin_wrapped(col + row + scroll);
            let height = level * 100.0 * settings.sensitivity;
            Vec2::new(
                col as f32 * cell.x,
                row as f32 * cell.y - height + bounds.height * 0.3,
            )
        });
        out.path(points, false, 1.0, theme.primary)
            .opacity(0.3 + row as f32 / ROWS as f32 * 0.7);
    }

    let sun = Vec2::new(bounds.width * 0.8, 80.0);
    let radius = 60.0 + snapshot.bass * 30.0;
    let glow = Paint::radial(
        sun,
        radius,
        [(0.0, theme.tertiary), (1.0, Color::TRANSPARENT)],
    );
    out.circle(sun, radius, glow);
    Ok(())
}

pub(super) fn wave3d(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    const ROWS: usize = 25;
    const COLS: usize = 60;
    let cell_width = bounds.width / COLS as f32;
    let scroll = steps(time * 0.2 * settings.speed);

    // back to front so nearer rows paint over farther ones
    for depth in (0..ROWS).rev() {
        let fraction = depth as f32 / ROWS as f32;
        let perspective = 1.0 - fraction * 0.7;
        let points = (0..=COLS).map(|col| {
            let level = snapshot.bin_wrapped(col + depth * 2 + scroll);
            let x = col as f32 * cell_width * perspective + bounds.width * (1.0 - perspective) / 2.0;
            let wave = (col as f32 * 0.2 + time * 0.05 * settings.speed + depth as f32 * 0.5).sin() * 30.0;
            let height = level * 80.0 * settings.sensitivity;
            Vec2::new(x, bounds.height * 0.6 + depth as f32 * 15.0 - height + wave)
        });
        let color = if depth < ROWS / 2 {
            theme.primary
        } else {
            theme.secondary
        };
        out.path(points, false, 2.0, color).opacity(1.0 - fraction);
    }
    Ok(())
}

pub(super) fn tunnel(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    const RINGS: usize = 20;
    const SEGMENTS: usize = 60;
    let center = bounds.center();
    let travel = (time * 0.05 * settings.speed).rem_euclid(1.0);

    for ring in (0..RINGS).rev() {
        let progress = (ring as f32 + travel) / RINGS as f32;
        let radius = 20.0 + progress * 400.0;
        let level = snapshot.bin(ring * 12);
        let points = (0..=SEGMENTS).map(|segment| {
            let angle = segment as f32 / SEGMENTS as f32 * TAU;
            let distortion = level * 20.0 * (angle * 6.0 + time * 0.1).sin();
            center + Vec2::from_angle(angle) * (radius + distortion)
        });
        let color = if progress < 0.5 {
            theme.primary
        } else {
            theme.secondary
        };
        out.path(points, true, 2.0 + level * 3.0, color)
            .opacity(1.0 - progress);
    }

    let glow = Paint::radial(
        center,
        30.0,
        [(0.0, theme.tertiary), (1.0, Color::TRANSPARENT)],
    );
    out.circle(center, 30.0 + snapshot.bass * 20.0, glow);
    Ok(())
}

pub(super) fn fire(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    const FLAMES: usize = 100;
    let base = bounds.height;

    for flame in 0..FLAMES {
        let level = snapshot.bin(flame * 2);
        let x = flame as f32 / FLAMES as f32 * bounds.width;

        for layer in 0..3 {
            let height = (50.0 + level * 200.0 * settings.sensitivity) * (1.0 - layer as f32 * 0.3);
            let wobble = (time * 0.1 + flame as f32 * 0.5 + layer as f32).sin() * 20.0 * level;
            let tip = base - height;
            let from = Vec2::new(x, base);
            let to = Vec2::new(x, tip);
            let paint = match layer {
                0 => Paint::linear(
                    from,
                    to,
                    [
                        (0.0, theme.tertiary),
                        (0.3, theme.secondary),
                        (1.0, Color::TRANSPARENT),
                    ],
                ),
                1 => Paint::linear(
                    from,
                    to,
                    [
                        (0.0, theme.secondary.with_alpha(0x80)),
                        (1.0, Color::TRANSPARENT),
                    ],
                ),
                _ => Paint::linear(
                    from,
                    to,
                    [
                        (0.0, theme.primary.with_alpha(0x60)),
                        (1.0, Color::TRANSPARENT),
                    ],
                ),
            };
            out.curve(
                Vec2::new(x - 10.0 + wobble, base),
                Vec2::new(x + wobble, tip),
                Vec2::new(x + 10.0 + wobble, base),
                paint,
            );
        }
    }

    let salt = time.to_bits();
    for spark in 0..20u32 {
        let level = snapshot.bin(spark as usize * 12);
        if level <= 0.5 {
            continue;
        }
        let x = scatter(spark * 2, salt) * bounds.width;
        let y = bounds.height - 100.0 - scatter(spark * 2 + 1, salt) * 200.0 * level;
        out.circle(Vec2::new(x, y), 2.0 + level * 3.0, theme.tertiary)
            .glow(input.glow(10.0), theme.tertiary);
    }
    Ok(())
}

/// Whole steps taken by a non-negative scroll accumulator.
fn steps(value: f32) -> usize {
    if value.is_finite() && value > 0.0 {
        value.floor() as usize
    } else {
        0
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
    fn dna_draws_two_strands_and_rungs() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        dna(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        let rungs = (0..50).filter(|s| s % 3 == 0).count();
        assert_eq!(list.len(), 100 + rungs);
    }

    #[test]
    fn terrain_rows_fade_in_towards_the_viewer() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        terrain(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 31);
        let first = &list.commands()[0];
        let last = &list.commands()[29];
        assert!((first.opacity - 0.3).abs() < 1e-6);
        assert!(last.opacity > first.opacity);
        assert_eq!(list.path_points(first).len(), 51);
    }

    #[test]
    fn tunnel_rings_are_closed_and_fade_outward() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        tunnel(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 21);
        let outer = &list.commands()[0];
        let inner = &list.commands()[19];
        assert!(matches!(outer.shape, Shape::Path { closed: true, .. }));
        assert!(inner.opacity > outer.opacity);
        assert_eq!(list.path_points(inner).len(), 61);
    }

    #[test]
    fn wave3d_draws_back_to_front() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        wave3d(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 25);
        assert_eq!(list.commands()[0].paint, theme.secondary.into());
        assert_eq!(list.commands()[24].paint, theme.primary.into());
        assert!((list.commands()[24].opacity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fire_sparks_only_for_loud_bins() {
        let theme = Theme::default();
        let settings = Settings::default();

        let quiet = AudioSnapshot::silent(256);
        let mut list = DrawList::new();
        fire(&input(&quiet, &theme, &settings), &mut list).unwrap();
        assert_eq!(list.len(), 300);

        let loud = loud_snapshot();
        let mut list = DrawList::new();
        fire(&input(&loud, &theme, &settings), &mut list).unwrap();
        // bins 0, 12, .., 120 are above half scale
        assert_eq!(list.len(), 300 + 11);
    }

    #[test]
    fn scroll_steps_ignore_bad_input() {
        assert_eq!(steps(3.7), 3);
        assert_eq!(steps(-1.0), 0);
        assert_eq!(steps(f32::NAN), 0);
    }
}
