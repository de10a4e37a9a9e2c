//! Projected and recursive figures.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Vec2, Vec3};

use super::ModeInput;
use crate::{
    render::{DrawList, Paint},
    Result, Theme,
};

const TESSERACT_VERTICES: usize = 16;
const FRACTAL_DEPTH: u32 = 8;
const FRACTAL_ARMS: usize = 6;
const MIN_BRANCH: f32 = 5.0;

/// Edges of the 4-cube: vertex pairs that differ in exactly one bit.
fn tesseract_edges() -> impl Iterator<Item = (usize, usize)> {
    (0..TESSERACT_VERTICES).flat_map(|from| {
        [1, 2, 4, 8]
            .into_iter()
            .filter(move |bit| from & bit == 0)
            .map(move |bit| (from, from | bit))
    })
}

/// Rotates the tesseract in the x-w plane, projects to 3D, spins about y and
/// projects to the screen. `z` is kept for depth cues.
fn project_tesseract(time: f32, speed: f32, center: Vec2, size: f32) -> [Vec3; TESSERACT_VERTICES] {
    let (sin_w, cos_w) = (time * 0.02 * speed).sin_cos();
    let (sin_t, cos_t) = (time * 0.01).sin_cos();
    let mut projected = [Vec3::ZERO; TESSERACT_VERTICES];

    for (index, slot) in projected.iter_mut().enumerate() {
        let corner = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
        let (x, y, z, w) = (corner(1), corner(2), corner(4), corner(8));

        let xw = x * cos_w - w * sin_w;
        let ww = x * sin_w + w * cos_w;
        let into_3d = 2.0 / (3.0 - ww);
        let solid = Vec3::new(xw, y, z) * into_3d;

        let xr = solid.x * cos_t - solid.z * sin_t;
        let zr = solid.x * sin_t + solid.z * cos_t;
        let onto_screen = 200.0 / (3.0 - zr) * (size / 100.0);
        *slot = Vec3::new(
            center.x + xr * onto_screen,
            center.y + solid.y * onto_screen,
            zr,
        );
    }
    projected
}

pub(super) fn hypercube(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    let size = 100.0 + snapshot.bass * 50.0;
    let vertices = project_tesseract(time, settings.speed, bounds.center(), size);

    for (edge, (from, to)) in tesseract_edges().enumerate() {
        let level = snapshot.bin(edge * 8);
        let start = vertices[from].truncate();
        let end = vertices[to].truncate();
        out.line(
            start,
            end,
            2.0,
            Paint::linear(start, end, [(0.0, theme.primary), (1.0, theme.secondary)]),
        )
        .opacity(0.5 + level * 0.5)
        .glow(input.glow(10.0 + level * 20.0), theme.primary);
    }

    for (index, vertex) in vertices.iter().enumerate() {
        let level = snapshot.bin(index * 16);
        out.circle(vertex.truncate(), 5.0 + level * 10.0, theme.tertiary);
    }
    Ok(())
}

pub(super) fn fractal(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        time,
        bounds,
    } = *input;
    let center = bounds.center();
    let length = 100.0 + snapshot.bass * 50.0;
    let rotation = time * 0.01 * settings.speed;

    // per-depth shape, so the recursion does not re-read the spectrum
    let mut levels = [0.0; FRACTAL_DEPTH as usize + 1];
    for (depth, level) in levels.iter_mut().enumerate() {
        *level = snapshot.bin(depth * 30);
    }

    for arm in 0..FRACTAL_ARMS {
        let angle = arm as f32 / FRACTAL_ARMS as f32 * TAU + rotation - FRAC_PI_2;
        branch(out, theme, &levels, center, length, angle, FRACTAL_DEPTH);
    }
    Ok(())
}

fn branch(
    out: &mut DrawList,
    theme: &Theme,
    levels: &[f32],
    from: Vec2,
    length: f32,
    angle: f32,
    depth: u32,
) {
    if depth == 0 || length < MIN_BRANCH {
        return;
    }
    let level = levels[depth as usize];
    let to = from + Vec2::from_angle(angle) * length;
    let color = [theme.primary, theme.secondary, theme.tertiary][depth as usize % 3];
    out.line(from, to, depth as f32 * 0.5, color)
        .opacity(0.5 + level * 0.5);

    let spread = 0.5 + level * 0.3;
    let shrink = 0.7 + level * 0.1;
    branch(out, theme, levels, to, length * shrink, angle - spread, depth - 1);
    branch(out, theme, levels, to, length * shrink, angle + spread, depth - 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modes::tests::input,
        render::Shape,
        AudioSnapshot, Settings,
    };

    #[test]
    fn tesseract_has_thirty_two_edges() {
        let edges: Vec<_> = tesseract_edges().collect();
        assert_eq!(edges.len(), 32);
        assert_eq!(&edges[..4], &[(0, 1), (0, 2), (0, 4), (0, 8)]);
        assert_eq!(edges[31], (14, 15));
        assert!(edges
            .iter()
            .all(|(a, b)| (a ^ b).count_ones() == 1 && a < b));
    }

    #[test]
    fn hypercube_is_centred_at_rest() {
        let vertices = project_tesseract(0.0, 1.0, Vec2::new(500.0, 300.0), 100.0);
        let mean = vertices.iter().map(|v| v.truncate()).sum::<Vec2>() / 16.0;
        assert!((mean - Vec2::new(500.0, 300.0)).length() < 1e-3);
    }

    #[test]
    fn hypercube_draws_edges_then_vertices() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        hypercube(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 32 + 16);
        assert!(matches!(list.commands()[0].shape, Shape::Line { .. }));
        assert!(matches!(list.commands()[47].shape, Shape::Circle { .. }));
    }

    #[test]
    fn silent_fractal_is_a_full_binary_tree_per_arm() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        fractal(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        // 100 * 0.7^7 is still above the minimum branch length
        let per_arm = (1 << FRACTAL_DEPTH) - 1;
        assert_eq!(list.len(), FRACTAL_ARMS * per_arm);
    }
}
