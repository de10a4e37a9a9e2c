//! Spectrum bars and the matrix rain.

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{Mode, ModeInput, ModeRenderer};
use crate::{
    render::{DrawList, Paint},
    Color, Result,
};

pub(super) fn bars(input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
    input.ensure_drawable()?;
    let ModeInput {
        snapshot,
        theme,
        settings,
        bounds,
        ..
    } = *input;
    const BARS: usize = 64;
    let bar_width = bounds.width / BARS as f32;
    let max_height = bounds.height * 0.8;

    for bar in 0..BARS {
        let level = snapshot.bin(bar * 4);
        let height = level * max_height * settings.sensitivity;
        let x = bar as f32 * bar_width;
        let top = bounds.height - height;
        let fill = Paint::linear(
            Vec2::new(x, top),
            Vec2::new(x, bounds.height),
            [
                (0.0, theme.primary),
                (0.5, theme.secondary),
                (1.0, theme.tertiary),
            ],
        );

        out.rect(
            Vec2::new(x + 1.0, top),
            Vec2::new(bar_width - 2.0, height),
            fill.clone(),
        )
        .glow(input.glow(15.0), theme.primary);

        if level > 0.7 {
            out.circle(Vec2::new(x + bar_width / 2.0, top - 10.0), 4.0, Color::WHITE);
        }

        // reflection below the baseline
        out.rect(
            Vec2::new(x + 1.0, bounds.height),
            Vec2::new(bar_width - 2.0, height * 0.3),
            fill,
        )
        .opacity(0.3);
    }
    Ok(())
}

const COLUMN_WIDTH: f32 = 20.0;
/// Upper bound on falling columns, whatever the surface width.
pub const MAX_COLUMNS: usize = 512;
const TRAIL_LEN: usize = 20;
const GLYPH_SIZE: f32 = 16.0;
const RESET_MARGIN: f32 = 400.0;
const KATAKANA_START: u32 = 0x30A0;
const KATAKANA_SPAN: u32 = 96;

#[derive(Debug, Clone)]
struct Column {
    head: f32,
    speed: f32,
    trail: [char; TRAIL_LEN],
}

/// Falling columns of katakana. Owns its per-column scroll state, which is
/// rebuilt whenever the surface width changes.
#[derive(Debug)]
pub struct MatrixRain {
    rng: StdRng,
    drops: Vec<Column>,
    width: f32,
}

impl MatrixRain {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            drops: Vec::new(),
            width: 0.0,
        }
    }

    pub fn columns(&self) -> usize {
        self.drops.len()
    }

    fn reseed(&mut self, width: f32) {
        let columns = ((width / COLUMN_WIDTH).floor() as usize).min(MAX_COLUMNS);
        let rng = &mut self.rng;
        self.drops = (0..columns)
            .map(|_| {
                let mut drop = Column {
                    head: rng.gen::<f32>() * -100.0,
                    speed: 2.0 + rng.gen::<f32>() * 5.0,
                    trail: [' '; TRAIL_LEN],
                };
                refill(rng, &mut drop.trail);
                drop
            })
            .collect();
        self.width = width;
    }
}

fn refill(rng: &mut StdRng, trail: &mut [char]) {
    for glyph in trail {
        let code = KATAKANA_START + rng.gen_range(0..KATAKANA_SPAN);
        *glyph = char::from_u32(code).unwrap_or('ア');
    }
}

impl ModeRenderer for MatrixRain {
    fn mode(&self) -> Mode {
        Mode::Matrix
    }

    fn render(&mut self, input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
        input.ensure_drawable()?;
        let ModeInput {
            snapshot,
            theme,
            settings,
            bounds,
            ..
        } = *input;

        if self.width != bounds.width {
            self.reseed(bounds.width);
        }

        for (column, drop) in self.drops.iter_mut().enumerate() {
            let level = snapshot.bin(column * 4);
            drop.head += drop.speed * (0.5 + level * settings.speed);
            if drop.head > bounds.height + RESET_MARGIN {
                drop.head = -RESET_MARGIN;
                refill(&mut self.rng, &mut drop.trail);
            }

            let x = column as f32 * COLUMN_WIDTH;
            for (offset, glyph) in drop.trail.iter().enumerate() {
                let y = drop.head - offset as f32 * COLUMN_WIDTH;
                if y > 0.0 && y < bounds.height {
                    let fade = 1.0 - offset as f32 / TRAIL_LEN as f32;
                    out.glyph(Vec2::new(x, y), *glyph, GLYPH_SIZE, theme.primary)
                        .opacity(fade * (0.5 + level * 0.5));
                }
            }

            if drop.head > 0.0 && drop.head < bounds.height {
                out.glyph(Vec2::new(x, drop.head), drop.trail[0], GLYPH_SIZE, Color::WHITE)
                    .glow(input.glow(10.0), theme.primary);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modes::tests::{input, loud_snapshot},
        particles::Bounds,
        render::Shape,
        AudioSnapshot, Settings, Theme,
    };

    #[test]
    fn bars_add_peaks_for_loud_bins() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        bars(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        // bins 0, 4, .., 76 are above 0.7
        let peaks = (0..64).filter(|bar| (255 - bar * 4) as f32 / 255.0 > 0.7).count();
        assert_eq!(peaks, 20);
        assert_eq!(list.len(), 64 * 2 + peaks);
    }

    #[test]
    fn silent_bars_are_flat() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut list = DrawList::new();
        bars(&input(&snapshot, &theme, &settings), &mut list).unwrap();

        assert_eq!(list.len(), 128);
        for command in list.commands() {
            match command.shape {
                Shape::Rect { size, .. } => assert_eq!(size.y, 0.0),
                ref other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn rain_falls_and_keeps_its_state() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut input = input(&snapshot, &theme, &settings);
        input.bounds = Bounds::new(200.0, 300.0);

        let mut rain = MatrixRain::new(3);
        let mut list = DrawList::new();
        rain.render(&input, &mut list).unwrap();
        assert_eq!(rain.columns(), 10);
        let heads: Vec<f32> = rain.drops.iter().map(|d| d.head).collect();

        list.clear();
        rain.render(&input, &mut list).unwrap();
        for (drop, before) in rain.drops.iter().zip(&heads) {
            assert!((drop.head - (before + drop.speed * 0.5)).abs() < 1e-4);
        }
        assert!(list
            .commands()
            .iter()
            .all(|c| matches!(c.shape, Shape::Glyph { glyph, .. } if ('\u{30A0}'..'\u{3100}').contains(&glyph))));
    }

    #[test]
    fn drops_wrap_back_above_the_surface() {
        let snapshot = AudioSnapshot::silent(256);
        let theme = Theme::default();
        let settings = Settings::default();
        let mut input = input(&snapshot, &theme, &settings);
        input.bounds = Bounds::new(40.0, 100.0);

        let mut rain = MatrixRain::new(1);
        let mut list = DrawList::new();
        rain.render(&input, &mut list).unwrap();
        rain.drops[0].head = 499.9;
        rain.drops[0].speed = 2.0;
        rain.render(&input, &mut list).unwrap();
        assert_eq!(rain.drops[0].head, -RESET_MARGIN);
    }

    #[test]
    fn resizing_rebuilds_the_columns() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut input = input(&snapshot, &theme, &settings);
        let mut rain = MatrixRain::new(9);
        let mut list = DrawList::new();

        rain.render(&input, &mut list).unwrap();
        assert_eq!(rain.columns(), 64);
        input.bounds = Bounds::new(100.0, 720.0);
        rain.render(&input, &mut list).unwrap();
        assert_eq!(rain.columns(), 5);
    }

    #[test]
    fn column_count_is_capped_on_huge_surfaces() {
        let snapshot = loud_snapshot();
        let theme = Theme::default();
        let settings = Settings::default();
        let mut input = input(&snapshot, &theme, &settings);
        input.bounds = Bounds::new(1.0e9, 720.0);
        let mut rain = MatrixRain::new(9);
        let mut list = DrawList::new();

        rain.render(&input, &mut list).unwrap();
        assert_eq!(rain.columns(), MAX_COLUMNS);
        assert!(list.len() <= MAX_COLUMNS * (TRAIL_LEN + 1));
    }
}
