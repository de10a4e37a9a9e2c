//! Always-on overlays drawn after the active mode.

use std::sync::Arc;

use glam::Vec2;

use crate::{
    particles::Bounds,
    render::{DrawList, Paint, TextAlign},
    AudioSnapshot, Color, Settings, Theme, WAVEFORM_CENTER,
};

const WATERMARK_MARGIN: f32 = 15.0;
const WATERMARK_SIZE: f32 = 12.0;
const WATERMARK_ALPHA: u8 = 0x40;
const SPECTRUM_BARS: usize = 32;
const SPECTRUM_STRIDE: usize = 8;
/// Translucent black laid over the strip surfaces every tick so old
/// strokes fade out instead of vanishing.
const STRIP_FADE: Color = Color::rgba(0, 0, 0, 77);

/// Faint label in the bottom-right corner of the main surface.
pub fn watermark(text: &Arc<str>, theme: &Theme, bounds: Bounds, out: &mut DrawList) {
    if !bounds.is_drawable() || text.is_empty() {
        return;
    }
    out.text(
        Vec2::new(bounds.width - WATERMARK_MARGIN, bounds.height - WATERMARK_MARGIN),
        text.clone(),
        WATERMARK_SIZE,
        TextAlign::Right,
        theme.primary.with_alpha(WATERMARK_ALPHA),
    );
}

/// Oscilloscope line over the waveform, centred vertically at silence.
pub fn waveform_strip(
    snapshot: &AudioSnapshot,
    theme: &Theme,
    settings: &Settings,
    bounds: Bounds,
    out: &mut DrawList,
) {
    if !bounds.is_drawable() {
        return;
    }
    out.rect(Vec2::ZERO, Vec2::new(bounds.width, bounds.height), STRIP_FADE);
    if snapshot.waveform.is_empty() {
        return;
    }

    let step = bounds.width / snapshot.waveform.len() as f32;
    let points = snapshot.waveform.iter().enumerate().map(|(index, &value)| {
        let level = value as f32 / WAVEFORM_CENTER as f32;
        Vec2::new(index as f32 * step, level * bounds.height / 2.0)
    });
    out.path(points, false, 2.0, theme.secondary)
        .glow(10.0 * settings.glow_scale(), theme.secondary);
}

/// Thirty-two bars sampled from every eighth bin.
pub fn mini_spectrum(
    snapshot: &AudioSnapshot,
    theme: &Theme,
    settings: &Settings,
    bounds: Bounds,
    out: &mut DrawList,
) {
    if !bounds.is_drawable() {
        return;
    }
    out.rect(Vec2::ZERO, Vec2::new(bounds.width, bounds.height), STRIP_FADE);

    let bar_width = bounds.width / SPECTRUM_BARS as f32;
    for bar in 0..SPECTRUM_BARS {
        let level = snapshot.bin(bar * SPECTRUM_STRIDE);
        let height = level * bounds.height * settings.sensitivity;
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
}
