//! Visual modes and the table that dispatches to them.
//!
//! Every mode is a [`ModeRenderer`] bound to one [`Mode`] variant. Modes
//! receive the tick's snapshot, theme, settings and elapsed time through a
//! [`ModeInput`] and append draw commands to the main layer. Only the matrix
//! rain keeps state between calls; the rest are pure functions of their
//! input.

mod geometry;
mod orbital;
pub mod overlay;
mod spectrum;
mod waves;

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    particles::Bounds, render::DrawList, AudioSnapshot, Result, Settings, Theme, VisualiserError,
};

pub use orbital::Emblem;
pub use spectrum::MatrixRain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Nebula,
    Dna,
    Blackhole,
    Terrain,
    Galaxy,
    #[serde(alias = "cube")]
    Hypercube,
    Fire,
    Wave3d,
    Tunnel,
    Fractal,
    Bars,
    Matrix,
    #[serde(alias = "logo")]
    Emblem,
}

impl Mode {
    /// Every mode, in the order the number shortcuts select them.
    pub const ALL: [Mode; 13] = [
        Mode::Nebula,
        Mode::Dna,
        Mode::Blackhole,
        Mode::Terrain,
        Mode::Galaxy,
        Mode::Hypercube,
        Mode::Fire,
        Mode::Wave3d,
        Mode::Tunnel,
        Mode::Fractal,
        Mode::Bars,
        Mode::Matrix,
        Mode::Emblem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Nebula => "nebula",
            Mode::Dna => "dna",
            Mode::Blackhole => "blackhole",
            Mode::Terrain => "terrain",
            Mode::Galaxy => "galaxy",
            Mode::Hypercube => "hypercube",
            Mode::Fire => "fire",
            Mode::Wave3d => "wave3d",
            Mode::Tunnel => "tunnel",
            Mode::Fractal => "fractal",
            Mode::Bars => "bars",
            Mode::Matrix => "matrix",
            Mode::Emblem => "emblem",
        }
    }

    /// Mode bound to the 1-based number shortcut `key`.
    pub fn from_shortcut(key: u8) -> Option<Mode> {
        if key == 0 || key > 9 {
            return None;
        }
        Self::ALL.get(usize::from(key) - 1).copied()
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Mode {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "cube" => return Ok(Mode::Hypercube),
            "logo" => return Ok(Mode::Emblem),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| VisualiserError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a mode may read during one tick.
#[derive(Debug, Clone, Copy)]
pub struct ModeInput<'a> {
    pub snapshot: &'a AudioSnapshot,
    pub theme: &'a Theme,
    pub settings: &'a Settings,
    /// Elapsed-time accumulator, advanced by `speed` every tick.
    pub time: f32,
    pub bounds: Bounds,
}

impl ModeInput<'_> {
    /// Fails on a surface without positive, finite size.
    pub fn ensure_drawable(&self) -> Result<()> {
        if self.bounds.is_drawable() {
            Ok(())
        } else {
            Err(VisualiserError::InvalidInput("surface has no drawable area"))
        }
    }

    /// Shadow blur adjusted by the bloom setting.
    pub fn glow(&self, blur: f32) -> f32 {
        blur * self.settings.glow_scale()
    }
}

pub trait ModeRenderer {
    fn mode(&self) -> Mode;

    fn render(&mut self, input: &ModeInput<'_>, out: &mut DrawList) -> Result<()>;
}

type DrawFn = fn(&ModeInput<'_>, &mut DrawList) -> Result<()>;

/// A stateless mode backed by a plain function.
#[derive(Clone, Copy)]
pub struct FnMode {
    mode: Mode,
    draw: DrawFn,
}

impl FnMode {
    pub const fn new(mode: Mode, draw: DrawFn) -> Self {
        Self { mode, draw }
    }
}

impl ModeRenderer for FnMode {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn render(&mut self, input: &ModeInput<'_>, out: &mut DrawList) -> Result<()> {
        (self.draw)(input, out)
    }
}

impl fmt::Debug for FnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMode").field("mode", &self.mode).finish()
    }
}

/// What happened when a mode was asked to draw.
#[derive(Debug)]
pub enum DispatchOutcome {
    Drawn,
    /// The renderer failed; whatever it appended was discarded.
    Failed(VisualiserError),
    /// No renderer is bound to the mode.
    Unbound,
}

impl DispatchOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, DispatchOutcome::Drawn)
    }
}

/// Fixed table from [`Mode`] to its renderer.
pub struct ModeDispatcher {
    table: Vec<Option<Box<dyn ModeRenderer>>>,
}

impl ModeDispatcher {
    /// A table with no renderers bound.
    pub fn empty() -> Self {
        Self {
            table: Mode::ALL.iter().map(|_| None).collect(),
        }
    }

    /// The built-in renderer for every mode. `seed` drives the matrix rain.
    pub fn new(seed: u64) -> Self {
        let mut dispatcher = Self::empty();
        let builtin = [
            FnMode::new(Mode::Nebula, orbital::nebula),
            FnMode::new(Mode::Dna, waves::dna),
            FnMode::new(Mode::Blackhole, orbital::blackhole),
            FnMode::new(Mode::Terrain, waves::terrain),
            FnMode::new(Mode::Galaxy, orbital::galaxy),
            FnMode::new(Mode::Hypercube, geometry::hypercube),
            FnMode::new(Mode::Fire, waves::fire),
            FnMode::new(Mode::Wave3d, waves::wave3d),
            FnMode::new(Mode::Tunnel, waves::tunnel),
            FnMode::new(Mode::Fractal, geometry::fractal),
            FnMode::new(Mode::Bars, spectrum::bars),
        ];
        for renderer in builtin {
            dispatcher.register(Box::new(renderer));
        }
        dispatcher.register(Box::new(MatrixRain::new(seed)));
        dispatcher.register(Box::new(Emblem::default()));
        dispatcher
    }

    /// Binds `renderer` to its mode, returning the one it replaces.
    pub fn register(&mut self, renderer: Box<dyn ModeRenderer>) -> Option<Box<dyn ModeRenderer>> {
        let slot = &mut self.table[renderer.mode().index()];
        slot.replace(renderer)
    }

    pub fn is_bound(&self, mode: Mode) -> bool {
        self.table[mode.index()].is_some()
    }

    /// Runs the renderer for `mode`. A failing renderer never leaves partial
    /// output behind.
    pub fn dispatch(&mut self, mode: Mode, input: &ModeInput<'_>, out: &mut DrawList) -> DispatchOutcome {
        let Some(renderer) = self.table[mode.index()].as_mut() else {
            return DispatchOutcome::Unbound;
        };

        let checkpoint = out.checkpoint();
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(input, out)))
            .unwrap_or_else(|payload| Err(VisualiserError::msg(panic_message(&*payload))));
        match rendered {
            Ok(()) => DispatchOutcome::Drawn,
            Err(err) => {
                out.rollback(checkpoint);
                tracing::warn!(%mode, %err, "mode skipped this tick");
                DispatchOutcome::Failed(err)
            }
        }
    }
}

impl Default for ModeDispatcher {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for ModeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<Mode> = Mode::ALL
            .into_iter()
            .filter(|mode| self.is_bound(*mode))
            .collect();
        f.debug_struct("ModeDispatcher").field("bound", &bound).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("renderer panicked: {detail}")
}

/// Deterministic stand-in for a random draw: maps `(index, salt)` onto
/// `[0, 1)`.
pub(crate) fn scatter(index: u32, salt: u32) -> f32 {
    let mut x = index.wrapping_mul(0x9E37_79B9) ^ salt.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 16;
    x = x.wrapping_mul(0x7FEB_352D);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846C_A68B);
    x ^= x >> 16;
    (x >> 8) as f32 / (1u32 << 24) as f32
}
