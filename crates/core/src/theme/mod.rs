//! Colour palettes shared by every visual mode.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

/// 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(VisualiserError::Config(format!("`{hex}` is not a hex colour")));
        }

        let channel = |at: usize| {
            u8::from_str_radix(&digits[at..at + 2], 16)
                .map_err(|_| VisualiserError::Config(format!("`{hex}` is not a hex colour")))
        };

        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    /// Lenient parse that falls back to white, for colours typed by users.
    pub fn from_hex_or_white(hex: &str) -> Self {
        Self::from_hex(hex).unwrap_or(Self::WHITE)
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Component-wise blend, `t = 1` yields `self`, `t = 0` yields `other`.
    pub fn mix(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 * t + b as f32 * (1.0 - t)).round() as u8;
        Color::rgba(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
            lerp(self.a, other.a),
        )
    }

    /// Channels as linear `[0, 1]` floats, for GPU-facing buffers.
    pub fn to_unit_rgb(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = VisualiserError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// The four colours a visual mode may draw with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub tertiary: Color,
    pub background: Color,
}

impl Default for Theme {
    fn default() -> Self {
        ThemePreset::default().theme()
    }
}

/// Built-in palettes selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreset {
    #[default]
    Cyberpunk,
    Aurora,
    Sunset,
    Ocean,
    Royal,
    Fire,
    Matrix,
    Gold,
    Neon,
    Ice,
}

impl ThemePreset {
    pub const ALL: [ThemePreset; 10] = [
        ThemePreset::Cyberpunk,
        ThemePreset::Aurora,
        ThemePreset::Sunset,
        ThemePreset::Ocean,
        ThemePreset::Royal,
        ThemePreset::Fire,
        ThemePreset::Matrix,
        ThemePreset::Gold,
        ThemePreset::Neon,
        ThemePreset::Ice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ThemePreset::Cyberpunk => "cyberpunk",
            ThemePreset::Aurora => "aurora",
            ThemePreset::Sunset => "sunset",
            ThemePreset::Ocean => "ocean",
            ThemePreset::Royal => "royal",
            ThemePreset::Fire => "fire",
            ThemePreset::Matrix => "matrix",
            ThemePreset::Gold => "gold",
            ThemePreset::Neon => "neon",
            ThemePreset::Ice => "ice",
        }
    }

    pub fn theme(self) -> Theme {
        let [primary, secondary, tertiary, background] = match self {
            ThemePreset::Cyberpunk => [0xff00ff, 0x00ffff, 0xffff00, 0x0a0a15],
            ThemePreset::Aurora => [0x00ff87, 0x60efff, 0xa855f7, 0x0a1a1a],
            ThemePreset::Sunset => [0xff416c, 0xff4b2b, 0xffd700, 0x1a0a0a],
            ThemePreset::Ocean => [0x0077b6, 0x00b4d8, 0x90e0ef, 0x0a0a1a],
            ThemePreset::Royal => [0x7b2cbf, 0xc77dff, 0xe0aaff, 0x0f0a1a],
            ThemePreset::Fire => [0xff0000, 0xff7700, 0xffcc00, 0x1a0500],
            ThemePreset::Matrix => [0x00ff00, 0x00cc00, 0x009900, 0x000500],
            ThemePreset::Gold => [0xffd700, 0xf4a460, 0xdaa520, 0x1a1500],
            ThemePreset::Neon => [0xff1493, 0x00ff7f, 0xff6347, 0x0a0510],
            ThemePreset::Ice => [0xe0ffff, 0x87ceeb, 0x4169e1, 0x0a0a1a],
        }
        .map(packed);

        Theme {
            primary,
            secondary,
            tertiary,
            background,
        }
    }
}

impl FromStr for ThemePreset {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| VisualiserError::UnknownTheme(s.to_string()))
    }
}

impl fmt::Display for ThemePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn packed(rgb: u32) -> Color {
    Color::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}
