//! Surface-agnostic draw instructions.
//!
//! Modes, overlays and the particle field never draw directly; they append
//! [`DrawCommand`]s to a [`DrawList`] that a [`Surface`] later consumes.
//! Path vertices live in one arena per list so steady-state frames reuse the
//! same allocations.

use std::{ops::Range, sync::Arc};

use glam::Vec2;
use smallvec::SmallVec;

use crate::{Color, Frame, Result};

/// Colour at a relative position along a gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

pub type Stops = SmallVec<[ColorStop; 4]>;

/// Builds a stop list from `(offset, colour)` pairs.
pub fn stops<const N: usize>(pairs: [(f32, Color); N]) -> Stops {
    pairs
        .into_iter()
        .map(|(offset, color)| ColorStop { offset, color })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear { from: Vec2, to: Vec2, stops: Stops },
    Radial { center: Vec2, radius: f32, stops: Stops },
}

impl From<Color> for Paint {
    fn from(value: Color) -> Self {
        Paint::Solid(value)
    }
}

impl Paint {
    pub fn linear<const N: usize>(from: Vec2, to: Vec2, pairs: [(f32, Color); N]) -> Paint {
        Paint::Linear {
            from,
            to,
            stops: stops(pairs),
        }
    }

    pub fn radial<const N: usize>(center: Vec2, radius: f32, pairs: [(f32, Color); N]) -> Paint {
        Paint::Radial {
            center,
            radius,
            stops: stops(pairs),
        }
    }

    fn mirrored(&self, width: f32) -> Paint {
        match self {
            Paint::Solid(color) => Paint::Solid(*color),
            Paint::Linear { from, to, stops } => Paint::Linear {
                from: mirror_point(*from, width),
                to: mirror_point(*to, width),
                stops: stops.clone(),
            },
            Paint::Radial {
                center,
                radius,
                stops,
            } => Paint::Radial {
                center: mirror_point(*center, width),
                radius: *radius,
                stops: stops.clone(),
            },
        }
    }
}

/// Soft shadow drawn around a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub blur: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        center: Vec2,
        radius: f32,
    },
    Rect {
        origin: Vec2,
        size: Vec2,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
    },
    /// Stroked polyline; vertices are stored in the owning list's arena.
    Path {
        points: Range<usize>,
        closed: bool,
        width: f32,
    },
    /// Filled quadratic curve from `start` through `control` to `end`.
    Curve {
        start: Vec2,
        control: Vec2,
        end: Vec2,
    },
    Text {
        anchor: Vec2,
        content: Arc<str>,
        size: f32,
        align: TextAlign,
    },
    Glyph {
        anchor: Vec2,
        glyph: char,
        size: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub shape: Shape,
    pub paint: Paint,
    pub opacity: f32,
    pub glow: Option<Glow>,
}

impl DrawCommand {
    pub fn opacity(&mut self, opacity: f32) -> &mut Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn glow(&mut self, blur: f32, color: Color) -> &mut Self {
        self.glow = Some(Glow { blur, color });
        self
    }
}

/// Position in a [`DrawList`] that can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    commands: usize,
    points: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    points: Vec<Vec2>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the list but keeps its capacity.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Vertices of a [`Shape::Path`]; empty for any other shape.
    pub fn path_points(&self, command: &DrawCommand) -> &[Vec2] {
        match &command.shape {
            Shape::Path { points, .. } => self.points.get(points.clone()).unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            commands: self.commands.len(),
            points: self.points.len(),
        }
    }

    /// Drops everything recorded after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.commands.truncate(checkpoint.commands);
        self.points.truncate(checkpoint.points);
    }

    pub fn push(&mut self, shape: Shape, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.commands.push(DrawCommand {
            shape,
            paint: paint.into(),
            opacity: 1.0,
            glow: None,
        });
        let last = self.commands.len() - 1;
        &mut self.commands[last]
    }

    pub fn circle(&mut self, center: Vec2, radius: f32, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.push(
            Shape::Circle {
                center,
                radius: radius.max(0.0),
            },
            paint,
        )
    }

    pub fn rect(&mut self, origin: Vec2, size: Vec2, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.push(Shape::Rect { origin, size }, paint)
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, width: f32, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.push(Shape::Line { from, to, width }, paint)
    }

    pub fn path(
        &mut self,
        points: impl IntoIterator<Item = Vec2>,
        closed: bool,
        width: f32,
        paint: impl Into<Paint>,
    ) -> &mut DrawCommand {
        let start = self.points.len();
        self.points.extend(points);
        let end = self.points.len();
        self.push(
            Shape::Path {
                points: start..end,
                closed,
                width,
            },
            paint,
        )
    }

    pub fn curve(&mut self, start: Vec2, control: Vec2, end: Vec2, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.push(
            Shape::Curve {
                start,
                control,
                end,
            },
            paint,
        )
    }

    pub fn text(
        &mut self,
        anchor: Vec2,
        content: Arc<str>,
        size: f32,
        align: TextAlign,
        paint: impl Into<Paint>,
    ) -> &mut DrawCommand {
        self.push(
            Shape::Text {
                anchor,
                content,
                size,
                align,
            },
            paint,
        )
    }

    pub fn glyph(&mut self, anchor: Vec2, glyph: char, size: f32, paint: impl Into<Paint>) -> &mut DrawCommand {
        self.push(
            Shape::Glyph {
                anchor,
                glyph,
                size,
            },
            paint,
        )
    }

    /// Overlays a horizontally flipped copy of everything recorded so far,
    /// making the list symmetric about `x = width / 2`.
    pub fn mirror_horizontal(&mut self, width: f32) {
        let original = self.commands.len();
        self.commands.reserve(original);
        for index in 0..original {
            let command = &self.commands[index];
            let shape = match &command.shape {
                Shape::Circle { center, radius } => Shape::Circle {
                    center: mirror_point(*center, width),
                    radius: *radius,
                },
                Shape::Rect { origin, size } => Shape::Rect {
                    origin: Vec2::new(width - origin.x - size.x, origin.y),
                    size: *size,
                },
                Shape::Line { from, to, width: stroke } => Shape::Line {
                    from: mirror_point(*from, width),
                    to: mirror_point(*to, width),
                    width: *stroke,
                },
                Shape::Path {
                    points,
                    closed,
                    width: stroke,
                } => {
                    let start = self.points.len();
                    for at in points.clone() {
                        let flipped = mirror_point(self.points[at], width);
                        self.points.push(flipped);
                    }
                    Shape::Path {
                        points: start..self.points.len(),
                        closed: *closed,
                        width: *stroke,
                    }
                }
                Shape::Curve {
                    start,
                    control,
                    end,
                } => Shape::Curve {
                    start: mirror_point(*start, width),
                    control: mirror_point(*control, width),
                    end: mirror_point(*end, width),
                },
                Shape::Text {
                    anchor,
                    content,
                    size,
                    align,
                } => Shape::Text {
                    anchor: mirror_point(*anchor, width),
                    content: content.clone(),
                    size: *size,
                    align: match align {
                        TextAlign::Left => TextAlign::Right,
                        TextAlign::Right => TextAlign::Left,
                        TextAlign::Center => TextAlign::Center,
                    },
                },
                Shape::Glyph {
                    anchor,
                    glyph,
                    size,
                } => Shape::Glyph {
                    anchor: mirror_point(*anchor, width),
                    glyph: *glyph,
                    size: *size,
                },
            };
            let mirrored = DrawCommand {
                shape,
                paint: command.paint.mirrored(width),
                opacity: command.opacity,
                glow: command.glow,
            };
            self.commands.push(mirrored);
        }
    }
}

fn mirror_point(point: Vec2, width: f32) -> Vec2 {
    Vec2::new(width - point.x, point.y)
}

/// Drawing surfaces the composed frame is presented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Full-window canvas for ambient and explosion particles.
    Background,
    /// The active mode and the watermark.
    Main,
    Waveform,
    Spectrum,
}

/// Drawing surface collaborator. Implementations translate draw lists into
/// real drawing calls; the core never draws on its own.
pub trait Surface {
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// Surface that only tallies what it was given; useful for headless runs.
#[derive(Debug, Default, Clone)]
pub struct CountingSurface {
    pub frames: u64,
    pub commands: u64,
    pub last_commands: usize,
}

impl Surface for CountingSurface {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let count = frame.command_count();
        self.frames += 1;
        self.commands += count as u64;
        self.last_commands = count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_opacity_and_glow() {
        let mut list = DrawList::new();
        list.circle(Vec2::new(1.0, 2.0), 3.0, Color::WHITE)
            .opacity(2.0)
            .glow(10.0, Color::BLACK);

        let command = &list.commands()[0];
        assert_eq!(command.opacity, 1.0);
        assert_eq!(command.glow.map(|g| g.blur), Some(10.0));
    }

    #[test]
    fn path_points_live_in_the_arena() {
        let mut list = DrawList::new();
        list.path([Vec2::ZERO, Vec2::ONE], false, 2.0, Color::WHITE);
        list.path([Vec2::X, Vec2::Y, Vec2::ONE], true, 2.0, Color::WHITE);

        assert_eq!(list.path_points(&list.commands()[0]), &[Vec2::ZERO, Vec2::ONE]);
        assert_eq!(list.path_points(&list.commands()[1]).len(), 3);
    }

    #[test]
    fn rollback_discards_partial_output() {
        let mut list = DrawList::new();
        list.circle(Vec2::ZERO, 1.0, Color::WHITE);
        let mark = list.checkpoint();
        list.path([Vec2::ZERO, Vec2::ONE], false, 1.0, Color::WHITE);
        list.line(Vec2::ZERO, Vec2::ONE, 1.0, Color::WHITE);

        list.rollback(mark);
        assert_eq!(list.len(), 1);
        assert_eq!(list.checkpoint(), mark);
    }

    #[test]
    fn mirror_makes_the_list_symmetric() {
        let mut list = DrawList::new();
        list.circle(Vec2::new(10.0, 5.0), 2.0, Color::WHITE);
        list.rect(Vec2::new(0.0, 0.0), Vec2::new(20.0, 4.0), Color::WHITE);
        list.path([Vec2::new(1.0, 1.0), Vec2::new(3.0, 2.0)], false, 1.0, Color::WHITE);
        list.mirror_horizontal(100.0);

        assert_eq!(list.len(), 6);
        match &list.commands()[3].shape {
            Shape::Circle { center, .. } => assert_eq!(*center, Vec2::new(90.0, 5.0)),
            other => panic!("unexpected {other:?}"),
        }
        match &list.commands()[4].shape {
            Shape::Rect { origin, .. } => assert_eq!(*origin, Vec2::new(80.0, 0.0)),
            other => panic!("unexpected {other:?}"),
        }
        let flipped = list.path_points(&list.commands()[5]);
        assert_eq!(flipped, &[Vec2::new(99.0, 1.0), Vec2::new(97.0, 2.0)]);
    }

    #[test]
    fn gradients_mirror_their_geometry() {
        let mut list = DrawList::new();
        let paint = Paint::Linear {
            from: Vec2::new(0.0, 0.0),
            to: Vec2::new(10.0, 0.0),
            stops: stops([(0.0, Color::WHITE), (1.0, Color::BLACK)]),
        };
        list.line(Vec2::ZERO, Vec2::new(10.0, 0.0), 1.0, paint);
        list.mirror_horizontal(10.0);

        match &list.commands()[1].paint {
            Paint::Linear { from, to, stops } => {
                assert_eq!(*from, Vec2::new(10.0, 0.0));
                assert_eq!(*to, Vec2::new(0.0, 0.0));
                assert_eq!(stops.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
