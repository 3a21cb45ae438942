use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod builder;
pub mod geometry;
pub mod serialization;

pub use builder::StrokeBuilder;
pub use geometry::DrawingRect;
pub use serialization::{read_drawing_jsonl, write_drawing_jsonl};

/// Width multiplier applied at full pressure.
pub const PRESSURE_WIDTH_GAIN: f32 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrokeId(Uuid);

impl StrokeId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Straight-alpha 8-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub position: (f64, f64),
    pub pressure: f32,
    pub azimuth: Option<f32>,
    pub altitude: Option<f32>,
    pub timestamp: f64,
    pub width: f32,
}

impl Sample {
    /// Captures a sample, clamping pressure into `[0, 1]` and deriving the width
    /// from `base_width`. Non-finite angles are recorded as absent.
    pub fn capture(
        position: (f64, f64),
        pressure: f32,
        azimuth: Option<f32>,
        altitude: Option<f32>,
        timestamp: f64,
        base_width: f32,
    ) -> Self {
        let pressure = if pressure.is_finite() {
            pressure.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            position,
            pressure,
            azimuth: azimuth.filter(|angle| angle.is_finite()),
            altitude: altitude.filter(|angle| angle.is_finite()),
            timestamp,
            width: pressure_width(base_width, pressure),
        }
    }

    pub fn x(&self) -> f64 {
        self.position.0
    }

    pub fn y(&self) -> f64 {
        self.position.1
    }
}

pub fn pressure_width(base_width: f32, pressure: f32) -> f32 {
    base_width * (1.0 + pressure * PRESSURE_WIDTH_GAIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Rgba8,
    pub base_width: f32,
    pub is_eraser: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Rgba8::BLACK,
            base_width: 2.0,
            is_eraser: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    id: StrokeId,
    samples: Vec<Sample>,
    color: Rgba8,
    is_eraser: bool,
    base_width: f32,
}

impl Stroke {
    pub fn new(id: StrokeId, samples: Vec<Sample>, style: StrokeStyle) -> Self {
        Self {
            id,
            samples,
            color: style.color,
            is_eraser: style.is_eraser,
            base_width: style.base_width,
        }
    }

    pub fn id(&self) -> StrokeId {
        self.id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn color(&self) -> Rgba8 {
        self.color
    }

    pub fn is_eraser(&self) -> bool {
        self.is_eraser
    }

    pub fn base_width(&self) -> f32 {
        self.base_width
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color,
            base_width: self.base_width,
            is_eraser: self.is_eraser,
        }
    }

    /// Fewer than two samples never paint anything.
    pub fn is_degenerate(&self) -> bool {
        self.samples.len() < 2
    }

    pub fn max_width(&self) -> f32 {
        self.samples
            .iter()
            .map(|sample| sample.width)
            .fold(0.0, f32::max)
    }

    /// Hull of the raw sample positions, without any width.
    pub fn sample_bounds(&self) -> Option<DrawingRect> {
        DrawingRect::from_points(self.samples.iter().map(|sample| sample.position))
    }
}

/// Ordered stroke list; later strokes paint over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    strokes: Vec<Arc<Stroke>>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_strokes(strokes: Vec<Arc<Stroke>>) -> Self {
        Self { strokes }
    }

    pub fn strokes(&self) -> &[Arc<Stroke>] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn push_stroke(&mut self, stroke: Arc<Stroke>) {
        self.strokes.push(stroke);
    }

    pub fn pop_stroke(&mut self) -> Option<Arc<Stroke>> {
        self.strokes.pop()
    }

    pub fn take_strokes(&mut self) -> Vec<Arc<Stroke>> {
        std::mem::take(&mut self.strokes)
    }

    pub fn replace_strokes(&mut self, strokes: Vec<Arc<Stroke>>) {
        self.strokes = strokes;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    AddStroke(Arc<Stroke>),
    Clear { previous: Vec<Arc<Stroke>> },
}

impl Edit {
    pub fn add_stroke(stroke: Stroke) -> Self {
        Self::AddStroke(Arc::new(stroke))
    }

    /// A clear edit; the stroke list it restores is recorded when it is applied.
    pub fn clear() -> Self {
        Self::Clear {
            previous: Vec::new(),
        }
    }
}
