use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in drawing coordinates, half-open on the max edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl DrawingRect {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut points = points.into_iter();
        let (first_x, first_y) = points.next()?;
        let mut rect = Self::new(first_x, first_y, first_x, first_y);
        for (x, y) in points {
            rect.min_x = rect.min_x.min(x);
            rect.min_y = rect.min_y.min(y);
            rect.max_x = rect.max_x.max(x);
            rect.max_y = rect.max_y.max(y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Empty means zero or negative area, or a non-finite edge.
    pub fn is_empty(&self) -> bool {
        !self.min_x.is_finite()
            || !self.min_y.is_finite()
            || !self.max_x.is_finite()
            || !self.max_y.is_finite()
            || self.min_x >= self.max_x
            || self.min_y >= self.max_y
    }

    pub fn intersects(&self, other: &DrawingRect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    pub fn intersection(&self, other: &DrawingRect) -> Option<DrawingRect> {
        let rect = DrawingRect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if rect.is_empty() { None } else { Some(rect) }
    }

    pub fn union(&self, other: &DrawingRect) -> DrawingRect {
        DrawingRect::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn inflate(&self, amount: f64) -> DrawingRect {
        DrawingRect::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }
}
