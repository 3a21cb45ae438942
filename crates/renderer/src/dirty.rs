use std::sync::Arc;

use model::{DrawingRect, Stroke};
use rasterizer::{RasterOptions, stroke_bounds};

/// Past this many changed strokes a change is treated as touching everything.
pub const MAX_TRACKED_DIRTY_STROKES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DirtyRegion {
    Rects(Vec<DrawingRect>),
    Unknown,
}

impl DirtyRegion {
    pub fn is_empty(&self) -> bool {
        match self {
            DirtyRegion::Rects(rects) => rects.is_empty(),
            DirtyRegion::Unknown => false,
        }
    }

    pub fn intersects(&self, rect: &DrawingRect) -> bool {
        match self {
            DirtyRegion::Rects(rects) => rects.iter().any(|dirty| dirty.intersects(rect)),
            DirtyRegion::Unknown => true,
        }
    }
}

/// Union of the painted bounds of `strokes` at every scale down to
/// `min_scale`. Strokes that paint nothing contribute nothing.
pub fn dirty_region_for_strokes(
    strokes: &[Arc<Stroke>],
    options: &RasterOptions,
    min_scale: f64,
) -> DirtyRegion {
    if strokes.len() > MAX_TRACKED_DIRTY_STROKES {
        return DirtyRegion::Unknown;
    }
    DirtyRegion::Rects(
        strokes
            .iter()
            .filter_map(|stroke| stroke_bounds(stroke, options, min_scale))
            .collect(),
    )
}
