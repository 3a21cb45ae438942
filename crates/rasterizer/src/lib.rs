//! CPU stroke rasterization.
//!
//! Strokes are smoothed into short segments (`smoothing`), turned into a
//! per-stroke antialiased coverage mask and composited into a premultiplied
//! RGBA8 `Bitmap` (`paint`). Every function here is pure: the same drawing,
//! region and scale always produce the same pixels, which is what lets tile
//! jobs run on any worker thread.

use std::fmt;

use model::{Drawing, DrawingRect, Stroke};
use serde::Deserialize;

pub mod paint;
pub mod smoothing;

pub use paint::{INK_BRIGHTNESS_BOOST, INK_SATURATION_BOOST, boost_color};
pub use smoothing::{CurveSegment, catmull_rom_point, curve_bounds, smooth_samples};

use paint::{Ink, paint_segments};

/// Narrowest segment painted, in pixels after scaling.
pub const MIN_SEGMENT_WIDTH_PX: f64 = 0.5;
/// Smallest extra reach around a stroke, in drawing units, covering
/// antialiased edges.
pub const ANTIALIAS_MARGIN: f64 = 2.0;
/// Coverage ends half a pixel past the segment radius, and the radius is
/// never below half of `MIN_SEGMENT_WIDTH_PX`.
const EDGE_REACH_PX: f64 = MIN_SEGMENT_WIDTH_PX * 0.5 + 0.5;
pub const MAX_SUBDIVISIONS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Curve segments per interval between two raw samples.
    pub subdivisions: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { subdivisions: 8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOptionsError {
    SubdivisionsOutOfRange { subdivisions: u32 },
}

impl fmt::Display for RasterOptionsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterOptionsError::SubdivisionsOutOfRange { subdivisions } => write!(
                formatter,
                "curve subdivisions {subdivisions} outside 1..={MAX_SUBDIVISIONS}"
            ),
        }
    }
}

impl std::error::Error for RasterOptionsError {}

impl RasterOptions {
    pub fn validate(&self) -> Result<(), RasterOptionsError> {
        if self.subdivisions == 0 || self.subdivisions > MAX_SUBDIVISIONS {
            return Err(RasterOptionsError::SubdivisionsOutOfRange {
                subdivisions: self.subdivisions,
            });
        }
        Ok(())
    }
}

/// Premultiplied RGBA8 pixels, row-major, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    pub fn new_transparent(width: u32, height: u32) -> Self {
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .expect("bitmap pixel count overflow");
        Self {
            width,
            height,
            pixels: vec![[0; 4]; pixel_count],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[self.index(x, y)]
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8; 4] {
        let index = self.index(x, y);
        &mut self.pixels[index]
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Raw bytes for blitting, `width * height * 4` long.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|pixel| pixel[3] == 0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} bitmap",
            self.width,
            self.height
        );
        y as usize * self.width as usize + x as usize
    }
}

/// Reach of painted pixels past half the stroke width at `scale`, in drawing
/// units. Grows as the scale shrinks.
pub fn antialias_margin(scale: f64) -> f64 {
    if !valid_scale(scale) {
        return ANTIALIAS_MARGIN;
    }
    ANTIALIAS_MARGIN.max(EDGE_REACH_PX / scale)
}

/// Smoothed stroke bounds including width and antialiasing reach, valid for
/// rendering at `min_scale` and any larger scale.
pub fn stroke_bounds(
    stroke: &Stroke,
    options: &RasterOptions,
    min_scale: f64,
) -> Option<DrawingRect> {
    let segments = smooth_samples(stroke.samples(), options.subdivisions);
    curve_bounds(&segments, antialias_margin(min_scale))
}

/// Paints `stroke` into `bitmap`, whose pixel (0, 0) maps to the top-left of
/// `region`. Returns false when the stroke has fewer than two samples or
/// misses the region.
pub fn paint_stroke(
    bitmap: &mut Bitmap,
    stroke: &Stroke,
    region: &DrawingRect,
    scale: f64,
    options: &RasterOptions,
) -> bool {
    let segments = smooth_samples(stroke.samples(), options.subdivisions);
    let Some(bounds) = curve_bounds(&segments, antialias_margin(scale)) else {
        return false;
    };
    if !bounds.intersects(region) {
        return false;
    }
    paint_segments(
        bitmap,
        &segments,
        region,
        scale,
        Ink::for_stroke(stroke.color(), stroke.is_eraser()),
    )
}

/// Rasterizes a single stroke over `region` at `scale` pixels per drawing unit.
pub fn rasterize_stroke(
    stroke: &Stroke,
    region: &DrawingRect,
    scale: f64,
    options: &RasterOptions,
) -> Option<Bitmap> {
    let (width, height) = pixel_size(region, scale)?;
    let mut bitmap = Bitmap::new_transparent(width, height);
    if paint_stroke(&mut bitmap, stroke, region, scale, options) {
        Some(bitmap)
    } else {
        None
    }
}

/// Paints every stroke of `drawing` in z-order into a fresh transparent
/// bitmap of `width` x `height` pixels covering `region`. Returns `None` only
/// for a zero-area target.
pub fn render_region(
    drawing: &Drawing,
    region: &DrawingRect,
    scale: f64,
    width: u32,
    height: u32,
    options: &RasterOptions,
) -> Option<Bitmap> {
    if region.is_empty() || width == 0 || height == 0 || !valid_scale(scale) {
        return None;
    }
    let mut bitmap = Bitmap::new_transparent(width, height);
    for stroke in drawing.strokes() {
        paint_stroke(&mut bitmap, stroke, region, scale, options);
    }
    Some(bitmap)
}

fn valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

fn pixel_size(region: &DrawingRect, scale: f64) -> Option<(u32, u32)> {
    if region.is_empty() || !valid_scale(scale) {
        return None;
    }
    let width = (region.width() * scale).ceil();
    let height = (region.height() * scale).ceil();
    if width < 1.0 || height < 1.0 || width > u32::MAX as f64 || height > u32::MAX as f64 {
        return None;
    }
    Some((width as u32, height as u32))
}
