//! Coverage masks and compositing into premultiplied RGBA8.

use model::{DrawingRect, Rgba8};

use crate::smoothing::CurveSegment;
use crate::{Bitmap, MIN_SEGMENT_WIDTH_PX};

/// Saturation gain for ink colors; offsets the greying of antialiased edges on paper.
pub const INK_SATURATION_BOOST: f32 = 1.12;
/// Brightness (HSV value) gain for ink colors.
pub const INK_BRIGHTNESS_BOOST: f32 = 1.04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Ink {
    /// Premultiplied color in `[0, 1]`.
    Color([f32; 4]),
    Clear,
}

impl Ink {
    pub(crate) fn for_stroke(color: Rgba8, is_eraser: bool) -> Self {
        if is_eraser {
            return Ink::Clear;
        }
        let [r, g, b] = boost_color(color);
        let alpha = color.a as f32 / 255.0;
        Ink::Color([r * alpha, g * alpha, b * alpha, alpha])
    }
}

/// Applies the fixed saturation and brightness boost, returning straight RGB in `[0, 1]`.
pub fn boost_color(color: Rgba8) -> [f32; 3] {
    let (hue, saturation, value) = rgb_to_hsv(
        color.r as f32 / 255.0,
        color.g as f32 / 255.0,
        color.b as f32 / 255.0,
    );
    hsv_to_rgb(
        hue,
        (saturation * INK_SATURATION_BOOST).min(1.0),
        (value * INK_BRIGHTNESS_BOOST).min(1.0),
    )
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let offset = value - chroma;
    [r + offset, g + offset, b + offset]
}

#[derive(Debug, Clone, Copy)]
struct PixelSegment {
    start: (f64, f64),
    end: (f64, f64),
    radius: f64,
}

impl PixelSegment {
    fn distance_to(&self, point: (f64, f64)) -> f64 {
        let dx = self.end.0 - self.start.0;
        let dy = self.end.1 - self.start.1;
        let length_squared = dx * dx + dy * dy;
        let t = if length_squared <= f64::EPSILON {
            0.0
        } else {
            (((point.0 - self.start.0) * dx + (point.1 - self.start.1) * dy) / length_squared)
                .clamp(0.0, 1.0)
        };
        let nearest_x = self.start.0 + dx * t;
        let nearest_y = self.start.1 + dy * t;
        ((point.0 - nearest_x).powi(2) + (point.1 - nearest_y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelBox {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl PixelBox {
    fn around(segment: &PixelSegment, width: u32, height: u32) -> Option<Self> {
        let reach = segment.radius + 1.0;
        let min_x = (segment.start.0.min(segment.end.0) - reach).floor().max(0.0);
        let min_y = (segment.start.1.min(segment.end.1) - reach).floor().max(0.0);
        let max_x = (segment.start.0.max(segment.end.0) + reach)
            .ceil()
            .min(width as f64);
        let max_y = (segment.start.1.max(segment.end.1) + reach)
            .ceil()
            .min(height as f64);
        if min_x >= max_x || min_y >= max_y {
            return None;
        }
        Some(Self {
            min_x: min_x as u32,
            min_y: min_y as u32,
            max_x: max_x as u32,
            max_y: max_y as u32,
        })
    }

    fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

/// Paints one stroke's segments. Coverage is the maximum over all segments so
/// overlapping joints are composited exactly once. Returns whether any pixel
/// was touched.
pub(crate) fn paint_segments(
    bitmap: &mut Bitmap,
    segments: &[CurveSegment],
    region: &DrawingRect,
    scale: f64,
    ink: Ink,
) -> bool {
    let (width, height) = (bitmap.width(), bitmap.height());
    let mut pixel_segments = Vec::with_capacity(segments.len());
    let mut stroke_box: Option<PixelBox> = None;
    for segment in segments {
        let pixel_segment = PixelSegment {
            start: to_pixel(segment.start, region, scale),
            end: to_pixel(segment.end, region, scale),
            radius: (segment.width as f64 * scale).max(MIN_SEGMENT_WIDTH_PX) * 0.5,
        };
        let Some(segment_box) = PixelBox::around(&pixel_segment, width, height) else {
            continue;
        };
        stroke_box = Some(match stroke_box {
            Some(current) => current.union(segment_box),
            None => segment_box,
        });
        pixel_segments.push((pixel_segment, segment_box));
    }
    let Some(stroke_box) = stroke_box else {
        return false;
    };

    let mask_width = stroke_box.width() as usize;
    let mut mask = vec![0.0f32; mask_width * stroke_box.height() as usize];
    for (segment, segment_box) in &pixel_segments {
        for y in segment_box.min_y..segment_box.max_y {
            let row = (y - stroke_box.min_y) as usize * mask_width;
            for x in segment_box.min_x..segment_box.max_x {
                let center = (x as f64 + 0.5, y as f64 + 0.5);
                let coverage =
                    (segment.radius + 0.5 - segment.distance_to(center)).clamp(0.0, 1.0) as f32;
                let cell = &mut mask[row + (x - stroke_box.min_x) as usize];
                if coverage > *cell {
                    *cell = coverage;
                }
            }
        }
    }

    let mut touched = false;
    for y in stroke_box.min_y..stroke_box.max_y {
        let row = (y - stroke_box.min_y) as usize * mask_width;
        for x in stroke_box.min_x..stroke_box.max_x {
            let coverage = mask[row + (x - stroke_box.min_x) as usize];
            if coverage <= 0.0 {
                continue;
            }
            let pixel = bitmap.pixel_mut(x, y);
            composite_pixel(pixel, coverage, ink);
            touched = true;
        }
    }
    touched
}

fn to_pixel(point: (f64, f64), region: &DrawingRect, scale: f64) -> (f64, f64) {
    (
        (point.0 - region.min_x) * scale,
        (point.1 - region.min_y) * scale,
    )
}

fn composite_pixel(pixel: &mut [u8; 4], coverage: f32, ink: Ink) {
    match ink {
        Ink::Color(source) => {
            let keep = 1.0 - source[3] * coverage;
            for channel in 0..4 {
                let destination = pixel[channel] as f32 / 255.0;
                pixel[channel] = to_byte(source[channel] * coverage + destination * keep);
            }
        }
        Ink::Clear => {
            let keep = 1.0 - coverage;
            for channel in pixel.iter_mut() {
                *channel = to_byte(*channel as f32 / 255.0 * keep);
            }
        }
    }
}

fn to_byte(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
