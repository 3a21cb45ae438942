//! Catmull-Rom smoothing of raw pointer samples into short line segments.

use model::{DrawingRect, Sample};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSegment {
    pub start: (f64, f64),
    pub end: (f64, f64),
    /// Average width of the two raw samples bounding this span, in drawing units.
    pub width: f32,
}

/// Uniform Catmull-Rom evaluated between `p1` (t = 0) and `p2` (t = 1).
pub fn catmull_rom_point(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    t: f64,
) -> (f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    let axis = |a: f64, b: f64, c: f64, d: f64| {
        0.5 * (2.0 * b
            + (-a + c) * t
            + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2
            + (-a + 3.0 * b - 3.0 * c + d) * t3)
    };
    (
        axis(p0.0, p1.0, p2.0, p3.0),
        axis(p0.1, p1.1, p2.1, p3.1),
    )
}

/// Splits every interval between consecutive samples into `subdivisions`
/// segments. Missing neighbours at either end repeat the boundary sample.
pub fn smooth_samples(samples: &[Sample], subdivisions: u32) -> Vec<CurveSegment> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let subdivisions = subdivisions.max(1);
    let last_index = samples.len() - 1;
    let mut segments = Vec::with_capacity(last_index * subdivisions as usize);

    for index in 0..last_index {
        let p0 = samples[index.saturating_sub(1)].position;
        let p1 = samples[index].position;
        let p2 = samples[index + 1].position;
        let p3 = samples[(index + 2).min(last_index)].position;
        let width = (samples[index].width + samples[index + 1].width) * 0.5;

        let mut previous = p1;
        for step in 1..=subdivisions {
            let point = if step == subdivisions {
                p2
            } else {
                catmull_rom_point(p0, p1, p2, p3, step as f64 / subdivisions as f64)
            };
            segments.push(CurveSegment {
                start: previous,
                end: point,
                width,
            });
            previous = point;
        }
    }
    segments
}

/// Bounds of the segment endpoints grown by half the widest segment plus `margin`.
pub fn curve_bounds(segments: &[CurveSegment], margin: f64) -> Option<DrawingRect> {
    let hull = DrawingRect::from_points(
        segments
            .iter()
            .flat_map(|segment| [segment.start, segment.end]),
    )?;
    let half_width = segments
        .iter()
        .map(|segment| segment.width)
        .fold(0.0f32, f32::max) as f64
        * 0.5;
    Some(hull.inflate(half_width + margin))
}
