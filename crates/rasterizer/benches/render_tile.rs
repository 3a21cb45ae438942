use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use model::{Drawing, DrawingRect, Rgba8, Sample, Stroke, StrokeId, StrokeStyle};
use rasterizer::{RasterOptions, render_region};

fn scribble(seed: usize) -> Stroke {
    let samples = (0..120)
        .map(|index| {
            let t = index as f64 * 0.05 + seed as f64;
            Sample::capture(
                (
                    64.0 + 90.0 * (t * 0.7).sin() + seed as f64 * 3.0,
                    64.0 + 80.0 * (t * 1.3).cos(),
                ),
                (0.5 + 0.5 * (t * 2.0).sin()) as f32,
                None,
                None,
                index as f64 / 240.0,
                2.5,
            )
        })
        .collect();
    Stroke::new(
        StrokeId::new_random(),
        samples,
        StrokeStyle {
            color: Rgba8::new(30, 40, 160, 255),
            base_width: 2.5,
            is_eraser: false,
        },
    )
}

fn render_tile_benchmark(criterion: &mut Criterion) {
    let drawing = Drawing::from_strokes((0..24).map(|seed| Arc::new(scribble(seed))).collect());
    let mut group = criterion.benchmark_group("render_tile");
    for subdivisions in [4u32, 6, 8] {
        let options = RasterOptions { subdivisions };
        for zoom_bucket in [100i32, 200, 300] {
            let scale = zoom_bucket as f64 / 100.0;
            let extent = 256.0 / scale;
            let region = DrawingRect::new(0.0, 0.0, extent, extent);
            group.bench_with_input(
                BenchmarkId::new(format!("subdivisions_{subdivisions}"), zoom_bucket),
                &region,
                |bencher, region| {
                    bencher.iter(|| {
                        render_region(black_box(&drawing), region, scale, 256, 256, &options)
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, render_tile_benchmark);
criterion_main!(benches);
