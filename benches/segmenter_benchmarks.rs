use criterion::{black_box, criterion_group, criterion_main, Criterion};
use designforge::{Segmenter, SegmenterConfig};
use image::{DynamicImage, Rgba, RgbaImage};
use std::time::Duration;

/// Synthetic design: dark background with a bright central subject,
/// approximating the output of an image-generation queue
fn create_design_image(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([10, 10, 12, 255]));

    let cx = width / 2;
    let cy = height / 2;
    let radius = (width.min(height) / 3) as i64;
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as i64 - cx as i64;
        let dy = y as i64 - cy as i64;
        if dx * dx + dy * dy < radius * radius {
            let r = (x % 256) as u8;
            let g = (y % 256) as u8;
            *pixel = Rgba([r.max(120), g.max(80), 200, 255]);
        }
    }

    DynamicImage::ImageRgba8(img)
}

fn bench_segment_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_sizes");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    let segmenter = Segmenter::default();
    for size in [256u32, 512, 768] {
        let image = create_design_image(size, size);
        group.bench_function(format!("{size}x{size}"), |b| {
            b.iter(|| black_box(segmenter.segment(black_box(&image))));
        });
    }

    group.finish();
}

fn bench_background_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("background_estimation");
    group.sample_size(50);

    let segmenter = Segmenter::default();
    let image = create_design_image(768, 768).to_rgba8();
    group.bench_function("768x768_border_histogram", |b| {
        b.iter(|| black_box(segmenter.estimate_background(black_box(&image))));
    });

    group.finish();
}

fn bench_downsample_cap(c: &mut Criterion) {
    let mut group = c.benchmark_group("downsample_cap");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    let image = create_design_image(2048, 2048);
    for cap in [512u32, 768] {
        let segmenter = Segmenter::new(
            SegmenterConfig::builder().max_dimension(cap).build().unwrap(),
        )
        .unwrap();
        group.bench_function(format!("2048_capped_to_{cap}"), |b| {
            b.iter(|| black_box(segmenter.segment(black_box(&image))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_segment_sizes,
    bench_background_estimation,
    bench_downsample_cap
);
criterion_main!(benches);
