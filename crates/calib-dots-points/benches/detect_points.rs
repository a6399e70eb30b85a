//! Point detection timing on a synthetic dot grid.
//!
//! Run with: cargo bench -p calib-dots-points

use calib_dots_core::{GrayImage, WorkerPool};
use calib_dots_points::synthetic::paint_dot;
use calib_dots_points::PointDetector;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::Point2;
use std::hint::black_box;

fn dot_grid(width: usize, height: usize, spacing: f64) -> GrayImage {
    let mut img = GrayImage::new(width, height, 215);
    let mut y = spacing;
    let mut row = 0usize;
    while y < height as f64 - spacing {
        let mut x = spacing;
        let mut col = 0usize;
        while x < width as f64 - spacing {
            // Dark dots everywhere, a white dot on a black square every third one.
            if (row + col) % 3 == 0 {
                let half = (spacing / 2.0) as i64;
                for yy in (y as i64 - half)..(y as i64 + half) {
                    for xx in (x as i64 - half)..(x as i64 + half) {
                        img.set(xx as usize, yy as usize, 25);
                    }
                }
                paint_dot(&mut img, Point2::new(x, y), spacing * 0.15, 230);
            } else {
                paint_dot(&mut img, Point2::new(x, y), spacing * 0.15, 25);
            }
            x += spacing;
            col += 1;
        }
        y += spacing;
        row += 1;
    }
    img
}

fn bench_detect_points(c: &mut Criterion) {
    let img = dot_grid(640, 480, 32.0);
    let detector = PointDetector::default();

    let mut group = c.benchmark_group("detect_points");
    group.throughput(Throughput::Elements((img.width * img.height) as u64));
    group.sample_size(20);

    group.bench_function("single_thread", |b| {
        b.iter(|| black_box(detector.detect_points(&img.view(), None)))
    });

    for threads in [2usize, 4] {
        let Ok(pool) = WorkerPool::new(threads) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("pool", threads), &pool, |b, pool| {
            b.iter(|| black_box(detector.detect_points(&img.view(), Some(pool))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_detect_points);
criterion_main!(benches);
