//! End-to-end checks of the extraction, tour and segmentation stages.

#![allow(clippy::unwrap_used)]

use image::{GrayImage, Luma, Rgba, RgbaImage};
use penarm_pipeline::edge::{EDGE, edge_points};
use penarm_pipeline::{
    DEFAULT_DRAW_THRESHOLD, PipelineConfig, Point, SegmentKind, StrokePlan, TourConfig, build_tour,
};

fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

#[test]
fn diagonal_pair_is_one_draw_segment() {
    let mut mask = GrayImage::new(2, 2);
    mask.put_pixel(1, 0, Luma([EDGE]));
    mask.put_pixel(0, 1, Luma([EDGE]));

    let points = edge_points(&mask, false);
    assert_eq!(points, vec![Point::new(1.0, 0.0), Point::new(0.0, 1.0)]);

    let tour = build_tour(&points, &TourConfig::default()).unwrap();
    assert_eq!(tour.len(), 2);
    assert!(tour.is_permutation_of(2));

    let strokes = StrokePlan::new(&points, &tour, DEFAULT_DRAW_THRESHOLD);
    let segments: Vec<_> = strokes.iter().collect();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].kind, SegmentKind::Draw);
    assert!((segments[0].length() - 2.0_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn black_image_gives_empty_plan() {
    let png = encode_png(&RgbaImage::from_pixel(50, 30, Rgba([0, 0, 0, 255])));
    let plan = penarm_pipeline::plan(&png, &PipelineConfig::default()).unwrap();
    assert!(plan.points.is_empty());
    assert!(plan.tour.is_empty());
    assert!(plan.is_empty());
    assert_eq!(plan.strokes(DEFAULT_DRAW_THRESHOLD).iter().count(), 0);
    assert_eq!(plan.dimensions.width, 350);
    assert_eq!(plan.dimensions.height, 210);
}

#[test]
fn ring_is_traced_mostly_with_draws() {
    // A filled disc: its outline is one closed curve, so the greedy tour
    // should walk it with few jumps.
    let img = RgbaImage::from_fn(80, 80, |x, y| {
        let dx = f64::from(x) - 40.0;
        let dy = f64::from(y) - 40.0;
        if dx.hypot(dy) < 25.0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    let mut config = PipelineConfig::default();
    config.extract.target_size = 80;
    let plan = penarm_pipeline::plan(&encode_png(&img), &config).unwrap();

    assert!(plan.tour.is_permutation_of(plan.points.len()));
    let (draw, jump) = plan.strokes(DEFAULT_DRAW_THRESHOLD).counts();
    assert!(draw > 3 * jump, "draw={draw} jump={jump}");
}
