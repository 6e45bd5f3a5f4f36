//! Integration test: run a synthetic image through the pipeline and
//! write the RAPID program to disk.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::PathBuf;

use penarm_export::{ExportError, RapidConfig, write_rapid_program};
use penarm_pipeline::{PipelineConfig, Point};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("penarm-export-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn triangle_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(64, 64, |x, y| {
        if y > 8 && x > 8 && x < y {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
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
fn pipeline_to_rapid_file() {
    let mut config = PipelineConfig::default();
    config.extract.target_size = 64;
    let plan = penarm_pipeline::plan(&triangle_png(), &config).expect("pipeline should succeed");
    assert!(plan.points.len() > 2);

    let dir = scratch_dir("pipeline");
    let rapid = RapidConfig {
        module_name: "triangle".to_owned(),
        draw_threshold: 3.0,
        ..RapidConfig::default()
    };
    let written = write_rapid_program(&dir, &plan.ordered_points(), &rapid).unwrap();
    assert_eq!(written, dir.join("triangle.prg"));

    let program = std::fs::read_to_string(&written).unwrap();
    let moves = 2 * (plan.points.len() - 1);
    assert!(program.contains(&format!("VAR num array_draw_x{{{moves}}}:= [")));
    assert!(program.contains("MODULE triangle"));
    assert!(program.trim_end().ends_with("ENDMODULE"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn existing_program_is_truncated() {
    let dir = scratch_dir("truncate");
    let config = RapidConfig::default();
    let long: Vec<Point> = (0..50).map(|i| Point::new(f64::from(i), 0.0)).collect();
    let short = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];

    let path = write_rapid_program(&dir, &long, &config).unwrap();
    let first = std::fs::metadata(&path).unwrap().len();
    write_rapid_program(&dir, &short, &config).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert!((second.len() as u64) < first);
    assert!(second.contains("VAR num array_draw_x{2}:= [0.0, 0.5];"));
    assert_eq!(second.matches("ENDMODULE").count(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_directory_reports_file_write() {
    let dir = std::env::temp_dir().join(format!("penarm-export-{}-missing/nested", std::process::id()));
    let short = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
    let err = write_rapid_program(&dir, &short, &RapidConfig::default()).unwrap_err();
    match err {
        ExportError::FileWrite { path, .. } => assert_eq!(path, dir.join("example.prg")),
        other => panic!("expected FileWrite, got {other:?}"),
    }
}
