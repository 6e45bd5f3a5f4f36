//! Canny edge detection and edge-point collection.
//!
//! [`canny`] turns a grayscale image into a binary mask where white
//! pixels (255) are edges and black pixels (0) are background.
//! [`edge_points`] then walks the mask in raster order and collects the
//! edge pixels as [`Point`]s.
//!
//! No smoothing happens inside [`canny`]; callers that want it run
//! [`blur`] first.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::{filter_clamped, gaussian_blur_f32};
use imageproc::kernel;

use crate::types::Point;

/// Minimum allowed Canny threshold.
///
/// A threshold of zero marks every pixel as a potential edge, including
/// flat regions, so both thresholds are clamped up to this value.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Mask value for an edge pixel.
pub const EDGE: u8 = 255;

/// tan(22.5°), the boundary between gradient direction sectors.
const TAN_22_5: f32 = 0.414_213_57;

/// Gaussian blur, skipped when `sigma <= 0`.
#[must_use = "returns the blurred image"]
pub fn blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        gaussian_blur_f32(image, sigma)
    } else {
        image.clone()
    }
}

/// Detect edges using the Canny algorithm.
///
/// Sobel gradients, non-maximum suppression along the quantized
/// gradient direction, then hysteresis: pixels at or above `high` seed
/// edges, and 8-connected pixels at or above `low` extend them.
///
/// Both thresholds are clamped to at least [`MIN_THRESHOLD`] and `low`
/// is clamped to at most `high`. Images narrower or shorter than three
/// pixels have no interior and produce an empty mask.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);

    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let magnitude: Image<Luma<f32>> = Image::from_fn(width, height, |x, y| {
        let h = f32::from(gx.get_pixel(x, y).0[0]);
        let v = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([h.hypot(v)])
    });

    let thinned = suppress_non_maxima(&magnitude, &gx, &gy);
    hysteresis(&thinned, low, high)
}

/// Keep only pixels that are local maxima across the edge.
///
/// Border pixels are always suppressed.
fn suppress_non_maxima(
    magnitude: &Image<Luma<f32>>,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Image<Luma<f32>> {
    let (width, height) = magnitude.dimensions();
    let mut out = Image::from_pixel(width, height, Luma([0.0]));

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let value = magnitude.get_pixel(x, y).0[0];
            if value <= 0.0 {
                continue;
            }
            let dx = f32::from(gx.get_pixel(x, y).0[0]);
            let dy = f32::from(gy.get_pixel(x, y).0[0]);
            let (ax, ay) = (dx.abs(), dy.abs());

            // Neighbours on either side, along the gradient.
            let (a, b) = if ay <= ax * TAN_22_5 {
                ((x - 1, y), (x + 1, y))
            } else if ax <= ay * TAN_22_5 {
                ((x, y - 1), (x, y + 1))
            } else if (dx > 0.0) == (dy > 0.0) {
                ((x + 1, y + 1), (x - 1, y - 1))
            } else {
                ((x - 1, y + 1), (x + 1, y - 1))
            };

            let va = magnitude.get_pixel(a.0, a.1).0[0];
            let vb = magnitude.get_pixel(b.0, b.1).0[0];
            if value >= va && value >= vb {
                out.put_pixel(x, y, Luma([value]));
            }
        }
    }
    out
}

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Double-threshold edge tracking with an explicit stack.
///
/// Neighbour coordinates are bounds-checked before access so tracking
/// that reaches the image border never wraps around.
fn hysteresis(input: &Image<Luma<f32>>, low: f32, high: f32) -> GrayImage {
    let (width, height) = input.dimensions();
    let mut out = GrayImage::new(width, height);
    let mut stack = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if input.get_pixel(x, y).0[0] < high || out.get_pixel(x, y).0[0] == EDGE {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE]));
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for &(dx, dy) in &NEIGHBOURS {
                    let (Some(nx), Some(ny)) = (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= width || ny >= height {
                        continue;
                    }
                    if input.get_pixel(nx, ny).0[0] >= low && out.get_pixel(nx, ny).0[0] != EDGE {
                        out.put_pixel(nx, ny, Luma([EDGE]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

/// Collect edge pixels from a binary mask in raster order (row outer,
/// column inner).
///
/// With `exclude_border` set, pixels in row 0 and column 0 are skipped.
#[must_use]
pub fn edge_points(mask: &GrayImage, exclude_border: bool) -> Vec<Point> {
    let start = u32::from(exclude_border);
    let mut points = Vec::new();
    for row in start..mask.height() {
        for column in start..mask.width() {
            if mask.get_pixel(column, row).0[0] == EDGE {
                points.push(Point::from_pixel(column, row));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    fn count_edges(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == EDGE).count()
    }

    #[test]
    fn black_image_produces_no_edges() {
        let img = GrayImage::new(20, 20);
        let edges = canny(&img, 1.0, 255.0);
        assert_eq!(count_edges(&edges), 0);
    }

    #[test]
    fn sharp_edge_detected_near_boundary() {
        let edges = canny(&sharp_edge_image(), 50.0, 150.0);
        assert!(count_edges(&edges) > 0, "expected edges at sharp boundary");
        for (x, _y, p) in edges.enumerate_pixels() {
            if p.0[0] == EDGE {
                assert!((9..=10).contains(&x), "edge pixel at unexpected column {x}");
            }
        }
    }

    #[test]
    fn output_dimensions_match_input() {
        let edges = canny(&GrayImage::new(17, 31), 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn tiny_image_has_no_interior() {
        let img = GrayImage::from_fn(2, 2, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        assert_eq!(count_edges(&canny(&img, 1.0, 2.0)), 0);
    }

    #[test]
    fn tracking_next_to_border_does_not_panic() {
        let mut img = GrayImage::new(10, 10);
        for y in 0..10 {
            img.put_pixel(1, y, Luma([255]));
        }
        let _edges = canny(&img, 1.0, 2.0);
    }

    #[test]
    fn zero_low_threshold_is_clamped_to_min() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 0.0, 150.0), canny(&img, MIN_THRESHOLD, 150.0));
    }

    #[test]
    fn low_above_high_is_clamped() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 200.0, 100.0), canny(&img, 100.0, 100.0));
    }

    #[test]
    fn blur_with_zero_sigma_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(blur(&img, 0.0), img);
    }

    #[test]
    fn edge_points_in_raster_order() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(3, 1, Luma([EDGE]));
        mask.put_pixel(1, 2, Luma([EDGE]));
        mask.put_pixel(2, 1, Luma([EDGE]));
        assert_eq!(
            edge_points(&mask, true),
            vec![Point::new(2.0, 1.0), Point::new(3.0, 1.0), Point::new(1.0, 2.0)],
        );
    }

    #[test]
    fn border_exclusion_skips_first_row_and_column() {
        let mut mask = GrayImage::new(3, 3);
        mask.put_pixel(0, 2, Luma([EDGE]));
        mask.put_pixel(2, 0, Luma([EDGE]));
        mask.put_pixel(2, 2, Luma([EDGE]));
        assert_eq!(edge_points(&mask, true), vec![Point::new(2.0, 2.0)]);
        assert_eq!(edge_points(&mask, false).len(), 3);
    }
}
