//! Progress canvas: a raster picture of what has been drawn so far.
//!
//! The driver strokes every draw segment onto the canvas as it is
//! replayed, so an interrupted run still shows how far it got. Drawing
//! onto the canvas never fails the replay.

use image::{Rgba, RgbaImage};
use penarm_pipeline::{Dimensions, Segment};
use tiny_skia::{Color, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// Raster canvas sized to the plan's dimensions times the playback scale.
#[derive(Debug, Clone)]
pub struct ProgressCanvas {
    pixmap: Pixmap,
    scale: f64,
    stroke: Stroke,
    paint: Paint<'static>,
    segments: usize,
}

impl ProgressCanvas {
    /// Line colour of drawn segments.
    pub const INK: [u8; 4] = [0, 0, 255, 255];

    /// Create a black canvas for a plan of `dimensions`, scaled by
    /// `scale`.
    ///
    /// Returns `None` if the scaled size is zero or too large to
    /// allocate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(dimensions: Dimensions, scale: f64) -> Option<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let width = (f64::from(dimensions.width) * scale).ceil() as u32;
        let height = (f64::from(dimensions.height) * scale).ceil() as u32;
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(Color::BLACK);

        let stroke = Stroke {
            width: 1.0,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let mut paint = Paint::default();
        let [r, g, b, a] = Self::INK;
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = false;

        Some(Self {
            pixmap,
            scale,
            stroke,
            paint,
            segments: 0,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Number of segments stroked so far.
    #[must_use]
    pub const fn segments(&self) -> usize {
        self.segments
    }

    /// Stroke `segment` onto the canvas.
    #[allow(clippy::cast_possible_truncation)]
    pub fn draw_segment(&mut self, segment: &Segment) {
        let mut pb = PathBuilder::new();
        pb.move_to(
            (segment.from.x * self.scale) as f32,
            (segment.from.y * self.scale) as f32,
        );
        pb.line_to(
            (segment.to.x * self.scale) as f32,
            (segment.to.y * self.scale) as f32,
        );
        let Some(path) = pb.finish() else {
            return;
        };
        self.pixmap
            .stroke_path(&path, &self.paint, &self.stroke, Transform::identity(), None);
        self.segments += 1;
    }

    /// Convert to a straight-alpha RGBA image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_image(&self) -> RgbaImage {
        let data = self.pixmap.data();
        let mut img = RgbaImage::new(self.width(), self.height());
        for (i, pixel) in img.pixels_mut().enumerate() {
            let off = i * 4;
            let a = data[off + 3];
            if a == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                // tiny-skia stores premultiplied alpha.
                let r = u16::from(data[off]) * 255 / u16::from(a);
                let g = u16::from(data[off + 1]) * 255 / u16::from(a);
                let b = u16::from(data[off + 2]) * 255 / u16::from(a);
                *pixel = Rgba([r as u8, g as u8, b as u8, a]);
            }
        }
        img
    }
}
