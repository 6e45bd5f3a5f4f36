//! SVG preview of a drawing plan.
//!
//! Draw segments become one `<path>` whose `M`/`L` runs break wherever
//! the pen lifts. Jumps can optionally be shown as a second, dashed
//! path so travel moves are visible when tuning the draw threshold.
//!
//! Coordinates stay in resized-image pixels; the `viewBox` matches the
//! plan's dimensions.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use penarm_pipeline::{DrawPlan, Segment, SegmentKind};

/// Metadata and styling for the preview document.
#[derive(Debug, Clone)]
pub struct SvgOptions<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Pipeline configuration JSON, embedded in `<metadata>` for
    /// reproducibility.
    pub config_json: Option<&'a str>,

    /// Also draw jump segments as a dashed path.
    pub show_jumps: bool,

    /// Stroke width of draw segments, in pixels.
    pub stroke_width: f64,
}

impl Default for SvgOptions<'_> {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            config_json: None,
            show_jumps: false,
            stroke_width: 1.0,
        }
    }
}

/// Collects segments of one kind into path data, starting a new subpath
/// whenever a segment does not continue from the previous one.
struct RunBuilder {
    data: Data,
    cursor: Option<(f64, f64)>,
    segments: usize,
}

impl RunBuilder {
    fn new() -> Self {
        Self {
            data: Data::new(),
            cursor: None,
            segments: 0,
        }
    }

    fn push(&mut self, segment: &Segment) {
        let from = (segment.from.x, segment.from.y);
        let to = (segment.to.x, segment.to.y);
        let data = std::mem::replace(&mut self.data, Data::new());
        let data = if self.cursor == Some(from) {
            data
        } else {
            data.move_to(from)
        };
        self.data = data.line_to(to);
        self.cursor = Some(to);
        self.segments += 1;
    }

    fn into_path_data(self) -> Option<String> {
        (self.segments > 0).then(|| String::from(Value::from(self.data)))
    }
}

/// Render `plan` as an SVG document, classifying segments with
/// `threshold`.
///
/// # Examples
///
/// ```
/// use penarm_export::svg::{SvgOptions, to_svg};
/// use penarm_pipeline::{Dimensions, DrawPlan, Point, Tour};
///
/// let plan = DrawPlan {
///     points: vec![Point::new(1.0, 1.0), Point::new(2.0, 1.0), Point::new(9.0, 9.0)],
///     tour: Tour::new(vec![0, 1, 2]),
///     dimensions: Dimensions { width: 10, height: 10 },
/// };
/// let svg = to_svg(&plan, 2.0, &SvgOptions::default());
/// assert!(svg.contains("M1,1 L2,1"));
/// ```
#[must_use]
pub fn to_svg(plan: &DrawPlan, threshold: f64, options: &SvgOptions<'_>) -> String {
    let w = plan.dimensions.width;
    let h = plan.dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = options.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = options.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = options.config_json {
        let mut pipeline_el = Element::new("penarm:pipeline");
        pipeline_el.assign("xmlns:penarm", "https://penarm.dev/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    let mut draws = RunBuilder::new();
    let mut jumps = RunBuilder::new();
    for segment in &plan.strokes(threshold) {
        match segment.kind {
            SegmentKind::Draw => draws.push(&segment),
            SegmentKind::Jump => jumps.push(&segment),
        }
    }

    if let Some(d) = draws.into_path_data() {
        doc = doc.add(
            Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", options.stroke_width)
                .set("stroke-linecap", "round")
                .set("stroke-linejoin", "round"),
        );
    }
    if options.show_jumps
        && let Some(d) = jumps.into_path_data()
    {
        doc = doc.add(
            Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", "red")
                .set("stroke-width", options.stroke_width / 2.0)
                .set("stroke-dasharray", "2,2"),
        );
    }

    doc.to_string()
}
