//! Draw/jump segmentation of a tour.
//!
//! Consecutive tour points closer than the draw threshold are connected
//! with the pen down ([`SegmentKind::Draw`]); farther pairs are crossed
//! with the pen lifted ([`SegmentKind::Jump`]). Segmentation is lazy and
//! borrows the points and tour, so a plan can be replayed or exported
//! any number of times without copying.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::tour::Tour;
use crate::types::Point;

/// Default maximum distance, in resized-image pixels, drawn with the pen
/// down.
///
/// Adjacent and diagonal pixels (distance 1 and √2) are drawn. Anything
/// farther apart is jumped.
pub const DEFAULT_DRAW_THRESHOLD: f64 = 2.0;

/// Whether a segment is drawn or travelled with the pen lifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Pen down.
    Draw,
    /// Pen up.
    Jump,
}

/// Classify the move from `from` to `to`.
///
/// A distance exactly equal to `threshold` is a [`SegmentKind::Draw`].
#[must_use]
pub fn classify(from: Point, to: Point, threshold: f64) -> SegmentKind {
    if from.distance(to) <= threshold {
        SegmentKind::Draw
    } else {
        SegmentKind::Jump
    }
}

/// One move between consecutive tour points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position of the segment in the tour: segment `i` goes from tour
    /// entry `i` to entry `i + 1`.
    pub index: usize,
    pub from: Point,
    pub to: Point,
    pub kind: SegmentKind,
}

impl Segment {
    #[must_use]
    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }

    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.kind == SegmentKind::Draw
    }
}

/// A tour over a point set together with the draw threshold.
#[derive(Debug, Clone, Copy)]
pub struct StrokePlan<'a> {
    points: &'a [Point],
    tour: &'a Tour,
    threshold: f64,
}

impl<'a> StrokePlan<'a> {
    /// Pair `tour` with the `points` it indexes.
    ///
    /// Every tour entry must be a valid index into `points`; iteration
    /// panics otherwise.
    #[must_use]
    pub const fn new(points: &'a [Point], tour: &'a Tour, threshold: f64) -> Self {
        Self {
            points,
            tour,
            threshold,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of segments: one fewer than the tour length, or zero.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tour.len().saturating_sub(1)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first point visited, if any.
    #[must_use]
    pub fn start(&self) -> Option<Point> {
        self.tour.iter().next().map(|&i| self.points[i])
    }

    /// Iterate the segments in tour order.
    #[must_use]
    pub fn iter(&self) -> Segments<'a> {
        Segments {
            points: self.points,
            pairs: self.tour.as_slice().windows(2),
            threshold: self.threshold,
            next_index: 0,
        }
    }

    /// Count of draw and jump segments, in that order.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        self.iter().fold((0, 0), |(draw, jump), s| match s.kind {
            SegmentKind::Draw => (draw + 1, jump),
            SegmentKind::Jump => (draw, jump + 1),
        })
    }
}

impl<'a> IntoIterator for &StrokePlan<'a> {
    type Item = Segment;
    type IntoIter = Segments<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the segments of a [`StrokePlan`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    points: &'a [Point],
    pairs: std::slice::Windows<'a, usize>,
    threshold: f64,
    next_index: usize,
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let pair = self.pairs.next()?;
        let from = self.points[pair[0]];
        let to = self.points[pair[1]];
        let index = self.next_index;
        self.next_index += 1;
        Some(Segment {
            index,
            from,
            to,
            kind: classify(from, to, self.threshold),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for Segments<'_> {}

impl FusedIterator for Segments<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_points() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 10.0),
        ]
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let a = Point::new(0.0, 0.0);
        assert_eq!(classify(a, Point::new(2.0, 0.0), 2.0), SegmentKind::Draw);
        assert_eq!(classify(a, Point::new(2.0, 0.001), 2.0), SegmentKind::Jump);
        assert_eq!(classify(a, a, 0.0), SegmentKind::Draw);
    }

    #[test]
    fn diagonal_neighbours_are_drawn_by_default() {
        let a = Point::new(5.0, 5.0);
        assert_eq!(
            classify(a, Point::new(6.0, 6.0), DEFAULT_DRAW_THRESHOLD),
            SegmentKind::Draw,
        );
        assert_eq!(
            classify(a, Point::new(8.0, 5.0), DEFAULT_DRAW_THRESHOLD),
            SegmentKind::Jump,
        );
    }

    #[test]
    fn segments_follow_tour() {
        let points = line_points();
        let tour = Tour::new(vec![0, 1, 2, 3]);
        let plan = StrokePlan::new(&points, &tour, DEFAULT_DRAW_THRESHOLD);
        let kinds: Vec<SegmentKind> = plan.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SegmentKind::Draw, SegmentKind::Draw, SegmentKind::Jump],
        );
        let indices: Vec<usize> = plan.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(plan.counts(), (2, 1));
    }

    #[test]
    fn segment_count_is_tour_length_minus_one() {
        let points = line_points();
        for len in 0..=4 {
            let tour = Tour::new((0..len).collect());
            let plan = StrokePlan::new(&points, &tour, 1.0);
            assert_eq!(plan.len(), len.saturating_sub(1));
            assert_eq!(plan.iter().len(), plan.len());
            assert_eq!(plan.iter().count(), plan.len());
        }
    }

    #[test]
    fn segments_use_tour_order_not_point_order() {
        let points = line_points();
        let tour = Tour::new(vec![3, 0]);
        let plan = StrokePlan::new(&points, &tour, 100.0);
        let segments: Vec<Segment> = plan.iter().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].from, Point::new(3.0, 10.0));
        assert_eq!(segments[0].to, Point::new(0.0, 0.0));
        assert!(segments[0].is_draw());
        assert_eq!(plan.start(), Some(Point::new(3.0, 10.0)));
    }

    #[test]
    fn plan_can_be_iterated_repeatedly() {
        let points = line_points();
        let tour = Tour::new(vec![0, 1, 2, 3]);
        let plan = StrokePlan::new(&points, &tour, 1.5);
        let first: Vec<Segment> = plan.iter().collect();
        let second: Vec<Segment> = (&plan).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn cloned_iterator_resumes_independently() {
        let points = line_points();
        let tour = Tour::new(vec![0, 1, 2, 3]);
        let plan = StrokePlan::new(&points, &tour, 1.5);
        let mut it = plan.iter();
        it.next();
        let rest: Vec<usize> = it.clone().map(|s| s.index).collect();
        assert_eq!(rest, vec![1, 2]);
        assert_eq!(it.len(), 2);
    }

    #[test]
    fn segment_length() {
        let s = Segment {
            index: 0,
            from: Point::new(0.0, 0.0),
            to: Point::new(3.0, 4.0),
            kind: SegmentKind::Jump,
        };
        assert!((s.length() - 5.0).abs() < f64::EPSILON);
        assert!(!s.is_draw());
    }
}
