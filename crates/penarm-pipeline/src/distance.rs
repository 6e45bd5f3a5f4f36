//! Pairwise Euclidean distance matrix.
//!
//! Stores only the strict upper triangle (`n * (n - 1) / 2` cells) since
//! the matrix is symmetric with a zero diagonal. Even so, memory and
//! time grow quadratically with the point count: 4000 points need about
//! 64 MB and 8 million distance evaluations. The tour builder also holds
//! an 8-byte index pair per cell while sorting candidates, so its peak at
//! that size is about 128 MB. This is the dominant cost of the pipeline
//! and the reason [`CandidateStrategy::Auto`] switches to
//! nearest-neighbour candidates for larger point sets.
//!
//! Rows are independent, so they are filled in parallel. Each rayon
//! worker writes a disjoint row slice.
//!
//! [`CandidateStrategy::Auto`]: crate::tour::CandidateStrategy::Auto

use rayon::prelude::*;

use crate::types::Point;

/// Symmetric distance matrix over a point set.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise distances for `points`.
    #[must_use]
    pub fn build(points: &[Point]) -> Self {
        let n = points.len();
        let mut cells = vec![0.0; n * n.saturating_sub(1) / 2];

        let mut rows: Vec<(usize, &mut [f64])> = Vec::with_capacity(n);
        let mut rest = cells.as_mut_slice();
        for i in 0..n {
            let (row, tail) = std::mem::take(&mut rest).split_at_mut(n - 1 - i);
            rows.push((i, row));
            rest = tail;
        }

        rows.into_par_iter().for_each(|(i, row)| {
            let origin = points[i];
            for (cell, &other) in row.iter_mut().zip(&points[i + 1..]) {
                *cell = origin.distance(other);
            }
        });

        Self { n, cells }
    }

    /// Number of points the matrix covers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.n
    }

    /// Returns `true` if the matrix covers no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between points `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "index out of range for {} points", self.n);
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Less => self.cells[self.offset(i, j)],
            std::cmp::Ordering::Greater => self.cells[self.offset(j, i)],
        }
    }

    /// Iterate every unordered pair `(i, j, distance)` with `i < j`, row
    /// by row.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |i| {
            let start = self.row_start(i);
            self.cells[start..start + (self.n - 1 - i)]
                .iter()
                .enumerate()
                .map(move |(k, &d)| (i, i + 1 + k, d))
        })
    }

    const fn row_start(&self, i: usize) -> usize {
        // Rows 0..i hold (n-1) + (n-2) + ... + (n-i) cells.
        i * (2 * self.n - i - 1) / 2
    }

    const fn offset(&self, i: usize, j: usize) -> usize {
        self.row_start(i) + (j - i - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(-2.0, 7.5),
            Point::new(10.0, 1.0),
            Point::new(3.0, 4.0),
        ]
    }

    #[test]
    fn empty_and_single_point() {
        assert!(DistanceMatrix::build(&[]).is_empty());
        let one = DistanceMatrix::build(&[Point::new(1.0, 1.0)]);
        assert_eq!(one.len(), 1);
        assert!(one.get(0, 0).abs() < f64::EPSILON);
        assert_eq!(one.pairs().count(), 0);
    }

    #[test]
    fn diagonal_is_zero() {
        let m = DistanceMatrix::build(&sample_points());
        for i in 0..m.len() {
            assert!(m.get(i, i).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn matrix_is_symmetric_and_matches_points() {
        let points = sample_points();
        let m = DistanceMatrix::build(&points);
        for i in 0..points.len() {
            for j in 0..points.len() {
                assert!((m.get(i, j) - m.get(j, i)).abs() < 1e-12);
                assert!((m.get(i, j) - points[i].distance(points[j])).abs() < 1e-12);
            }
        }
        assert!((m.get(0, 1) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_points_have_zero_distance() {
        let m = DistanceMatrix::build(&sample_points());
        assert!(m.get(1, 4).abs() < f64::EPSILON);
    }

    #[test]
    fn pairs_cover_upper_triangle_in_row_order() {
        let m = DistanceMatrix::build(&sample_points());
        let pairs: Vec<(usize, usize)> = m.pairs().map(|(i, j, _)| (i, j)).collect();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0], (0, 1));
        assert_eq!(pairs[4], (1, 2));
        assert_eq!(pairs[9], (3, 4));
        assert!(pairs.iter().all(|&(i, j)| i < j));
    }
}
