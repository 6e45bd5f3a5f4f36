//! 2-opt refinement of an open tour.
//!
//! A 2-opt move removes two tour edges and reconnects the path by
//! reversing the section between them. Passes repeat until nothing
//! improves or the pass limit is reached.
//!
//! Two variants:
//!
//! - [`two_opt`] tries every pair of non-adjacent edges. O(n²) per pass;
//!   used together with the full distance matrix.
//! - [`two_opt_neighbours`] only tries moves that create an edge between
//!   a point and one of its `k` nearest neighbours. O(n·k) checks per
//!   pass; used for large inputs.
//!
//! The endpoints of the tour never move, and every accepted reversal
//! shortens the tour, so refinement can only help.

/// Minimum gain for a reversal to count as an improvement.
///
/// Keeps floating-point noise from flipping equal-length sections back
/// and forth.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// What a refinement run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Refinement {
    /// Accepted reversals.
    pub reversals: usize,
    /// Candidate moves evaluated.
    pub checks: usize,
}

/// Improve `order` in place with at most `max_passes` exhaustive 2-opt
/// passes. `distance(i, j)` is the distance between points `i` and `j`.
pub fn two_opt<D>(order: &mut [usize], max_passes: usize, distance: D) -> Refinement
where
    D: Fn(usize, usize) -> f64,
{
    let n = order.len();
    let mut result = Refinement::default();
    if n < 4 {
        return result;
    }

    for pass in 0..max_passes {
        let mut improved = 0;
        for a in 0..n - 3 {
            for c in a + 2..n - 1 {
                result.checks += 1;
                let gain = distance(order[a], order[a + 1]) + distance(order[c], order[c + 1])
                    - distance(order[a], order[c])
                    - distance(order[a + 1], order[c + 1]);
                if gain > IMPROVEMENT_EPSILON {
                    order[a + 1..=c].reverse();
                    improved += 1;
                }
            }
        }
        log::trace!("2-opt pass {pass}: {improved} reversals");
        result.reversals += improved;
        if improved == 0 {
            break;
        }
    }
    result
}

/// Improve `order` in place with at most `max_passes` 2-opt passes
/// restricted to neighbour lists.
///
/// `neighbours[p]` lists the points `p` may be newly joined to. For a
/// point `a` at position `lo` and a neighbour `c` at position `hi`
/// (`lo < hi`), two moves create the edge `a`–`c`:
///
/// ```text
/// after:  .. lo | lo+1 .. hi | hi+1 ..   reverse lo+1..=hi
/// before: .. lo-1 | lo .. hi-1 | hi ..   reverse lo..=hi-1
/// ```
///
/// The better of the two is applied if it shortens the tour.
pub fn two_opt_neighbours<D>(
    order: &mut [usize],
    neighbours: &[Vec<u32>],
    max_passes: usize,
    distance: D,
) -> Refinement
where
    D: Fn(usize, usize) -> f64,
{
    let n = order.len();
    let mut result = Refinement::default();
    if n < 4 {
        return result;
    }

    let mut position = vec![0; n];
    for (at, &point) in order.iter().enumerate() {
        position[point] = at;
    }

    for pass in 0..max_passes {
        let mut improved = 0;
        for (a, near) in neighbours.iter().enumerate().take(n) {
            for &c in near {
                let (i, j) = (position[a], position[c as usize]);
                let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                if hi < lo + 2 {
                    continue;
                }
                result.checks += 1;

                let joined = distance(order[lo], order[hi]);
                let after = (hi + 1 < n).then(|| {
                    let gain = distance(order[lo], order[lo + 1])
                        + distance(order[hi], order[hi + 1])
                        - joined
                        - distance(order[lo + 1], order[hi + 1]);
                    (gain, lo + 1, hi)
                });
                let before = (lo > 0).then(|| {
                    let gain = distance(order[lo - 1], order[lo])
                        + distance(order[hi - 1], order[hi])
                        - distance(order[lo - 1], order[hi - 1])
                        - joined;
                    (gain, lo, hi - 1)
                });
                let best = after
                    .into_iter()
                    .chain(before)
                    .max_by(|x, y| x.0.total_cmp(&y.0));

                if let Some((gain, from, to)) = best
                    && gain > IMPROVEMENT_EPSILON
                {
                    order[from..=to].reverse();
                    for (at, &point) in order[from..=to].iter().enumerate() {
                        position[point] = from + at;
                    }
                    improved += 1;
                }
            }
        }
        log::trace!("neighbour 2-opt pass {pass}: {improved} reversals");
        result.reversals += improved;
        if improved == 0 {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::path_length;
    use crate::types::Point;

    fn line(xs: &[f64]) -> Vec<Point> {
        xs.iter().map(|&x| Point::new(x, 0.0)).collect()
    }

    fn euclid(points: &[Point]) -> impl Fn(usize, usize) -> f64 + '_ {
        |i, j| points[i].distance(points[j])
    }

    /// Every other point, as a neighbour list.
    fn everyone(n: usize) -> Vec<Vec<u32>> {
        (0..n)
            .map(|p| (0..n).filter(|&q| q != p).map(|q| q as u32).collect())
            .collect()
    }

    #[test]
    fn short_tours_are_untouched() {
        let points = line(&[0.0, 9.0, 1.0]);
        let mut order = [0, 1, 2];
        assert_eq!(two_opt(&mut order, 5, euclid(&points)).reversals, 0);
        assert_eq!(order, [0, 1, 2]);
        let lists = everyone(3);
        let result = two_opt_neighbours(&mut order, &lists, 5, euclid(&points));
        assert_eq!(result, Refinement::default());
    }

    #[test]
    fn crossing_is_removed() {
        // 0 -> 2 -> 1 -> 3 along a line zig-zags; reversing [2, 1] fixes it.
        let points = line(&[0.0, 1.0, 2.0, 3.0]);
        let mut order = [0, 2, 1, 3];
        assert_eq!(two_opt(&mut order, 3, euclid(&points)).reversals, 1);
        assert_eq!(order, [0, 1, 2, 3]);
    }

    #[test]
    fn endpoints_stay_fixed() {
        let points = line(&[0.0, 4.0, 2.0, 3.0, 1.0, 5.0]);
        let mut order = [0, 1, 2, 3, 4, 5];
        two_opt(&mut order, 10, euclid(&points));
        assert_eq!((order[0], order[5]), (0, 5));

        let mut order = [0, 1, 2, 3, 4, 5];
        two_opt_neighbours(&mut order, &everyone(6), 10, euclid(&points));
        assert_eq!((order[0], order[5]), (0, 5));
    }

    #[test]
    fn never_increases_length() {
        let points: Vec<Point> = (0..30_u32)
            .map(|i| Point::from_pixel((i * 7) % 13, (i * 11) % 17))
            .collect();
        let identity: Vec<usize> = (0..points.len()).collect();
        let before = path_length(&points, &identity);

        let mut order = identity.clone();
        two_opt(&mut order, 4, euclid(&points));
        assert!(path_length(&points, &order) <= before);

        let mut order = identity;
        two_opt_neighbours(&mut order, &everyone(points.len()), 4, euclid(&points));
        assert!(path_length(&points, &order) <= before);
    }

    #[test]
    fn zero_passes_do_nothing() {
        let points = line(&[0.0, 1.0, 2.0, 3.0]);
        let mut order = [0, 2, 1, 3];
        assert_eq!(two_opt(&mut order, 0, euclid(&points)), Refinement::default());
        assert_eq!(order, [0, 2, 1, 3]);
    }

    #[test]
    fn neighbour_moves_fix_a_zig_zag() {
        let points = line(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        // Each point only knows the points next to it on the line.
        let lists: Vec<Vec<u32>> = (0..6_u32)
            .map(|p| [p.checked_sub(1), (p < 5).then_some(p + 1)].into_iter().flatten().collect())
            .collect();
        let mut order = [0, 2, 1, 3, 4, 5];
        let result = two_opt_neighbours(&mut order, &lists, 5, euclid(&points));
        assert_eq!(order, [0, 1, 2, 3, 4, 5]);
        assert_eq!(result.reversals, 1);

        // A misplaced last point is an endpoint and stays where it is.
        let mut order = [0, 1, 2, 3, 5, 4];
        two_opt_neighbours(&mut order, &lists, 5, euclid(&points));
        assert_eq!((order[0], order[5]), (0, 4));
    }

    #[test]
    fn neighbour_checks_scale_with_list_length() {
        let points: Vec<Point> = (0..200_u32)
            .map(|i| Point::from_pixel((i * 37) % 101, (i * 53) % 97))
            .collect();
        let n = points.len();
        let lists: Vec<Vec<u32>> = (0..n)
            .map(|p| (1..=3).map(|d| ((p + d) % n) as u32).collect())
            .collect();
        let mut order: Vec<usize> = (0..n).collect();
        let passes = 2;
        let result = two_opt_neighbours(&mut order, &lists, passes, euclid(&points));
        assert!(result.checks <= passes * n * 3);

        let mut full: Vec<usize> = (0..n).collect();
        let exhaustive = two_opt(&mut full, 1, euclid(&points));
        assert!(exhaustive.checks > passes * n * 3);
    }
}
