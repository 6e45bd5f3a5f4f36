//! Tour construction: order the edge points so the pen travels as little
//! as possible.
//!
//! The tour is built with the greedy edge heuristic for the travelling
//! salesman problem, as a three-step pipeline:
//!
//! 1. **Candidate edges.** Either every pair from a full
//!    [`DistanceMatrix`] or, for large point sets, the `k` nearest
//!    neighbours of each point from an R\*-tree.
//! 2. **Greedy linking.** Candidates are sorted by
//!    `(length, lower index, higher index)` and accepted unless an
//!    endpoint already has two neighbours or the edge would close a cycle
//!    (checked with a union-find). If nearest-neighbour candidates run out
//!    before everything is joined, the endpoints of the remaining
//!    fragments are paired exhaustively and linked the same way.
//! 3. **Assembly.** The single remaining path is walked from its
//!    lower-index endpoint.
//!
//! The path is then improved with a few 2-opt passes. The matrix
//! strategy keeps its matrix for exhaustive passes
//! ([`crate::refine::two_opt`]); the nearest-neighbour strategy only
//! tries moves towards each point's neighbours
//! ([`crate::refine::two_opt_neighbours`]), so no step of it is
//! quadratic in the point count. The result is not optimal, but it is
//! deterministic for a given input and never longer than visiting the
//! points in extraction order.
//!
//! Coincident points are accepted. Their zero-length edges sort first
//! and ties break by index like any other edge.

use std::cmp::Ordering;

use petgraph::unionfind::UnionFind;
use rayon::slice::ParallelSliceMut;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMatrix;
use crate::refine::{two_opt, two_opt_neighbours};
use crate::types::{Point, PipelineError, TourConfig};

/// Selects how candidate edges for the greedy heuristic are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandidateStrategy {
    /// [`Matrix`](Self::Matrix) up to `TourConfig::matrix_limit` points,
    /// [`Nearest`](Self::Nearest) above it.
    #[default]
    Auto,

    /// Every pair of points, from a full distance matrix.
    ///
    /// O(n²) time and memory: 16 bytes per point pair at peak, about
    /// 128 MB for 4000 points.
    Matrix,

    /// The `TourConfig::nearest_k` nearest neighbours of every point.
    ///
    /// Roughly O(n·k·log n). Tours may differ slightly from
    /// [`Matrix`](Self::Matrix) because long edges are only considered
    /// when fragments have to be joined.
    Nearest,
}

impl CandidateStrategy {
    /// The concrete strategy used for `n` points.
    #[must_use]
    pub const fn resolve(self, n: usize, matrix_limit: usize) -> Self {
        match self {
            Self::Auto if n <= matrix_limit => Self::Matrix,
            Self::Auto => Self::Nearest,
            other => other,
        }
    }
}

/// An ordered visiting sequence over a point set.
///
/// Holds point indices. Tours produced by [`build_tour`] are
/// permutations of `0..n`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tour(Vec<usize>);

impl Tour {
    /// Wrap an index sequence.
    #[must_use]
    pub const fn new(order: Vec<usize>) -> Self {
        Self(order)
    }

    /// Number of visited points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the tour visits nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The index sequence.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Iterate the visited indices in order.
    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    /// Total travel along the tour, without returning to the start.
    #[must_use]
    pub fn length(&self, points: &[Point]) -> f64 {
        path_length(points, &self.0)
    }

    /// Returns `true` if every index in `0..n` appears exactly once.
    #[must_use]
    pub fn is_permutation_of(&self, n: usize) -> bool {
        if self.0.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &i in &self.0 {
            if i >= n || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        true
    }
}

impl<'a> IntoIterator for &'a Tour {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Counters describing how a tour was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStats {
    /// The concrete candidate strategy used.
    pub strategy: CandidateStrategy,
    /// Number of candidate edges considered in the first greedy pass.
    pub candidate_count: usize,
    /// Edges added while joining leftover fragments.
    pub fallback_edges: usize,
    /// Accepted 2-opt reversals.
    pub refinements: usize,
    /// 2-opt moves evaluated.
    #[serde(default)]
    pub refine_checks: usize,
    /// Whether extraction order was kept because it was shorter.
    pub kept_identity: bool,
    /// Length of the returned tour.
    pub length: f64,
    /// Length of visiting the points in extraction order.
    pub identity_length: f64,
}

/// Build an approximately shortest open tour over `points`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if a coordinate is not
/// finite or there are more than `u32::MAX` points.
pub fn build_tour(points: &[Point], config: &TourConfig) -> Result<Tour, PipelineError> {
    build_tour_with_stats(points, config).map(|(tour, _)| tour)
}

/// Like [`build_tour`], also reporting how the tour was built.
///
/// # Errors
///
/// See [`build_tour`].
pub fn build_tour_with_stats(
    points: &[Point],
    config: &TourConfig,
) -> Result<(Tour, TourStats), PipelineError> {
    let n = points.len();
    let count = u32::try_from(n).map_err(|_| {
        PipelineError::InvalidInput(format!("{n} points exceed the supported maximum"))
    })?;
    if let Some(index) = points
        .iter()
        .position(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(PipelineError::InvalidInput(format!(
            "point {index} has a non-finite coordinate"
        )));
    }

    let strategy = config.strategy.resolve(n, config.matrix_limit);
    let mut stats = TourStats {
        strategy,
        candidate_count: 0,
        fallback_edges: 0,
        refinements: 0,
        refine_checks: 0,
        kept_identity: false,
        length: 0.0,
        identity_length: 0.0,
    };
    if n < 2 {
        return Ok((Tour::new((0..n).collect()), stats));
    }

    let mut linker = Linker::new(count);
    let refiner = match strategy {
        CandidateStrategy::Nearest => {
            let (candidates, neighbours) = nearest_candidates(points, config.nearest_k.max(1));
            stats.candidate_count = candidates.len();
            linker.link_all(candidates.iter().map(|edge| (edge.a, edge.b)));
            Refiner::Neighbours(neighbours)
        }
        CandidateStrategy::Auto | CandidateStrategy::Matrix => {
            let matrix = DistanceMatrix::build(points);
            let candidates = matrix_candidates(&matrix);
            stats.candidate_count = candidates.len();
            linker.link_all(candidates);
            Refiner::Matrix(matrix)
        }
    };

    if !linker.is_complete() {
        let before = linker.joined;
        let fragment_edges = fragment_candidates(points, &linker);
        linker.link_all(fragment_edges.iter().map(|edge| (edge.a, edge.b)));
        stats.fallback_edges = linker.joined - before;
    }
    if !linker.is_complete() {
        return Err(PipelineError::InvalidInput(format!(
            "could not join {n} points into a single path"
        )));
    }

    let mut order = linker.into_path();
    let passes = config.refine_passes;
    let refinement = match &refiner {
        Refiner::Matrix(matrix) => two_opt(&mut order, passes, |i, j| matrix.get(i, j)),
        Refiner::Neighbours(lists) => two_opt_neighbours(&mut order, lists, passes, |i, j| {
            points[i].distance(points[j])
        }),
    };
    drop(refiner);
    stats.refinements = refinement.reversals;
    stats.refine_checks = refinement.checks;

    stats.length = path_length(points, &order);
    let identity: Vec<usize> = (0..n).collect();
    stats.identity_length = path_length(points, &identity);
    if stats.length > stats.identity_length {
        log::debug!(
            "greedy tour ({:.1}) longer than extraction order ({:.1}); keeping extraction order",
            stats.length,
            stats.identity_length,
        );
        order = identity;
        stats.length = stats.identity_length;
        stats.kept_identity = true;
    }

    log::debug!(
        "tour over {n} points: strategy={strategy:?} candidates={} fallback={} refinements={}/{} length={:.1}",
        stats.candidate_count,
        stats.fallback_edges,
        stats.refinements,
        stats.refine_checks,
        stats.length,
    );

    Ok((Tour::new(order), stats))
}

/// Total length of the open path visiting `order`.
#[must_use]
pub fn path_length(points: &[Point], order: &[usize]) -> f64 {
    order
        .windows(2)
        .map(|w| points[w[0]].distance(points[w[1]]))
        .sum()
}

// ---------------------------------------------------------------------------
// Candidate generation
// ---------------------------------------------------------------------------

/// A possible tour edge between points `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CandidateEdge {
    length: f64,
    a: u32,
    b: u32,
}

impl CandidateEdge {
    fn new(points: &[Point], i: u32, j: u32) -> Self {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        Self {
            length: points[a as usize].distance(points[b as usize]),
            a,
            b,
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.length
            .total_cmp(&other.length)
            .then(self.a.cmp(&other.a))
            .then(self.b.cmp(&other.b))
    }
}

/// Convert an index already known to fit in `u32`.
#[allow(clippy::cast_possible_truncation)]
const fn index(i: usize) -> u32 {
    i as u32
}

fn sort_candidates(edges: &mut [CandidateEdge]) {
    // Keys are unique (a, b pairs), so the unstable sort is deterministic.
    edges.par_sort_unstable_by(CandidateEdge::order);
}

/// What 2-opt refinement works from once linking is done.
enum Refiner {
    Matrix(DistanceMatrix),
    Neighbours(Vec<Vec<u32>>),
}

/// Every pair `(a, b)` with `a < b`, in greedy order.
///
/// Lengths are read back from the matrix while sorting, so each pair
/// costs 8 bytes on top of the matrix cell.
fn matrix_candidates(matrix: &DistanceMatrix) -> Vec<(u32, u32)> {
    let n = matrix.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    pairs.extend(matrix.pairs().map(|(i, j, _)| (index(i), index(j))));
    // Keys are unique (a, b pairs), so the unstable sort is deterministic.
    pairs.par_sort_unstable_by(|&(a, b), &(c, d)| {
        matrix
            .get(a as usize, b as usize)
            .total_cmp(&matrix.get(c as usize, d as usize))
            .then(a.cmp(&c))
            .then(b.cmp(&d))
    });
    pairs
}

type IndexedPoint = GeomWithData<[f64; 2], u32>;

/// The `k` nearest neighbours of every point, both as sorted candidate
/// edges and as per-point lists for refinement.
fn nearest_candidates(points: &[Point], k: usize) -> (Vec<CandidateEdge>, Vec<Vec<u32>>) {
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new([p.x, p.y], index(i)))
            .collect(),
    );

    let neighbours: Vec<Vec<u32>> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let i = index(i);
            tree.nearest_neighbor_iter(&[p.x, p.y])
                .filter(|neighbour| neighbour.data != i)
                .take(k)
                .map(|neighbour| neighbour.data)
                .collect()
        })
        .collect();

    let mut edges: Vec<CandidateEdge> = neighbours
        .iter()
        .enumerate()
        .flat_map(|(i, near)| near.iter().map(move |&j| (index(i), j)))
        .map(|(i, j)| CandidateEdge::new(points, i, j))
        .collect();
    sort_candidates(&mut edges);
    edges.dedup_by(|x, y| x.a == y.a && x.b == y.b);
    (edges, neighbours)
}

/// Every pair of fragment endpoints that lie in different fragments.
fn fragment_candidates(points: &[Point], linker: &Linker) -> Vec<CandidateEdge> {
    let endpoints = linker.endpoints();
    let mut edges = Vec::new();
    for (pos, &i) in endpoints.iter().enumerate() {
        for &j in &endpoints[pos + 1..] {
            if !linker.sets.equiv(i, j) {
                edges.push(CandidateEdge::new(points, i, j));
            }
        }
    }
    sort_candidates(&mut edges);
    edges
}

// ---------------------------------------------------------------------------
// Greedy linking and assembly
// ---------------------------------------------------------------------------

/// Accumulates accepted tour edges as a set of vertex-disjoint paths.
struct Linker {
    neighbours: Vec<[Option<u32>; 2]>,
    sets: UnionFind<u32>,
    joined: usize,
}

impl Linker {
    fn new(count: u32) -> Self {
        let n = count as usize;
        Self {
            neighbours: vec![[None, None]; n],
            sets: UnionFind::new(n),
            joined: 0,
        }
    }

    fn degree(&self, v: u32) -> usize {
        self.neighbours[v as usize].iter().flatten().count()
    }

    fn is_complete(&self) -> bool {
        self.joined + 1 >= self.neighbours.len()
    }

    /// Accept edge `a`–`b` unless it would create a branch or a cycle.
    fn try_link(&mut self, a: u32, b: u32) -> bool {
        if self.degree(a) >= 2 || self.degree(b) >= 2 {
            return false;
        }
        if !self.sets.union(a, b) {
            return false;
        }
        self.attach(a, b);
        self.attach(b, a);
        self.joined += 1;
        true
    }

    fn attach(&mut self, v: u32, neighbour: u32) {
        if let Some(slot) = self.neighbours[v as usize].iter_mut().find(|s| s.is_none()) {
            *slot = Some(neighbour);
        }
    }

    fn link_all(&mut self, edges: impl IntoIterator<Item = (u32, u32)>) {
        for (a, b) in edges {
            if self.is_complete() {
                break;
            }
            self.try_link(a, b);
        }
    }

    /// Vertices that can still take another edge, in index order.
    fn endpoints(&self) -> Vec<u32> {
        (0..self.neighbours.len())
            .map(index)
            .filter(|&v| self.degree(v) < 2)
            .collect()
    }

    /// Walk the completed path from its lower-index endpoint.
    fn into_path(self) -> Vec<usize> {
        let n = self.neighbours.len();
        let Some(start) = (0..n).find(|&v| self.degree(index(v)) < 2) else {
            return Vec::new();
        };

        let mut order = Vec::with_capacity(n);
        let mut previous: Option<u32> = None;
        let mut current = index(start);
        loop {
            order.push(current as usize);
            let next = self.neighbours[current as usize]
                .iter()
                .flatten()
                .copied()
                .find(|&v| Some(v) != previous);
            match next {
                Some(v) if order.len() < n => {
                    previous = Some(current);
                    current = v;
                }
                _ => break,
            }
        }
        order
    }
}
