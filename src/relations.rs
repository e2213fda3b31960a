//! Pairwise distance/bearing graph between regions.
//!
//! Every unordered pair is evaluated exactly once and stored in a dense
//! triangular array indexed by the regions' store positions. The reverse
//! direction of a pair is derived on lookup rather than stored.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use geo::Point;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::error::GeometryError;
use crate::region::RegionStore;

/// Distance and bearing from one region to another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelationEdge {
    /// Minimum boundary separation, in source units.
    pub distance: f64,
    /// Bearing in radians, in `[0, 2π)`.
    pub direction: f64,
}

impl RelationEdge {
    /// The same relation seen from the other end.
    pub fn reversed(self) -> Self {
        Self {
            distance: self.distance,
            direction: opposite_bearing(self.direction),
        }
    }
}

/// Bearing from `from` to `to`, normalized into `[0, 2π)`.
///
/// Coincident points have bearing 0. `atan2` alone would return 0 or π
/// depending on the sign of zero in the deltas.
pub fn bearing(from: Point<f64>, to: Point<f64>) -> f64 {
    let dx = to.x() - from.x();
    let dy = to.y() - from.y();
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    let direction = dy.atan2(dx);
    let direction = if direction < 0.0 { direction + TAU } else { direction };
    // -ε + 2π rounds up to 2π
    if direction >= TAU {
        0.0
    } else {
        direction
    }
}

/// `(direction + π) mod 2π`, kept inside `[0, 2π)`.
pub fn opposite_bearing(direction: f64) -> f64 {
    let reversed = if direction >= PI {
        direction - PI
    } else {
        direction + PI
    };
    if reversed >= TAU {
        0.0
    } else {
        reversed
    }
}

/// Complete symmetric relation graph, read-only once built.
#[derive(Clone, Debug)]
pub struct RelationGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major upper triangle: entry for (i, j), i < j, is the relation i -> j.
    pairs: Vec<RelationEdge>,
}

impl RelationGraph {
    /// Number of regions.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Region ids in graph order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of distinct geometric evaluations stored, N·(N−1)/2.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Number of directed entries, N·(N−1).
    pub fn directed_len(&self) -> usize {
        self.pairs.len() * 2
    }

    /// Relation between two regions by index. `None` for `src == dst` or out of range.
    pub fn edge_at(&self, src: usize, dst: usize) -> Option<RelationEdge> {
        let n = self.ids.len();
        if src == dst || src >= n || dst >= n {
            return None;
        }
        if src < dst {
            Some(self.pairs[pair_index(n, src, dst)])
        } else {
            Some(self.pairs[pair_index(n, dst, src)].reversed())
        }
    }

    /// Relation between two regions by id.
    pub fn edge(&self, src: &str, dst: &str) -> Option<RelationEdge> {
        self.edge_at(*self.index.get(src)?, *self.index.get(dst)?)
    }

    /// All relations of one source region, in graph order of destinations.
    pub fn neighbors(&self, src: usize) -> impl Iterator<Item = (&str, RelationEdge)> + '_ {
        self.ids
            .iter()
            .enumerate()
            .filter_map(move |(dst, id)| self.edge_at(src, dst).map(|e| (id.as_str(), e)))
    }

    /// Every directed entry as `(src, dst, edge)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, RelationEdge)> + '_ {
        self.ids.iter().enumerate().flat_map(move |(src, src_id)| {
            self.neighbors(src)
                .map(move |(dst_id, edge)| (src_id.as_str(), dst_id, edge))
        })
    }
}

/// Offset of pair (i, j), i < j, in the row-major upper triangle of an n×n matrix.
fn pair_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    i * (2 * n - i - 1) / 2 + (j - i - 1)
}

/// Builds a [`RelationGraph`] from a region store.
pub struct RelationGraphBuilder<'a> {
    store: &'a RegionStore,
    parallel: bool,
}

impl<'a> RelationGraphBuilder<'a> {
    pub fn new(store: &'a RegionStore) -> Self {
        Self {
            store,
            parallel: true,
        }
    }

    /// Evaluate pairs on the rayon pool (default) or on the calling thread.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Compute every pair. Any invalid geometry aborts the whole build.
    pub fn build(self) -> Result<RelationGraph, GeometryError> {
        let regions = self.store.regions();
        let n = regions.len();

        let centroids = regions
            .iter()
            .map(|r| r.validated_centroid())
            .collect::<Result<Vec<_>, _>>()?;

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        debug!(regions = n, pairs = pairs.len(), "evaluating region pairs");

        let evaluate = |&(i, j): &(usize, usize)| {
            let edge = RelationEdge {
                distance: regions[i].distance_to(&regions[j]),
                direction: bearing(centroids[i], centroids[j]),
            };
            trace!(
                src = %regions[i].id,
                dst = %regions[j].id,
                distance = edge.distance,
                direction = edge.direction,
                "relation"
            );
            edge
        };

        // Both paths preserve pair order, so the triangle layout is identical.
        let edges: Vec<RelationEdge> = if self.parallel {
            pairs.par_iter().map(evaluate).collect()
        } else {
            pairs.iter().map(evaluate).collect()
        };

        info!(
            regions = n,
            directed_entries = edges.len() * 2,
            "relation graph complete"
        );

        let ids: Vec<String> = regions.iter().map(|r| r.id.clone()).collect();
        let index = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Ok(RelationGraph {
            ids,
            index,
            pairs: edges,
        })
    }
}
