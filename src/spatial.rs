//! Nearest-center lookup over the grid.
//!
//! [`LinearScan`] is the reference: a scan over every center with the
//! geodesic distance on the WGS84 ellipsoid. [`RTreeIndex`] gets the same
//! answer faster on big grids by walking an R* tree in a local planar
//! projection and only measuring geodesic distance for the centers the
//! tree hands back.

use geo::GeodesicDistance;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::config::IndexKind;
use crate::grid::{Grid, LatLon};
use crate::traits::NearestCell;

pub struct LinearScan {
    centers: Vec<geo::Point<f64>>,
}

impl LinearScan {
    pub fn new(grid: &Grid) -> Self {
        Self {
            centers: grid.centers().map(|c| c.point()).collect(),
        }
    }
}

impl NearestCell for LinearScan {
    fn nearest(&self, point: LatLon) -> Option<usize> {
        let point = point.point();
        let mut best: Option<(usize, f64)> = None;
        for (i, center) in self.centers.iter().enumerate() {
            let d = point.geodesic_distance(center);
            // strict comparison keeps the first center on ties
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

// metres per degree near the reference latitude
const METERS_PER_DEG_LAT: f64 = 110_574.0;
const METERS_PER_DEG_LON_EQUATOR: f64 = 111_320.0;

// planar distances are within a few per mille of geodesic ones at city
// scale; candidates are walked until they are this much further than the
// best geodesic match
const PROJECTION_SLACK: f64 = 1.05;
const PROJECTION_SLACK_METERS: f64 = 1.0;

#[derive(Debug, Clone)]
struct ProjectedCenter {
    xy: [f64; 2],
    index: usize,
}

impl RTreeObject for ProjectedCenter {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xy)
    }
}

impl PointDistance for ProjectedCenter {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.xy[0] - point[0];
        let dy = self.xy[1] - point[1];
        dx * dx + dy * dy
    }
}

pub struct RTreeIndex {
    tree: RTree<ProjectedCenter>,
    centers: Vec<geo::Point<f64>>,
    meters_per_deg_lon: f64,
}

impl RTreeIndex {
    pub fn new(grid: &Grid) -> Self {
        let bounds = grid.bounds();
        let reference_lat = (bounds.min_lat + bounds.max_lat) / 2.0;
        let meters_per_deg_lon = METERS_PER_DEG_LON_EQUATOR * reference_lat.to_radians().cos();

        let centers: Vec<_> = grid.centers().collect();
        let projected = centers
            .iter()
            .enumerate()
            .map(|(index, c)| ProjectedCenter {
                xy: project(*c, meters_per_deg_lon),
                index,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(projected),
            centers: centers.iter().map(|c| c.point()).collect(),
            meters_per_deg_lon,
        }
    }
}

fn project(p: LatLon, meters_per_deg_lon: f64) -> [f64; 2] {
    [p.lon * meters_per_deg_lon, p.lat * METERS_PER_DEG_LAT]
}

impl NearestCell for RTreeIndex {
    fn nearest(&self, point: LatLon) -> Option<usize> {
        let query = project(point, self.meters_per_deg_lon);
        let geo_point = point.point();
        let mut best: Option<(usize, f64)> = None;

        for (candidate, planar_2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            if let Some((_, best_d)) = best {
                if planar_2.sqrt() > best_d * PROJECTION_SLACK + PROJECTION_SLACK_METERS {
                    break;
                }
            }
            let d = geo_point.geodesic_distance(&self.centers[candidate.index]);
            let better = match best {
                None => true,
                Some((best_i, best_d)) => d < best_d || (d == best_d && candidate.index < best_i),
            };
            if better {
                best = Some((candidate.index, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Builds the configured index over the grid's centers.
pub fn build_index(kind: IndexKind, grid: &Grid) -> Box<dyn NearestCell> {
    match kind {
        IndexKind::Linear => Box::new(LinearScan::new(grid)),
        IndexKind::Rtree => Box::new(RTreeIndex::new(grid)),
    }
}
