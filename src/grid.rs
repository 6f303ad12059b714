//! The geographic mesh.
//!
//! A bounding box is cut into `lat_step x lon_step` cells whose origins sit
//! at `min + i * step`, stopping before the max bound the same way a
//! half-open range does. The last row and column are therefore allowed to
//! stick out past the box instead of being clipped.

use geo::Coordinate;
use std::collections::BTreeSet;

use crate::classify::Tier;
use crate::error::{Error, Result};
use crate::records::RideId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Latitude/longitude pair. Kept separate from `geo` types, which are x/y
/// (lon/lat) ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

impl From<LatLon> for Coordinate<f64> {
    fn from(p: LatLon) -> Self {
        Coordinate { x: p.lon, y: p.lat }
    }
}

/// One rectangular unit of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    /// North-west, north-east, south-east, south-west.
    pub corners: [LatLon; 4],
    pub center: LatLon,
    pub score: f64,
    pub tier: Tier,
    pub rides: BTreeSet<RideId>,
}

impl Cell {
    fn new(row: usize, col: usize, lat: f64, lon: f64, lat_step: f64, lon_step: f64) -> Self {
        let north = lat + lat_step;
        let east = lon + lon_step;
        Self {
            row,
            col,
            corners: [
                LatLon::new(north, lon),
                LatLon::new(north, east),
                LatLon::new(lat, east),
                LatLon::new(lat, lon),
            ],
            center: LatLon::new(lat + lat_step / 2.0, lon + lon_step / 2.0),
            score: 0.0,
            tier: Tier::Unvisited,
            rides: BTreeSet::new(),
        }
    }

    pub fn is_visited(&self) -> bool {
        !self.rides.is_empty()
    }

    /// Adds the ride to the visit set. Returns false if it was already there.
    pub fn visit(&mut self, ride_id: RideId) -> bool {
        if self.tier == Tier::Unvisited {
            self.tier = Tier::Visited;
        }
        self.rides.insert(ride_id)
    }

    pub fn polygon(&self) -> geo::Polygon<f64> {
        let ring: Vec<Coordinate<f64>> = self
            .corners
            .iter()
            .chain(std::iter::once(&self.corners[0]))
            .map(|c| (*c).into())
            .collect();
        geo::Polygon::new(geo::LineString::from(ring), vec![])
    }
}

/// Owns every cell, stored row-major. Rows run south to north, columns west
/// to east.
#[derive(Debug, Clone)]
pub struct Grid {
    bounds: GridBounds,
    lat_step: f64,
    lon_step: f64,
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

/// Largest grid a run will build.
pub const MAX_CELLS: usize = 10_000_000;

/// Number of origins in `[min, max)` stepping by `step`, as numpy's `arange`
/// counts them. None when the count does not fit the cell limit.
fn steps(min: f64, max: f64, step: f64) -> Option<usize> {
    let n = ((max - min) / step).ceil().max(0.0);
    (n <= MAX_CELLS as f64).then(|| n as usize)
}

/// `(rows, cols)` of the grid the bounds and steps describe. Fails on
/// non-positive steps, an empty box, or more than [`MAX_CELLS`] cells.
pub fn dimensions(bounds: GridBounds, lat_step: f64, lon_step: f64) -> Result<(usize, usize)> {
    if !(lat_step.is_finite() && lat_step > 0.0 && lon_step.is_finite() && lon_step > 0.0) {
        return Err(Error::Config(format!(
            "grid steps must be positive, got {} x {}",
            lat_step, lon_step
        )));
    }
    let too_many = || {
        Error::Config(format!(
            "steps {} x {} over {:?} give more than {} cells",
            lat_step, lon_step, bounds, MAX_CELLS
        ))
    };
    let rows = steps(bounds.min_lat, bounds.max_lat, lat_step).ok_or_else(too_many)?;
    let cols = steps(bounds.min_lon, bounds.max_lon, lon_step).ok_or_else(too_many)?;
    if rows == 0 || cols == 0 {
        return Err(Error::Config(format!("bounding box {:?} holds no cells", bounds)));
    }
    match rows.checked_mul(cols) {
        Some(n) if n <= MAX_CELLS => Ok((rows, cols)),
        _ => Err(too_many()),
    }
}

/// Area covered by a `rows x cols` grid anchored at the south-west corner of
/// `bounds`, overhang included.
pub fn extent(bounds: GridBounds, lat_step: f64, lon_step: f64, rows: usize, cols: usize) -> GridBounds {
    GridBounds {
        min_lat: bounds.min_lat,
        max_lat: bounds.min_lat + rows as f64 * lat_step,
        min_lon: bounds.min_lon,
        max_lon: bounds.min_lon + cols as f64 * lon_step,
    }
}

impl Grid {
    pub fn build(bounds: GridBounds, lat_step: f64, lon_step: f64) -> Result<Self> {
        let (rows, cols) = dimensions(bounds, lat_step, lon_step)?;

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat = bounds.min_lat + row as f64 * lat_step;
            for col in 0..cols {
                let lon = bounds.min_lon + col as f64 * lon_step;
                cells.push(Cell::new(row, col, lat, lon, lat_step, lon_step));
            }
        }
        log::debug!("built {}x{} grid ({} cells)", rows, cols, cells.len());

        Ok(Self {
            bounds,
            lat_step,
            lon_step,
            rows,
            cols,
            cells,
        })
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Area actually covered by cells, including the overhang of the last
    /// row and column.
    pub fn extent(&self) -> GridBounds {
        extent(self.bounds, self.lat_step, self.lon_step, self.rows, self.cols)
    }

    pub fn steps(&self) -> (f64, f64) {
        (self.lat_step, self.lon_step)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.index_of(row, col).map(|i| &self.cells[i])
    }

    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    /// Exact lookup by center coordinate, the cell's primary key.
    pub fn find_by_center(&self, center: LatLon) -> Option<&Cell> {
        let row = ((center.lat - self.bounds.min_lat) / self.lat_step).floor();
        let col = ((center.lon - self.bounds.min_lon) / self.lon_step).floor();
        if row < 0.0 || col < 0.0 {
            return None;
        }
        self.get(row as usize, col as usize)
            .filter(|cell| cell.center == center)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn centers(&self) -> impl Iterator<Item = LatLon> + '_ {
        self.cells.iter().map(|c| c.center)
    }
}
