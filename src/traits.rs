use crate::drawing::{CellPolygon, Marker, Polyline};
use crate::error::Result;
use crate::grid::LatLon;
use crate::records::{CrashEvent, PositionRecord, ProximityEvent, RecordFilter};

/// Describes a lookup from a geographic point to a cell of the grid.
/// Implementations index the cell centers once and answer with the
/// row-major index of the cell whose center is geodesically nearest.
///
/// When two centers are at the same distance the one that comes first in
/// row-major order wins, so every implementation answers the same way.
pub trait NearestCell {
    /// None only when the index holds no cells at all
    fn nearest(&self, point: LatLon) -> Option<usize>;
}

/// Describes where ride data comes from.
///
/// Every query keeps the records with `rideId >= filter.min_ride_id` and
/// `timestamp >= filter.since`, sorted by `(rideId, timestamp)`.
/// Whatever connection or file handle a query needs is acquired and
/// released inside the call.
pub trait RideSource {
    fn positions(&mut self, filter: &RecordFilter) -> Result<Vec<PositionRecord>>;
    fn proximity_events(&mut self, filter: &RecordFilter) -> Result<Vec<ProximityEvent>>;
    fn crash_events(&mut self, filter: &RecordFilter) -> Result<Vec<CrashEvent>>;
}

/// Describes something that can draw the danger map.
/// The pipeline hands it geometry in drawing order and calls `finish` once
/// at the end; nothing reads back what was rendered.
pub trait MapSink {
    fn polyline(&mut self, line: &Polyline) -> Result<()>;
    fn marker(&mut self, marker: &Marker) -> Result<()>;
    fn polygon(&mut self, polygon: &CellPolygon) -> Result<()>;

    /// Writes the artifact out
    fn finish(&mut self) -> Result<()>;
}
