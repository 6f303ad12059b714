//! One run: grid, three passes, classification, snapshot, map.

use std::path::Path;

use crate::aggregate::{AggregateStats, Aggregator};
use crate::classify::{classify_grid, TierCounts};
use crate::config::{Config, MapSettings};
use crate::drawing::{CellPolygon, Drawing};
use crate::error::{Error, Result};
use crate::geojson_sink::{GeoJsonSink, MapFormat};
use crate::grid::{Grid, GridBounds};
use crate::plotting::PngSink;
use crate::snapshot::GridSnapshot;
use crate::spatial::build_index;
use crate::traits::{MapSink, RideSource};

/// Opacity of cell fills on the map
const CELL_OPACITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub cells: usize,
    pub aggregate: AggregateStats,
    pub tiers: TierCounts,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub grid: Grid,
    pub snapshot: GridSnapshot,
    pub drawing: Drawing,
    pub stats: RunStats,
}

pub struct Pipeline {
    config: Config,
    progress: bool,
}

impl Pipeline {
    /// Fails on an invalid configuration, before anything is read.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build_grid(&self) -> Result<Grid> {
        let g = &self.config.grid;
        Grid::build(g.bounds(), g.lat_step, g.lon_step)
    }

    /// Runs every stage. The snapshot is written when `output.snapshot` is
    /// set; the map is drawn when a sink is given.
    pub fn run(&self, source: &mut dyn RideSource, sink: Option<&mut dyn MapSink>) -> Result<RunReport> {
        let mut grid = self.build_grid()?;
        let index = build_index(self.config.index.kind, &grid);
        log::info!(
            "grid has {}x{} cells, {:?} index",
            grid.rows(),
            grid.cols(),
            self.config.index.kind
        );

        let filter = self.config.window.filter()?;
        log::info!(
            "rides from id {} since {}",
            filter.min_ride_id,
            filter.since
        );

        let mut aggregator = Aggregator::new(&mut grid, index.as_ref(), self.config.scoring)
            .with_progress(self.progress);
        let positions = source.positions(&filter)?;
        aggregator.ingest_positions(&positions)?;
        let proximity = source.proximity_events(&filter)?;
        aggregator.score_proximity(&proximity)?;
        let crashes = source.crash_events(&filter)?;
        aggregator.score_crashes(&crashes)?;
        let (drawing, aggregate) = aggregator.finish();

        let tiers = classify_grid(&mut grid, &self.config.tiers);
        let snapshot = GridSnapshot::from_grid(&grid);
        if let Some(path) = &self.config.output.snapshot {
            snapshot.save(path)?;
        }

        if let Some(sink) = sink {
            draw(&drawing, &grid, sink)?;
        }

        let stats = RunStats {
            cells: grid.len(),
            aggregate,
            tiers,
        };
        Ok(RunReport {
            grid,
            snapshot,
            drawing,
            stats,
        })
    }
}

/// Hands everything to the sink in drawing order: ride traces, proximity
/// links, crash markers, then the cells.
pub fn draw(drawing: &Drawing, grid: &Grid, sink: &mut dyn MapSink) -> Result<()> {
    for line in drawing.traces.iter().chain(&drawing.proximity_links) {
        sink.polyline(line)?;
    }
    for marker in &drawing.crash_markers {
        sink.marker(marker)?;
    }
    for cell in grid.cells() {
        sink.polygon(&CellPolygon {
            corners: cell.corners,
            fill: cell.tier.color(),
            opacity: CELL_OPACITY,
        })?;
    }
    sink.finish()
}

/// Picks the sink from the file extension. `extent` frames the PNG.
pub fn sink_for_path(path: &Path, map: &MapSettings, extent: GridBounds) -> Result<Box<dyn MapSink>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let sink: Box<dyn MapSink> = match ext.as_deref() {
        Some("html") | Some("htm") => Box::new(GeoJsonSink::new(path.to_path_buf(), MapFormat::Html, *map)),
        Some("geojson") | Some("json") => Box::new(GeoJsonSink::new(path.to_path_buf(), MapFormat::GeoJson, *map)),
        Some("png") => Box::new(PngSink::new(path.to_path_buf(), extent, (map.width, map.height))),
        _ => {
            return Err(Error::Config(format!(
                "cannot tell the map format of {}; use .html, .geojson or .png",
                path.display()
            )))
        }
    };
    Ok(sink)
}
