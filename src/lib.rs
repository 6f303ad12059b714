//! Danger map of ride data.
//!
//! Position traces, close-pass readings and crash events of bike rides are
//! attributed to the cells of a fixed lat/lon grid. Each cell gets a danger
//! value (score per distinct ride that crossed it) and a tier. The result is
//! drawn as a map and stored as a row/column snapshot for path search.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod drawing;
pub mod error;
pub mod geojson_sink;
pub mod grid;
pub mod pipeline;
pub mod plotting;
pub mod records;
pub mod snapshot;
pub mod source;
pub mod spatial;
pub mod temporal;
pub mod traits;

pub use classify::{Tier, UNVISITED};
pub use config::Config;
pub use error::{Error, Result};
pub use grid::{Cell, Grid, GridBounds, LatLon};
pub use pipeline::{Pipeline, RunReport};
pub use snapshot::GridSnapshot;
pub use traits::{MapSink, NearestCell, RideSource};
