//! Run configuration read from a TOML file.
//!
//! Every section has defaults matching the Lyon deployment, so an empty file
//! is a valid configuration. [`Config::validate`] must pass before any ride
//! data is fetched.

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::grid::{self, GridBounds};
use crate::records::{parse_timestamp, RecordFilter, RideId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub tiers: TierSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub map: MapSettings,
}

/// Bounding box and step sizes, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub lat_step: f64,
    pub lon_step: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            min_lat: 45.65,
            max_lat: 45.83,
            min_lon: 4.75,
            max_lon: 5.00,
            lat_step: 0.0027,
            lon_step: 0.0036,
        }
    }
}

impl GridSettings {
    pub fn bounds(&self) -> GridBounds {
        GridBounds {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lon: self.min_lon,
            max_lon: self.max_lon,
        }
    }

    /// Area the grid will cover, overhang included, without building it.
    pub fn extent(&self) -> Result<GridBounds> {
        let (rows, cols) = grid::dimensions(self.bounds(), self.lat_step, self.lon_step)?;
        Ok(grid::extent(self.bounds(), self.lat_step, self.lon_step, rows, cols))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_min_ride_id")]
    pub min_ride_id: RideId,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// End of the window. Local time at startup when absent.
    #[serde(default)]
    pub now: Option<String>,
}

fn default_min_ride_id() -> RideId {
    3
}

fn default_lookback_days() -> u32 {
    14
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            min_ride_id: default_min_ride_id(),
            lookback_days: default_lookback_days(),
            now: None,
        }
    }
}

impl WindowSettings {
    fn end(&self) -> Result<NaiveDateTime> {
        match &self.now {
            Some(s) => parse_timestamp(s)
                .ok_or_else(|| Error::Config(format!("window.now is not a timestamp: {}", s))),
            None => Ok(Local::now().naive_local()),
        }
    }

    /// The `(minRideId, since)` filter handed to every source query.
    pub fn filter(&self) -> Result<RecordFilter> {
        let end = self.end()?;
        let since = end
            .checked_sub_signed(Duration::days(i64::from(self.lookback_days)))
            .ok_or_else(|| {
                Error::Config(format!(
                    "window.lookback_days = {} reaches before the earliest representable date",
                    self.lookback_days
                ))
            })?;
        Ok(RecordFilter {
            min_ride_id: self.min_ride_id,
            since,
        })
    }
}

/// One tier boundary: a danger value enters the tier when it is above
/// `value` (or equal to it, when `inclusive`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    #[serde(default)]
    pub inclusive: bool,
}

impl Threshold {
    pub fn above(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }

    pub fn at_least(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn is_met_by(&self, danger: f64) -> bool {
        if self.inclusive {
            danger >= self.value
        } else {
            danger > self.value
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSettings {
    pub elevated: Threshold,
    pub high: Threshold,
    pub severe: Threshold,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            elevated: Threshold::above(2.0),
            high: Threshold::at_least(5.0),
            severe: Threshold::at_least(8.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    /// Proximity distance at or beyond which a reading adds nothing.
    pub proximity_ceiling: f64,
    /// Width of one score point, in the sensor's distance unit.
    pub proximity_bucket: f64,
    pub crash_weight: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            proximity_ceiling: 1000.0,
            proximity_bucket: 100.0,
            crash_weight: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Linear,
    Rtree,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub kind: IndexKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub positions: PathBuf,
    pub proximity: PathBuf,
    pub crashes: PathBuf,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            positions: PathBuf::from("data/positions.csv"),
            proximity: PathBuf::from("data/car_distances.csv"),
            crashes: PathBuf::from("data/crashes.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// `.html`, `.geojson`/`.json` or `.png`
    pub map: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            map: Some(PathBuf::from("map_with_danger_levels.html")),
            snapshot: Some(PathBuf::from("danger_levels.grid")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center_lat: 45.75,
            center_lon: 4.85,
            zoom: 12,
            width: 1024,
            height: 768,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would build a degenerate grid or a
    /// non-monotonic tier ladder.
    pub fn validate(&self) -> Result<()> {
        let g = &self.grid;
        let all = [g.min_lat, g.max_lat, g.min_lon, g.max_lon, g.lat_step, g.lon_step];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("grid values must be finite".into()));
        }
        if g.lat_step <= 0.0 || g.lon_step <= 0.0 {
            return Err(Error::Config(format!(
                "grid steps must be positive, got lat_step={} lon_step={}",
                g.lat_step, g.lon_step
            )));
        }
        if g.min_lat >= g.max_lat || g.min_lon >= g.max_lon {
            return Err(Error::Config(format!(
                "empty bounding box [{}, {}] x [{}, {}]",
                g.min_lat, g.max_lat, g.min_lon, g.max_lon
            )));
        }
        if g.min_lat < -90.0 || g.max_lat > 90.0 || g.min_lon < -180.0 || g.max_lon > 180.0 {
            return Err(Error::Config("bounding box outside WGS84 range".into()));
        }
        grid::dimensions(g.bounds(), g.lat_step, g.lon_step)?;

        let t = &self.tiers;
        for (name, th) in [("elevated", t.elevated), ("high", t.high), ("severe", t.severe)] {
            if !th.value.is_finite() || th.value < 0.0 {
                return Err(Error::Config(format!(
                    "tier threshold {} must be a non-negative number, got {}",
                    name, th.value
                )));
            }
        }
        if !(t.elevated.value < t.high.value && t.high.value < t.severe.value) {
            return Err(Error::Config(format!(
                "tier thresholds must increase: elevated={} high={} severe={}",
                t.elevated.value, t.high.value, t.severe.value
            )));
        }

        let s = &self.scoring;
        if !(s.proximity_bucket.is_finite() && s.proximity_bucket > 0.0) {
            return Err(Error::Config("scoring.proximity_bucket must be positive".into()));
        }
        if !s.proximity_ceiling.is_finite() || !s.crash_weight.is_finite() || s.crash_weight < 0.0 {
            return Err(Error::Config(
                "scoring.proximity_ceiling and scoring.crash_weight must be finite, crash_weight non-negative".into(),
            ));
        }

        self.window.filter()?;
        Ok(())
    }
}
