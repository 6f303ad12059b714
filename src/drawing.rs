//! Geometry handed to a [`MapSink`](crate::traits::MapSink).

use crate::grid::LatLon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const GREY: Rgb = Rgb(128, 128, 128);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
    pub const ORANGE: Rgb = Rgb(255, 165, 0);

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<LatLon>,
    pub color: Rgb,
    pub weight: f64,
}

impl Polyline {
    /// A ride's trajectory
    pub fn trace(points: Vec<LatLon>) -> Self {
        Self {
            points,
            color: Rgb::BLUE,
            weight: 2.5,
        }
    }

    /// Link between the two samples of the ride closest in time to a
    /// proximity event
    pub fn proximity(a: LatLon, b: LatLon) -> Self {
        Self {
            points: vec![a, b],
            color: Rgb::RED,
            weight: 3.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub at: LatLon,
    pub label: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellPolygon {
    /// North-west, north-east, south-east, south-west
    pub corners: [LatLon; 4],
    pub fill: Rgb,
    pub opacity: f64,
}

/// Geometry gathered while aggregating, in the order it is drawn.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Drawing {
    pub traces: Vec<Polyline>,
    pub proximity_links: Vec<Polyline>,
    pub crash_markers: Vec<Marker>,
}
