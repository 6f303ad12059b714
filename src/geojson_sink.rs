//! GeoJSON and Leaflet HTML export of the danger map.
//!
//! Styling uses simplestyle property names so the collection also renders
//! sensibly in viewers that know nothing about this crate.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

use crate::config::MapSettings;
use crate::drawing::{CellPolygon, Marker, Polyline};
use crate::error::Result;
use crate::grid::LatLon;
use crate::traits::MapSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    GeoJson,
    Html,
}

pub struct GeoJsonSink {
    path: PathBuf,
    format: MapFormat,
    view: MapSettings,
    features: Vec<Feature>,
}

fn line_string(points: &[LatLon]) -> geo::LineString<f64> {
    points.iter().map(|p| geo::Coordinate::from(*p)).collect()
}

fn feature(geometry: Value, properties: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties,
        foreign_members: None,
    }
}

impl GeoJsonSink {
    pub fn new(path: PathBuf, format: MapFormat, view: MapSettings) -> Self {
        Self {
            path,
            format,
            view,
            features: Vec::new(),
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn collection(&self) -> GeoJson {
        GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: self.features.clone(),
            foreign_members: None,
        })
    }

    fn html(&self) -> String {
        HTML_TEMPLATE
            .replace("{{CENTER_LAT}}", &self.view.center_lat.to_string())
            .replace("{{CENTER_LON}}", &self.view.center_lon.to_string())
            .replace("{{ZOOM}}", &self.view.zoom.to_string())
            .replace("{{GEOJSON}}", &self.collection().to_string())
    }
}

impl MapSink for GeoJsonSink {
    fn polyline(&mut self, line: &Polyline) -> Result<()> {
        let geometry = Value::from(&line_string(&line.points));
        self.features.push(feature(
            geometry,
            json!({
                "stroke": line.color.hex(),
                "stroke-width": line.weight,
                "stroke-opacity": 1.0,
            }),
        ));
        Ok(())
    }

    fn marker(&mut self, marker: &Marker) -> Result<()> {
        let geometry = Value::from(&marker.at.point());
        self.features.push(feature(
            geometry,
            json!({
                "marker-color": marker.color.hex(),
                "popup": marker.label,
            }),
        ));
        Ok(())
    }

    fn polygon(&mut self, polygon: &CellPolygon) -> Result<()> {
        let ring = line_string(&polygon.corners);
        let geometry = Value::from(&geo::Polygon::new(ring, vec![]));
        self.features.push(feature(
            geometry,
            json!({
                "stroke": polygon.fill.hex(),
                "fill": polygon.fill.hex(),
                "fill-opacity": polygon.opacity,
            }),
        ));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let text = match self.format {
            MapFormat::GeoJson => self.collection().to_string(),
            MapFormat::Html => self.html(),
        };
        fs::write(&self.path, text)?;
        log::info!(
            "map with {} features saved as {}",
            self.features.len(),
            self.path.display()
        );
        Ok(())
    }
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>Danger levels</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map').setView([{{CENTER_LAT}}, {{CENTER_LON}}], {{ZOOM}});
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
var data = {{GEOJSON}};
L.geoJSON(data, {
  style: function (f) {
    var p = f.properties || {};
    return {
      color: p['stroke'],
      weight: p['stroke-width'] || 1,
      opacity: p['stroke-opacity'] || 1,
      fill: 'fill' in p,
      fillColor: p['fill'],
      fillOpacity: p['fill-opacity'] || 0
    };
  },
  onEachFeature: function (f, layer) {
    if (f.properties && f.properties.popup) {
      layer.bindPopup(f.properties.popup);
    }
  }
}).addTo(map);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod test {
    use super::*;
    use crate::drawing::Rgb;

    fn sink(format: MapFormat, path: PathBuf) -> GeoJsonSink {
        GeoJsonSink::new(path, format, MapSettings::default())
    }

    fn square() -> CellPolygon {
        CellPolygon {
            corners: [
                LatLon::new(1.0, 0.0),
                LatLon::new(1.0, 1.0),
                LatLon::new(0.0, 1.0),
                LatLon::new(0.0, 0.0),
            ],
            fill: Rgb::ORANGE,
            opacity: 0.3,
        }
    }

    #[test]
    fn test_features_are_styled() {
        let mut s = sink(MapFormat::GeoJson, PathBuf::from("unused.geojson"));
        s.polyline(&Polyline::trace(vec![LatLon::new(45.7, 4.8), LatLon::new(45.71, 4.81)]))
            .unwrap();
        s.marker(&Marker {
            at: LatLon::new(45.7, 4.8),
            label: "Crash".into(),
            color: Rgb::RED,
        })
        .unwrap();
        s.polygon(&square()).unwrap();

        let features = s.features();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].property("stroke").unwrap(), "#0000ff");
        assert_eq!(features[1].property("popup").unwrap(), "Crash");
        assert_eq!(features[2].property("fill").unwrap(), "#ffa500");

        // geojson positions are lon, lat
        match &features[1].geometry.as_ref().unwrap().value {
            Value::Point(p) => assert_eq!(p, &vec![4.8, 45.7]),
            other => panic!("unexpected geometry {:?}", other),
        }
        match &features[2].geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => assert_eq!(rings[0].len(), 5),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_finish_writes_files() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("map.geojson");
        let mut s = sink(MapFormat::GeoJson, path.clone());
        s.polygon(&square()).unwrap();
        s.finish().unwrap();
        let parsed: GeoJson = fs::read_to_string(&path).unwrap().parse().unwrap();
        match parsed {
            GeoJson::FeatureCollection(fc) => assert_eq!(fc.features.len(), 1),
            _ => panic!("expected a feature collection"),
        }

        let path = dir.path().join("map.html");
        let mut s = sink(MapFormat::Html, path.clone());
        s.polygon(&square()).unwrap();
        s.finish().unwrap();
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("setView([45.75, 4.85], 12)"));
        assert!(html.contains("\"FeatureCollection\""));
        assert!(!html.contains("{{"));
    }
}
