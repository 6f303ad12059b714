use plotters::prelude::*;
use std::path::PathBuf;

use crate::drawing::{CellPolygon, Marker, Polyline, Rgb};
use crate::error::{Error, Result};
use crate::grid::{GridBounds, LatLon};
use crate::traits::MapSink;

/// Rasterises the danger map to a PNG in plain lon/lat axes.
/// Geometry is buffered and drawn in one go by `finish`.
pub struct PngSink {
    path: PathBuf,
    extent: GridBounds,
    size: (u32, u32),
    axes: bool,
    lines: Vec<Polyline>,
    markers: Vec<Marker>,
    polygons: Vec<CellPolygon>,
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn xy(p: &LatLon) -> (f64, f64) {
    (p.lon, p.lat)
}

impl PngSink {
    pub fn new(path: PathBuf, extent: GridBounds, size: (u32, u32)) -> Self {
        Self {
            path,
            extent,
            size,
            axes: true,
            lines: vec![],
            markers: vec![],
            polygons: vec![],
        }
    }

    /// Axis labels need a system font; headless hosts may not have one.
    pub fn with_axes(mut self, axes: bool) -> Self {
        self.axes = axes;
        self
    }

    fn plot(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20_i32)
            .x_label_area_size(40_i32)
            .y_label_area_size(60_i32)
            .build_cartesian_2d(
                self.extent.min_lon..self.extent.max_lon,
                self.extent.min_lat..self.extent.max_lat,
            )?;

        if self.axes {
            chart
                .configure_mesh()
                .x_desc("Longitude")
                .y_desc("Latitude")
                .disable_x_mesh()
                .disable_y_mesh()
                .draw()?;
        }

        chart.draw_series(self.lines.iter().map(|line| {
            PathElement::new(
                line.points.iter().map(xy).collect::<Vec<_>>(),
                rgb(line.color).stroke_width(line.weight.round().max(1.0) as u32),
            )
        }))?;

        chart.draw_series(
            self.markers
                .iter()
                .map(|m| Circle::new(xy(&m.at), 4_i32, rgb(m.color).filled())),
        )?;

        // cells go on top, translucent, the same way the HTML map layers them
        chart.draw_series(self.polygons.iter().map(|p| {
            Polygon::new(
                p.corners.iter().map(xy).collect::<Vec<_>>(),
                rgb(p.fill).mix(p.opacity).filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }
}

impl MapSink for PngSink {
    fn polyline(&mut self, line: &Polyline) -> Result<()> {
        self.lines.push(line.clone());
        Ok(())
    }

    fn marker(&mut self, marker: &Marker) -> Result<()> {
        self.markers.push(marker.clone());
        Ok(())
    }

    fn polygon(&mut self, polygon: &CellPolygon) -> Result<()> {
        self.polygons.push(polygon.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.plot().map_err(|e| Error::Render(e.to_string()))?;
        log::info!("map rendered to {}", self.path.display());
        Ok(())
    }
}
