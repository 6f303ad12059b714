//! Attributing the three ride streams to grid cells.
//!
//! Three passes run one after the other: positions mark cells as visited,
//! then proximity readings and crashes add to the score of the cell their
//! ride was in at the time. Events of rides without positions are dropped.

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::ScoringSettings;
use crate::drawing::{Drawing, Marker, Polyline, Rgb};
use crate::error::{Error, Result};
use crate::grid::{Grid, LatLon};
use crate::records::{CrashEvent, PositionRecord, ProximityEvent, Rides};
use crate::temporal;
use crate::traits::NearestCell;

/// What the passes saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    pub rides: usize,
    pub positions: usize,
    pub positions_dropped: usize,
    pub proximity_scored: usize,
    pub proximity_dropped: usize,
    pub crashes_scored: usize,
    pub crashes_dropped: usize,
}

/// Score added by one proximity reading: one point per started bucket
/// below the ceiling, never negative.
pub fn proximity_score(distance: f64, scoring: &ScoringSettings) -> f64 {
    ((scoring.proximity_ceiling - distance) / scoring.proximity_bucket)
        .ceil()
        .max(0.0)
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed}] {msg:12} {wide_bar} {pos}/{len} ({eta})") {
        bar.set_style(style);
    }
    bar
}

pub struct Aggregator<'a> {
    grid: &'a mut Grid,
    index: &'a dyn NearestCell,
    scoring: ScoringSettings,
    rides: Rides,
    drawing: Drawing,
    stats: AggregateStats,
    progress: bool,
}

impl<'a> Aggregator<'a> {
    pub fn new(grid: &'a mut Grid, index: &'a dyn NearestCell, scoring: ScoringSettings) -> Self {
        Self {
            grid,
            index,
            scoring,
            rides: Rides::default(),
            drawing: Drawing::default(),
            stats: AggregateStats::default(),
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn cell_for(&self, lat: f64, lon: f64) -> Result<usize> {
        self.index
            .nearest(LatLon::new(lat, lon))
            .ok_or(Error::NoCell { lat, lon })
    }

    /// Pass 1: group positions by ride and mark the cells they fall in.
    /// Samples with unusable coordinates are dropped.
    pub fn ingest_positions(&mut self, positions: &[PositionRecord]) -> Result<()> {
        let bar = progress_bar(positions.len(), self.progress);
        bar.set_message("positions");
        let mut dropped = 0;
        for record in positions {
            bar.inc(1);
            if !record.has_valid_coordinates() {
                log::debug!(
                    "ride {} at {}: bad coordinates ({}, {})",
                    record.ride_id,
                    record.timestamp,
                    record.latitude,
                    record.longitude
                );
                dropped += 1;
                continue;
            }
            self.rides.push(record);
            let i = self.cell_for(record.latitude, record.longitude)?;
            self.grid.cell_mut(i).visit(record.ride_id);
        }
        bar.finish_and_clear();

        if dropped > 0 {
            log::warn!("dropped {} positions with invalid coordinates", dropped);
        }
        self.stats.positions += positions.len() - dropped;
        self.stats.positions_dropped += dropped;
        self.stats.rides = self.rides.len();
        log::info!(
            "ingested {} positions from {} rides",
            positions.len() - dropped,
            self.rides.len()
        );
        Ok(())
    }

    /// Pass 2: add proximity readings to the cell of the closest sample.
    pub fn score_proximity(&mut self, events: &[ProximityEvent]) -> Result<()> {
        let bar = progress_bar(events.len(), self.progress);
        bar.set_message("proximity");
        for event in events {
            bar.inc(1);
            let Some(samples) = self.rides.samples(event.ride_id) else {
                self.stats.proximity_dropped += 1;
                continue;
            };
            let pair = temporal::closest_two(samples, event.timestamp);
            let Some(first) = pair.first() else {
                self.stats.proximity_dropped += 1;
                continue;
            };
            if let [a, b] = pair.as_slice() {
                self.drawing.proximity_links.push(Polyline::proximity(
                    LatLon::new(a.latitude, a.longitude),
                    LatLon::new(b.latitude, b.longitude),
                ));
            }

            let i = self.cell_for(first.latitude, first.longitude)?;
            let score = proximity_score(event.distance, &self.scoring);
            let cell = self.grid.cell_mut(i);
            cell.score += score;
            log::debug!(
                "ride {} proximity {} -> cell ({}, {}) +{}",
                event.ride_id,
                event.distance,
                cell.row,
                cell.col,
                score
            );
            self.stats.proximity_scored += 1;
        }
        bar.finish_and_clear();

        if self.stats.proximity_dropped > 0 {
            log::warn!(
                "dropped {} proximity events of rides without positions",
                self.stats.proximity_dropped
            );
        }
        log::info!("scored {} proximity events", self.stats.proximity_scored);
        Ok(())
    }

    /// Pass 3: add the crash weight to the cell of the closest sample.
    pub fn score_crashes(&mut self, events: &[CrashEvent]) -> Result<()> {
        let bar = progress_bar(events.len(), self.progress);
        bar.set_message("crashes");
        for event in events {
            bar.inc(1);
            let closest = self
                .rides
                .samples(event.ride_id)
                .and_then(|samples| temporal::closest(samples, event.timestamp));
            let Some(sample) = closest else {
                self.stats.crashes_dropped += 1;
                continue;
            };

            let at = LatLon::new(sample.latitude, sample.longitude);
            self.drawing.crash_markers.push(Marker {
                at,
                label: format!(
                    "Crash at {}: {}, {}, {}",
                    event.timestamp, event.roll, event.pitch, event.yaw
                ),
                color: Rgb::RED,
            });

            let i = self.cell_for(sample.latitude, sample.longitude)?;
            self.grid.cell_mut(i).score += self.scoring.crash_weight;
            self.stats.crashes_scored += 1;
        }
        bar.finish_and_clear();

        if self.stats.crashes_dropped > 0 {
            log::warn!(
                "dropped {} crash events of rides without positions",
                self.stats.crashes_dropped
            );
        }
        log::info!("scored {} crash events", self.stats.crashes_scored);
        Ok(())
    }

    /// Ride traces plus the event geometry collected by the passes.
    pub fn finish(self) -> (Drawing, AggregateStats) {
        let mut drawing = self.drawing;
        drawing.traces = self
            .rides
            .iter()
            .map(|(_, samples)| {
                Polyline::trace(
                    samples
                        .iter()
                        .map(|s| LatLon::new(s.latitude, s.longitude))
                        .collect(),
                )
            })
            .collect();
        (drawing, self.stats)
    }
}
