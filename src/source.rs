//! Ride data sources.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::InputSettings;
use crate::error::Result;
use crate::records::{
    filter_and_sort, CrashEvent, PositionRecord, ProximityEvent, RecordFilter, RideRecord,
};
use crate::traits::RideSource;

/// Reads the three streams from CSV exports of the ride tables
/// (`idRide,timeStamp,latitude,longitude`, `idRide,timeStamp,distanceCar`,
/// `idRide,timeStamp,roll,pitch,yaw`).
#[derive(Debug, Clone)]
pub struct CsvSource {
    positions: PathBuf,
    proximity: PathBuf,
    crashes: PathBuf,
}

impl CsvSource {
    pub fn new(input: &InputSettings) -> Self {
        Self {
            positions: input.positions.clone(),
            proximity: input.proximity.clone(),
            crashes: input.crashes.clone(),
        }
    }
}

/// Deserializes every row, then applies the filter and ordering.
pub fn read_records<R, T>(reader: R, filter: &RecordFilter) -> Result<Vec<T>>
where
    R: Read,
    T: DeserializeOwned + RideRecord,
{
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row?);
    }
    Ok(filter_and_sort(records, filter))
}

fn read_file<T>(path: &Path, filter: &RecordFilter) -> Result<Vec<T>>
where
    T: DeserializeOwned + RideRecord,
{
    // the handle is dropped when this returns, on error paths too
    let file = File::open(path)?;
    let records = read_records(file, filter)?;
    log::info!("read {} records from {}", records.len(), path.display());
    Ok(records)
}

impl RideSource for CsvSource {
    fn positions(&mut self, filter: &RecordFilter) -> Result<Vec<PositionRecord>> {
        read_file(&self.positions, filter)
    }

    fn proximity_events(&mut self, filter: &RecordFilter) -> Result<Vec<ProximityEvent>> {
        read_file(&self.proximity, filter)
    }

    fn crash_events(&mut self, filter: &RecordFilter) -> Result<Vec<CrashEvent>> {
        read_file(&self.crashes, filter)
    }
}

/// Holds the streams in memory. Queries honour the same filter and
/// ordering as [`CsvSource`].
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    pub positions: Vec<PositionRecord>,
    pub proximity: Vec<ProximityEvent>,
    pub crashes: Vec<CrashEvent>,
}

impl RideSource for MemorySource {
    fn positions(&mut self, filter: &RecordFilter) -> Result<Vec<PositionRecord>> {
        Ok(filter_and_sort(self.positions.clone(), filter))
    }

    fn proximity_events(&mut self, filter: &RecordFilter) -> Result<Vec<ProximityEvent>> {
        Ok(filter_and_sort(self.proximity.clone(), filter))
    }

    fn crash_events(&mut self, filter: &RecordFilter) -> Result<Vec<CrashEvent>> {
        Ok(filter_and_sort(self.crashes.clone(), filter))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::records::parse_timestamp;

    fn filter() -> RecordFilter {
        RecordFilter {
            min_ride_id: 3,
            since: parse_timestamp("2024-03-01 00:00:00").unwrap(),
        }
    }

    #[test]
    fn test_read_positions() {
        let csv = "idRide,timeStamp,latitude,longitude\n\
                   4,2024-03-02 10:00:10,45.75,4.85\n\
                   4,2024-03-02 10:00:00,45.74,4.84\n\
                   2,2024-03-02 10:00:00,45.70,4.80\n\
                   3,2024-02-02 10:00:00,45.70,4.80\n";
        let records: Vec<PositionRecord> = read_records(csv.as_bytes(), &filter()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latitude, 45.74);
        assert_eq!(records[1].latitude, 45.75);
    }

    #[test]
    fn test_read_proximity_and_crashes() {
        let csv = "idRide, timeStamp, distanceCar\n3, 2024-03-02 10:00:00, 350\n";
        let events: Vec<ProximityEvent> = read_records(csv.as_bytes(), &filter()).unwrap();
        assert_eq!(events[0].distance, 350.0);

        let csv = "ride_id,timestamp,roll,pitch,yaw\n5,2024-03-02T10:00:00Z,1.0,2.0,3.0\n";
        let events: Vec<CrashEvent> = read_records(csv.as_bytes(), &filter()).unwrap();
        assert_eq!(events[0].ride_id, 5);
        assert_eq!(events[0].yaw, 3.0);
    }

    #[test]
    fn test_bad_row_is_an_error() {
        let csv = "idRide,timeStamp,distanceCar\n3,not a time,350\n";
        let result: Result<Vec<ProximityEvent>> = read_records(csv.as_bytes(), &filter());
        assert!(matches!(result, Err(Error::Csv(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut source = CsvSource::new(&InputSettings {
            positions: PathBuf::from("/nonexistent/positions.csv"),
            proximity: PathBuf::from("/nonexistent/proximity.csv"),
            crashes: PathBuf::from("/nonexistent/crashes.csv"),
        });
        assert!(matches!(source.positions(&filter()), Err(Error::Io(_))));
    }

    #[test]
    fn test_memory_source_filters() {
        let t = parse_timestamp("2024-03-02 10:00:00").unwrap();
        let mut source = MemorySource {
            crashes: vec![
                CrashEvent { ride_id: 7, timestamp: t, roll: 0.0, pitch: 0.0, yaw: 0.0 },
                CrashEvent { ride_id: 1, timestamp: t, roll: 0.0, pitch: 0.0, yaw: 0.0 },
            ],
            ..Default::default()
        };
        let crashes = source.crash_events(&filter()).unwrap();
        assert_eq!(crashes.len(), 1);
        assert_eq!(crashes[0].ride_id, 7);
    }
}
