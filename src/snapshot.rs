//! The danger matrix handed to path search.
//!
//! Layout, little endian:
//!
//! | bytes | content |
//! |---|---|
//! | 4 | magic `RDGS` |
//! | 2 | format version, `u16` |
//! | 4 | rows, `u32` |
//! | 4 | cols, `u32` |
//! | 25 per entry | `f64` lat, `f64` lon, `f64` danger, `u8` tier; row-major |
//!
//! A danger of `-1` marks a cell no ride went through. The tier byte is the
//! tier's position in [`Tier::ALL`], as classified by the run that wrote the
//! file, so readers need not know its thresholds.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::classify::{danger_value, Tier, UNVISITED};
use crate::error::{Error, Result};
use crate::grid::{Grid, LatLon};

const MAGIC: &[u8; 4] = b"RDGS";
const VERSION: u16 = 2;
const ENTRY_BYTES: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub center: LatLon,
    pub danger: f64,
    pub tier: Tier,
}

impl SnapshotEntry {
    pub fn is_visited(&self) -> bool {
        self.danger != UNVISITED
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    rows: usize,
    cols: usize,
    entries: Vec<SnapshotEntry>,
}

impl GridSnapshot {
    /// Captures the danger value and tier of every cell. Run after
    /// classification.
    pub fn from_grid(grid: &Grid) -> Self {
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            entries: grid
                .cells()
                .iter()
                .map(|cell| SnapshotEntry {
                    center: cell.center,
                    danger: danger_value(cell),
                    tier: cell.tier,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&SnapshotEntry> {
        if row < self.rows && col < self.cols {
            self.entries.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// `(row, col, entry)` in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &SnapshotEntry)> {
        let cols = self.cols;
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, e)| (i / cols, i % cols, e))
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let rows = u32::try_from(self.rows)
            .map_err(|_| Error::Snapshot(format!("{} rows do not fit the format", self.rows)))?;
        let cols = u32::try_from(self.cols)
            .map_err(|_| Error::Snapshot(format!("{} cols do not fit the format", self.cols)))?;

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&rows.to_le_bytes())?;
        writer.write_all(&cols.to_le_bytes())?;
        for entry in &self.entries {
            writer.write_all(&entry.center.lat.to_le_bytes())?;
            writer.write_all(&entry.center.lon.to_le_bytes())?;
            writer.write_all(&entry.danger.to_le_bytes())?;
            writer.write_all(&[entry.tier.index()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(Error::Snapshot("not a danger grid snapshot".into()));
        }

        let mut version = [0u8; 2];
        reader.read_exact(&mut version).map_err(truncated)?;
        let version = u16::from_le_bytes(version);
        if version != VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                version, VERSION
            )));
        }

        let rows = read_u32(&mut reader)? as usize;
        let cols = read_u32(&mut reader)? as usize;
        if rows == 0 || cols == 0 {
            return Err(Error::Snapshot(format!("empty shape {}x{}", rows, cols)));
        }

        let n = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Snapshot(format!("shape {}x{} overflows", rows, cols)))?;
        let mut entries = Vec::with_capacity(n.min(1 << 20));
        let mut buf = [0u8; ENTRY_BYTES];
        for _ in 0..n {
            reader.read_exact(&mut buf).map_err(truncated)?;
            let tier = Tier::from_index(buf[24])
                .ok_or_else(|| Error::Snapshot(format!("unknown tier byte {}", buf[24])))?;
            entries.push(SnapshotEntry {
                center: LatLon::new(f64_at(&buf, 0), f64_at(&buf, 8)),
                danger: f64_at(&buf, 16),
                tier,
            });
        }

        let mut rest = [0u8; 1];
        if reader.read(&mut rest)? != 0 {
            return Err(Error::Snapshot(format!(
                "trailing bytes after {}x{} entries",
                rows, cols
            )));
        }

        Ok(Self {
            rows,
            cols,
            entries,
        })
    }

    /// Writes the whole snapshot or fails. A partial file is removed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let result = self.write_to(BufWriter::new(file));
        if result.is_err() {
            let _ = std::fs::remove_file(path);
        }
        result?;
        log::info!(
            "wrote {}x{} snapshot to {}",
            self.rows,
            self.cols,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }
}

fn truncated(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Snapshot("snapshot is truncated".into())
    } else {
        Error::Io(e)
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(truncated)?;
    Ok(u32::from_le_bytes(bytes))
}

fn f64_at(buf: &[u8; ENTRY_BYTES], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::classify::classify_grid;
    use crate::config::{Threshold, TierSettings};
    use crate::grid::GridBounds;

    fn scored_grid() -> Grid {
        let mut grid = Grid::build(
            GridBounds {
                min_lat: 45.70,
                max_lat: 45.71,
                min_lon: 4.80,
                max_lon: 4.81,
            },
            0.0027,
            0.0036,
        )
        .unwrap();
        let cell = grid.cell_mut(1);
        cell.visit(3);
        cell.visit(4);
        cell.score = 7.0;
        grid.cell_mut(2).visit(3);
        classify_grid(&mut grid, &TierSettings::default());
        grid
    }

    fn encode(snapshot: &GridSnapshot) -> Vec<u8> {
        let mut bytes = vec![];
        snapshot.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_from_grid() {
        let grid = scored_grid();
        let snapshot = GridSnapshot::from_grid(&grid);
        assert_eq!(snapshot.rows(), grid.rows());
        assert_eq!(snapshot.cols(), grid.cols());
        assert_eq!(snapshot.get(0, 0).unwrap().danger, -1.0);
        assert!(!snapshot.get(0, 0).unwrap().is_visited());
        assert_eq!(snapshot.get(0, 1).unwrap().danger, 3.5);
        assert_eq!(snapshot.get(0, 1).unwrap().tier, Tier::Elevated);
        assert_eq!(snapshot.get(0, 2).unwrap().danger, 0.0);
        assert_eq!(snapshot.get(0, 2).unwrap().tier, Tier::Visited);
        assert_eq!(snapshot.get(0, 0).unwrap().tier, Tier::Unvisited);
        assert_eq!(snapshot.get(0, 1).unwrap().center, grid.get(0, 1).unwrap().center);
        assert!(snapshot.get(grid.rows(), 0).is_none());
    }

    #[test]
    fn test_header_layout() {
        let snapshot = GridSnapshot::from_grid(&scored_grid());
        let bytes = encode(&snapshot);
        assert_eq!(&bytes[0..4], b"RDGS");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 2);
        assert_eq!(bytes.len(), 14 + snapshot.rows() * snapshot.cols() * 25);
    }

    #[test]
    fn test_read_back_keeps_addressing() {
        // thresholds other than the defaults; the file carries the result
        let mut grid = scored_grid();
        classify_grid(
            &mut grid,
            &TierSettings {
                elevated: Threshold::above(0.5),
                high: Threshold::at_least(1.0),
                severe: Threshold::at_least(3.0),
            },
        );
        let snapshot = GridSnapshot::from_grid(&grid);
        assert_eq!(snapshot.get(0, 1).unwrap().tier, Tier::Severe);
        let bytes = encode(&snapshot);
        let read = GridSnapshot::read_from(bytes.as_slice()).unwrap();
        assert_eq!(read, snapshot);
        for (row, col, entry) in read.iter() {
            let original = snapshot.get(row, col).unwrap();
            assert_eq!(entry.center.lat.to_bits(), original.center.lat.to_bits());
            assert_eq!(entry.center.lon.to_bits(), original.center.lon.to_bits());
            assert_eq!(entry.danger.to_bits(), original.danger.to_bits());
            assert_eq!(entry.tier, original.tier);
            assert_eq!(entry.tier, grid.get(row, col).unwrap().tier);
        }
        assert_eq!(encode(&read), bytes);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&GridSnapshot::from_grid(&scored_grid()));
        bytes[0] = b'X';
        assert!(matches!(GridSnapshot::read_from(bytes.as_slice()), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut bytes = encode(&GridSnapshot::from_grid(&scored_grid()));
        bytes[4] = 1;
        assert!(matches!(GridSnapshot::read_from(bytes.as_slice()), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_rejects_unknown_tier() {
        let mut bytes = encode(&GridSnapshot::from_grid(&scored_grid()));
        bytes[14 + 24] = 9;
        assert!(matches!(GridSnapshot::read_from(bytes.as_slice()), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let bytes = encode(&GridSnapshot::from_grid(&scored_grid()));
        let short = &bytes[..bytes.len() - 3];
        assert!(matches!(GridSnapshot::read_from(short), Err(Error::Snapshot(_))));

        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(GridSnapshot::read_from(long.as_slice()), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_rejects_empty_shape() {
        let mut bytes = b"RDGS".to_vec();
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        assert!(matches!(GridSnapshot::read_from(bytes.as_slice()), Err(Error::Snapshot(_))));
    }
}
