//! Turning accumulated scores into danger values and tiers.

use std::fmt;

use crate::config::TierSettings;
use crate::drawing::Rgb;
use crate::grid::{Cell, Grid};

/// Danger value of a cell no ride went through.
pub const UNVISITED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Unvisited,
    Visited,
    Elevated,
    High,
    Severe,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Unvisited,
        Tier::Visited,
        Tier::Elevated,
        Tier::High,
        Tier::Severe,
    ];

    /// Checked from the lowest threshold up so a higher tier overrides a
    /// lower one.
    pub fn for_value(danger: f64, tiers: &TierSettings) -> Tier {
        if danger < 0.0 {
            return Tier::Unvisited;
        }
        let mut tier = Tier::Visited;
        if tiers.elevated.is_met_by(danger) {
            tier = Tier::Elevated;
        }
        if tiers.high.is_met_by(danger) {
            tier = Tier::High;
        }
        if tiers.severe.is_met_by(danger) {
            tier = Tier::Severe;
        }
        tier
    }

    /// Position in [`Tier::ALL`], the byte stored in snapshots.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Tier> {
        Tier::ALL.get(usize::from(index)).copied()
    }

    pub fn color(&self) -> Rgb {
        match self {
            Tier::Unvisited => Rgb::GREY,
            Tier::Visited => Rgb::GREEN,
            Tier::Elevated => Rgb::YELLOW,
            Tier::High => Rgb::ORANGE,
            Tier::Severe => Rgb::RED,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Unvisited => "unvisited",
            Tier::Visited => "visited",
            Tier::Elevated => "elevated",
            Tier::High => "high",
            Tier::Severe => "severe",
        };
        f.write_str(name)
    }
}

/// Score per distinct ride that went through the cell, or [`UNVISITED`].
pub fn danger_value(cell: &Cell) -> f64 {
    if cell.rides.is_empty() {
        UNVISITED
    } else {
        cell.score / cell.rides.len() as f64
    }
}

/// Number of cells in each tier, indexed like [`Tier::ALL`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TierCounts([usize; 5]);

impl TierCounts {
    pub fn get(&self, tier: Tier) -> usize {
        self.0[tier as usize]
    }

    fn bump(&mut self, tier: Tier) {
        self.0[tier as usize] += 1;
    }
}

/// Sets every cell's final tier.
pub fn classify_grid(grid: &mut Grid, tiers: &TierSettings) -> TierCounts {
    let mut counts = TierCounts::default();
    for cell in grid.cells_mut() {
        cell.tier = Tier::for_value(danger_value(cell), tiers);
        counts.bump(cell.tier);
    }
    log::info!(
        "classified cells: {} visited, {} elevated, {} high, {} severe",
        counts.get(Tier::Visited),
        counts.get(Tier::Elevated),
        counts.get(Tier::High),
        counts.get(Tier::Severe),
    );
    counts
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Threshold;
    use crate::grid::GridBounds;
    use proptest::prelude::*;

    fn grid() -> Grid {
        Grid::build(
            GridBounds {
                min_lat: 45.70,
                max_lat: 45.71,
                min_lon: 4.80,
                max_lon: 4.81,
            },
            0.005,
            0.005,
        )
        .unwrap()
    }

    #[test]
    fn test_default_ladder() {
        let tiers = TierSettings::default();
        assert_eq!(Tier::for_value(UNVISITED, &tiers), Tier::Unvisited);
        assert_eq!(Tier::for_value(0.0, &tiers), Tier::Visited);
        assert_eq!(Tier::for_value(2.0, &tiers), Tier::Visited);
        assert_eq!(Tier::for_value(2.5, &tiers), Tier::Elevated);
        assert_eq!(Tier::for_value(5.0, &tiers), Tier::High);
        assert_eq!(Tier::for_value(7.99, &tiers), Tier::High);
        assert_eq!(Tier::for_value(8.0, &tiers), Tier::Severe);
        assert_eq!(Tier::for_value(10.0, &tiers), Tier::Severe);
    }

    #[test]
    fn test_configured_ladder() {
        let tiers = TierSettings {
            elevated: Threshold::above(0.3),
            high: Threshold::above(0.7),
            severe: Threshold::at_least(1.0),
        };
        assert_eq!(Tier::for_value(0.3, &tiers), Tier::Visited);
        assert_eq!(Tier::for_value(0.5, &tiers), Tier::Elevated);
        assert_eq!(Tier::for_value(0.7, &tiers), Tier::Elevated);
        assert_eq!(Tier::for_value(1.0, &tiers), Tier::Severe);
    }

    #[test]
    fn test_index_round_trips() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_index(tier.index()), Some(tier));
        }
        assert_eq!(Tier::from_index(5), None);
    }

    #[test]
    fn test_danger_value_divides_by_rides() {
        let mut grid = grid();
        let cell = grid.cell_mut(0);
        assert_eq!(danger_value(cell), UNVISITED);
        cell.visit(3);
        cell.visit(4);
        cell.visit(4);
        cell.score = 9.0;
        assert_eq!(danger_value(cell), 4.5);
    }

    #[test]
    fn test_classify_grid() {
        let mut grid = grid();
        grid.cell_mut(0).visit(3);
        grid.cell_mut(0).score = 10.0;
        grid.cell_mut(1).visit(3);
        let counts = classify_grid(&mut grid, &TierSettings::default());

        assert_eq!(grid.cell(0).tier, Tier::Severe);
        assert_eq!(grid.cell(1).tier, Tier::Visited);
        assert_eq!(grid.cell(2).tier, Tier::Unvisited);
        assert_eq!(counts.get(Tier::Severe), 1);
        assert_eq!(counts.get(Tier::Visited), 1);
        assert_eq!(counts.get(Tier::Unvisited), grid.len() - 2);
    }

    proptest! {
        #[test]
        fn prop_tiers_are_monotonic(a in 0.0..20.0f64, b in 0.0..20.0f64) {
            let tiers = TierSettings::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Tier::for_value(lo, &tiers) <= Tier::for_value(hi, &tiers));
        }
    }
}
