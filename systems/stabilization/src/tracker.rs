//! Per-instance bookkeeping of transformed cells.

use lava_stabilization_core::{CellCoord, GridWriteError, MaterialGrid};
use tracing::{debug, warn};

use crate::{
    footprint::{desired_footprint, Footprint, DEFAULT_RANGE},
    SOURCE_MATERIAL, TARGET_MATERIAL,
};

/// Counts reported by a single footprint update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Cells that left the footprint and were reverted.
    pub reverted: usize,
    /// Cells that joined the footprint.
    pub added: usize,
    /// Cells written with the transformed material.
    pub applied: usize,
}

/// Owns the cells one ability instance has transformed.
///
/// Invariant: after a successful update every tracked cell holds
/// [`TARGET_MATERIAL`]. Cells outside the footprint are never claimed.
///
/// Trackers do not coordinate with each other. When two footprints overlap,
/// the grid holds whatever the most recent write left behind; a tracker that
/// reverts a shared cell undoes the other's transformation until that one
/// ticks again.
#[derive(Clone, Debug)]
pub struct FootprintTracker {
    footprint: Footprint,
    radius: u32,
}

impl Default for FootprintTracker {
    fn default() -> Self {
        Self::with_radius(DEFAULT_RANGE)
    }
}

impl FootprintTracker {
    /// Creates an empty tracker using [`DEFAULT_RANGE`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tracker claiming cells within `radius` of the anchor.
    #[must_use]
    pub fn with_radius(radius: u32) -> Self {
        Self {
            footprint: Footprint::new(),
            radius,
        }
    }

    /// Radius used by [`FootprintTracker::tick`].
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Cells currently claimed.
    #[must_use]
    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    /// Reports whether the tracker currently claims any cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.footprint.is_empty()
    }

    /// Moves the footprint to the area around `anchor`.
    pub fn tick<G>(&mut self, anchor: CellCoord, grid: &mut G) -> Result<TickSummary, GridWriteError>
    where
        G: MaterialGrid + ?Sized,
    {
        self.retarget(desired_footprint(anchor, self.radius), grid)
    }

    /// Replaces the footprint with `desired`.
    ///
    /// Cells that are no longer desired are reverted first. Only then is the
    /// transformed material written, to every claimed cell including the ones
    /// that were already claimed, so cells changed behind the tracker's back
    /// are repaired. A failed write aborts the update; cells whose revert did
    /// not happen stay claimed.
    pub fn retarget<G>(
        &mut self,
        desired: Footprint,
        grid: &mut G,
    ) -> Result<TickSummary, GridWriteError>
    where
        G: MaterialGrid + ?Sized,
    {
        let stale: Vec<CellCoord> = self.footprint.difference(&desired).copied().collect();
        for cell in &stale {
            grid.set_material(*cell, SOURCE_MATERIAL)?;
            let _ = self.footprint.remove(cell);
        }

        let before = self.footprint.len();
        self.footprint.extend(desired);
        let added = self.footprint.len() - before;

        for cell in &self.footprint {
            grid.set_material(*cell, TARGET_MATERIAL)?;
        }

        let summary = TickSummary {
            reverted: stale.len(),
            added,
            applied: self.footprint.len(),
        };
        debug!(
            reverted = summary.reverted,
            added = summary.added,
            applied = summary.applied,
            "footprint updated"
        );
        Ok(summary)
    }

    /// Reverts every claimed cell and empties the footprint.
    ///
    /// All cells are attempted even when a write fails; the first failure is
    /// returned once the footprint is empty. A second call does nothing.
    pub fn terminate<G>(&mut self, grid: &mut G) -> Result<usize, GridWriteError>
    where
        G: MaterialGrid + ?Sized,
    {
        let drained = std::mem::take(&mut self.footprint);
        let count = drained.len();
        let mut first_error = None;

        for cell in drained {
            if let Err(error) = grid.set_material(cell, SOURCE_MATERIAL) {
                warn!(?cell, %error, "failed to revert stabilized cell");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                debug!(reverted = count, "footprint released");
                Ok(count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use lava_stabilization_core::Material;

    #[derive(Default)]
    struct MapGrid {
        cells: HashMap<CellCoord, Material>,
        writes: usize,
        locked: Option<CellCoord>,
    }

    impl MaterialGrid for MapGrid {
        fn material(&self, cell: CellCoord) -> Material {
            self.cells.get(&cell).copied().unwrap_or(SOURCE_MATERIAL)
        }

        fn set_material(
            &mut self,
            cell: CellCoord,
            material: Material,
        ) -> Result<(), GridWriteError> {
            self.writes += 1;
            if self.locked == Some(cell) {
                return Err(GridWriteError::Protected(cell));
            }
            let _ = self.cells.insert(cell, material);
            Ok(())
        }
    }

    fn cell(x: i32, z: i32) -> CellCoord {
        CellCoord::new(x, 0, z)
    }

    #[test]
    fn new_tracker_is_empty_with_default_radius() {
        let tracker = FootprintTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.radius(), DEFAULT_RANGE);
    }

    #[test]
    fn retarget_reports_counts() {
        let mut grid = MapGrid::default();
        let mut tracker = FootprintTracker::new();

        let first = tracker
            .retarget([cell(0, 0), cell(1, 0)].into(), &mut grid)
            .expect("writes succeed");
        assert_eq!(
            first,
            TickSummary {
                reverted: 0,
                added: 2,
                applied: 2,
            }
        );

        let second = tracker
            .retarget([cell(1, 0), cell(2, 0), cell(3, 0)].into(), &mut grid)
            .expect("writes succeed");
        assert_eq!(
            second,
            TickSummary {
                reverted: 1,
                added: 2,
                applied: 3,
            }
        );
        assert_eq!(grid.writes, 2 + 1 + 3);
    }

    #[test]
    fn terminate_twice_is_a_no_op() {
        let mut grid = MapGrid::default();
        let mut tracker = FootprintTracker::with_radius(1);
        let _ = tracker.tick(cell(0, 0), &mut grid).expect("writes succeed");

        let reverted = tracker.terminate(&mut grid).expect("writes succeed");
        assert_eq!(reverted, 8, "radius one trims only the (1, 1) offset");

        let writes = grid.writes;
        assert_eq!(tracker.terminate(&mut grid), Ok(0));
        assert_eq!(grid.writes, writes);
    }

    #[test]
    fn terminate_attempts_every_cell_when_one_write_fails() {
        let mut grid = MapGrid::default();
        let mut tracker = FootprintTracker::with_radius(1);
        let _ = tracker.tick(cell(0, 0), &mut grid).expect("writes succeed");
        let claimed = tracker.footprint().clone();
        let locked = cell(-1, -1);
        grid.locked = Some(locked);
        let writes = grid.writes;

        assert_eq!(
            tracker.terminate(&mut grid),
            Err(GridWriteError::Protected(locked))
        );
        assert!(tracker.is_empty(), "footprint is drained despite the failure");
        assert_eq!(grid.writes - writes, claimed.len(), "every cell attempted");
        for claimed_cell in claimed.iter().filter(|claimed| **claimed != locked) {
            assert_eq!(grid.material(*claimed_cell), SOURCE_MATERIAL);
        }
        assert_eq!(grid.cells.get(&locked), Some(&TARGET_MATERIAL));
    }

    #[test]
    fn failed_revert_keeps_the_cell_claimed() {
        let mut grid = MapGrid::default();
        let mut tracker = FootprintTracker::new();
        let _ = tracker
            .retarget([cell(0, 0), cell(1, 0)].into(), &mut grid)
            .expect("writes succeed");
        grid.locked = Some(cell(0, 0));

        let result = tracker.retarget([cell(1, 0)].into(), &mut grid);

        assert_eq!(result, Err(GridWriteError::Protected(cell(0, 0))));
        assert!(tracker.footprint().contains(&cell(0, 0)));
    }
}
