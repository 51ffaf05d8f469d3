//! Sparse voxel storage backing the world.

use std::collections::{BTreeMap, BTreeSet};

use lava_stabilization_core::{CellCoord, GridWriteError, Material};

/// Sparse material map where absent cells hold [`Material::Air`].
#[derive(Debug)]
pub(crate) struct VoxelGrid {
    min_y: i32,
    max_y: i32,
    cells: BTreeMap<CellCoord, Material>,
    protected: BTreeSet<CellCoord>,
}

impl VoxelGrid {
    /// Creates an empty grid writable within `[min_y, max_y]`.
    pub(crate) fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            min_y,
            max_y,
            cells: BTreeMap::new(),
            protected: BTreeSet::new(),
        }
    }

    pub(crate) fn set_bounds(&mut self, min_y: i32, max_y: i32) {
        self.min_y = min_y;
        self.max_y = max_y;
    }

    pub(crate) fn bounds(&self) -> (i32, i32) {
        (self.min_y, self.max_y)
    }

    pub(crate) fn protect(&mut self, cell: CellCoord) {
        let _ = self.protected.insert(cell);
    }

    pub(crate) fn is_protected(&self, cell: CellCoord) -> bool {
        self.protected.contains(&cell)
    }

    pub(crate) fn read(&self, cell: CellCoord) -> Material {
        self.cells.get(&cell).copied().unwrap_or_default()
    }

    pub(crate) fn write(&mut self, cell: CellCoord, material: Material) -> Result<(), GridWriteError> {
        if !(self.min_y..=self.max_y).contains(&cell.y()) {
            return Err(GridWriteError::OutOfBounds {
                cell,
                min_y: self.min_y,
                max_y: self.max_y,
            });
        }
        if self.protected.contains(&cell) {
            return Err(GridWriteError::Protected(cell));
        }

        if material == Material::Air {
            let _ = self.cells.remove(&cell);
        } else {
            let _ = self.cells.insert(cell, material);
        }
        Ok(())
    }

    pub(crate) fn count(&self, material: Material) -> usize {
        self.cells.values().filter(|stored| **stored == material).count()
    }
}
