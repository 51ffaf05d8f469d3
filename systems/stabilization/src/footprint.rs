//! Shape of the stabilized area.

use std::collections::BTreeSet;

use lava_stabilization_core::CellCoord;

/// Radius used by the ability when none is configured.
pub const DEFAULT_RANGE: u32 = 3;

/// Set of cells claimed by one ability instance.
pub type Footprint = BTreeSet<CellCoord>;

/// Computes the cells an anchor wants transformed.
///
/// Every offset `(dx, dz)` with both components in `[-radius, radius]` and
/// `dx + dz <= radius` is kept, on the anchor's layer. The cut is a diagonal
/// half-plane: the `(+radius, +radius)` corner is trimmed while the
/// `(-radius, -radius)` corner is not. For a radius of 3 this yields 43 cells.
#[must_use]
pub fn desired_footprint(anchor: CellCoord, radius: u32) -> Footprint {
    let reach = i32::try_from(radius).unwrap_or(i32::MAX);
    let mut cells = Footprint::new();
    for dx in -reach..=reach {
        for dz in -reach..=reach {
            if i64::from(dx) + i64::from(dz) <= i64::from(reach) {
                let _ = cells.insert(anchor.offset(dx, 0, dz));
            }
        }
    }
    cells
}
