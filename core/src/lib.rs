#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Lava Stabilization engine.
//!
//! This crate defines the vocabulary that connects the authoritative world,
//! the ability systems and the adapters. Adapters submit [`Command`] values
//! describing desired world mutations, the world executes those commands via
//! its `apply` entry point and broadcasts [`Event`] values. Abilities never
//! see the world type directly: they talk to it through the host traits
//! [`MaterialGrid`], [`ActorLocator`] and [`ActivationGate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Restricts writable cells to the inclusive vertical band `[min_y, max_y]`.
    ConfigureBounds {
        /// Lowest writable layer.
        min_y: i32,
        /// Highest writable layer.
        max_y: i32,
    },
    /// Fills an axis-aligned cuboid with a single material.
    FillRegion {
        /// Region to overwrite.
        region: CellRegion,
        /// Material written into every cell of the region.
        material: Material,
    },
    /// Marks a cell as protected so that later writes are refused.
    ProtectCell {
        /// Cell that must not be modified.
        cell: CellCoord,
    },
    /// Introduces a new actor into the world.
    SpawnActor {
        /// Identifier requested for the actor.
        actor: ActorId,
        /// Initial continuous location of the actor.
        position: Position,
        /// Whether the actor is permitted to use stabilization.
        may_stabilize: bool,
    },
    /// Teleports an actor to a new location.
    MoveActor {
        /// Actor being moved.
        actor: ActorId,
        /// Destination location.
        position: Position,
    },
    /// Grants or revokes the stabilization permission of an actor.
    SetPermission {
        /// Actor whose permission changes.
        actor: ActorId,
        /// New permission value.
        may_stabilize: bool,
    },
    /// Marks an actor as disconnected.
    DisconnectActor {
        /// Actor leaving the world.
        actor: ActorId,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that the vertical bounds were changed.
    BoundsConfigured {
        /// Lowest writable layer.
        min_y: i32,
        /// Highest writable layer.
        max_y: i32,
    },
    /// Confirms that a region was filled.
    RegionFilled {
        /// Region that was written.
        region: CellRegion,
        /// Material that now occupies the written cells.
        material: Material,
        /// Number of cells that were written. Cells outside the bounds or
        /// protected are skipped.
        written: u64,
    },
    /// Confirms that a cell became protected.
    CellProtected {
        /// Cell that is now protected.
        cell: CellCoord,
    },
    /// Confirms that an actor joined the world.
    ActorSpawned {
        /// Identifier of the new actor.
        actor: ActorId,
        /// Location the actor spawned at.
        position: Position,
    },
    /// Confirms that an actor changed location.
    ActorMoved {
        /// Actor that moved.
        actor: ActorId,
        /// Location before the move.
        from: Position,
        /// Location after the move.
        to: Position,
    },
    /// Announces a permission change.
    PermissionChanged {
        /// Actor whose permission changed.
        actor: ActorId,
        /// New permission value.
        may_stabilize: bool,
    },
    /// Announces that an actor disconnected.
    ActorDisconnected {
        /// Actor that left.
        actor: ActorId,
    },
    /// Reports that a command referenced an actor the world does not know.
    ActorCommandRejected {
        /// Actor named by the rejected command.
        actor: ActorId,
        /// Specific reason the command failed.
        reason: ActorCommandError,
    },
}

/// Reasons an actor-targeted command may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorCommandError {
    /// No actor with the provided identifier exists.
    UnknownActor,
    /// An actor with the provided identifier already exists.
    DuplicateActor,
    /// The actor already disconnected.
    Disconnected,
}

/// Unique identifier assigned to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u32);

impl ActorId {
    /// Creates a new actor identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell.
///
/// `y` is the vertical axis. Ordering is lexicographic over `(x, y, z)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: i32,
    y: i32,
    z: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// East-west component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// North-south component.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the cell displaced by the provided offsets, saturating at the
    /// edges of the coordinate range.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }

    /// Returns the cell directly beneath this one.
    #[must_use]
    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Returns the cell that contains the provided continuous location.
    ///
    /// Components are floored, so `-0.5` lands in cell `-1`.
    #[must_use]
    pub fn containing(position: Position) -> Self {
        Self::new(
            position.x().floor() as i32,
            position.y().floor() as i32,
            position.z().floor() as i32,
        )
    }
}

/// Continuous location of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f64,
    y: f64,
    z: f64,
}

impl Position {
    /// Creates a new location.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// East-west component.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// North-south component.
    #[must_use]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// Cell the actor stands in.
    #[must_use]
    pub fn cell(self) -> CellCoord {
        CellCoord::containing(self)
    }

    /// Linear interpolation towards `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Position, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

/// Inclusive axis-aligned cuboid of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRegion {
    min: CellCoord,
    max: CellCoord,
}

impl CellRegion {
    /// Creates a region spanning both corners, in any order.
    #[must_use]
    pub fn from_corners(a: CellCoord, b: CellCoord) -> Self {
        Self {
            min: CellCoord::new(a.x().min(b.x()), a.y().min(b.y()), a.z().min(b.z())),
            max: CellCoord::new(a.x().max(b.x()), a.y().max(b.y()), a.z().max(b.z())),
        }
    }

    /// Corner with the smallest coordinates.
    #[must_use]
    pub const fn min(&self) -> CellCoord {
        self.min
    }

    /// Corner with the largest coordinates.
    #[must_use]
    pub const fn max(&self) -> CellCoord {
        self.max
    }

    /// Reports whether the region contains the cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        (self.min.x()..=self.max.x()).contains(&cell.x())
            && (self.min.y()..=self.max.y()).contains(&cell.y())
            && (self.min.z()..=self.max.z()).contains(&cell.z())
    }

    /// Iterates every cell of the region in `(x, y, z)` order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let (min, max) = (self.min, self.max);
        (min.x()..=max.x()).flat_map(move |x| {
            (min.y()..=max.y())
                .flat_map(move |y| (min.z()..=max.z()).map(move |z| CellCoord::new(x, y, z)))
        })
    }
}

/// Materials a grid cell can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    /// Empty space.
    #[default]
    Air,
    /// Plain solid rock.
    Stone,
    /// Flowing water.
    Water,
    /// Molten rock; the untransformed state of stabilized cells.
    Lava,
    /// Solidified molten rock; the transformed state of stabilized cells.
    MagmaBlock,
    /// Indestructible floor.
    Bedrock,
}

impl Material {
    /// Single-character glyph used by text renderers.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Air => '.',
            Self::Stone => '#',
            Self::Water => '~',
            Self::Lava => 'L',
            Self::MagmaBlock => 'M',
            Self::Bedrock => '=',
        }
    }
}

/// Static description an ability declares to its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityMetadata {
    /// Stable display name, also used as the cooldown key.
    pub name: &'static str,
    /// Author credited in help listings.
    pub author: &'static str,
    /// Semantic version string.
    pub version: &'static str,
    /// One-line description for help text.
    pub description: &'static str,
    /// Minimum gap between deactivation and reactivation.
    pub cooldown: Duration,
    /// Whether the ability cannot hurt other actors.
    pub harmless: bool,
    /// Whether activation requires holding the modifier key.
    pub sneak: bool,
}

/// Reasons a grid write may be refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GridWriteError {
    /// The cell lies outside the writable vertical band.
    #[error("cell {cell:?} lies outside the writable bounds {min_y}..={max_y}")]
    OutOfBounds {
        /// Cell targeted by the write.
        cell: CellCoord,
        /// Lowest writable layer.
        min_y: i32,
        /// Highest writable layer.
        max_y: i32,
    },
    /// The cell is protected against modification.
    #[error("cell {0:?} is protected")]
    Protected(CellCoord),
}

/// Reasons an activation request may be refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ActivationError {
    /// The host's permission or cooldown gate rejected the actor.
    #[error("actor {0:?} may not activate this ability")]
    PermissionDenied(ActorId),
}

/// Failures surfaced while an active ability runs.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AbilityError {
    /// The grid refused a write; the footprint may be partially applied.
    #[error("grid write failed")]
    GridWrite(#[from] GridWriteError),
    /// The host could not locate the controlling actor.
    #[error("actor {0:?} could not be located")]
    ActorMissing(ActorId),
}

/// Outbound boundary from abilities to the terrain grid.
pub trait MaterialGrid {
    /// Returns the material currently stored in the cell.
    fn material(&self, cell: CellCoord) -> Material;

    /// Overwrites the material stored in the cell.
    fn set_material(&mut self, cell: CellCoord, material: Material) -> Result<(), GridWriteError>;
}

/// Resolves actors to their current location.
pub trait ActorLocator {
    /// Location of the actor, or `None` when the actor is gone or disconnected.
    fn location(&self, actor: ActorId) -> Option<Position>;
}

/// Permission and cooldown gate consulted before an ability starts.
pub trait ActivationGate {
    /// Reports whether the actor may start the ability right now.
    fn can_activate(&self, actor: ActorId, ability: &AbilityMetadata) -> bool;

    /// Charges the ability's cooldown to the actor.
    fn record_cooldown(&mut self, actor: ActorId, ability: &AbilityMetadata);
}

/// Everything an active ability needs from its host while it runs.
pub trait AbilityHost: MaterialGrid + ActorLocator + ActivationGate {}

impl<T> AbilityHost for T where T: MaterialGrid + ActorLocator + ActivationGate {}

/// Capability set of an active, host-driven ability instance.
pub trait Ability: std::fmt::Debug {
    /// Static metadata of the ability.
    fn metadata(&self) -> &'static AbilityMetadata;

    /// Actor controlling this instance.
    fn actor(&self) -> ActorId;

    /// Per-tick callback invoked by the host scheduler.
    fn progress(&mut self, host: &mut dyn AbilityHost) -> Result<(), AbilityError>;

    /// Terminal callback; consumes the instance.
    fn terminate(self: Box<Self>, host: &mut dyn AbilityHost) -> Result<(), AbilityError>;
}
