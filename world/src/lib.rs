#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Lava Stabilization.
//!
//! The world owns the voxel grid, the actors walking on it and the cooldown
//! ledger. It is mutated through [`apply`] and read through [`query`]; the
//! host traits from `lava-stabilization-core` are implemented here so that
//! abilities can run against it directly.

mod grid;

use std::{collections::BTreeMap, time::Duration};

use lava_stabilization_core::{
    AbilityMetadata, ActivationGate, ActorCommandError, ActorId, ActorLocator, CellCoord, Command,
    Event, GridWriteError, Material, MaterialGrid, Position,
};

use self::grid::VoxelGrid;

/// Lowest writable layer of a freshly created world.
pub const DEFAULT_MIN_Y: i32 = -64;
/// Highest writable layer of a freshly created world.
pub const DEFAULT_MAX_Y: i32 = 319;

/// Represents the authoritative world state.
#[derive(Debug)]
pub struct World {
    grid: VoxelGrid,
    actors: BTreeMap<ActorId, ActorState>,
    cooldowns: BTreeMap<(ActorId, &'static str), Duration>,
    clock: Duration,
    tick_index: u64,
}

impl World {
    /// Creates an empty world filled with air.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grid: VoxelGrid::new(DEFAULT_MIN_Y, DEFAULT_MAX_Y),
            actors: BTreeMap::new(),
            cooldowns: BTreeMap::new(),
            clock: Duration::ZERO,
            tick_index: 0,
        }
    }

    fn connected_actor(&self, actor: ActorId) -> Option<&ActorState> {
        self.actors.get(&actor).filter(|state| state.connected)
    }

    fn connected_actor_mut(
        &mut self,
        actor: ActorId,
    ) -> Result<&mut ActorState, ActorCommandError> {
        let state = self
            .actors
            .get_mut(&actor)
            .ok_or(ActorCommandError::UnknownActor)?;
        if !state.connected {
            return Err(ActorCommandError::Disconnected);
        }
        Ok(state)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct ActorState {
    position: Position,
    may_stabilize: bool,
    connected: bool,
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureBounds { min_y, max_y } => {
            let (min_y, max_y) = (min_y.min(max_y), min_y.max(max_y));
            world.grid.set_bounds(min_y, max_y);
            out_events.push(Event::BoundsConfigured { min_y, max_y });
        }
        Command::FillRegion { region, material } => {
            let mut written = 0u64;
            for cell in region.cells() {
                if world.grid.write(cell, material).is_ok() {
                    written += 1;
                }
            }
            out_events.push(Event::RegionFilled {
                region,
                material,
                written,
            });
        }
        Command::ProtectCell { cell } => {
            world.grid.protect(cell);
            out_events.push(Event::CellProtected { cell });
        }
        Command::SpawnActor {
            actor,
            position,
            may_stabilize,
        } => {
            if world.actors.contains_key(&actor) {
                out_events.push(Event::ActorCommandRejected {
                    actor,
                    reason: ActorCommandError::DuplicateActor,
                });
                return;
            }
            let _ = world.actors.insert(
                actor,
                ActorState {
                    position,
                    may_stabilize,
                    connected: true,
                },
            );
            out_events.push(Event::ActorSpawned { actor, position });
        }
        Command::MoveActor { actor, position } => match world.connected_actor_mut(actor) {
            Ok(state) => {
                let from = state.position;
                state.position = position;
                out_events.push(Event::ActorMoved {
                    actor,
                    from,
                    to: position,
                });
            }
            Err(reason) => out_events.push(Event::ActorCommandRejected { actor, reason }),
        },
        Command::SetPermission {
            actor,
            may_stabilize,
        } => match world.connected_actor_mut(actor) {
            Ok(state) => {
                state.may_stabilize = may_stabilize;
                out_events.push(Event::PermissionChanged {
                    actor,
                    may_stabilize,
                });
            }
            Err(reason) => out_events.push(Event::ActorCommandRejected { actor, reason }),
        },
        Command::DisconnectActor { actor } => match world.connected_actor_mut(actor) {
            Ok(state) => {
                state.connected = false;
                out_events.push(Event::ActorDisconnected { actor });
            }
            Err(reason) => out_events.push(Event::ActorCommandRejected { actor, reason }),
        },
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
    }
}

impl MaterialGrid for World {
    fn material(&self, cell: CellCoord) -> Material {
        self.grid.read(cell)
    }

    fn set_material(&mut self, cell: CellCoord, material: Material) -> Result<(), GridWriteError> {
        self.grid.write(cell, material)
    }
}

impl ActorLocator for World {
    fn location(&self, actor: ActorId) -> Option<Position> {
        self.connected_actor(actor).map(|state| state.position)
    }
}

impl ActivationGate for World {
    fn can_activate(&self, actor: ActorId, ability: &AbilityMetadata) -> bool {
        let Some(state) = self.connected_actor(actor) else {
            return false;
        };
        if !state.may_stabilize {
            return false;
        }
        self.cooldowns
            .get(&(actor, ability.name))
            .map_or(true, |ready_at| self.clock >= *ready_at)
    }

    fn record_cooldown(&mut self, actor: ActorId, ability: &AbilityMetadata) {
        let ready_at = self.clock.saturating_add(ability.cooldown);
        let _ = self.cooldowns.insert((actor, ability.name), ready_at);
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use lava_stabilization_core::{ActorId, CellCoord, Material, Position};

    /// Material stored in the provided cell.
    #[must_use]
    pub fn material(world: &World, cell: CellCoord) -> Material {
        world.grid.read(cell)
    }

    /// Inclusive writable vertical band as `(min_y, max_y)`.
    #[must_use]
    pub fn bounds(world: &World) -> (i32, i32) {
        world.grid.bounds()
    }

    /// Reports whether writes to the cell are refused by protection.
    #[must_use]
    pub fn is_protected(world: &World, cell: CellCoord) -> bool {
        world.grid.is_protected(cell)
    }

    /// Number of non-air cells holding the provided material.
    #[must_use]
    pub fn count_material(world: &World, material: Material) -> usize {
        world.grid.count(material)
    }

    /// Captures a horizontal slice of the grid at layer `y`.
    ///
    /// Rows run along `z` from `min_z` to `max_z`, columns along `x` from
    /// `min_x` to `max_x`, both inclusive.
    #[must_use]
    pub fn layer(
        world: &World,
        y: i32,
        (min_x, max_x): (i32, i32),
        (min_z, max_z): (i32, i32),
    ) -> Vec<Vec<Material>> {
        (min_z..=max_z)
            .map(|z| {
                (min_x..=max_x)
                    .map(|x| world.grid.read(CellCoord::new(x, y, z)))
                    .collect()
            })
            .collect()
    }

    /// Captures a read-only view of every actor, connected or not.
    #[must_use]
    pub fn actor_view(world: &World) -> Vec<ActorSnapshot> {
        world
            .actors
            .iter()
            .map(|(id, state)| ActorSnapshot {
                id: *id,
                position: state.position,
                may_stabilize: state.may_stabilize,
                connected: state.connected,
            })
            .collect()
    }

    /// Simulation time at which the actor may use the ability again, if a
    /// cooldown was ever recorded.
    #[must_use]
    pub fn cooldown_ready_at(world: &World, actor: ActorId, ability: &str) -> Option<Duration> {
        world
            .cooldowns
            .iter()
            .find(|((owner, name), _)| *owner == actor && *name == ability)
            .map(|(_, ready_at)| *ready_at)
    }

    /// Accumulated simulation time.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Immutable representation of a single actor used for queries.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct ActorSnapshot {
        /// Identifier of the actor.
        pub id: ActorId,
        /// Current location.
        pub position: Position,
        /// Whether the actor may use stabilization.
        pub may_stabilize: bool,
        /// Whether the actor is still connected.
        pub connected: bool,
    }
}
