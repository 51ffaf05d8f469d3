//! Scenario files describing the terrain and the actors of a simulation run.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use lava_stabilization_core::{ActorId, CellCoord, CellRegion, Command, Material, Position};
use serde::Deserialize;

/// Scenario used when no file is passed on the command line.
pub(crate) const DEFAULT_SCENARIO: &str = include_str!("../scenarios/lava_lake.toml");

/// Parsed and validated scenario.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Simulated duration of a single tick in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub(crate) tick_millis: u64,
    /// Number of ticks to run unless overridden on the command line.
    #[serde(default = "default_ticks")]
    pub(crate) ticks: u64,
    /// Writable vertical band.
    #[serde(default)]
    pub(crate) bounds: Option<Bounds>,
    /// Material fills applied in order before the first tick.
    #[serde(default)]
    pub(crate) fills: Vec<Fill>,
    /// Cells that refuse every write.
    #[serde(default)]
    pub(crate) protected: Vec<[i32; 3]>,
    /// Actors taking part in the run.
    #[serde(default)]
    pub(crate) actors: Vec<ActorPlan>,
}

/// Inclusive writable vertical band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Bounds {
    pub(crate) min_y: i32,
    pub(crate) max_y: i32,
}

/// Cuboid filled with one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Fill {
    pub(crate) from: [i32; 3],
    pub(crate) to: [i32; 3],
    pub(crate) material: Material,
}

/// Script for a single actor.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ActorPlan {
    pub(crate) id: u32,
    pub(crate) spawn: [f64; 3],
    #[serde(default = "default_permission")]
    pub(crate) may_stabilize: bool,
    /// Ticks at which the actor requests the ability; a request while the
    /// ability runs switches it off.
    #[serde(default)]
    pub(crate) triggers: Vec<u64>,
    /// Tick at which the host stops the ability explicitly.
    #[serde(default)]
    pub(crate) stop_at: Option<u64>,
    /// Tick at which the actor loses the permission.
    #[serde(default)]
    pub(crate) revoke_at: Option<u64>,
    /// Tick at which the actor disconnects.
    #[serde(default)]
    pub(crate) disconnect_at: Option<u64>,
    /// Polyline walked after spawning, starting from the spawn point.
    #[serde(default)]
    pub(crate) waypoints: Vec<[f64; 3]>,
    /// Distance covered per tick along the waypoints.
    #[serde(default = "default_speed")]
    pub(crate) speed: f64,
}

fn default_tick_millis() -> u64 {
    50
}

fn default_ticks() -> u64 {
    100
}

fn default_permission() -> bool {
    true
}

fn default_speed() -> f64 {
    0.25
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Loads a scenario file.
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Simulated duration of one tick.
    pub(crate) fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Commands that build the initial world.
    pub(crate) fn setup_commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        if let Some(bounds) = self.bounds {
            commands.push(Command::ConfigureBounds {
                min_y: bounds.min_y,
                max_y: bounds.max_y,
            });
        }
        commands.extend(self.fills.iter().map(|fill| Command::FillRegion {
            region: CellRegion::from_corners(cell(fill.from), cell(fill.to)),
            material: fill.material,
        }));
        commands.extend(
            self.protected
                .iter()
                .map(|coords| Command::ProtectCell { cell: cell(*coords) }),
        );
        commands.extend(self.actors.iter().map(|plan| Command::SpawnActor {
            actor: plan.actor(),
            position: position(plan.spawn),
            may_stabilize: plan.may_stabilize,
        }));
        commands
    }

    fn validate(&self) -> Result<()> {
        if self.tick_millis == 0 {
            bail!("tick_millis must be positive");
        }
        if let Some(bounds) = self.bounds {
            if bounds.min_y > bounds.max_y {
                bail!(
                    "bounds are inverted: min_y {} exceeds max_y {}",
                    bounds.min_y,
                    bounds.max_y
                );
            }
        }

        let mut seen = Vec::with_capacity(self.actors.len());
        for plan in &self.actors {
            if seen.contains(&plan.id) {
                bail!("actor {} is declared twice", plan.id);
            }
            seen.push(plan.id);
            if !plan.speed.is_finite() || plan.speed < 0.0 {
                bail!("actor {} has invalid speed {}", plan.id, plan.speed);
            }
        }
        Ok(())
    }
}

impl ActorPlan {
    pub(crate) fn actor(&self) -> ActorId {
        ActorId::new(self.id)
    }

    /// Location after walking for `tick` ticks.
    pub(crate) fn position_at(&self, tick: u64) -> Position {
        let mut remaining = self.speed * tick as f64;
        let mut current = position(self.spawn);
        for waypoint in &self.waypoints {
            let next = position(*waypoint);
            let length = distance(current, next);
            if remaining <= length {
                if length == 0.0 {
                    return next;
                }
                return current.lerp(next, remaining / length);
            }
            remaining -= length;
            current = next;
        }
        current
    }
}

fn cell([x, y, z]: [i32; 3]) -> CellCoord {
    CellCoord::new(x, y, z)
}

fn position([x, y, z]: [f64; 3]) -> Position {
    Position::new(x, y, z)
}

fn distance(a: Position, b: Position) -> f64 {
    let (dx, dy, dz) = (b.x() - a.x(), b.y() - a.y(), b.z() - a.z());
    (dx * dx + dy * dy + dz * dz).sqrt()
}
