//! Fixed-step host loop driving the world and the ability runtime.

use std::io::Write;

use anyhow::{Context, Result};
use lava_stabilization_core::{
    Ability, AbilityHost, ActivationError, ActorId, Command, Event, Material,
};
use lava_stabilization_system_abilities::{
    AbilityManager, ActivationOutcome, Deactivation, DeactivationReason,
};
use lava_stabilization_system_stabilization::LavaStabilization;
use lava_stabilization_world::{self as world, query, World};
use tracing::{debug, info, warn};

use crate::{render, scenario::Scenario};

/// Outcome of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    /// Ticks that were simulated.
    pub(crate) ticks: u64,
    /// Activation requests that started an instance.
    pub(crate) activations: usize,
    /// Activation requests rejected by the gate.
    pub(crate) denied: usize,
    /// Every instance removal, in order.
    pub(crate) deactivations: Vec<Deactivation>,
    /// Magma blocks left in the world after shutdown.
    pub(crate) magma_remaining: usize,
}

/// World, ability runtime and the scenario script driving both.
#[derive(Debug)]
pub(crate) struct Simulation {
    scenario: Scenario,
    world: World,
    abilities: AbilityManager,
    tick: u64,
    summary: Summary,
}

impl Simulation {
    /// Builds the initial world described by the scenario.
    pub(crate) fn new(scenario: Scenario) -> Self {
        let mut world = World::new();
        let mut events = Vec::new();
        for command in scenario.setup_commands() {
            world::apply(&mut world, command, &mut events);
        }
        for event in &events {
            match event {
                Event::RegionFilled {
                    material, written, ..
                } => debug!(?material, written, "region filled"),
                Event::ActorCommandRejected { actor, reason } => {
                    warn!(actor = actor.get(), ?reason, "scenario command rejected")
                }
                _ => {}
            }
        }

        Self {
            scenario,
            world,
            abilities: AbilityManager::new(),
            tick: 0,
            summary: Summary::default(),
        }
    }

    /// Runs `ticks` frames, rendering every `render_every` ticks when non-zero,
    /// then shuts every ability down.
    pub(crate) fn run(
        mut self,
        ticks: u64,
        render_every: u64,
        out: &mut impl Write,
    ) -> Result<Summary> {
        for _ in 0..ticks {
            if let Err(error) = self.step() {
                if let Err(release) = self.shutdown() {
                    warn!(
                        tick = self.tick,
                        error = ?release,
                        "failed to release abilities after a fatal frame"
                    );
                }
                return Err(error);
            }
            if render_every > 0 && self.tick % render_every == 0 {
                render::write_frame(&self.world, self.tick, out)?;
            }
        }

        self.shutdown()?;
        Ok(self.summary)
    }

    /// Advances the simulation by one frame.
    pub(crate) fn step(&mut self) -> Result<()> {
        self.tick += 1;
        let tick = self.tick;

        let mut commands = Vec::new();
        for plan in &self.scenario.actors {
            let actor = plan.actor();
            if plan.disconnect_at == Some(tick) {
                commands.push(Command::DisconnectActor { actor });
                continue;
            }
            if plan.revoke_at == Some(tick) {
                commands.push(Command::SetPermission {
                    actor,
                    may_stabilize: false,
                });
            }
            if is_connected(&self.world, actor) {
                commands.push(Command::MoveActor {
                    actor,
                    position: plan.position_at(tick),
                });
            }
        }
        commands.push(Command::Tick {
            dt: self.scenario.tick_duration(),
        });

        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        let forced = self
            .abilities
            .handle_events(&events, &mut self.world)
            .with_context(|| format!("failed to cancel abilities on tick {tick}"))?;
        self.summary.deactivations.extend(forced);

        for plan in &self.scenario.actors {
            let actor = plan.actor();
            if plan.stop_at == Some(tick) {
                if let Some(stopped) = self.abilities.deactivate(
                    actor,
                    DeactivationReason::Stopped,
                    &mut self.world,
                )? {
                    self.summary.deactivations.push(stopped);
                }
            }
            if plan.triggers.contains(&tick) {
                let outcome = self
                    .abilities
                    .activate(actor, &mut self.world, start_stabilization)
                    .with_context(|| format!("activation of actor {} failed", actor.get()))?;
                match outcome {
                    ActivationOutcome::Started => self.summary.activations += 1,
                    ActivationOutcome::Toggled(deactivation) => {
                        self.summary.deactivations.push(deactivation)
                    }
                    ActivationOutcome::Denied => {
                        info!(actor = actor.get(), tick, "activation denied");
                        self.summary.denied += 1;
                    }
                }
            }
        }

        let cancelled = self
            .abilities
            .progress_all(&mut self.world)
            .with_context(|| format!("ability progress failed on tick {tick}"))?;
        self.summary.deactivations.extend(cancelled);
        self.summary.ticks = tick;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let stopped = self
            .abilities
            .shutdown(&mut self.world)
            .context("failed to shut abilities down")?;
        self.summary.deactivations.extend(stopped);
        self.summary.magma_remaining = query::count_material(&self.world, Material::MagmaBlock);
        Ok(())
    }
}

fn start_stabilization(
    actor: ActorId,
    host: &mut dyn AbilityHost,
) -> Result<Box<dyn Ability>, ActivationError> {
    let ability = LavaStabilization::activate(actor, host)?;
    Ok(Box::new(ability))
}

fn is_connected(world: &World, actor: ActorId) -> bool {
    query::actor_view(world)
        .iter()
        .any(|snapshot| snapshot.id == actor && snapshot.connected)
}
