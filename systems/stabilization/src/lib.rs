#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Lava stabilization: while active, the lava beneath an actor's feet turns
//! into magma blocks so the actor can walk across it. The actor is not
//! protected from the heat of the magma.
//!
//! The host creates one [`LavaStabilization`] per activation through
//! [`LavaStabilization::activate`], drives it with [`Ability::progress`] every
//! scheduler frame and hands it back through [`Ability::terminate`] exactly
//! once when it deactivates.

pub mod footprint;
mod tracker;

use std::time::Duration;

use lava_stabilization_core::{
    Ability, AbilityError, AbilityHost, AbilityMetadata, ActivationError, ActivationGate, ActorId,
    CellCoord, Material, Position,
};
use tracing::info;

pub use self::footprint::{desired_footprint, Footprint, DEFAULT_RANGE};
pub use self::tracker::{FootprintTracker, TickSummary};

/// Material of untransformed cells; written back when cells are released.
pub const SOURCE_MATERIAL: Material = Material::Lava;
/// Material written into every claimed cell.
pub const TARGET_MATERIAL: Material = Material::MagmaBlock;

/// Metadata declared to the host.
pub const METADATA: AbilityMetadata = AbilityMetadata {
    name: "Lava-Stabilisierung",
    author: "Scrayos",
    version: "1.0.0",
    description: "Turns the lava beneath your feet into magma while active.",
    cooldown: Duration::ZERO,
    harmless: true,
    sneak: false,
};

/// One running lava stabilization.
#[derive(Debug)]
pub struct LavaStabilization {
    actor: ActorId,
    tracker: FootprintTracker,
}

impl LavaStabilization {
    /// Starts the ability for `actor` if the gate allows it.
    ///
    /// On rejection nothing is charged and no instance exists. On success the
    /// cooldown is recorded before the instance is returned; the footprint
    /// stays empty until the first [`Ability::progress`].
    pub fn activate<G>(actor: ActorId, gate: &mut G) -> Result<Self, ActivationError>
    where
        G: ActivationGate + ?Sized,
    {
        if !gate.can_activate(actor, &METADATA) {
            return Err(ActivationError::PermissionDenied(actor));
        }

        gate.record_cooldown(actor, &METADATA);
        info!(actor = actor.get(), ability = METADATA.name, "ability started");
        Ok(Self {
            actor,
            tracker: FootprintTracker::new(),
        })
    }

    /// Cell the footprint is centred on for an actor standing at `position`:
    /// the block under the actor's feet.
    #[must_use]
    pub fn anchor(position: Position) -> CellCoord {
        position.cell().below()
    }

    /// Cells currently held as magma by this instance.
    #[must_use]
    pub fn footprint(&self) -> &Footprint {
        self.tracker.footprint()
    }
}

impl Ability for LavaStabilization {
    fn metadata(&self) -> &'static AbilityMetadata {
        &METADATA
    }

    fn actor(&self) -> ActorId {
        self.actor
    }

    fn progress(&mut self, host: &mut dyn AbilityHost) -> Result<(), AbilityError> {
        let position = host
            .location(self.actor)
            .ok_or(AbilityError::ActorMissing(self.actor))?;
        let _ = self.tracker.tick(Self::anchor(position), host)?;
        Ok(())
    }

    fn terminate(mut self: Box<Self>, host: &mut dyn AbilityHost) -> Result<(), AbilityError> {
        let reverted = self.tracker.terminate(host)?;
        info!(
            actor = self.actor.get(),
            ability = METADATA.name,
            reverted,
            "ability stopped"
        );
        Ok(())
    }
}
