#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-side runtime that keeps one active ability per actor and routes every
//! deactivation path through the ability's terminal callback.

use std::collections::BTreeMap;

use lava_stabilization_core::{Ability, AbilityError, AbilityHost, ActivationError, ActorId, Event};
use tracing::{debug, info, warn};

/// Why an ability instance was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeactivationReason {
    /// The actor triggered the ability again while it was running.
    Toggled,
    /// The host stopped the ability explicitly.
    Stopped,
    /// The actor could no longer be located while progressing.
    ActorMissing,
    /// The actor disconnected.
    Disconnected,
    /// The actor lost the permission to use the ability.
    PermissionRevoked,
    /// The host is shutting down.
    Shutdown,
}

/// Record of a removed ability instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deactivation {
    /// Actor that controlled the instance.
    pub actor: ActorId,
    /// Name of the ability that stopped.
    pub ability: &'static str,
    /// Path that led to the removal.
    pub reason: DeactivationReason,
}

/// Result of an activation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// A new instance is running.
    Started,
    /// The running instance was stopped instead.
    Toggled(Deactivation),
    /// The gate rejected the actor; nothing changed.
    Denied,
}

/// Keyed storage of active abilities, at most one per actor.
#[derive(Debug, Default)]
pub struct AbilityManager {
    active: BTreeMap<ActorId, Box<dyn Ability>>,
}

impl AbilityManager {
    /// Creates a manager without active abilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether an ability runs for the actor.
    #[must_use]
    pub fn is_active(&self, actor: ActorId) -> bool {
        self.active.contains_key(&actor)
    }

    /// Number of running instances.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Running instance of the actor, if any.
    #[must_use]
    pub fn get(&self, actor: ActorId) -> Option<&dyn Ability> {
        self.active.get(&actor).map(|ability| ability.as_ref())
    }

    /// Handles an activation request from `actor`.
    ///
    /// A request for an actor that already runs an ability stops it. Otherwise
    /// `start` constructs the instance; it is expected to consult the host's
    /// activation gate, so a rejection leaves the manager untouched.
    pub fn activate<F>(
        &mut self,
        actor: ActorId,
        host: &mut dyn AbilityHost,
        start: F,
    ) -> Result<ActivationOutcome, AbilityError>
    where
        F: FnOnce(ActorId, &mut dyn AbilityHost) -> Result<Box<dyn Ability>, ActivationError>,
    {
        if self.is_active(actor) {
            if let Some(deactivation) = self.deactivate(actor, DeactivationReason::Toggled, host)? {
                return Ok(ActivationOutcome::Toggled(deactivation));
            }
        }

        match start(actor, host) {
            Ok(ability) => {
                let _ = self.active.insert(actor, ability);
                Ok(ActivationOutcome::Started)
            }
            Err(ActivationError::PermissionDenied(_)) => {
                debug!(actor = actor.get(), "activation denied");
                Ok(ActivationOutcome::Denied)
            }
        }
    }

    /// Removes the actor's instance and runs its terminal callback.
    ///
    /// Returns `None` when the actor had nothing running.
    pub fn deactivate(
        &mut self,
        actor: ActorId,
        reason: DeactivationReason,
        host: &mut dyn AbilityHost,
    ) -> Result<Option<Deactivation>, AbilityError> {
        let Some(ability) = self.active.remove(&actor) else {
            return Ok(None);
        };
        let deactivation = Deactivation {
            actor,
            ability: ability.metadata().name,
            reason,
        };
        info!(actor = actor.get(), ?reason, "deactivating ability");
        ability.terminate(host)?;
        Ok(Some(deactivation))
    }

    /// Reacts to world events that force abilities to stop.
    ///
    /// Every forced instance is removed and terminated even if one of them
    /// fails; the first failure is returned afterwards.
    pub fn handle_events(
        &mut self,
        events: &[Event],
        host: &mut dyn AbilityHost,
    ) -> Result<Vec<Deactivation>, AbilityError> {
        let mut removed = Vec::new();
        let mut first_error = None;
        for event in events {
            let forced = match event {
                Event::ActorDisconnected { actor } => {
                    Some((*actor, DeactivationReason::Disconnected))
                }
                Event::PermissionChanged {
                    actor,
                    may_stabilize: false,
                } => Some((*actor, DeactivationReason::PermissionRevoked)),
                _ => None,
            };

            let Some((actor, reason)) = forced else {
                continue;
            };
            match self.deactivate(actor, reason, host) {
                Ok(Some(deactivation)) => removed.push(deactivation),
                Ok(None) => {}
                Err(error) => {
                    warn!(actor = actor.get(), ?reason, %error, "forced cancellation failed");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(removed),
        }
    }

    /// Runs one scheduler frame for every instance, in actor order.
    ///
    /// Instances whose actor vanished are cancelled and reported. Grid write
    /// failures abort the frame and are returned; the failing instance stays
    /// registered so the caller can still shut it down.
    pub fn progress_all(
        &mut self,
        host: &mut dyn AbilityHost,
    ) -> Result<Vec<Deactivation>, AbilityError> {
        let mut missing = Vec::new();
        for (actor, ability) in self.active.iter_mut() {
            match ability.progress(host) {
                Ok(()) => {}
                Err(AbilityError::ActorMissing(_)) => missing.push(*actor),
                Err(error) => {
                    warn!(actor = actor.get(), %error, "ability progress failed");
                    return Err(error);
                }
            }
        }

        let mut removed = Vec::with_capacity(missing.len());
        for actor in missing {
            if let Some(deactivation) =
                self.deactivate(actor, DeactivationReason::ActorMissing, host)?
            {
                removed.push(deactivation);
            }
        }
        Ok(removed)
    }

    /// Terminates every instance.
    ///
    /// Every instance is terminated even if one of them fails; the first
    /// failure is returned afterwards.
    pub fn shutdown(
        &mut self,
        host: &mut dyn AbilityHost,
    ) -> Result<Vec<Deactivation>, AbilityError> {
        let active = std::mem::take(&mut self.active);
        let mut removed = Vec::with_capacity(active.len());
        let mut first_error = None;

        for (actor, ability) in active {
            removed.push(Deactivation {
                actor,
                ability: ability.metadata().name,
                reason: DeactivationReason::Shutdown,
            });
            if let Err(error) = ability.terminate(host) {
                warn!(actor = actor.get(), %error, "ability failed to shut down cleanly");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        info!(stopped = removed.len(), "abilities shut down");
        match first_error {
            Some(error) => Err(error),
            None => Ok(removed),
        }
    }
}
