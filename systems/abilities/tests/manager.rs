use lava_stabilization_core::{
    Ability, AbilityError, AbilityHost, ActivationError, ActorId, CellCoord, CellRegion, Command,
    Event, GridWriteError, Material, Position,
};
use lava_stabilization_system_abilities::{
    AbilityManager, ActivationOutcome, Deactivation, DeactivationReason,
};
use lava_stabilization_system_stabilization::{LavaStabilization, METADATA};
use lava_stabilization_world::{self as world, query, World};

const ALICE: ActorId = ActorId::new(1);
const BOB: ActorId = ActorId::new(2);

fn start_stabilization(
    actor: ActorId,
    host: &mut dyn AbilityHost,
) -> Result<Box<dyn Ability>, ActivationError> {
    let ability = LavaStabilization::activate(actor, host)?;
    Ok(Box::new(ability))
}

fn apply_all(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn lava_world() -> World {
    let mut world = World::new();
    let _ = apply_all(
        &mut world,
        vec![
            Command::FillRegion {
                region: CellRegion::from_corners(
                    CellCoord::new(-16, 63, -16),
                    CellCoord::new(16, 63, 16),
                ),
                material: Material::Lava,
            },
            Command::SpawnActor {
                actor: ALICE,
                position: Position::new(0.5, 64.0, 0.5),
                may_stabilize: true,
            },
            Command::SpawnActor {
                actor: BOB,
                position: Position::new(4.5, 64.0, 0.5),
                may_stabilize: true,
            },
        ],
    );
    world
}

fn magma(world: &World) -> usize {
    query::count_material(world, Material::MagmaBlock)
}

#[test]
fn second_activation_toggles_ability_off() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();

    let outcome = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");
    assert_eq!(outcome, ActivationOutcome::Started);
    let _ = manager.progress_all(&mut world).expect("progress");
    assert!(magma(&world) > 0);

    let outcome = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("toggle");
    assert_eq!(
        outcome,
        ActivationOutcome::Toggled(Deactivation {
            actor: ALICE,
            ability: METADATA.name,
            reason: DeactivationReason::Toggled,
        })
    );
    assert!(!manager.is_active(ALICE));
    assert_eq!(magma(&world), 0, "toggling off must revert every cell");
}

#[test]
fn denied_activation_leaves_manager_empty() {
    let mut world = lava_world();
    let _ = apply_all(
        &mut world,
        vec![Command::SetPermission {
            actor: ALICE,
            may_stabilize: false,
        }],
    );
    let mut manager = AbilityManager::new();

    let outcome = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("request handled");

    assert_eq!(outcome, ActivationOutcome::Denied);
    assert_eq!(manager.active_count(), 0);
    assert_eq!(query::cooldown_ready_at(&world, ALICE, METADATA.name), None);
}

#[test]
fn explicit_stop_reverts_and_reports() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let _ = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");
    let _ = manager.progress_all(&mut world).expect("progress");

    let stopped = manager
        .deactivate(ALICE, DeactivationReason::Stopped, &mut world)
        .expect("deactivation");
    assert_eq!(
        stopped.map(|deactivation| deactivation.reason),
        Some(DeactivationReason::Stopped)
    );
    assert_eq!(magma(&world), 0);

    let again = manager
        .deactivate(ALICE, DeactivationReason::Stopped, &mut world)
        .expect("deactivation");
    assert_eq!(again, None, "nothing left to stop");
}

#[test]
fn disconnect_event_forces_termination() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let _ = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");
    let _ = manager.progress_all(&mut world).expect("progress");
    let controller = manager.get(ALICE).map(|ability| ability.actor());
    assert_eq!(controller, Some(ALICE));

    let events = apply_all(&mut world, vec![Command::DisconnectActor { actor: ALICE }]);
    let removed = manager
        .handle_events(&events, &mut world)
        .expect("forced termination");

    assert_eq!(
        removed,
        vec![Deactivation {
            actor: ALICE,
            ability: METADATA.name,
            reason: DeactivationReason::Disconnected,
        }]
    );
    assert_eq!(magma(&world), 0);
}

#[test]
fn permission_revocation_forces_termination() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let _ = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");
    let _ = manager.progress_all(&mut world).expect("progress");

    let events = apply_all(
        &mut world,
        vec![Command::SetPermission {
            actor: ALICE,
            may_stabilize: false,
        }],
    );
    let removed = manager
        .handle_events(&events, &mut world)
        .expect("forced termination");

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].reason, DeactivationReason::PermissionRevoked);
    assert_eq!(magma(&world), 0);
}

#[test]
fn vanished_actor_is_cancelled_during_progress() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let _ = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");
    let _ = manager.progress_all(&mut world).expect("progress");

    let _ = apply_all(&mut world, vec![Command::DisconnectActor { actor: ALICE }]);
    let removed = manager.progress_all(&mut world).expect("progress");

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].reason, DeactivationReason::ActorMissing);
    assert_eq!(magma(&world), 0);
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn shutdown_reverts_every_instance() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    for actor in [ALICE, BOB] {
        let _ = manager
            .activate(actor, &mut world, start_stabilization)
            .expect("activation");
    }
    let _ = manager.progress_all(&mut world).expect("progress");
    assert_eq!(manager.active_count(), 2);

    let removed = manager.shutdown(&mut world).expect("shutdown");

    assert_eq!(
        removed.iter().map(|entry| entry.actor).collect::<Vec<_>>(),
        vec![ALICE, BOB]
    );
    assert!(removed
        .iter()
        .all(|entry| entry.reason == DeactivationReason::Shutdown));
    assert_eq!(magma(&world), 0);
}

#[test]
fn overlapping_footprints_are_last_writer_wins() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    for actor in [ALICE, BOB] {
        let _ = manager
            .activate(actor, &mut world, start_stabilization)
            .expect("activation");
    }
    let _ = manager.progress_all(&mut world).expect("progress");

    let shared = CellCoord::new(2, 63, 0);
    assert_eq!(query::material(&world, shared), Material::MagmaBlock);

    let _ = manager
        .deactivate(ALICE, DeactivationReason::Stopped, &mut world)
        .expect("deactivation");
    assert_eq!(
        query::material(&world, shared),
        Material::Lava,
        "releasing one tracker reverts cells still claimed by another",
    );

    let _ = manager.progress_all(&mut world).expect("progress");
    assert_eq!(query::material(&world, shared), Material::MagmaBlock);
}

#[test]
fn grid_failure_aborts_frame_and_keeps_instance() {
    let mut world = lava_world();
    let protected = CellCoord::new(0, 63, 1);
    let _ = apply_all(&mut world, vec![Command::ProtectCell { cell: protected }]);
    let mut manager = AbilityManager::new();
    let _ = manager
        .activate(ALICE, &mut world, start_stabilization)
        .expect("activation");

    let result = manager.progress_all(&mut world);

    assert_eq!(
        result,
        Err(AbilityError::GridWrite(GridWriteError::Protected(protected)))
    );
    assert!(manager.is_active(ALICE));
}

fn claim_then_protect(world: &mut World, manager: &mut AbilityManager, cell: CellCoord) {
    for actor in [ALICE, BOB] {
        let _ = manager
            .activate(actor, world, start_stabilization)
            .expect("activation");
    }
    let _ = manager.progress_all(world).expect("progress");
    assert_eq!(query::material(world, cell), Material::MagmaBlock);
    let _ = apply_all(world, vec![Command::ProtectCell { cell }]);
}

#[test]
fn failed_forced_cancellation_still_cancels_the_rest_of_the_batch() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let stuck = CellCoord::new(-3, 63, -3);
    claim_then_protect(&mut world, &mut manager, stuck);

    let events = apply_all(
        &mut world,
        vec![
            Command::DisconnectActor { actor: ALICE },
            Command::DisconnectActor { actor: BOB },
        ],
    );
    let result = manager.handle_events(&events, &mut world);

    assert_eq!(
        result,
        Err(AbilityError::GridWrite(GridWriteError::Protected(stuck)))
    );
    assert!(!manager.is_active(BOB), "later cancellations still run");
    assert_eq!(manager.active_count(), 0);
    assert_eq!(magma(&world), 1, "only the protected cell keeps its magma");
    assert_eq!(
        query::material(&world, CellCoord::new(7, 63, 0)),
        Material::Lava
    );
}

#[test]
fn shutdown_reverts_remaining_instances_after_a_failure() {
    let mut world = lava_world();
    let mut manager = AbilityManager::new();
    let stuck = CellCoord::new(-3, 63, -3);
    claim_then_protect(&mut world, &mut manager, stuck);

    let result = manager.shutdown(&mut world);

    assert_eq!(
        result,
        Err(AbilityError::GridWrite(GridWriteError::Protected(stuck)))
    );
    assert_eq!(manager.active_count(), 0);
    assert_eq!(magma(&world), 1, "every writable cell is reverted");
    assert_eq!(query::material(&world, stuck), Material::MagmaBlock);
    for x in 1..=7 {
        assert_eq!(
            query::material(&world, CellCoord::new(x, 63, 0)),
            Material::Lava,
            "cell ({x}, 63, 0) of the second footprint"
        );
    }
}
