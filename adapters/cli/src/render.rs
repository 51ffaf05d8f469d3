//! Plain-text frames showing the layer each actor stands on.

use std::io::{self, Write};

use lava_stabilization_core::CellCoord;
use lava_stabilization_system_stabilization::LavaStabilization;
use lava_stabilization_world::{query, World};

/// Cells shown on each side of an actor's anchor.
pub(crate) const VIEW_RADIUS: i32 = 5;

const ACTOR_GLYPH: char = '@';

/// Writes one frame: a header line, then a top-down view of the layer below
/// every connected actor.
pub(crate) fn write_frame(world: &World, tick: u64, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "tick {tick} ({:.2}s)",
        query::clock(world).as_secs_f64()
    )?;
    for actor in query::actor_view(world) {
        if !actor.connected {
            continue;
        }
        let anchor = LavaStabilization::anchor(actor.position);
        writeln!(
            out,
            "actor {} at ({}, {}, {})",
            actor.id.get(),
            anchor.x(),
            anchor.y(),
            anchor.z()
        )?;
        for row in layer_rows(world, anchor) {
            writeln!(out, "  {row}")?;
        }
    }
    Ok(())
}

fn layer_rows(world: &World, anchor: CellCoord) -> Vec<String> {
    let rows = query::layer(
        world,
        anchor.y(),
        (anchor.x() - VIEW_RADIUS, anchor.x() + VIEW_RADIUS),
        (anchor.z() - VIEW_RADIUS, anchor.z() + VIEW_RADIUS),
    );
    rows.into_iter()
        .enumerate()
        .map(|(dz, row)| {
            row.into_iter()
                .enumerate()
                .map(|(dx, material)| {
                    if dx as i32 == VIEW_RADIUS && dz as i32 == VIEW_RADIUS {
                        ACTOR_GLYPH
                    } else {
                        material.glyph()
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lava_stabilization_core::{ActorId, CellRegion, Command, Material, Position};
    use lava_stabilization_world as world;

    fn world_with_actor() -> World {
        let mut world = World::new();
        let mut events = Vec::new();
        for command in [
            Command::FillRegion {
                region: CellRegion::from_corners(
                    CellCoord::new(-2, 63, -2),
                    CellCoord::new(2, 63, 2),
                ),
                material: Material::Lava,
            },
            Command::SpawnActor {
                actor: ActorId::new(3),
                position: Position::new(0.5, 64.0, 0.5),
                may_stabilize: true,
            },
        ] {
            world::apply(&mut world, command, &mut events);
        }
        world
    }

    #[test]
    fn frame_marks_actor_at_window_centre() {
        let world = world_with_actor();
        let rows = layer_rows(&world, CellCoord::new(0, 63, 0));

        assert_eq!(rows.len(), (2 * VIEW_RADIUS + 1) as usize);
        assert_eq!(rows[0], "...........");
        assert_eq!(rows[3], "...LLLLL...");
        assert_eq!(rows[5], "...LL@LL...");
    }

    #[test]
    fn disconnected_actors_are_not_drawn() {
        let mut world = world_with_actor();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::DisconnectActor {
                actor: ActorId::new(3),
            },
            &mut events,
        );

        let mut frame = Vec::new();
        write_frame(&world, 7, &mut frame).expect("in-memory write");
        let text = String::from_utf8(frame).expect("utf-8 frame");

        assert_eq!(text.lines().count(), 1, "only the header remains");
        assert!(text.starts_with("tick 7"));
    }
}
