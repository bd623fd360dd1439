use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
};

use blockwork_core::{BlockKind, BlockTarget, Command, GridConfig, GridCoord, GridVersion};
use blockwork_world::{self as world, query, Applied, World};

const WRITERS: i32 = 3;
const READERS: usize = 3;
const STEPS: i32 = 200;

fn run(world: &World, command: Command) -> Option<Applied> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events).ok()
}

/// Cycles one writer through place, move, drag and remove on its own rows.
fn churn(world: &World, worker: i32) {
    for step in 0..STEPS {
        let x = step % 8;
        let y = worker * 2;
        let placed = run(
            world,
            Command::PlaceBlock {
                position: GridCoord::new(x, y),
                kind: BlockKind::Work,
                tier: None,
            },
        );
        let Some(Applied::Placed(block)) = placed else {
            continue;
        };

        let moved = run(
            world,
            Command::MoveBlock {
                block: block.id(),
                to: GridCoord::new(x, y + 1),
            },
        );
        let at = match moved {
            Some(Applied::Moved(block)) => block.position(),
            _ => block.position(),
        };

        // The drag slot is shared, so a concurrent drag may win it.
        if run(
            world,
            Command::StartDrag {
                block: block.id(),
                origin: at,
            },
        )
        .is_some()
        {
            let _ = run(
                world,
                Command::CompleteDrag {
                    target: GridCoord::new((x + 1) % 8, at.y()),
                },
            );
        }

        if step % 3 != 0 {
            let _ = run(
                world,
                Command::RemoveBlock {
                    target: BlockTarget::Id(block.id()),
                },
            );
        }
    }
}

/// Asserts the id and position indices agree in everything a reader sees.
fn inspect(world: &World, last_version: &mut GridVersion) {
    let view = query::grid(world);
    assert!(view.is_consistent(), "indices diverged");

    let snapshot = query::snapshot(world);
    let mut ids = BTreeSet::new();
    for block in snapshot.iter() {
        assert!(ids.insert(block.id()), "{} appears twice", block.id());
        assert_eq!(snapshot.find(block.id()), Some(block));
        assert_eq!(snapshot.get(block.position()), Some(block));
    }
    assert_eq!(ids.len(), snapshot.len());
    assert!(snapshot.version() >= *last_version, "version went backwards");
    *last_version = snapshot.version();

    let blocks = query::blocks(world);
    let cells: BTreeSet<GridCoord> = blocks.iter().map(|block| block.position()).collect();
    assert_eq!(cells.len(), blocks.len(), "two blocks share a cell");
}

#[test]
fn readers_never_observe_a_torn_grid() {
    let world = World::new(GridConfig::new(8, 8).with_max_drag_range(3)).expect("valid config");
    let writing = AtomicBool::new(true);

    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                scope.spawn(|| {
                    let mut last_version = GridVersion::default();
                    let mut reads = 0_usize;
                    while writing.load(Ordering::Acquire) {
                        inspect(&world, &mut last_version);
                        reads += 1;
                    }
                    inspect(&world, &mut last_version);
                    reads + 1
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|worker| {
                let world = &world;
                scope.spawn(move || churn(world, worker))
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer panicked");
        }
        writing.store(false, Ordering::Release);

        for reader in readers {
            assert!(reader.join().expect("reader panicked") > 0);
        }
    });

    let view = query::grid(&world);
    assert!(view.is_consistent());
    assert_eq!(view.len(), query::blocks(&world).len());
    assert!(!view.is_empty());
    assert_eq!(query::active_drag(&world), None);
}
