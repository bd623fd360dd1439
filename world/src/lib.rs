#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the Blockwork grid.
//!
//! The world owns the [`Grid`] authority, the single drag slot, the effect
//! queue and the observer registry. Every mutation flows through [`apply`],
//! which validates the command, commits it through one journaled
//! transaction, and publishes the resulting events once the commit is
//! visible and the command gate has been released.

mod drag;
mod execute;
mod grid;
mod notify;
pub mod rules;

use std::sync::{Mutex, PoisonError};

use blockwork_core::{
    Block, BlockId, BlockKind, BlockTarget, Command, ConfigError, Event, GridConfig, GridCoord,
    GridError, GridVersion, Pattern, PatternOutcome, Tier,
};
use tracing::debug;

pub use drag::{reachable_cells, within_range, DragResolution, DragSession, DragTracker};
pub use grid::{Committed, Grid, GridView, Transaction};
pub use notify::{EffectQueue, Notifier, Observer, Subscription};

use rules::{
    validate, BlockExists, InBounds, IsEmpty, IsOccupied, RestsAt, SwapReachable, WithinRange,
};

/// Represents the authoritative Blockwork world state.
#[derive(Debug)]
pub struct World {
    config: GridConfig,
    grid: Grid,
    drag: DragTracker,
    effects: EffectQueue,
    outbox: EffectQueue,
    notifier: Notifier,
    gate: Mutex<()>,
}

impl World {
    /// Creates an empty world after validating `config`.
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid: Grid::new(config.width, config.height),
            config,
            drag: DragTracker::new(),
            effects: EffectQueue::new(),
            outbox: EffectQueue::new(),
            notifier: Notifier::new(),
            gate: Mutex::new(()),
        })
    }

    /// Registers an observer for every event the world publishes.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.notifier.subscribe(observer)
    }

    /// Ends delivery to a previously registered observer.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    fn stage(&self, out_events: &mut Vec<Event>) {
        let events = self.effects.drain();
        self.outbox.extend(events.iter().cloned());
        out_events.extend(events);
    }

    fn record<T>(&self, committed: Committed<T>) -> T {
        self.effects.extend(committed.effects);
        committed.value
    }

    fn place(&self, position: GridCoord, kind: BlockKind, tier: Tier) -> Result<Block, GridError> {
        let committed = self.grid.commit(|transaction| {
            validate(&*transaction, &[&InBounds(position), &IsEmpty(position)])?;
            transaction.place_new(kind, tier, position)
        })?;
        Ok(self.record(committed))
    }

    fn remove(&self, target: BlockTarget) -> Result<Block, GridError> {
        let committed = self.grid.commit(|transaction| match target {
            BlockTarget::Id(id) => {
                validate(&*transaction, &[&BlockExists(id)])?;
                transaction.remove(id)
            }
            BlockTarget::Position(position) => {
                validate(&*transaction, &[&InBounds(position), &IsOccupied(position)])?;
                transaction.remove_at(position)
            }
        })?;
        Ok(self.record(committed))
    }

    fn move_block(&self, block: BlockId, to: GridCoord) -> Result<Block, GridError> {
        let committed = self.grid.commit(|transaction| {
            validate(&*transaction, &[&BlockExists(block), &InBounds(to)])?;
            if transaction.get_at(to).map(|occupant| occupant.id()) != Some(block) {
                validate(&*transaction, &[&IsEmpty(to)])?;
            }
            transaction.move_block(block, to)
        })?;
        Ok(self.record(committed))
    }

    fn start_drag(&self, block: BlockId, origin: GridCoord) -> Result<DragSession, GridError> {
        if let Some(active) = self.drag.active() {
            return Err(GridError::DragAlreadyActive {
                active: active.block,
            });
        }
        validate(&self.grid, &[&RestsAt { block, position: origin }])?;
        let session = self
            .drag
            .begin(DragSession::new(block, origin, self.grid.now()))?;
        self.effects.push(Event::DragStarted { block, origin });
        Ok(session)
    }

    fn update_preview(&self, position: GridCoord) -> Result<DragSession, GridError> {
        if self.drag.active().is_none() {
            return Err(GridError::NoActiveDrag);
        }
        validate(&self.grid, &[&InBounds(position)])?;
        self.drag.update_preview(position)
    }

    fn complete_drag(&self, target: GridCoord) -> Result<DragResolution, GridError> {
        let session = self.drag.end()?;
        let max_range = self.config.max_drag_range;
        let result = self.grid.commit(|transaction| {
            validate(
                &*transaction,
                &[
                    &RestsAt {
                        block: session.block,
                        position: session.origin,
                    },
                    &InBounds(target),
                ],
            )?;
            if target == session.origin {
                return Ok(DragResolution::Unchanged);
            }
            match transaction.get_at(target) {
                None => {
                    validate(
                        &*transaction,
                        &[&WithinRange {
                            from: session.origin,
                            to: target,
                            max_range,
                        }],
                    )?;
                    transaction
                        .move_block(session.block, target)
                        .map(DragResolution::Moved)
                }
                Some(occupant) => {
                    validate(
                        &*transaction,
                        &[&SwapReachable {
                            first: session.origin,
                            second: target,
                            max_range,
                        }],
                    )?;
                    let (dragged, displaced) = transaction.swap(session.block, occupant.id())?;
                    Ok(DragResolution::Swapped { dragged, displaced })
                }
            }
        });

        match result {
            Ok(committed) => Ok(self.record(committed)),
            Err(error) => {
                debug!(%error, block = %session.block, "drag drop failed, session cancelled");
                self.effects.push(Event::DragCancelled {
                    block: session.block,
                    origin: session.origin,
                });
                Err(error)
            }
        }
    }

    fn cancel_drag(&self) -> Result<DragSession, GridError> {
        let session = self.drag.end()?;
        self.effects.push(Event::DragCancelled {
            block: session.block,
            origin: session.origin,
        });
        Ok(session)
    }

    fn execute_patterns(
        &self,
        patterns: &[Pattern],
        version: GridVersion,
    ) -> Result<Vec<PatternOutcome>, GridError> {
        let committed = self
            .grid
            .commit_at(version, |transaction| execute::execute_patterns(transaction, patterns))?;
        Ok(self.record(committed))
    }

    fn clear(&self) -> Result<usize, GridError> {
        let committed = self.grid.commit(|transaction| Ok(transaction.clear()))?;
        Ok(self.record(committed))
    }
}

/// Successful result of applying a [`Command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A block was placed.
    Placed(Block),
    /// A block was removed.
    Removed(Block),
    /// A block moved, or stayed put when asked to move onto its own cell.
    Moved(Block),
    /// A drag session opened.
    DragStarted(DragSession),
    /// The active drag session's preview changed.
    PreviewUpdated(DragSession),
    /// The dragged block was dropped.
    Dropped(DragResolution),
    /// The drag session was abandoned.
    DragCancelled(DragSession),
    /// Patterns were executed, in execution order.
    PatternsExecuted(Vec<PatternOutcome>),
    /// Every block was removed; carries the number removed.
    Cleared(usize),
}

/// Applies the provided command to the world.
///
/// Commands are serialised: each one is validated and committed before the
/// next begins. Events are appended to `out_events` in commit order, and
/// observers receive them in that same order after the command gate is
/// released, so an observer may itself call `apply`. Its events are
/// delivered once the current event has reached every observer. A failed
/// command mutates nothing, although a failed drop still publishes the
/// cancellation of its drag session.
pub fn apply(
    world: &World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<Applied, GridError> {
    let result = {
        let _gate = world.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let result = dispatch(world, command);
        world.stage(out_events);
        result
    };
    world.notifier.deliver(&world.outbox);
    result
}

fn dispatch(world: &World, command: Command) -> Result<Applied, GridError> {
    match command {
        Command::PlaceBlock {
            position,
            kind,
            tier,
        } => world
            .place(position, kind, tier.unwrap_or(Tier::BASE))
            .map(Applied::Placed),
        Command::RemoveBlock { target } => world.remove(target).map(Applied::Removed),
        Command::MoveBlock { block, to } => world.move_block(block, to).map(Applied::Moved),
        Command::StartDrag { block, origin } => {
            world.start_drag(block, origin).map(Applied::DragStarted)
        }
        Command::UpdateDragPreview { position } => {
            world.update_preview(position).map(Applied::PreviewUpdated)
        }
        Command::CompleteDrag { target } => world.complete_drag(target).map(Applied::Dropped),
        Command::CancelDrag => world.cancel_drag().map(Applied::DragCancelled),
        Command::ExecutePatterns { patterns, version } => world
            .execute_patterns(&patterns, version)
            .map(Applied::PatternsExecuted),
        Command::ClearGrid => world.clear().map(Applied::Cleared),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{reachable_cells, DragSession, GridView, World};
    use blockwork_core::{
        Block, BlockId, GridConfig, GridCoord, GridError, GridSnapshot, GridVersion, Pattern,
        PatternOutcome,
    };

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &GridConfig {
        &world.config
    }

    /// Provides read-only access to the grid authority.
    #[must_use]
    pub fn grid(world: &World) -> GridView<'_> {
        GridView::new(&world.grid)
    }

    /// Captures an immutable copy of the grid.
    #[must_use]
    pub fn snapshot(world: &World) -> GridSnapshot {
        world.grid.snapshot()
    }

    /// Version of the most recent grid mutation.
    #[must_use]
    pub fn version(world: &World) -> GridVersion {
        world.grid.version()
    }

    /// Block resting at `position`, if any.
    #[must_use]
    pub fn block_at(world: &World, position: GridCoord) -> Option<Block> {
        world.grid.get_at(position)
    }

    /// Block with the provided identifier, if any.
    #[must_use]
    pub fn block(world: &World, id: BlockId) -> Option<Block> {
        world.grid.get_by_id(id)
    }

    /// Live blocks ordered by identifier.
    #[must_use]
    pub fn blocks(world: &World) -> Vec<Block> {
        world.grid.blocks()
    }

    /// Active drag session, if any.
    #[must_use]
    pub fn active_drag(world: &World) -> Option<DragSession> {
        world.drag.active()
    }

    /// Cells the active drag may drop onto, empty when no drag is active.
    #[must_use]
    pub fn drop_targets(world: &World) -> Vec<GridCoord> {
        let (width, height) = world.grid.dimensions();
        world.drag.active().map_or_else(Vec::new, |session| {
            reachable_cells(session.origin, world.config.max_drag_range, width, height)
        })
    }

    /// Projects what executing `pattern` against the current grid would do.
    pub fn preview_outcome(world: &World, pattern: &Pattern) -> Result<PatternOutcome, GridError> {
        PatternOutcome::project(pattern, &world.grid.snapshot())
    }

    /// Number of observers currently registered.
    #[must_use]
    pub fn observer_count(world: &World) -> usize {
        world.notifier.observer_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(GridConfig::new(10, 10)).expect("valid config")
    }

    fn place(world: &World, x: i32, y: i32) -> Block {
        let mut events = Vec::new();
        match apply(
            world,
            Command::PlaceBlock {
                position: GridCoord::new(x, y),
                kind: BlockKind::Work,
                tier: None,
            },
            &mut events,
        ) {
            Ok(Applied::Placed(block)) => block,
            other => panic!("unexpected placement result: {other:?}"),
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        assert_eq!(
            World::new(GridConfig::new(0, 4)).map(|_| ()),
            Err(ConfigError::ZeroDimension {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn place_publishes_a_single_event() {
        let world = world();
        let mut events = Vec::new();

        let applied = apply(
            &world,
            Command::PlaceBlock {
                position: GridCoord::new(1, 2),
                kind: BlockKind::Study,
                tier: None,
            },
            &mut events,
        )
        .expect("place");

        let Applied::Placed(block) = applied else {
            panic!("expected placement");
        };
        assert_eq!(block.tier(), Tier::BASE);
        assert_eq!(
            events,
            vec![Event::BlockPlaced {
                id: block.id(),
                position: GridCoord::new(1, 2),
                kind: BlockKind::Study,
                at: block.created_at(),
            }]
        );
    }

    #[test]
    fn rejected_command_publishes_nothing() {
        let world = world();
        let _ = place(&world, 3, 3);
        let mut events = Vec::new();

        let result = apply(
            &world,
            Command::PlaceBlock {
                position: GridCoord::new(3, 3),
                kind: BlockKind::Rest,
                tier: None,
            },
            &mut events,
        );

        assert!(matches!(result, Err(GridError::PositionOccupied { .. })));
        assert!(events.is_empty());
        assert_eq!(query::blocks(&world).len(), 1);
    }

    #[test]
    fn remove_by_empty_position_reports_position_empty() {
        let world = world();
        let mut events = Vec::new();
        assert_eq!(
            apply(
                &world,
                Command::RemoveBlock {
                    target: BlockTarget::Position(GridCoord::new(4, 4)),
                },
                &mut events,
            ),
            Err(GridError::PositionEmpty(GridCoord::new(4, 4)))
        );
    }

    #[test]
    fn move_onto_own_cell_is_a_no_op() {
        let world = world();
        let block = place(&world, 2, 2);
        let version = query::version(&world);
        let mut events = Vec::new();

        let applied = apply(
            &world,
            Command::MoveBlock {
                block: block.id(),
                to: GridCoord::new(2, 2),
            },
            &mut events,
        );

        assert_eq!(applied, Ok(Applied::Moved(block)));
        assert!(events.is_empty());
        assert_eq!(query::version(&world), version);
    }

    #[test]
    fn drag_lifecycle_publishes_start_and_cancel() {
        let world = world();
        let block = place(&world, 5, 5);
        let mut events = Vec::new();

        let _ = apply(
            &world,
            Command::StartDrag {
                block: block.id(),
                origin: GridCoord::new(5, 5),
            },
            &mut events,
        )
        .expect("start drag");
        let _ = apply(
            &world,
            Command::UpdateDragPreview {
                position: GridCoord::new(6, 5),
            },
            &mut events,
        )
        .expect("preview");
        assert_eq!(
            query::active_drag(&world).map(|session| session.preview),
            Some(GridCoord::new(6, 5))
        );
        assert_eq!(query::drop_targets(&world).len(), 24);

        let _ = apply(&world, Command::CancelDrag, &mut events).expect("cancel");

        assert_eq!(
            events,
            vec![
                Event::DragStarted {
                    block: block.id(),
                    origin: GridCoord::new(5, 5),
                },
                Event::DragCancelled {
                    block: block.id(),
                    origin: GridCoord::new(5, 5),
                },
            ]
        );
        assert_eq!(query::active_drag(&world), None);
        assert_eq!(query::block_at(&world, GridCoord::new(5, 5)), Some(block));
    }

    #[test]
    fn preview_outside_grid_is_rejected() {
        let world = world();
        let block = place(&world, 0, 0);
        let mut events = Vec::new();
        let _ = apply(
            &world,
            Command::StartDrag {
                block: block.id(),
                origin: GridCoord::new(0, 0),
            },
            &mut events,
        )
        .expect("start drag");

        let result = apply(
            &world,
            Command::UpdateDragPreview {
                position: GridCoord::new(-1, 0),
            },
            &mut events,
        );

        assert!(matches!(result, Err(GridError::OutOfBounds { .. })));
        assert_eq!(
            query::active_drag(&world).map(|session| session.preview),
            Some(GridCoord::new(0, 0))
        );
    }

    #[test]
    fn start_drag_checks_origin() {
        let world = world();
        let block = place(&world, 1, 1);
        let mut events = Vec::new();

        let result = apply(
            &world,
            Command::StartDrag {
                block: block.id(),
                origin: GridCoord::new(2, 1),
            },
            &mut events,
        );

        assert_eq!(
            result,
            Err(GridError::OriginMismatch {
                block: block.id(),
                expected: GridCoord::new(2, 1),
                actual: GridCoord::new(1, 1),
            })
        );
        assert_eq!(query::active_drag(&world), None);
    }

    #[test]
    fn clear_reports_removed_count() {
        let world = world();
        let _ = place(&world, 0, 0);
        let _ = place(&world, 1, 0);
        let mut events = Vec::new();

        assert_eq!(apply(&world, Command::ClearGrid, &mut events), Ok(Applied::Cleared(2)));
        assert!(matches!(events.as_slice(), [Event::GridCleared { removed: 2, .. }]));
        assert!(query::blocks(&world).is_empty());
    }

    #[test]
    fn observers_are_notified_after_commit() {
        let world = std::sync::Arc::new(world());
        let observed = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&observed);
        let _ = world.subscribe(move |event| sink.lock().expect("sink").push(event.clone()));
        assert_eq!(query::observer_count(&world), 1);

        let block = place(&world, 4, 4);

        assert_eq!(observed.lock().expect("observed").len(), 1);
        assert_eq!(query::block(&world, block.id()), Some(block));
    }

    #[test]
    fn observer_may_issue_commands() {
        let world = std::sync::Arc::new(world());
        let observed = std::sync::Arc::new(Mutex::new(Vec::new()));
        let (inner, sink) = (std::sync::Arc::clone(&world), std::sync::Arc::clone(&observed));
        let _ = world.subscribe(move |event| {
            sink.lock().expect("sink").push(event.clone());
            if let Event::BlockPlaced { position, .. } = event {
                if *position == GridCoord::new(0, 0) {
                    let _ = place(&inner, 5, 5);
                }
            }
        });

        let (done, finished) = std::sync::mpsc::channel();
        let outer = std::sync::Arc::clone(&world);
        let _ = std::thread::spawn(move || {
            let _ = place(&outer, 0, 0);
            let _ = done.send(());
        });
        finished
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("command issued from an observer must not block");

        let placed: Vec<GridCoord> = observed
            .lock()
            .expect("observed")
            .iter()
            .filter_map(|event| match event {
                Event::BlockPlaced { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(placed, vec![GridCoord::new(0, 0), GridCoord::new(5, 5)]);
        assert_eq!(query::blocks(&world).len(), 2);
        assert!(query::grid(&world).is_consistent());
    }

    #[test]
    fn grid_view_reads_follow_commands() {
        let world = world();
        let view = query::grid(&world);
        assert!(view.is_empty());

        let block = place(&world, 3, 4);

        assert_eq!(view.get_at(GridCoord::new(3, 4)), Some(block));
        assert_eq!(view.get_by_id(block.id()), Some(block));
        assert_eq!(view.dimensions(), (10, 10));
        assert_eq!(view.version(), query::version(&world));
        assert_eq!(view.snapshot().len(), 1);
    }
}
