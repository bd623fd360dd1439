//! Grid state authority: the single store of block-by-id and block-by-position.
//!
//! Blocks live in one authoritative id-keyed map; the position index is
//! derived from it and both are only ever touched through [`Transaction`].
//! Transactions run under the write half of an `RwLock`, journal every staged
//! step, and undo the journal if the closure driving them fails, so a reader
//! can never observe one index updated without the other.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use blockwork_core::{
    Block, BlockId, BlockKind, BlockTarget, Event, GridCoord, GridError, GridSnapshot,
    GridVersion, Tier, Timestamp,
};
use tracing::{debug, warn};

/// Authoritative, internally synchronised grid occupancy store.
#[derive(Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    state: RwLock<GridState>,
}

/// Value produced by a committed transaction together with its effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed<T> {
    /// Value returned by the transaction closure.
    pub value: T,
    /// Effects queued by the transaction in commit order.
    pub effects: Vec<Event>,
    /// Grid version after the commit.
    pub version: GridVersion,
}

impl Grid {
    /// Creates an empty grid with the provided extent.
    ///
    /// Dimensions are expected to have been validated through
    /// [`blockwork_core::GridConfig::validate`].
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: RwLock::new(GridState::default()),
        }
    }

    /// Provides the dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Runs `operation` inside a journaled write transaction.
    ///
    /// On `Ok` every staged step becomes visible at once and the grid version
    /// advances if anything changed. On `Err` every staged step is undone
    /// before the write lock is released and the error is returned verbatim.
    pub fn commit<T, F>(&self, operation: F) -> Result<Committed<T>, GridError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, GridError>,
    {
        let mut state = self.write();
        let mut transaction = Transaction::begin(&mut *state, self.width, self.height);
        match operation(&mut transaction) {
            Ok(value) => {
                let (effects, version) = transaction.finish();
                debug!(
                    version = version.get(),
                    effects = effects.len(),
                    "committed grid transaction"
                );
                Ok(Committed {
                    value,
                    effects,
                    version,
                })
            }
            Err(error) => {
                let undone = transaction.rollback();
                if undone > 0 {
                    warn!(%error, undone, "rolled back partially applied grid transaction");
                } else {
                    debug!(%error, "rejected grid transaction");
                }
                Err(error)
            }
        }
    }

    /// Runs `operation` only if the grid is still at `expected`.
    ///
    /// Fails with [`GridError::ConcurrencyConflict`] when another commit
    /// landed after the caller observed the grid.
    pub fn commit_at<T, F>(
        &self,
        expected: GridVersion,
        operation: F,
    ) -> Result<Committed<T>, GridError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, GridError>,
    {
        self.commit(|transaction| {
            let actual = transaction.version();
            if actual != expected {
                return Err(GridError::ConcurrencyConflict { expected, actual });
            }
            operation(transaction)
        })
    }

    /// Inserts `block` at its own position under its own identifier.
    pub fn place(&self, block: Block) -> Result<Block, GridError> {
        self.commit(|transaction| transaction.place(block))
            .map(|committed| committed.value)
    }

    /// Allocates an identifier and places a new block.
    pub fn place_new(
        &self,
        kind: BlockKind,
        tier: Tier,
        position: GridCoord,
    ) -> Result<Block, GridError> {
        self.commit(|transaction| transaction.place_new(kind, tier, position))
            .map(|committed| committed.value)
    }

    /// Removes the block with the provided identifier.
    pub fn remove(&self, id: BlockId) -> Result<Block, GridError> {
        self.commit(|transaction| transaction.remove(id))
            .map(|committed| committed.value)
    }

    /// Removes the block resting at `position`.
    pub fn remove_at(&self, position: GridCoord) -> Result<Block, GridError> {
        self.commit(|transaction| transaction.remove_at(position))
            .map(|committed| committed.value)
    }

    /// Moves a block to an empty cell.
    pub fn move_block(&self, id: BlockId, to: GridCoord) -> Result<Block, GridError> {
        self.commit(|transaction| transaction.move_block(id, to))
            .map(|committed| committed.value)
    }

    /// Exchanges the positions of two blocks atomically.
    pub fn swap(&self, first: BlockId, second: BlockId) -> Result<(Block, Block), GridError> {
        self.commit(|transaction| transaction.swap(first, second))
            .map(|committed| committed.value)
    }

    /// Empties both indices, returning the number of removed blocks.
    pub fn clear(&self) -> usize {
        self.commit(|transaction| Ok(transaction.clear()))
            .map_or(0, |committed| committed.value)
    }

    /// Returns the block resting at `position`, if any.
    #[must_use]
    pub fn get_at(&self, position: GridCoord) -> Option<Block> {
        self.read().block_at(position).copied()
    }

    /// Returns the block with the provided identifier, if any.
    #[must_use]
    pub fn get_by_id(&self, id: BlockId) -> Option<Block> {
        self.read().blocks.get(&id).copied()
    }

    /// Reports whether a block rests at `position`.
    #[must_use]
    pub fn is_occupied(&self, position: GridCoord) -> bool {
        self.read().positions.contains_key(&position)
    }

    /// Reports whether `position` lies inside the grid.
    #[must_use]
    pub fn is_valid_position(&self, position: GridCoord) -> bool {
        in_bounds(position, self.width, self.height)
    }

    /// Blocks in the orthogonal neighbourhood of `position`, north first, clockwise.
    #[must_use]
    pub fn adjacent_blocks(&self, position: GridCoord) -> Vec<Block> {
        self.read().adjacent(position)
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().blocks.len()
    }

    /// Reports whether the grid holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().blocks.is_empty()
    }

    /// Version of the most recent commit that changed the grid.
    #[must_use]
    pub fn version(&self) -> GridVersion {
        self.read().version
    }

    /// Latest reading of the grid's logical clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.read().clock
    }

    /// Live blocks ordered by identifier.
    #[must_use]
    pub fn blocks(&self) -> Vec<Block> {
        self.read().blocks.values().copied().collect()
    }

    /// Captures an immutable copy of the grid for pure systems.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        let state = self.read();
        GridSnapshot::from_blocks(
            self.width,
            self.height,
            state.version,
            state.blocks.values().copied(),
        )
    }

    /// Verifies that both indices describe the same bijection.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.read().is_consistent()
    }

    fn read(&self) -> RwLockReadGuard<'_, GridState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GridState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only borrow of a [`Grid`].
///
/// Handed out by `query::grid` so holders of a world can inspect the
/// authority without bypassing command handling.
#[derive(Clone, Copy, Debug)]
pub struct GridView<'g> {
    grid: &'g Grid,
}

impl<'g> GridView<'g> {
    pub(crate) const fn new(grid: &'g Grid) -> Self {
        Self { grid }
    }

    /// Provides the dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        self.grid.dimensions()
    }

    /// Returns the block resting at `position`, if any.
    #[must_use]
    pub fn get_at(&self, position: GridCoord) -> Option<Block> {
        self.grid.get_at(position)
    }

    /// Returns the block with the provided identifier, if any.
    #[must_use]
    pub fn get_by_id(&self, id: BlockId) -> Option<Block> {
        self.grid.get_by_id(id)
    }

    /// Reports whether a block rests at `position`.
    #[must_use]
    pub fn is_occupied(&self, position: GridCoord) -> bool {
        self.grid.is_occupied(position)
    }

    /// Reports whether `position` lies inside the grid.
    #[must_use]
    pub fn is_valid_position(&self, position: GridCoord) -> bool {
        self.grid.is_valid_position(position)
    }

    /// Blocks in the orthogonal neighbourhood of `position`.
    #[must_use]
    pub fn adjacent_blocks(&self, position: GridCoord) -> Vec<Block> {
        self.grid.adjacent_blocks(position)
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    /// Reports whether the grid holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Version of the most recent commit that changed the grid.
    #[must_use]
    pub fn version(&self) -> GridVersion {
        self.grid.version()
    }

    /// Live blocks ordered by identifier.
    #[must_use]
    pub fn blocks(&self) -> Vec<Block> {
        self.grid.blocks()
    }

    /// Captures an immutable copy of the grid.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        self.grid.snapshot()
    }

    /// Verifies that both indices describe the same bijection.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.grid.is_consistent()
    }
}

/// Journaled view over the grid used by every mutation.
///
/// Obtained through [`Grid::commit`]; read methods observe the staged state.
#[derive(Debug)]
pub struct Transaction<'g> {
    state: &'g mut GridState,
    width: u32,
    height: u32,
    journal: Vec<Undo>,
    effects: Vec<Event>,
    clock_at_start: Timestamp,
    next_id_at_start: u64,
}

impl<'g> Transaction<'g> {
    fn begin(state: &'g mut GridState, width: u32, height: u32) -> Self {
        let clock_at_start = state.clock;
        let next_id_at_start = state.next_id;
        Self {
            state,
            width,
            height,
            journal: Vec::new(),
            effects: Vec::new(),
            clock_at_start,
            next_id_at_start,
        }
    }

    /// Provides the dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Version the transaction started from.
    #[must_use]
    pub fn version(&self) -> GridVersion {
        self.state.version
    }

    /// Returns the block resting at `position`, if any.
    #[must_use]
    pub fn get_at(&self, position: GridCoord) -> Option<Block> {
        self.state.block_at(position).copied()
    }

    /// Returns the block with the provided identifier, if any.
    #[must_use]
    pub fn get_by_id(&self, id: BlockId) -> Option<Block> {
        self.state.blocks.get(&id).copied()
    }

    /// Reports whether a block rests at `position`.
    #[must_use]
    pub fn is_occupied(&self, position: GridCoord) -> bool {
        self.state.positions.contains_key(&position)
    }

    /// Reports whether `position` lies inside the grid.
    #[must_use]
    pub fn is_valid_position(&self, position: GridCoord) -> bool {
        in_bounds(position, self.width, self.height)
    }

    /// Blocks in the orthogonal neighbourhood of `position`.
    #[must_use]
    pub fn adjacent_blocks(&self, position: GridCoord) -> Vec<Block> {
        self.state.adjacent(position)
    }

    /// Inserts `block` under its own identifier at its own position.
    ///
    /// The block is restamped with the authority's clock. Identifiers are
    /// issued once per grid: one at or below any identifier seen before is
    /// rejected with [`GridError::IdUnavailable`].
    pub fn place(&mut self, block: Block) -> Result<Block, GridError> {
        self.ensure_in_bounds(block.position())?;
        self.ensure_vacant(block.position())?;
        self.reserve(block.id())?;

        let placed = Block::new(
            block.id(),
            block.kind(),
            block.tier(),
            block.position(),
            self.stamp(),
        );
        Ok(self.insert(placed))
    }

    /// Allocates a fresh identifier and places a new block.
    pub fn place_new(
        &mut self,
        kind: BlockKind,
        tier: Tier,
        position: GridCoord,
    ) -> Result<Block, GridError> {
        self.ensure_in_bounds(position)?;
        self.ensure_vacant(position)?;

        let id = BlockId::new(self.state.next_id);
        self.reserve(id)?;
        let block = Block::new(id, kind, tier, position, self.stamp());
        Ok(self.insert(block))
    }

    /// Removes the block with the provided identifier.
    pub fn remove(&mut self, id: BlockId) -> Result<Block, GridError> {
        let block = self
            .state
            .detach(id)
            .ok_or(GridError::NotFound(BlockTarget::Id(id)))?;
        self.journal.push(Undo::Detached(block));
        let at = self.stamp();
        self.effects.push(Event::BlockRemoved {
            id,
            position: block.position(),
            kind: block.kind(),
            at,
        });
        Ok(block)
    }

    /// Removes the block resting at `position`.
    pub fn remove_at(&mut self, position: GridCoord) -> Result<Block, GridError> {
        self.ensure_in_bounds(position)?;
        let id = self
            .state
            .positions
            .get(&position)
            .copied()
            .ok_or(GridError::NotFound(BlockTarget::Position(position)))?;
        self.remove(id)
    }

    /// Moves a block to an empty cell, returning the relocated value.
    ///
    /// Moving a block onto its own cell changes nothing.
    pub fn move_block(&mut self, id: BlockId, to: GridCoord) -> Result<Block, GridError> {
        let current = self
            .get_by_id(id)
            .ok_or(GridError::NotFound(BlockTarget::Id(id)))?;
        self.ensure_in_bounds(to)?;
        if current.position() == to {
            return Ok(current);
        }
        self.ensure_vacant(to)?;
        Ok(self.relocate(current, to))
    }

    /// Exchanges the positions of two blocks.
    ///
    /// The second block is lifted into a staging slot off the grid, the first
    /// block moves into the vacated cell, and the second block lands on the
    /// first block's original cell. No two blocks ever claim one cell, and a
    /// failure at any step is undone with the rest of the transaction.
    pub fn swap(&mut self, first: BlockId, second: BlockId) -> Result<(Block, Block), GridError> {
        let first_block = self
            .get_by_id(first)
            .ok_or(GridError::NotFound(BlockTarget::Id(first)))?;
        let second_block = self
            .get_by_id(second)
            .ok_or(GridError::NotFound(BlockTarget::Id(second)))?;
        if first == second {
            return Ok((first_block, second_block));
        }

        let first_origin = first_block.position();
        let second_origin = second_block.position();

        let staged = self.stage_out(second)?;
        self.ensure_vacant(second_origin)?;
        let moved_first = self.relocate(first_block, second_origin);

        self.ensure_vacant(first_origin)?;
        let at = self.stamp();
        let moved_second = staged.with_position(first_origin, at);
        self.state.attach(moved_second);
        self.journal.push(Undo::Attached(second));
        self.effects.push(Event::BlockMoved {
            id: second,
            from: second_origin,
            to: first_origin,
            at,
        });

        Ok((moved_first, moved_second))
    }

    /// Replaces a block's tier in place on the grid.
    pub fn upgrade(&mut self, id: BlockId, tier: Tier) -> Result<Block, GridError> {
        let current = self
            .get_by_id(id)
            .ok_or(GridError::NotFound(BlockTarget::Id(id)))?;
        let _ = self.state.detach(id);
        let at = self.stamp();
        let upgraded = current.with_tier(tier, at);
        self.state.attach(upgraded);
        self.journal.push(Undo::Replaced(current));
        self.effects.push(Event::BlockUpgraded {
            id,
            position: upgraded.position(),
            tier,
            at,
        });
        Ok(upgraded)
    }

    /// Removes every block, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let ids: Vec<BlockId> = self.state.blocks.keys().copied().collect();
        for id in &ids {
            if let Some(block) = self.state.detach(*id) {
                self.journal.push(Undo::Detached(block));
            }
        }
        if !ids.is_empty() {
            let at = self.stamp();
            self.effects.push(Event::GridCleared {
                removed: ids.len(),
                at,
            });
        }
        ids.len()
    }

    fn insert(&mut self, block: Block) -> Block {
        self.state.attach(block);
        self.journal.push(Undo::Attached(block.id()));
        self.effects.push(Event::BlockPlaced {
            id: block.id(),
            position: block.position(),
            kind: block.kind(),
            at: block.created_at(),
        });
        block
    }

    fn relocate(&mut self, block: Block, to: GridCoord) -> Block {
        let _ = self.state.detach(block.id());
        let at = self.stamp();
        let moved = block.with_position(to, at);
        self.state.attach(moved);
        self.journal.push(Undo::Replaced(block));
        self.effects.push(Event::BlockMoved {
            id: block.id(),
            from: block.position(),
            to,
            at,
        });
        moved
    }

    fn stage_out(&mut self, id: BlockId) -> Result<Block, GridError> {
        let block = self
            .state
            .detach(id)
            .ok_or(GridError::NotFound(BlockTarget::Id(id)))?;
        self.journal.push(Undo::Detached(block));
        Ok(block)
    }

    /// Claims `id` and moves the allocation counter past it.
    fn reserve(&mut self, id: BlockId) -> Result<(), GridError> {
        if id.get() < self.state.next_id {
            return Err(GridError::IdUnavailable(id));
        }
        self.state.next_id = id
            .get()
            .checked_add(1)
            .ok_or(GridError::IdUnavailable(id))?;
        Ok(())
    }

    fn ensure_in_bounds(&self, position: GridCoord) -> Result<(), GridError> {
        if self.is_valid_position(position) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            })
        }
    }

    fn ensure_vacant(&self, position: GridCoord) -> Result<(), GridError> {
        match self.state.positions.get(&position) {
            Some(occupant) => Err(GridError::PositionOccupied {
                position,
                occupant: *occupant,
            }),
            None => Ok(()),
        }
    }

    fn stamp(&mut self) -> Timestamp {
        self.state.clock = self.state.clock.next();
        self.state.clock
    }

    fn finish(self) -> (Vec<Event>, GridVersion) {
        if !self.journal.is_empty() {
            self.state.version = self.state.version.next();
        }
        (self.effects, self.state.version)
    }

    fn rollback(self) -> usize {
        let undone = self.journal.len();
        for step in self.journal.into_iter().rev() {
            match step {
                Undo::Attached(id) => {
                    let _ = self.state.detach(id);
                }
                Undo::Detached(block) => self.state.attach(block),
                Undo::Replaced(previous) => {
                    let _ = self.state.detach(previous.id());
                    self.state.attach(previous);
                }
            }
        }
        self.state.clock = self.clock_at_start;
        self.state.next_id = self.next_id_at_start;
        undone
    }
}

#[derive(Clone, Copy, Debug)]
enum Undo {
    Attached(BlockId),
    Detached(Block),
    Replaced(Block),
}

#[derive(Debug, Default)]
struct GridState {
    blocks: BTreeMap<BlockId, Block>,
    positions: HashMap<GridCoord, BlockId>,
    next_id: u64,
    clock: Timestamp,
    version: GridVersion,
}

impl GridState {
    fn attach(&mut self, block: Block) {
        debug_assert!(!self.positions.contains_key(&block.position()));
        debug_assert!(!self.blocks.contains_key(&block.id()));
        let _ = self.positions.insert(block.position(), block.id());
        let _ = self.blocks.insert(block.id(), block);
    }

    fn detach(&mut self, id: BlockId) -> Option<Block> {
        let block = self.blocks.remove(&id)?;
        let _ = self.positions.remove(&block.position());
        Some(block)
    }

    fn block_at(&self, position: GridCoord) -> Option<&Block> {
        self.positions
            .get(&position)
            .and_then(|id| self.blocks.get(id))
    }

    fn adjacent(&self, position: GridCoord) -> Vec<Block> {
        position
            .neighbors()
            .filter_map(|neighbor| self.block_at(neighbor).copied())
            .collect()
    }

    fn is_consistent(&self) -> bool {
        self.blocks.len() == self.positions.len()
            && self.blocks.iter().all(|(id, block)| {
                block.id() == *id && self.positions.get(&block.position()) == Some(id)
            })
    }
}

fn in_bounds(position: GridCoord, width: u32, height: u32) -> bool {
    u32::try_from(position.x()).map_or(false, |x| x < width)
        && u32::try_from(position.y()).map_or(false, |y| y < height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(10, 10)
    }

    fn place(grid: &Grid, x: i32, y: i32) -> Block {
        grid.place_new(BlockKind::Work, Tier::BASE, GridCoord::new(x, y))
            .expect("place block")
    }

    #[test]
    fn place_rejects_occupied_and_out_of_bounds_cells() {
        let grid = grid();
        let first = place(&grid, 2, 2);

        assert_eq!(
            grid.place_new(BlockKind::Study, Tier::BASE, GridCoord::new(2, 2)),
            Err(GridError::PositionOccupied {
                position: GridCoord::new(2, 2),
                occupant: first.id(),
            })
        );
        assert_eq!(
            grid.place_new(BlockKind::Study, Tier::BASE, GridCoord::new(10, 0)),
            Err(GridError::OutOfBounds {
                position: GridCoord::new(10, 0),
                width: 10,
                height: 10,
            })
        );
        assert!(grid.place_new(BlockKind::Study, Tier::BASE, GridCoord::new(9, 9)).is_ok());
        assert_eq!(grid.len(), 2);
        assert!(grid.is_consistent());
    }

    #[test]
    fn place_keeps_supplied_identifier_and_advances_allocation() {
        let grid = grid();
        let external = Block::new(
            BlockId::new(40),
            BlockKind::Health,
            Tier::BASE,
            GridCoord::new(1, 1),
            Timestamp::new(999),
        );
        let placed = grid.place(external).expect("place external block");
        assert_eq!(placed.id(), BlockId::new(40));
        assert_eq!(placed.created_at(), Timestamp::new(1));

        let next = place(&grid, 2, 1);
        assert_eq!(next.id(), BlockId::new(41));

        let duplicate = external.with_position(GridCoord::new(5, 5), Timestamp::new(1));
        assert_eq!(
            grid.place(duplicate),
            Err(GridError::IdUnavailable(BlockId::new(40)))
        );
    }

    #[test]
    fn removed_identifiers_are_never_issued_again() {
        let grid = grid();
        let first = place(&grid, 0, 0);
        let _ = place(&grid, 1, 0);
        let _ = grid.remove(first.id()).expect("remove");

        let reused = Block::new(
            first.id(),
            BlockKind::Rest,
            Tier::BASE,
            GridCoord::new(4, 4),
            Timestamp::default(),
        );
        assert_eq!(grid.place(reused), Err(GridError::IdUnavailable(first.id())));
        assert_eq!(place(&grid, 4, 4).id(), BlockId::new(2));
    }

    #[test]
    fn exhausted_identifier_space_is_reported_not_reused() {
        let grid = grid();
        let last = Block::new(
            BlockId::new(u64::MAX),
            BlockKind::Work,
            Tier::BASE,
            GridCoord::new(0, 0),
            Timestamp::default(),
        );
        assert_eq!(
            grid.place(last),
            Err(GridError::IdUnavailable(BlockId::new(u64::MAX)))
        );

        let highest = Block::new(
            BlockId::new(u64::MAX - 1),
            BlockKind::Work,
            Tier::BASE,
            GridCoord::new(0, 0),
            Timestamp::default(),
        );
        let _ = grid.place(highest).expect("place highest usable id");

        assert_eq!(
            grid.place_new(BlockKind::Rest, Tier::BASE, GridCoord::new(1, 1)),
            Err(GridError::IdUnavailable(BlockId::new(u64::MAX)))
        );
        assert_eq!(grid.len(), 1);
        assert!(grid.is_consistent());
    }

    #[test]
    fn move_updates_both_indices_and_timestamp() {
        let grid = grid();
        let block = place(&grid, 0, 0);
        let moved = grid.move_block(block.id(), GridCoord::new(0, 3)).expect("move");

        assert_eq!(moved.position(), GridCoord::new(0, 3));
        assert!(moved.modified_at() > block.modified_at());
        assert_eq!(grid.get_at(GridCoord::new(0, 0)), None);
        assert_eq!(grid.get_at(GridCoord::new(0, 3)), Some(moved));
        assert_eq!(grid.get_by_id(block.id()), Some(moved));
        assert!(grid.is_consistent());
    }

    #[test]
    fn move_reports_missing_blocks_and_blocked_targets() {
        let grid = grid();
        let first = place(&grid, 0, 0);
        let second = place(&grid, 1, 0);

        assert_eq!(
            grid.move_block(BlockId::new(77), GridCoord::new(1, 1)),
            Err(GridError::NotFound(BlockTarget::Id(BlockId::new(77))))
        );
        assert_eq!(
            grid.move_block(first.id(), GridCoord::new(1, 0)),
            Err(GridError::PositionOccupied {
                position: GridCoord::new(1, 0),
                occupant: second.id(),
            })
        );
        assert!(matches!(
            grid.move_block(first.id(), GridCoord::new(-1, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn remove_by_id_and_position() {
        let grid = grid();
        let first = place(&grid, 3, 3);
        let second = place(&grid, 4, 3);

        assert_eq!(grid.remove(first.id()), Ok(first));
        assert_eq!(grid.remove_at(GridCoord::new(4, 3)), Ok(second));
        assert_eq!(
            grid.remove_at(GridCoord::new(4, 3)),
            Err(GridError::NotFound(BlockTarget::Position(GridCoord::new(4, 3))))
        );
        assert!(grid.is_empty());
        assert!(grid.is_consistent());
    }

    #[test]
    fn swap_exchanges_positions_and_emits_two_moves() {
        let grid = grid();
        let first = place(&grid, 5, 5);
        let second = place(&grid, 8, 5);

        let committed = grid
            .commit(|transaction| transaction.swap(first.id(), second.id()))
            .expect("swap");
        let (moved_first, moved_second) = committed.value;

        assert_eq!(moved_first.position(), GridCoord::new(8, 5));
        assert_eq!(moved_second.position(), GridCoord::new(5, 5));
        let moves: Vec<_> = committed
            .effects
            .iter()
            .filter(|event| matches!(event, Event::BlockMoved { .. }))
            .collect();
        assert_eq!(moves.len(), 2);
        assert_eq!(committed.effects.len(), 2);
        assert!(grid.is_consistent());
    }

    #[test]
    fn failed_transaction_restores_previous_state() {
        let grid = grid();
        let first = place(&grid, 5, 5);
        let second = place(&grid, 8, 5);
        let version = grid.version();
        let before = grid.blocks();

        let result = grid.commit(|transaction| {
            let _ = transaction.swap(first.id(), second.id())?;
            transaction.move_block(BlockId::new(99), GridCoord::new(0, 0))
        });

        assert!(result.is_err());
        assert_eq!(grid.blocks(), before);
        assert_eq!(grid.version(), version);
        assert!(grid.is_consistent());

        let third = place(&grid, 0, 0);
        assert_eq!(third.id(), BlockId::new(2));
        assert_eq!(third.created_at(), Timestamp::new(3));
    }

    #[test]
    fn commit_at_rejects_stale_versions() {
        let grid = grid();
        let observed = grid.version();
        let _ = place(&grid, 0, 0);

        let result =
            grid.commit_at(observed, |transaction| transaction.remove_at(GridCoord::new(0, 0)));
        assert_eq!(
            result,
            Err(GridError::ConcurrencyConflict {
                expected: observed,
                actual: observed.next(),
            })
        );
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn adjacent_blocks_ignore_diagonals() {
        let grid = grid();
        let north = place(&grid, 2, 1);
        let east = place(&grid, 3, 2);
        let _diagonal = place(&grid, 3, 3);

        assert_eq!(grid.adjacent_blocks(GridCoord::new(2, 2)), vec![north, east]);
    }

    #[test]
    fn clear_empties_both_indices() {
        let grid = grid();
        let _ = place(&grid, 0, 0);
        let _ = place(&grid, 1, 1);

        assert_eq!(grid.clear(), 2);
        assert!(grid.is_empty());
        assert!(!grid.is_occupied(GridCoord::new(0, 0)));
        assert_eq!(grid.clear(), 0);
    }

    #[test]
    fn rejected_commit_leaves_version_untouched() {
        let grid = grid();
        let version = grid.version();
        assert!(grid.remove(BlockId::new(1)).is_err());
        assert_eq!(grid.version(), version);
    }
}
