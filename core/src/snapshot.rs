//! Immutable grid captures handed to pure systems.

use std::collections::BTreeMap;

use crate::{Block, BlockId, GridCoord, GridVersion};

/// Read-only copy of grid occupancy taken after a committed mutation.
///
/// Recognizers scan snapshots rather than the live grid, so a scan never
/// races with later mutations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridSnapshot {
    width: u32,
    height: u32,
    version: GridVersion,
    cells: BTreeMap<GridCoord, Block>,
}

impl GridSnapshot {
    /// Captures a snapshot from blocks keyed by their own positions.
    ///
    /// Blocks lying outside the extent are dropped. When two blocks claim the
    /// same cell the later one wins; the authority never produces such input.
    #[must_use]
    pub fn from_blocks<I>(width: u32, height: u32, version: GridVersion, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        let mut snapshot = Self {
            width,
            height,
            version,
            cells: BTreeMap::new(),
        };
        for block in blocks {
            if snapshot.contains(block.position()) {
                let _ = snapshot.cells.insert(block.position(), block);
            }
        }
        snapshot
    }

    /// Provides the dimensions of the captured grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Version of the grid at capture time.
    #[must_use]
    pub const fn version(&self) -> GridVersion {
        self.version
    }

    /// Reports whether `position` lies inside the captured extent.
    #[must_use]
    pub fn contains(&self, position: GridCoord) -> bool {
        u32::try_from(position.x()).map_or(false, |x| x < self.width)
            && u32::try_from(position.y()).map_or(false, |y| y < self.height)
    }

    /// Returns the block resting at `position`, if any.
    #[must_use]
    pub fn get(&self, position: GridCoord) -> Option<&Block> {
        self.cells.get(&position)
    }

    /// Returns the block with the provided identifier, if any.
    #[must_use]
    pub fn find(&self, id: BlockId) -> Option<&Block> {
        self.cells.values().find(|block| block.id() == id)
    }

    /// Iterator over captured blocks in ascending coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.cells.values()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
