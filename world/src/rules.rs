//! Stateless validation predicates composed by every command handler.
//!
//! Rules read the grid through [`GridRead`] and never mutate it. Handlers run
//! them in order with [`validate`], which stops at the first failure, so a
//! rejected command never reaches the mutation step.

use blockwork_core::{Block, BlockId, BlockTarget, GridCoord, GridError, GridSnapshot};

use crate::grid::{Grid, GridView, Transaction};

/// Read access to grid occupancy shared by live transactions and snapshots.
pub trait GridRead {
    /// Provides the dimensions of the grid.
    fn dimensions(&self) -> (u32, u32);

    /// Returns the block resting at `position`, if any.
    fn block_at(&self, position: GridCoord) -> Option<Block>;

    /// Returns the block with the provided identifier, if any.
    fn block_by_id(&self, id: BlockId) -> Option<Block>;

    /// Reports whether `position` lies inside the grid.
    fn contains(&self, position: GridCoord) -> bool {
        let (width, height) = self.dimensions();
        u32::try_from(position.x()).map_or(false, |x| x < width)
            && u32::try_from(position.y()).map_or(false, |y| y < height)
    }
}

impl GridRead for Transaction<'_> {
    fn dimensions(&self) -> (u32, u32) {
        Transaction::dimensions(self)
    }

    fn block_at(&self, position: GridCoord) -> Option<Block> {
        self.get_at(position)
    }

    fn block_by_id(&self, id: BlockId) -> Option<Block> {
        self.get_by_id(id)
    }
}

impl GridRead for Grid {
    fn dimensions(&self) -> (u32, u32) {
        Grid::dimensions(self)
    }

    fn block_at(&self, position: GridCoord) -> Option<Block> {
        self.get_at(position)
    }

    fn block_by_id(&self, id: BlockId) -> Option<Block> {
        self.get_by_id(id)
    }
}

impl GridRead for GridView<'_> {
    fn dimensions(&self) -> (u32, u32) {
        GridView::dimensions(self)
    }

    fn block_at(&self, position: GridCoord) -> Option<Block> {
        self.get_at(position)
    }

    fn block_by_id(&self, id: BlockId) -> Option<Block> {
        self.get_by_id(id)
    }
}

impl GridRead for GridSnapshot {
    fn dimensions(&self) -> (u32, u32) {
        GridSnapshot::dimensions(self)
    }

    fn block_at(&self, position: GridCoord) -> Option<Block> {
        self.get(position).copied()
    }

    fn block_by_id(&self, id: BlockId) -> Option<Block> {
        self.find(id).copied()
    }
}

/// Single validation predicate over the current grid and a proposed input.
pub trait Rule {
    /// Succeeds when the input is acceptable against `grid`.
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError>;
}

/// Runs `rules` in order, stopping at the first failure.
pub fn validate(grid: &dyn GridRead, rules: &[&dyn Rule]) -> Result<(), GridError> {
    rules.iter().try_for_each(|rule| rule.check(grid))
}

/// The cell lies inside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InBounds(pub GridCoord);

impl Rule for InBounds {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        if grid.contains(self.0) {
            Ok(())
        } else {
            let (width, height) = grid.dimensions();
            Err(GridError::OutOfBounds {
                position: self.0,
                width,
                height,
            })
        }
    }
}

/// The cell holds no block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsEmpty(pub GridCoord);

impl Rule for IsEmpty {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        match grid.block_at(self.0) {
            Some(occupant) => Err(GridError::PositionOccupied {
                position: self.0,
                occupant: occupant.id(),
            }),
            None => Ok(()),
        }
    }
}

/// The cell holds a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsOccupied(pub GridCoord);

impl Rule for IsOccupied {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        if grid.block_at(self.0).is_some() {
            Ok(())
        } else {
            Err(GridError::PositionEmpty(self.0))
        }
    }
}

/// A block with the identifier is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockExists(pub BlockId);

impl Rule for BlockExists {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        grid.block_by_id(self.0)
            .map(|_| ())
            .ok_or(GridError::NotFound(BlockTarget::Id(self.0)))
    }
}

/// The block rests at the expected cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestsAt {
    /// Block addressed by the caller.
    pub block: BlockId,
    /// Cell the caller believes the block occupies.
    pub position: GridCoord,
}

impl Rule for RestsAt {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        let block = grid
            .block_by_id(self.block)
            .ok_or(GridError::NotFound(BlockTarget::Id(self.block)))?;
        if block.position() == self.position {
            Ok(())
        } else {
            Err(GridError::OriginMismatch {
                block: self.block,
                expected: self.position,
                actual: block.position(),
            })
        }
    }
}

/// The Manhattan distance between two cells stays within a limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithinRange {
    /// Starting cell.
    pub from: GridCoord,
    /// Destination cell.
    pub to: GridCoord,
    /// Largest permitted Manhattan distance.
    pub max_range: u32,
}

impl Rule for WithinRange {
    fn check(&self, _grid: &dyn GridRead) -> Result<(), GridError> {
        let distance = self.from.manhattan_distance(self.to);
        if distance <= self.max_range {
            Ok(())
        } else {
            Err(GridError::RangeExceeded {
                from: self.from,
                to: self.to,
                distance,
                max_range: self.max_range,
            })
        }
    }
}

/// Both swap participants can reach each other's cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapReachable {
    /// Cell of the dragged block.
    pub first: GridCoord,
    /// Cell of the displaced block.
    pub second: GridCoord,
    /// Largest permitted Manhattan distance.
    pub max_range: u32,
}

impl Rule for SwapReachable {
    fn check(&self, grid: &dyn GridRead) -> Result<(), GridError> {
        let forward = WithinRange {
            from: self.first,
            to: self.second,
            max_range: self.max_range,
        };
        let backward = WithinRange {
            from: self.second,
            to: self.first,
            max_range: self.max_range,
        };
        validate(grid, &[&forward, &backward]).map_err(|_| GridError::SwapValidationFailed {
            first: self.first,
            second: self.second,
            distance: self.first.manhattan_distance(self.second),
            max_range: self.max_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::{BlockKind, GridVersion, Tier, Timestamp};

    fn snapshot_with(blocks: &[(u64, i32, i32)]) -> GridSnapshot {
        GridSnapshot::from_blocks(
            10,
            10,
            GridVersion::default(),
            blocks.iter().map(|&(id, x, y)| {
                Block::new(
                    BlockId::new(id),
                    BlockKind::Work,
                    Tier::BASE,
                    GridCoord::new(x, y),
                    Timestamp::new(id),
                )
            }),
        )
    }

    #[test]
    fn validate_stops_at_first_failure() {
        let grid = snapshot_with(&[(1, 2, 2)]);
        let target = GridCoord::new(12, 2);

        let result = validate(&grid, &[&InBounds(target), &IsEmpty(GridCoord::new(2, 2))]);

        assert!(matches!(result, Err(GridError::OutOfBounds { .. })));
    }

    #[test]
    fn occupancy_rules_report_specific_errors() {
        let grid = snapshot_with(&[(1, 2, 2)]);

        assert_eq!(
            IsEmpty(GridCoord::new(2, 2)).check(&grid),
            Err(GridError::PositionOccupied {
                position: GridCoord::new(2, 2),
                occupant: BlockId::new(1),
            })
        );
        assert_eq!(
            IsOccupied(GridCoord::new(3, 3)).check(&grid),
            Err(GridError::PositionEmpty(GridCoord::new(3, 3)))
        );
        assert_eq!(
            BlockExists(BlockId::new(9)).check(&grid),
            Err(GridError::NotFound(BlockTarget::Id(BlockId::new(9))))
        );
        assert_eq!(
            RestsAt {
                block: BlockId::new(1),
                position: GridCoord::new(0, 0),
            }
            .check(&grid),
            Err(GridError::OriginMismatch {
                block: BlockId::new(1),
                expected: GridCoord::new(0, 0),
                actual: GridCoord::new(2, 2),
            })
        );
    }

    #[test]
    fn range_is_diamond_shaped() {
        let grid = snapshot_with(&[]);
        let origin = GridCoord::new(5, 5);
        let rule = |to| WithinRange {
            from: origin,
            to,
            max_range: 3,
        };

        assert!(rule(GridCoord::new(8, 5)).check(&grid).is_ok());
        assert!(rule(GridCoord::new(6, 7)).check(&grid).is_ok());
        // A square metric would accept the corner; the diamond does not.
        assert!(rule(GridCoord::new(7, 7)).check(&grid).is_err());
    }

    #[test]
    fn swap_reachability_is_symmetric() {
        let grid = snapshot_with(&[]);
        let near = |first, second| SwapReachable {
            first,
            second,
            max_range: 3,
        };
        let a = GridCoord::new(5, 5);
        let b = GridCoord::new(9, 5);

        assert_eq!(near(a, b).check(&grid).is_ok(), near(b, a).check(&grid).is_ok());
        assert!(matches!(
            near(b, a).check(&grid),
            Err(GridError::SwapValidationFailed { distance: 4, .. })
        ));
    }
}
