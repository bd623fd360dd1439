//! Typed failures reported by the grid authority and configuration loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BlockId, BlockTarget, GridCoord, GridVersion, PatternId};

/// Reasons a grid operation or command may be rejected.
///
/// Every expected business failure is reported through this type; the engine
/// never panics on invalid input.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GridError {
    /// The coordinate lies outside the configured grid extent.
    #[error("position {position} lies outside the {width}x{height} grid")]
    OutOfBounds {
        /// Rejected coordinate.
        position: GridCoord,
        /// Grid width in cells.
        width: u32,
        /// Grid height in cells.
        height: u32,
    },
    /// The coordinate is already held by another block.
    #[error("position {position} is already occupied by block {occupant}")]
    PositionOccupied {
        /// Contested coordinate.
        position: GridCoord,
        /// Block currently occupying the coordinate.
        occupant: BlockId,
    },
    /// A rule required an occupied cell but found it empty.
    #[error("position {0} is empty")]
    PositionEmpty(GridCoord),
    /// No block matches the provided identifier or position.
    #[error("{0} not found")]
    NotFound(BlockTarget),
    /// A drag session is already open.
    #[error("block {active} is already being dragged")]
    DragAlreadyActive {
        /// Block owned by the active session.
        active: BlockId,
    },
    /// The operation requires an open drag session.
    #[error("no drag session is active")]
    NoActiveDrag,
    /// The target cell is further than the permitted drag range.
    #[error("{to} is {distance} cells from {from}, beyond the range of {max_range}")]
    RangeExceeded {
        /// Cell the drag started from.
        from: GridCoord,
        /// Requested destination.
        to: GridCoord,
        /// Manhattan distance between the two cells.
        distance: u32,
        /// Largest permitted Manhattan distance.
        max_range: u32,
    },
    /// One of the swap participants cannot reach the other's cell.
    #[error("cannot swap {first} and {second}: distance {distance} exceeds range {max_range}")]
    SwapValidationFailed {
        /// Cell of the dragged block.
        first: GridCoord,
        /// Cell of the displaced block.
        second: GridCoord,
        /// Manhattan distance between the two cells.
        distance: u32,
        /// Largest permitted Manhattan distance.
        max_range: u32,
    },
    /// The drag origin does not match where the block actually rests.
    #[error("block {block} rests at {actual}, not {expected}")]
    OriginMismatch {
        /// Block addressed by the drag.
        block: BlockId,
        /// Origin supplied by the caller.
        expected: GridCoord,
        /// Cell the block actually occupies.
        actual: GridCoord,
    },
    /// The resolver was handed an empty conflict group.
    #[error("no valid pattern to select")]
    NoValidPattern,
    /// The grid changed since the caller observed it.
    #[error("grid version {actual:?} does not match expected {expected:?}")]
    ConcurrencyConflict {
        /// Version the caller observed.
        expected: GridVersion,
        /// Version currently committed.
        actual: GridVersion,
    },
    /// Tiers start at one.
    #[error("tier {0} is invalid; tiers start at 1")]
    InvalidTier(u32),
    /// A pattern no longer matches the blocks on the grid.
    #[error("pattern {0} no longer matches the grid")]
    PatternStale(PatternId),
    /// The identifier was already issued, or the identifier space is spent.
    #[error("block identifier {0} is unavailable")]
    IdUnavailable(BlockId),
}

/// Reasons a [`crate::GridConfig`] may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Width and height must both be positive.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    ZeroDimension {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },
    /// Dimensions must fit the signed coordinate space.
    #[error("grid dimension {0} exceeds the coordinate space")]
    DimensionTooLarge(u32),
    /// The drag range must be positive.
    #[error("maximum drag range must be positive")]
    ZeroDragRange,
    /// Groups of fewer than two blocks cannot form a pattern.
    #[error("minimum group size must be at least 2, got {0}")]
    GroupSizeTooSmall(usize),
    /// The tier ceiling must admit at least one merge.
    #[error("maximum tier must be at least 2, got {0}")]
    MaxTierTooSmall(u32),
    /// The strategy label is not recognised.
    #[error("unknown resolution strategy `{0}`")]
    UnknownStrategy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_cell() {
        let error = GridError::OutOfBounds {
            position: GridCoord::new(10, 0),
            width: 10,
            height: 10,
        };
        assert_eq!(
            error.to_string(),
            "position (10, 0) lies outside the 10x10 grid"
        );

        let missing = GridError::NotFound(BlockTarget::Id(BlockId::new(7)));
        assert_eq!(missing.to_string(), "block #7 not found");
    }
}
