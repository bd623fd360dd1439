#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blockwork grid engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world validates and executes those
//! commands through its single transactional mutation path, and then
//! publishes [`Event`] values to registered observers. Systems such as
//! pattern recognition consume immutable [`GridSnapshot`] values and respond
//! with candidate [`Pattern`] values that the world may later execute.

mod config;
mod error;
mod pattern;
mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{GridConfig, ResolutionStrategy};
pub use error::{ConfigError, GridError};
pub use pattern::{Pattern, PatternId, PatternKind, PatternOutcome, UpgradedBlock};
pub use snapshot::GridSnapshot;

/// Location of a single grid cell expressed as signed column and row values.
///
/// Coordinates are signed so that adapters may forward raw pointer-derived
/// cells; the authority rejects anything outside its extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    x: i32,
    y: i32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: GridCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the coordinate shifted by the provided offsets, if representable.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Option<GridCoord> {
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }

    /// Orthogonal neighbours in north, east, south, west order.
    ///
    /// Diagonals are never part of the neighbourhood.
    pub fn neighbors(self) -> impl Iterator<Item = GridCoord> {
        [(0, -1), (1, 0), (0, 1), (-1, 0)]
            .into_iter()
            .filter_map(move |(dx, dy)| self.offset(dx, dy))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Unique identifier assigned to a block by the grid authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(u64);

impl BlockId {
    /// Creates a new block identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Categories of life activity a block can represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Paid work and career effort.
    Work,
    /// Learning and study sessions.
    Study,
    /// Physical exercise.
    Exercise,
    /// Time spent with friends.
    Social,
    /// Sleep and recovery.
    Rest,
    /// Time spent with family.
    Family,
    /// Medical and wellbeing care.
    Health,
    /// Creative projects and hobbies.
    Creative,
}

impl BlockKind {
    /// Every block kind in declaration order.
    pub const ALL: [BlockKind; 8] = [
        Self::Work,
        Self::Study,
        Self::Exercise,
        Self::Social,
        Self::Rest,
        Self::Family,
        Self::Health,
        Self::Creative,
    ];

    /// Lowercase label used in identifiers and scripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Exercise => "exercise",
            Self::Social => "social",
            Self::Rest => "rest",
            Self::Family => "family",
            Self::Health => "health",
            Self::Creative => "creative",
        }
    }

    /// Parses a label produced by [`BlockKind::label`], ignoring ASCII case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Upgrade level of a block. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tier(u32);

impl Tier {
    /// Tier assigned to freshly placed blocks.
    pub const BASE: Tier = Tier(1);

    /// Creates a tier, rejecting zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Retrieves the numeric tier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Tier produced by merging blocks of this tier.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::BASE
    }
}

impl TryFrom<u32> for Tier {
    type Error = GridError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(GridError::InvalidTier(value))
    }
}

impl From<Tier> for u32 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}

/// Logical clock value issued by the grid authority.
///
/// Every committed mutation advances the clock, so timestamps are strictly
/// increasing within the lifetime of one grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from a raw clock value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the raw clock value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the immediately following timestamp.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Monotonic counter of committed grid transactions used for optimistic checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridVersion(u64);

impl GridVersion {
    /// Creates a version from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the raw counter value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the version that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Immutable record of a block occupying one grid cell.
///
/// Blocks are never mutated in place; position and tier changes produce a new
/// value through [`Block::with_position`] and [`Block::with_tier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    tier: Tier,
    position: GridCoord,
    created_at: Timestamp,
    modified_at: Timestamp,
}

impl Block {
    /// Creates a block whose creation and modification times coincide.
    #[must_use]
    pub const fn new(
        id: BlockId,
        kind: BlockKind,
        tier: Tier,
        position: GridCoord,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            tier,
            position,
            created_at,
            modified_at: created_at,
        }
    }

    /// Identifier of the block.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Category of the block.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Upgrade tier of the block.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Cell occupied by the block.
    #[must_use]
    pub const fn position(&self) -> GridCoord {
        self.position
    }

    /// Time at which the block was placed.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the most recent change to the block.
    #[must_use]
    pub const fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    /// Returns a copy relocated to `position`, stamped with `at`.
    #[must_use]
    pub const fn with_position(self, position: GridCoord, at: Timestamp) -> Self {
        Self {
            position,
            modified_at: at,
            ..self
        }
    }

    /// Returns a copy upgraded to `tier`, stamped with `at`.
    #[must_use]
    pub const fn with_tier(self, tier: Tier, at: Timestamp) -> Self {
        Self {
            tier,
            modified_at: at,
            ..self
        }
    }
}

/// Addresses a block either by identifier or by the cell it occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockTarget {
    /// Block selected by identifier.
    Id(BlockId),
    /// Block selected by the cell it occupies.
    Position(GridCoord),
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "block {id}"),
            Self::Position(position) => write!(f, "position {position}"),
        }
    }
}

/// Commands that express all permissible grid mutations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Requests placement of a new block at the provided cell.
    PlaceBlock {
        /// Cell the block should occupy.
        position: GridCoord,
        /// Category of the new block.
        kind: BlockKind,
        /// Initial tier; defaults to [`Tier::BASE`] when omitted.
        tier: Option<Tier>,
    },
    /// Requests removal of an existing block.
    RemoveBlock {
        /// Block selected for removal.
        target: BlockTarget,
    },
    /// Requests that a block move to an empty cell.
    MoveBlock {
        /// Block that should move.
        block: BlockId,
        /// Destination cell.
        to: GridCoord,
    },
    /// Opens a drag session for a block resting at `origin`.
    StartDrag {
        /// Block picked up by the player.
        block: BlockId,
        /// Cell the block occupies when the drag begins.
        origin: GridCoord,
    },
    /// Updates the hovered cell of the active drag session.
    UpdateDragPreview {
        /// Cell currently hovered.
        position: GridCoord,
    },
    /// Drops the dragged block onto `target`, moving or swapping it.
    CompleteDrag {
        /// Cell the block was released over.
        target: GridCoord,
    },
    /// Abandons the active drag session without touching the grid.
    CancelDrag,
    /// Executes non-conflicting patterns selected by the resolver in one transaction.
    ExecutePatterns {
        /// Patterns selected by the resolver, in execution order.
        patterns: Vec<Pattern>,
        /// Grid version the patterns were recognised against.
        version: GridVersion,
    },
    /// Removes every block from the grid.
    ClearGrid,
}

/// Notifications published by the world after committing a mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Confirms that a block was placed.
    BlockPlaced {
        /// Identifier allocated to the block.
        id: BlockId,
        /// Cell the block occupies.
        position: GridCoord,
        /// Category of the block.
        kind: BlockKind,
        /// Time the placement was committed.
        at: Timestamp,
    },
    /// Confirms that a block was removed or consumed.
    BlockRemoved {
        /// Identifier of the removed block.
        id: BlockId,
        /// Cell the block occupied before removal.
        position: GridCoord,
        /// Category of the removed block.
        kind: BlockKind,
        /// Time the removal was committed.
        at: Timestamp,
    },
    /// Confirms that a block moved between two cells.
    BlockMoved {
        /// Identifier of the block that moved.
        id: BlockId,
        /// Cell occupied before the move.
        from: GridCoord,
        /// Cell occupied after the move.
        to: GridCoord,
        /// Time the move was committed.
        at: Timestamp,
    },
    /// Confirms that a block absorbed a merge and advanced a tier.
    BlockUpgraded {
        /// Identifier of the upgraded block.
        id: BlockId,
        /// Cell the block occupies.
        position: GridCoord,
        /// Tier after the upgrade.
        tier: Tier,
        /// Time the upgrade was committed.
        at: Timestamp,
    },
    /// Announces that a drag session opened.
    DragStarted {
        /// Block being dragged.
        block: BlockId,
        /// Cell the drag started from.
        origin: GridCoord,
    },
    /// Announces that a drag session closed without a mutation.
    DragCancelled {
        /// Block that was being dragged.
        block: BlockId,
        /// Cell the block remains at.
        origin: GridCoord,
    },
    /// Announces that every block was removed at once.
    GridCleared {
        /// Number of blocks removed.
        removed: usize,
        /// Time the clear was committed.
        at: Timestamp,
    },
}

impl Event {
    /// Reports whether the event describes a change to grid occupancy.
    #[must_use]
    pub const fn mutates_grid(&self) -> bool {
        !matches!(self, Self::DragStarted { .. } | Self::DragCancelled { .. })
    }
}
