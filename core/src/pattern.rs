//! Candidate actions detected over sets of grid cells.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{BlockId, BlockKind, GridCoord, GridError, GridSnapshot, Tier};

/// Families of patterns the recognizers can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Orthogonally connected group of same-kind blocks.
    Match,
    /// Straight horizontal or vertical run of same-kind blocks.
    Line,
    /// Connected group of same-kind, same-tier blocks that fuse into one.
    Merge,
}

impl PatternKind {
    /// Priority assigned to a pattern of minimum size.
    #[must_use]
    pub const fn base_priority(self) -> i32 {
        match self {
            Self::Match => 10,
            Self::Line => 20,
            Self::Merge => 30,
        }
    }

    /// Score contributed per tier of every covered block.
    #[must_use]
    pub const fn score_per_tier(self) -> u32 {
        match self {
            Self::Match => 10,
            Self::Line => 15,
            Self::Merge => 25,
        }
    }

    /// Lowercase label used in identifiers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Line => "line",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable identifier of a pattern, derived from its kind and cells.
///
/// Identical detections on identical grids always yield identical
/// identifiers, which makes identifier order a deterministic tie-breaker.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternId(String);

impl PatternId {
    /// Wraps an explicit identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrowed textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn derive(kind: PatternKind, block_kind: BlockKind, positions: &BTreeSet<GridCoord>) -> Self {
        let cells: Vec<String> = positions
            .iter()
            .map(|position| format!("{},{}", position.x(), position.y()))
            .collect();
        Self(format!("{kind}:{block_kind}:{}", cells.join(";")))
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable candidate action over a set of cells.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    id: PatternId,
    kind: PatternKind,
    block_kind: BlockKind,
    priority: i32,
    positions: BTreeSet<GridCoord>,
}

impl Pattern {
    /// Creates a pattern whose identifier is derived from its contents.
    #[must_use]
    pub fn new<I>(kind: PatternKind, block_kind: BlockKind, positions: I, priority: i32) -> Self
    where
        I: IntoIterator<Item = GridCoord>,
    {
        let positions: BTreeSet<GridCoord> = positions.into_iter().collect();
        let id = PatternId::derive(kind, block_kind, &positions);
        Self {
            id,
            kind,
            block_kind,
            priority,
            positions,
        }
    }

    /// Creates a pattern with an explicit identifier.
    #[must_use]
    pub fn with_id<I>(
        id: PatternId,
        kind: PatternKind,
        block_kind: BlockKind,
        positions: I,
        priority: i32,
    ) -> Self
    where
        I: IntoIterator<Item = GridCoord>,
    {
        Self {
            id,
            kind,
            block_kind,
            priority,
            positions: positions.into_iter().collect(),
        }
    }

    /// Creates a pattern whose priority follows from its kind and size.
    ///
    /// Every cell beyond `min_group_size` adds one point, so larger groups
    /// outrank smaller groups of the same kind.
    #[must_use]
    pub fn detected<I>(
        kind: PatternKind,
        block_kind: BlockKind,
        positions: I,
        min_group_size: usize,
    ) -> Self
    where
        I: IntoIterator<Item = GridCoord>,
    {
        let positions: BTreeSet<GridCoord> = positions.into_iter().collect();
        let bonus = positions.len().saturating_sub(min_group_size);
        let priority = kind
            .base_priority()
            .saturating_add(i32::try_from(bonus).unwrap_or(i32::MAX));
        Self::new(kind, block_kind, positions, priority)
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &PatternId {
        &self.id
    }

    /// Family of the pattern.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Category of the blocks covered by the pattern.
    #[must_use]
    pub const fn block_kind(&self) -> BlockKind {
        self.block_kind
    }

    /// Priority used by the resolver.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Cells covered by the pattern in ascending order.
    #[must_use]
    pub fn positions(&self) -> &BTreeSet<GridCoord> {
        &self.positions
    }

    /// Number of covered cells.
    #[must_use]
    pub fn size(&self) -> usize {
        self.positions.len()
    }

    /// Reports whether the pattern covers `position`.
    #[must_use]
    pub fn contains(&self, position: GridCoord) -> bool {
        self.positions.contains(&position)
    }

    /// Two patterns conflict when their cell sets intersect.
    #[must_use]
    pub fn conflicts_with(&self, other: &Pattern) -> bool {
        let (small, large) = if self.size() <= other.size() {
            (self, other)
        } else {
            (other, self)
        };
        small.positions.iter().any(|position| large.contains(*position))
    }

    /// Lowest covered cell; merges keep their upgraded block here.
    #[must_use]
    pub fn anchor(&self) -> Option<GridCoord> {
        self.positions.iter().next().copied()
    }
}

/// Block produced by executing a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradedBlock {
    /// Surviving block, when projected against a live snapshot.
    pub id: Option<BlockId>,
    /// Cell the surviving block keeps.
    pub position: GridCoord,
    /// Category of the surviving block.
    pub kind: BlockKind,
    /// Tier after the merge.
    pub tier: Tier,
}

/// Side-effect free projection of what executing a pattern would do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternOutcome {
    /// Pattern the projection was computed for.
    pub pattern: PatternId,
    /// Cells emptied by the execution, in ascending order.
    pub cleared: Vec<GridCoord>,
    /// Block left behind by a merge.
    pub upgraded: Option<UpgradedBlock>,
    /// Value used by the highest-value strategy.
    pub score: u32,
}

impl PatternOutcome {
    /// Projects the pattern against the blocks captured in `snapshot`.
    ///
    /// Fails with [`GridError::PatternStale`] when any covered cell is empty,
    /// holds another kind of block, or (for merges) holds a different tier.
    pub fn project(pattern: &Pattern, snapshot: &GridSnapshot) -> Result<Self, GridError> {
        let stale = || GridError::PatternStale(pattern.id().clone());
        let mut tiers = Vec::with_capacity(pattern.size());
        for position in pattern.positions() {
            let block = snapshot.get(*position).ok_or_else(stale)?;
            if block.kind() != pattern.block_kind() {
                return Err(stale());
            }
            tiers.push(block.tier());
        }

        let anchor = pattern.anchor().ok_or_else(stale)?;
        let anchor_id = snapshot.get(anchor).map(|block| block.id());
        if pattern.kind() == PatternKind::Merge && tiers.iter().any(|tier| *tier != tiers[0]) {
            return Err(stale());
        }

        Ok(Self::from_tiers(pattern, &tiers, anchor, anchor_id))
    }

    /// Projects the pattern assuming every covered block sits at the base tier.
    #[must_use]
    pub fn nominal(pattern: &Pattern) -> Self {
        let tiers = vec![Tier::BASE; pattern.size()];
        let anchor = pattern.anchor().unwrap_or(GridCoord::new(0, 0));
        Self::from_tiers(pattern, &tiers, anchor, None)
    }

    fn from_tiers(
        pattern: &Pattern,
        tiers: &[Tier],
        anchor: GridCoord,
        anchor_id: Option<BlockId>,
    ) -> Self {
        let score = tiers
            .iter()
            .map(|tier| tier.get().saturating_mul(pattern.kind().score_per_tier()))
            .fold(0_u32, u32::saturating_add);

        let (cleared, upgraded) = match pattern.kind() {
            PatternKind::Match | PatternKind::Line => {
                (pattern.positions().iter().copied().collect(), None)
            }
            PatternKind::Merge => {
                let tier = tiers.first().copied().unwrap_or(Tier::BASE).next();
                let cleared = pattern
                    .positions()
                    .iter()
                    .copied()
                    .filter(|position| *position != anchor)
                    .collect();
                let upgraded = UpgradedBlock {
                    id: anchor_id,
                    position: anchor,
                    kind: pattern.block_kind(),
                    tier,
                };
                (cleared, Some(upgraded))
            }
        };

        Self {
            pattern: pattern.id().clone(),
            cleared,
            upgraded,
            score,
        }
    }
}
