//! Construction-time configuration consumed by the world and systems.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, GridCoord};

const DEFAULT_DIMENSION: u32 = 10;
const DEFAULT_MAX_DRAG_RANGE: u32 = 3;
const DEFAULT_MIN_GROUP_SIZE: usize = 3;
const DEFAULT_MAX_TIER: u32 = 5;
const DEFAULT_MAX_CASCADE_DEPTH: u32 = 8;
const DEFAULT_SEED: u64 = 0x5eed_b10c_0000_0001;

/// Strategy used to pick one pattern out of a group of conflicting candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Highest priority wins; ties fall to larger size, then lower identifier.
    #[default]
    Priority,
    /// Highest projected outcome score wins.
    HighestValue,
    /// Largest pattern wins.
    LargestFirst,
    /// Seeded random pick, reproducible for identical inputs.
    Random,
    /// No exclusion; every candidate is returned.
    ExecuteAll,
}

impl ResolutionStrategy {
    /// Every strategy in declaration order.
    pub const ALL: [ResolutionStrategy; 5] = [
        Self::Priority,
        Self::HighestValue,
        Self::LargestFirst,
        Self::Random,
        Self::ExecuteAll,
    ];

    /// Snake-case label matching the serialized form.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::HighestValue => "highest_value",
            Self::LargestFirst => "largest_first",
            Self::Random => "random",
            Self::ExecuteAll => "execute_all",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.label() == normalized)
            .ok_or_else(|| ConfigError::UnknownStrategy(value.to_owned()))
    }
}

/// Dimensions and tuning knobs supplied when the world is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Number of columns in the grid.
    pub width: u32,
    /// Number of rows in the grid.
    pub height: u32,
    /// Largest Manhattan distance a drag may cover.
    pub max_drag_range: u32,
    /// Strategy used when recognised patterns overlap.
    pub strategy: ResolutionStrategy,
    /// Seed feeding the random strategy.
    pub seed: u64,
    /// Smallest group of blocks that forms a pattern. A threshold, never an exact count.
    pub min_group_size: usize,
    /// Tier ceiling; blocks at this tier no longer merge.
    pub max_tier: u32,
    /// Upper bound on recognise/execute passes following one command.
    pub max_cascade_depth: u32,
    /// Whether the engine executes resolved patterns automatically.
    pub auto_resolve: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            max_drag_range: DEFAULT_MAX_DRAG_RANGE,
            strategy: ResolutionStrategy::Priority,
            seed: DEFAULT_SEED,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            max_tier: DEFAULT_MAX_TIER,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            auto_resolve: true,
        }
    }
}

impl GridConfig {
    /// Creates a configuration with the provided dimensions and default tuning.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Replaces the maximum drag range.
    #[must_use]
    pub fn with_max_drag_range(mut self, max_drag_range: u32) -> Self {
        self.max_drag_range = max_drag_range;
        self
    }

    /// Replaces the resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replaces the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the minimum pattern group size.
    #[must_use]
    pub fn with_min_group_size(mut self, min_group_size: usize) -> Self {
        self.min_group_size = min_group_size;
        self
    }

    /// Enables or disables automatic pattern execution.
    #[must_use]
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    /// Checks every field against its documented constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        for dimension in [self.width, self.height] {
            if i32::try_from(dimension).is_err() {
                return Err(ConfigError::DimensionTooLarge(dimension));
            }
        }
        if self.max_drag_range == 0 {
            return Err(ConfigError::ZeroDragRange);
        }
        if self.min_group_size < 2 {
            return Err(ConfigError::GroupSizeTooSmall(self.min_group_size));
        }
        if self.max_tier < 2 {
            return Err(ConfigError::MaxTierTooSmall(self.max_tier));
        }
        Ok(())
    }

    /// Reports whether `position` lies inside the configured extent.
    #[must_use]
    pub fn contains(&self, position: GridCoord) -> bool {
        u32::try_from(position.x()).map_or(false, |x| x < self.width)
            && u32::try_from(position.y()).map_or(false, |y| y < self.height)
    }
}
