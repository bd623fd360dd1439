#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that chooses which overlapping patterns execute.
//!
//! Candidates whose cells intersect are partitioned into conflict groups
//! (transitively, so A–B and B–C put A, B and C in one group). One winner is
//! picked per group according to the configured [`ResolutionStrategy`];
//! groups never influence each other.

use std::cmp::Ordering;

use blockwork_core::{
    GridConfig, GridError, GridSnapshot, Pattern, PatternOutcome, ResolutionStrategy,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Partitions `patterns` into maximal groups of transitively overlapping candidates.
///
/// Groups appear in order of their first member in the input and keep the
/// input order internally. A pattern that overlaps nothing forms a group of
/// its own.
#[must_use]
pub fn conflict_groups(patterns: &[Pattern]) -> Vec<Vec<Pattern>> {
    let mut sets = DisjointSets::new(patterns.len());
    for (i, first) in patterns.iter().enumerate() {
        for (j, second) in patterns.iter().enumerate().skip(i + 1) {
            if first.conflicts_with(second) {
                sets.union(i, j);
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Pattern>)> = Vec::new();
    for (index, pattern) in patterns.iter().enumerate() {
        let root = sets.find(index);
        match groups.iter_mut().find(|(group_root, _)| *group_root == root) {
            Some((_, members)) => members.push(pattern.clone()),
            None => groups.push((root, vec![pattern.clone()])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

/// Selects winners among conflicting patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolver {
    strategy: ResolutionStrategy,
    seed: u64,
}

impl Resolver {
    /// Creates a resolver using `strategy`; `seed` only affects the random strategy.
    #[must_use]
    pub const fn new(strategy: ResolutionStrategy, seed: u64) -> Self {
        Self { strategy, seed }
    }

    /// Creates a resolver from the strategy and seed in `config`.
    #[must_use]
    pub const fn from_config(config: &GridConfig) -> Self {
        Self::new(config.strategy, config.seed)
    }

    /// Strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Picks the single best pattern of `group` using nominal outcome scores.
    ///
    /// Under [`ResolutionStrategy::ExecuteAll`] nothing is excluded, and the
    /// pattern returned is the one that executes first.
    pub fn select_best<'p>(&self, group: &'p [Pattern]) -> Result<&'p Pattern, GridError> {
        self.pick(group, &|pattern| PatternOutcome::nominal(pattern).score)
    }

    /// Like [`Resolver::select_best`], scoring outcomes against `snapshot`.
    ///
    /// A pattern that no longer matches the snapshot scores zero.
    pub fn select_best_against<'p>(
        &self,
        group: &'p [Pattern],
        snapshot: &GridSnapshot,
    ) -> Result<&'p Pattern, GridError> {
        self.pick(group, &|pattern| projected_score(pattern, snapshot))
    }

    /// Resolves every conflict group, returning the patterns to execute.
    ///
    /// The result holds one winner per group (every candidate under
    /// [`ResolutionStrategy::ExecuteAll`]) ordered by descending priority,
    /// then ascending identifier.
    #[must_use]
    pub fn resolve(&self, patterns: &[Pattern]) -> Vec<Pattern> {
        self.resolve_with(patterns, &|pattern| PatternOutcome::nominal(pattern).score)
    }

    /// Like [`Resolver::resolve`], scoring outcomes against `snapshot`.
    #[must_use]
    pub fn resolve_against(&self, patterns: &[Pattern], snapshot: &GridSnapshot) -> Vec<Pattern> {
        self.resolve_with(patterns, &|pattern| projected_score(pattern, snapshot))
    }

    fn resolve_with(&self, patterns: &[Pattern], score: &dyn Fn(&Pattern) -> u32) -> Vec<Pattern> {
        if patterns.is_empty() {
            return Vec::new();
        }

        let mut selected: Vec<Pattern> = if self.strategy == ResolutionStrategy::ExecuteAll {
            patterns.to_vec()
        } else {
            conflict_groups(patterns)
                .iter()
                .filter_map(|group| self.pick(group, score).ok().cloned())
                .collect()
        };
        selected.sort_by(execution_order);
        debug!(
            strategy = %self.strategy,
            candidates = patterns.len(),
            selected = selected.len(),
            "resolved patterns"
        );
        selected
    }

    fn pick<'p>(
        &self,
        group: &'p [Pattern],
        score: &dyn Fn(&Pattern) -> u32,
    ) -> Result<&'p Pattern, GridError> {
        if group.is_empty() {
            return Err(GridError::NoValidPattern);
        }

        let best = match self.strategy {
            ResolutionStrategy::Priority | ResolutionStrategy::ExecuteAll => {
                group.iter().min_by(|a, b| by_priority(a, b))
            }
            ResolutionStrategy::HighestValue => group
                .iter()
                .min_by(|a, b| score(b).cmp(&score(a)).then_with(|| by_priority(a, b))),
            ResolutionStrategy::LargestFirst => group
                .iter()
                .min_by(|a, b| b.size().cmp(&a.size()).then_with(|| by_priority(a, b))),
            ResolutionStrategy::Random => {
                let mut ordered: Vec<&Pattern> = group.iter().collect();
                ordered.sort_by(|a, b| a.id().cmp(b.id()));
                let mut rng = ChaCha8Rng::seed_from_u64(group_seed(self.seed, &ordered));
                let index = rng.gen_range(0..ordered.len());
                ordered.get(index).copied()
            }
        };
        best.ok_or(GridError::NoValidPattern)
    }
}

/// Priority descending, then size descending, then identifier ascending.
fn by_priority(a: &Pattern, b: &Pattern) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| b.size().cmp(&a.size()))
        .then_with(|| a.id().cmp(b.id()))
}

fn execution_order(a: &Pattern, b: &Pattern) -> Ordering {
    b.priority().cmp(&a.priority()).then_with(|| a.id().cmp(b.id()))
}

fn projected_score(pattern: &Pattern, snapshot: &GridSnapshot) -> u32 {
    PatternOutcome::project(pattern, snapshot).map_or(0, |outcome| outcome.score)
}

fn group_seed(seed: u64, ordered: &[&Pattern]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    for pattern in ordered {
        hasher.update(pattern.id().as_str().as_bytes());
        hasher.update([0]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            let (low, high) = if root_a < root_b { (root_a, root_b) } else { (root_b, root_a) };
            self.parent[high] = low;
        }
    }
}
