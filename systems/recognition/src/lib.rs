#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that scans grid snapshots for executable patterns.
//!
//! Recognizers never touch the live grid. They read an owned
//! [`GridSnapshot`], report every candidate they find, and leave the choice
//! between overlapping candidates to the resolver.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use blockwork_core::{Block, GridConfig, GridCoord, GridSnapshot, Pattern, PatternId, PatternKind};
use tracing::trace;

/// Detects one family of patterns in a grid snapshot.
pub trait PatternRecognizer {
    /// Short label used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns every candidate found in `snapshot`, ordered by identifier.
    ///
    /// Implementations must be pure: identical snapshots yield identical
    /// output.
    fn recognize(&self, snapshot: &GridSnapshot) -> Vec<Pattern>;
}

/// Orthogonally connected groups of blocks sharing a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterRecognizer {
    min_group_size: usize,
}

impl ClusterRecognizer {
    /// Creates a recognizer reporting groups of at least `min_group_size` blocks.
    #[must_use]
    pub const fn new(min_group_size: usize) -> Self {
        Self { min_group_size }
    }
}

impl PatternRecognizer for ClusterRecognizer {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn recognize(&self, snapshot: &GridSnapshot) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> =
            connected_groups(snapshot, |a, b| a.kind() == b.kind())
                .into_iter()
                .filter(|(_, cells)| cells.len() >= self.min_group_size)
                .map(|(seed, cells)| {
                    Pattern::detected(PatternKind::Match, seed.kind(), cells, self.min_group_size)
                })
                .collect();
        sort_by_id(&mut patterns);
        patterns
    }
}

/// Maximal horizontal and vertical runs of blocks sharing a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRecognizer {
    min_length: usize,
}

impl LineRecognizer {
    /// Creates a recognizer reporting runs of at least `min_length` blocks.
    #[must_use]
    pub const fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    fn runs(&self, snapshot: &GridSnapshot, dx: i32, dy: i32, out: &mut Vec<Pattern>) {
        for block in snapshot.iter() {
            let continues_run = block
                .position()
                .offset(-dx, -dy)
                .and_then(|previous| snapshot.get(previous))
                .map_or(false, |previous| previous.kind() == block.kind());
            if continues_run {
                continue;
            }

            let mut cells = vec![block.position()];
            let mut cursor = block.position();
            while let Some(next) = cursor.offset(dx, dy) {
                match snapshot.get(next) {
                    Some(neighbor) if neighbor.kind() == block.kind() => {
                        cells.push(next);
                        cursor = next;
                    }
                    _ => break,
                }
            }

            if cells.len() >= self.min_length {
                out.push(Pattern::detected(
                    PatternKind::Line,
                    block.kind(),
                    cells,
                    self.min_length,
                ));
            }
        }
    }
}

impl PatternRecognizer for LineRecognizer {
    fn name(&self) -> &'static str {
        "line"
    }

    fn recognize(&self, snapshot: &GridSnapshot) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        self.runs(snapshot, 1, 0, &mut patterns);
        self.runs(snapshot, 0, 1, &mut patterns);
        sort_by_id(&mut patterns);
        patterns
    }
}

/// Orthogonally connected groups sharing both kind and tier.
///
/// Groups already at the tier ceiling are ignored since merging them would
/// exceed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeRecognizer {
    min_group_size: usize,
    max_tier: u32,
}

impl MergeRecognizer {
    /// Creates a merge recognizer.
    #[must_use]
    pub const fn new(min_group_size: usize, max_tier: u32) -> Self {
        Self {
            min_group_size,
            max_tier,
        }
    }
}

impl PatternRecognizer for MergeRecognizer {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn recognize(&self, snapshot: &GridSnapshot) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = connected_groups(snapshot, |a, b| {
            a.kind() == b.kind() && a.tier() == b.tier()
        })
        .into_iter()
        .filter(|(seed, cells)| {
            cells.len() >= self.min_group_size && seed.tier().get() < self.max_tier
        })
        .map(|(seed, cells)| {
            Pattern::detected(PatternKind::Merge, seed.kind(), cells, self.min_group_size)
        })
        .collect();
        sort_by_id(&mut patterns);
        patterns
    }
}

/// Runs a set of recognizers and merges their output.
pub struct Recognition {
    recognizers: Vec<Box<dyn PatternRecognizer + Send + Sync>>,
}

impl std::fmt::Debug for Recognition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.recognizers.iter().map(|r| r.name()).collect();
        f.debug_struct("Recognition")
            .field("recognizers", &names)
            .finish()
    }
}

impl Recognition {
    /// Creates a pass without recognizers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    /// Creates the standard cluster, line and merge pass for `config`.
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        Self::empty()
            .with(ClusterRecognizer::new(config.min_group_size))
            .with(LineRecognizer::new(config.min_group_size))
            .with(MergeRecognizer::new(config.min_group_size, config.max_tier))
    }

    /// Appends a recognizer to the pass.
    #[must_use]
    pub fn with<R>(mut self, recognizer: R) -> Self
    where
        R: PatternRecognizer + Send + Sync + 'static,
    {
        self.recognizers.push(Box::new(recognizer));
        self
    }

    /// Labels of the registered recognizers, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.recognizers.iter().map(|r| r.name()).collect()
    }

    /// Runs every recognizer and returns the union of their candidates.
    ///
    /// Candidates reported by more than one recognizer appear once. The
    /// output is ordered by pattern identifier.
    #[must_use]
    pub fn recognize(&self, snapshot: &GridSnapshot) -> Vec<Pattern> {
        let mut unique: BTreeMap<PatternId, Pattern> = BTreeMap::new();
        for recognizer in &self.recognizers {
            let found = recognizer.recognize(snapshot);
            trace!(
                recognizer = recognizer.name(),
                found = found.len(),
                version = snapshot.version().get(),
                "recognition pass"
            );
            for pattern in found {
                let _ = unique.entry(pattern.id().clone()).or_insert(pattern);
            }
        }
        unique.into_values().collect()
    }
}

/// Partitions the snapshot into orthogonally connected groups.
///
/// `joins` decides whether two neighbouring blocks belong together. Each
/// group is returned with the block it was discovered from, and groups come
/// out in ascending order of their lowest cell.
fn connected_groups<F>(snapshot: &GridSnapshot, joins: F) -> Vec<(Block, BTreeSet<GridCoord>)>
where
    F: Fn(&Block, &Block) -> bool,
{
    let mut visited: BTreeSet<GridCoord> = BTreeSet::new();
    let mut groups = Vec::new();

    for seed in snapshot.iter() {
        if visited.contains(&seed.position()) {
            continue;
        }

        let mut cells = BTreeSet::new();
        let mut frontier = VecDeque::from([*seed]);
        let _ = visited.insert(seed.position());
        while let Some(current) = frontier.pop_front() {
            let _ = cells.insert(current.position());
            for neighbor in current.position().neighbors() {
                let Some(candidate) = snapshot.get(neighbor) else {
                    continue;
                };
                if !visited.contains(&neighbor) && joins(&current, candidate) {
                    let _ = visited.insert(neighbor);
                    frontier.push_back(*candidate);
                }
            }
        }
        groups.push((*seed, cells));
    }

    groups
}

fn sort_by_id(patterns: &mut [Pattern]) {
    patterns.sort_by(|a, b| a.id().cmp(b.id()));
}
