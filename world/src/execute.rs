//! Applies resolved patterns to the grid.

use std::collections::BTreeSet;

use blockwork_core::{GridCoord, GridError, GridSnapshot, Pattern, PatternOutcome};
use tracing::{debug, trace};

use crate::grid::Transaction;

/// Executes `patterns` in order inside an open transaction.
///
/// Matches and lines remove every covered block; merges remove every covered
/// block except the anchor, which advances one tier. A pattern whose cells
/// were consumed by an earlier pattern in the same batch is skipped. A
/// pattern that no longer describes the grid fails the whole batch with
/// [`GridError::PatternStale`].
pub(crate) fn execute_patterns(
    transaction: &mut Transaction<'_>,
    patterns: &[Pattern],
) -> Result<Vec<PatternOutcome>, GridError> {
    let mut consumed: BTreeSet<GridCoord> = BTreeSet::new();
    let mut outcomes = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        if pattern.positions().iter().any(|cell| consumed.contains(cell)) {
            trace!(pattern = %pattern.id(), "skipping pattern overlapping an executed one");
            continue;
        }

        let outcome = PatternOutcome::project(pattern, &covered(transaction, pattern))?;
        for position in &outcome.cleared {
            let _ = transaction.remove_at(*position)?;
        }
        if let Some(upgraded) = outcome.upgraded {
            let id = upgraded
                .id
                .ok_or_else(|| GridError::PatternStale(pattern.id().clone()))?;
            let _ = transaction.upgrade(id, upgraded.tier)?;
        }

        debug!(
            pattern = %pattern.id(),
            cleared = outcome.cleared.len(),
            score = outcome.score,
            "executed pattern"
        );
        consumed.extend(pattern.positions().iter().copied());
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

fn covered(transaction: &Transaction<'_>, pattern: &Pattern) -> GridSnapshot {
    let (width, height) = transaction.dimensions();
    GridSnapshot::from_blocks(
        width,
        height,
        transaction.version(),
        pattern
            .positions()
            .iter()
            .filter_map(|position| transaction.get_at(*position)),
    )
}
