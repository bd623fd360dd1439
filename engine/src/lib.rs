#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wires the world and the pure systems into a single processing turn.
//!
//! A turn applies one command to the world. When the command changed the
//! grid and automatic resolution is enabled, the engine then alternates
//! recognition, resolution and execution over fresh snapshots until no
//! pattern remains or the configured cascade depth is reached.

use blockwork_core::{
    Command, ConfigError, Event, GridConfig, GridError, GridSnapshot, Pattern, PatternOutcome,
};
use blockwork_system_recognition::Recognition;
use blockwork_system_resolution::Resolver;
use blockwork_world::{self as world, query, Applied, Subscription, World};
use tracing::{debug, warn};

/// Everything a single command produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// Result of the command itself.
    pub applied: Applied,
    /// Events published by the command, before any cascade.
    pub events: Vec<Event>,
    /// Pattern executions triggered by the command, in order.
    pub cascades: Vec<CascadeStep>,
}

impl Turn {
    /// Every event published during the turn, command first.
    pub fn all_events(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .chain(self.cascades.iter().flat_map(|step| step.events.iter()))
    }
}

/// One recognition, resolution and execution pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeStep {
    /// Zero-based position of the pass within its turn.
    pub depth: usize,
    /// Outcomes of the executed patterns.
    pub outcomes: Vec<PatternOutcome>,
    /// Events published by the execution.
    pub events: Vec<Event>,
}

/// Authoritative world plus the systems that react to it.
#[derive(Debug)]
pub struct Engine {
    world: World,
    recognition: Recognition,
    resolver: Resolver,
}

impl Engine {
    /// Creates an engine with the standard recognizers and the configured resolver.
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        let recognition = Recognition::from_config(&config);
        let resolver = Resolver::from_config(&config);
        Self::with_systems(config, recognition, resolver)
    }

    /// Creates an engine with caller-provided systems.
    pub fn with_systems(
        config: GridConfig,
        recognition: Recognition,
        resolver: Resolver,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            world: World::new(config)?,
            recognition,
            resolver,
        })
    }

    /// Read access to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Registers an observer for every event the world publishes.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.world.subscribe(observer)
    }

    /// Ends delivery to a previously registered observer.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.world.unsubscribe(subscription)
    }

    /// Applies `command` and, when enabled, resolves the patterns it exposed.
    pub fn handle(&self, command: Command) -> Result<Turn, GridError> {
        let mut events = Vec::new();
        let applied = world::apply(&self.world, command, &mut events)?;
        let changed = events.iter().any(Event::mutates_grid);
        let cascades = if changed && query::config(&self.world).auto_resolve {
            self.cascade()
        } else {
            Vec::new()
        };
        Ok(Turn {
            applied,
            events,
            cascades,
        })
    }

    /// Candidate patterns on the current grid, before resolution.
    #[must_use]
    pub fn detect(&self) -> Vec<Pattern> {
        self.recognition.recognize(&query::snapshot(&self.world))
    }

    /// Patterns the resolver would execute next on the current grid.
    #[must_use]
    pub fn plan(&self) -> Vec<Pattern> {
        let snapshot = query::snapshot(&self.world);
        self.plan_for(&snapshot)
    }

    /// Projects what executing `pattern` now would do, without executing it.
    pub fn preview(&self, pattern: &Pattern) -> Result<PatternOutcome, GridError> {
        query::preview_outcome(&self.world, pattern)
    }

    /// Runs cascade passes until the grid settles or the depth limit is hit.
    ///
    /// Called automatically after every grid-changing command when
    /// `auto_resolve` is set.
    pub fn cascade(&self) -> Vec<CascadeStep> {
        let max_depth = usize::try_from(query::config(&self.world).max_cascade_depth)
            .unwrap_or(usize::MAX);
        let mut steps = Vec::new();

        for depth in 0..max_depth {
            let snapshot = query::snapshot(&self.world);
            let patterns = self.plan_for(&snapshot);
            if patterns.is_empty() {
                return steps;
            }

            let mut events = Vec::new();
            let command = Command::ExecutePatterns {
                patterns,
                version: snapshot.version(),
            };
            match world::apply(&self.world, command, &mut events) {
                Ok(Applied::PatternsExecuted(outcomes)) if !outcomes.is_empty() => {
                    debug!(depth, executed = outcomes.len(), "cascade pass");
                    steps.push(CascadeStep {
                        depth,
                        outcomes,
                        events,
                    });
                }
                Ok(_) => return steps,
                Err(error) => {
                    warn!(%error, depth, "cascade pass rejected");
                    return steps;
                }
            }
        }

        if !self.plan().is_empty() {
            warn!(max_depth, "cascade depth limit reached with patterns pending");
        }
        steps
    }

    fn plan_for(&self, snapshot: &GridSnapshot) -> Vec<Pattern> {
        let candidates = self.recognition.recognize(snapshot);
        self.resolver.resolve_against(&candidates, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::{BlockKind, GridCoord, PatternKind, ResolutionStrategy, Tier};

    fn place(engine: &Engine, x: i32, y: i32, kind: BlockKind) -> Turn {
        engine
            .handle(Command::PlaceBlock {
                position: GridCoord::new(x, y),
                kind,
                tier: None,
            })
            .expect("place")
    }

    #[test]
    fn third_block_in_a_row_merges() {
        let engine = Engine::new(GridConfig::new(6, 6)).expect("engine");
        assert!(place(&engine, 0, 0, BlockKind::Work).cascades.is_empty());
        assert!(place(&engine, 1, 0, BlockKind::Work).cascades.is_empty());

        let turn = place(&engine, 2, 0, BlockKind::Work);

        assert_eq!(turn.cascades.len(), 1);
        let blocks = query::blocks(engine.world());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].position(), GridCoord::new(0, 0));
        assert_eq!(blocks[0].tier(), Tier::new(2).expect("tier"));
    }

    #[test]
    fn priority_strategy_prefers_merge_over_match() {
        let config = GridConfig::new(6, 6).with_auto_resolve(false);
        let engine = Engine::new(config).expect("engine");
        for x in 0..3 {
            let _ = place(&engine, x, 0, BlockKind::Rest);
        }

        let plan = engine.plan();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind(), PatternKind::Merge);
        assert_eq!(engine.detect().len(), 3);
    }

    #[test]
    fn disabled_auto_resolve_leaves_patterns_in_place() {
        let engine = Engine::new(GridConfig::new(6, 6).with_auto_resolve(false)).expect("engine");
        for x in 0..3 {
            assert!(place(&engine, x, 0, BlockKind::Study).cascades.is_empty());
        }
        assert_eq!(query::blocks(engine.world()).len(), 3);

        let steps = engine.cascade();

        assert_eq!(steps.len(), 1);
        assert_eq!(query::blocks(engine.world()).len(), 1);
    }

    #[test]
    fn preview_does_not_mutate() {
        let engine = Engine::new(GridConfig::new(6, 6).with_auto_resolve(false)).expect("engine");
        for x in 0..3 {
            let _ = place(&engine, x, 0, BlockKind::Creative);
        }
        let version = query::version(engine.world());
        let plan = engine.plan();

        let outcome = engine.preview(&plan[0]).expect("preview");

        assert_eq!(outcome.cleared, vec![GridCoord::new(1, 0), GridCoord::new(2, 0)]);
        assert_eq!(query::version(engine.world()), version);
    }

    #[test]
    fn execute_all_clears_overlapping_candidates_once() {
        let config = GridConfig::new(6, 6)
            .with_strategy(ResolutionStrategy::ExecuteAll)
            .with_auto_resolve(false);
        let engine = Engine::new(config).expect("engine");
        for x in 0..3 {
            let _ = place(&engine, x, 0, BlockKind::Social);
        }

        let steps = engine.cascade();

        // The merge runs first; the match and line overlap it and are skipped.
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].outcomes.len(), 1);
        assert!(query::grid(engine.world()).is_consistent());
    }

    #[test]
    fn failed_command_runs_no_cascade() {
        let engine = Engine::new(GridConfig::new(4, 4)).expect("engine");
        let result = engine.handle(Command::CancelDrag);
        assert_eq!(result, Err(GridError::NoActiveDrag));
    }
}
