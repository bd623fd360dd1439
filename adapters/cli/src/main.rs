#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays scripted Blockwork sessions.
//!
//! The adapter loads a [`GridConfig`] from TOML (with flag overrides), reads
//! a script from a file or standard input, and feeds every instruction
//! through the engine, printing results and published events as they occur.

mod render;
mod script;

use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use blockwork_core::{BlockTarget, Command, GridConfig, GridError, ResolutionStrategy};
use blockwork_engine::{Engine, Turn};
use blockwork_world::query;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use script::{Instruction, Step};

const LOG_ENV: &str = "BLOCKWORK_LOG";

/// Replays a Blockwork session script against a fresh grid.
#[derive(Debug, Parser)]
#[command(name = "blockwork", version, about)]
struct Args {
    /// TOML file holding the grid configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the grid width.
    #[arg(long)]
    width: Option<u32>,
    /// Overrides the grid height.
    #[arg(long)]
    height: Option<u32>,
    /// Overrides the resolution strategy.
    ///
    /// One of priority, highest-value, largest-first, random or execute-all.
    #[arg(long)]
    strategy: Option<ResolutionStrategy>,
    /// Overrides the seed used by the random strategy.
    #[arg(long)]
    seed: Option<u64>,
    /// Prints one JSON object per line instead of text.
    #[arg(long)]
    json: bool,
    /// Script to replay; standard input is read when omitted.
    #[arg(long)]
    script: Option<PathBuf>,
}

/// Entry point for the Blockwork command-line interface.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let source = read_script(args.script.as_deref())?;
    let steps = script::parse(&source).context("failed to parse session script")?;

    let engine = Engine::new(config).context("invalid grid configuration")?;
    tracing::info!(
        width = query::config(engine.world()).width,
        height = query::config(engine.world()).height,
        steps = steps.len(),
        "replaying session"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0_usize;
    for step in steps {
        if !replay_step(&engine, step, args.json, &mut out)? {
            failures += 1;
        }
    }
    out.flush().context("failed to flush output")?;

    tracing::info!(failures, "session finished");
    Ok(())
}

fn load_config(args: &Args) -> Result<GridConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<GridConfig>(&text)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => GridConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate().context("invalid grid configuration")?;
    Ok(config)
}

fn read_script(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        None => {
            let mut source = String::new();
            let _ = io::stdin()
                .read_to_string(&mut source)
                .context("failed to read script from standard input")?;
            Ok(source)
        }
    }
}

/// Runs one step, returning whether the engine accepted it.
fn replay_step(engine: &Engine, step: Step, json: bool, out: &mut impl Write) -> Result<bool> {
    let result = match to_command(engine, step.instruction) {
        Ok(None) => {
            show(engine, json, out)?;
            return Ok(true);
        }
        Ok(Some(command)) => engine.handle(command),
        Err(error) => Err(error),
    };

    match result {
        Ok(turn) => {
            report_turn(step.line, &turn, json, out)?;
            Ok(true)
        }
        Err(error) => {
            tracing::debug!(line = step.line, %error, "instruction rejected");
            if json {
                let line = serde_json::json!({ "line": step.line, "error": error });
                writeln!(out, "{line}")?;
            } else {
                writeln!(out, "line {}: error: {error}", step.line)?;
            }
            Ok(false)
        }
    }
}

fn show(engine: &Engine, json: bool, out: &mut impl Write) -> Result<()> {
    let snapshot = query::snapshot(engine.world());
    if json {
        writeln!(out, "{}", serde_json::to_string(&render::board_json(&snapshot))?)?;
    } else {
        write!(out, "{}", render::board(&snapshot))?;
    }
    Ok(())
}

/// Translates an instruction into a command; `show` has none.
fn to_command(engine: &Engine, instruction: Instruction) -> Result<Option<Command>, GridError> {
    let command = match instruction {
        Instruction::Place {
            position,
            kind,
            tier,
        } => Command::PlaceBlock {
            position,
            kind,
            tier,
        },
        Instruction::Move { block, to } => Command::MoveBlock { block, to },
        Instruction::Drag(origin) => {
            let block = query::block_at(engine.world(), origin)
                .ok_or(GridError::PositionEmpty(origin))?;
            Command::StartDrag {
                block: block.id(),
                origin,
            }
        }
        Instruction::Preview(position) => Command::UpdateDragPreview { position },
        Instruction::Drop(target) => Command::CompleteDrag { target },
        Instruction::Cancel => Command::CancelDrag,
        Instruction::Remove(position) => Command::RemoveBlock {
            target: BlockTarget::Position(position),
        },
        Instruction::RemoveId(id) => Command::RemoveBlock {
            target: BlockTarget::Id(id),
        },
        Instruction::Clear => Command::ClearGrid,
        Instruction::Show => return Ok(None),
    };
    Ok(Some(command))
}

fn report_turn(line: usize, turn: &Turn, json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        for event in turn.all_events() {
            writeln!(out, "{}", serde_json::to_string(event)?)?;
        }
        return Ok(());
    }

    writeln!(out, "line {line}: {}", render::applied(&turn.applied))?;
    for event in &turn.events {
        writeln!(out, "  {}", render::event(event))?;
    }
    for step in &turn.cascades {
        writeln!(out, "  cascade {}:", step.depth + 1)?;
        for event in &step.events {
            writeln!(out, "    {}", render::event(event))?;
        }
    }
    Ok(())
}
