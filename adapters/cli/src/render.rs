//! Text and JSON presentation of boards, command results and events.

use std::fmt::Write as _;

use blockwork_core::{Block, BlockKind, Event, GridCoord, GridSnapshot};
use blockwork_world::{Applied, DragResolution};
use serde_json::{json, Value};

const EMPTY_CELL: &str = "..";

/// Single-character glyph drawn for a block kind.
fn glyph(kind: BlockKind) -> char {
    match kind {
        BlockKind::Work => 'W',
        BlockKind::Study => 'S',
        BlockKind::Exercise => 'E',
        BlockKind::Social => 'O',
        BlockKind::Rest => 'R',
        BlockKind::Family => 'F',
        BlockKind::Health => 'H',
        BlockKind::Creative => 'C',
    }
}

fn cell(block: &Block) -> String {
    let tier = block.tier().get();
    let digit = char::from_digit(tier, 10).unwrap_or('+');
    format!("{}{digit}", glyph(block.kind()))
}

/// Draws the board row by row, each cell as kind glyph plus tier digit.
pub(crate) fn board(snapshot: &GridSnapshot) -> String {
    let (width, height) = snapshot.dimensions();
    let mut text = String::new();
    for y in 0..height {
        let row: Vec<String> = (0..width)
            .map(|x| {
                let position = GridCoord::new(x as i32, y as i32);
                snapshot
                    .get(position)
                    .map_or_else(|| EMPTY_CELL.to_owned(), cell)
            })
            .collect();
        let _ = writeln!(text, "{}", row.join(" "));
    }
    text
}

/// Structured board dump used by `--json`.
pub(crate) fn board_json(snapshot: &GridSnapshot) -> Value {
    let (width, height) = snapshot.dimensions();
    let blocks: Vec<&Block> = snapshot.iter().collect();
    json!({
        "width": width,
        "height": height,
        "version": snapshot.version().get(),
        "blocks": blocks,
    })
}

/// One-line summary of a command result.
pub(crate) fn applied(applied: &Applied) -> String {
    match applied {
        Applied::Placed(block) => format!(
            "placed {} {} at {}",
            block.kind(),
            block.id(),
            block.position()
        ),
        Applied::Removed(block) => format!(
            "removed {} {} from {}",
            block.kind(),
            block.id(),
            block.position()
        ),
        Applied::Moved(block) => format!("{} now at {}", block.id(), block.position()),
        Applied::DragStarted(session) => {
            format!("dragging {} from {}", session.block, session.origin)
        }
        Applied::PreviewUpdated(session) => {
            format!("hovering {} over {}", session.block, session.preview)
        }
        Applied::Dropped(DragResolution::Unchanged) => "dropped back onto origin".to_owned(),
        Applied::Dropped(DragResolution::Moved(block)) => {
            format!("dropped {} at {}", block.id(), block.position())
        }
        Applied::Dropped(DragResolution::Swapped { dragged, displaced }) => format!(
            "swapped {} to {} with {} to {}",
            dragged.id(),
            dragged.position(),
            displaced.id(),
            displaced.position()
        ),
        Applied::DragCancelled(session) => format!("cancelled drag of {}", session.block),
        Applied::PatternsExecuted(outcomes) => format!("executed {} pattern(s)", outcomes.len()),
        Applied::Cleared(removed) => format!("cleared {removed} block(s)"),
    }
}

/// One-line description of a published event.
pub(crate) fn event(event: &Event) -> String {
    match event {
        Event::BlockPlaced {
            id, position, kind, ..
        } => format!("+ {kind} {id} at {position}"),
        Event::BlockRemoved {
            id, position, kind, ..
        } => format!("- {kind} {id} at {position}"),
        Event::BlockMoved { id, from, to, .. } => format!("> {id} {from} -> {to}"),
        Event::BlockUpgraded {
            id, position, tier, ..
        } => format!("^ {id} at {position} tier {}", tier.get()),
        Event::DragStarted { block, origin } => format!("drag {block} from {origin}"),
        Event::DragCancelled { block, origin } => format!("drag of {block} cancelled at {origin}"),
        Event::GridCleared { removed, .. } => format!("grid cleared ({removed} removed)"),
    }
}
