//! Line-oriented session scripts.
//!
//! Each non-empty line holds one instruction; `#` starts a comment. Cells are
//! written as `x y`.
//!
//! ```text
//! place 2 2 work      # optional fourth argument sets the tier
//! move 3 4 4          # block id, then destination
//! drag 5 5
//! preview 6 5
//! drop 8 5
//! cancel
//! remove 2 2
//! remove-id 3
//! clear
//! show
//! ```

use blockwork_core::{BlockId, BlockKind, GridCoord, Tier};
use thiserror::Error;

/// One parsed script line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Instruction {
    Place {
        position: GridCoord,
        kind: BlockKind,
        tier: Option<Tier>,
    },
    Move {
        block: BlockId,
        to: GridCoord,
    },
    Drag(GridCoord),
    Preview(GridCoord),
    Drop(GridCoord),
    Cancel,
    Remove(GridCoord),
    RemoveId(BlockId),
    Clear,
    Show,
}

/// Instruction together with the line it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) line: usize,
    pub(crate) instruction: Instruction,
}

/// Reasons a script line may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum ScriptError {
    #[error("line {line}: unknown instruction `{word}`")]
    UnknownInstruction { line: usize, word: String },
    #[error("line {line}: `{instruction}` expects {expected} argument(s), got {found}")]
    WrongArity {
        line: usize,
        instruction: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("line {line}: `{value}` is not a valid number")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: unknown block kind `{value}`")]
    UnknownKind { line: usize, value: String },
    #[error("line {line}: tier must be at least 1, got {value}")]
    InvalidTier { line: usize, value: u32 },
}

/// Parses a whole script, stopping at the first malformed line.
pub(crate) fn parse(source: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let instruction = parse_line(line, content)?;
        steps.push(Step { line, instruction });
    }
    Ok(steps)
}

fn parse_line(line: usize, content: &str) -> Result<Instruction, ScriptError> {
    let mut words = content.split_whitespace();
    let word = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();
    let parser = Args { line, args: &args };

    let instruction = match word.as_str() {
        "place" => {
            parser.arity("place", "3 or 4", |n| n == 3 || n == 4)?;
            Instruction::Place {
                position: parser.cell(0)?,
                kind: parser.kind(2)?,
                tier: args.get(3).map(|_| parser.tier(3)).transpose()?,
            }
        }
        "move" => {
            parser.arity("move", "3", |n| n == 3)?;
            Instruction::Move {
                block: parser.block(0)?,
                to: parser.cell(1)?,
            }
        }
        "drag" => Instruction::Drag(parser.only_cell("drag")?),
        "preview" => Instruction::Preview(parser.only_cell("preview")?),
        "drop" => Instruction::Drop(parser.only_cell("drop")?),
        "remove" => Instruction::Remove(parser.only_cell("remove")?),
        "remove-id" => {
            parser.arity("remove-id", "1", |n| n == 1)?;
            Instruction::RemoveId(parser.block(0)?)
        }
        "cancel" => {
            parser.arity("cancel", "0", |n| n == 0)?;
            Instruction::Cancel
        }
        "clear" => {
            parser.arity("clear", "0", |n| n == 0)?;
            Instruction::Clear
        }
        "show" => {
            parser.arity("show", "0", |n| n == 0)?;
            Instruction::Show
        }
        _ => return Err(ScriptError::UnknownInstruction { line, word }),
    };
    Ok(instruction)
}

struct Args<'a> {
    line: usize,
    args: &'a [&'a str],
}

impl Args<'_> {
    fn arity(
        &self,
        instruction: &'static str,
        expected: &'static str,
        accepts: impl Fn(usize) -> bool,
    ) -> Result<(), ScriptError> {
        if accepts(self.args.len()) {
            Ok(())
        } else {
            Err(ScriptError::WrongArity {
                line: self.line,
                instruction,
                expected,
                found: self.args.len(),
            })
        }
    }

    fn only_cell(&self, instruction: &'static str) -> Result<GridCoord, ScriptError> {
        self.arity(instruction, "2", |n| n == 2)?;
        self.cell(0)
    }

    fn cell(&self, start: usize) -> Result<GridCoord, ScriptError> {
        Ok(GridCoord::new(self.number(start)?, self.number(start + 1)?))
    }

    fn block(&self, index: usize) -> Result<BlockId, ScriptError> {
        self.number(index).map(BlockId::new)
    }

    fn kind(&self, index: usize) -> Result<BlockKind, ScriptError> {
        let value = self.args.get(index).copied().unwrap_or_default();
        BlockKind::from_label(&value.to_ascii_lowercase()).ok_or_else(|| ScriptError::UnknownKind {
            line: self.line,
            value: value.to_owned(),
        })
    }

    fn tier(&self, index: usize) -> Result<Tier, ScriptError> {
        let value: u32 = self.number(index)?;
        Tier::new(value).ok_or(ScriptError::InvalidTier {
            line: self.line,
            value,
        })
    }

    fn number<T: std::str::FromStr>(&self, index: usize) -> Result<T, ScriptError> {
        let value = self.args.get(index).copied().unwrap_or_default();
        value.parse().map_err(|_| ScriptError::InvalidNumber {
            line: self.line,
            value: value.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_instruction() {
        let script = "\
            # warm up\n\
            place 2 2 work\n\
            place 3 2 Study 2\n\
            move 0 4 4\n\
            drag 5 5\n\
            preview 6 5   # hover\n\
            drop 8 5\n\
            cancel\n\
            remove 2 2\n\
            remove-id 3\n\
            clear\n\
            show\n";

        let steps = parse(script).expect("valid script");
        let instructions: Vec<Instruction> = steps.iter().map(|step| step.instruction).collect();

        assert_eq!(
            instructions,
            vec![
                Instruction::Place {
                    position: GridCoord::new(2, 2),
                    kind: BlockKind::Work,
                    tier: None,
                },
                Instruction::Place {
                    position: GridCoord::new(3, 2),
                    kind: BlockKind::Study,
                    tier: Tier::new(2),
                },
                Instruction::Move {
                    block: BlockId::new(0),
                    to: GridCoord::new(4, 4),
                },
                Instruction::Drag(GridCoord::new(5, 5)),
                Instruction::Preview(GridCoord::new(6, 5)),
                Instruction::Drop(GridCoord::new(8, 5)),
                Instruction::Cancel,
                Instruction::Remove(GridCoord::new(2, 2)),
                Instruction::RemoveId(BlockId::new(3)),
                Instruction::Clear,
                Instruction::Show,
            ]
        );
        assert_eq!(steps[0].line, 2);
    }

    #[test]
    fn negative_cells_parse_for_the_world_to_reject() {
        let steps = parse("drop -1 0").expect("valid script");
        assert_eq!(steps[0].instruction, Instruction::Drop(GridCoord::new(-1, 0)));
    }

    #[test]
    fn reports_the_offending_line() {
        assert_eq!(
            parse("show\nteleport 1 1"),
            Err(ScriptError::UnknownInstruction {
                line: 2,
                word: "teleport".to_owned(),
            })
        );
        assert_eq!(
            parse("place 1 x work"),
            Err(ScriptError::InvalidNumber {
                line: 1,
                value: "x".to_owned(),
            })
        );
        assert_eq!(
            parse("place 1 1 nap"),
            Err(ScriptError::UnknownKind {
                line: 1,
                value: "nap".to_owned(),
            })
        );
        assert_eq!(
            parse("place 1 1 rest 0"),
            Err(ScriptError::InvalidTier { line: 1, value: 0 })
        );
        assert!(matches!(
            parse("drag 1"),
            Err(ScriptError::WrongArity { found: 1, .. })
        ));
    }
}
