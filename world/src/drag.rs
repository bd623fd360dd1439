//! Drag session tracking.
//!
//! At most one session exists at a time. Opening a second session while one
//! is active fails immediately rather than waiting for the slot.

use std::sync::{Mutex, MutexGuard, PoisonError};

use blockwork_core::{Block, BlockId, GridCoord, GridError, Timestamp};

/// State of an in-progress drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragSession {
    /// Block being dragged.
    pub block: BlockId,
    /// Cell the block rested at when the drag began.
    pub origin: GridCoord,
    /// Cell currently hovered. Purely presentational until the drop.
    pub preview: GridCoord,
    /// Grid clock reading when the block was picked up.
    pub started_at: Timestamp,
}

impl DragSession {
    /// Opens a session whose preview starts at the origin.
    #[must_use]
    pub const fn new(block: BlockId, origin: GridCoord, started_at: Timestamp) -> Self {
        Self {
            block,
            origin,
            preview: origin,
            started_at,
        }
    }

    /// Reports whether `target` lies within `max_range` of the origin.
    #[must_use]
    pub fn is_within_range(&self, target: GridCoord, max_range: u32) -> bool {
        within_range(self.origin, target, max_range)
    }
}

/// Result of dropping a dragged block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragResolution {
    /// The block was dropped onto its own cell.
    Unchanged,
    /// The block moved into an empty cell.
    Moved(Block),
    /// The block traded places with the block it was dropped onto.
    Swapped {
        /// Dragged block after the swap.
        dragged: Block,
        /// Displaced block after the swap.
        displaced: Block,
    },
}

/// Guards the single drag slot.
#[derive(Debug, Default)]
pub struct DragTracker {
    session: Mutex<Option<DragSession>>,
}

impl DragTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the active session, if any.
    #[must_use]
    pub fn active(&self) -> Option<DragSession> {
        *self.lock()
    }

    /// Occupies the drag slot with `session`.
    pub fn begin(&self, session: DragSession) -> Result<DragSession, GridError> {
        let mut slot = self.lock();
        if let Some(active) = slot.as_ref() {
            return Err(GridError::DragAlreadyActive {
                active: active.block,
            });
        }
        *slot = Some(session);
        Ok(session)
    }

    /// Records a new hovered cell for the active session.
    pub fn update_preview(&self, position: GridCoord) -> Result<DragSession, GridError> {
        let mut slot = self.lock();
        let session = slot.as_mut().ok_or(GridError::NoActiveDrag)?;
        session.preview = position;
        Ok(*session)
    }

    /// Releases the drag slot, returning the session that held it.
    pub fn end(&self) -> Result<DragSession, GridError> {
        self.lock().take().ok_or(GridError::NoActiveDrag)
    }

    /// Reports whether `target` is reachable from the active session's origin.
    ///
    /// Returns `false` when no session is active.
    #[must_use]
    pub fn is_within_range(&self, target: GridCoord, max_range: u32) -> bool {
        self.lock()
            .as_ref()
            .map_or(false, |session| session.is_within_range(target, max_range))
    }

    fn lock(&self) -> MutexGuard<'_, Option<DragSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Manhattan reachability test used for moves, swaps, and previews alike.
#[must_use]
pub fn within_range(from: GridCoord, to: GridCoord, max_range: u32) -> bool {
    from.manhattan_distance(to) <= max_range
}

/// Cells inside the grid reachable from `origin`, excluding `origin` itself.
///
/// The result traces the same diamond that [`within_range`] accepts, in
/// ascending coordinate order, so previews always agree with validation.
#[must_use]
pub fn reachable_cells(
    origin: GridCoord,
    max_range: u32,
    width: u32,
    height: u32,
) -> Vec<GridCoord> {
    let reach = i64::from(max_range);
    let mut cells = Vec::new();
    for dx in -reach..=reach {
        let remaining = reach - dx.abs();
        for dy in -remaining..=remaining {
            let x = i64::from(origin.x()) + dx;
            let y = i64::from(origin.y()) + dy;
            let inside =
                (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y);
            if !inside || (dx == 0 && dy == 0) {
                continue;
            }
            if let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) {
                cells.push(GridCoord::new(x, y));
            }
        }
    }
    cells.sort();
    cells
}
