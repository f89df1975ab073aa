//! Drag-to-select state machine.
//!
//! States: Idle -> Dragging -> Committed. A drag anchors on pointer-down over
//! a data cell, extends on pointer-enter (only the end corner moves), and
//! commits on pointer-up. The embedding layer must deliver pointer-up from a
//! document-level listener, so a drag that leaves the grid still terminates;
//! the tracker itself accepts the commit from any position.
//!
//! Raw corner order is preserved internally (re-entering the anchor cell
//! mid-drag loses nothing); external consumers only ever see the normalized
//! view.

use crate::coord::{Coordinate, Range};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrackerState {
    Idle,
    Dragging {
        sheet: String,
        anchor: Coordinate,
        end: Coordinate,
    },
    Committed {
        sheet: String,
        anchor: Coordinate,
        end: Coordinate,
    },
}

/// Tracks the selection currently being drawn by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTracker {
    state: TrackerState,
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Idle,
        }
    }

    /// Pointer-down on the grid. `cell` is the adapter's translation of the
    /// hit: `Some` anchors a new drag (discarding any committed selection),
    /// `None` (header row or gutter) discards and returns to idle.
    pub fn pointer_down(&mut self, sheet: &str, cell: Option<Coordinate>) {
        self.state = match cell {
            Some(at) => TrackerState::Dragging {
                sheet: sheet.to_string(),
                anchor: at,
                end: at,
            },
            None => TrackerState::Idle,
        };
    }

    /// Pointer-enter over a cell while dragging. Moves only the end corner;
    /// the anchor stays fixed. Ignored outside a drag and over non-data cells.
    pub fn pointer_enter(&mut self, cell: Option<Coordinate>) {
        if let (TrackerState::Dragging { end, .. }, Some(at)) = (&mut self.state, cell) {
            *end = at;
        }
    }

    /// Global pointer-up. Commits the drag wherever the pointer is released,
    /// inside the grid or not. Ignored outside a drag.
    pub fn pointer_up(&mut self) {
        if let TrackerState::Dragging { sheet, anchor, end } = &self.state {
            self.state = TrackerState::Committed {
                sheet: sheet.clone(),
                anchor: *anchor,
                end: *end,
            };
        }
    }

    /// Explicitly discard the current drag or committed selection.
    pub fn cancel(&mut self) {
        self.state = TrackerState::Idle;
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, TrackerState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, TrackerState::Dragging { .. })
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, TrackerState::Committed { .. })
    }

    /// Normalized view of the live or committed selection.
    pub fn normalized(&self) -> Option<Range> {
        match &self.state {
            TrackerState::Idle => None,
            TrackerState::Dragging { sheet, anchor, end }
            | TrackerState::Committed { sheet, anchor, end } => {
                Some(Range::new(sheet.clone(), *anchor, *end).normalized())
            }
        }
    }

    /// The committed selection, if any. This is what mapping creation
    /// consumes.
    pub fn committed(&self) -> Option<Range> {
        match &self.state {
            TrackerState::Committed { sheet, anchor, end } => {
                Some(Range::new(sheet.clone(), *anchor, *end).normalized())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_commit_cycle() {
        let mut tracker = SelectionTracker::new();
        assert!(tracker.is_idle());

        tracker.pointer_down("Sheet1", Some(Coordinate::new(2, 1)));
        assert!(tracker.is_dragging());

        tracker.pointer_enter(Some(Coordinate::new(4, 3)));
        tracker.pointer_up();
        assert!(tracker.is_committed());

        let range = tracker.committed().unwrap();
        assert_eq!(range.start, Coordinate::new(2, 1));
        assert_eq!(range.end, Coordinate::new(4, 3));
    }

    #[test]
    fn test_reversed_drag_normalizes() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_down("Sheet1", Some(Coordinate::new(5, 3)));
        tracker.pointer_enter(Some(Coordinate::new(2, 0)));
        tracker.pointer_up();

        let range = tracker.committed().unwrap();
        assert_eq!(range.start, Coordinate::new(2, 0));
        assert_eq!(range.end, Coordinate::new(5, 3));
    }

    #[test]
    fn test_pointer_down_on_header_discards() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_down("Sheet1", Some(Coordinate::new(2, 1)));
        tracker.pointer_up();
        assert!(tracker.is_committed());

        // Clicking a non-data cell (adapter returned None) drops it.
        tracker.pointer_down("Sheet1", None);
        assert!(tracker.is_idle());
        assert_eq!(tracker.committed(), None);
    }

    #[test]
    fn test_new_drag_replaces_committed() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_down("Sheet1", Some(Coordinate::new(1, 1)));
        tracker.pointer_up();

        tracker.pointer_down("Sheet1", Some(Coordinate::new(7, 2)));
        assert!(tracker.is_dragging());
        let range = tracker.normalized().unwrap();
        assert_eq!(range.start, Coordinate::new(7, 2));
    }

    #[test]
    fn test_enter_ignored_when_not_dragging() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_enter(Some(Coordinate::new(3, 3)));
        assert!(tracker.is_idle());

        tracker.pointer_down("Sheet1", Some(Coordinate::new(1, 0)));
        tracker.pointer_up();
        tracker.pointer_enter(Some(Coordinate::new(9, 9)));
        let range = tracker.committed().unwrap();
        assert_eq!(range.end, Coordinate::new(1, 0));
    }

    #[test]
    fn test_enter_over_header_keeps_last_end() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_down("Sheet1", Some(Coordinate::new(1, 0)));
        tracker.pointer_enter(Some(Coordinate::new(3, 2)));
        tracker.pointer_enter(None); // pointer crossed the gutter
        tracker.pointer_up();
        let range = tracker.committed().unwrap();
        assert_eq!(range.end, Coordinate::new(3, 2));
    }

    #[test]
    fn test_reentering_anchor_keeps_drag_alive() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_down("Sheet1", Some(Coordinate::new(2, 2)));
        tracker.pointer_enter(Some(Coordinate::new(5, 5)));
        tracker.pointer_enter(Some(Coordinate::new(2, 2)));
        tracker.pointer_up();
        let range = tracker.committed().unwrap();
        assert!(range.is_single());
        assert_eq!(range.start, Coordinate::new(2, 2));
    }

    #[test]
    fn test_pointer_up_without_drag_is_noop() {
        let mut tracker = SelectionTracker::new();
        tracker.pointer_up();
        assert!(tracker.is_idle());
    }
}
