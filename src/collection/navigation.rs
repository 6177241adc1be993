//! Cursor movement inside the view

use super::SegmentCollection;
use crate::undo::Command;

impl SegmentCollection {
    /// Move `n` segments forward; moving past the end is a no-op
    ///
    /// Returns the navigation command when the cursor moved.
    pub fn next(&mut self, n: usize) -> Option<Command> {
        let cursor = self.cursor?;
        let to = cursor.checked_add(n).filter(|&t| t < self.view.len())?;
        self.move_cursor(to)
    }

    /// Move `n` segments backward; moving past the start is a no-op
    pub fn previous(&mut self, n: usize) -> Option<Command> {
        let cursor = self.cursor?;
        let to = cursor.checked_sub(n)?;
        self.move_cursor(to)
    }

    /// Absolute move, clamped to the view
    pub fn go_to(&mut self, index: usize) -> Option<Command> {
        if self.view.is_empty() {
            return None;
        }
        self.move_cursor(index.min(self.view.len() - 1))
    }

    fn move_cursor(&mut self, to: usize) -> Option<Command> {
        let from = self.cursor;
        if from == Some(to) {
            return None;
        }
        self.cursor = Some(to);
        Some(Command::GoTo { from, to: Some(to) })
    }
}
