//! Bounded undo/redo over immutable snapshots.

use std::collections::VecDeque;

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A present value with bounded undo and redo stacks.
///
/// `record` pushes the current present onto the undo stack (evicting the
/// oldest entry beyond `capacity`) and clears the redo stack.
#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    present: T,
    future: Vec<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(present: T) -> Self {
        Self::with_capacity(present, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(present: T, capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present,
            future: Vec::new(),
            capacity,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    /// Mutable access for changes that do not get an undo step.
    pub(crate) fn present_mut(&mut self) -> &mut T {
        &mut self.present
    }

    /// Commit `next` as the new present.
    pub fn record(&mut self, next: T) {
        let previous = std::mem::replace(&mut self.present, next);
        if self.capacity > 0 {
            self.past.push_back(previous);
            while self.past.len() > self.capacity {
                self.past.pop_front();
            }
        }
        self.future.clear();
    }

    /// Step back. Returns `false` (and does nothing) with nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        true
    }

    /// Step forward. Returns `false` (and does nothing) with nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        true
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_round_trip() {
        let mut h = History::new(0);
        h.record(1);
        h.record(2);
        assert!(h.undo());
        assert_eq!(*h.present(), 1);
        assert!(h.redo());
        assert_eq!(*h.present(), 2);
        assert_eq!((h.undo_depth(), h.redo_depth()), (2, 0));
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut h = History::new("a");
        assert!(!h.undo());
        assert!(!h.redo());
        assert_eq!(*h.present(), "a");
    }

    #[test]
    fn test_record_clears_redo() {
        let mut h = History::new(0);
        h.record(1);
        h.undo();
        assert_eq!(h.redo_depth(), 1);
        h.record(5);
        assert_eq!(h.redo_depth(), 0);
        assert!(!h.redo());
        assert_eq!(*h.present(), 5);
    }

    #[test]
    fn test_oldest_entries_evicted() {
        let mut h = History::with_capacity(0, 3);
        for i in 1..=10 {
            h.record(i);
        }
        assert_eq!(h.undo_depth(), 3);
        while h.undo() {}
        assert_eq!(*h.present(), 7);
    }

    #[test]
    fn test_zero_capacity_keeps_no_past() {
        let mut h = History::with_capacity(0, 0);
        h.record(1);
        assert_eq!(h.undo_depth(), 0);
        assert!(!h.undo());
        assert_eq!(*h.present(), 1);
    }
}
