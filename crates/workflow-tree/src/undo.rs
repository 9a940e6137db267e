//! Edit history as compressed task-list snapshots
//!
//! Every structural edit pushes the serialized task list. Snapshots are
//! zstd-compressed, so keeping a deep history of a large workflow stays
//! cheap, and restoring one is just rebuilding the tree from it.

use std::collections::VecDeque;

use serde_json::Value;

use crate::constants::history;
use crate::error::{FlowError, Result};

/// Undo/redo stack using compressed snapshots
#[derive(Debug)]
pub struct UndoStack {
    snapshots: VecDeque<Vec<u8>>,
    /// Index of the snapshot matching the current tree
    current: usize,
    max_snapshots: usize,
}

impl UndoStack {
    /// Create a stack keeping at most `max_snapshots` entries (at least one)
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Record a new state, dropping any redo history
    pub fn push(&mut self, tasks: &[Value]) -> Result<()> {
        let json = serde_json::to_vec(tasks)?;
        let compressed = zstd::encode_all(&json[..], history::COMPRESSION_LEVEL)
            .map_err(|e| FlowError::Compression(e.to_string()))?;

        self.snapshots.truncate(self.current + 1);
        if self.snapshots.back() == Some(&compressed) {
            return Ok(());
        }
        self.snapshots.push_back(compressed);
        self.current = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.current = self.current.saturating_sub(1);
        }
        Ok(())
    }

    /// Step back; returns the previous task list, or None at the beginning
    pub fn undo(&mut self) -> Option<Result<Vec<Value>>> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        Some(self.decompress(self.current))
    }

    /// Step forward; returns the next task list, or None at the end
    pub fn redo(&mut self) -> Option<Result<Vec<Value>>> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        Some(self.decompress(self.current))
    }

    pub fn current(&self) -> Option<Result<Vec<Value>>> {
        if self.snapshots.is_empty() {
            None
        } else {
            Some(self.decompress(self.current))
        }
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }

    /// Total compressed size of all snapshots, in bytes
    pub fn compressed_size(&self) -> usize {
        self.snapshots.iter().map(Vec::len).sum()
    }

    fn decompress(&self, index: usize) -> Result<Vec<Value>> {
        let compressed = self
            .snapshots
            .get(index)
            .ok_or_else(|| FlowError::Compression(format!("no snapshot at {}", index)))?;
        let json = zstd::decode_all(&compressed[..]).map_err(|e| FlowError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(history::MAX_SNAPSHOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks(name: &str) -> Vec<Value> {
        vec![json!({"name": name, "taskReferenceName": name, "type": "SIMPLE"})]
    }

    fn first_ref(tasks: Vec<Value>) -> String {
        tasks[0]["taskReferenceName"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_push_and_undo() {
        let mut stack = UndoStack::new(10);
        stack.push(&tasks("first")).unwrap();
        stack.push(&tasks("second")).unwrap();
        stack.push(&tasks("third")).unwrap();

        assert_eq!(first_ref(stack.current().unwrap().unwrap()), "third");
        assert_eq!(first_ref(stack.undo().unwrap().unwrap()), "second");
        assert_eq!(first_ref(stack.undo().unwrap().unwrap()), "first");
        assert!(stack.undo().is_none());
    }

    #[test]
    fn test_redo() {
        let mut stack = UndoStack::new(10);
        stack.push(&tasks("first")).unwrap();
        stack.push(&tasks("second")).unwrap();
        stack.undo();

        assert_eq!(first_ref(stack.redo().unwrap().unwrap()), "second");
        assert!(stack.redo().is_none());
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut stack = UndoStack::new(10);
        stack.push(&tasks("first")).unwrap();
        stack.push(&tasks("second")).unwrap();
        stack.undo();
        stack.push(&tasks("third")).unwrap();

        assert!(!stack.can_redo());
        assert_eq!(stack.len(), 2);
        assert_eq!(first_ref(stack.current().unwrap().unwrap()), "third");
    }

    #[test]
    fn test_identical_push_is_ignored() {
        let mut stack = UndoStack::new(10);
        stack.push(&tasks("same")).unwrap();
        stack.push(&tasks("same")).unwrap();
        assert_eq!(stack.len(), 1);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_max_snapshots() {
        let mut stack = UndoStack::new(3);
        for i in 0..5 {
            stack.push(&tasks(&format!("graph_{}", i))).unwrap();
        }
        assert_eq!(stack.len(), 3);
        assert_eq!(first_ref(stack.current().unwrap().unwrap()), "graph_4");
        stack.undo();
        stack.undo();
        assert!(!stack.can_undo());
        assert!(stack.compressed_size() > 0);
    }
}
