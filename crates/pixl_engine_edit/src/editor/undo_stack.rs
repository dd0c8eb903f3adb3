//! Undo stack for tilemap editing
//!
//! Holds committed operations; every mutating edit goes through the
//! stack so the transaction order is strict and replayable.

use serde::{Deserialize, Serialize};

use crate::Result;

use super::TilemapUndoOp;

pub trait UndoState {
    fn undo_description(&self) -> Option<String>;
    fn can_undo(&self) -> bool;

    /// Perform undo operation
    fn undo(&mut self) -> Result<()>;

    fn redo_description(&self) -> Option<String>;
    fn can_redo(&self) -> bool;

    /// Perform redo operation
    fn redo(&mut self) -> Result<()>;
}

/// Type of operation for grouping related undos
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Unknown,
    /// A tilemap synchronization gesture (paint stroke, fill, …)
    ModifyTilemap,
    /// Tile store management (move/copy tiles, GC)
    TileManagement,
}

/// Ordered undo/redo storage for [`TilemapUndoOp`] values.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UndoStack {
    undo: Vec<TilemapUndoOp>,
    redo: Vec<TilemapUndoOp>,
    save_point: Option<usize>,
}

impl UndoStack {
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo.last().map(TilemapUndoOp::get_description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo.last().map(TilemapUndoOp::get_description)
    }

    /// Pushes a new operation, clearing the redo branch.
    pub fn push(&mut self, op: TilemapUndoOp) {
        self.redo.clear();
        self.undo.push(op);
    }

    pub fn pop_undo(&mut self) -> Option<TilemapUndoOp> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<TilemapUndoOp> {
        self.redo.pop()
    }

    pub fn push_redo(&mut self, op: TilemapUndoOp) {
        self.redo.push(op);
    }

    /// Re-pushes an operation after redo without clearing the redo
    /// branch.
    pub fn push_undone(&mut self, op: TilemapUndoOp) {
        self.undo.push(op);
    }

    /// Removes and returns all operations from `base_count` on, in
    /// order. Used to collapse a gesture into one atomic operation.
    pub fn drain_from(&mut self, base_count: usize) -> Vec<TilemapUndoOp> {
        self.undo.drain(base_count..).collect()
    }

    /// Marks the current position as the saved document state.
    pub fn mark_saved(&mut self) {
        self.save_point = Some(self.undo.len());
    }

    pub fn is_at_save_point(&self) -> bool {
        self.save_point == Some(self.undo.len())
    }
}
