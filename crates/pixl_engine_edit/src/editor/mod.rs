pub mod undo_stack;
pub use undo_stack::*;

pub mod undo_operation;
pub use undo_operation::TilemapUndoOp;

mod atomic_undo_guard;
pub use atomic_undo_guard::AtomicUndoGuard;

mod tilemap_operations;
pub use tilemap_operations::*;

mod tileset_operations;

use crate::{Result, Sprite};

/// Editing session around one [`Sprite`].
///
/// All modifications go through the undo system: each mutating call
/// executes its operations and appends them, strictly ordered, to the
/// owned [`UndoStack`]. Gestures wrap their operations with
/// [`EditState::begin_atomic_undo`] so they undo/redo as one unit.
/// The state assumes exclusive access while an edit runs; callers
/// serialize transactions.
pub struct EditState {
    sprite: Sprite,

    undo_stack: UndoStack,
    is_dirty: bool,
}

impl Default for EditState {
    fn default() -> Self {
        Self::new(Sprite::default())
    }
}

impl EditState {
    pub fn new(sprite: Sprite) -> Self {
        Self {
            sprite,
            undo_stack: UndoStack::default(),
            is_dirty: false,
        }
    }

    pub fn get_sprite(&self) -> &Sprite {
        &self.sprite
    }

    pub fn get_sprite_mut(&mut self) -> &mut Sprite {
        &mut self.sprite
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Marks as saved (clears dirty flag and marks save point in undo stack)
    pub fn mark_saved(&mut self) {
        self.is_dirty = false;
        self.undo_stack.mark_saved();
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    /// Begin an atomic undo group
    ///
    /// All operations pushed while the guard is active are collapsed
    /// into a single unit by [`EditState::end_atomic_undo`].
    #[must_use]
    pub fn begin_atomic_undo(&mut self, description: impl Into<String>) -> AtomicUndoGuard {
        self.begin_typed_atomic_undo(description, OperationType::Unknown)
    }

    /// Begin a typed atomic undo group
    #[must_use]
    pub fn begin_typed_atomic_undo(&mut self, description: impl Into<String>, operation_type: OperationType) -> AtomicUndoGuard {
        AtomicUndoGuard::new(description.into(), self.undo_stack.undo_len(), operation_type)
    }

    /// End an atomic undo group, collapsing everything pushed since the
    /// guard was taken into one operation.
    pub fn end_atomic_undo(&mut self, guard: AtomicUndoGuard) {
        if guard.base_count() >= self.undo_stack.undo_len() {
            return;
        }
        let operations = self.undo_stack.drain_from(guard.base_count());
        self.undo_stack.push_undone(TilemapUndoOp::Atomic {
            description: guard.description().to_string(),
            operations,
            operation_type: guard.operation_type(),
        });
    }

    /// Push an undo operation and execute it (redo)
    pub(crate) fn push_undo_action(&mut self, mut op: TilemapUndoOp) -> Result<()> {
        op.redo(self)?;
        self.push_plain_undo(op)
    }

    /// Push an undo operation without executing it
    pub(crate) fn push_plain_undo(&mut self, op: TilemapUndoOp) -> Result<()> {
        self.is_dirty = true;
        self.undo_stack.push(op);
        Ok(())
    }
}

impl UndoState for EditState {
    fn undo_description(&self) -> Option<String> {
        self.undo_stack.undo_description()
    }

    fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    fn undo(&mut self) -> Result<()> {
        let Some(mut op) = self.undo_stack.pop_undo() else {
            return Ok(());
        };
        self.is_dirty = true;

        let result = op.undo(self);
        self.undo_stack.push_redo(op);
        result
    }

    fn redo_description(&self) -> Option<String> {
        self.undo_stack.redo_description()
    }

    fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    fn redo(&mut self) -> Result<()> {
        let Some(mut op) = self.undo_stack.pop_redo() else {
            return Ok(());
        };
        self.is_dirty = true;

        let result = op.redo(self);
        self.undo_stack.push_undone(op);
        result
    }
}
