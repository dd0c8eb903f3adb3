//! Atomic undo guard

use super::OperationType;

/// Guard for grouping multiple operations into a single undo step.
///
/// Taken with [`super::EditState::begin_atomic_undo`] and consumed by
/// [`super::EditState::end_atomic_undo`]; everything pushed in between
/// becomes one atomic unit.
#[must_use]
pub struct AtomicUndoGuard {
    base_count: usize,
    description: String,
    operation_type: OperationType,
}

impl AtomicUndoGuard {
    pub(crate) fn new(description: String, base_count: usize, operation_type: OperationType) -> Self {
        Self {
            base_count,
            description,
            operation_type,
        }
    }

    pub fn base_count(&self) -> usize {
        self.base_count
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }
}
