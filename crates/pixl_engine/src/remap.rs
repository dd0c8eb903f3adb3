use serde::{Deserialize, Serialize};

use crate::TileIndex;

/// Destination of one entry of a [`Remap`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemapTarget {
    Mapped(TileIndex),
    /// The entry is deleted by the operation. Only legal when the caller
    /// can prove the index unused (see [`Remap::is_invertible`]).
    Unmapped,
}

/// A total function over tile indices describing a structural reorder or
/// delete.
///
/// One remap is built per structural operation, applied to the tile
/// store and to the index buffer of every referencing tilemap, then
/// discarded; the inverse permutation is the undo currency for these
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remap {
    targets: Vec<RemapTarget>,
}

impl Remap {
    /// Creates an identity remap over `0..size`.
    pub fn new(size: usize) -> Self {
        Self {
            targets: (0..size).map(|i| RemapTarget::Mapped(i as TileIndex)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, from: TileIndex) -> RemapTarget {
        self.targets.get(from as usize).copied().unwrap_or(RemapTarget::Mapped(from))
    }

    pub fn map(&mut self, from: TileIndex, to: TileIndex) {
        debug_assert!((from as usize) < self.targets.len(), "remap source {from} out of range");
        if let Some(target) = self.targets.get_mut(from as usize) {
            *target = RemapTarget::Mapped(to);
        }
    }

    /// Marks an entry as deleted.
    pub fn unmap(&mut self, from: TileIndex) {
        debug_assert!((from as usize) < self.targets.len(), "remap source {from} out of range");
        if let Some(target) = self.targets.get_mut(from as usize) {
            *target = RemapTarget::Unmapped;
        }
    }

    pub fn is_identity(&self) -> bool {
        self.targets
            .iter()
            .enumerate()
            .all(|(i, target)| *target == RemapTarget::Mapped(i as TileIndex))
    }

    /// True if, restricted to the indices flagged in `used`, no two
    /// entries share a destination and no used entry is unmapped.
    ///
    /// Callers use this to pick between a cheap index-only undo (apply
    /// [`Remap::invert`]) and an expensive content-copy undo.
    pub fn is_invertible(&self, used: &TilePicks) -> bool {
        let mut used_targets = vec![false; self.targets.len()];
        for (i, target) in self.targets.iter().enumerate() {
            if !used.get(i) {
                continue;
            }
            match target {
                RemapTarget::Unmapped => return false,
                RemapTarget::Mapped(to) => {
                    let Some(slot) = used_targets.get_mut(*to as usize) else {
                        return false;
                    };
                    if *slot {
                        return false;
                    }
                    *slot = true;
                }
            }
        }
        true
    }

    /// Builds the inverse permutation. Destinations without a preimage
    /// map to themselves; unmapped entries contribute nothing.
    pub fn invert(&self) -> Remap {
        let mut result = Remap::new(self.targets.len());
        for (i, target) in self.targets.iter().enumerate() {
            if let RemapTarget::Mapped(to) = target {
                result.map(*to, i as TileIndex);
            }
        }
        result
    }
}

/// A growable set of picked tile indices.
///
/// Serves both as a selection (tile management operations) and as the
/// usage set for invertibility checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePicks {
    items: Vec<bool>,
}

impl TilePicks {
    pub fn new(size: usize) -> Self {
        Self { items: vec![false; size] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.items.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.items.len() {
            self.items.resize(index + 1, false);
        }
        self.items[index] = value;
    }

    pub fn resize(&mut self, size: usize) {
        self.items.resize(size, false);
    }

    /// Number of picked entries.
    pub fn count(&self) -> usize {
        self.items.iter().filter(|&&picked| picked).count()
    }
}

impl FromIterator<usize> for TilePicks {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut picks = TilePicks::default();
        for index in iter {
            picks.set(index, true);
        }
        picks
    }
}

/// Builds the permutation that moves the picked entries in front of
/// `before_index`, keeping the relative order of everything else.
pub fn create_remap_to_move_picks(picks: &TilePicks, before_index: usize) -> Remap {
    let mut remap = Remap::new(picks.len());

    let mut selected_total = 0;
    let mut selected_before_index = 0;
    for i in 0..picks.len() {
        if picks.get(i) {
            selected_total += 1;
            if i < before_index {
                selected_before_index += 1;
            }
        }
    }

    let boundary = before_index - selected_before_index;
    let mut j = 0;
    let mut k = 0;
    for i in 0..picks.len() {
        if picks.get(i) {
            remap.map(i as TileIndex, (boundary + j) as TileIndex);
            j += 1;
        } else {
            if k == boundary {
                k += selected_total;
            }
            remap.map(i as TileIndex, k as TileIndex);
            k += 1;
        }
    }
    remap
}
