//! Tile store management
//!
//! Garbage collection after automatic edits plus the user-facing
//! move/copy operations on picked tiles. Everything that reorders or
//! shrinks the store pairs the structural change with index-buffer
//! updates on every referencing tilemap, inside one atomic group.

use crate::{Remap, RemapTarget, Result, Tile, TileIndex, TilePicks, TilemapUndoOp, create_remap_to_move_picks};

use super::{EditState, OperationType};

impl EditState {
    /// Removes tiles that lost their last reference during the current
    /// batch and compacts the store.
    ///
    /// Conservative by design: an index with zero references that this
    /// batch never modified survives, so unrelated edits cannot trigger
    /// surprising large-scale renumbering. The empty tile (slot 0) is
    /// never collected.
    pub(crate) fn remove_unused_tiles(&mut self, tileset: usize, histogram: &[usize], modified: &[bool]) -> Result<()> {
        let len = self.get_sprite().get_tileset(tileset)?.len();
        log::trace!("remove_unused_tiles: {len} slots");

        let mut remap = Remap::new(len);
        let mut compacted: TileIndex = 0;
        for index in 0..len {
            let dead = index != 0 && index < histogram.len() && histogram[index] == 0 && modified.get(index).copied().unwrap_or(false);
            if dead {
                self.push_undo_action(TilemapUndoOp::RemoveTile {
                    tileset,
                    tile_index: compacted,
                    tile: None,
                })?;
                // Map to nothing, so the map stays invertible.
                remap.unmap(index as TileIndex);
            } else {
                remap.map(index as TileIndex, compacted);
                compacted += 1;
            }
        }

        if !remap.is_identity() {
            // Every live index is mapped uniquely, so the cheap
            // index-only undo (the inverse permutation) is valid.
            debug_assert!(remap.is_invertible(&live_picks(histogram, len)));
            self.push_undo_action(TilemapUndoOp::RemapTilemaps { tileset, remap })?;
        }
        Ok(())
    }

    /// Moves the picked tiles in front of `before_index`, updating
    /// `picks` and `current_entry` to follow their tiles.
    pub fn move_tiles_in_tileset(&mut self, tileset: usize, picks: &mut TilePicks, current_entry: &mut TileIndex, before_index: usize) -> Result<()> {
        // The empty tile stays at slot 0: nothing moves in front of it
        // and it is never picked.
        let before_index = before_index.max(1);
        picks.set(0, false);
        if picks.count() == 0 {
            return Ok(());
        }
        log::trace!("move_tiles_in_tileset: {} picks before {before_index}", picks.count());
        picks.resize(picks.len().max(before_index));

        let guard = self.begin_typed_atomic_undo("Move tiles", OperationType::TileManagement);

        // Fill the gap between the end of the store and the drop point
        // with empty tiles.
        loop {
            let len = self.get_sprite().get_tileset(tileset)?.len();
            if len >= before_index {
                break;
            }
            let tile = self.get_sprite().get_tileset(tileset)?.make_empty_tile();
            self.push_undo_action(TilemapUndoOp::AddTile {
                tileset,
                tile_index: len as TileIndex,
                tile: Some(tile),
            })?;
        }
        picks.resize(self.get_sprite().get_tileset(tileset)?.len());

        let remap = create_remap_to_move_picks(picks, before_index);
        self.push_undo_action(TilemapUndoOp::RemapTileset {
            tileset,
            remap: remap.clone(),
        })?;
        self.end_atomic_undo(guard);

        // The selection follows the moved tiles.
        let old_picks = picks.clone();
        for i in 0..old_picks.len() {
            if let RemapTarget::Mapped(to) = remap.get(i as TileIndex) {
                picks.set(to as usize, old_picks.get(i));
            }
        }
        if let RemapTarget::Mapped(to) = remap.get(*current_entry) {
            *current_entry = to;
        }
        Ok(())
    }

    /// Inserts deep copies of the picked tiles in front of
    /// `before_index`; `picks` is updated to select the copies.
    pub fn copy_tiles_in_tileset(&mut self, tileset: usize, picks: &mut TilePicks, before_index: usize) -> Result<()> {
        // Nothing is copied in front of the empty tile.
        let before_index = before_index.max(1);
        if picks.count() == 0 {
            return Ok(());
        }
        log::trace!("copy_tiles_in_tileset: {} picks before {before_index}", picks.count());

        let mut new_tiles: Vec<Tile> = Vec::new();
        {
            let ts = self.get_sprite().get_tileset(tileset)?;
            for i in 0..picks.len() {
                if !picks.get(i) {
                    continue;
                }
                // Picks beyond the store copy as empty tiles.
                new_tiles.push(ts.get(i as TileIndex).cloned().unwrap_or_else(|| ts.make_empty_tile()));
            }
        }

        let guard = self.begin_typed_atomic_undo("Copy tiles", OperationType::TileManagement);

        // Pad the store up to the insertion point.
        loop {
            let len = self.get_sprite().get_tileset(tileset)?.len();
            if len >= before_index {
                break;
            }
            let tile = self.get_sprite().get_tileset(tileset)?.make_empty_tile();
            self.push_undo_action(TilemapUndoOp::AddTile {
                tileset,
                tile_index: len as TileIndex,
                tile: Some(tile),
            })?;
        }
        let pre_insert_len = self.get_sprite().get_tileset(tileset)?.len();

        let count = new_tiles.len();
        for (offset, tile) in new_tiles.into_iter().enumerate() {
            self.push_undo_action(TilemapUndoOp::AddTile {
                tileset,
                tile_index: (before_index + offset) as TileIndex,
                tile: Some(tile),
            })?;
        }

        // Inserting in the middle shifted every slot at or after the
        // insertion point; rewrite the referencing tilemaps to match.
        let mut remap = Remap::new(pre_insert_len);
        for index in before_index..pre_insert_len {
            remap.map(index as TileIndex, (index + count) as TileIndex);
        }
        if !remap.is_identity() {
            self.push_undo_action(TilemapUndoOp::RemapTilemaps { tileset, remap })?;
        }
        self.end_atomic_undo(guard);

        // The selection moves to the fresh copies.
        picks.resize(self.get_sprite().get_tileset(tileset)?.len());
        for i in 0..picks.len() {
            picks.set(i, i >= before_index && i < before_index + count);
        }
        Ok(())
    }
}

fn live_picks(histogram: &[usize], len: usize) -> TilePicks {
    let mut picks = TilePicks::new(len);
    for index in 0..len {
        // Indices past the histogram are tiles added this batch; they
        // are referenced by the cells that created them.
        picks.set(index, index >= histogram.len() || histogram[index] > 0);
    }
    picks
}

#[cfg(test)]
mod tests {
    use crate::{EditState, Pixmap, Rectangle, Sprite, TileData, TileGrid, TilePicks, TileRef, TilemapLayer, Tileset, TilesetMode, UndoState, rgba};

    fn colored_state(colors: &[u32]) -> EditState {
        let mut sprite = Sprite::new((16, 16));
        let tsi = sprite.tilesets.add(Tileset::new("tiles", TileGrid::new((4, 4)), 1));
        {
            let ts = sprite.tilesets.get_mut(tsi).unwrap();
            for &color in colors {
                ts.add(Pixmap::filled((4, 4), color), TileData::default());
            }
        }
        sprite.layers.push(TilemapLayer::new("layer 1", tsi, (2, 2)));
        EditState::new(sprite)
    }

    #[test]
    fn test_gc_scenario() {
        // Histogram {1: 0 touched, 2: 3, 3: 0 untouched}: only slot 1
        // goes away, slot 3 survives untouched.
        let mut state = colored_state(&[rgba(255, 0, 0, 255), rgba(0, 255, 0, 255), rgba(0, 0, 255, 255)]);
        for pos in [(0usize, 0usize), (1, 0), (0, 1)] {
            state.get_sprite_mut().get_layer_mut(0).unwrap().map.set(pos, TileRef::from_index(2));
        }

        let histogram = state.get_sprite().tiles_histogram(0);
        assert_eq!(vec![0, 0, 3, 0], histogram);

        let modified = vec![false, true, false, false];
        state.remove_unused_tiles(0, &histogram, &modified).unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(3, ts.len());
        assert_eq!(Pixmap::filled((4, 4), rgba(0, 255, 0, 255)), ts.get(1).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), rgba(0, 0, 255, 255)), ts.get(2).unwrap().image);
        // Every referencing cell followed the compaction.
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));

        // Ops were pushed without an atomic group here: undo the remap,
        // then the removal.
        state.undo().unwrap();
        state.undo().unwrap();
        assert_eq!(4, state.get_sprite().get_tileset(0).unwrap().len());
        assert_eq!(TileRef::from_index(2), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert_eq!(
            Pixmap::filled((4, 4), rgba(255, 0, 0, 255)),
            state.get_sprite().get_tileset(0).unwrap().get(1).unwrap().image
        );
    }

    #[test]
    fn test_move_tiles() {
        let mut state = colored_state(&[rgba(255, 0, 0, 255), rgba(0, 255, 0, 255), rgba(0, 0, 255, 255)]);
        state.get_sprite_mut().get_layer_mut(0).unwrap().map.set((0, 0), TileRef::from_index(1));

        // Move the red tile (1) to the end.
        let mut picks: TilePicks = [1].into_iter().collect();
        picks.resize(4);
        let mut current = 1;
        state.move_tiles_in_tileset(0, &mut picks, &mut current, 4).unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(4, ts.len());
        assert_eq!(Pixmap::filled((4, 4), rgba(0, 255, 0, 255)), ts.get(1).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), rgba(255, 0, 0, 255)), ts.get(3).unwrap().image);

        // Cell, picks and current entry all follow the move.
        assert_eq!(TileRef::from_index(3), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert!(picks.get(3));
        assert!(!picks.get(1));
        assert_eq!(3, current);

        state.undo().unwrap();
        assert_eq!(
            Pixmap::filled((4, 4), rgba(255, 0, 0, 255)),
            state.get_sprite().get_tileset(0).unwrap().get(1).unwrap().image
        );
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
    }

    #[test]
    fn test_move_tiles_ignores_slot_zero() {
        let mut state = colored_state(&[rgba(255, 0, 0, 255)]);
        // Only slot 0 picked: after the forced exclusion the pick set is
        // empty and the call is a cheap no-op.
        let mut picks: TilePicks = [0].into_iter().collect();
        picks.resize(2);
        let mut current = 0;
        state.move_tiles_in_tileset(0, &mut picks, &mut current, 2).unwrap();

        assert!(!state.can_undo());
        assert_eq!(0, picks.count());
    }

    #[test]
    fn test_move_tiles_pads_store_to_drop_point() {
        let mut state = colored_state(&[rgba(255, 0, 0, 255)]);
        let mut picks: TilePicks = [1].into_iter().collect();
        let mut current = 1;
        state.move_tiles_in_tileset(0, &mut picks, &mut current, 4).unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(4, ts.len());
        assert_eq!(Pixmap::filled((4, 4), rgba(255, 0, 0, 255)), ts.get(3).unwrap().image);
        assert!(ts.get(1).unwrap().image.is_empty());
        assert!(ts.get(2).unwrap().image.is_empty());
    }

    #[test]
    fn test_copy_tiles_updates_referencing_tilemaps() {
        let mut state = colored_state(&[rgba(255, 0, 0, 255), rgba(0, 255, 0, 255)]);
        state.get_sprite_mut().get_layer_mut(0).unwrap().map.set((0, 0), TileRef::from_index(2));

        // Duplicate the red tile (1) in front of slot 1.
        let mut picks: TilePicks = [1].into_iter().collect();
        state.copy_tiles_in_tileset(0, &mut picks, 1).unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(4, ts.len());
        // The copy sits at slot 1, the originals shifted up.
        assert_eq!(Pixmap::filled((4, 4), rgba(255, 0, 0, 255)), ts.get(1).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), rgba(255, 0, 0, 255)), ts.get(2).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), rgba(0, 255, 0, 255)), ts.get(3).unwrap().image);
        // The cell referencing the shifted green tile was rewritten.
        assert_eq!(TileRef::from_index(3), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert!(picks.get(1));
        assert!(!picks.get(2));

        state.undo().unwrap();
        assert_eq!(3, state.get_sprite().get_tileset(0).unwrap().len());
        assert_eq!(TileRef::from_index(2), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
    }

    #[test]
    fn test_gc_never_removes_fresh_tiles() {
        // A tile added during the batch is always kept even though the
        // histogram never saw it.
        let mut state = colored_state(&[]);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &|existing: &Pixmap, _| {
                Pixmap::filled(existing.get_size(), rgba(9, 9, 9, 255))
            })
            .unwrap();
        assert_eq!(2, state.get_sprite().get_tileset(0).unwrap().len());
    }
}
