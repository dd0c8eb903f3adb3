//! Tilemap synchronization
//!
//! Translates per-pixel edits on a tilemap layer into reversible
//! operations on the shared tile store and the layer's index buffer.
//! All referencing layers of a store form one consistency domain: every
//! structural store change emitted here is paired with the matching
//! index-buffer updates inside the same atomic group.

use std::collections::HashSet;

use crate::{Pixmap, Position, Rectangle, Result, Tile, TileFlags, TileIndex, TileRef, Tilemap, TilemapUndoOp};

use super::{EditState, OperationType};

/// How edits to a tilemap layer interact with its tile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilesetMode {
    /// Edit the referenced tiles in place; never create or reuse tiles.
    Manual,
    /// Create, reuse and garbage-collect tiles automatically.
    Auto,
    /// Like `Auto`, but prefer new tiles over in-place mutation.
    Stack,
}

/// Pixel producer supplied by the editing caller (paint stroke, fill,
/// …): given the currently stored tile image and the tile's canvas
/// bounds, returns the tile's new pixel content.
pub type GetTileImage<'a> = &'a dyn Fn(&Pixmap, Rectangle) -> Pixmap;

impl EditState {
    /// Applies a pixel edit covering `region` (canvas coordinates) to a
    /// tilemap layer.
    ///
    /// In `Auto`/`Stack` mode the tilemap grows to cover the region, new
    /// content is deduplicated against the store, exclusively used tiles
    /// are overwritten in place (`Auto` only) and tiles orphaned by this
    /// batch are garbage collected (`Auto` only). In `Manual` mode only
    /// the pixels of already-referenced tiles change; the index buffer
    /// stays untouched.
    ///
    /// Cells whose produced content equals their current content emit no
    /// operation.
    pub fn modify_tilemap_region(&mut self, layer: usize, region: Rectangle, mode: TilesetMode, get_tile_image: GetTileImage) -> Result<()> {
        if region.is_empty() {
            return Ok(());
        }
        let (tileset_index, layer_position, old_map) = {
            let layer = self.get_sprite().get_layer(layer)?;
            (layer.tileset_index, layer.position, layer.map.clone())
        };
        let grid = self.get_sprite().get_tileset(tileset_index)?.grid().with_origin(layer_position);

        let old_bounds = Rectangle::from_min_size(grid.canvas_to_tile_point(layer_position), old_map.get_size());
        let patch_bounds = grid.canvas_to_tile(region);
        log::trace!("modify_tilemap_region: layer={layer} mode={mode:?} region={region} old_bounds={old_bounds} patch_bounds={patch_bounds}");

        match mode {
            TilesetMode::Auto | TilesetMode::Stack => self.modify_tilemap_region_auto(layer, region, mode, get_tile_image, old_bounds, patch_bounds, &old_map),
            TilesetMode::Manual => self.modify_tilemap_region_manual(layer, region, get_tile_image, old_bounds),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn modify_tilemap_region_auto(
        &mut self,
        layer: usize,
        region: Rectangle,
        mode: TilesetMode,
        get_tile_image: GetTileImage,
        old_bounds: Rectangle,
        patch_bounds: Rectangle,
        old_map: &Tilemap,
    ) -> Result<()> {
        let tileset_index = self.get_sprite().get_layer(layer)?.tileset_index;
        let layer_position = self.get_sprite().get_layer(layer)?.position;
        let grid = self.get_sprite().get_tileset(tileset_index)?.grid().with_origin(layer_position);
        let store_len = self.get_sprite().get_tileset(tileset_index)?.len();

        let new_bounds = old_bounds.union(&patch_bounds);
        let mut new_map = Tilemap::new(new_bounds.size);
        new_map.blit(old_map, old_bounds.start - new_bounds.start);

        // One histogram per batch: it decides whether a tile is
        // exclusively used by the edited cell (safe to overwrite) or
        // shared (must be forked). Stack mode never overwrites, so only
        // Auto consults it.
        let mut histogram = self.get_sprite().tiles_histogram(tileset_index);
        let mut modified = vec![false; store_len];

        // Cells to visit: everything gained by growing the map plus the
        // cells covering the edited region.
        let region_tiles: HashSet<Position> = grid.tiles_in_canvas_region(region).into_iter().collect();

        let guard = self.begin_typed_atomic_undo("Modify tilemap", OperationType::ModifyTilemap);
        let mut changed_cells: Vec<(Position, TileRef, TileRef)> = Vec::new();

        for y in new_bounds.y_range() {
            for x in new_bounds.x_range() {
                let tile_pt = Position::new(x, y);
                if old_bounds.is_inside(tile_pt) && !region_tiles.contains(&tile_pt) {
                    continue;
                }
                let cell_pos = tile_pt - new_bounds.start;
                let old_ref = new_map.get(cell_pos);
                let old_index = old_ref.index();

                let Some(existing) = self.get_sprite().get_tileset(tileset_index)?.get(old_index).map(|t| t.image.clone()) else {
                    // The cell references a slot outside the store; leave it alone.
                    continue;
                };

                let mut candidate = get_tile_image(&existing, grid.tile_bounds(tile_pt));
                candidate.normalize_transparent();

                let found = self.get_sprite_mut().get_tileset_mut(tileset_index)?.find_tile(&candidate);
                let new_ref = if let Some((index, flags)) = found {
                    // Re-use an existing tile: independent edits that
                    // converge on the same pixels collapse to one slot.
                    TileRef::new(index, flags)
                } else if mode == TilesetMode::Auto
                    && old_ref != TileRef::EMPTY
                    && old_index != 0
                    && (old_index as usize) < histogram.len()
                    && histogram[old_index as usize] == 1
                {
                    // Common case: the tile is used by this cell alone,
                    // overwrite it in place.
                    self.push_undo_action(TilemapUndoOp::CopyTileRegion {
                        tileset: tileset_index,
                        tile_index: old_index,
                        old_image: existing,
                        new_image: candidate,
                    })?;
                    TileRef::from_index(old_index)
                } else {
                    let index = self.get_sprite().get_tileset(tileset_index)?.len() as TileIndex;
                    self.push_undo_action(TilemapUndoOp::AddTile {
                        tileset: tileset_index,
                        tile_index: index,
                        tile: Some(Tile::new(candidate)),
                    })?;
                    TileRef::from_index(index)
                };

                if mode == TilesetMode::Auto && old_ref != TileRef::EMPTY && (old_index as usize) < histogram.len() && old_index != new_ref.index() {
                    // The cell left its old tile behind; remember it as
                    // modified so GC may reclaim it if it ends up unused.
                    histogram[old_index as usize] -= 1;
                    if let Some(flag) = modified.get_mut(old_index as usize) {
                        *flag = true;
                    }
                }

                log::trace!("  tile {tile_pt}: {old_ref} -> {new_ref}");
                if new_ref != old_ref {
                    new_map.set(cell_pos, new_ref);
                    changed_cells.push((cell_pos, old_ref, new_ref));
                    if mode == TilesetMode::Auto && new_ref != TileRef::EMPTY && (new_ref.index() as usize) < histogram.len() && old_index != new_ref.index() {
                        histogram[new_ref.index() as usize] += 1;
                    }
                }
            }
        }

        if new_map.get_size() != old_map.get_size() {
            let new_position = grid.tile_to_canvas_point(new_bounds.start);
            if layer_position != new_position {
                self.push_undo_action(TilemapUndoOp::SetLayerPosition {
                    layer,
                    old: layer_position,
                    new: new_position,
                })?;
            }
            self.push_undo_action(TilemapUndoOp::ReplaceTilemap {
                layer,
                old_map: None,
                new_map: Some(new_map),
            })?;
        } else if !changed_cells.is_empty() {
            self.push_undo_action(TilemapUndoOp::CopyTilemapRegion { layer, cells: changed_cells })?;
        }

        if mode == TilesetMode::Auto {
            self.remove_unused_tiles(tileset_index, &histogram, &modified)?;
        }
        self.end_atomic_undo(guard);

        #[cfg(debug_assertions)]
        self.get_sprite().get_tileset(tileset_index)?.assert_valid_hash_index();
        Ok(())
    }

    fn modify_tilemap_region_manual(
        &mut self,
        layer: usize,
        region: Rectangle,
        get_tile_image: GetTileImage,
        old_bounds: Rectangle,
    ) -> Result<()> {
        let tileset_index = self.get_sprite().get_layer(layer)?.tileset_index;
        let layer_position = self.get_sprite().get_layer(layer)?.position;
        let grid = self.get_sprite().get_tileset(tileset_index)?.grid().with_origin(layer_position);

        let guard = self.begin_typed_atomic_undo("Modify tiles", OperationType::ModifyTilemap);

        for tile_pt in grid.tiles_in_canvas_region(region) {
            // Modifications outside the tilemap are ignored; manual mode
            // never grows the map.
            if !old_bounds.is_inside(tile_pt) {
                continue;
            }
            let cell_pos = tile_pt - old_bounds.start;
            let cell = self.get_sprite().get_layer(layer)?.map.get(cell_pos);
            if cell.index() == 0 {
                // Empty cell (or a reference to the reserved empty
                // tile): the edit is a no-op for this cell.
                continue;
            }
            let tile_index = cell.index();
            let Some(stored) = self.get_sprite().get_tileset(tileset_index)?.get(tile_index).map(|t| t.image.clone()) else {
                continue;
            };

            let mut candidate = get_tile_image(&stored, grid.tile_bounds(tile_pt));
            candidate.normalize_transparent();
            // The cell displays a flipped view; bring the edit back into
            // the tile's stored orientation.
            let candidate = candidate.unflipped(cell.flags());

            if candidate == stored {
                continue;
            }
            self.push_undo_action(TilemapUndoOp::CopyTileRegion {
                tileset: tileset_index,
                tile_index,
                old_image: stored,
                new_image: candidate,
            })?;
        }

        self.end_atomic_undo(guard);

        #[cfg(debug_assertions)]
        self.get_sprite().get_tileset(tileset_index)?.assert_valid_hash_index();
        Ok(())
    }

    /// Chops a pixel image into grid tiles and rebuilds the layer's
    /// tilemap from it, reusing matching tiles and adding the rest.
    pub fn draw_image_into_tilemap_layer(&mut self, layer: usize, src: &Pixmap, src_position: Position, canvas_bounds: Rectangle) -> Result<()> {
        if canvas_bounds.is_empty() {
            return Ok(());
        }
        let (tileset_index, layer_position) = {
            let layer = self.get_sprite().get_layer(layer)?;
            (layer.tileset_index, layer.position)
        };
        let grid = self.get_sprite().get_tileset(tileset_index)?.grid();
        let tile_size = grid.tile_size();

        let bounds = grid.canvas_to_tile(canvas_bounds);
        let mut new_map = Tilemap::new(bounds.size);

        let guard = self.begin_typed_atomic_undo("Convert to tilemap", OperationType::ModifyTilemap);
        for tile_pt in grid.tiles_in_canvas_region(canvas_bounds) {
            let tile_canvas = grid.tile_to_canvas_point(tile_pt);
            let mut tile_image = src.crop(Rectangle::from_min_size(tile_canvas - src_position, tile_size));
            tile_image.normalize_transparent();

            let (index, flags) = match self.get_sprite_mut().get_tileset_mut(tileset_index)?.find_tile(&tile_image) {
                Some(found) => found,
                None => {
                    let index = self.get_sprite().get_tileset(tileset_index)?.len() as TileIndex;
                    self.push_undo_action(TilemapUndoOp::AddTile {
                        tileset: tileset_index,
                        tile_index: index,
                        tile: Some(Tile::new(tile_image)),
                    })?;
                    (index, TileFlags::empty())
                }
            };
            new_map.set(tile_pt - bounds.start, TileRef::new(index, flags));
        }

        let new_position = grid.tile_to_canvas_point(bounds.start);
        if layer_position != new_position {
            self.push_undo_action(TilemapUndoOp::SetLayerPosition {
                layer,
                old: layer_position,
                new: new_position,
            })?;
        }
        self.push_undo_action(TilemapUndoOp::ReplaceTilemap {
            layer,
            old_map: None,
            new_map: Some(new_map),
        })?;
        self.end_atomic_undo(guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{EditState, Pixmap, Position, Rectangle, Sprite, TileData, TileGrid, TileRef, TilemapLayer, Tileset, TilesetMode, UndoState, rgba};

    const RED: u32 = rgba(255, 0, 0, 255);
    const GREEN: u32 = rgba(0, 255, 0, 255);
    const BLUE: u32 = rgba(0, 0, 255, 255);

    fn test_state(layers: usize) -> EditState {
        let mut sprite = Sprite::new((16, 16));
        let tsi = sprite.tilesets.add(Tileset::new("tiles", TileGrid::new((4, 4)), 1));
        for i in 0..layers {
            sprite.layers.push(TilemapLayer::new(format!("layer {i}"), tsi, (2, 2)));
        }
        EditState::new(sprite)
    }

    /// Callback painting every touched tile with one solid color.
    fn paint_solid(color: u32) -> impl Fn(&Pixmap, Rectangle) -> Pixmap {
        move |existing: &Pixmap, _bounds: Rectangle| Pixmap::filled(existing.get_size(), color)
    }

    #[test]
    fn test_auto_creates_and_dedups_tiles() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut state = test_state(1);
        // Paint two cells with the same color: both should end up on one
        // new tile.
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 8, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(2, ts.len());
        let map = &state.get_sprite().get_layer(0).unwrap().map;
        assert_eq!(TileRef::from_index(1), map.get((0, 0)));
        assert_eq!(TileRef::from_index(1), map.get((1, 0)));
        assert_eq!(TileRef::EMPTY, map.get((0, 1)));
    }

    #[test]
    fn test_auto_edit_in_place_when_exclusive() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        assert_eq!(2, state.get_sprite().get_tileset(0).unwrap().len());

        // The tile is used once; editing it recolors it in place instead
        // of growing the store.
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(GREEN))
            .unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(2, ts.len());
        assert_eq!(Pixmap::filled((4, 4), GREEN), ts.get(1).unwrap().image);
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
    }

    #[test]
    fn test_auto_forks_shared_tile() {
        // Scenario: two layers share the store, both reference tile 1.
        let mut state = test_state(2);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        state
            .modify_tilemap_region(1, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(1).unwrap().map.get((0, 0)));

        // Editing through layer 0 must allocate a new tile, leaving
        // layer 1's content untouched.
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(BLUE))
            .unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(3, ts.len());
        assert_eq!(Pixmap::filled((4, 4), RED), ts.get(1).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), BLUE), ts.get(2).unwrap().image);
        assert_eq!(TileRef::from_index(2), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(1).unwrap().map.get((0, 0)));
    }

    #[test]
    fn test_stack_mode_always_forks() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Stack, &paint_solid(RED))
            .unwrap();
        // Tile 1 is exclusively used, but Stack mode still prefers a new
        // tile over in-place mutation.
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Stack, &paint_solid(GREEN))
            .unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(3, ts.len());
        assert_eq!(Pixmap::filled((4, 4), RED), ts.get(1).unwrap().image);
        assert_eq!(Pixmap::filled((4, 4), GREEN), ts.get(2).unwrap().image);
    }

    #[test]
    fn test_auto_gc_reclaims_orphaned_tile() {
        // Two cells on the same tile; recoloring both orphans nothing.
        // Recoloring one forks; recoloring the second orphans the
        // original tile, which GC removes and compacts.
        let mut state = test_state(2);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        state
            .modify_tilemap_region(1, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();

        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(GREEN))
            .unwrap();
        assert_eq!(3, state.get_sprite().get_tileset(0).unwrap().len());

        state
            .modify_tilemap_region(1, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(GREEN))
            .unwrap();

        // Tile 1 (red) lost its last reference in this batch and was
        // modified by it: removed. Both layers follow the compaction.
        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(2, ts.len());
        assert_eq!(Pixmap::filled((4, 4), GREEN), ts.get(1).unwrap().image);
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert_eq!(TileRef::from_index(1), state.get_sprite().get_layer(1).unwrap().map.get((0, 0)));
    }

    #[test]
    fn test_gc_is_conservative() {
        // An unused tile that this batch never touched survives GC.
        let mut state = test_state(1);
        {
            let ts = state.get_sprite_mut().get_tileset_mut(0).unwrap();
            ts.add(Pixmap::filled((4, 4), BLUE), TileData::default());
        }
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();

        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(3, ts.len());
        assert_eq!(Pixmap::filled((4, 4), BLUE), ts.get(1).unwrap().image);
    }

    #[test]
    fn test_manual_leaves_index_buffer_untouched() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        let map_before = state.get_sprite().get_layer(0).unwrap().map.clone();

        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Manual, &paint_solid(GREEN))
            .unwrap();

        assert_eq!(map_before, state.get_sprite().get_layer(0).unwrap().map);
        let ts = state.get_sprite().get_tileset(0).unwrap();
        assert_eq!(2, ts.len());
        assert_eq!(Pixmap::filled((4, 4), GREEN), ts.get(1).unwrap().image);
    }

    #[test]
    fn test_manual_on_empty_cell_is_noop() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Manual, &paint_solid(GREEN))
            .unwrap();

        assert_eq!(1, state.get_sprite().get_tileset(0).unwrap().len());
        assert_eq!(TileRef::EMPTY, state.get_sprite().get_layer(0).unwrap().map.get((0, 0)));
        assert!(!state.can_undo());
    }

    #[test]
    fn test_identical_content_is_noop() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        let undo_len = state.undo_stack().undo_len();

        // Painting the exact same content again changes nothing and must
        // not grow the undo stack.
        state
            .modify_tilemap_region(0, Rectangle::from(0, 0, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        assert_eq!(undo_len, state.undo_stack().undo_len());
    }

    #[test]
    fn test_map_grows_and_layer_repositions() {
        let mut state = test_state(1);
        // Paint one tile up-left of the existing 2x2 buffer.
        state
            .modify_tilemap_region(0, Rectangle::from(-4, -4, 4, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();

        let layer = state.get_sprite().get_layer(0).unwrap();
        assert_eq!(Position::new(-4, -4), layer.position);
        assert_eq!(crate::Size::new(3, 3), layer.map.get_size());
        assert_eq!(TileRef::from_index(1), layer.map.get((0, 0)));
        // The old cells kept their absolute canvas location.
        assert_eq!(TileRef::EMPTY, layer.map.get((1, 1)));
    }

    #[test]
    fn test_gesture_undo_restores_everything() {
        let mut state = test_state(1);
        state
            .modify_tilemap_region(0, Rectangle::from(-4, 0, 12, 4), TilesetMode::Auto, &paint_solid(RED))
            .unwrap();
        assert_eq!(1, state.undo_stack().undo_len(), "one atomic op per gesture");

        state.undo().unwrap();
        let layer = state.get_sprite().get_layer(0).unwrap();
        assert_eq!(Position::default(), layer.position);
        assert_eq!(crate::Size::new(2, 2), layer.map.get_size());
        assert_eq!(1, state.get_sprite().get_tileset(0).unwrap().len());

        state.redo().unwrap();
        let layer = state.get_sprite().get_layer(0).unwrap();
        assert_eq!(Position::new(-4, 0), layer.position);
        assert_eq!(crate::Size::new(3, 2), layer.map.get_size());
        assert_eq!(2, state.get_sprite().get_tileset(0).unwrap().len());
    }

    #[test]
    fn test_draw_image_into_tilemap_layer() {
        let mut state = test_state(1);
        let mut src = Pixmap::new((8, 8));
        for y in 0..8 {
            for x in 0..4 {
                src.put_pixel((x, y), RED);
            }
        }

        state.draw_image_into_tilemap_layer(0, &src, Position::default(), Rectangle::from(0, 0, 8, 8)).unwrap();

        let layer = state.get_sprite().get_layer(0).unwrap();
        assert_eq!(crate::Size::new(2, 2), layer.map.get_size());
        // Left column is solid red (one shared tile), right column empty.
        assert_eq!(layer.map.get((0, 0)), layer.map.get((0, 1)));
        assert_eq!(TileRef::from_index(0), layer.map.get((1, 0)));
        assert_eq!(2, state.get_sprite().get_tileset(0).unwrap().len());
    }
}
