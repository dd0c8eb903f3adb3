//! Tilemap editor undo operations as serializable enum
//!
//! A single enum contains every reversible operation the tile store and
//! tilemap synchronization code emits, making whole editing sessions
//! serializable. Operations are values: executing one mutates the
//! [`EditState`], undoing it applies the stored inverse.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Pixmap, Position, Remap, Result, Tile, TileIndex, TileRef, Tilemap};

use super::EditState;
use super::undo_stack::OperationType;

/// Serializable editor undo operation enum
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TilemapUndoOp {
    /// Atomic group of operations
    Atomic {
        description: String,
        operations: Vec<TilemapUndoOp>,
        operation_type: OperationType,
    },

    /// Add a tile slot (append or insert; slots above shift up)
    AddTile {
        tileset: usize,
        tile_index: TileIndex,
        tile: Option<Tile>,
    },

    /// Remove a tile slot (slots above shift down)
    RemoveTile {
        tileset: usize,
        tile_index: TileIndex,
        tile: Option<Tile>,
    },

    /// Overwrite a tile's pixel content in place
    CopyTileRegion {
        tileset: usize,
        tile_index: TileIndex,
        old_image: Pixmap,
        new_image: Pixmap,
    },

    /// Change a batch of tilemap cells
    CopyTilemapRegion {
        layer: usize,
        cells: Vec<(Position, TileRef, TileRef)>,
    },

    /// Swap in a whole new tilemap buffer (used when the map grows)
    ReplaceTilemap {
        layer: usize,
        old_map: Option<Tilemap>,
        new_map: Option<Tilemap>,
    },

    /// Move a layer's canvas position
    SetLayerPosition { layer: usize, old: Position, new: Position },

    /// Reorder the tile store and every referencing tilemap in one step
    RemapTileset { tileset: usize, remap: Remap },

    /// Rewrite tilemap cells through a permutation, store untouched
    /// (the store was already compacted by explicit RemoveTile ops)
    RemapTilemaps { tileset: usize, remap: Remap },
}

impl TilemapUndoOp {
    /// Get a description of this operation for UI display
    pub fn get_description(&self) -> String {
        match self {
            TilemapUndoOp::Atomic { description, .. } => description.clone(),
            TilemapUndoOp::AddTile { .. } => "Add tile".into(),
            TilemapUndoOp::RemoveTile { .. } => "Remove tile".into(),
            TilemapUndoOp::CopyTileRegion { .. } => "Edit tile".into(),
            TilemapUndoOp::CopyTilemapRegion { .. } => "Edit tilemap".into(),
            TilemapUndoOp::ReplaceTilemap { .. } => "Replace tilemap".into(),
            TilemapUndoOp::SetLayerPosition { .. } => "Move layer".into(),
            TilemapUndoOp::RemapTileset { .. } => "Reorder tiles".into(),
            TilemapUndoOp::RemapTilemaps { .. } => "Remap tilemaps".into(),
        }
    }

    /// Get the operation type for grouping
    pub fn get_operation_type(&self) -> OperationType {
        match self {
            TilemapUndoOp::Atomic { operation_type, .. } => *operation_type,
            _ => OperationType::Unknown,
        }
    }

    /// Perform the undo operation
    pub fn undo(&mut self, edit_state: &mut EditState) -> Result<()> {
        match self {
            TilemapUndoOp::Atomic { operations, .. } => {
                for op in operations.iter_mut().rev() {
                    op.undo(edit_state)?;
                }
                Ok(())
            }
            TilemapUndoOp::AddTile { tileset, tile_index, tile } => {
                let ts = edit_state.get_sprite_mut().get_tileset_mut(*tileset)?;
                *tile = Some(ts.erase(*tile_index));
                Ok(())
            }
            TilemapUndoOp::RemoveTile { tileset, tile_index, tile } => {
                let ts = edit_state.get_sprite_mut().get_tileset_mut(*tileset)?;
                if let Some(t) = tile.take() {
                    ts.insert(*tile_index, t);
                }
                Ok(())
            }
            TilemapUndoOp::CopyTileRegion {
                tileset, tile_index, old_image, ..
            } => copy_tile_content(edit_state, *tileset, *tile_index, old_image),
            TilemapUndoOp::CopyTilemapRegion { layer, cells } => {
                let layer = edit_state.get_sprite_mut().get_layer_mut(*layer)?;
                for (pos, old, _) in cells.iter() {
                    layer.map.set(*pos, *old);
                }
                Ok(())
            }
            TilemapUndoOp::ReplaceTilemap { layer, old_map, new_map } => {
                let layer = edit_state.get_sprite_mut().get_layer_mut(*layer)?;
                if let Some(map) = old_map.take() {
                    *new_map = Some(std::mem::replace(&mut layer.map, map));
                }
                Ok(())
            }
            TilemapUndoOp::SetLayerPosition { layer, old, .. } => {
                edit_state.get_sprite_mut().get_layer_mut(*layer)?.position = *old;
                Ok(())
            }
            TilemapUndoOp::RemapTileset { tileset, remap } => {
                let inverse = remap.invert();
                let sprite = edit_state.get_sprite_mut();
                sprite.get_tileset_mut(*tileset)?.remap(&inverse);
                sprite.remap_tilemaps(*tileset, &inverse);
                Ok(())
            }
            TilemapUndoOp::RemapTilemaps { tileset, remap } => {
                let inverse = remap.invert();
                let sprite = edit_state.get_sprite_mut();
                sprite.get_tileset(*tileset)?;
                sprite.remap_tilemaps(*tileset, &inverse);
                Ok(())
            }
        }
    }

    /// Perform the redo operation
    pub fn redo(&mut self, edit_state: &mut EditState) -> Result<()> {
        match self {
            TilemapUndoOp::Atomic { operations, .. } => {
                for op in operations.iter_mut() {
                    op.redo(edit_state)?;
                }
                Ok(())
            }
            TilemapUndoOp::AddTile { tileset, tile_index, tile } => {
                let ts = edit_state.get_sprite_mut().get_tileset_mut(*tileset)?;
                if let Some(t) = tile.take() {
                    ts.insert(*tile_index, t);
                }
                Ok(())
            }
            TilemapUndoOp::RemoveTile { tileset, tile_index, tile } => {
                let ts = edit_state.get_sprite_mut().get_tileset_mut(*tileset)?;
                *tile = Some(ts.erase(*tile_index));
                Ok(())
            }
            TilemapUndoOp::CopyTileRegion {
                tileset, tile_index, new_image, ..
            } => copy_tile_content(edit_state, *tileset, *tile_index, new_image),
            TilemapUndoOp::CopyTilemapRegion { layer, cells } => {
                let layer = edit_state.get_sprite_mut().get_layer_mut(*layer)?;
                for (pos, _, new) in cells.iter() {
                    layer.map.set(*pos, *new);
                }
                Ok(())
            }
            TilemapUndoOp::ReplaceTilemap { layer, old_map, new_map } => {
                let layer = edit_state.get_sprite_mut().get_layer_mut(*layer)?;
                if let Some(map) = new_map.take() {
                    *old_map = Some(std::mem::replace(&mut layer.map, map));
                }
                Ok(())
            }
            TilemapUndoOp::SetLayerPosition { layer, new, .. } => {
                edit_state.get_sprite_mut().get_layer_mut(*layer)?.position = *new;
                Ok(())
            }
            TilemapUndoOp::RemapTileset { tileset, remap } => {
                let sprite = edit_state.get_sprite_mut();
                sprite.get_tileset_mut(*tileset)?.remap(remap);
                sprite.remap_tilemaps(*tileset, remap);
                Ok(())
            }
            TilemapUndoOp::RemapTilemaps { tileset, remap } => {
                let sprite = edit_state.get_sprite_mut();
                sprite.get_tileset(*tileset)?;
                sprite.remap_tilemaps(*tileset, remap);
                Ok(())
            }
        }
    }
}

fn copy_tile_content(edit_state: &mut EditState, tileset: usize, tile_index: TileIndex, image: &Pixmap) -> Result<()> {
    let ts = edit_state.get_sprite_mut().get_tileset_mut(tileset)?;
    let max = ts.len() as u32;
    let Some(tile) = ts.get_mut(tile_index) else {
        return Err(EngineError::TileOutOfRange { tile: tile_index, max });
    };
    tile.image = image.clone();
    ts.notify_tile_content_change(tile_index);
    Ok(())
}
