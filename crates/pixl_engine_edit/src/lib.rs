#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::too_many_lines,
    clippy::cast_lossless,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
mod editor;
pub use editor::*;

// Re-export all necessary types from pixl_engine
pub use pixl_engine::{
    EngineError, Pixmap, Position, Rectangle, Remap, RemapTarget, Result, Size, Sprite, Tile, TileData, TileFlags, TileGrid, TileIndex, TilePicks, TileRef,
    Tilemap, TilemapLayer, Tileset, Tilesets, create_remap_to_move_picks, rgba,
};
