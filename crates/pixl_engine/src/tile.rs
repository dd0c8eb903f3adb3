use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::Pixmap;

/// Index of a slot in a [`crate::Tileset`]. Index 0 is reserved for the
/// empty tile.
pub type TileIndex = u32;

/// Bits of a [`TileRef`] holding the tile index.
pub const TILE_INDEX_MASK: u32 = 0x1fff_ffff;

bitflags! {
    /// Flip transform applied when a tilemap cell displays its tile.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct TileFlags: u32 {
        const FLIP_X = 0x8000_0000;
        const FLIP_Y = 0x4000_0000;
        const FLIP_D = 0x2000_0000;
    }
}

/// A tilemap cell value: tile index plus flip flags packed into 32 bits.
///
/// The all-zero value refers to the empty tile and is what cleared cells
/// hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileRef(u32);

impl TileRef {
    pub const EMPTY: TileRef = TileRef(0);

    pub fn new(index: TileIndex, flags: TileFlags) -> Self {
        debug_assert!((index & !TILE_INDEX_MASK) == 0, "tile index {index} overflows the index bits");
        TileRef((index & TILE_INDEX_MASK) | flags.bits())
    }

    pub fn from_index(index: TileIndex) -> Self {
        TileRef::new(index, TileFlags::empty())
    }

    pub fn index(self) -> TileIndex {
        self.0 & TILE_INDEX_MASK
    }

    pub fn flags(self) -> TileFlags {
        TileFlags::from_bits_truncate(self.0)
    }

    pub fn with_index(self, index: TileIndex) -> Self {
        TileRef::new(index, self.flags())
    }
}

impl std::fmt::Display for TileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())?;
        if self.flags().contains(TileFlags::FLIP_X) {
            write!(f, "x")?;
        }
        if self.flags().contains(TileFlags::FLIP_Y) {
            write!(f, "y")?;
        }
        if self.flags().contains(TileFlags::FLIP_D) {
            write!(f, "d")?;
        }
        Ok(())
    }
}

/// User-facing metadata attached to a tile slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileData {
    pub color: Option<u32>,
    pub text: String,
    pub properties: HashMap<String, String>,
}

/// One slot of a tile store: the pixel content plus its metadata.
///
/// The pixmap is owned exclusively by this slot; copying a tile into
/// another store clones the pixels, so later in-place edits can never
/// leak across stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub image: Pixmap,
    pub data: TileData,
}

impl Tile {
    pub fn new(image: Pixmap) -> Self {
        Self {
            image,
            data: TileData::default(),
        }
    }

    pub fn with_data(image: Pixmap, data: TileData) -> Self {
        Self { image, data }
    }
}

#[cfg(test)]
mod tests {
    use crate::{TILE_INDEX_MASK, TileFlags, TileRef};

    #[test]
    fn test_tile_ref_packing() {
        let r = TileRef::new(42, TileFlags::FLIP_X | TileFlags::FLIP_D);
        assert_eq!(42, r.index());
        assert_eq!(TileFlags::FLIP_X | TileFlags::FLIP_D, r.flags());

        let r = TileRef::new(TILE_INDEX_MASK, TileFlags::FLIP_Y);
        assert_eq!(TILE_INDEX_MASK, r.index());
        assert_eq!(TileFlags::FLIP_Y, r.flags());
    }

    #[test]
    fn test_empty_is_index_zero() {
        assert_eq!(0, TileRef::EMPTY.index());
        assert_eq!(TileFlags::empty(), TileRef::EMPTY.flags());
        assert_eq!(TileRef::EMPTY, TileRef::from_index(0));
    }
}
