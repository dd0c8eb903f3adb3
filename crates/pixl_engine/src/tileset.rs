use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Pixmap, Size, Tile, TileData, TileFlags, TileGrid, TileIndex};

/// The shared, ordered repository of tiles backing one or more tilemaps.
///
/// Slot 0 always holds the empty tile. A lazily built content-hash index
/// provides duplicate detection: every structural change drops the index
/// and the next lookup rebuilds it, so a batch of edits pays for one
/// rebuild at most.
///
/// The store assumes exclusive access while it is mutated; callers
/// serialize structural edits (one logical transaction at a time).
#[derive(Debug, Serialize, Deserialize)]
pub struct Tileset {
    pub name: String,
    /// Index shown to the user for slot 0 (purely cosmetic).
    pub base_index: i32,
    /// Flip transforms [`Tileset::find_tile`] is allowed to match with.
    #[serde(skip)]
    pub match_flags: TileFlags,
    grid: TileGrid,
    tiles: Vec<Tile>,

    /// content hash -> slots holding that content, ascending.
    /// `None` means stale; rebuilt on the next lookup.
    #[serde(skip)]
    hash: Option<HashMap<u32, Vec<TileIndex>>>,
}

impl Tileset {
    /// Creates a store with `tiles` pre-filled empty slots (at least the
    /// reserved empty tile at slot 0).
    ///
    /// # Panics
    ///
    /// Panics if the grid origin is not (0, 0); store-level grids are
    /// origin-free, placement belongs to the owning layer.
    pub fn new(name: impl Into<String>, grid: TileGrid, tiles: usize) -> Self {
        assert!(grid.origin() == crate::Position::default(), "tile store grids have origin (0, 0)");
        let tiles = (0..tiles.max(1)).map(|_| Tile::new(Pixmap::new(grid.tile_size()))).collect();
        Self {
            name: name.into(),
            base_index: 1,
            match_flags: TileFlags::empty(),
            grid,
            tiles,
            hash: None,
        }
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn tile_size(&self) -> Size {
        self.grid.tile_size()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, index: TileIndex) -> Option<&Tile> {
        self.tiles.get(index as usize)
    }

    /// Mutable slot access. Any caller editing pixels through this must
    /// call [`Tileset::notify_tile_content_change`] afterwards.
    pub fn get_mut(&mut self, index: TileIndex) -> Option<&mut Tile> {
        self.tiles.get_mut(index as usize)
    }

    pub fn make_empty_tile(&self) -> Tile {
        Tile::new(Pixmap::new(self.grid.tile_size()))
    }

    /// Deep copy for use by another sprite. The copy owns fresh pixel
    /// buffers, so edits on either side stay local.
    pub fn make_copy(&self) -> Tileset {
        Tileset {
            name: self.name.clone(),
            base_index: self.base_index,
            match_flags: self.match_flags,
            grid: self.grid,
            tiles: self.tiles.clone(),
            hash: None,
        }
    }

    /// Appends a new slot and returns its index. Never deduplicates;
    /// callers that want reuse run [`Tileset::find_tile_index`] first.
    pub fn add(&mut self, mut image: Pixmap, data: TileData) -> TileIndex {
        debug_assert!(image.get_size() == self.tile_size(), "tile size mismatch: {}", image.get_size());
        image.normalize_transparent();
        self.tiles.push(Tile::with_data(image, data));
        self.hash = None;
        (self.tiles.len() - 1) as TileIndex
    }

    /// Inserts a tile, shifting every slot at or after `index` up by one.
    ///
    /// Inserting a non-empty image at slot 0 violates the empty-tile
    /// invariant; it is logged and flagged in debug builds but not
    /// rejected, correctness is the caller's policy.
    pub fn insert(&mut self, index: TileIndex, mut tile: Tile) {
        debug_assert!((index as usize) <= self.tiles.len(), "insert index {index} out of range");
        if index == 0 && !tile.image.is_empty() {
            log::warn!("inserting a non-empty tile at slot 0 breaks the empty-tile invariant");
            debug_assert!(false, "non-empty tile inserted at slot 0");
        }
        tile.image.normalize_transparent();
        self.tiles.insert((index as usize).min(self.tiles.len()), tile);
        self.hash = None;
    }

    /// Removes a slot and shifts the ones above it down. The whole hash
    /// index is stale afterwards (every shifted slot changed index) and
    /// is rebuilt on the next lookup.
    pub fn erase(&mut self, index: TileIndex) -> Tile {
        debug_assert!(index != 0, "slot 0 (the empty tile) cannot be removed");
        debug_assert!((index as usize) < self.tiles.len(), "erase index {index} out of range");
        let tile = self.tiles.remove(index as usize);
        self.hash = None;
        tile
    }

    /// Replaces a slot's content.
    pub fn set(&mut self, index: TileIndex, mut image: Pixmap, data: TileData) {
        debug_assert!((index as usize) < self.tiles.len(), "set index {index} out of range");
        debug_assert!(image.get_size() == self.tile_size(), "tile size mismatch: {}", image.get_size());
        if index == 0 && !image.is_empty() {
            log::warn!("setting non-empty content on slot 0 breaks the empty-tile invariant");
            debug_assert!(false, "non-empty content set on slot 0");
        }
        image.normalize_transparent();
        if let Some(tile) = self.tiles.get_mut(index as usize) {
            tile.image = image;
            tile.data = data;
        }
        self.hash = None;
    }

    /// Grows by appending empty tiles or shrinks by truncation. Callers
    /// must ensure no live tilemap references a truncated index; the
    /// store does not validate cross-layer usage.
    pub fn resize(&mut self, tiles: usize) {
        let tiles = tiles.max(1);
        if tiles < self.tiles.len() {
            self.tiles.truncate(tiles);
        } else {
            while self.tiles.len() < tiles {
                self.tiles.push(self.make_empty_tile());
            }
        }
        self.hash = None;
    }

    /// Reorders slot contents according to `remap`. Unmapped entries are
    /// dropped and their slots refilled with empty tiles. Slot 0 mapping
    /// to 0 is the caller's responsibility.
    ///
    /// Two live entries on one destination is a caller bug: flagged in
    /// debug builds, last writer (highest source index) wins in release.
    pub fn remap(&mut self, remap: &crate::Remap) {
        debug_assert!(remap.len() == self.tiles.len(), "remap len {} != store len {}", remap.len(), self.tiles.len());
        let len = self.tiles.len();
        let mut slots: Vec<Option<Tile>> = (0..len).map(|_| None).collect();
        for (i, tile) in self.tiles.drain(..).enumerate() {
            match remap.get(i as TileIndex) {
                crate::RemapTarget::Unmapped => {}
                crate::RemapTarget::Mapped(to) => {
                    let Some(slot) = slots.get_mut(to as usize) else {
                        debug_assert!(false, "remap target {to} out of range (0..{len})");
                        continue;
                    };
                    debug_assert!(slot.is_none(), "remap maps two live entries to {to}");
                    *slot = Some(tile);
                }
            }
        }
        let tile_size = self.grid.tile_size();
        self.tiles = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Tile::new(Pixmap::new(tile_size))))
            .collect();
        self.hash = None;
    }

    /// Content-hash lookup: the lowest slot whose pixels are bit-for-bit
    /// identical to `image` (which must already be normalized).
    ///
    /// Rebuilds the hash index first if a structural change invalidated
    /// it: amortized O(tiles) once per batch, O(1) afterwards.
    pub fn find_tile_index(&mut self, image: &Pixmap) -> Option<TileIndex> {
        self.ensure_hash_index();
        let candidates = self.hash.as_ref()?.get(&image.content_hash())?;
        // Buckets are ascending, so the first exact match is the lowest
        // index; duplicates at higher slots lose the tie.
        candidates.iter().copied().find(|&index| self.tiles[index as usize].image == *image)
    }

    /// Flip-aware lookup: tries `image` as-is, then every flip
    /// combination enabled in `match_flags`, returning the flags that
    /// made it match.
    pub fn find_tile(&mut self, image: &Pixmap) -> Option<(TileIndex, TileFlags)> {
        if let Some(index) = self.find_tile_index(image) {
            return Some((index, TileFlags::empty()));
        }
        if self.match_flags.is_empty() {
            return None;
        }

        let diagonal_ok = self.tile_size().width == self.tile_size().height;
        let combos = [
            TileFlags::FLIP_X,
            TileFlags::FLIP_Y,
            TileFlags::FLIP_X | TileFlags::FLIP_Y,
            TileFlags::FLIP_D,
            TileFlags::FLIP_X | TileFlags::FLIP_D,
            TileFlags::FLIP_X | TileFlags::FLIP_Y | TileFlags::FLIP_D,
            TileFlags::FLIP_Y | TileFlags::FLIP_D,
        ];
        for flags in combos {
            if !self.match_flags.contains(flags) {
                continue;
            }
            if flags.contains(TileFlags::FLIP_D) && !diagonal_ok {
                continue;
            }
            if let Some(index) = self.find_tile_index(&image.unflipped(flags)) {
                return Some((index, flags));
            }
        }
        None
    }

    /// Must be called by any code that mutated a tile's pixels in place
    /// (through [`Tileset::get_mut`]). Re-normalizes the slot and drops
    /// the whole hash index rather than patching it.
    pub fn notify_tile_content_change(&mut self, index: TileIndex) {
        if let Some(tile) = self.tiles.get_mut(index as usize) {
            tile.image.normalize_transparent();
        }
        self.hash = None;
    }

    /// Debug check: a built hash index must exactly match the stored
    /// contents.
    pub fn assert_valid_hash_index(&self) {
        let Some(hash) = &self.hash else {
            return;
        };
        let mut fresh: HashMap<u32, Vec<TileIndex>> = HashMap::new();
        for (i, tile) in self.tiles.iter().enumerate() {
            fresh.entry(tile.image.content_hash()).or_default().push(i as TileIndex);
        }
        assert!(*hash == fresh, "stale content-hash index in tileset '{}'", self.name);
    }

    fn ensure_hash_index(&mut self) {
        if self.hash.is_some() {
            return;
        }
        log::trace!("rebuilding content-hash index for tileset '{}' ({} tiles)", self.name, self.tiles.len());
        let mut hash: HashMap<u32, Vec<TileIndex>> = HashMap::new();
        for (i, tile) in self.tiles.iter().enumerate() {
            hash.entry(tile.image.content_hash()).or_default().push(i as TileIndex);
        }
        self.hash = Some(hash);
    }
}
