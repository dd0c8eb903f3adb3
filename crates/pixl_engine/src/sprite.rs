use serde::{Deserialize, Serialize};

use crate::{EngineError, Result, Size, TileRef, TilemapLayer, Tileset};

/// Ordered collection of the tile stores owned by a sprite.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Tilesets {
    sets: Vec<Tileset>,
}

impl Tilesets {
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tileset> {
        self.sets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tileset> {
        self.sets.get_mut(index)
    }

    pub fn add(&mut self, tileset: Tileset) -> usize {
        self.sets.push(tileset);
        self.sets.len() - 1
    }
}

/// The edited document: a canvas with tilemap layers drawing from a
/// shared set of tile stores.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Sprite {
    pub size: Size,
    pub layers: Vec<TilemapLayer>,
    pub tilesets: Tilesets,
}

impl Sprite {
    pub fn new(size: impl Into<Size>) -> Self {
        Self {
            size: size.into(),
            layers: Vec::new(),
            tilesets: Tilesets::default(),
        }
    }

    pub fn get_layer(&self, layer: usize) -> Result<&TilemapLayer> {
        self.layers.get(layer).ok_or(EngineError::LayerOutOfRange {
            layer,
            max: self.layers.len(),
        })
    }

    pub fn get_layer_mut(&mut self, layer: usize) -> Result<&mut TilemapLayer> {
        let max = self.layers.len();
        self.layers.get_mut(layer).ok_or(EngineError::LayerOutOfRange { layer, max })
    }

    pub fn get_tileset(&self, tileset: usize) -> Result<&Tileset> {
        self.tilesets.get(tileset).ok_or(EngineError::TilesetOutOfRange {
            tileset,
            max: self.tilesets.len(),
        })
    }

    pub fn get_tileset_mut(&mut self, tileset: usize) -> Result<&mut Tileset> {
        let max = self.tilesets.len();
        self.tilesets.get_mut(tileset).ok_or(EngineError::TilesetOutOfRange { tileset, max })
    }

    /// Indices of all layers drawing from the given tile store. They form
    /// one consistency domain: structural store changes must update every
    /// one of their index buffers.
    pub fn layers_using_tileset(&self, tileset: usize) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.tileset_index == tileset)
            .map(|(i, _)| i)
            .collect()
    }

    /// Usage histogram: how many cells across all layers sharing the
    /// store reference each tile index. Empty cells are not counted.
    pub fn tiles_histogram(&self, tileset: usize) -> Vec<usize> {
        let len = self.tilesets.get(tileset).map_or(0, Tileset::len);
        let mut histogram = vec![0; len];
        for layer in self.layers.iter().filter(|layer| layer.tileset_index == tileset) {
            for cell in layer.map.cells() {
                if cell == TileRef::EMPTY {
                    continue;
                }
                let index = cell.index() as usize;
                if index < histogram.len() {
                    histogram[index] += 1;
                }
            }
        }
        histogram
    }

    /// Applies a remap to the index buffer of every layer sharing the
    /// store, preserving per-cell flip flags. Cells whose index is
    /// unmapped are a caller bug (the permutation must only unmap unused
    /// indices); they are cleared in release builds.
    pub fn remap_tilemaps(&mut self, tileset: usize, remap: &crate::Remap) {
        for layer in self.layers.iter_mut().filter(|layer| layer.tileset_index == tileset) {
            let size = layer.map.get_size();
            for y in 0..size.height {
                for x in 0..size.width {
                    let cell = layer.map.get((x, y));
                    if cell == TileRef::EMPTY {
                        continue;
                    }
                    match remap.get(cell.index()) {
                        crate::RemapTarget::Mapped(to) => {
                            if to != cell.index() {
                                layer.map.set((x, y), cell.with_index(to));
                            }
                        }
                        crate::RemapTarget::Unmapped => {
                            debug_assert!(false, "tilemap references unmapped tile {}", cell.index());
                            layer.map.set((x, y), TileRef::EMPTY);
                        }
                    }
                }
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use crate::{Remap, Sprite, TileGrid, TileRef, TilemapLayer, Tileset};

    fn sprite_with_two_layers() -> Sprite {
        let mut sprite = Sprite::new((32, 32));
        let tsi = sprite.tilesets.add(Tileset::new("tiles", TileGrid::new((8, 8)), 4));
        let mut a = TilemapLayer::new("a", tsi, (2, 2));
        a.map.set((0, 0), TileRef::new(3, crate::TileFlags::FLIP_X));
        let mut b = TilemapLayer::new("b", tsi, (2, 2));
        b.map.set((1, 1), TileRef::from_index(3));
        b.map.set((0, 1), TileRef::from_index(1));
        sprite.layers.push(a);
        sprite.layers.push(b);
        sprite
    }

    #[test]
    fn test_histogram_spans_all_layers() {
        let sprite = sprite_with_two_layers();
        assert_eq!(vec![0, 1, 0, 2], sprite.tiles_histogram(0));
    }

    #[test]
    fn test_remap_tilemaps_keeps_flags() {
        let mut sprite = sprite_with_two_layers();
        let mut remap = Remap::new(4);
        remap.map(3, 1);
        remap.map(1, 3);
        sprite.remap_tilemaps(0, &remap);

        assert_eq!(TileRef::new(1, crate::TileFlags::FLIP_X), sprite.layers[0].map.get((0, 0)));
        assert_eq!(TileRef::from_index(1), sprite.layers[1].map.get((1, 1)));
        assert_eq!(TileRef::from_index(3), sprite.layers[1].map.get((0, 1)));
    }
}
