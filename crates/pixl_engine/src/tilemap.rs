use serde::{Deserialize, Serialize};

use crate::{Position, Rectangle, Size, TileRef};

/// A 2-D buffer of tile references ("the tilemap image").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tilemap {
    size: Size,
    cells: Vec<TileRef>,
}

impl Tilemap {
    pub fn new(size: impl Into<Size>) -> Self {
        let size = size.into();
        Self {
            size,
            cells: vec![TileRef::EMPTY; size.area()],
        }
    }

    pub fn get_size(&self) -> Size {
        self.size
    }

    pub fn get_width(&self) -> i32 {
        self.size.width
    }

    pub fn get_height(&self) -> i32 {
        self.size.height
    }

    pub fn get_rectangle(&self) -> Rectangle {
        Rectangle::from_min_size((0, 0), self.size)
    }

    /// Cell lookup; out-of-range positions read as the empty tile.
    pub fn get(&self, pos: impl Into<Position>) -> TileRef {
        let pos = pos.into();
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.width || pos.y >= self.size.height {
            return TileRef::EMPTY;
        }
        self.cells[(pos.y * self.size.width + pos.x) as usize]
    }

    pub fn set(&mut self, pos: impl Into<Position>, tile: TileRef) {
        let pos = pos.into();
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.width || pos.y >= self.size.height {
            return;
        }
        self.cells[(pos.y * self.size.width + pos.x) as usize] = tile;
    }

    /// Copies `src` into this buffer with its top-left cell at `offset`.
    /// Cells falling outside are clipped.
    pub fn blit(&mut self, src: &Tilemap, offset: Position) {
        for y in 0..src.size.height {
            for x in 0..src.size.width {
                self.set(Position::new(x, y) + offset, src.get((x, y)));
            }
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = TileRef> + '_ {
        self.cells.iter().copied()
    }
}

/// A layer whose content is tile indices into a shared [`crate::Tileset`]
/// rather than raw pixels.
///
/// `tileset_index` refers into the owning sprite's tileset collection;
/// several layers may share one store and form a single consistency
/// domain for synchronization and garbage collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TilemapLayer {
    pub title: String,
    /// Canvas position of the buffer's top-left corner.
    pub position: Position,
    pub tileset_index: usize,
    pub map: Tilemap,
}

impl TilemapLayer {
    pub fn new(title: impl Into<String>, tileset_index: usize, size: impl Into<Size>) -> Self {
        Self {
            title: title.into(),
            position: Position::default(),
            tileset_index,
            map: Tilemap::new(size),
        }
    }

    pub fn get_title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use crate::{Position, TileRef, Tilemap};

    #[test]
    fn test_out_of_range_reads_empty() {
        let mut map = Tilemap::new((2, 2));
        map.set((1, 1), TileRef::from_index(7));

        assert_eq!(TileRef::from_index(7), map.get((1, 1)));
        assert_eq!(TileRef::EMPTY, map.get((-1, 0)));
        assert_eq!(TileRef::EMPTY, map.get((2, 0)));
    }

    #[test]
    fn test_blit_clips() {
        let mut src = Tilemap::new((2, 1));
        src.set((0, 0), TileRef::from_index(1));
        src.set((1, 0), TileRef::from_index(2));

        let mut dst = Tilemap::new((2, 2));
        dst.blit(&src, Position::new(1, 1));

        assert_eq!(TileRef::from_index(1), dst.get((1, 1)));
        // (2, 1) is outside and was clipped.
        assert_eq!(TileRef::EMPTY, dst.get((0, 0)));
    }
}
