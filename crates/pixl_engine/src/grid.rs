use serde::{Deserialize, Serialize};

use crate::{Position, Rectangle, Size};

fn div_floor(a: i32, b: i32) -> i32 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

/// Mapping between canvas pixel coordinates and tile coordinates.
///
/// Tile stores always use origin (0, 0); a layer-local grid is derived
/// with [`TileGrid::with_origin`] from the layer's canvas position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    tile_size: Size,
    origin: Position,
}

impl TileGrid {
    /// # Panics
    ///
    /// Panics if the tile size is not positive.
    pub fn new(tile_size: impl Into<Size>) -> Self {
        let tile_size = tile_size.into();
        assert!(tile_size.width > 0 && tile_size.height > 0, "invalid tile size {tile_size}");
        Self {
            tile_size,
            origin: Position::default(),
        }
    }

    pub fn with_origin(self, origin: impl Into<Position>) -> Self {
        Self {
            tile_size: self.tile_size,
            origin: origin.into(),
        }
    }

    pub fn tile_size(&self) -> Size {
        self.tile_size
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    /// Tile coordinate of the tile containing a canvas point.
    pub fn canvas_to_tile_point(&self, pos: impl Into<Position>) -> Position {
        let pos = pos.into();
        Position::new(
            div_floor(pos.x - self.origin.x, self.tile_size.width),
            div_floor(pos.y - self.origin.y, self.tile_size.height),
        )
    }

    /// Inclusive tile-coordinate range covering a canvas rectangle.
    pub fn canvas_to_tile(&self, rect: Rectangle) -> Rectangle {
        if rect.is_empty() {
            return Rectangle::default();
        }
        let p1 = self.canvas_to_tile_point(rect.start);
        let p2 = self.canvas_to_tile_point(rect.bottom_right() - Position::new(1, 1));
        Rectangle::from_pt(p1, p2 + Position::new(1, 1))
    }

    /// Canvas position of a tile's top-left corner.
    pub fn tile_to_canvas_point(&self, pos: impl Into<Position>) -> Position {
        let pos = pos.into();
        Position::new(
            self.origin.x + pos.x * self.tile_size.width,
            self.origin.y + pos.y * self.tile_size.height,
        )
    }

    /// Canvas rectangle covered by a tile-coordinate rectangle.
    pub fn tile_to_canvas(&self, rect: Rectangle) -> Rectangle {
        Rectangle::from_min_size(
            self.tile_to_canvas_point(rect.start),
            Size::new(rect.size.width * self.tile_size.width, rect.size.height * self.tile_size.height),
        )
    }

    /// Canvas bounds of a single tile.
    pub fn tile_bounds(&self, pos: impl Into<Position>) -> Rectangle {
        Rectangle::from_min_size(self.tile_to_canvas_point(pos), self.tile_size)
    }

    /// Tile coordinates (row-major) of all tiles touching a canvas
    /// rectangle.
    pub fn tiles_in_canvas_region(&self, rect: Rectangle) -> Vec<Position> {
        let bounds = self.canvas_to_tile(rect);
        let mut result = Vec::with_capacity(bounds.size.area());
        for y in bounds.y_range() {
            for x in bounds.x_range() {
                result.push(Position::new(x, y));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::{Position, Rectangle, TileGrid};

    #[test]
    fn test_canvas_to_tile() {
        let grid = TileGrid::new((8, 8));
        assert_eq!(Rectangle::from(0, 0, 1, 1), grid.canvas_to_tile(Rectangle::from(0, 0, 8, 8)));
        assert_eq!(Rectangle::from(0, 0, 2, 1), grid.canvas_to_tile(Rectangle::from(7, 0, 2, 1)));
        assert_eq!(Rectangle::from(1, 1, 1, 1), grid.canvas_to_tile(Rectangle::from(8, 8, 8, 8)));
    }

    #[test]
    fn test_canvas_to_tile_negative() {
        let grid = TileGrid::new((8, 8));
        assert_eq!(Position::new(-1, -1), grid.canvas_to_tile_point((-1, -1)));
        assert_eq!(Rectangle::from(-1, -1, 2, 2), grid.canvas_to_tile(Rectangle::from(-3, -3, 8, 8)));
    }

    #[test]
    fn test_origin_offset() {
        let grid = TileGrid::new((8, 8)).with_origin((16, 8));
        assert_eq!(Position::new(0, 0), grid.canvas_to_tile_point((16, 8)));
        assert_eq!(Position::new(-1, 0), grid.canvas_to_tile_point((15, 8)));
        assert_eq!(Position::new(16, 8), grid.tile_to_canvas_point((0, 0)));
    }

    #[test]
    fn test_tiles_in_canvas_region() {
        let grid = TileGrid::new((8, 8));
        let tiles = grid.tiles_in_canvas_region(Rectangle::from(4, 4, 8, 8));
        assert_eq!(
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(0, 1),
                Position::new(1, 1)
            ],
            tiles
        );
    }
}
