use serde::{Deserialize, Serialize};

use crate::{Position, Rectangle, Size, TileFlags};

/// Color of fully transparent pixels after normalization.
pub const MASK_COLOR: u32 = 0;

pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

pub const fn get_alpha(color: u32) -> u8 {
    (color >> 24) as u8
}

/// An owned RGBA bitmap.
///
/// Pixels are stored row-major as packed `u32` values (`rgba`). Tiles,
/// tile candidates produced by paint callbacks and source images for
/// tilemap conversion all use this type; each tile slot of a
/// [`crate::Tileset`] owns its pixmap exclusively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixmap {
    size: Size,
    data: Vec<u32>,
}

impl Pixmap {
    /// Creates a fully transparent pixmap.
    pub fn new(size: impl Into<Size>) -> Self {
        let size = size.into();
        Self {
            size,
            data: vec![MASK_COLOR; size.area()],
        }
    }

    /// Creates a pixmap from raw pixel data in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not contain exactly `width * height` pixels.
    pub fn from_pixels(size: impl Into<Size>, data: Vec<u32>) -> Self {
        let size = size.into();
        assert!(data.len() == size.area(), "pixel data does not match size {size}");
        Self { size, data }
    }

    pub fn filled(size: impl Into<Size>, color: u32) -> Self {
        let size = size.into();
        Self {
            size,
            data: vec![color; size.area()],
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

    pub fn get_pixel(&self, pos: impl Into<Position>) -> u32 {
        let pos = pos.into();
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.width || pos.y >= self.size.height {
            return MASK_COLOR;
        }
        self.data[(pos.y * self.size.width + pos.x) as usize]
    }

    pub fn put_pixel(&mut self, pos: impl Into<Position>, color: u32) {
        let pos = pos.into();
        if pos.x < 0 || pos.y < 0 || pos.x >= self.size.width || pos.y >= self.size.height {
            return;
        }
        self.data[(pos.y * self.size.width + pos.x) as usize] = color;
    }

    /// True if every pixel is fully transparent.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&px| get_alpha(px) == 0)
    }

    /// Canonicalizes invisible pixels: every fully transparent pixel gets
    /// its color channels cleared to [`MASK_COLOR`], so images that only
    /// differ in the hidden channels of transparent pixels compare and
    /// hash as equal. Idempotent.
    pub fn normalize_transparent(&mut self) {
        for px in &mut self.data {
            if get_alpha(*px) == 0 {
                *px = MASK_COLOR;
            }
        }
    }

    /// Content hash over the pixel data.
    ///
    /// Only a candidate-retrieval key: callers must confirm a match with
    /// an exact pixel comparison. Images are expected to be normalized
    /// (`normalize_transparent`) before hashing.
    pub fn content_hash(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for &px in &self.data {
            hasher.update(&px.to_le_bytes());
        }
        hasher.finalize()
    }

    /// Copies a rectangle out of this pixmap. Areas outside the source
    /// are filled with the mask color.
    pub fn crop(&self, bounds: Rectangle) -> Pixmap {
        let mut result = Pixmap::new(bounds.size);
        for y in 0..bounds.size.height {
            for x in 0..bounds.size.width {
                result.put_pixel((x, y), self.get_pixel((bounds.start.x + x, bounds.start.y + y)));
            }
        }
        result
    }

    pub fn flipped_x(&self) -> Pixmap {
        let mut result = Pixmap::new(self.size);
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                result.put_pixel((self.size.width - 1 - x, y), self.get_pixel((x, y)));
            }
        }
        result
    }

    pub fn flipped_y(&self) -> Pixmap {
        let mut result = Pixmap::new(self.size);
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                result.put_pixel((x, self.size.height - 1 - y), self.get_pixel((x, y)));
            }
        }
        result
    }

    /// Diagonal flip (transpose). The result swaps width and height.
    pub fn flipped_d(&self) -> Pixmap {
        let mut result = Pixmap::new((self.size.height, self.size.width));
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                result.put_pixel((y, x), self.get_pixel((x, y)));
            }
        }
        result
    }

    /// Applies the display transform for a cell's flip flags: diagonal
    /// first, then horizontal, then vertical.
    pub fn flipped(&self, flags: TileFlags) -> Pixmap {
        let mut result = self.clone();
        if flags.contains(TileFlags::FLIP_D) {
            result = result.flipped_d();
        }
        if flags.contains(TileFlags::FLIP_X) {
            result = result.flipped_x();
        }
        if flags.contains(TileFlags::FLIP_Y) {
            result = result.flipped_y();
        }
        result
    }

    /// Inverse of [`Pixmap::flipped`]: recovers the stored image from its
    /// displayed form.
    pub fn unflipped(&self, flags: TileFlags) -> Pixmap {
        let mut result = self.clone();
        if flags.contains(TileFlags::FLIP_Y) {
            result = result.flipped_y();
        }
        if flags.contains(TileFlags::FLIP_X) {
            result = result.flipped_x();
        }
        if flags.contains(TileFlags::FLIP_D) {
            result = result.flipped_d();
        }
        result
    }
}
