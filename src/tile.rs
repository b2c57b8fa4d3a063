use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::common::{ColorIdx, PixelCoord};

pub const TILE_SIZE: usize = 8;
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

// The numeric values match the two flip bits at the top of a tilemap word.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Flip {
    #[default]
    None = 0,
    Horizontal = 1,
    Vertical = 2,
    Both = 3,
}

impl Flip {
    // Order in which orientations are tried when matching a tile.
    pub const ALL: [Flip; 4] = [Flip::None, Flip::Horizontal, Flip::Vertical, Flip::Both];

    pub fn from_flags(flip_x: bool, flip_y: bool) -> Self {
        match (flip_x, flip_y) {
            (false, false) => Flip::None,
            (true, false) => Flip::Horizontal,
            (false, true) => Flip::Vertical,
            (true, true) => Flip::Both,
        }
    }

    pub fn from_bits(bits: u16) -> Self {
        Flip::from_flags(bits & 1 == 1, bits & 2 == 2)
    }

    pub fn bits(self) -> u16 {
        self as u16
    }

    pub fn flip_x(self) -> bool {
        matches!(self, Flip::Horizontal | Flip::Both)
    }

    pub fn flip_y(self) -> bool {
        matches!(self, Flip::Vertical | Flip::Both)
    }

    /// Maps a destination coordinate in a `width` x `height` grid to the
    /// source coordinate it is read from under this flip.
    pub fn source_coords(
        self,
        x: PixelCoord,
        y: PixelCoord,
        width: usize,
        height: usize,
    ) -> (PixelCoord, PixelCoord) {
        let sx = if self.flip_x() { width - 1 - x } else { x };
        let sy = if self.flip_y() { height - 1 - y } else { y };
        (sx, sy)
    }

    pub fn apply_to_pixels(
        self,
        pixels: [[ColorIdx; TILE_SIZE]; TILE_SIZE],
    ) -> [[ColorIdx; TILE_SIZE]; TILE_SIZE] {
        let mut out = [[0; TILE_SIZE]; TILE_SIZE];
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let (sx, sy) = self.source_coords(x, y, TILE_SIZE, TILE_SIZE);
                out[y][x] = pixels[sy][sx];
            }
        }
        out
    }

    pub fn apply_to_tile(self, tile: Tile) -> Tile {
        Tile {
            pixels: self.apply_to_pixels(tile.pixels),
        }
    }
}

/// An 8x8 block of palette indices. Tiles are plain values: storing one
/// into a collection copies it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tile {
    pixels: [[ColorIdx; TILE_SIZE]; TILE_SIZE],
}

impl Tile {
    pub fn filled(idx: ColorIdx) -> Self {
        Tile {
            pixels: [[idx; TILE_SIZE]; TILE_SIZE],
        }
    }

    pub fn get(&self, x: PixelCoord, y: PixelCoord) -> ColorIdx {
        self.pixels[y][x]
    }

    pub fn set(&mut self, x: PixelCoord, y: PixelCoord, idx: ColorIdx) {
        self.pixels[y][x] = idx;
    }

    pub fn flipped(&self, flip: Flip) -> Tile {
        flip.apply_to_tile(*self)
    }

    /// True if `candidate`, viewed under `flip`, equals this tile. Compares
    /// cell by cell through the flipped coordinates and stops at the first
    /// difference.
    pub fn matches(&self, candidate: &Tile, flip: Flip) -> bool {
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let (sx, sy) = flip.source_coords(x, y, TILE_SIZE, TILE_SIZE);
                if self.pixels[y][x] != candidate.pixels[sy][sx] {
                    return false;
                }
            }
        }
        true
    }

    pub fn max_index(&self) -> ColorIdx {
        self.pixels.iter().flatten().copied().max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = ColorIdx> + '_ {
        self.pixels.iter().flatten().copied()
    }

    pub fn remap(&mut self, mapping: &[ColorIdx]) {
        for row in self.pixels.iter_mut() {
            for c in row.iter_mut() {
                *c = mapping[*c as usize];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> Tile {
        let mut tile = Tile::default();
        for y in 0..8 {
            for x in 0..8 {
                tile.set(x, y, (y * 8 + x) as ColorIdx);
            }
        }
        tile
    }

    #[test]
    fn default_tile_is_all_zero() {
        let tile = Tile::default();
        assert!(tile.iter().all(|c| c == 0));
        assert_eq!(tile.iter().count(), TILE_PIXELS);
    }

    #[test]
    fn copies_do_not_alias() {
        let a = gradient();
        let mut b = a;
        b.set(0, 0, 99);
        assert_eq!(a.get(0, 0), 0);
        assert_eq!(b.get(0, 0), 99);
    }

    #[test]
    fn flips_remap_coordinates() {
        let tile = gradient();
        assert_eq!(tile.flipped(Flip::Horizontal).get(0, 0), 7);
        assert_eq!(tile.flipped(Flip::Vertical).get(0, 0), 56);
        assert_eq!(tile.flipped(Flip::Both).get(0, 0), 63);
        assert_eq!(tile.flipped(Flip::Both).flipped(Flip::Both), tile);
    }

    #[test]
    fn matches_agrees_with_flipped_equality() {
        let tile = gradient();
        for flip in Flip::ALL {
            let view = tile.flipped(flip);
            for other in Flip::ALL {
                assert_eq!(view.matches(&tile, other), flip == other);
            }
        }
    }

    #[test]
    fn flip_bits_round_trip() {
        for flip in Flip::ALL {
            assert_eq!(Flip::from_bits(flip.bits()), flip);
            assert_eq!(Flip::from_flags(flip.flip_x(), flip.flip_y()), flip);
        }
    }

    #[test]
    fn remap_rewrites_every_cell() {
        let mut tile = Tile::filled(2);
        tile.set(3, 3, 1);
        tile.remap(&[0, 5, 4]);
        assert_eq!(tile.get(0, 0), 4);
        assert_eq!(tile.get(3, 3), 5);
    }
}
