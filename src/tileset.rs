// Unique tiles plus the tilemap that places them.
use log::info;

use crate::{
    common::{ColorIdx, IndexedImage, Palette, PixelCoord, TileIdx},
    error::{Error, Result},
    helpers::divisors,
    quantize::reduce_palette,
    tile::{Flip, Tile, TILE_SIZE},
};

/// Unique tiles sharing one palette. Tiles are stored in a flat arena and
/// addressed by index; cell writes go through `set_pixel`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tileset {
    tiles: Vec<Tile>,
    palette: Palette,
}

impl Tileset {
    pub fn new(tiles: Vec<Tile>, palette: Palette) -> Result<Self> {
        for (i, tile) in tiles.iter().enumerate() {
            if tile.max_index() as usize >= palette.len() {
                return Err(Error::InvalidInput(format!(
                    "tile {} references color {} but palette has {} entries",
                    i,
                    tile.max_index(),
                    palette.len()
                )));
            }
        }
        Ok(Tileset { tiles, palette })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, idx: TileIdx) -> Option<&Tile> {
        self.tiles.get(idx as usize)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_pixel(
        &mut self,
        idx: TileIdx,
        x: PixelCoord,
        y: PixelCoord,
        color: ColorIdx,
    ) -> Result<()> {
        if color as usize >= self.palette.len() {
            return Err(Error::InvalidInput(format!(
                "color {} outside {}-color palette",
                color,
                self.palette.len()
            )));
        }
        if x >= TILE_SIZE || y >= TILE_SIZE {
            return Err(Error::InvalidInput(format!(
                "pixel ({}, {}) outside 8x8 tile",
                x, y
            )));
        }
        let len = self.tiles.len();
        let tile = self.tiles.get_mut(idx as usize).ok_or_else(|| {
            Error::InvalidInput(format!("tile {} outside {}-tile set", idx, len))
        })?;
        tile.set(x, y, color);
        Ok(())
    }

    /// Column counts that lay the tiles out as a full rectangle.
    pub fn perfect_columns(&self) -> Vec<usize> {
        divisors(self.tiles.len())
    }

    // Widest perfect layout no wider than `max_columns`.
    pub fn default_columns(&self, max_columns: usize) -> usize {
        self.perfect_columns()
            .into_iter()
            .filter(|&c| c <= max_columns)
            .max()
            .unwrap_or(1)
    }

    /// Renders the tiles left to right, top to bottom, `columns` per row.
    pub fn to_image(&self, columns: usize) -> Result<IndexedImage> {
        if columns == 0 || self.tiles.is_empty() || self.tiles.len() % columns != 0 {
            return Err(Error::InvalidInput(format!(
                "{} columns do not evenly lay out {} tiles (valid: {:?})",
                columns,
                self.tiles.len(),
                self.perfect_columns()
            )));
        }
        let rows = self.tiles.len() / columns;
        let mut image = IndexedImage::new(
            columns * TILE_SIZE,
            rows * TILE_SIZE,
            self.palette.clone(),
        );
        for (i, tile) in self.tiles.iter().enumerate() {
            let (bx, by) = ((i % columns) * TILE_SIZE, (i / columns) * TILE_SIZE);
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    image.set(bx + x, by + y, tile.get(x, y));
                }
            }
        }
        Ok(image)
    }

    /// Replaces the palette with at most `max_colors` entries and remaps
    /// every tile. Nothing is modified if the reduction fails.
    pub fn reduce_colors(&mut self, max_colors: usize) -> Result<()> {
        let reduction = reduce_palette(
            &self.palette,
            self.tiles.iter().flat_map(|t| t.iter()),
            max_colors,
        )?;
        let before = self.palette.len();
        for tile in self.tiles.iter_mut() {
            tile.remap(&reduction.mapping);
        }
        self.palette = reduction.palette;
        info!("Reduced tileset palette from {} to {} colors", before, self.palette.len());
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TilemapEntry {
    pub index: TileIdx,
    pub flip: Flip,
}

impl TilemapEntry {
    pub fn new(index: TileIdx, flip: Flip) -> Self {
        TilemapEntry { index, flip }
    }
}

/// One entry per source tile position, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tilemap {
    width: usize,
    height: usize,
    entries: Vec<TilemapEntry>,
}

impl Tilemap {
    pub fn new(width: usize, height: usize, entries: Vec<TilemapEntry>) -> Result<Self> {
        if entries.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "{}x{} tilemap needs {} entries, got {}",
                width,
                height,
                width * height,
                entries.len()
            )));
        }
        Ok(Tilemap {
            width,
            height,
            entries,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn entries(&self) -> &[TilemapEntry] {
        &self.entries
    }

    pub fn get(&self, x: usize, y: usize) -> Option<TilemapEntry> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.entries[y * self.width + x])
    }

    /// The tile shown at position `i`: the referenced unique tile with the
    /// entry's flip applied.
    pub fn resolve(&self, i: usize, tileset: &Tileset) -> Result<Tile> {
        let entry = self.entries.get(i).ok_or_else(|| {
            Error::InvalidInput(format!("tilemap position {} outside {} entries", i, self.entries.len()))
        })?;
        let tile = tileset.tile(entry.index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "tilemap position {} references tile {} but tileset has {}",
                i,
                entry.index,
                tileset.len()
            ))
        })?;
        Ok(tile.flipped(entry.flip))
    }

    /// Rebuilds the full image the tilemap describes.
    pub fn render(&self, tileset: &Tileset) -> Result<IndexedImage> {
        let mut image = IndexedImage::new(
            self.width * TILE_SIZE,
            self.height * TILE_SIZE,
            tileset.palette().clone(),
        );
        for i in 0..self.entries.len() {
            let tile = self.resolve(i, tileset)?;
            let (bx, by) = ((i % self.width) * TILE_SIZE, (i / self.width) * TILE_SIZE);
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    image.set(bx + x, by + y, tile.get(x, y));
                }
            }
        }
        Ok(image)
    }
}
