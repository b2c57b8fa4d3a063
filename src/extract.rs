// Slicing a pixel source into 8x8 index tiles.
use hashbrown::{hash_map::Entry, HashMap};
use log::info;

use crate::{
    common::{Color, ColorIdx, Palette},
    error::{Error, Result},
    source::{IndexedPalette, PixelSource},
    tile::{Tile, TILE_SIZE},
};

// Tilemap entries can only address 1024 characters.
pub const MAX_TILES: usize = 1024;

/// Raw (not yet deduplicated) tiles in row-major tile order.
#[derive(Clone, Debug)]
pub struct Extraction {
    pub tiles: Vec<Tile>,
    pub palette: Palette,
    pub width_tiles: usize,
    pub height_tiles: usize,
}

pub fn check_dimensions(width: usize, height: usize) -> Result<(usize, usize)> {
    if width < TILE_SIZE || height < TILE_SIZE {
        return Err(Error::InvalidInput(format!(
            "image is {}x{}, must be at least {}x{}",
            width, height, TILE_SIZE, TILE_SIZE
        )));
    }
    if width % TILE_SIZE != 0 || height % TILE_SIZE != 0 {
        return Err(Error::InvalidInput(format!(
            "image is {}x{}, both dimensions must be multiples of {}",
            width, height, TILE_SIZE
        )));
    }
    let (w, h) = (width / TILE_SIZE, height / TILE_SIZE);
    if w * h > MAX_TILES {
        return Err(Error::InvalidInput(format!(
            "image is {}x{} tiles ({} total), limit is {}",
            w,
            h,
            w * h,
            MAX_TILES
        )));
    }
    Ok((w, h))
}

// Palette size implied by an indexed source's declared bit depth.
fn indexed_palette_len(declared: &IndexedPalette) -> Result<usize> {
    let len = match declared.bit_depth {
        1 => 2,
        4 => 16,
        8 => 256,
        d => {
            return Err(Error::UnsupportedFormat(format!(
                "indexed source with bit depth {} (supported: 1, 4, 8)",
                d
            )))
        }
    };
    if declared.colors.len() > len {
        return Err(Error::UnsupportedFormat(format!(
            "{}-bit source declares {} colors, at most {} fit",
            declared.bit_depth,
            declared.colors.len(),
            len
        )));
    }
    Ok(len)
}

/// Looks up source colors and assigns palette indices, either against a
/// declared palette or by growing a new one.
enum ColorIndexer {
    Indexed(HashMap<Color, ColorIdx>),
    Direct(HashMap<Color, ColorIdx>),
}

impl ColorIndexer {
    fn index(&mut self, palette: &mut Palette, color: Color, x: usize, y: usize) -> Result<ColorIdx> {
        match self {
            ColorIndexer::Indexed(lookup) => lookup.get(&color).copied().ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "pixel ({}, {}) has color {} which is not in the declared palette",
                    x, y, color
                ))
            }),
            ColorIndexer::Direct(lookup) => {
                let color = color.quantized();
                match lookup.entry(color) {
                    Entry::Occupied(e) => Ok(*e.get()),
                    Entry::Vacant(e) => {
                        let idx = palette.len() as ColorIdx;
                        palette.colors.push(color);
                        e.insert(idx);
                        Ok(idx)
                    }
                }
            }
        }
    }
}

pub fn extract_tiles<S: PixelSource + ?Sized>(source: &S) -> Result<Extraction> {
    let (width_tiles, height_tiles) = check_dimensions(source.width(), source.height())?;

    let (mut palette, mut indexer) = match source.indexed() {
        Some(declared) => {
            let len = indexed_palette_len(&declared)?;
            // Filler entries are not part of the declared palette, so only
            // declared colors can be looked up. Duplicates resolve to the first.
            let mut lookup = HashMap::new();
            for (i, &c) in declared.colors.iter().enumerate() {
                lookup.entry(c).or_insert(i as ColorIdx);
            }
            let palette = Palette::new(declared.colors).padded(len);
            (palette, ColorIndexer::Indexed(lookup))
        }
        None => (Palette::default(), ColorIndexer::Direct(HashMap::new())),
    };

    let mut tiles = Vec::with_capacity(width_tiles * height_tiles);
    for ty in 0..height_tiles {
        for tx in 0..width_tiles {
            let mut tile = Tile::default();
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    let (px, py) = (tx * TILE_SIZE + x, ty * TILE_SIZE + y);
                    let color = source.pixel(px, py);
                    tile.set(x, y, indexer.index(&mut palette, color, px, py)?);
                }
            }
            tiles.push(tile);
        }
    }
    info!(
        "Extracted {} tiles ({}x{}) with {} colors",
        tiles.len(),
        width_tiles,
        height_tiles,
        palette.len()
    );
    Ok(Extraction {
        tiles,
        palette,
        width_tiles,
        height_tiles,
    })
}
