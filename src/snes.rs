// SNES-native binary formats: planar character (tile) data, tilemap words and
// BGR555 palettes.
//
// Character data stores bit-planes in pairs. For each pair (p, p+1) a 16-byte
// block holds, for rows 0..7, the plane-p byte followed by the plane-(p+1)
// byte. A 4bpp tile is two such blocks (planes 0-1, then 2-3, 32 bytes); an
// 8bpp tile is four (64 bytes). In every plane byte bit 7 is the leftmost
// pixel.
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    common::{Color, Palette},
    error::{Error, Result},
    helpers::{color_from_bgr555, color_to_bgr555},
    tile::{Flip, Tile, TILE_SIZE},
    tileset::{Tilemap, TilemapEntry, Tileset},
};

// Tilemap words carry a 10-bit character index.
pub const MAX_CHARACTERS: usize = 1024;
pub const MAX_PALETTE_COLORS: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileFormat {
    Bpp4,
    Bpp8,
}

impl TileFormat {
    pub fn for_palette_len(len: usize) -> Result<Self> {
        match len {
            0..=16 => Ok(TileFormat::Bpp4),
            17..=256 => Ok(TileFormat::Bpp8),
            _ => Err(Error::CapacityExceeded {
                what: "console tile palette",
                count: len,
                limit: MAX_PALETTE_COLORS,
            }),
        }
    }

    pub fn from_bpp(bpp: u8) -> Option<Self> {
        match bpp {
            4 => Some(TileFormat::Bpp4),
            8 => Some(TileFormat::Bpp8),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            TileFormat::Bpp4 => 4,
            TileFormat::Bpp8 => 8,
        }
    }

    pub fn bytes_per_tile(self) -> usize {
        self.bits_per_pixel() * TILE_SIZE
    }

    pub fn color_count(self) -> usize {
        1 << self.bits_per_pixel()
    }
}

pub fn encode_tile(tile: &Tile, format: TileFormat, out: &mut Vec<u8>) -> Result<()> {
    let max = tile.max_index() as usize;
    if max >= format.color_count() {
        return Err(Error::CapacityExceeded {
            what: "tile color index",
            count: max + 1,
            limit: format.color_count(),
        });
    }
    for pair in 0..format.bits_per_pixel() / 2 {
        for y in 0..TILE_SIZE {
            for plane in [pair * 2, pair * 2 + 1] {
                let mut byte = 0u8;
                for x in 0..TILE_SIZE {
                    let bit = (tile.get(x, y) >> plane) & 1;
                    byte |= (bit as u8) << (7 - x);
                }
                out.push(byte);
            }
        }
    }
    Ok(())
}

pub fn encode_tiles_as(tiles: &[Tile], format: TileFormat) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(tiles.len() * format.bytes_per_tile());
    for tile in tiles {
        encode_tile(tile, format, &mut out)?;
    }
    Ok(out)
}

/// Encodes the unique tiles of `tileset`, choosing 4bpp or 8bpp from the
/// palette size. Palettes over 256 colors have no hardware mode and fail.
pub fn encode_tiles(tileset: &Tileset) -> Result<(TileFormat, Vec<u8>)> {
    let format = TileFormat::for_palette_len(tileset.palette().len())?;
    let data = encode_tiles_as(tileset.tiles(), format)?;
    info!(
        "Encoded {} tiles as {:?} ({} bytes)",
        tileset.len(),
        format,
        data.len()
    );
    Ok((format, data))
}

pub fn decode_tiles(data: &[u8], format: TileFormat) -> Result<Vec<Tile>> {
    let size = format.bytes_per_tile();
    if data.len() % size != 0 {
        return Err(Error::InvalidInput(format!(
            "{} bytes is not a whole number of {}-byte tiles",
            data.len(),
            size
        )));
    }
    let mut tiles = vec![];
    for chunk in data.chunks_exact(size) {
        let mut tile = Tile::default();
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let mut c = 0u16;
                for pair in 0..format.bits_per_pixel() / 2 {
                    let c0 = (chunk[pair * 16 + y * 2] >> (7 - x)) & 1;
                    let c1 = (chunk[pair * 16 + y * 2 + 1] >> (7 - x)) & 1;
                    c |= (c0 as u16 | (c1 as u16) << 1) << (pair * 2);
                }
                tile.set(x, y, c);
            }
        }
        tiles.push(tile);
    }
    Ok(tiles)
}

/// One background tilemap entry as the PPU reads it: `vhopppcc cccccccc`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VramTile {
    pub character: u16, // Index into character data (0-1023)
    pub palette: u8,    // Background palette (0-7)
    pub priority: bool,
    pub flip: Flip,
}

impl VramTile {
    pub fn from_vram_tilemap_word(w: u16) -> Self {
        Self {
            character: w & 0x3FF,
            palette: ((w >> 10) & 7) as u8,
            priority: (w >> 13) & 1 == 1,
            flip: Flip::from_bits(w >> 14),
        }
    }

    pub fn to_vram_tilemap_word(self) -> u16 {
        (self.character & 0x3FF)
            | ((self.palette & 7) as u16) << 10
            | (self.priority as u16) << 13
            | self.flip.bits() << 14
    }

    pub fn from_entry(entry: TilemapEntry) -> Result<Self> {
        if entry.index as usize >= MAX_CHARACTERS {
            return Err(Error::CapacityExceeded {
                what: "tilemap character index",
                count: entry.index as usize + 1,
                limit: MAX_CHARACTERS,
            });
        }
        Ok(Self {
            character: entry.index,
            palette: 0,
            priority: false,
            flip: entry.flip,
        })
    }

    pub fn to_entry(self) -> TilemapEntry {
        TilemapEntry::new(self.character, self.flip)
    }
}

pub fn encode_tilemap(tilemap: &Tilemap) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(tilemap.entries().len() * 2);
    for &entry in tilemap.entries() {
        let w = VramTile::from_entry(entry)?.to_vram_tilemap_word();
        out.extend_from_slice(&w.to_le_bytes());
    }
    Ok(out)
}

pub fn decode_tilemap(data: &[u8], width: usize, height: usize) -> Result<Tilemap> {
    if data.len() != width * height * 2 {
        return Err(Error::InvalidInput(format!(
            "{} bytes do not hold a {}x{} tilemap",
            data.len(),
            width,
            height
        )));
    }
    let entries = data
        .chunks_exact(2)
        .map(|w| VramTile::from_vram_tilemap_word(u16::from_le_bytes([w[0], w[1]])).to_entry())
        .collect();
    Tilemap::new(width, height, entries)
}

pub fn encode_palette(palette: &Palette) -> Result<Vec<u8>> {
    if palette.len() > MAX_PALETTE_COLORS {
        return Err(Error::CapacityExceeded {
            what: "console palette",
            count: palette.len(),
            limit: MAX_PALETTE_COLORS,
        });
    }
    let mut out = Vec::with_capacity(palette.len() * 2);
    for &c in &palette.colors {
        out.extend_from_slice(&color_to_bgr555(c).to_le_bytes());
    }
    Ok(out)
}

pub fn decode_palette(data: &[u8]) -> Result<Palette> {
    if data.len() % 2 != 0 {
        return Err(Error::InvalidInput(format!(
            "palette data has odd length {}",
            data.len()
        )));
    }
    let colors: Vec<Color> = data
        .chunks_exact(2)
        .map(|w| color_from_bgr555(u16::from_le_bytes([w[0], w[1]])))
        .collect();
    Ok(Palette::new(colors))
}
