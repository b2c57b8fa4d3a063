// Merging duplicate tiles into a unique tileset plus tilemap.
//
// A raw tile matches a known unique tile if it equals that tile under one of
// the orientations None, Horizontal, Vertical, Both (the last three only when
// flipping is enabled). Candidates are scanned in ascending index order and,
// per candidate, orientations in that order; the first match wins.
use hashbrown::{hash_map::Entry, HashMap};
use log::info;

use crate::{
    common::{Palette, TileIdx},
    error::{Error, Result},
    extract::Extraction,
    tile::{Flip, Tile},
    tileset::{Tilemap, TilemapEntry, Tileset},
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Index every orientation of every unique tile in a hash map. Entries
    /// are only inserted when absent, so the first (candidate, orientation)
    /// pair producing a pattern is the one it resolves to, which is the
    /// same answer the scan gives.
    #[default]
    Indexed,
    /// Compare against every unique tile cell by cell.
    Scan,
}

#[derive(Copy, Clone, Debug)]
pub struct Deduplicator {
    pub enable_flip: bool,
    pub strategy: MatchStrategy,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Deduplicator {
            enable_flip: true,
            strategy: MatchStrategy::Indexed,
        }
    }
}

fn orientations(enable_flip: bool) -> &'static [Flip] {
    if enable_flip {
        &Flip::ALL
    } else {
        &Flip::ALL[..1]
    }
}

/// First unique tile (and orientation) that `tile` is a view of.
pub fn find_match(unique: &[Tile], tile: &Tile, flips: &[Flip]) -> Option<(usize, Flip)> {
    for (idx, candidate) in unique.iter().enumerate() {
        for &flip in flips {
            if tile.matches(candidate, flip) {
                return Some((idx, flip));
            }
        }
    }
    None
}

impl Deduplicator {
    pub fn new(enable_flip: bool) -> Self {
        Deduplicator {
            enable_flip,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn run(&self, extraction: Extraction) -> Result<(Tileset, Tilemap)> {
        self.deduplicate(
            &extraction.tiles,
            extraction.palette,
            extraction.width_tiles,
            extraction.height_tiles,
        )
    }

    pub fn deduplicate(
        &self,
        raw: &[Tile],
        palette: Palette,
        width_tiles: usize,
        height_tiles: usize,
    ) -> Result<(Tileset, Tilemap)> {
        if raw.is_empty() {
            return Err(Error::InvalidInput("no tiles to deduplicate".to_string()));
        }
        if raw.len() != width_tiles * height_tiles {
            return Err(Error::InvalidInput(format!(
                "{} raw tiles do not fill a {}x{} tile grid",
                raw.len(),
                width_tiles,
                height_tiles
            )));
        }
        let flips = orientations(self.enable_flip);

        let mut unique: Vec<Tile> = vec![];
        let mut entries: Vec<TilemapEntry> = Vec::with_capacity(raw.len());
        let mut lookup: HashMap<Tile, (usize, Flip)> = HashMap::new();
        for tile in raw {
            let found = match self.strategy {
                MatchStrategy::Indexed => lookup.get(tile).copied(),
                MatchStrategy::Scan => find_match(&unique, tile, flips),
            };
            let (idx, flip) = match found {
                Some(m) => m,
                None => {
                    let idx = unique.len();
                    unique.push(*tile);
                    if self.strategy == MatchStrategy::Indexed {
                        for &flip in flips {
                            if let Entry::Vacant(e) = lookup.entry(tile.flipped(flip)) {
                                e.insert((idx, flip));
                            }
                        }
                    }
                    (idx, Flip::None)
                }
            };
            entries.push(TilemapEntry::new(idx as TileIdx, flip));
        }
        info!(
            "Deduplicated {} tiles into {} unique (flipping {})",
            raw.len(),
            unique.len(),
            if self.enable_flip { "on" } else { "off" }
        );
        let tileset = Tileset::new(unique, palette)?;
        let tilemap = Tilemap::new(width_tiles, height_tiles, entries)?;
        Ok((tileset, tilemap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Color;

    fn palette() -> Palette {
        Palette::new(vec![Color::BLACK; 4])
    }

    fn asymmetric() -> Tile {
        let mut t = Tile::default();
        t.set(0, 0, 1);
        t.set(1, 0, 2);
        t.set(0, 1, 3);
        t
    }

    #[test]
    fn first_tile_is_index_zero() {
        let raw = vec![asymmetric(), Tile::default()];
        let (set, map) = Deduplicator::default()
            .deduplicate(&raw, palette(), 2, 1)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(map.entries()[0], TilemapEntry::new(0, Flip::None));
        assert_eq!(*set.tile(0).unwrap(), asymmetric());
    }

    #[test]
    fn identical_tiles_collapse() {
        for enable_flip in [true, false] {
            let raw = vec![asymmetric(); 6];
            let (set, map) = Deduplicator::new(enable_flip)
                .deduplicate(&raw, palette(), 3, 2)
                .unwrap();
            assert_eq!(set.len(), 1);
            assert!(map.entries().iter().all(|e| *e == TilemapEntry::default()));
        }
    }

    #[test]
    fn mirror_collapses_only_with_flipping() {
        let t = asymmetric();
        let raw = vec![t, t.flipped(Flip::Horizontal)];
        let (set, map) = Deduplicator::new(true)
            .deduplicate(&raw, palette(), 2, 1)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(map.entries()[1], TilemapEntry::new(0, Flip::Horizontal));

        let (set, map) = Deduplicator::new(false)
            .deduplicate(&raw, palette(), 2, 1)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(map.entries()[1], TilemapEntry::new(1, Flip::None));
    }

    #[test]
    fn identity_beats_flip_and_horizontal_beats_vertical() {
        // Vertically symmetric tile: its vertical flip is itself, and its
        // horizontal flip equals its 180 degree rotation.
        let mut sym = Tile::default();
        for y in 0..8 {
            sym.set(0, y, 1);
        }
        let raw = vec![
            sym,
            sym,
            sym.flipped(Flip::Horizontal),
            sym.flipped(Flip::Both),
        ];
        for strategy in [MatchStrategy::Indexed, MatchStrategy::Scan] {
            let (set, map) = Deduplicator::new(true)
                .with_strategy(strategy)
                .deduplicate(&raw, palette(), 4, 1)
                .unwrap();
            assert_eq!(set.len(), 1);
            let flips: Vec<Flip> = map.entries().iter().map(|e| e.flip).collect();
            assert_eq!(
                flips,
                vec![Flip::None, Flip::None, Flip::Horizontal, Flip::Horizontal]
            );
        }
    }

    #[test]
    fn earlier_candidates_win() {
        // A mirror of the first tile still resolves to it after other uniques.
        let a = asymmetric();
        let b = a.flipped(Flip::Horizontal);
        let raw = vec![a, Tile::default(), b];
        let (_, map) = Deduplicator::new(true)
            .deduplicate(&raw, palette(), 3, 1)
            .unwrap();
        assert_eq!(map.entries()[2], TilemapEntry::new(0, Flip::Horizontal));
    }

    #[test]
    fn strategies_agree() {
        let mut raw = vec![];
        for i in 0..64u16 {
            let mut t = Tile::default();
            t.set((i % 8) as usize, (i / 8 % 2) as usize, 1 + i % 3);
            if i % 5 == 0 {
                t = t.flipped(Flip::Vertical);
            }
            raw.push(t);
        }
        let a = Deduplicator::new(true)
            .deduplicate(&raw, palette(), 8, 8)
            .unwrap();
        let b = Deduplicator::new(true)
            .with_strategy(MatchStrategy::Scan)
            .deduplicate(&raw, palette(), 8, 8)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn grid_mismatch_is_rejected() {
        let raw = vec![Tile::default(); 3];
        assert!(Deduplicator::default()
            .deduplicate(&raw, palette(), 2, 2)
            .is_err());
        assert!(Deduplicator::default()
            .deduplicate(&[], palette(), 0, 0)
            .is_err());
    }
}
