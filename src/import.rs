use log::info;

use crate::{
    dedup::{Deduplicator, MatchStrategy},
    error::Result,
    extract::{extract_tiles, Extraction},
    quantize::reduce_palette,
    source::PixelSource,
    tileset::{Tilemap, Tileset},
};

#[derive(Copy, Clone, Debug)]
pub struct ImportOptions {
    pub enable_flip: bool,
    // Reduce the palette before deduplication when it has more colors.
    pub max_colors: Option<usize>,
    pub strategy: MatchStrategy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            enable_flip: true,
            max_colors: None,
            strategy: MatchStrategy::Indexed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedImage {
    pub tileset: Tileset,
    pub tilemap: Tilemap,
}

pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Importer { options }
    }

    pub fn import<S: PixelSource + ?Sized>(&self, source: &S) -> Result<ImportedImage> {
        let mut extraction = extract_tiles(source)?;
        if let Some(max_colors) = self.options.max_colors {
            self.reduce_colors(&mut extraction, max_colors)?;
        }
        let (tileset, tilemap) = Deduplicator::new(self.options.enable_flip)
            .with_strategy(self.options.strategy)
            .run(extraction)?;
        Ok(ImportedImage { tileset, tilemap })
    }

    // Quantizing before deduplication lets tiles that only differed in
    // near-identical colors merge.
    fn reduce_colors(&self, extraction: &mut Extraction, max_colors: usize) -> Result<()> {
        let before = extraction.palette.len();
        let reduction = reduce_palette(
            &extraction.palette,
            extraction.tiles.iter().flat_map(|t| t.iter()),
            max_colors,
        )?;
        for tile in extraction.tiles.iter_mut() {
            tile.remap(&reduction.mapping);
        }
        extraction.palette = reduction.palette;
        if extraction.palette.len() != before {
            info!(
                "Quantized {} colors down to {}",
                before,
                extraction.palette.len()
            );
        }
        Ok(())
    }
}

pub fn import_image<S: PixelSource + ?Sized>(
    source: &S,
    options: ImportOptions,
) -> Result<ImportedImage> {
    Importer::new(options).import(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Color;
    use crate::source::RgbImage;

    #[test]
    fn max_colors_limits_palette() {
        let img = RgbImage::from_fn(16, 16, |x, y| Color::new((x * 16) as u8, (y * 16) as u8, 0));
        let imported = import_image(
            &img,
            ImportOptions {
                max_colors: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(imported.tileset.palette().len() <= 4);
        let full = import_image(&img, ImportOptions::default()).unwrap();
        assert_eq!(full.tileset.palette().len(), 256);
    }

    #[test]
    fn quantizing_can_merge_tiles() {
        // Two tiles that differ only by a slight shade.
        let img = RgbImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                Color::new(200, 0, 0)
            } else {
                Color::new(208, 0, 0)
            }
        });
        let plain = import_image(&img, ImportOptions::default()).unwrap();
        assert_eq!(plain.tileset.len(), 2);
        let reduced = import_image(
            &img,
            ImportOptions {
                max_colors: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(reduced.tileset.len(), 1);
    }
}
