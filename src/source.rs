// Decoded pixel sources the converter reads from.
use std::{fs::File, io::BufReader, io::Read, path::Path};

use log::{debug, info};

use crate::{
    common::{Color, IndexedImage, PixelCoord},
    error::{Error, Result},
};

/// The palette an indexed source declares, together with its bit depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedPalette {
    pub bit_depth: u8,
    pub colors: Vec<Color>,
}

pub trait PixelSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn pixel(&self, x: PixelCoord, y: PixelCoord) -> Color;

    // Direct-color sources return None.
    fn indexed(&self) -> Option<IndexedPalette> {
        None
    }

    fn pixels(&self) -> Vec<Color> {
        let mut out = Vec::with_capacity(self.width() * self.height());
        for y in 0..self.height() {
            for x in 0..self.width() {
                out.push(self.pixel(x, y));
            }
        }
        out
    }
}

/// In-memory RGB pixel grid, optionally carrying a declared palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
    indexed: Option<IndexedPalette>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize, pixels: Vec<Color>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "{}x{} image needs {} pixels, got {}",
                width,
                height,
                width * height,
                pixels.len()
            )));
        }
        Ok(RgbImage {
            width,
            height,
            pixels,
            indexed: None,
        })
    }

    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(PixelCoord, PixelCoord) -> Color,
    ) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        RgbImage {
            width,
            height,
            pixels,
            indexed: None,
        }
    }

    pub fn with_palette(mut self, bit_depth: u8, colors: Vec<Color>) -> Self {
        self.indexed = Some(IndexedPalette { bit_depth, colors });
        self
    }

    // Builds an indexed source from index data, as a paletted file stores it.
    pub fn from_indexed(image: &IndexedImage, bit_depth: u8) -> Result<Self> {
        image.check_indices()?;
        let pixels = image
            .pixels
            .iter()
            .map(|&idx| image.palette.colors[idx as usize])
            .collect();
        Ok(RgbImage::new(image.width, image.height, pixels)?
            .with_palette(bit_depth, image.palette.colors.clone()))
    }
}

impl PixelSource for RgbImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pixel(&self, x: PixelCoord, y: PixelCoord) -> Color {
        self.pixels[y * self.width + x]
    }

    fn indexed(&self) -> Option<IndexedPalette> {
        self.indexed.clone()
    }
}

/// A PNG file decoded into memory.
pub struct PngSource {
    image: RgbImage,
}

fn unpack_bits(row: &[u8], x: usize, bit_depth: usize) -> u8 {
    let bit = x * bit_depth;
    let shift = 8 - bit_depth - bit % 8;
    (row[bit / 8] >> shift) & ((1u16 << bit_depth) - 1) as u8
}

impl PngSource {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Loading {}", path.display());
        let file = File::open(path)?;
        Self::decode(BufReader::new(file))
    }

    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let palette: Option<Vec<Color>> = reader.info().palette.as_ref().map(|p| {
            p.chunks_exact(3)
                .map(|c| Color::new(c[0], c[1], c[2]))
                .collect()
        });
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf)?;
        let width = frame.width as usize;
        let height = frame.height as usize;
        let bit_depth = frame.bit_depth as usize;
        debug!(
            "PNG {}x{} {:?} at {} bits",
            width, height, frame.color_type, bit_depth
        );

        let mut pixels = Vec::with_capacity(width * height);
        let mut declared = None;
        for y in 0..height {
            let row = &buf[y * frame.line_size..(y + 1) * frame.line_size];
            for x in 0..width {
                let color = match frame.color_type {
                    png::ColorType::Indexed => {
                        let colors = palette.as_ref().ok_or_else(|| {
                            Error::UnsupportedFormat("indexed PNG without a palette".to_string())
                        })?;
                        let idx = unpack_bits(row, x, bit_depth) as usize;
                        *colors.get(idx).ok_or_else(|| {
                            Error::UnsupportedFormat(format!(
                                "pixel ({}, {}) uses index {} outside the {}-color palette",
                                x,
                                y,
                                idx,
                                colors.len()
                            ))
                        })?
                    }
                    png::ColorType::Grayscale => {
                        let max = (1u16 << bit_depth) - 1;
                        let v = unpack_bits(row, x, bit_depth) as u16 * 255 / max;
                        Color::new(v as u8, v as u8, v as u8)
                    }
                    png::ColorType::GrayscaleAlpha => {
                        let v = row[x * 2];
                        Color::new(v, v, v)
                    }
                    png::ColorType::Rgb => Color::new(row[x * 3], row[x * 3 + 1], row[x * 3 + 2]),
                    png::ColorType::Rgba => Color::new(row[x * 4], row[x * 4 + 1], row[x * 4 + 2]),
                };
                pixels.push(color);
            }
        }
        if frame.color_type == png::ColorType::Indexed {
            declared = palette.map(|colors| IndexedPalette {
                bit_depth: bit_depth as u8,
                colors,
            });
        }
        let mut image = RgbImage::new(width, height, pixels)?;
        image.indexed = declared;
        Ok(PngSource { image })
    }
}

impl PixelSource for PngSource {
    fn width(&self) -> usize {
        self.image.width()
    }

    fn height(&self) -> usize {
        self.image.height()
    }

    fn pixel(&self, x: PixelCoord, y: PixelCoord) -> Color {
        self.image.pixel(x, y)
    }

    fn indexed(&self) -> Option<IndexedPalette> {
        self.image.indexed()
    }
}
