use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ColorValue = u8; // Color channel value (0-255)
pub type ColorIdx = u16; // Index into a palette
pub type TileIdx = u16; // Index into a tileset's unique tile list
pub type PixelCoord = usize;

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: ColorValue,
    pub green: ColorValue,
    pub blue: ColorValue,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(red: ColorValue, green: ColorValue, blue: ColorValue) -> Self {
        Color { red, green, blue }
    }

    /// Rounds every channel down to a multiple of 8, which is all the
    /// precision the console's 15-bit color can hold.
    pub fn quantized(self) -> Self {
        Color {
            red: self.red & 0xF8,
            green: self.green & 0xF8,
            blue: self.blue & 0xF8,
        }
    }

    pub fn distance_sq(self, other: Color) -> u32 {
        let dr = self.red as i32 - other.red as i32;
        let dg = self.green as i32 - other.green as i32;
        let db = self.blue as i32 - other.blue as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    pub colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Self {
        Palette { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, idx: ColorIdx) -> Option<Color> {
        self.colors.get(idx as usize).copied()
    }

    /// Returns a copy of the palette extended with black up to `len` entries.
    pub fn padded(&self, len: usize) -> Palette {
        let mut colors = self.colors.clone();
        if colors.len() < len {
            colors.resize(len, Color::BLACK);
        }
        Palette { colors }
    }
}

/// A rectangular grid of palette indices together with the palette they
/// index into. This is the pure-data form every encoder consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<ColorIdx>,
    pub palette: Palette,
}

impl IndexedImage {
    pub fn new(width: usize, height: usize, palette: Palette) -> Self {
        IndexedImage {
            width,
            height,
            pixels: vec![0; width * height],
            palette,
        }
    }

    pub fn get(&self, x: PixelCoord, y: PixelCoord) -> ColorIdx {
        self.pixels[y * self.width + x]
    }

    pub fn set(&mut self, x: PixelCoord, y: PixelCoord, idx: ColorIdx) {
        self.pixels[y * self.width + x] = idx;
    }

    pub fn color_at(&self, x: PixelCoord, y: PixelCoord) -> Result<Color> {
        let idx = self.get(x, y);
        self.palette.get(idx).ok_or_else(|| {
            Error::InvalidInput(format!(
                "pixel ({}, {}) references color {} but palette has {} entries",
                x,
                y,
                idx,
                self.palette.len()
            ))
        })
    }

    pub fn check_indices(&self) -> Result<()> {
        let len = self.palette.len();
        if let Some(pos) = self.pixels.iter().position(|&p| p as usize >= len) {
            return Err(Error::InvalidInput(format!(
                "pixel ({}, {}) references color {} but palette has {} entries",
                pos % self.width,
                pos / self.width,
                self.pixels[pos],
                len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantized_rounds_down_to_steps_of_eight() {
        let c = Color::new(0xFF, 0x07, 0x89).quantized();
        assert_eq!(c, Color::new(0xF8, 0x00, 0x88));
    }

    #[test]
    fn padded_fills_with_black() {
        let pal = Palette::new(vec![Color::new(1, 2, 3)]);
        let padded = pal.padded(4);
        assert_eq!(padded.len(), 4);
        assert_eq!(padded.colors[3], Color::BLACK);
        assert_eq!(pal.padded(1), pal);
    }

    #[test]
    fn check_indices_reports_offending_pixel() {
        let mut img = IndexedImage::new(3, 2, Palette::new(vec![Color::BLACK; 2]));
        img.set(1, 1, 5);
        let err = img.check_indices().unwrap_err();
        assert!(err.to_string().contains("(1, 1)"));
    }
}
