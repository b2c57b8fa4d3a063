// Free-size indexed pixel buffer with an explicit write-staging state.
//
// A sprite is either Unlocked, in which case it owns an up-to-date RGB
// rendering of its pixels, or Locked, in which case pixels may be written and
// no rendering exists. Unlocking always re-renders. `edit` hands out a guard
// that holds the only mutable borrow and unlocks when dropped.
use std::sync::Arc;

use log::debug;

use crate::{
    common::{Color, ColorIdx, IndexedImage, Palette, PixelCoord},
    error::{Error, Result},
    quantize::Quantizer,
    source::PixelSource,
    tile::{Flip, Tile, TILE_SIZE},
};

#[derive(Clone, Debug)]
enum Staging {
    Unlocked { rendered: Vec<Color> },
    Locked,
}

#[derive(Clone, Debug)]
pub struct Sprite {
    width: usize,
    height: usize,
    pixels: Vec<ColorIdx>,
    palette: Arc<Palette>,
    staging: Staging,
}

fn render(pixels: &[ColorIdx], palette: &Palette) -> Vec<Color> {
    pixels
        .iter()
        .map(|&idx| palette.get(idx).unwrap_or(Color::BLACK))
        .collect()
}

// Source coordinate for offset `d` from `origin`, if it lies in `0..limit`.
fn region_coord(origin: i64, d: usize, limit: usize) -> Option<usize> {
    let d = i64::try_from(d).ok()?;
    let v = usize::try_from(origin.checked_add(d)?).ok()?;
    (v < limit).then_some(v)
}

impl Sprite {
    /// A sprite filled with color index 0.
    pub fn new(width: usize, height: usize, palette: Arc<Palette>) -> Result<Self> {
        if palette.is_empty() {
            return Err(Error::InvalidInput("sprite palette is empty".to_string()));
        }
        Ok(Self::from_parts(width, height, vec![0; width * height], palette))
    }

    fn from_parts(
        width: usize,
        height: usize,
        pixels: Vec<ColorIdx>,
        palette: Arc<Palette>,
    ) -> Self {
        let rendered = render(&pixels, &palette);
        Sprite {
            width,
            height,
            pixels,
            palette,
            staging: Staging::Unlocked { rendered },
        }
    }

    pub fn from_image(image: &IndexedImage) -> Result<Self> {
        image.check_indices()?;
        if image.palette.is_empty() {
            return Err(Error::InvalidInput("sprite palette is empty".to_string()));
        }
        Ok(Self::from_parts(
            image.width,
            image.height,
            image.pixels.clone(),
            Arc::new(image.palette.clone()),
        ))
    }

    pub fn from_tile(tile: &Tile, palette: Arc<Palette>) -> Result<Self> {
        if tile.max_index() as usize >= palette.len() {
            return Err(Error::InvalidInput(format!(
                "tile references color {} but palette has {} entries",
                tile.max_index(),
                palette.len()
            )));
        }
        Ok(Self::from_parts(
            TILE_SIZE,
            TILE_SIZE,
            tile.iter().collect(),
            palette,
        ))
    }

    /// Builds a sprite from any pixel source. Indexed sources keep their
    /// palette; direct-color sources are quantized to at most `max_colors`.
    pub fn from_source<S: PixelSource + ?Sized>(source: &S, max_colors: usize) -> Result<Self> {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "sprite source is {}x{}",
                width, height
            )));
        }
        let colors = source.pixels();
        let (palette, pixels) = match source.indexed() {
            Some(declared) if !declared.colors.is_empty() => {
                let mut pixels = Vec::with_capacity(colors.len());
                for (i, c) in colors.iter().enumerate() {
                    let idx = declared.colors.iter().position(|p| p == c).ok_or_else(|| {
                        Error::UnsupportedFormat(format!(
                            "pixel ({}, {}) has color {} which is not in the declared palette",
                            i % width,
                            i / width,
                            c
                        ))
                    })?;
                    pixels.push(idx as ColorIdx);
                }
                (Palette::new(declared.colors), pixels)
            }
            _ => {
                let mut quantizer = Quantizer::new();
                quantizer.add(colors.iter().copied());
                let palette = quantizer.reduced_palette(max_colors)?;
                let pixels = colors
                    .iter()
                    .map(|&c| quantizer.nearest_index(c).map(|i| i as ColorIdx))
                    .collect::<Result<Vec<_>>>()?;
                (Palette::new(palette), pixels)
            }
        };
        debug!(
            "Sprite {}x{} with {} colors",
            width,
            height,
            palette.len()
        );
        Ok(Self::from_parts(width, height, pixels, Arc::new(palette)))
    }

    /// Copies a region of `source`. Cells outside the source read as index 0.
    /// The palette is shared with `source`.
    pub fn from_region(source: &Sprite, x: i64, y: i64, width: usize, height: usize) -> Self {
        let mut pixels = vec![0; width * height];
        for dy in 0..height {
            let Some(sy) = region_coord(y, dy, source.height) else {
                continue;
            };
            for dx in 0..width {
                if let Some(sx) = region_coord(x, dx, source.width) {
                    pixels[dy * width + dx] = source.pixels[sy * source.width + sx];
                }
            }
        }
        Self::from_parts(width, height, pixels, Arc::clone(&source.palette))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.staging, Staging::Locked)
    }

    /// Enters write staging. Locking a locked sprite does nothing.
    pub fn lock(&mut self) {
        self.staging = Staging::Locked;
    }

    /// Re-renders the RGB cache and leaves write staging.
    pub fn unlock(&mut self) {
        let rendered = render(&self.pixels, &self.palette);
        self.staging = Staging::Unlocked { rendered };
    }

    /// Locks the sprite for the lifetime of the returned guard.
    pub fn edit(&mut self) -> SpriteLock<'_> {
        self.lock();
        SpriteLock { sprite: self }
    }

    fn offset(&self, x: PixelCoord, y: PixelCoord) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(Error::InvalidInput(format!(
                "pixel ({}, {}) outside {}x{} sprite",
                x, y, self.width, self.height
            )));
        }
        Ok(y * self.width + x)
    }

    pub fn get_pixel(&self, x: PixelCoord, y: PixelCoord) -> Result<ColorIdx> {
        Ok(self.pixels[self.offset(x, y)?])
    }

    pub fn set_pixel(&mut self, x: PixelCoord, y: PixelCoord, idx: ColorIdx) -> Result<()> {
        if !self.is_locked() {
            return Err(Error::StateViolation("sprite must be locked before writing pixels"));
        }
        if idx as usize >= self.palette.len() {
            return Err(Error::InvalidInput(format!(
                "color {} outside {}-color palette",
                idx,
                self.palette.len()
            )));
        }
        let offset = self.offset(x, y)?;
        self.pixels[offset] = idx;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        if !self.is_locked() {
            return Err(Error::StateViolation("sprite must be locked before clearing"));
        }
        self.pixels.fill(0);
        Ok(())
    }

    /// Exchanges palette slots `a` and `b`. With `remap_pixels` every pixel
    /// using one of them is switched to the other, so the sprite looks the
    /// same; without it the two colors trade places on screen.
    pub fn swap_colors(&mut self, a: ColorIdx, b: ColorIdx, remap_pixels: bool) -> Result<()> {
        let len = self.palette.len();
        for idx in [a, b] {
            if idx as usize >= len {
                return Err(Error::InvalidInput(format!(
                    "color {} outside {}-color palette",
                    idx, len
                )));
            }
        }
        Arc::make_mut(&mut self.palette)
            .colors
            .swap(a as usize, b as usize);
        if remap_pixels {
            for p in self.pixels.iter_mut() {
                if *p == a {
                    *p = b;
                } else if *p == b {
                    *p = a;
                }
            }
        }
        if !self.is_locked() {
            self.unlock();
        }
        Ok(())
    }

    /// Pixel-wise equality with `other` viewed under the given flips.
    pub fn compare(&self, other: &Sprite, flip_x: bool, flip_y: bool) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        let flip = Flip::from_flags(flip_x, flip_y);
        for y in 0..self.height {
            for x in 0..self.width {
                let (sx, sy) = flip.source_coords(x, y, self.width, self.height);
                if self.pixels[y * self.width + x] != other.pixels[sy * other.width + sx] {
                    return false;
                }
            }
        }
        true
    }

    /// The RGB rendering. Only valid while unlocked.
    pub fn rendered(&self) -> Result<&[Color]> {
        match &self.staging {
            Staging::Unlocked { rendered } => Ok(rendered),
            Staging::Locked => Err(Error::StateViolation(
                "sprite is locked; its rendering is stale until unlocked",
            )),
        }
    }

    /// Snapshot for the encoders. Refused while locked.
    pub fn to_image(&self) -> Result<IndexedImage> {
        if self.is_locked() {
            return Err(Error::StateViolation("cannot save a sprite while it is locked"));
        }
        Ok(IndexedImage {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
            palette: (*self.palette).clone(),
        })
    }
}

/// Write access to a sprite. Dropping it unlocks and re-renders.
pub struct SpriteLock<'a> {
    sprite: &'a mut Sprite,
}

impl SpriteLock<'_> {
    pub fn get_pixel(&self, x: PixelCoord, y: PixelCoord) -> Result<ColorIdx> {
        self.sprite.get_pixel(x, y)
    }

    pub fn set_pixel(&mut self, x: PixelCoord, y: PixelCoord, idx: ColorIdx) -> Result<()> {
        self.sprite.set_pixel(x, y, idx)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.sprite.clear()
    }
}

impl Drop for SpriteLock<'_> {
    fn drop(&mut self) {
        self.sprite.unlock();
    }
}
