// Windows bitmap (BMP) encoding and decoding.
//
// Layout, all little-endian:
// - 14-byte file header: `BM`, total file size (u32), 4 reserved bytes
//   (zero), pixel data offset (u32).
// - 40-byte info header: header size, width, height (positive, rows stored
//   bottom-up), 1 plane, bits per pixel, compression 0, pixel data size,
//   2835 x 2835 pixels per meter, color table entry count, 0 important colors.
// - Color table (indexed depths only): blue, green, red, 255 per entry,
//   padded with black to the full 2/16/256 entries.
// - Pixel rows, each padded to a multiple of 4 bytes. Indexed rows pack
//   pixels most significant bits first; 24-bit rows store blue, green, red.
use hashbrown::{hash_map::Entry, HashMap};
use serde::{Deserialize, Serialize};

use crate::{
    common::{Color, ColorIdx, IndexedImage, Palette, PixelCoord},
    error::{Error, Result},
    source::{IndexedPalette, PixelSource},
};

pub const FILE_HEADER_SIZE: usize = 14;
pub const INFO_HEADER_SIZE: usize = 40;
const PIXELS_PER_METER: u32 = 2835;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    One,
    Four,
    Eight,
    TwentyFour,
}

impl BitDepth {
    /// Smallest depth the writer uses for a palette of `len` colors.
    pub fn for_palette_len(len: usize) -> Self {
        match len {
            0..=16 => BitDepth::Four,
            17..=256 => BitDepth::Eight,
            _ => BitDepth::TwentyFour,
        }
    }

    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            1 => Some(BitDepth::One),
            4 => Some(BitDepth::Four),
            8 => Some(BitDepth::Eight),
            24 => Some(BitDepth::TwentyFour),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BitDepth::One => 1,
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
            BitDepth::TwentyFour => 24,
        }
    }

    // Number of color table entries; zero for direct color.
    pub fn table_len(self) -> usize {
        match self {
            BitDepth::TwentyFour => 0,
            d => 1 << d.bits(),
        }
    }

    pub fn row_stride(self, width: usize) -> usize {
        (width * self.bits() as usize).div_ceil(32) * 4
    }
}

/// Encodes `image` at the depth its palette size calls for.
pub fn encode_bitmap(image: &IndexedImage) -> Result<Vec<u8>> {
    encode_bitmap_as(image, BitDepth::for_palette_len(image.palette.len()))
}

pub fn encode_bitmap_as(image: &IndexedImage, depth: BitDepth) -> Result<Vec<u8>> {
    if image.width == 0 || image.height == 0 {
        return Err(Error::InvalidInput(format!(
            "cannot encode a {}x{} bitmap",
            image.width, image.height
        )));
    }
    let table_len = depth.table_len();
    if depth != BitDepth::TwentyFour && image.palette.len() > table_len {
        return Err(Error::CapacityExceeded {
            what: "bitmap color table",
            count: image.palette.len(),
            limit: table_len,
        });
    }
    image.check_indices()?;

    let stride = depth.row_stride(image.width);
    let data_size = stride * image.height;
    let data_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE + table_len * 4;
    let file_size = data_offset + data_size;

    let mut out: Vec<u8> = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(data_offset as u32).to_le_bytes());

    out.extend_from_slice(&(INFO_HEADER_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&(image.width as i32).to_le_bytes());
    out.extend_from_slice(&(image.height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&depth.bits().to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(data_size as u32).to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&(table_len as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for c in image.palette.padded(table_len).colors.iter().take(table_len) {
        out.extend_from_slice(&[c.blue, c.green, c.red, 255]);
    }

    let mut row = vec![0u8; stride];
    for y in (0..image.height).rev() {
        row.fill(0);
        pack_row(image, y, depth, &mut row)?;
        out.extend_from_slice(&row);
    }
    Ok(out)
}

fn pack_row(image: &IndexedImage, y: PixelCoord, depth: BitDepth, row: &mut [u8]) -> Result<()> {
    match depth {
        BitDepth::TwentyFour => {
            for x in 0..image.width {
                let c = image.color_at(x, y)?;
                row[x * 3..x * 3 + 3].copy_from_slice(&[c.blue, c.green, c.red]);
            }
        }
        _ => {
            let bits = depth.bits() as usize;
            for x in 0..image.width {
                let bit = x * bits;
                row[bit / 8] |= (image.get(x, y) as u8) << (8 - bits - bit % 8);
            }
        }
    }
    Ok(())
}

/// A decoded bitmap. Indexed files keep their color table as the palette;
/// 24-bit files get a palette of their distinct colors in first-seen order
/// (top row first).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedBitmap {
    pub image: IndexedImage,
    pub depth: BitDepth,
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    let b = bytes
        .get(offset..offset + 2)
        .ok_or_else(|| Error::UnsupportedFormat("bitmap truncated".to_string()))?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let b = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| Error::UnsupportedFormat("bitmap truncated".to_string()))?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn decode_bitmap(bytes: &[u8]) -> Result<DecodedBitmap> {
    if bytes.get(0..2) != Some(b"BM") {
        return Err(Error::UnsupportedFormat("missing BM signature".to_string()));
    }
    let data_offset = read_u32(bytes, 10)? as usize;
    let header_size = read_u32(bytes, 14)? as usize;
    if header_size < INFO_HEADER_SIZE {
        return Err(Error::UnsupportedFormat(format!(
            "bitmap info header of {} bytes",
            header_size
        )));
    }
    let width = read_u32(bytes, 18)? as i32;
    let height = read_u32(bytes, 22)? as i32;
    let bits = read_u16(bytes, 28)?;
    let compression = read_u32(bytes, 30)?;
    let colors_used = read_u32(bytes, 46)? as usize;
    if width <= 0 || height == 0 {
        return Err(Error::InvalidInput(format!(
            "bitmap is {}x{}",
            width, height
        )));
    }
    if compression != 0 {
        return Err(Error::UnsupportedFormat(format!(
            "compressed bitmap (method {})",
            compression
        )));
    }
    let depth = BitDepth::from_bits(bits)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{}-bit bitmap", bits)))?;
    let width = width as usize;
    let bottom_up = height > 0;
    let height = height.unsigned_abs() as usize;

    let table_offset = FILE_HEADER_SIZE + header_size;
    let table_len = match (depth, colors_used) {
        (BitDepth::TwentyFour, _) => 0,
        (d, 0) => d.table_len(),
        (d, n) => n.min(d.table_len()),
    };
    let mut palette = Palette::default();
    for i in 0..table_len {
        let e = bytes
            .get(table_offset + i * 4..table_offset + i * 4 + 3)
            .ok_or_else(|| Error::UnsupportedFormat("bitmap color table truncated".to_string()))?;
        palette.colors.push(Color::new(e[2], e[1], e[0]));
    }

    let stride = depth.row_stride(width);
    let end = data_offset + stride * height;
    if bytes.len() < end {
        return Err(Error::UnsupportedFormat(format!(
            "bitmap pixel data truncated ({} of {} bytes)",
            bytes.len(),
            end
        )));
    }
    let mut image = IndexedImage::new(width, height, palette);
    let mut seen: HashMap<Color, ColorIdx> = HashMap::new();
    for y in 0..height {
        let file_row = if bottom_up { height - 1 - y } else { y };
        let row = &bytes[data_offset + file_row * stride..data_offset + (file_row + 1) * stride];
        for x in 0..width {
            let idx = match depth {
                BitDepth::TwentyFour => {
                    let c = Color::new(row[x * 3 + 2], row[x * 3 + 1], row[x * 3]);
                    match seen.entry(c) {
                        Entry::Occupied(e) => *e.get(),
                        Entry::Vacant(e) => {
                            let idx = image.palette.len() as ColorIdx;
                            image.palette.colors.push(c);
                            *e.insert(idx)
                        }
                    }
                }
                _ => {
                    let bits = depth.bits() as usize;
                    let bit = x * bits;
                    let mask = ((1u16 << bits) - 1) as u8;
                    ((row[bit / 8] >> (8 - bits - bit % 8)) & mask) as ColorIdx
                }
            };
            image.set(x, y, idx);
        }
    }
    image.check_indices().map_err(|e| {
        Error::UnsupportedFormat(format!("bitmap pixel outside color table: {}", e))
    })?;
    Ok(DecodedBitmap { image, depth })
}

impl PixelSource for DecodedBitmap {
    fn width(&self) -> usize {
        self.image.width
    }

    fn height(&self) -> usize {
        self.image.height
    }

    fn pixel(&self, x: PixelCoord, y: PixelCoord) -> Color {
        self.image.palette.colors[self.image.get(x, y) as usize]
    }

    fn indexed(&self) -> Option<IndexedPalette> {
        match self.depth {
            BitDepth::TwentyFour => None,
            d => Some(IndexedPalette {
                bit_depth: d.bits() as u8,
                colors: self.image.palette.colors.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image(width: usize, height: usize, colors: usize) -> IndexedImage {
        let palette = Palette::new(
            (0..colors)
                .map(|i| Color::new(i as u8, (i * 3) as u8, (i * 7) as u8))
                .collect(),
        );
        let mut img = IndexedImage::new(width, height, palette);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, ((x + y * 3) % colors) as ColorIdx);
            }
        }
        img
    }

    #[test]
    fn picks_depth_from_palette_size() {
        assert_eq!(BitDepth::for_palette_len(3), BitDepth::Four);
        assert_eq!(BitDepth::for_palette_len(16), BitDepth::Four);
        assert_eq!(BitDepth::for_palette_len(17), BitDepth::Eight);
        assert_eq!(BitDepth::for_palette_len(256), BitDepth::Eight);
        assert_eq!(BitDepth::for_palette_len(257), BitDepth::TwentyFour);
    }

    #[test]
    fn three_color_palette_writes_sixteen_entry_table() {
        let img = image(8, 8, 3);
        let bytes = encode_bitmap(&img).unwrap();
        assert_eq!(read_u16(&bytes, 28).unwrap(), 4);
        assert_eq!(read_u32(&bytes, 46).unwrap(), 16);
        let table = &bytes[54..54 + 16 * 4];
        assert_eq!(&table[4..8], &[7, 3, 1, 255]);
        for entry in table[12..].chunks(4) {
            assert_eq!(entry, &[0, 0, 0, 255]);
        }
        // 8 pixels at 4 bits = 4 bytes per row, already aligned.
        assert_eq!(bytes.len(), 54 + 64 + 4 * 8);
        assert_eq!(read_u32(&bytes, 10).unwrap(), 54 + 64);
        assert_eq!(read_u32(&bytes, 2).unwrap() as usize, bytes.len());
    }

    #[test]
    fn header_fields_are_fixed() {
        let bytes = encode_bitmap(&image(8, 16, 20)).unwrap();
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(read_u32(&bytes, 14).unwrap(), 40);
        assert_eq!(read_u32(&bytes, 18).unwrap(), 8);
        assert_eq!(read_u32(&bytes, 22).unwrap(), 16);
        assert_eq!(read_u16(&bytes, 26).unwrap(), 1);
        assert_eq!(read_u16(&bytes, 28).unwrap(), 8);
        assert_eq!(read_u32(&bytes, 30).unwrap(), 0);
        assert_eq!(read_u32(&bytes, 34).unwrap(), 8 * 16);
        assert_eq!(read_u32(&bytes, 38).unwrap(), 2835);
        assert_eq!(read_u32(&bytes, 42).unwrap(), 2835);
        assert_eq!(read_u32(&bytes, 50).unwrap(), 0);
    }

    #[test]
    fn rows_are_bottom_up_and_nibbles_high_first() {
        let mut img = IndexedImage::new(3, 2, Palette::new(vec![Color::BLACK; 16]));
        img.set(0, 0, 1);
        img.set(1, 0, 2);
        img.set(2, 0, 3);
        img.set(0, 1, 0xF);
        let bytes = encode_bitmap(&img).unwrap();
        let data = &bytes[54 + 64..];
        // Bottom row first; odd width puts the last pixel in a high nibble.
        assert_eq!(data, &[0xF0, 0x00, 0x00, 0x00, 0x12, 0x30, 0x00, 0x00]);
    }

    #[test]
    fn direct_color_has_no_table() {
        let img = image(5, 1, 300);
        let bytes = encode_bitmap(&img).unwrap();
        assert_eq!(read_u16(&bytes, 28).unwrap(), 24);
        assert_eq!(read_u32(&bytes, 10).unwrap(), 54);
        assert_eq!(read_u32(&bytes, 46).unwrap(), 0);
        // 5 pixels * 3 bytes = 15, padded to 16.
        assert_eq!(bytes.len(), 54 + 16);
        let c = img.palette.colors[1];
        assert_eq!(&bytes[57..60], &[c.blue, c.green, c.red]);
    }

    #[test]
    fn indexed_round_trip() {
        for colors in [2, 16, 200] {
            let img = image(16, 8, colors);
            let decoded = decode_bitmap(&encode_bitmap(&img).unwrap()).unwrap();
            assert_eq!(decoded.image.pixels, img.pixels);
            let table = BitDepth::for_palette_len(colors).table_len();
            assert_eq!(decoded.image.palette, img.palette.padded(table));
        }
    }

    #[test]
    fn direct_color_round_trip_builds_first_seen_palette() {
        let img = image(4, 4, 300);
        let decoded = decode_bitmap(&encode_bitmap(&img).unwrap()).unwrap();
        assert_eq!(decoded.depth, BitDepth::TwentyFour);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(
                    decoded.image.color_at(x, y).unwrap(),
                    img.color_at(x, y).unwrap()
                );
            }
        }
        assert!(decoded.indexed().is_none());
    }

    #[test]
    fn oversized_palette_for_depth_is_rejected() {
        let img = image(8, 8, 20);
        assert!(matches!(
            encode_bitmap_as(&img, BitDepth::Four),
            Err(Error::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_bitmap(b"PNG").is_err());
        let mut bytes = encode_bitmap(&image(8, 8, 3)).unwrap();
        bytes.truncate(100);
        assert!(matches!(
            decode_bitmap(&bytes),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
