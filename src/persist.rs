use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use json_pretty_compact::PrettyCompactFormatter;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Serializer;

use crate::{
    bitmap::{decode_bitmap, encode_bitmap, BitDepth},
    common::TileIdx,
    config::ConvertConfig,
    import::ImportedImage,
    snes::{encode_palette, encode_tilemap, encode_tiles, TileFormat},
    source::{PixelSource, PngSource},
    tile::Flip,
};

fn json_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let formatter = PrettyCompactFormatter::new();
    let mut data_bytes = vec![];
    let mut ser = Serializer::with_formatter(&mut data_bytes, formatter);
    data.serialize(&mut ser)?;
    Ok(data_bytes)
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    info!("Saving {}", path.display());
    write_bytes(path, &json_bytes(data)?)
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    info!("Loading {}", path.display());
    let data_bytes = std::fs::read(path)?;
    let data: T = serde_json::from_slice(&data_bytes)?;
    Ok(data)
}

// The file is closed when the writer goes out of scope, on every path.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    info!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Decodes an input image, picking the decoder from the file extension.
pub fn load_image(path: &Path) -> Result<Box<dyn PixelSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => Ok(Box::new(PngSource::open(path)?)),
        Some("bmp") => {
            info!("Loading {}", path.display());
            let bytes = fs::read(path)?;
            Ok(Box::new(decode_bitmap(&bytes)?))
        }
        _ => bail!("Unsupported input file: {}", path.display()),
    }
}

/// Summary of a conversion, written next to the binary outputs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub source: String,
    pub width_tiles: usize,
    pub height_tiles: usize,
    pub unique_tiles: usize,
    pub columns: usize,
    pub bitmap_depth: Option<BitDepth>,
    pub tile_format: Option<TileFormat>,
    pub palette: Vec<String>,
    pub tilemap: Vec<(TileIdx, Flip)>,
}

// Appends `.ext` without touching dots already in the file name.
pub fn sibling(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

pub fn output_base(input: &Path, config: &ConvertConfig) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .context("input path has no file name")?;
    let dir = match &config.output_dir {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    Ok(dir.join(stem))
}

/// Writes every output enabled in `config` next to `base` (a path without
/// extension). All outputs are encoded before the first file is written, so
/// a failing encoder leaves nothing behind.
pub fn export_all(
    imported: &ImportedImage,
    source: &Path,
    base: &Path,
    config: &ConvertConfig,
) -> Result<Manifest> {
    let tileset = &imported.tileset;
    let tilemap = &imported.tilemap;
    let columns = match config.columns {
        Some(c) => c,
        None => tileset.default_columns(16),
    };

    let mut manifest = Manifest {
        source: source.display().to_string(),
        width_tiles: tilemap.width(),
        height_tiles: tilemap.height(),
        unique_tiles: tileset.len(),
        columns,
        bitmap_depth: None,
        tile_format: None,
        palette: tileset
            .palette()
            .colors
            .iter()
            .map(|c| c.to_string())
            .collect(),
        tilemap: tilemap
            .entries()
            .iter()
            .map(|e| (e.index, e.flip))
            .collect(),
    };

    let mut outputs: Vec<(PathBuf, Vec<u8>)> = vec![];
    if config.write_bitmap {
        let image = tileset.to_image(columns)?;
        outputs.push((sibling(base, "bmp"), encode_bitmap(&image)?));
        let full = tilemap.render(tileset)?;
        outputs.push((sibling(base, "map.bmp"), encode_bitmap(&full)?));
        manifest.bitmap_depth = Some(BitDepth::for_palette_len(tileset.palette().len()));
    }
    if config.write_tiles {
        let (format, data) = encode_tiles(tileset)?;
        outputs.push((sibling(base, "chr"), data));
        manifest.tile_format = Some(format);
    }
    if config.write_tilemap {
        outputs.push((sibling(base, "map"), encode_tilemap(tilemap)?));
    }
    if config.write_palette {
        outputs.push((sibling(base, "pal"), encode_palette(tileset.palette())?));
    }
    if config.write_manifest {
        outputs.push((sibling(base, "json"), json_bytes(&manifest)?));
    }

    for (path, data) in &outputs {
        write_bytes(path, data)?;
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_bytes_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.bin");
        write_bytes(&path, &[1, 2, 3]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn output_base_uses_output_dir() {
        let config = ConvertConfig {
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let base = output_base(Path::new("art/hero.png"), &config).unwrap();
        assert_eq!(base, PathBuf::from("out/hero"));
        let base = output_base(Path::new("art/hero.png"), &ConvertConfig::default()).unwrap();
        assert_eq!(sibling(&base, "chr"), PathBuf::from("art/hero.chr"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(load_image(Path::new("image.gif")).is_err());
    }
}
