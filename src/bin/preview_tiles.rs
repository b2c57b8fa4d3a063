use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use snes_tiler::{
    bitmap::encode_bitmap,
    common::{Color, Palette},
    persist::write_bytes,
    snes::{decode_palette, decode_tiles, TileFormat},
    tileset::Tileset,
};

/// Render a console character file as a bitmap sheet.
#[derive(Parser, Debug)]
struct Args {
    /// Planar tile data
    chr: PathBuf,

    /// Bits per pixel of the tile data (4 or 8)
    #[arg(long, default_value_t = 4)]
    bpp: u8,

    /// BGR555 palette; a grayscale ramp is used without one
    #[arg(long)]
    palette: Option<PathBuf>,

    #[arg(long)]
    columns: Option<usize>,

    #[arg(short, long)]
    output: PathBuf,
}

fn grayscale(count: usize) -> Palette {
    let step = 255 / (count - 1).max(1);
    Palette::new(
        (0..count)
            .map(|i| {
                let v = (i * step) as u8;
                Color::new(v, v, v)
            })
            .collect(),
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let Some(format) = TileFormat::from_bpp(args.bpp) else {
        bail!("Unsupported bit depth {} (expected 4 or 8)", args.bpp);
    };
    let data = std::fs::read(&args.chr).with_context(|| format!("reading {}", args.chr.display()))?;
    let tiles = decode_tiles(&data, format)?;
    if tiles.is_empty() {
        bail!("{} holds no tiles", args.chr.display());
    }
    let palette = match &args.palette {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            decode_palette(&bytes)?.padded(format.color_count())
        }
        None => grayscale(format.color_count()),
    };
    info!("Decoded {} tiles", tiles.len());

    let tileset = Tileset::new(tiles, palette)?;
    let columns = args.columns.unwrap_or_else(|| tileset.default_columns(16));
    let image = tileset.to_image(columns)?;
    write_bytes(&args.output, &encode_bitmap(&image)?)?;
    Ok(())
}
