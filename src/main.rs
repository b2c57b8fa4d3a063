use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};

use snes_tiler::{
    config::{load_config, ConvertConfig},
    import::Importer,
    persist::{export_all, load_image, output_base},
};

/// Convert images into deduplicated SNES tilesets and tilemaps.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Input images (PNG or BMP). Glob patterns are expanded.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Config file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only merge tiles that are identical without mirroring
    #[arg(long)]
    no_flip: bool,

    /// Reduce the palette to at most this many colors
    #[arg(long)]
    max_colors: Option<usize>,

    /// Tiles per row in the tileset bitmap
    #[arg(long)]
    columns: Option<usize>,

    /// Directory for the outputs (defaults to next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print the column counts that lay out the tileset without gaps, then exit
    #[arg(long)]
    list_columns: bool,
}

impl Args {
    fn apply(&self, config: &mut ConvertConfig) {
        if self.no_flip {
            config.enable_flip = false;
        }
        if self.max_colors.is_some() {
            config.max_colors = self.max_colors;
        }
        if self.columns.is_some() {
            config.columns = self.columns;
        }
        if self.out_dir.is_some() {
            config.output_dir = self.out_dir.clone();
        }
    }
}

fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for pattern in patterns {
        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("bad pattern {}", pattern))? {
            paths.push(entry?);
            matched = true;
        }
        if !matched {
            bail!("No files match {}", pattern);
        }
    }
    Ok(paths)
}

fn convert(path: &Path, config: &ConvertConfig, list_columns: bool) -> Result<()> {
    let source = load_image(path)?;
    let imported = Importer::new(config.import_options()).import(&*source)?;
    info!(
        "{}: {} tiles, {} unique, {} colors",
        path.display(),
        imported.tilemap.entries().len(),
        imported.tileset.len(),
        imported.tileset.palette().len()
    );
    if list_columns {
        let columns = imported.tileset.perfect_columns();
        println!(
            "{}: {}",
            path.display(),
            columns
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        return Ok(());
    }
    let base = output_base(path, config)?;
    export_all(&imported, path, &base, config)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    let inputs = expand_inputs(&args.inputs)?;
    let mut failed = 0;
    for path in &inputs {
        if let Err(e) = convert(path, &config, args.list_columns) {
            error!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{} of {} inputs failed", failed, inputs.len());
    }
    Ok(())
}
