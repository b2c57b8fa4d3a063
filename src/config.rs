use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{import::ImportOptions, persist::load_json};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConvertConfig {
    pub enable_flip: bool,
    pub max_colors: Option<usize>,
    pub columns: Option<usize>, // Tiles per row in the tileset bitmap
    pub output_dir: Option<PathBuf>,
    pub write_bitmap: bool,
    pub write_tiles: bool,
    pub write_tilemap: bool,
    pub write_palette: bool,
    pub write_manifest: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            enable_flip: true,
            max_colors: None,
            columns: None,
            output_dir: None,
            write_bitmap: true,
            write_tiles: true,
            write_tilemap: true,
            write_palette: true,
            write_manifest: true,
        }
    }
}

impl ConvertConfig {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            enable_flip: self.enable_flip,
            max_colors: self.max_colors,
            ..Default::default()
        }
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("", "", "snes_tiler")
        .context("Unable to open config directory.")?;
    Ok(project_dirs.config_dir().join("config.json"))
}

/// Loads an explicitly given config file, otherwise the per-user one if it
/// exists, otherwise the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ConvertConfig> {
    if let Some(path) = explicit {
        return load_json(path).with_context(|| format!("reading config {}", path.display()));
    }
    match get_config_path() {
        Ok(path) if path.exists() => load_json(&path),
        Ok(_) => Ok(ConvertConfig::default()),
        Err(e) => {
            info!("No user config: {}", e);
            Ok(ConvertConfig::default())
        }
    }
}
