pub mod bitmap;
pub mod common;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod helpers;
pub mod import;
pub mod persist;
pub mod quantize;
pub mod snes;
pub mod source;
pub mod sprite;
pub mod tile;
pub mod tileset;

pub use common::{Color, IndexedImage, Palette};
pub use error::{Error, Result};
pub use import::{import_image, ImportOptions, ImportedImage, Importer};
pub use tile::{Flip, Tile};
pub use tileset::{Tilemap, TilemapEntry, Tileset};
