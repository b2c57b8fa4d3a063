use std::sync::Arc;

use pretty_assertions::assert_eq;
use snes_tiler::{
    common::{Color, Palette},
    sprite::Sprite,
    tile::{Flip, Tile},
    Error,
};

fn palette() -> Arc<Palette> {
    Arc::new(Palette::new(vec![
        Color::new(0, 0, 0),
        Color::new(255, 0, 0),
        Color::new(0, 0, 255),
    ]))
}

#[test]
fn writes_require_a_lock() {
    let mut sprite = Sprite::new(4, 4, palette()).unwrap();
    assert!(matches!(sprite.set_pixel(0, 0, 1), Err(Error::StateViolation(_))));
    {
        let mut lock = sprite.edit();
        lock.set_pixel(1, 2, 1).unwrap();
        assert_eq!(lock.get_pixel(1, 2).unwrap(), 1);
    }
    assert!(!sprite.is_locked());
    assert_eq!(sprite.rendered().unwrap()[2 * 4 + 1], Color::new(255, 0, 0));
}

#[test]
fn locked_sprite_has_no_rendering() {
    let mut sprite = Sprite::new(2, 2, palette()).unwrap();
    sprite.lock();
    sprite.set_pixel(0, 0, 2).unwrap();
    assert!(sprite.rendered().is_err());
    assert!(sprite.to_image().is_err());
    sprite.unlock();
    assert_eq!(sprite.to_image().unwrap().pixels, vec![2, 0, 0, 0]);
}

#[test]
fn regions_share_the_palette() {
    let mut tile = Tile::default();
    tile.set(7, 0, 1);
    let sprite = Sprite::from_tile(&tile, palette()).unwrap();
    let region = Sprite::from_region(&sprite, 4, -2, 4, 4);
    assert!(Arc::ptr_eq(region.palette(), sprite.palette()));
    assert_eq!(region.get_pixel(3, 2).unwrap(), 1);
    assert_eq!(region.get_pixel(3, 0).unwrap(), 0);
}

#[test]
fn swap_colors_copies_a_shared_palette() {
    let shared = palette();
    let mut sprite = Sprite::new(1, 1, Arc::clone(&shared)).unwrap();
    sprite.swap_colors(1, 2, false).unwrap();
    assert_eq!(shared.colors[1], Color::new(255, 0, 0));
    assert_eq!(sprite.palette().colors[1], Color::new(0, 0, 255));
}

#[test]
fn mirrored_sprites_compare_equal_under_flip() {
    let mut tile = Tile::default();
    tile.set(0, 0, 1);
    let left = Sprite::from_tile(&tile, palette()).unwrap();
    let right = Sprite::from_tile(&tile.flipped(Flip::Horizontal), palette()).unwrap();
    assert!(!left.compare(&right, false, false));
    assert!(left.compare(&right, true, false));
}
