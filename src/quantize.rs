// Octree color reduction.
//
// Colors are inserted into an 8-level tree keyed by successive RGB bit-planes,
// most significant bit first. Every node accumulates the channel sums and pixel
// count of all colors passing through it, so collapsing a node into a leaf never
// needs to revisit its children. Nodes live in a flat arena and refer to their
// children by index.
use std::cmp::Reverse;

use itertools::Itertools;
use log::debug;

use crate::{
    common::{Color, ColorIdx, Palette},
    error::{Error, Result},
};

const MAX_DEPTH: u8 = 8;

#[derive(Clone, Debug, Default)]
struct Node {
    red: u64,
    green: u64,
    blue: u64,
    pixel_count: u64,
    children: [Option<usize>; 8],
    level: u8,
    leaf: bool,
    first_seen: u64,
}

impl Node {
    fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    fn average(&self) -> Color {
        let n = self.pixel_count.max(1);
        let avg = |sum: u64| ((sum + n / 2) / n) as u8;
        Color::new(avg(self.red), avg(self.green), avg(self.blue))
    }
}

fn child_slot(color: Color, level: u8) -> usize {
    let shift = 7 - level;
    let r = ((color.red >> shift) & 1) as usize;
    let g = ((color.green >> shift) & 1) as usize;
    let b = ((color.blue >> shift) & 1) as usize;
    r << 2 | g << 1 | b
}

#[derive(Clone, Debug)]
pub struct Quantizer {
    nodes: Vec<Node>,
    leaf_count: usize,
    inserted: u64,
    palette: Vec<Color>,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Quantizer {
    pub fn new() -> Self {
        Quantizer {
            nodes: vec![Node::default()],
            leaf_count: 0,
            inserted: 0,
            palette: vec![],
        }
    }

    pub fn add(&mut self, colors: impl IntoIterator<Item = Color>) {
        for color in colors {
            self.add_color(color);
        }
    }

    fn add_color(&mut self, color: Color) {
        let seq = self.inserted;
        self.inserted += 1;
        let mut idx = 0;
        loop {
            let node = &mut self.nodes[idx];
            node.red += color.red as u64;
            node.green += color.green as u64;
            node.blue += color.blue as u64;
            node.pixel_count += 1;
            if node.level == MAX_DEPTH {
                if !node.leaf {
                    node.leaf = true;
                    self.leaf_count += 1;
                }
                return;
            }
            let level = node.level;
            let slot = child_slot(color, level);
            idx = match self.nodes[idx].children[slot] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node {
                        level: level + 1,
                        first_seen: seq,
                        ..Default::default()
                    });
                    self.nodes[idx].children[slot] = Some(child);
                    child
                }
            };
        }
    }

    pub fn color_count(&self) -> usize {
        self.leaf_count
    }

    /// Reduces the accumulated colors to at most `max_colors` representatives.
    ///
    /// The deepest reducible node with the fewest pixels is collapsed first
    /// (ties go to the node created earliest) until few enough leaves remain.
    /// The result is ordered by when each surviving leaf was first reached,
    /// so a color set that already fits comes back exactly as inserted. The
    /// palette is kept for later `nearest_index` calls.
    pub fn reduced_palette(&mut self, max_colors: usize) -> Result<Vec<Color>> {
        if max_colors == 0 {
            return Err(Error::InvalidInput(
                "cannot reduce a palette to zero colors".to_string(),
            ));
        }
        let mut nodes = self.nodes.clone();
        let mut leaf_count = self.leaf_count;

        // Subtree sums never change while collapsing, so the merge order of
        // each level can be fixed up front.
        let mut by_level: Vec<Vec<usize>> = vec![vec![]; MAX_DEPTH as usize];
        for (i, node) in nodes.iter().enumerate() {
            if node.level < MAX_DEPTH && node.has_children() {
                by_level[node.level as usize].push(i);
            }
        }
        'levels: for level in (0..MAX_DEPTH as usize).rev() {
            let order = by_level[level]
                .iter()
                .copied()
                .sorted_by_key(|&i| (nodes[i].pixel_count, i))
                .collect_vec();
            for i in order {
                if leaf_count <= max_colors {
                    break 'levels;
                }
                let children = nodes[i].children.iter().flatten().count();
                nodes[i].children = [None; 8];
                nodes[i].leaf = true;
                leaf_count = leaf_count + 1 - children;
            }
        }

        let mut leaves = vec![];
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let node = &nodes[i];
            if node.leaf {
                leaves.push(i);
            } else {
                stack.extend(node.children.iter().flatten());
            }
        }
        leaves.sort_by_key(|&i| (nodes[i].first_seen, Reverse(nodes[i].level)));
        self.palette = leaves.iter().map(|&i| nodes[i].average()).collect();
        debug!(
            "Reduced {} colors to {} (limit {})",
            self.leaf_count,
            self.palette.len(),
            max_colors
        );
        Ok(self.palette.clone())
    }

    /// Index of the closest color in the last reduced palette, by squared
    /// RGB distance. Ties go to the lower index.
    pub fn nearest_index(&self, color: Color) -> Result<usize> {
        nearest_in(&self.palette, color)
            .ok_or(Error::StateViolation("no reduced palette has been computed"))
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }
}

pub fn nearest_in(palette: &[Color], color: Color) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &c) in palette.iter().enumerate() {
        let d = c.distance_sq(color);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Result of shrinking an indexed palette: the new palette and, for every old
/// index, the new index it maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteReduction {
    pub palette: Palette,
    pub mapping: Vec<ColorIdx>,
}

/// Reduces `palette` to at most `max_colors` entries, weighting each color by
/// how often it occurs in `cells` (scanned in the given order). A palette that
/// already fits is returned unchanged with an identity mapping.
pub fn reduce_palette(
    palette: &Palette,
    cells: impl IntoIterator<Item = ColorIdx>,
    max_colors: usize,
) -> Result<PaletteReduction> {
    if max_colors == 0 {
        return Err(Error::InvalidInput(
            "cannot reduce a palette to zero colors".to_string(),
        ));
    }
    if palette.len() <= max_colors {
        return Ok(PaletteReduction {
            palette: palette.clone(),
            mapping: (0..palette.len() as ColorIdx).collect(),
        });
    }
    let mut quantizer = Quantizer::new();
    for idx in cells {
        let color = palette.get(idx).ok_or_else(|| {
            Error::InvalidInput(format!(
                "color index {} outside {}-color palette",
                idx,
                palette.len()
            ))
        })?;
        quantizer.add_color(color);
    }
    let reduced = quantizer.reduced_palette(max_colors)?;
    if reduced.is_empty() {
        return Err(Error::InvalidInput("no pixels to quantize".to_string()));
    }
    let mapping = palette
        .colors
        .iter()
        .map(|&c| quantizer.nearest_index(c).map(|i| i as ColorIdx))
        .collect::<Result<Vec<_>>>()?;
    Ok(PaletteReduction {
        palette: Palette::new(reduced),
        mapping,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors(n: u8) -> Vec<Color> {
        (0..n).map(|i| Color::new(i * 16, 255 - i * 16, i * 7)).collect()
    }

    #[test]
    fn never_exceeds_max_colors() {
        let mut q = Quantizer::new();
        q.add((0..=255u8).map(|v| Color::new(v, v / 2, 255 - v)));
        for max in [1, 2, 3, 7, 16, 100] {
            let pal = q.reduced_palette(max).unwrap();
            assert!(pal.len() <= max, "{} > {}", pal.len(), max);
            assert!(!pal.is_empty());
        }
    }

    #[test]
    fn small_color_sets_come_back_unchanged() {
        let input = colors(10);
        let mut q = Quantizer::new();
        q.add(input.iter().copied());
        q.add(input.iter().rev().copied());
        assert_eq!(q.reduced_palette(10).unwrap(), input);
        assert_eq!(q.reduced_palette(256).unwrap(), input);
        assert_eq!(q.color_count(), 10);
        assert_eq!(q.palette(), &input[..]);
    }

    #[test]
    fn reduction_is_deterministic() {
        let input: Vec<Color> = (0..500u32)
            .map(|i| Color::new((i * 37 % 256) as u8, (i * 11 % 256) as u8, (i % 256) as u8))
            .collect();
        let mut a = Quantizer::new();
        let mut b = Quantizer::new();
        a.add(input.iter().copied());
        b.add(input.iter().copied());
        assert_eq!(a.reduced_palette(16).unwrap(), b.reduced_palette(16).unwrap());
    }

    #[test]
    fn rare_colors_merge_before_common_ones() {
        let mut q = Quantizer::new();
        q.add(std::iter::repeat(Color::new(255, 0, 0)).take(100));
        q.add(std::iter::repeat(Color::new(0, 0, 255)).take(100));
        q.add([Color::new(0, 0, 250), Color::new(0, 0, 251)]);
        let pal = q.reduced_palette(2).unwrap();
        assert_eq!(pal.len(), 2);
        assert_eq!(pal[0], Color::new(255, 0, 0));
        assert_eq!(q.nearest_index(Color::new(0, 0, 200)).unwrap(), 1);
    }

    #[test]
    fn zero_colors_is_rejected() {
        let mut q = Quantizer::new();
        q.add(colors(3));
        assert!(matches!(q.reduced_palette(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn nearest_index_needs_a_palette() {
        let q = Quantizer::new();
        assert!(matches!(
            q.nearest_index(Color::BLACK),
            Err(Error::StateViolation(_))
        ));
    }

    #[test]
    fn nearest_ties_pick_first_entry() {
        let pal = [Color::new(0, 0, 0), Color::new(10, 0, 0), Color::new(0, 0, 0)];
        assert_eq!(nearest_in(&pal, Color::new(5, 0, 0)), Some(0));
        assert_eq!(nearest_in(&pal, Color::new(9, 0, 0)), Some(1));
        assert_eq!(nearest_in(&[], Color::BLACK), None);
    }

    #[test]
    fn reduce_palette_maps_every_old_index() {
        let palette = Palette::new(colors(8));
        let cells: Vec<ColorIdx> = (0..8).cycle().take(64).collect();
        let reduction = reduce_palette(&palette, cells, 4).unwrap();
        assert!(reduction.palette.len() <= 4);
        assert_eq!(reduction.mapping.len(), 8);
        assert!(reduction
            .mapping
            .iter()
            .all(|&i| (i as usize) < reduction.palette.len()));

        let same = reduce_palette(&palette, vec![0, 1], 8).unwrap();
        assert_eq!(same.palette, palette);
        assert_eq!(same.mapping, (0..8).collect::<Vec<ColorIdx>>());
    }
}
