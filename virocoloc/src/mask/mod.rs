//! Instance label masks and the binary-mask operations built on them.

mod labeling;
mod morphology;
mod region;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use common::{BitBuffer2, Buffer2};
use serde::{Deserialize, Serialize};

pub use labeling::{label, Connectivity};
pub use morphology::{dilate, erode_cross};
pub use region::{BoundingBox, Region, RegionProperties};

/// Integer image where 0 is background and each positive value tags one
/// object instance. Tags need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMask(Buffer2<u32>);

impl LabelMask {
    pub fn new(labels: Buffer2<u32>) -> Self {
        Self(labels)
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self(Buffer2::new_default(width, height))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.0.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.0.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        self.0.dimensions()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        *self.0.get(x, y)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, tag: u32) {
        *self.0.get_mut(x, y) = tag;
    }

    pub fn buffer(&self) -> &Buffer2<u32> {
        &self.0
    }

    pub fn into_buffer(self) -> Buffer2<u32> {
        self.0
    }

    /// Distinct positive tags, ascending.
    pub fn tags(&self) -> Vec<u32> {
        self.tag_set().into_iter().collect()
    }

    pub fn count_distinct_tags(&self) -> usize {
        self.tag_set().len()
    }

    pub fn max_tag(&self) -> u32 {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// True when no pixel carries a tag.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&tag| tag == 0)
    }

    /// Foreground footprint: set wherever the tag is positive.
    pub fn binary(&self) -> BitBuffer2 {
        let mut bits = BitBuffer2::new_default(self.width(), self.height());
        for (idx, &tag) in self.0.iter().enumerate() {
            if tag != 0 {
                bits.set(idx, true);
            }
        }
        bits
    }

    /// Pixel count per positive tag.
    pub fn area_by_tag(&self) -> BTreeMap<u32, usize> {
        let mut areas = BTreeMap::new();
        for &tag in self.0.iter().filter(|&&tag| tag != 0) {
            *areas.entry(tag).or_insert(0) += 1;
        }
        areas
    }

    /// Distinct positive tags found under the set pixels of `footprint`.
    pub fn masked_tags(&self, footprint: &BitBuffer2) -> BTreeSet<u32> {
        assert_same_shape(self, footprint);
        footprint
            .iter_ones()
            .map(|(x, y)| self.get(x, y))
            .filter(|&tag| tag != 0)
            .collect()
    }

    /// Copy of this mask keeping only the pixels under `footprint`.
    pub fn masked_by(&self, footprint: &BitBuffer2) -> LabelMask {
        assert_same_shape(self, footprint);
        let mut out = LabelMask::zeros(self.width(), self.height());
        for (x, y) in footprint.iter_ones() {
            out.set(x, y, self.get(x, y));
        }
        out
    }

    fn tag_set(&self) -> BTreeSet<u32> {
        self.0.iter().copied().filter(|&tag| tag != 0).collect()
    }
}

/// Zero every component with fewer than `min_size` pixels. Surviving tags
/// keep their values.
pub fn remove_small_objects(mask: &LabelMask, min_size: usize) -> LabelMask {
    if min_size == 0 {
        return mask.clone();
    }
    let small: BTreeSet<u32> = mask
        .area_by_tag()
        .into_iter()
        .filter(|&(_, area)| area < min_size)
        .map(|(tag, _)| tag)
        .collect();
    remove_tags(mask, &small)
}

/// Copy of `mask` with every pixel of the given tags set to background.
pub fn remove_tags(mask: &LabelMask, tags: &BTreeSet<u32>) -> LabelMask {
    let mut out = mask.clone();
    if tags.is_empty() {
        return out;
    }
    for tag in out.0.iter_mut() {
        if tags.contains(tag) {
            *tag = 0;
        }
    }
    out
}

fn assert_same_shape(mask: &LabelMask, footprint: &BitBuffer2) {
    assert_eq!(
        mask.dimensions(),
        (footprint.width(), footprint.height()),
        "mask and footprint dimensions differ"
    );
}
