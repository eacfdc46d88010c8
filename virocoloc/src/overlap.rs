//! Colocalization between Delta detections and VSV objects.

use common::BitBuffer2;
use serde::{Deserialize, Serialize};

use crate::mask::{dilate, remove_tags, LabelMask, RegionProperties};

/// Radius, in pixels, that Delta centroids are grown by before comparing.
pub const DEFAULT_EXPANSION_DISTANCE: f64 = 2.0;

/// Both directions of the overlap metric for one image pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Colocalization {
    /// Percent of Delta particles touching a VSV object.
    pub delta_on_vsv: f64,
    /// VSV objects touched by a Delta particle, per VSV object, in percent.
    pub vsv_on_delta: f64,
    pub delta_count: usize,
    pub vsv_count: usize,
}

/// Remove every Delta component touching the 3x3 dilation of `removed`,
/// so particles sitting on rejected VSV objects are not counted.
pub fn reconcile(delta: &LabelMask, removed: &BitBuffer2) -> LabelMask {
    let grown = dilate(removed, 1);
    let touching = delta.masked_tags(&grown);
    if !touching.is_empty() {
        tracing::debug!(count = touching.len(), "Dropping Delta particles on removed VSV objects");
    }
    remove_tags(delta, &touching)
}

/// Distinct tags of `b` found under the footprint of `a`, times 100, over
/// the number of distinct tags of `a`. Not symmetric; 0 when `a` is empty.
pub fn overlap_percent(a: &LabelMask, b: &LabelMask) -> f64 {
    let a_count = a.count_distinct_tags();
    if a_count == 0 {
        return 0.0;
    }
    let hits = b.masked_tags(&a.binary()).len();
    hits as f64 * 100.0 / a_count as f64
}

/// One seed pixel per tag at its centroid rounded half to even. Higher
/// tags win when two centroids round to the same pixel.
pub fn centroid_seeds(mask: &LabelMask) -> LabelMask {
    let (width, height) = mask.dimensions();
    let mut seeds = LabelMask::zeros(width, height);
    for region in &RegionProperties::compute(mask, None) {
        let (cx, cy) = region.centroid;
        let x = (cx.round_ties_even().max(0.0) as usize).min(width - 1);
        let y = (cy.round_ties_even().max(0.0) as usize).min(height - 1);
        seeds.set(x, y, region.tag);
    }
    seeds
}

/// Grow labels into background pixels within Euclidean `distance` of a
/// labeled pixel. A pixel in reach of several labels takes the nearest,
/// then the smallest tag. Labeled pixels keep their tag.
pub fn expand_labels(mask: &LabelMask, distance: f64) -> LabelMask {
    let (width, height) = mask.dimensions();
    let mut out = mask.clone();
    if distance <= 0.0 || mask.is_blank() {
        return out;
    }

    let reach = distance.floor() as usize;
    let limit = distance * distance;
    // (squared distance, tag) of the best claim per pixel.
    let mut best: Vec<Option<(usize, u32)>> = vec![None; width * height];

    for sy in 0..height {
        for sx in 0..width {
            let tag = mask.get(sx, sy);
            if tag == 0 {
                continue;
            }
            let y_range = sy.saturating_sub(reach)..=(sy + reach).min(height - 1);
            for y in y_range {
                for x in sx.saturating_sub(reach)..=(sx + reach).min(width - 1) {
                    if mask.get(x, y) != 0 {
                        continue;
                    }
                    let d2 = x.abs_diff(sx).pow(2) + y.abs_diff(sy).pow(2);
                    if d2 as f64 > limit {
                        continue;
                    }
                    let slot = &mut best[y * width + x];
                    let closer = match *slot {
                        Some(current) => (d2, tag) < current,
                        None => true,
                    };
                    if closer {
                        *slot = Some((d2, tag));
                    }
                }
            }
        }
    }

    for (idx, claim) in best.into_iter().enumerate() {
        if let Some((_, tag)) = claim {
            out.set(idx % width, idx / width, tag);
        }
    }
    out
}

/// Expand Delta centroids by `distance` and measure the overlap both ways.
pub fn colocalize(delta: &LabelMask, vsv: &LabelMask, distance: f64) -> Colocalization {
    assert_eq!(delta.dimensions(), vsv.dimensions(), "mask dimensions differ");

    let expanded = expand_labels(&centroid_seeds(delta), distance);
    let result = Colocalization {
        delta_on_vsv: overlap_percent(&expanded, vsv),
        vsv_on_delta: overlap_percent(vsv, &expanded),
        delta_count: delta.count_distinct_tags(),
        vsv_count: vsv.count_distinct_tags(),
    };
    tracing::debug!(?result, "Colocalization");
    result
}
