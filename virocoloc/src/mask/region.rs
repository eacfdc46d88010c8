//! Per-object shape measurements.

use std::collections::BTreeMap;

use super::LabelMask;
use crate::image::RawImage;

/// Inclusive pixel bounds of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

/// Measurements of one tagged object.
#[derive(Debug, Clone)]
pub struct Region {
    pub tag: u32,
    /// `(x, y)` of every pixel, raster order.
    pub coords: Vec<(usize, usize)>,
    /// `(x, y)` mean position.
    pub centroid: (f64, f64),
    pub bbox: BoundingBox,
    /// Axes of the ellipse with the same second central moments.
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
    /// Mean of the intensity image over the region, when one was given.
    pub mean_intensity: Option<f64>,
}

impl Region {
    pub fn area(&self) -> usize {
        self.coords.len()
    }

    /// `major / minor`; infinite for degenerate line-shaped regions and 1
    /// for a single pixel.
    pub fn axis_ratio(&self) -> f64 {
        if self.minor_axis_length > 0.0 {
            self.major_axis_length / self.minor_axis_length
        } else if self.major_axis_length > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    }

    /// True when the region occupies a single row or a single column.
    pub fn is_line(&self) -> bool {
        self.bbox.width() == 1 || self.bbox.height() == 1
    }
}

/// Region measurements for every tag of a mask, ascending by tag.
#[derive(Debug, Clone, Default)]
pub struct RegionProperties {
    regions: Vec<Region>,
}

impl RegionProperties {
    pub fn compute(mask: &LabelMask, intensity: Option<&RawImage>) -> Self {
        if let Some(image) = intensity {
            assert!(
                image.dimensions() == mask.dimensions(),
                "intensity image and mask dimensions differ"
            );
        }

        let mut coords_by_tag: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
        let width = mask.width();
        for (idx, &tag) in mask.buffer().iter().enumerate() {
            if tag != 0 {
                coords_by_tag
                    .entry(tag)
                    .or_default()
                    .push((idx % width, idx / width));
            }
        }

        let regions = coords_by_tag
            .into_iter()
            .map(|(tag, coords)| measure(tag, coords, intensity))
            .collect();
        Self { regions }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, tag: u32) -> Option<&Region> {
        self.regions
            .binary_search_by_key(&tag, |r| r.tag)
            .ok()
            .map(|idx| &self.regions[idx])
    }
}

impl<'a> IntoIterator for &'a RegionProperties {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

fn measure(tag: u32, coords: Vec<(usize, usize)>, intensity: Option<&RawImage>) -> Region {
    let n = coords.len() as f64;

    let (sum_x, sum_y) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let (cx, cy) = (sum_x / n, sum_y / n);

    let mut mu20 = 0.0;
    let mut mu02 = 0.0;
    let mut mu11 = 0.0;
    let mut bbox = BoundingBox {
        min_x: usize::MAX,
        min_y: usize::MAX,
        max_x: 0,
        max_y: 0,
    };
    for &(x, y) in &coords {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        mu20 += dx * dx;
        mu02 += dy * dy;
        mu11 += dx * dy;
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x);
        bbox.max_y = bbox.max_y.max(y);
    }
    let (a, b, c) = (mu20 / n, mu11 / n, mu02 / n);

    // Eigenvalues of the covariance matrix [[a, b], [b, c]]. The smaller
    // one comes from the determinant so collinear pixels give exactly 0.
    let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let l1 = (a + c) / 2.0 + spread;
    let l2 = if l1 > 0.0 {
        ((a * c - b * b) / l1).max(0.0)
    } else {
        0.0
    };

    let mean_intensity = intensity.map(|image| {
        coords.iter().map(|&(x, y)| *image.get(x, y) as f64).sum::<f64>() / n
    });

    Region {
        tag,
        coords,
        centroid: (cx, cy),
        bbox,
        major_axis_length: 4.0 * l1.sqrt(),
        minor_axis_length: 4.0 * l2.sqrt(),
        mean_intensity,
    }
}
