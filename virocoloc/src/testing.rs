//! Synthetic images and masks for unit tests.

use common::Buffer2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image::RawImage;
use crate::mask::LabelMask;

/// Uniform noise in `[0, 2 * mean]`, reproducible from `seed`.
pub fn noisy_background(width: usize, height: usize, mean: f32, seed: u64) -> RawImage {
    let mut rng = StdRng::seed_from_u64(seed);
    Buffer2::from_fn(width, height, |_, _| rng.random_range(0.0..=2.0 * mean))
}

/// Add an isotropic Gaussian spot with the given peak.
pub fn gaussian_spot(image: &mut RawImage, cx: f32, cy: f32, sigma: f32, peak: f32) {
    let two_sigma_sq = 2.0 * sigma * sigma;
    for y in 0..image.height() {
        for x in 0..image.width() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            image[(x, y)] += peak * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
        }
    }
}

/// Fill an axis-aligned ellipse with `tag`.
pub fn fill_ellipse(mask: &mut LabelMask, cx: f64, cy: f64, rx: f64, ry: f64, tag: u32) {
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            let nx = (x as f64 - cx) / rx;
            let ny = (y as f64 - cy) / ry;
            if nx * nx + ny * ny <= 1.0 {
                mask.set(x, y, tag);
            }
        }
    }
}

/// Fill the inclusive rectangle `[x0, x1] x [y0, y1]` with `tag`.
pub fn fill_rect(mask: &mut LabelMask, x0: usize, y0: usize, x1: usize, y1: usize, tag: u32) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            mask.set(x, y, tag);
        }
    }
}
