//! Image filters used by spot detection: Gaussian smoothing, the discrete
//! Laplacian and Otsu's global threshold.


use common::Buffer2;
use rayon::prelude::*;

/// Default kernel extent in standard deviations.
pub const DEFAULT_TRUNCATE: f32 = 4.0;

const OTSU_BINS: usize = 256;

/// Normalized 1D Gaussian kernel of radius `round(truncate * sigma)`.
pub fn gaussian_kernel_1d(sigma: f32, truncate: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");
    assert!(truncate > 0.0, "Truncate must be positive");

    let radius = (truncate * sigma + 0.5) as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian blur. Samples outside the image repeat the nearest
/// edge pixel.
pub fn gaussian_blur(image: &Buffer2<f32>, sigma: f32) -> Buffer2<f32> {
    let kernel = gaussian_kernel_1d(sigma, DEFAULT_TRUNCATE);
    let width = image.width();
    let height = image.height();
    if image.is_empty() {
        return image.clone();
    }
    let radius = kernel.len() / 2;

    // Rows.
    let mut horizontal = vec![0.0f32; width * height];
    horizontal
        .par_chunks_mut(width)
        .zip(image.pixels().par_chunks(width))
        .for_each(|(out, row)| {
            for (x, dst) in out.iter_mut().enumerate() {
                *dst = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &weight)| weight * row[clamp_offset(x, k, radius, width)])
                    .sum();
            }
        });

    // Columns.
    let mut output = vec![0.0f32; width * height];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            out.fill(0.0);
            for (k, &weight) in kernel.iter().enumerate() {
                let src_y = clamp_offset(y, k, radius, height);
                let src = &horizontal[src_y * width..(src_y + 1) * width];
                for (dst, &value) in out.iter_mut().zip(src) {
                    *dst += weight * value;
                }
            }
        });

    Buffer2::new(width, height, output)
}

/// `pos + k - radius`, clamped into `0..len`.
#[inline]
fn clamp_offset(pos: usize, k: usize, radius: usize, len: usize) -> usize {
    (pos + k).saturating_sub(radius).min(len - 1)
}

/// Discrete Laplacian with kernel
/// ```text
///  0 -1  0
/// -1  4 -1
///  0 -1  0
/// ```
/// Bright blobs give positive responses. Edge pixels are clamped.
pub fn laplace(image: &Buffer2<f32>) -> Buffer2<f32> {
    let width = image.width();
    let height = image.height();
    if image.is_empty() {
        return image.clone();
    }

    Buffer2::from_fn(width, height, |x, y| {
        let center = *image.get(x, y);
        let left = *image.get(x.saturating_sub(1), y);
        let right = *image.get((x + 1).min(width - 1), y);
        let up = *image.get(x, y.saturating_sub(1));
        let down = *image.get(x, (y + 1).min(height - 1));
        4.0 * center - left - right - up - down
    })
}

/// Otsu's threshold over a 256-bin histogram spanning `[min, max]`.
///
/// Returns the centre of the bin that maximizes the between-class
/// variance, or `None` when there is no finite value or all finite values
/// are equal. Non-finite values are ignored.
pub fn otsu_threshold(values: &[f32]) -> Option<f32> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if min >= max {
        return None;
    }

    let min = min as f64;
    let bin_width = (max as f64 - min) / OTSU_BINS as f64;

    let mut hist = [0u64; OTSU_BINS];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = ((v as f64 - min) / bin_width) as usize;
        hist[bin.min(OTSU_BINS - 1)] += 1;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min + bin_width * (i as f64 + 0.5))
        .collect();

    // Class weights and means for "bins 0..=i" and "bins i..".
    let mut weight_low = [0.0f64; OTSU_BINS];
    let mut mean_low = [0.0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        count += hist[i] as f64;
        sum += hist[i] as f64 * centers[i];
        weight_low[i] = count;
        mean_low[i] = if count > 0.0 { sum / count } else { 0.0 };
    }

    let mut weight_high = [0.0f64; OTSU_BINS];
    let mut mean_high = [0.0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        count += hist[i] as f64;
        sum += hist[i] as f64 * centers[i];
        weight_high[i] = count;
        mean_high[i] = if count > 0.0 { sum / count } else { 0.0 };
    }

    let mut best = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let diff = mean_low[i] - mean_high[i + 1];
        let variance = weight_low[i] * weight_high[i + 1] * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best = i;
        }
    }

    Some(centers[best] as f32)
}
