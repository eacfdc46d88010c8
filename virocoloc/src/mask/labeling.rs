//! Connected component labeling of binary masks.
//!
//! Each row is scanned word by word into horizontal runs of foreground
//! pixels; runs touching a run of the previous row are merged through a
//! union-find, then provisional labels are flattened to `1..=n` in raster
//! order of each component's first pixel.

use common::{BitBuffer2, Buffer2};
use serde::{Deserialize, Serialize};

use super::LabelMask;

const BITS_PER_WORD: u32 = 64;

/// Pixel adjacency used when grouping foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only.
    Four,
    /// Edge and corner neighbours.
    #[default]
    Eight,
}

/// A horizontal run of foreground pixels, `start..end`.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: u32,
    end: u32,
    label: u32,
}

impl Run {
    /// Range of previous-row x positions that may touch this run.
    #[inline]
    fn search_window(&self, connectivity: Connectivity) -> (u32, u32) {
        match connectivity {
            Connectivity::Four => (self.start, self.end),
            Connectivity::Eight => (self.start.saturating_sub(1), self.end + 1),
        }
    }
}

#[inline]
fn runs_connected(prev: &Run, curr: &Run, connectivity: Connectivity) -> bool {
    match connectivity {
        Connectivity::Four => prev.start < curr.end && prev.end > curr.start,
        Connectivity::Eight => prev.start < curr.end + 1 && prev.end + 1 > curr.start,
    }
}

/// Label the connected foreground components of `mask`.
pub fn label(mask: &BitBuffer2, connectivity: Connectivity) -> LabelMask {
    let width = mask.width();
    let height = mask.height();
    let mut labels = Buffer2::new_default(width, height);
    if width == 0 || height == 0 {
        return LabelMask::new(labels);
    }

    let mut uf = UnionFind::default();
    let mut prev_runs: Vec<Run> = Vec::new();
    let mut curr_runs: Vec<Run> = Vec::new();

    for y in 0..height {
        curr_runs.clear();
        extract_runs(mask.row_words(y), width as u32, &mut curr_runs);
        if curr_runs.is_empty() {
            prev_runs.clear();
            continue;
        }

        merge_runs_with_prev(&mut curr_runs, &prev_runs, connectivity, &mut uf);

        let row_start = y * width;
        for run in &curr_runs {
            let start = row_start + run.start as usize;
            let end = row_start + run.end as usize;
            labels.pixels_mut()[start..end].fill(run.label);
        }

        std::mem::swap(&mut prev_runs, &mut curr_runs);
    }

    let count = uf.flatten_labels(labels.pixels_mut());
    tracing::trace!(components = count, "Labeled mask");
    LabelMask::new(labels)
}

/// Append the runs of one row. Padding bits past `width` are zero.
fn extract_runs(words: &[u64], width: u32, runs: &mut Vec<Run>) {
    let mut run_start: Option<u32> = None;

    for (word_idx, &word) in words.iter().enumerate() {
        let base_x = word_idx as u32 * BITS_PER_WORD;
        let mut pos = 0u32;

        while pos < BITS_PER_WORD && base_x + pos < width {
            let remaining = word >> pos;
            match run_start {
                Some(start) => {
                    // Look for the first background bit.
                    let ones = (!remaining).trailing_zeros().min(BITS_PER_WORD - pos);
                    pos += ones;
                    if pos < BITS_PER_WORD {
                        runs.push(Run {
                            start,
                            end: (base_x + pos).min(width),
                            label: 0,
                        });
                        run_start = None;
                    }
                }
                None => {
                    if remaining == 0 {
                        break;
                    }
                    pos += remaining.trailing_zeros();
                    run_start = Some(base_x + pos);
                }
            }
        }
    }

    if let Some(start) = run_start {
        runs.push(Run {
            start,
            end: width,
            label: 0,
        });
    }
}

fn merge_runs_with_prev(
    curr_runs: &mut [Run],
    prev_runs: &[Run],
    connectivity: Connectivity,
    uf: &mut UnionFind,
) {
    let mut prev_idx = 0;
    for run in curr_runs.iter_mut() {
        let (search_start, search_end) = run.search_window(connectivity);

        while prev_idx < prev_runs.len() && prev_runs[prev_idx].end <= search_start {
            prev_idx += 1;
        }

        let mut assigned = None;
        let mut check_idx = prev_idx;
        while check_idx < prev_runs.len() && prev_runs[check_idx].start < search_end {
            let prev_run = &prev_runs[check_idx];
            if runs_connected(prev_run, run, connectivity) {
                match assigned {
                    Some(label) if label != prev_run.label => uf.union(label, prev_run.label),
                    None => assigned = Some(prev_run.label),
                    _ => {}
                }
            }
            check_idx += 1;
        }

        run.label = assigned.unwrap_or_else(|| uf.make_set());
    }
}

/// Union-find over provisional labels `1..`; roots are always the smallest
/// label of their set.
#[derive(Debug, Default)]
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32 + 1;
        self.parent.push(label);
        label
    }

    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[(root - 1) as usize] != root {
            root = self.parent[(root - 1) as usize];
        }

        let mut current = label;
        while current != root {
            let next = self.parent[(current - 1) as usize];
            self.parent[(current - 1) as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Rewrite provisional labels to sequential `1..=n`; returns `n`.
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        let len = self.parent.len();
        let mut label_map = vec![0u32; len + 1];
        let mut count = 0u32;

        for i in 1..=len as u32 {
            let root = self.find(i);
            if label_map[root as usize] == 0 {
                count += 1;
                label_map[root as usize] = count;
            }
            label_map[i as usize] = label_map[root as usize];
        }

        for l in labels.iter_mut().filter(|l| **l != 0) {
            *l = label_map[*l as usize];
        }
        count as usize
    }
}
