//! Bit-packed 2D buffer for boolean masks.
//!
//! Each row starts on a fresh `u64` word so row-oriented algorithms
//! (run extraction, separable morphology) can scan words directly.
//! Padding bits past `width` are always kept at zero.

const BITS_PER_WORD: usize = 64;

/// A 2D boolean mask stored as row-aligned packed bits (LSB = lowest x).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    words: Vec<u64>,
    width: usize,
    height: usize,
    words_per_row: usize,
}

impl BitBuffer2 {
    /// Create a buffer with every pixel set to `value`.
    pub fn new_filled(width: usize, height: usize, value: bool) -> Self {
        let words_per_row = width.div_ceil(BITS_PER_WORD);
        let mut buffer = Self {
            words: vec![0; words_per_row * height],
            width,
            height,
            words_per_row,
        };
        if value {
            buffer.fill(true);
        }
        buffer
    }

    #[inline]
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, false)
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut buffer = Self::new_default(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    buffer.set_xy(x, y, true);
                }
            }
        }
        buffer
    }

    /// Create a mask from a row-major slice of booleans.
    pub fn from_slice(width: usize, height: usize, data: &[bool]) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length {} does not match dimensions {}x{}={}",
            data.len(),
            width,
            height,
            width * height
        );
        Self::from_fn(width, height, |x, y| data[y * width + x])
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of logical pixels (`width * height`).
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    /// Packed storage, `words_per_row` words per row.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Words of row `y`.
    #[inline]
    pub fn row_words(&self, y: usize) -> &[u64] {
        let start = y * self.words_per_row;
        &self.words[start..start + self.words_per_row]
    }

    #[inline]
    pub fn get_xy(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height);
        let word = self.words[y * self.words_per_row + x / BITS_PER_WORD];
        (word >> (x % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set_xy(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        let word = &mut self.words[y * self.words_per_row + x / BITS_PER_WORD];
        let bit = 1u64 << (x % BITS_PER_WORD);
        if value {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    /// Get a pixel by its row-major linear index (`y * width + x`).
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        self.get_xy(idx % self.width, idx / self.width)
    }

    /// Set a pixel by its row-major linear index (`y * width + x`).
    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        self.set_xy(idx % self.width, idx / self.width, value);
    }

    pub fn fill(&mut self, value: bool) {
        if !value {
            self.words.fill(0);
            return;
        }
        self.words.fill(!0);
        self.clear_padding();
    }

    /// Replace row `y` with `words`, dropping bits beyond `width`.
    pub fn set_row_words(&mut self, y: usize, words: &[u64]) {
        assert_eq!(words.len(), self.words_per_row, "row word count mismatch");
        let start = y * self.words_per_row;
        self.words[start..start + self.words_per_row].copy_from_slice(words);
        self.clear_row_padding(y);
    }

    /// Clear the pixels of the outermost rows and columns.
    pub fn clear_border(&mut self) {
        if self.is_empty() {
            return;
        }
        let last_x = self.width - 1;
        let last_y = self.height - 1;
        for x in 0..self.width {
            self.set_xy(x, 0, false);
            self.set_xy(x, last_y, false);
        }
        for y in 0..self.height {
            self.set_xy(0, y, false);
            self.set_xy(last_x, y, false);
        }
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// `self AND NOT other`.
    pub fn and_not(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width, "width mismatch");
        assert_eq!(self.height, other.height, "height mismatch");
        Self {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & !b)
                .collect(),
            ..*self
        }
    }

    /// Iterate over `(x, y)` of set pixels in raster order.
    pub fn iter_ones(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height).flat_map(move |y| {
            self.row_words(y)
                .iter()
                .enumerate()
                .flat_map(move |(word_idx, &word)| {
                    SetBits(word).map(move |bit| (word_idx * BITS_PER_WORD + bit, y))
                })
        })
    }

    fn clear_padding(&mut self) {
        for y in 0..self.height {
            self.clear_row_padding(y);
        }
    }

    fn clear_row_padding(&mut self, y: usize) {
        let tail_bits = self.width % BITS_PER_WORD;
        if tail_bits == 0 || self.words_per_row == 0 {
            return;
        }
        let last = y * self.words_per_row + self.words_per_row - 1;
        self.words[last] &= (1u64 << tail_bits) - 1;
    }
}

/// Yields the positions of set bits in a word, lowest first.
struct SetBits(u64);

impl Iterator for SetBits {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}
