//! Binary morphology on bit-packed masks.

use common::BitBuffer2;

const MAX_WORD_RADIUS: usize = 63;

/// Dilate with a `(2 * radius + 1)` square structuring element.
///
/// Separable: a horizontal pass on packed words, then a vertical OR over
/// the rows of the window.
pub fn dilate(mask: &BitBuffer2, radius: usize) -> BitBuffer2 {
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }
    if radius > MAX_WORD_RADIUS {
        // Square dilations compose additively.
        return dilate(&dilate(mask, MAX_WORD_RADIUS), radius - MAX_WORD_RADIUS);
    }

    let width = mask.width();
    let height = mask.height();
    let words_per_row = mask.words_per_row();

    let mut horizontal = BitBuffer2::new_default(width, height);
    let mut row_out = vec![0u64; words_per_row];
    for y in 0..height {
        let row = mask.row_words(y);
        for (word_idx, out) in row_out.iter_mut().enumerate() {
            *out = dilate_word(row, word_idx, radius);
        }
        horizontal.set_row_words(y, &row_out);
    }

    let mut output = BitBuffer2::new_default(width, height);
    for y in 0..height {
        let y_min = y.saturating_sub(radius);
        let y_max = (y + radius).min(height - 1);
        row_out.fill(0);
        for src_y in y_min..=y_max {
            for (out, &word) in row_out.iter_mut().zip(horizontal.row_words(src_y)) {
                *out |= word;
            }
        }
        output.set_row_words(y, &row_out);
    }
    output
}

/// Horizontal dilation of one word, pulling in bits from its neighbours.
#[inline]
fn dilate_word(row: &[u64], word_idx: usize, radius: usize) -> u64 {
    let current = row[word_idx];
    let mut result = current;

    for shift in 1..=radius {
        result |= current << shift;
        result |= current >> shift;
    }

    if word_idx > 0 {
        let prev = row[word_idx - 1];
        if prev != 0 {
            for shift in 1..=radius {
                result |= prev >> (64 - shift);
            }
        }
    }

    if word_idx + 1 < row.len() {
        let next = row[word_idx + 1];
        if next != 0 {
            for shift in 1..=radius {
                result |= next << (64 - shift);
            }
        }
    }

    result
}

/// Erode with the 4-neighbour cross. Pixels outside the image count as
/// foreground, so objects touching the border are not eroded from that
/// side.
pub fn erode_cross(mask: &BitBuffer2) -> BitBuffer2 {
    let width = mask.width();
    let height = mask.height();
    let mut output = BitBuffer2::new_default(width, height);
    if mask.is_empty() {
        return output;
    }

    let words_per_row = mask.words_per_row();
    let last_word = words_per_row - 1;
    let last_bit = 1u64 << ((width - 1) % 64);
    let all_set = vec![!0u64; words_per_row];
    let mut row_out = vec![0u64; words_per_row];

    for y in 0..height {
        let row = mask.row_words(y);
        let up = if y > 0 { mask.row_words(y - 1) } else { &all_set };
        let down = if y + 1 < height {
            mask.row_words(y + 1)
        } else {
            &all_set
        };

        for (i, out) in row_out.iter_mut().enumerate() {
            // Bit x of `left` is pixel x - 1, bit x of `right` is pixel x + 1.
            let carry_in = if i > 0 { row[i - 1] >> 63 } else { 1 };
            let left = (row[i] << 1) | carry_in;

            let carry_out = if i < last_word { row[i + 1] << 63 } else { last_bit };
            let right = (row[i] >> 1) | carry_out;

            *out = row[i] & left & right & up[i] & down[i];
        }
        output.set_row_words(y, &row_out);
    }
    output
}
