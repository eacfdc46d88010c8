use super::*;
use crate::image::RawImage;

/// Binary mask from rows of `#` (set) and `.` (clear).
fn bits(rows: &[&str]) -> BitBuffer2 {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    BitBuffer2::from_fn(width, height, |x, y| rows[y].as_bytes()[x] == b'#')
}

fn render(mask: &BitBuffer2) -> Vec<String> {
    (0..mask.height())
        .map(|y| {
            (0..mask.width())
                .map(|x| if mask.get_xy(x, y) { '#' } else { '.' })
                .collect()
        })
        .collect()
}

fn labels(rows: &[&[u32]]) -> LabelMask {
    let height = rows.len();
    let width = rows[0].len();
    LabelMask::new(Buffer2::from_fn(width, height, |x, y| rows[y][x]))
}

// ---------------------------------------------------------------------------
// LabelMask
// ---------------------------------------------------------------------------

#[test]
fn test_tags_and_counts() {
    let mask = labels(&[&[0, 3, 3], &[7, 0, 0], &[7, 0, 12]]);
    assert_eq!(mask.tags(), vec![3, 7, 12]);
    assert_eq!(mask.count_distinct_tags(), 3);
    assert_eq!(mask.max_tag(), 12);
    assert!(!mask.is_blank());
    assert!(LabelMask::zeros(4, 4).is_blank());
    assert_eq!(LabelMask::zeros(4, 4).count_distinct_tags(), 0);
}

#[test]
fn test_area_by_tag() {
    let mask = labels(&[&[0, 3, 3], &[7, 0, 0], &[7, 0, 3]]);
    let areas = mask.area_by_tag();
    assert_eq!(areas.get(&3), Some(&3));
    assert_eq!(areas.get(&7), Some(&2));
    assert_eq!(areas.len(), 2);
}

#[test]
fn test_binary_is_sign() {
    let mask = labels(&[&[0, 3], &[9, 0]]);
    assert_eq!(render(&mask.binary()), vec![".#", "#."]);
}

#[test]
fn test_remove_small_objects() {
    let mask = labels(&[&[1, 1, 0, 2], &[1, 0, 0, 0], &[0, 0, 4, 4]]);
    let cleaned = remove_small_objects(&mask, 2);
    assert_eq!(cleaned.tags(), vec![1, 4]);
    // Surviving tags keep their values and pixels.
    assert_eq!(cleaned.get(0, 1), 1);
    assert_eq!(cleaned.get(3, 2), 4);
    assert_eq!(cleaned.get(3, 0), 0);
}

#[test]
fn test_remove_small_objects_zero_is_noop() {
    let mask = labels(&[&[1, 0, 2], &[0, 5, 0]]);
    let cleaned = remove_small_objects(&mask, 0);
    assert_eq!(cleaned, mask);
    assert_eq!(cleaned.count_distinct_tags(), mask.count_distinct_tags());
}

#[test]
fn test_remove_tags_is_functional() {
    let mask = labels(&[&[1, 2], &[3, 2]]);
    let removed = remove_tags(&mask, &BTreeSet::from([2]));
    assert_eq!(removed.tags(), vec![1, 3]);
    assert_eq!(mask.tags(), vec![1, 2, 3]);
}

#[test]
fn test_masked_tags_and_masked_by() {
    let mask = labels(&[&[1, 1, 0], &[0, 2, 2], &[3, 0, 0]]);
    let footprint = bits(&["..#", ".#.", "#.."]);
    assert_eq!(mask.masked_tags(&footprint), BTreeSet::from([2, 3]));

    let kept = mask.masked_by(&footprint);
    assert_eq!(kept.get(1, 1), 2);
    assert_eq!(kept.get(0, 2), 3);
    assert_eq!(kept.get(2, 1), 0);
    assert_eq!(kept.get(0, 0), 0);
}

// ---------------------------------------------------------------------------
// Labeling
// ---------------------------------------------------------------------------

#[test]
fn test_label_empty_mask() {
    let labeled = label(&BitBuffer2::new_default(10, 10), Connectivity::Eight);
    assert!(labeled.is_blank());
}

#[test]
fn test_label_raster_order() {
    let mask = bits(&[
        "..##....#", //
        ".........",
        "#.......#",
    ]);
    let labeled = label(&mask, Connectivity::Eight);
    assert_eq!(labeled.tags(), vec![1, 2, 3, 4]);
    assert_eq!(labeled.get(2, 0), 1);
    assert_eq!(labeled.get(3, 0), 1);
    assert_eq!(labeled.get(8, 0), 2);
    assert_eq!(labeled.get(0, 2), 3);
    assert_eq!(labeled.get(8, 2), 4);
}

#[test]
fn test_label_diagonal_connectivity() {
    let mask = bits(&[
        "#..", //
        ".#.",
        "..#",
    ]);
    assert_eq!(label(&mask, Connectivity::Eight).count_distinct_tags(), 1);
    assert_eq!(label(&mask, Connectivity::Four).count_distinct_tags(), 3);
}

#[test]
fn test_label_u_shape_merges() {
    let mask = bits(&[
        "#...#", //
        "#...#",
        "#####",
    ]);
    let labeled = label(&mask, Connectivity::Four);
    assert_eq!(labeled.tags(), vec![1]);
    assert_eq!(labeled.area_by_tag()[&1], 9);
}

#[test]
fn test_label_runs_across_word_boundary() {
    let width = 150;
    let mask = BitBuffer2::from_fn(width, 3, |x, y| match y {
        0 => (60..70).contains(&x),
        1 => x == 127 || x == 128,
        _ => x >= 140,
    });
    let labeled = label(&mask, Connectivity::Eight);
    assert_eq!(labeled.count_distinct_tags(), 3);
    assert_eq!(labeled.get(60, 0), labeled.get(69, 0));
    assert_eq!(labeled.get(127, 1), labeled.get(128, 1));
    assert_eq!(labeled.get(149, 2), 3);
    assert_eq!(labeled.area_by_tag()[&3], 10);
}

#[test]
fn test_label_full_rows() {
    let mask = BitBuffer2::new_filled(128, 4, true);
    let labeled = label(&mask, Connectivity::Four);
    assert_eq!(labeled.tags(), vec![1]);
    assert_eq!(labeled.area_by_tag()[&1], 512);
}

// ---------------------------------------------------------------------------
// Morphology
// ---------------------------------------------------------------------------

#[test]
fn test_dilate_single_pixel() {
    let mask = bits(&[
        ".....", //
        ".....",
        "..#..",
        ".....",
        ".....",
    ]);
    assert_eq!(
        render(&dilate(&mask, 1)),
        vec![".....", ".###.", ".###.", ".###.", "....."]
    );
}

#[test]
fn test_dilate_clips_at_border() {
    let mask = bits(&["#...", "....", "...#"]);
    assert_eq!(render(&dilate(&mask, 1)), vec!["##..", "####", "..##"]);
}

#[test]
fn test_dilate_across_words() {
    let mask = BitBuffer2::from_fn(130, 1, |x, _| x == 64);
    let dilated = dilate(&mask, 2);
    let set: Vec<_> = dilated.iter_ones().map(|(x, _)| x).collect();
    assert_eq!(set, vec![62, 63, 64, 65, 66]);
}

#[test]
fn test_dilate_large_radius_matches_composition() {
    let mask = BitBuffer2::from_fn(200, 3, |x, y| x == 100 && y == 1);
    let dilated = dilate(&mask, 70);
    let xs: Vec<_> = dilated.iter_ones().filter(|&(_, y)| y == 0).map(|(x, _)| x).collect();
    assert_eq!(xs.first(), Some(&30));
    assert_eq!(xs.last(), Some(&170));
    assert_eq!(dilated.count_ones(), 141 * 3);
}

#[test]
fn test_erode_cross_interior() {
    let mask = bits(&[
        ".....", //
        ".###.",
        ".###.",
        ".###.",
        ".....",
    ]);
    assert_eq!(
        render(&erode_cross(&mask)),
        vec![".....", ".....", "..#..", ".....", "....."]
    );
}

#[test]
fn test_erode_cross_border_counts_as_foreground() {
    let mask = bits(&["###", "###"]);
    assert_eq!(render(&erode_cross(&mask)), vec!["###", "###"]);

    let mask = bits(&["##.", "##."]);
    assert_eq!(render(&erode_cross(&mask)), vec!["#..", "#.."]);
}

#[test]
fn test_erode_cross_wide_rows() {
    let mask = BitBuffer2::new_filled(100, 3, true);
    assert_eq!(erode_cross(&mask).count_ones(), 300);

    let mut holed = mask.clone();
    holed.set_xy(64, 1, false);
    let eroded = erode_cross(&holed);
    assert!(!eroded.get_xy(63, 1));
    assert!(!eroded.get_xy(65, 1));
    assert!(!eroded.get_xy(64, 0));
    assert!(!eroded.get_xy(64, 2));
    assert!(eroded.get_xy(62, 1));
    assert_eq!(eroded.count_ones(), 300 - 5);
}

// ---------------------------------------------------------------------------
// Region properties
// ---------------------------------------------------------------------------

#[test]
fn test_region_properties_rectangle() {
    // 4 wide, 2 tall: variance along x is (4^2 - 1) / 12, along y (2^2 - 1) / 12.
    let mask = labels(&[&[0, 0, 0, 0, 0], &[0, 5, 5, 5, 5], &[0, 5, 5, 5, 5]]);
    let props = RegionProperties::compute(&mask, None);
    assert_eq!(props.len(), 1);

    let region = props.get(5).unwrap();
    assert_eq!(region.area(), 8);
    assert_eq!(region.centroid, (2.5, 1.5));
    assert!((region.major_axis_length - 4.0 * (15.0f64 / 12.0).sqrt()).abs() < 1e-9);
    assert!((region.minor_axis_length - 4.0 * (3.0f64 / 12.0).sqrt()).abs() < 1e-9);
    assert_eq!(region.bbox.width(), 4);
    assert_eq!(region.bbox.height(), 2);
    assert!(region.mean_intensity.is_none());
}

#[test]
fn test_region_properties_mean_intensity_and_order() {
    let mask = labels(&[&[9, 0, 2], &[9, 0, 2]]);
    let image = RawImage::new(3, 2, vec![10.0, 0.0, 1.0, 20.0, 0.0, 3.0]);
    let props = RegionProperties::compute(&mask, Some(&image));

    let tags: Vec<_> = props.iter().map(|r| r.tag).collect();
    assert_eq!(tags, vec![2, 9]);
    assert_eq!(props.get(2).unwrap().mean_intensity, Some(2.0));
    assert_eq!(props.get(9).unwrap().mean_intensity, Some(15.0));
    assert!(props.get(4).is_none());
}

#[test]
fn test_axis_ratio_degenerate_shapes() {
    let mask = labels(&[&[1, 0, 2, 2, 2]]);
    let props = RegionProperties::compute(&mask, None);
    let single = props.get(1).unwrap();
    assert_eq!(single.axis_ratio(), 1.0);
    assert!(single.is_line());

    let line = props.get(2).unwrap();
    assert_eq!(line.minor_axis_length, 0.0);
    assert_eq!(line.axis_ratio(), f64::INFINITY);
    assert!(line.is_line());
}

#[test]
fn test_axis_ratio_of_square_is_one() {
    let mask = labels(&[&[1, 1, 1], &[1, 1, 1], &[1, 1, 1]]);
    let props = RegionProperties::compute(&mask, None);
    let region = props.get(1).unwrap();
    assert!((region.axis_ratio() - 1.0).abs() < 1e-12);
    assert!(!region.is_line());
}
