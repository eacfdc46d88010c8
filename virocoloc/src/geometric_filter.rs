//! Shape-based rejection of VSV false positives.

use std::collections::BTreeSet;
use std::fmt;

use common::BitBuffer2;

use crate::mask::{erode_cross, remove_small_objects, remove_tags, LabelMask, RegionProperties};
use crate::params::ThresholdParameters;

/// Objects smaller than this are debris and dropped before measuring.
pub const MIN_OBJECT_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    TooSmall { area: usize },
    TooThick { minor_axis: f64 },
    TooElongated { ratio: f64 },
    TooRound { ratio: f64 },
    TooLarge { area: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooSmall { area } => write!(f, "area {area} below {MIN_OBJECT_SIZE}"),
            RejectReason::TooThick { minor_axis } => write!(f, "minor axis {minor_axis:.2}"),
            RejectReason::TooElongated { ratio } => write!(f, "axis ratio {ratio:.2} too high"),
            RejectReason::TooRound { ratio } => write!(f, "axis ratio {ratio:.2} too low"),
            RejectReason::TooLarge { area } => write!(f, "area {area}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub tag: u32,
    pub reasons: Vec<RejectReason>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Objects that passed every criterion, original tags.
    pub filtered: LabelMask,
    /// Pixels that belonged to an object before filtering but not after.
    pub removed: BitBuffer2,
    /// Boundary pixels of the removed region carrying their original tags.
    /// Display only.
    pub outline: LabelMask,
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    /// Outcome for a mask that was filtered earlier and stored as is.
    pub fn from_filtered(filtered: LabelMask) -> Self {
        let (width, height) = filtered.dimensions();
        Self {
            removed: BitBuffer2::new_default(width, height),
            outline: LabelMask::zeros(width, height),
            filtered,
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometricFilter {
    params: ThresholdParameters,
}

impl GeometricFilter {
    pub fn new(params: ThresholdParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThresholdParameters {
        &self.params
    }

    /// Reasons `region` fails the thresholds; empty when it passes.
    fn judge(&self, minor_axis: f64, ratio: f64, area: usize) -> Vec<RejectReason> {
        let p = &self.params;
        let mut reasons = Vec::new();
        if minor_axis > p.thickness {
            reasons.push(RejectReason::TooThick { minor_axis });
        }
        if ratio > p.upper_ratio {
            reasons.push(RejectReason::TooElongated { ratio });
        }
        if ratio < p.lower_ratio {
            reasons.push(RejectReason::TooRound { ratio });
        }
        if area as f64 > p.area {
            reasons.push(RejectReason::TooLarge { area });
        }
        reasons
    }

    pub fn apply(&self, original: &LabelMask) -> FilterOutcome {
        let mut rejected: Vec<Rejection> = original
            .area_by_tag()
            .into_iter()
            .filter(|&(_, area)| area < MIN_OBJECT_SIZE)
            .map(|(tag, area)| Rejection {
                tag,
                reasons: vec![RejectReason::TooSmall { area }],
            })
            .collect();
        let cleaned = remove_small_objects(original, MIN_OBJECT_SIZE);

        let props = RegionProperties::compute(&cleaned, None);
        for region in &props {
            let reasons = self.judge(region.minor_axis_length, region.axis_ratio(), region.area());
            if !reasons.is_empty() {
                rejected.push(Rejection {
                    tag: region.tag,
                    reasons,
                });
            }
        }
        rejected.sort_by_key(|r| r.tag);

        for rejection in &rejected {
            tracing::debug!(
                tag = rejection.tag,
                reasons = ?rejection.reasons,
                "Rejected VSV object"
            );
        }

        let shape_rejects: BTreeSet<u32> = rejected
            .iter()
            .filter(|r| !matches!(r.reasons[..], [RejectReason::TooSmall { .. }]))
            .map(|r| r.tag)
            .collect();
        let filtered = remove_tags(&cleaned, &shape_rejects);

        let removed = original.binary().and_not(&filtered.binary());
        let boundary = removed.and_not(&erode_cross(&removed));
        let outline = original.masked_by(&boundary);

        tracing::info!(
            before = original.count_distinct_tags(),
            after = filtered.count_distinct_tags(),
            params = %self.params,
            "Filtered VSV objects"
        );

        FilterOutcome {
            filtered,
            removed,
            outline,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fill_ellipse, fill_rect};

    fn scene() -> LabelMask {
        let mut mask = LabelMask::zeros(80, 60);
        // Slightly elongated particle: kept.
        fill_ellipse(&mut mask, 15.0, 15.0, 5.0, 4.0, 1);
        // Debris below the size floor.
        fill_rect(&mut mask, 40, 5, 43, 8, 2);
        // Near-perfect disc: ratio below 1.1.
        fill_ellipse(&mut mask, 60.0, 15.0, 5.0, 5.0, 3);
        // Long thin streak: ratio above 5.
        fill_rect(&mut mask, 5, 40, 44, 42, 4);
        // Large blob: area and thickness above limits.
        fill_ellipse(&mut mask, 65.0, 45.0, 12.0, 10.0, 5);
        mask
    }

    #[test]
    fn test_rejects_by_each_criterion() {
        let outcome = GeometricFilter::default().apply(&scene());
        assert_eq!(outcome.filtered.tags(), vec![1]);

        let reasons = |tag: u32| {
            outcome
                .rejected
                .iter()
                .find(|r| r.tag == tag)
                .map(|r| r.reasons.clone())
                .unwrap()
        };
        assert!(matches!(reasons(2)[..], [RejectReason::TooSmall { area: 16 }]));
        assert!(matches!(reasons(3)[..], [RejectReason::TooRound { .. }]));
        assert!(matches!(reasons(4)[..], [RejectReason::TooElongated { .. }]));
        let large = reasons(5);
        assert!(large.iter().any(|r| matches!(r, RejectReason::TooThick { .. })));
        assert!(large.iter().any(|r| matches!(r, RejectReason::TooLarge { .. })));
        assert!(outcome.rejected.iter().all(|r| r.tag != 1));
    }

    #[test]
    fn test_kept_object_is_unchanged() {
        let mask = scene();
        let outcome = GeometricFilter::default().apply(&mask);
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if mask.get(x, y) == 1 {
                    assert_eq!(outcome.filtered.get(x, y), 1);
                }
            }
        }
    }

    #[test]
    fn test_removed_is_difference_of_footprints() {
        let mask = scene();
        let outcome = GeometricFilter::default().apply(&mask);
        let kept_area = mask.area_by_tag()[&1];
        let total: usize = mask.area_by_tag().values().sum();
        assert_eq!(outcome.removed.count_ones(), total - kept_area);
        assert!(!outcome.removed.get_xy(15, 15));
        assert!(outcome.removed.get_xy(60, 15));
    }

    #[test]
    fn test_outline_is_boundary_of_removed() {
        let outcome = GeometricFilter::default().apply(&scene());
        // Interior of the rejected disc is not part of the outline.
        assert_eq!(outcome.outline.get(60, 15), 0);
        // Its leftmost pixel is, with the original tag.
        assert_eq!(outcome.outline.get(55, 15), 3);
        // Kept objects contribute nothing.
        assert!(!outcome.outline.tags().contains(&1));
    }

    #[test]
    fn test_idempotent() {
        let filter = GeometricFilter::default();
        let once = filter.apply(&scene());
        let twice = filter.apply(&once.filtered);
        assert_eq!(twice.filtered, once.filtered);
        assert_eq!(twice.removed.count_ones(), 0);
        assert!(twice.rejected.is_empty());
    }

    #[test]
    fn test_thresholds_are_honored() {
        let params = ThresholdParameters {
            lower_ratio: 0.5,
            ..Default::default()
        };
        let outcome = GeometricFilter::new(params).apply(&scene());
        assert_eq!(outcome.filtered.tags(), vec![1, 3]);
    }

    #[test]
    fn test_from_filtered() {
        let mut mask = LabelMask::zeros(10, 10);
        fill_rect(&mut mask, 2, 2, 4, 4, 7);
        let outcome = FilterOutcome::from_filtered(mask.clone());
        assert_eq!(outcome.filtered, mask);
        assert_eq!(outcome.removed.count_ones(), 0);
        assert!(outcome.outline.is_blank());
    }
}
