use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::{SizeEstimationRule, SizeQualifier};

/// Distance from an integer below which a total counts as that integer.
const WHOLE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeChoice {
    pub count: f64,
    pub qualifier: SizeQualifier,
}

/// Rounds a purchase quantity up to a whole count.
///
/// Floating noise such as `3.0000000000000004` stays at 3.
pub fn round_up_purchase(quantity: f64) -> f64 {
    let nearest = quantity.round();
    if (quantity - nearest).abs() < WHOLE_TOLERANCE {
        nearest
    } else {
        quantity.ceil()
    }
}

/// Picks the size that covers `total_reference` with the fewest pieces.
///
/// Rules are evaluated largest reference value first and a later rule only
/// wins with a strictly smaller count, so ties go to the larger size. All
/// rules must share one reference unit.
pub fn choose_size(total_reference: f64, rules: &[SizeEstimationRule]) -> Option<SizeChoice> {
    if !(total_reference > 0.0) {
        return None;
    }

    let mut ordered: Vec<&SizeEstimationRule> = rules
        .iter()
        .filter(|rule| rule.reference_value > 0.0)
        .collect();
    ordered.sort_by(|a, b| {
        b.reference_value
            .partial_cmp(&a.reference_value)
            .unwrap_or(Ordering::Equal)
    });

    let mut best: Option<SizeChoice> = None;
    for rule in ordered {
        let count = round_up_purchase(total_reference / rule.reference_value);
        if best.map_or(true, |current| count < current.count) {
            best = Some(SizeChoice {
                count,
                qualifier: rule.qualifier,
            });
        }
    }
    best
}
