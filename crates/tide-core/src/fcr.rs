//! Feed conversion ratio.
//!
//! `fcr = feed_kg / weight_gain_kg`, defined only when both are positive.
//! Classification thresholds are published constants so every consumer
//! classifies the same way.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// FCR at or below this is excellent.
pub const FCR_EXCELLENT_MAX: f64 = 1.2;
/// FCR at or below this (and above excellent) is acceptable.
pub const FCR_ACCEPTABLE_MAX: f64 = 1.5;
/// Provenance note recorded when FCR cannot be computed.
pub const FCR_INSUFFICIENT_DATA: &str = "insufficient_data";

/// Growth component of a day's biomass change, in kilograms.
///
/// Mortality and transfers change biomass without any feed being converted,
/// so only the per-animal weight delta of the surviving population counts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weight_gain_kg(population: i64, prior_weight_g: f64, weight_g: f64) -> f64 {
    population as f64 * (weight_g - prior_weight_g) / 1000.0
}

/// Feed conversion ratio, or `None` when feed or gain is not positive.
#[must_use]
pub fn feed_conversion_ratio(feed_kg: Option<f64>, weight_gain_kg: f64) -> Option<f64> {
    let feed_kg = feed_kg?;
    if feed_kg > 0.0 && weight_gain_kg > 0.0 && feed_kg.is_finite() && weight_gain_kg.is_finite() {
        Some(feed_kg / weight_gain_kg)
    } else {
        None
    }
}

/// Presentation rating of an FCR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FcrRating {
    Excellent,
    Acceptable,
    NeedsAttention,
}

impl FcrRating {
    #[must_use]
    pub fn classify(fcr: f64) -> Self {
        if fcr <= FCR_EXCELLENT_MAX {
            Self::Excellent
        } else if fcr <= FCR_ACCEPTABLE_MAX {
            Self::Acceptable
        } else {
            Self::NeedsAttention
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(0.0), 10.0)]
    #[case(Some(5.0), 0.0)]
    #[case(Some(5.0), -2.0)]
    #[case(None, 10.0)]
    #[case(Some(-1.0), 10.0)]
    fn null_when_inputs_not_positive(#[case] feed: Option<f64>, #[case] gain: f64) {
        assert_eq!(feed_conversion_ratio(feed, gain), None);
    }

    #[test]
    fn ratio_when_both_positive() {
        let fcr = feed_conversion_ratio(Some(12.0), 10.0).unwrap();
        assert!((fcr - 1.2).abs() < 1e-12);
    }

    #[test]
    fn gain_uses_surviving_population() {
        let gain = weight_gain_kg(1000, 100.0, 102.0);
        assert!((gain - 2.0).abs() < 1e-12);
        assert!(weight_gain_kg(1000, 100.0, 99.0) < 0.0);
    }

    #[rstest]
    #[case(1.0, FcrRating::Excellent)]
    #[case(1.2, FcrRating::Excellent)]
    #[case(1.35, FcrRating::Acceptable)]
    #[case(1.5, FcrRating::Acceptable)]
    #[case(1.51, FcrRating::NeedsAttention)]
    fn classification_uses_published_thresholds(#[case] fcr: f64, #[case] expected: FcrRating) {
        assert_eq!(FcrRating::classify(fcr), expected);
    }
}
