//! Confidence tiering from anchor recency.
//!
//! Tiers are a step function of days since the most recent anchor. The band
//! edges live in `ConfidenceBands` so a continuous score can later replace the
//! step function behind the same call site.

use crate::enums::ConfidenceTier;

/// Day thresholds separating confidence tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceBands {
    /// Days strictly below this are `VeryHigh`.
    pub very_high_below: i64,
    /// Days strictly below this are `High`.
    pub high_below: i64,
    /// Days at or below this are `Medium`; anything above is `Low`.
    pub medium_through: i64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            very_high_below: 10,
            high_below: 20,
            medium_through: 40,
        }
    }
}

impl ConfidenceBands {
    /// Tier for a given number of days since the last anchor.
    ///
    /// `None` means no anchor was ever recorded, which is always `Low`.
    #[must_use]
    pub const fn tier_for(&self, days_since_anchor: Option<i64>) -> ConfidenceTier {
        match days_since_anchor {
            None => ConfidenceTier::Low,
            Some(days) if days < self.very_high_below => ConfidenceTier::VeryHigh,
            Some(days) if days < self.high_below => ConfidenceTier::High,
            Some(days) if days <= self.medium_through => ConfidenceTier::Medium,
            Some(_) => ConfidenceTier::Low,
        }
    }
}
