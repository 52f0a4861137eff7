//! Creator revenue counters owned by the user aggregate.

use serde::{Deserialize, Serialize};

/// Counters on a creator's profile. Neither value ever goes below zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub total_earnings: f64,
}

impl CreatorProfile {
    /// Applies a signed change to the subscriber count, flooring at zero.
    #[must_use]
    pub fn with_subscriber_delta(self, delta: i64) -> Self {
        let count = if delta >= 0 {
            self.subscriber_count.saturating_add(delta.unsigned_abs())
        } else {
            self.subscriber_count.saturating_sub(delta.unsigned_abs())
        };
        Self {
            subscriber_count: count,
            ..self
        }
    }

    /// Adds earnings. Non-positive or non-finite credits are ignored.
    #[must_use]
    pub fn with_credit(self, amount: f64) -> Self {
        if !amount.is_finite() || amount <= 0.0 {
            return self;
        }
        Self {
            total_earnings: self.total_earnings.max(0.0) + amount,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_count_never_goes_negative() {
        let profile = CreatorProfile::default().with_subscriber_delta(-1);
        assert_eq!(profile.subscriber_count, 0);
    }

    #[test]
    fn subscriber_count_increments() {
        let profile = CreatorProfile::default()
            .with_subscriber_delta(1)
            .with_subscriber_delta(1)
            .with_subscriber_delta(-1);
        assert_eq!(profile.subscriber_count, 1);
    }

    #[test]
    fn credit_adds_to_earnings() {
        let profile = CreatorProfile::default().with_credit(7.0).with_credit(3.5);
        assert!((profile.total_earnings - 10.5).abs() < 1e-9);
    }

    #[test]
    fn credit_never_decreases_earnings() {
        let profile = CreatorProfile {
            subscriber_count: 0,
            total_earnings: 5.0,
        };
        assert_eq!(profile.with_credit(-2.0).total_earnings, 5.0);
        assert_eq!(profile.with_credit(f64::NAN).total_earnings, 5.0);
    }

    #[test]
    fn deserializes_missing_fields_as_zero() {
        let profile: CreatorProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, CreatorProfile::default());
    }
}
