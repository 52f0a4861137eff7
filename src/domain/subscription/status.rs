//! Subscription lifecycle status and related enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, ValidationError};

/// Lifecycle status of a subscription row.
///
/// `Cancelled` and `Expired` are terminal for the row; a new purchase
/// creates a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Maps a billing processor subscription status onto the row lifecycle.
    ///
    /// `past_due` keeps the row active; the failed payment is tracked by
    /// [`PaymentStatus`]. Statuses with no lifecycle meaning (`incomplete`,
    /// `paused`) map to `None`.
    pub fn from_processor(status: &str) -> Option<Self> {
        match status {
            "active" | "trialing" | "past_due" => Some(SubscriptionStatus::Active),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Cancelled),
            "unpaid" | "incomplete_expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Active, Active) // Renewal
                | (Active, Cancelled)
                | (Active, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Active => vec![Active, Cancelled, Expired],
            Cancelled | Expired => vec![],
        }
    }
}

/// Outcome of the most recent charge for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Which collection a subscription lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Platform,
    Creator,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Platform => "platform",
            SubscriptionKind::Creator => "creator",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(SubscriptionKind::Platform),
            "creator" => Ok(SubscriptionKind::Creator),
            other => Err(ValidationError::invalid_format(
                "type",
                format!("expected 'platform' or 'creator', got '{}'", other),
            )),
        }
    }
}
