//! Access decisions produced by the entitlement evaluator.

use serde::{Deserialize, Serialize};

/// Which authority granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantedVia {
    Platform,
    Creator,
    None,
}

/// Outcome of an access check. Carries no error detail by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub has_access: bool,
    pub granted_via: GrantedVia,
    /// Held creator tier when access came from a creator subscription.
    pub tier: Option<String>,
}

impl AccessDecision {
    pub fn via_platform() -> Self {
        Self {
            has_access: true,
            granted_via: GrantedVia::Platform,
            tier: None,
        }
    }

    pub fn via_creator(tier: impl Into<String>) -> Self {
        Self {
            has_access: true,
            granted_via: GrantedVia::Creator,
            tier: Some(tier.into()),
        }
    }

    pub fn denied() -> Self {
        Self {
            has_access: false,
            granted_via: GrantedVia::None,
            tier: None,
        }
    }
}
