//! Tier registry.
//!
//! Maps tier identifiers to a rank, a scope and the billing processor's price
//! reference. Built once at startup and shared read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which subscription domain a tier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierScope {
    Platform,
    Creator,
}

/// A named entitlement level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDefinition {
    pub id: String,
    pub rank: u8,
    pub scope: TierScope,
    /// Length of one billing period in calendar months.
    pub period_months: u32,
    /// Billing processor price id; `None` means the tier cannot be purchased.
    pub price_ref: Option<String>,
}

impl TierDefinition {
    pub fn new(id: impl Into<String>, rank: u8, scope: TierScope) -> Self {
        Self {
            id: id.into(),
            rank,
            scope,
            period_months: 1,
            price_ref: None,
        }
    }

    #[must_use]
    pub fn with_period_months(mut self, months: u32) -> Self {
        self.period_months = months.max(1);
        self
    }
}

/// Lookup of an id that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tier: {0}")]
pub struct TierNotFound(pub String);

/// Immutable tier table.
#[derive(Debug, Clone, Default)]
pub struct TierRegistry {
    tiers: HashMap<String, TierDefinition>,
    aliases: HashMap<String, String>,
}

impl TierRegistry {
    /// Creates a registry from explicit definitions.
    pub fn new(definitions: impl IntoIterator<Item = TierDefinition>) -> Self {
        let tiers = definitions
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();
        Self {
            tiers,
            aliases: HashMap::new(),
        }
    }

    /// The platform and creator tiers offered by the product, without prices.
    ///
    /// Creator tiers also answer to their short names (`basic`, `pro`, `vip`),
    /// which is how posts record their minimum tier.
    pub fn standard() -> Self {
        Self::new([
            TierDefinition::new("premium-monthly", 1, TierScope::Platform),
            TierDefinition::new("premium-yearly", 2, TierScope::Platform).with_period_months(12),
            TierDefinition::new("creator-basic", 1, TierScope::Creator),
            TierDefinition::new("creator-pro", 2, TierScope::Creator),
            TierDefinition::new("creator-vip", 3, TierScope::Creator),
        ])
        .with_alias("basic", "creator-basic")
        .with_alias("pro", "creator-pro")
        .with_alias("vip", "creator-vip")
    }

    /// Registers an alternate name for an existing tier.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, tier_id: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), tier_id.into());
        self
    }

    /// Attaches a price reference. Unknown ids and empty prices are ignored.
    #[must_use]
    pub fn with_price(mut self, tier_id: &str, price_ref: Option<String>) -> Self {
        let canonical = self.canonical_id(tier_id).map(str::to_owned);
        if let (Some(id), Some(price)) = (canonical, price_ref.filter(|p| !p.trim().is_empty())) {
            if let Some(def) = self.tiers.get_mut(&id) {
                def.price_ref = Some(price);
            }
        }
        self
    }

    fn canonical_id<'a>(&'a self, tier_id: &'a str) -> Option<&'a str> {
        if self.tiers.contains_key(tier_id) {
            return Some(tier_id);
        }
        self.aliases.get(tier_id).map(String::as_str)
    }

    /// Resolves an id or alias to its definition.
    pub fn lookup(&self, tier_id: &str) -> Option<&TierDefinition> {
        self.canonical_id(tier_id).and_then(|id| self.tiers.get(id))
    }

    pub fn rank(&self, tier_id: &str) -> Result<u8, TierNotFound> {
        self.lookup(tier_id)
            .map(|def| def.rank)
            .ok_or_else(|| TierNotFound(tier_id.to_string()))
    }

    pub fn price_ref(&self, tier_id: &str) -> Option<&str> {
        self.lookup(tier_id).and_then(|def| def.price_ref.as_deref())
    }

    /// Billing period for a tier; unknown tiers renew monthly.
    pub fn period_months(&self, tier_id: &str) -> u32 {
        self.lookup(tier_id).map(|def| def.period_months).unwrap_or(1)
    }

    /// Returns true when `held` ranks at or above `required` in the same scope.
    ///
    /// Never errors: unknown ids and cross-scope comparisons are logged and
    /// answered with `false` so callers fail closed.
    pub fn is_sufficient(&self, held: &str, required: &str) -> bool {
        let (Some(held_def), Some(required_def)) = (self.lookup(held), self.lookup(required)) else {
            tracing::warn!(held, required, "Tier comparison with unknown tier id");
            return false;
        };

        if held_def.scope != required_def.scope {
            tracing::warn!(held, required, "Tier comparison across scopes");
            return false;
        }

        held_def.rank >= required_def.rank
    }

    /// Lowest-ranked tier in a scope.
    pub fn entry_tier(&self, scope: TierScope) -> Option<&TierDefinition> {
        self.tiers
            .values()
            .filter(|def| def.scope == scope)
            .min_by_key(|def| def.rank)
    }

    /// All canonical definitions, in no particular order.
    pub fn tiers(&self) -> impl Iterator<Item = &TierDefinition> {
        self.tiers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> TierRegistry {
        TierRegistry::standard()
            .with_price("premium-monthly", Some("price_pm".to_string()))
            .with_price("pro", Some("price_pro".to_string()))
    }

    #[test]
    fn entry_tier_is_lowest_rank_in_scope() {
        let registry = TierRegistry::standard();
        assert_eq!(registry.entry_tier(TierScope::Creator).unwrap().id, "creator-basic");
        assert_eq!(registry.entry_tier(TierScope::Platform).unwrap().id, "premium-monthly");
    }

    #[test]
    fn rank_resolves_ids_and_aliases() {
        let reg = registry();
        assert_eq!(reg.rank("creator-basic"), Ok(1));
        assert_eq!(reg.rank("pro"), Ok(2));
        assert_eq!(reg.rank("vip"), Ok(3));
    }

    #[test]
    fn rank_of_unknown_tier_is_not_found() {
        assert_eq!(
            registry().rank("gold"),
            Err(TierNotFound("gold".to_string()))
        );
    }

    #[test]
    fn pro_covers_basic_and_pro_but_not_vip() {
        let reg = registry();
        assert!(reg.is_sufficient("creator-pro", "basic"));
        assert!(reg.is_sufficient("creator-pro", "creator-pro"));
        assert!(!reg.is_sufficient("creator-pro", "vip"));
    }

    #[test]
    fn unknown_tiers_are_never_sufficient() {
        let reg = registry();
        assert!(!reg.is_sufficient("gold", "basic"));
        assert!(!reg.is_sufficient("vip", "gold"));
        assert!(!reg.is_sufficient("", ""));
    }

    #[test]
    fn cross_scope_comparison_is_not_sufficient() {
        assert!(!registry().is_sufficient("premium-yearly", "creator-basic"));
    }

    #[test]
    fn price_is_attached_through_alias() {
        let reg = registry();
        assert_eq!(reg.price_ref("creator-pro"), Some("price_pro"));
        assert_eq!(reg.price_ref("premium-monthly"), Some("price_pm"));
        assert_eq!(reg.price_ref("creator-vip"), None);
    }

    #[test]
    fn blank_price_is_ignored() {
        let reg = TierRegistry::standard().with_price("creator-vip", Some("  ".to_string()));
        assert_eq!(reg.price_ref("creator-vip"), None);
    }

    #[test]
    fn yearly_tier_renews_for_twelve_months() {
        let reg = registry();
        assert_eq!(reg.period_months("premium-yearly"), 12);
        assert_eq!(reg.period_months("premium-monthly"), 1);
        assert_eq!(reg.period_months("unknown"), 1);
    }

    fn tier_ids() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "premium-monthly",
            "premium-yearly",
            "creator-basic",
            "creator-pro",
            "creator-vip",
            "basic",
            "pro",
            "vip",
        ])
    }

    proptest! {
        #[test]
        fn sufficiency_matches_rank_order_within_scope(a in tier_ids(), b in tier_ids()) {
            let reg = TierRegistry::standard();
            let same_scope = reg.lookup(a).map(|d| d.scope) == reg.lookup(b).map(|d| d.scope);
            let expected = same_scope && reg.rank(a).unwrap() >= reg.rank(b).unwrap();
            prop_assert_eq!(reg.is_sufficient(a, b), expected);
        }

        #[test]
        fn arbitrary_unknown_ids_are_rejected(id in "[a-z]{1,12}") {
            let reg = TierRegistry::standard();
            prop_assume!(reg.lookup(&id).is_none());
            prop_assert!(!reg.is_sufficient(&id, "basic"));
            prop_assert!(!reg.is_sufficient("vip", &id));
        }
    }
}
