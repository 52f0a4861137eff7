//! Payment ledger rows.

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp};

use super::status::PaymentStatus;

/// Record of one charge against a subscription.
///
/// The id is derived from the processor's payment id, so a redelivered
/// payment event maps onto the row that already exists. A row is written
/// before the renewal and the creator credit run and is marked `applied`
/// once both have; a redelivery that finds an unapplied row finishes them.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPayment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    /// Amount in the currency's minor unit (cents).
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub external_payment_id: String,
    /// End date this payment renews the subscription to. `None` for the
    /// first invoice, which checkout already covered.
    pub period_end: Option<Timestamp>,
    pub applied: bool,
    pub created_at: Timestamp,
}

impl SubscriptionPayment {
    pub fn paid(
        subscription_id: SubscriptionId,
        external_payment_id: impl Into<String>,
        amount_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        let external_payment_id = external_payment_id.into();
        Self {
            id: PaymentId::for_external(&external_payment_id),
            subscription_id,
            amount_cents,
            currency: currency.into(),
            status: PaymentStatus::Paid,
            external_payment_id,
            period_end: None,
            applied: false,
            created_at: Timestamp::now(),
        }
    }

    #[must_use]
    pub fn with_period_end(mut self, period_end: Option<Timestamp>) -> Self {
        self.period_end = period_end;
        self
    }

    /// Amount in major units (dollars).
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// The creator's cut of this payment in major units. Never negative.
    pub fn creator_share(&self, share: f64) -> f64 {
        (self.amount() * share).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_converts_cents_to_major_units() {
        let payment = SubscriptionPayment::paid(SubscriptionId::new(), "in_1", 999, "usd");
        assert!((payment.amount() - 9.99).abs() < 1e-9);
    }

    #[test]
    fn creator_share_is_seventy_percent_of_amount() {
        let payment = SubscriptionPayment::paid(SubscriptionId::new(), "in_1", 1000, "usd");
        assert!((payment.creator_share(0.7) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn creator_share_of_refund_like_amount_is_zero() {
        let payment = SubscriptionPayment::paid(SubscriptionId::new(), "in_1", -500, "usd");
        assert_eq!(payment.creator_share(0.7), 0.0);
    }

    #[test]
    fn new_payment_is_pending_without_renewal() {
        let payment = SubscriptionPayment::paid(SubscriptionId::new(), "in_1", 1000, "usd");
        assert!(!payment.applied);
        assert_eq!(payment.period_end, None);
    }

    #[test]
    fn same_external_payment_yields_same_ledger_id() {
        let sub = SubscriptionId::new();
        let a = SubscriptionPayment::paid(sub, "in_42", 500, "usd");
        let b = SubscriptionPayment::paid(sub, "in_42", 500, "usd");
        assert_eq!(a.id, b.id);
    }
}
