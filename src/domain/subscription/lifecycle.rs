//! Lifecycle fields shared by platform and creator subscriptions.

use crate::domain::foundation::{DomainError, StateMachine, Timestamp};

use super::status::{PaymentStatus, SubscriptionStatus};

/// Status, billing period and processor link of a subscription row.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionLifecycle {
    pub status: SubscriptionStatus,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub auto_renew: bool,
    pub payment_status: PaymentStatus,
    /// Processor subscription id (`sub_...`); the reconciler's lookup key.
    pub external_subscription_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionLifecycle {
    /// A freshly paid subscription covering one period from `now`.
    pub fn started(external_subscription_id: impl Into<String>, period_months: u32, now: Timestamp) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: now.add_months(period_months),
            auto_renew: true,
            payment_status: PaymentStatus::Paid,
            external_subscription_id: external_subscription_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Moves the row to `target`.
    ///
    /// Returns `Ok(true)` when the status changed, `Ok(false)` when the row
    /// was already there (or already in a terminal state and `target` is
    /// terminal too). Reactivating a terminal row is an error.
    pub fn apply_status(&mut self, target: SubscriptionStatus, now: Timestamp) -> Result<bool, DomainError> {
        if self.status == target {
            return Ok(false);
        }
        if self.status.is_terminal() && target != SubscriptionStatus::Active {
            return Ok(false);
        }

        self.status = self.status.transition_to(target)?;
        if self.status.is_terminal() {
            self.auto_renew = false;
        }
        self.updated_at = now;
        Ok(true)
    }

    /// End date after renewing for `period_months` at `now`.
    ///
    /// The extension starts from the current end date, or from `now` when
    /// the row has already lapsed.
    pub fn renewal_end(&self, period_months: u32, now: Timestamp) -> Timestamp {
        self.end_date.later_of(now).add_months(period_months)
    }

    /// Marks the charge paid and moves the end date to `until` unless it is
    /// already later. Applying the same renewal twice extends once.
    pub fn apply_renewal(&mut self, until: Timestamp, now: Timestamp) {
        self.end_date = self.end_date.later_of(until);
        self.payment_status = PaymentStatus::Paid;
        self.updated_at = now;
    }

    /// Returns true if the payment status changed.
    pub fn mark_payment_failed(&mut self, now: Timestamp) -> bool {
        if self.payment_status == PaymentStatus::Failed {
            return false;
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    fn active() -> SubscriptionLifecycle {
        SubscriptionLifecycle::started("sub_1", 1, Timestamp::now())
    }

    #[test]
    fn started_row_is_active_and_paid() {
        let row = active();
        assert!(row.is_active());
        assert!(row.auto_renew);
        assert_eq!(row.payment_status, PaymentStatus::Paid);
        assert!(row.end_date.is_after(&row.start_date));
    }

    #[test]
    fn cancelling_twice_changes_once() {
        let mut row = active();
        assert_eq!(row.apply_status(SubscriptionStatus::Cancelled, Timestamp::now()), Ok(true));
        assert_eq!(row.apply_status(SubscriptionStatus::Cancelled, Timestamp::now()), Ok(false));
        assert!(!row.auto_renew);
    }

    #[test]
    fn expiring_a_cancelled_row_is_a_no_op() {
        let mut row = active();
        row.apply_status(SubscriptionStatus::Cancelled, Timestamp::now()).unwrap();
        assert_eq!(row.apply_status(SubscriptionStatus::Expired, Timestamp::now()), Ok(false));
        assert_eq!(row.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn reactivating_a_cancelled_row_fails() {
        let mut row = active();
        row.apply_status(SubscriptionStatus::Cancelled, Timestamp::now()).unwrap();
        let err = row.apply_status(SubscriptionStatus::Active, Timestamp::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn renewal_extends_from_current_end_date() {
        let now = Timestamp::now();
        let mut row = SubscriptionLifecycle::started("sub_1", 1, now);
        let previous_end = row.end_date;
        let until = row.renewal_end(1, now);
        row.apply_renewal(until, now);
        assert_eq!(row.end_date, previous_end.add_months(1));
    }

    #[test]
    fn renewal_of_lapsed_row_starts_from_now() {
        let now = Timestamp::now();
        let row = SubscriptionLifecycle::started("sub_1", 1, now.add_days(-90));
        assert_eq!(row.renewal_end(1, now), now.add_months(1));
    }

    #[test]
    fn renewal_clears_failed_payment() {
        let now = Timestamp::now();
        let mut row = active();
        assert!(row.mark_payment_failed(now));
        assert!(!row.mark_payment_failed(now));
        let until = row.renewal_end(1, now);
        row.apply_renewal(until, now);
        assert_eq!(row.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn reapplying_a_renewal_does_not_extend_again() {
        let now = Timestamp::now();
        let mut row = active();
        let until = row.renewal_end(1, now);

        row.apply_renewal(until, now);
        row.apply_renewal(until, now);

        assert_eq!(row.end_date, until);
    }
}
