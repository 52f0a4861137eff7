//! BillingEventReconciler - Applies billing processor events to subscription state.
//!
//! Every handler is written to be re-run: the processor redelivers any event
//! that was not acknowledged with 2xx, and delivery order is not guaranteed.
//!
//! | Event | Effect | Idempotent on |
//! |-------|--------|---------------|
//! | checkout completed | create row; premium flag or subscriber count | external subscription id |
//! | subscription updated | set mapped status | re-applying a status is a no-op |
//! | subscription cancelled | cancel row; recompute premium or release subscriber | terminal rows stay terminal |
//! | payment succeeded | ledger row, renewal, creator earnings | ledger id derived from invoice id |
//! | payment failed | mark payment failed | same value re-set |
//!
//! The store has no multi-document transactions, so a delivery can fail
//! half way. Every side effect is itself idempotent (subscriber counts and
//! credits are keyed by subscription and payment id, renewals move the end
//! date to a fixed target) and a redelivery re-runs whatever may be missing.
//!
//! Updates, cancellations and payments for rows that do not exist yet are
//! logged and acknowledged.

use std::sync::Arc;
use std::time::Duration;

use crate::application::RetryPolicy;
use crate::domain::billing::{
    BillingEvent, CheckoutCompleted, InvoicePayment, SubscriptionChanged, WebhookError,
};
use crate::domain::foundation::{CreatorId, StateMachine, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{
    CreatorProfile, CreatorSubscription, PaymentStatus, PlatformSubscription, SubscriptionKind,
    SubscriptionLifecycle, SubscriptionPayment, SubscriptionStatus, TierRegistry, TierScope,
};
use crate::ports::{
    PaymentRecordOutcome, StoreError, SubscriptionPatch, SubscriptionStore, UserAccounts,
};

/// Share of each creator subscription payment credited to the creator.
pub const DEFAULT_CREATOR_SHARE: f64 = 0.7;

/// What reconciling one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Checkout created a new subscription row.
    SubscriptionCreated {
        kind: SubscriptionKind,
        subscription_id: SubscriptionId,
    },
    /// A row for this checkout already exists.
    AlreadyProcessed { subscription_id: SubscriptionId },
    StatusChanged {
        subscription_id: SubscriptionId,
        status: SubscriptionStatus,
    },
    /// The row already reflected the event.
    Unchanged { subscription_id: SubscriptionId },
    PaymentRecorded {
        subscription_id: SubscriptionId,
        amount_cents: i64,
    },
    DuplicatePayment { subscription_id: SubscriptionId },
    PaymentFailureRecorded { subscription_id: SubscriptionId },
    /// Acknowledged without any state change.
    Ignored { reason: String },
}

impl ReconcileOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        ReconcileOutcome::Ignored {
            reason: reason.into(),
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::SubscriptionCreated { .. } => "subscription_created",
            ReconcileOutcome::AlreadyProcessed { .. } => "already_processed",
            ReconcileOutcome::StatusChanged { .. } => "status_changed",
            ReconcileOutcome::Unchanged { .. } => "unchanged",
            ReconcileOutcome::PaymentRecorded { .. } => "payment_recorded",
            ReconcileOutcome::DuplicatePayment { .. } => "duplicate_payment",
            ReconcileOutcome::PaymentFailureRecorded { .. } => "payment_failure_recorded",
            ReconcileOutcome::Ignored { .. } => "ignored",
        }
    }
}

/// Subscription row matched by external subscription id.
enum MatchedRow {
    Platform(PlatformSubscription),
    Creator(CreatorSubscription),
}

impl MatchedRow {
    fn id(&self) -> SubscriptionId {
        match self {
            MatchedRow::Platform(sub) => sub.id,
            MatchedRow::Creator(sub) => sub.id,
        }
    }

    fn kind(&self) -> SubscriptionKind {
        match self {
            MatchedRow::Platform(sub) => sub.kind(),
            MatchedRow::Creator(sub) => sub.kind(),
        }
    }

    fn tier_id(&self) -> &str {
        match self {
            MatchedRow::Platform(sub) => &sub.tier_id,
            MatchedRow::Creator(sub) => &sub.tier_id,
        }
    }

    fn lifecycle(&self) -> &SubscriptionLifecycle {
        match self {
            MatchedRow::Platform(sub) => &sub.lifecycle,
            MatchedRow::Creator(sub) => &sub.lifecycle,
        }
    }

    fn lifecycle_mut(&mut self) -> &mut SubscriptionLifecycle {
        match self {
            MatchedRow::Platform(sub) => &mut sub.lifecycle,
            MatchedRow::Creator(sub) => &mut sub.lifecycle,
        }
    }
}

fn store_error(err: StoreError) -> WebhookError {
    WebhookError::Store(err.to_string())
}

/// Reconciles decoded billing events against the subscription store and the
/// user accounts.
///
/// Store failures surface as [`WebhookError::Store`] so the processor
/// redelivers. There is no local retry on this path.
pub struct BillingEventReconciler {
    store: Arc<dyn SubscriptionStore>,
    accounts: Arc<dyn UserAccounts>,
    tiers: Arc<TierRegistry>,
    creator_share: f64,
    calls: RetryPolicy,
}

impl BillingEventReconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        accounts: Arc<dyn UserAccounts>,
        tiers: Arc<TierRegistry>,
    ) -> Self {
        Self {
            store,
            accounts,
            tiers,
            creator_share: DEFAULT_CREATOR_SHARE,
            calls: RetryPolicy::single_attempt(Duration::from_secs(5)),
        }
    }

    pub fn with_creator_share(mut self, share: f64) -> Self {
        self.creator_share = share;
        self
    }

    /// Bounds every store call by `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.calls = RetryPolicy::single_attempt(timeout);
        self
    }

    pub async fn reconcile(&self, event: BillingEvent) -> Result<ReconcileOutcome, WebhookError> {
        match event {
            BillingEvent::CheckoutCompleted(checkout) => self.checkout_completed(checkout).await,
            BillingEvent::SubscriptionUpdated(changed) => {
                let Some(target) = SubscriptionStatus::from_processor(&changed.processor_status)
                else {
                    tracing::info!(
                        external_subscription_id = %changed.external_subscription_id,
                        status = %changed.processor_status,
                        "Processor status has no lifecycle meaning, ignoring"
                    );
                    return Ok(ReconcileOutcome::ignored(format!(
                        "status {} not tracked",
                        changed.processor_status
                    )));
                };
                self.apply_status(&changed, target).await
            }
            BillingEvent::SubscriptionCancelled(changed) => {
                self.apply_status(&changed, SubscriptionStatus::Cancelled).await
            }
            BillingEvent::PaymentSucceeded(invoice) => self.payment_succeeded(invoice).await,
            BillingEvent::PaymentFailed(invoice) => self.payment_failed(invoice).await,
            BillingEvent::Unknown { event_type } => {
                tracing::warn!(event_type = %event_type, "Unhandled billing event type");
                Ok(ReconcileOutcome::ignored(format!("unhandled event type {}", event_type)))
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout
    // ════════════════════════════════════════════════════════════════════════════

    async fn checkout_completed(
        &self,
        checkout: CheckoutCompleted,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let metadata = checkout.metadata;
        let user_id = metadata
            .user_id
            .as_deref()
            .and_then(|id| UserId::new(id).ok())
            .ok_or(WebhookError::MissingMetadata("userId"))?;

        let Some(external_id) = checkout.external_subscription_id else {
            tracing::warn!(
                session_id = %checkout.session_id,
                user_id = %user_id,
                "Checkout completed without a subscription, ignoring"
            );
            return Ok(ReconcileOutcome::ignored("checkout has no subscription"));
        };

        let scope = match metadata.kind {
            SubscriptionKind::Platform => TierScope::Platform,
            SubscriptionKind::Creator => TierScope::Creator,
        };
        let (tier_id, period_months) = self.resolve_tier(metadata.tier_id.as_deref(), scope)?;

        match metadata.kind {
            SubscriptionKind::Platform => {
                self.create_platform(user_id, tier_id, external_id, period_months)
                    .await
            }
            SubscriptionKind::Creator => {
                let creator_id = metadata
                    .creator_id
                    .as_deref()
                    .and_then(|id| CreatorId::new(id).ok())
                    .ok_or(WebhookError::MissingMetadata("creatorId"))?;
                self.create_creator(user_id, creator_id, tier_id, external_id, period_months)
                    .await
            }
        }
    }

    /// Canonical tier id and billing period for checkout metadata.
    fn resolve_tier(
        &self,
        tier_id: Option<&str>,
        scope: TierScope,
    ) -> Result<(String, u32), WebhookError> {
        match tier_id {
            Some(raw) => match self.tiers.lookup(raw) {
                Some(def) => Ok((def.id.clone(), def.period_months)),
                None => {
                    tracing::warn!(tier_id = %raw, "Checkout for unknown tier, storing as given");
                    Ok((raw.to_string(), 1))
                }
            },
            None => {
                let def = self
                    .tiers
                    .entry_tier(scope)
                    .ok_or(WebhookError::MissingMetadata("tierId"))?;
                tracing::warn!(tier_id = %def.id, "Checkout metadata has no tier, using entry tier");
                Ok((def.id.clone(), def.period_months))
            }
        }
    }

    async fn create_platform(
        &self,
        user_id: UserId,
        tier_id: String,
        external_id: String,
        period_months: u32,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let existing = self
            .call("platform_subscription_by_external_id", || {
                self.store.platform_subscription_by_external_id(&external_id)
            })
            .await?;

        if let Some(existing) = existing {
            tracing::info!(
                subscription_id = %existing.id,
                external_subscription_id = %external_id,
                "Checkout already reconciled"
            );
            // The flag write may have failed on the first delivery.
            if existing.is_active() {
                self.call("set_premium", || self.accounts.set_premium(&existing.user_id, true))
                    .await?;
            }
            return Ok(ReconcileOutcome::AlreadyProcessed {
                subscription_id: existing.id,
            });
        }

        let subscription =
            PlatformSubscription::from_checkout(user_id, tier_id, external_id, period_months);
        self.call("upsert_platform", || self.store.upsert_platform(&subscription))
            .await?;
        self.call("set_premium", || {
            self.accounts.set_premium(&subscription.user_id, true)
        })
        .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            tier = %subscription.tier_id,
            "Platform subscription created"
        );

        Ok(ReconcileOutcome::SubscriptionCreated {
            kind: SubscriptionKind::Platform,
            subscription_id: subscription.id,
        })
    }

    async fn create_creator(
        &self,
        subscriber_id: UserId,
        creator_id: CreatorId,
        tier_id: String,
        external_id: String,
        period_months: u32,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let existing = self
            .call("creator_subscription_by_external_id", || {
                self.store.creator_subscription_by_external_id(&external_id)
            })
            .await?;

        if let Some(existing) = existing {
            tracing::info!(
                subscription_id = %existing.id,
                external_subscription_id = %external_id,
                "Checkout already reconciled"
            );
            // The count or the supersede may have failed on the first delivery.
            if existing.is_active() {
                self.settle_pair(&existing).await?;
            }
            return Ok(ReconcileOutcome::AlreadyProcessed {
                subscription_id: existing.id,
            });
        }

        let subscription = CreatorSubscription::from_checkout(
            subscriber_id,
            creator_id,
            tier_id,
            external_id,
            period_months,
        );

        // New row first: until it exists a redelivery starts from scratch.
        self.call("upsert_creator", || self.store.upsert_creator(&subscription))
            .await?;
        let superseded = self.settle_pair(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            subscriber_id = %subscription.subscriber_id,
            creator_id = %subscription.creator_id,
            tier = %subscription.tier_id,
            superseded,
            "Creator subscription created"
        );

        Ok(ReconcileOutcome::SubscriptionCreated {
            kind: SubscriptionKind::Creator,
            subscription_id: subscription.id,
        })
    }

    /// Leaves one active row for the subscriber and creator of `current`:
    /// the newest. Older active rows are replaced and their subscribers
    /// released, so the count stays where it was. When a newer row exists,
    /// `current` is the one replaced. Returns how many rows were replaced.
    async fn settle_pair(&self, current: &CreatorSubscription) -> Result<usize, WebhookError> {
        let active: Vec<CreatorSubscription> = self
            .call("active_creator_subscriptions", || {
                self.store.active_creator_subscriptions(&current.subscriber_id)
            })
            .await?
            .into_iter()
            .filter(|sub| sub.creator_id == current.creator_id && sub.id != current.id)
            .collect();

        if active
            .iter()
            .any(|sub| sub.lifecycle.created_at > current.lifecycle.created_at)
        {
            self.replace(current.clone(), current).await?;
            return Ok(1);
        }

        let profile = self
            .call("count_subscriber", || {
                self.accounts
                    .count_subscriber(&current.creator_id, &current.id)
            })
            .await?;
        tracing::debug!(
            subscription_id = %current.id,
            subscriber_count = profile.subscriber_count,
            "Creator subscriber counted"
        );

        let replaced = active.len();
        for previous in active {
            self.replace(previous, current).await?;
        }
        Ok(replaced)
    }

    /// Releases the subscriber of `previous`, then cancels the row.
    ///
    /// The release goes first: an active row is what a redelivery looks
    /// for, so it stays active until nothing else is left to do.
    async fn replace(
        &self,
        mut previous: CreatorSubscription,
        by: &CreatorSubscription,
    ) -> Result<(), WebhookError> {
        self.release_subscriber(&previous).await?;

        if let Err(err) = previous
            .lifecycle
            .apply_status(SubscriptionStatus::Cancelled, Timestamp::now())
        {
            tracing::warn!(subscription_id = %previous.id, error = %err, "Could not supersede row");
            return Ok(());
        }
        let patch = SubscriptionPatch::from_lifecycle(&previous.lifecycle);
        self.call("update_fields", || {
            self.store
                .update_fields(SubscriptionKind::Creator, &previous.id, patch.clone())
        })
        .await?;

        tracing::info!(
            subscription_id = %previous.id,
            replaced_by = %by.id,
            creator_id = %previous.creator_id,
            "Creator subscription replaced"
        );
        Ok(())
    }

    async fn release_subscriber(
        &self,
        subscription: &CreatorSubscription,
    ) -> Result<CreatorProfile, WebhookError> {
        let profile = self
            .call("release_subscriber", || {
                self.accounts
                    .release_subscriber(&subscription.creator_id, &subscription.id)
            })
            .await?;
        tracing::info!(
            subscription_id = %subscription.id,
            creator_id = %subscription.creator_id,
            subscriber_count = profile.subscriber_count,
            "Creator subscriber released"
        );
        Ok(profile)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Status changes
    // ════════════════════════════════════════════════════════════════════════════

    async fn apply_status(
        &self,
        changed: &SubscriptionChanged,
        target: SubscriptionStatus,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let external_id = &changed.external_subscription_id;
        let Some(mut row) = self.find_row(external_id, changed.kind).await? else {
            tracing::info!(
                external_subscription_id = %external_id,
                status = %target,
                "No subscription row for status change, ignoring"
            );
            return Ok(ReconcileOutcome::ignored("no matching subscription"));
        };

        let now = Timestamp::now();
        let changed_now = match row.lifecycle_mut().apply_status(target, now) {
            Ok(changed) => changed,
            Err(err) => {
                tracing::warn!(
                    subscription_id = %row.id(),
                    status = %target,
                    error = %err,
                    "Refusing to reactivate a terminal subscription"
                );
                return Ok(ReconcileOutcome::Unchanged {
                    subscription_id: row.id(),
                });
            }
        };

        let (kind, id) = (row.kind(), row.id());
        if changed_now {
            let patch = SubscriptionPatch::from_lifecycle(row.lifecycle_mut());
            self.call("update_fields", || {
                self.store.update_fields(kind, &id, patch.clone())
            })
            .await?;
            tracing::info!(
                subscription_id = %row.id(),
                kind = %row.kind(),
                status = %target,
                "Subscription status changed"
            );
        }

        // Both effects are idempotent, so they also run when the row was
        // already terminal and finish whatever a failed delivery left undone.
        if target.is_terminal() {
            match &row {
                MatchedRow::Platform(sub) => self.recompute_premium(&sub.user_id).await?,
                MatchedRow::Creator(sub) => {
                    self.release_subscriber(sub).await?;
                }
            }
        }

        Ok(if changed_now {
            ReconcileOutcome::StatusChanged {
                subscription_id: row.id(),
                status: target,
            }
        } else {
            ReconcileOutcome::Unchanged {
                subscription_id: row.id(),
            }
        })
    }

    /// Sets `isPremium` to whether any platform row of the user is still active.
    async fn recompute_premium(&self, user_id: &UserId) -> Result<(), WebhookError> {
        let active = self
            .call("active_platform_subscriptions", || {
                self.store.active_platform_subscriptions(user_id)
            })
            .await?;
        let is_premium = !active.is_empty();
        self.call("set_premium", || self.accounts.set_premium(user_id, is_premium))
            .await?;
        tracing::info!(user_id = %user_id, is_premium, "Premium flag recomputed");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payments
    // ════════════════════════════════════════════════════════════════════════════

    async fn payment_succeeded(
        &self,
        invoice: InvoicePayment,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let Some(mut row) = self.invoice_row(&invoice).await? else {
            return Ok(ReconcileOutcome::ignored("no matching subscription"));
        };

        let now = Timestamp::now();
        let period_months = self.tiers.period_months(row.tier_id());
        // Checkout already covered the first period.
        let period_end = (!invoice.is_initial)
            .then(|| row.lifecycle().renewal_end(period_months, now));
        let payment = SubscriptionPayment::paid(
            row.id(),
            invoice.invoice_id.clone(),
            invoice.amount_cents,
            invoice.currency.clone(),
        )
        .with_period_end(period_end);

        // The ledger row goes first and is marked applied last. A redelivery
        // that finds it unapplied finishes the effects from the stored row.
        let recorded = self
            .call("record_payment", || self.store.record_payment(&payment))
            .await?;
        let payment = match recorded {
            PaymentRecordOutcome::Recorded => payment,
            PaymentRecordOutcome::Pending(stored) => {
                tracing::info!(
                    subscription_id = %row.id(),
                    invoice_id = %invoice.invoice_id,
                    "Resuming partially applied payment"
                );
                stored
            }
            PaymentRecordOutcome::Duplicate => {
                tracing::info!(
                    subscription_id = %row.id(),
                    invoice_id = %invoice.invoice_id,
                    "Payment already recorded"
                );
                return Ok(ReconcileOutcome::DuplicatePayment {
                    subscription_id: row.id(),
                });
            }
        };

        let (kind, id) = (row.kind(), row.id());
        let lifecycle = row.lifecycle_mut();
        match payment.period_end {
            Some(until) => lifecycle.apply_renewal(until, now),
            None => {
                lifecycle.payment_status = PaymentStatus::Paid;
                lifecycle.updated_at = now;
            }
        }
        let patch = SubscriptionPatch {
            end_date: payment.period_end.map(|_| lifecycle.end_date),
            payment_status: Some(PaymentStatus::Paid),
            updated_at: Some(now),
            ..Default::default()
        };
        self.call("update_fields", || {
            self.store.update_fields(kind, &id, patch.clone())
        })
        .await?;

        if let MatchedRow::Creator(sub) = &row {
            let credit = payment.creator_share(self.creator_share);
            let profile = self
                .call("credit_earnings", || {
                    self.accounts.credit_earnings(&sub.creator_id, &payment.id, credit)
                })
                .await?;
            tracing::info!(
                creator_id = %sub.creator_id,
                credit,
                total_earnings = profile.total_earnings,
                "Creator earnings credited"
            );
        }

        self.call("mark_payment_applied", || {
            self.store.mark_payment_applied(&payment.id)
        })
        .await?;

        // The ledger row now guards redelivery; the credit marker can go.
        if let MatchedRow::Creator(sub) = &row {
            if let Err(err) = self
                .call("forget_credit", || {
                    self.accounts.forget_credit(&sub.creator_id, &payment.id)
                })
                .await
            {
                tracing::warn!(
                    creator_id = %sub.creator_id,
                    payment_id = %payment.id,
                    error = %err,
                    "Could not clear earnings credit marker"
                );
            }
        }

        tracing::info!(
            subscription_id = %row.id(),
            invoice_id = %invoice.invoice_id,
            amount_cents = payment.amount_cents,
            initial = invoice.is_initial,
            "Payment recorded"
        );

        Ok(ReconcileOutcome::PaymentRecorded {
            subscription_id: row.id(),
            amount_cents: payment.amount_cents,
        })
    }

    async fn payment_failed(
        &self,
        invoice: InvoicePayment,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let Some(mut row) = self.invoice_row(&invoice).await? else {
            return Ok(ReconcileOutcome::ignored("no matching subscription"));
        };

        let (kind, id) = (row.kind(), row.id());
        let now = Timestamp::now();
        if !row.lifecycle_mut().mark_payment_failed(now) {
            return Ok(ReconcileOutcome::Unchanged {
                subscription_id: row.id(),
            });
        }

        let patch = SubscriptionPatch {
            payment_status: Some(PaymentStatus::Failed),
            updated_at: Some(now),
            ..Default::default()
        };
        self.call("update_fields", || {
            self.store.update_fields(kind, &id, patch.clone())
        })
        .await?;

        tracing::warn!(
            subscription_id = %row.id(),
            invoice_id = %invoice.invoice_id,
            "Subscription payment failed"
        );

        Ok(ReconcileOutcome::PaymentFailureRecorded {
            subscription_id: row.id(),
        })
    }

    async fn invoice_row(&self, invoice: &InvoicePayment) -> Result<Option<MatchedRow>, WebhookError> {
        let Some(external_id) = invoice.external_subscription_id.as_deref() else {
            tracing::info!(invoice_id = %invoice.invoice_id, "Invoice not tied to a subscription");
            return Ok(None);
        };

        let row = self.find_row(external_id, invoice.kind).await?;
        if row.is_none() {
            tracing::info!(
                invoice_id = %invoice.invoice_id,
                external_subscription_id = %external_id,
                "No subscription row for invoice, ignoring"
            );
        }
        Ok(row)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lookup
    // ════════════════════════════════════════════════════════════════════════════

    /// Searches the collection named by `hint` first, then the other one.
    /// Without a hint the platform collection goes first.
    async fn find_row(
        &self,
        external_id: &str,
        hint: Option<SubscriptionKind>,
    ) -> Result<Option<MatchedRow>, WebhookError> {
        let order = match hint {
            Some(SubscriptionKind::Creator) => [SubscriptionKind::Creator, SubscriptionKind::Platform],
            _ => [SubscriptionKind::Platform, SubscriptionKind::Creator],
        };

        for kind in order {
            let found = match kind {
                SubscriptionKind::Platform => self
                    .call("platform_subscription_by_external_id", || {
                        self.store.platform_subscription_by_external_id(external_id)
                    })
                    .await?
                    .map(MatchedRow::Platform),
                SubscriptionKind::Creator => self
                    .call("creator_subscription_by_external_id", || {
                        self.store.creator_subscription_by_external_id(external_id)
                    })
                    .await?
                    .map(MatchedRow::Creator),
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, WebhookError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        self.calls.run(operation, op).await.map_err(store_error)
    }
}
