//! ReconcilePremiumFlagsHandler - Command handler that repairs `isPremium` flags.
//!
//! The subscription row and the user's premium flag are written separately,
//! so a failure between the two leaves the flag stale until the next event.
//! This sweep recomputes the flag from the active platform rows.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{StoreError, SubscriptionStore, UserAccounts};

/// Command to recompute premium flags.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePremiumFlagsCommand {
    /// Only this user; `None` sweeps every user holding a platform row.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePremiumFlagsResult {
    pub users_checked: usize,
    pub flags_changed: usize,
    /// Users whose recompute failed; their flag is left as it was.
    pub failures: usize,
}

/// Handler for the premium flag sweep.
pub struct ReconcilePremiumFlagsHandler {
    store: Arc<dyn SubscriptionStore>,
    accounts: Arc<dyn UserAccounts>,
}

impl ReconcilePremiumFlagsHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, accounts: Arc<dyn UserAccounts>) -> Self {
        Self { store, accounts }
    }

    pub async fn handle(
        &self,
        cmd: ReconcilePremiumFlagsCommand,
    ) -> Result<ReconcilePremiumFlagsResult, SubscriptionError> {
        let users = match cmd.user_id {
            Some(user_id) => vec![user_id],
            None => self.store.platform_subscriber_ids().await.map_err(|err| {
                tracing::error!(error = %err, "Failed to list platform subscribers");
                SubscriptionError::infrastructure(err.to_string())
            })?,
        };

        let mut result = ReconcilePremiumFlagsResult {
            users_checked: users.len(),
            ..Default::default()
        };

        for user_id in &users {
            match self.reconcile_user(user_id).await {
                Ok(true) => result.flags_changed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(user_id = %user_id, error = %err, "Premium flag recompute failed");
                    result.failures += 1;
                }
            }
        }

        tracing::info!(
            users_checked = result.users_checked,
            flags_changed = result.flags_changed,
            failures = result.failures,
            "Premium flag sweep finished"
        );
        Ok(result)
    }

    /// Returns true when the stored flag was wrong and has been rewritten.
    async fn reconcile_user(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let active = self.store.active_platform_subscriptions(user_id).await?;
        let should_be_premium = !active.is_empty();
        let stored = self
            .accounts
            .account(user_id)
            .await?
            .map(|account| account.is_premium)
            .unwrap_or(false);

        if stored == should_be_premium {
            return Ok(false);
        }

        self.accounts.set_premium(user_id, should_be_premium).await?;
        tracing::info!(
            user_id = %user_id,
            is_premium = should_be_premium,
            "Premium flag corrected"
        );
        Ok(true)
    }
}
