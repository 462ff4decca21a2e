use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::{subscriptions::SubscriptionEntity, users::UserSummaryEntity},
    value_objects::subscriptions::{ActivateSubscriptionModel, ListSubscriptionsFilter},
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    /// Consumes the pending order token and inserts the subscription atomically.
    /// Returns `None` when no unused, unexpired token matches the order.
    async fn activate_from_order(
        &self,
        activation: ActivateSubscriptionModel,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn find_latest_by_user(&self, user_id: i64) -> Result<Option<SubscriptionEntity>>;

    async fn find_latest_with_user(
        &self,
        user_id: i64,
    ) -> Result<Option<(SubscriptionEntity, UserSummaryEntity)>>;

    /// Moves an active row to expired. Returns whether a row changed.
    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool>;

    /// Cancels an active subscription owned by `user_id`.
    async fn cancel(
        &self,
        user_id: i64,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn list_with_users(
        &self,
        filter: ListSubscriptionsFilter,
    ) -> Result<(Vec<(SubscriptionEntity, UserSummaryEntity)>, i64)>;
}
