use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, RunQueryDsl, dsl::count_star, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscriptions, user_tokens, users},
    },
};
use domain::{
    entities::{subscriptions::SubscriptionEntity, users::UserSummaryEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{ActivateSubscriptionModel, ListSubscriptionsFilter},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn activate_from_order(
        &self,
        activation: ActivateSubscriptionModel,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<Option<SubscriptionEntity>, diesel::result::Error, _>(|tx| {
            // The `used = false` predicate makes a concurrent second attempt
            // block on the row lock and then match nothing.
            let consumed_token = update(user_tokens::table)
                .filter(user_tokens::user_id.eq(activation.user_id))
                .filter(user_tokens::token.eq(&activation.order_id))
                .filter(user_tokens::token_type.eq(&activation.token_type))
                .filter(user_tokens::used.eq(false))
                .filter(user_tokens::expires_at.gt(activation.now))
                .set(user_tokens::used.eq(true))
                .returning(user_tokens::id)
                .get_result::<i64>(tx)
                .optional()?;

            if consumed_token.is_none() {
                return Ok(None);
            }

            let subscription = insert_into(subscriptions::table)
                .values(&activation.subscription)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(tx)?;

            update(users::table)
                .filter(users::id.eq(activation.user_id))
                .set(users::updated_at.eq(activation.now))
                .execute(tx)?;

            Ok(Some(subscription))
        })?;

        Ok(result)
    }

    async fn find_latest_by_user(&self, user_id: i64) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order((subscriptions::created_at.desc(), subscriptions::id.desc()))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_latest_with_user(
        &self,
        user_id: i64,
    ) -> Result<Option<(SubscriptionEntity, UserSummaryEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .inner_join(users::table)
            .filter(subscriptions::user_id.eq(user_id))
            .order((subscriptions::created_at.desc(), subscriptions::id.desc()))
            .select((SubscriptionEntity::as_select(), UserSummaryEntity::as_select()))
            .first::<(SubscriptionEntity, UserSummaryEntity)>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Expired.to_string()),
                subscriptions::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn cancel(
        &self,
        user_id: i64,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Ownership lives in the predicate so there is no read-then-write gap.
        let result = update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Canceled.to_string()),
                subscriptions::updated_at.eq(now),
            ))
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_with_users(
        &self,
        filter: ListSubscriptionsFilter,
    ) -> Result<(Vec<(SubscriptionEntity, UserSummaryEntity)>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut count_query = subscriptions::table.select(count_star()).into_boxed();
        let mut rows_query = subscriptions::table
            .inner_join(users::table)
            .select((SubscriptionEntity::as_select(), UserSummaryEntity::as_select()))
            .into_boxed();

        if let Some(status) = filter.status {
            count_query = count_query.filter(subscriptions::status.eq(status.to_string()));
            rows_query = rows_query.filter(subscriptions::status.eq(status.to_string()));
        }

        if let Some(plan_type) = filter.plan_type {
            count_query = count_query.filter(subscriptions::plan_type.eq(plan_type.to_string()));
            rows_query = rows_query.filter(subscriptions::plan_type.eq(plan_type.to_string()));
        }

        let total_count = count_query.get_result::<i64>(&mut conn)?;

        let offset = filter
            .page
            .offset()
            .ok_or_else(|| anyhow!("page {} is out of range", filter.page.page))?;

        let rows = rows_query
            .order((subscriptions::created_at.desc(), subscriptions::id.desc()))
            .limit(filter.page.limit)
            .offset(offset)
            .load::<(SubscriptionEntity, UserSummaryEntity)>(&mut conn)?;

        Ok((rows, total_count))
    }
}
