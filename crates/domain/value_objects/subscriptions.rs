use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::{
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        users::UserSummaryEntity,
    },
    value_objects::{
        enums::{plan_types::PlanType, subscription_statuses::SubscriptionStatus},
        pagination::{PageRequest, Pagination},
    },
};

/// Plan reported for users without a live subscription.
pub const FREE_PLAN: &str = "free";

/// Pending orders must be paid within this many minutes.
pub const ORDER_TOKEN_TTL_MINUTES: i64 = 30;

/// Start and end of a billing period beginning at `start`.
///
/// Uses calendar-month addition, so a monthly period starting on Jan 31
/// ends on the last day of February.
pub fn subscription_period(
    plan: PlanType,
    start: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let end = start.checked_add_months(Months::new(plan.period_months()))?;
    Some((start, end))
}

pub fn is_expired(now: DateTime<Utc>, end_date: DateTime<Utc>) -> bool {
    now > end_date
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: i64,
    pub user_id: i64,
    pub plan_type: String,
    pub includes: Vec<String>,
    pub transaction_id: String,
    pub transaction_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            plan_type: value.plan_type,
            includes: value.includes,
            transaction_id: value.transaction_id,
            transaction_date: value.transaction_date,
            status: SubscriptionStatus::from_str(&value.status)
                .unwrap_or(SubscriptionStatus::Expired),
            start_date: value.start_date,
            end_date: value.end_date,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryDto {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UserSummaryEntity> for UserSummaryDto {
    fn from(value: UserSummaryEntity) -> Self {
        Self {
            id: value.id,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderModel {
    pub plan_type: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key: String,
}

/// Confirmation payload the gateway's checkout widget hands to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentModel {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPaymentDto {
    pub subscription: SubscriptionDto,
    pub payment_id: String,
    pub plan_type: PlanType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSubscriptionDto {
    pub has_subscription: bool,
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionDto>,
}

impl CurrentSubscriptionDto {
    pub fn free() -> Self {
        Self {
            has_subscription: false,
            plan: FREE_PLAN.to_string(),
            subscription: None,
        }
    }

    pub fn from_subscription(subscription: SubscriptionDto) -> Self {
        Self {
            has_subscription: subscription.status == SubscriptionStatus::Active,
            plan: subscription.plan_type.clone(),
            subscription: Some(subscription),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionModel {
    pub subscription_id: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CanceledSubscriptionDto {
    pub subscription: SubscriptionDto,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSubscriptionDto {
    pub subscription: SubscriptionDto,
    pub user: UserSummaryDto,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionWithUserDto {
    #[serde(flatten)]
    pub subscription: SubscriptionDto,
    pub user: UserSummaryDto,
}

impl From<(SubscriptionEntity, UserSummaryEntity)> for SubscriptionWithUserDto {
    fn from((subscription, user): (SubscriptionEntity, UserSummaryEntity)) -> Self {
        Self {
            subscription: subscription.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionListDto {
    pub subscriptions: Vec<SubscriptionWithUserDto>,
    pub pagination: Pagination,
}

/// Everything the repository needs to turn a paid order into a subscription
/// in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSubscriptionModel {
    pub user_id: i64,
    pub order_id: String,
    pub token_type: String,
    pub now: DateTime<Utc>,
    pub subscription: InsertSubscriptionEntity,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSubscriptionsFilter {
    pub status: Option<SubscriptionStatus>,
    pub plan_type: Option<PlanType>,
    pub page: PageRequest,
}
