use std::{collections::HashMap, sync::Arc};

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::Duration;
use crates::{
    domain::{
        entities::{
            subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
            user_tokens::InsertUserTokenEntity,
        },
        repositories::{subscriptions::SubscriptionRepository, user_tokens::UserTokenRepository},
        value_objects::{
            enums::{
                currencies::Currency, plan_types::PlanType,
                subscription_statuses::SubscriptionStatus, token_types::TokenType,
            },
            pagination::Pagination,
            plans::PlanCatalog,
            subscriptions::{
                ActivateSubscriptionModel, CanceledSubscriptionDto, CurrentSubscriptionDto,
                ListSubscriptionsFilter, ORDER_TOKEN_TTL_MINUTES, OrderDto, SubscriptionListDto,
                UserSubscriptionDto, VerifiedPaymentDto, VerifyPaymentModel,
                is_expired, subscription_period,
            },
        },
    },
    payments::razorpay_client::{RazorpayClient, RazorpayOrder},
};
use thiserror::Error;
use tracing::{error, info, warn};

use super::clock::Clock;

const NOTE_USER_ID: &str = "userId";
const NOTE_PLAN_TYPE: &str = "planType";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> String;

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: Currency,
        receipt: String,
        notes: HashMap<String, String>,
    ) -> AnyResult<RazorpayOrder>;

    async fn fetch_order(&self, order_id: &str) -> AnyResult<RazorpayOrder>;

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> String {
        self.key_id().to_string()
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: Currency,
        receipt: String,
        notes: HashMap<String, String>,
    ) -> AnyResult<RazorpayOrder> {
        self.create_order(amount_minor, currency.as_str(), &receipt, &notes)
            .await
    }

    async fn fetch_order(&self, order_id: &str) -> AnyResult<RazorpayOrder> {
        self.fetch_order(order_id).await
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        self.verify_payment_signature(order_id, payment_id, signature)
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Invalid plan type or currency")]
    InvalidPlanOrCurrency,
    #[error("Invalid payment signature")]
    SignatureMismatch,
    #[error("Invalid or expired order")]
    InvalidOrExpiredOrder,
    #[error("Subscription not found")]
    NotFound,
    #[error("You are not allowed to access this subscription")]
    Forbidden,
    #[error("payment gateway request failed")]
    UpstreamGatewayFailure(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::InvalidPlanOrCurrency
            | SubscriptionError::SignatureMismatch
            | SubscriptionError::InvalidOrExpiredOrder => StatusCode::BAD_REQUEST,
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Forbidden => StatusCode::FORBIDDEN,
            SubscriptionError::UpstreamGatewayFailure(_) | SubscriptionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<S, T, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    subscription_repo: Arc<S>,
    token_repo: Arc<T>,
    gateway: Arc<G>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S, T, G> SubscriptionUseCase<S, T, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        token_repo: Arc<T>,
        gateway: Arc<G>,
        catalog: Arc<PlanCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscription_repo,
            token_repo,
            gateway,
            catalog,
            clock,
        }
    }

    pub async fn create_order(
        &self,
        user_id: i64,
        plan_type: &str,
        currency: &str,
    ) -> UseCaseResult<OrderDto> {
        info!(
            %user_id,
            plan_type,
            currency,
            "subscriptions: create order requested"
        );

        let priced = PlanType::from_str(plan_type)
            .zip(Currency::from_str(currency))
            .and_then(|(plan, currency)| {
                self.catalog
                    .price_minor(plan, currency)
                    .map(|amount| (plan, currency, amount))
            });
        let Some((plan, currency, amount)) = priced else {
            let err = SubscriptionError::InvalidPlanOrCurrency;
            warn!(
                %user_id,
                plan_type,
                currency,
                status = err.status_code().as_u16(),
                "subscriptions: rejected unknown plan/currency"
            );
            return Err(err);
        };

        let now = self.clock.now();
        let receipt = format!("rcpt_{}_{}", user_id, now.timestamp_millis());
        let notes = HashMap::from([
            (NOTE_USER_ID.to_string(), user_id.to_string()),
            (NOTE_PLAN_TYPE.to_string(), plan.to_string()),
        ]);

        let order = self
            .gateway
            .create_order(amount, currency, receipt, notes)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_type = %plan,
                    currency = %currency,
                    error = ?err,
                    "subscriptions: gateway order creation failed"
                );
                SubscriptionError::UpstreamGatewayFailure(err)
            })?;

        let token = InsertUserTokenEntity {
            user_id,
            token: order.id.clone(),
            token_type: TokenType::RazorpayOrder.to_string(),
            used: false,
            expires_at: now + Duration::minutes(ORDER_TOKEN_TTL_MINUTES),
            created_at: now,
        };

        self.token_repo
            .insert_pending_token(token)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    order_id = %order.id,
                    db_error = ?err,
                    "subscriptions: failed to store pending order token"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(
            %user_id,
            order_id = %order.id,
            amount,
            currency = %currency,
            "subscriptions: order created"
        );

        Ok(OrderDto {
            order_id: order.id,
            amount,
            currency: currency.to_string(),
            key: self.gateway.key_id(),
        })
    }

    pub async fn verify_payment(
        &self,
        user_id: i64,
        payment: VerifyPaymentModel,
    ) -> UseCaseResult<VerifiedPaymentDto> {
        let order_id = payment.razorpay_order_id;
        let payment_id = payment.razorpay_payment_id;

        info!(
            %user_id,
            order_id = %order_id,
            payment_id = %payment_id,
            "subscriptions: verify payment requested"
        );

        if !self
            .gateway
            .verify_payment_signature(&order_id, &payment_id, &payment.razorpay_signature)
        {
            let err = SubscriptionError::SignatureMismatch;
            warn!(
                %user_id,
                order_id = %order_id,
                status = err.status_code().as_u16(),
                "subscriptions: payment signature mismatch"
            );
            return Err(err);
        }

        let order = self.gateway.fetch_order(&order_id).await.map_err(|err| {
            error!(
                %user_id,
                order_id = %order_id,
                error = ?err,
                "subscriptions: failed to fetch order from gateway"
            );
            SubscriptionError::UpstreamGatewayFailure(err)
        })?;

        let Some(plan) = order.note(NOTE_PLAN_TYPE).and_then(PlanType::from_str) else {
            let err = SubscriptionError::InvalidOrExpiredOrder;
            warn!(
                %user_id,
                order_id = %order_id,
                notes = ?order.notes,
                "subscriptions: order notes carry no known plan type"
            );
            return Err(err);
        };

        let now = self.clock.now();
        let (start_date, end_date) = subscription_period(plan, now)
            .ok_or_else(|| anyhow!("failed to compute subscription end date"))?;

        let activation = ActivateSubscriptionModel {
            user_id,
            order_id: order_id.clone(),
            token_type: TokenType::RazorpayOrder.to_string(),
            now,
            subscription: InsertSubscriptionEntity {
                user_id,
                plan_type: plan.to_string(),
                includes: self.catalog.features(plan).to_vec(),
                transaction_id: payment_id.clone(),
                transaction_date: now,
                status: SubscriptionStatus::Active.to_string(),
                start_date,
                end_date,
                created_at: now,
                updated_at: now,
            },
        };

        let subscription = self
            .subscription_repo
            .activate_from_order(activation)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    order_id = %order_id,
                    db_error = ?err,
                    "subscriptions: activation transaction failed"
                );
                SubscriptionError::Internal(err)
            })?;

        let Some(subscription) = subscription else {
            let err = SubscriptionError::InvalidOrExpiredOrder;
            warn!(
                %user_id,
                order_id = %order_id,
                status = err.status_code().as_u16(),
                "subscriptions: order token missing, used or expired"
            );
            return Err(err);
        };

        info!(
            %user_id,
            order_id = %order_id,
            subscription_id = subscription.id,
            plan_type = %plan,
            end_date = %subscription.end_date,
            "subscriptions: subscription activated"
        );

        Ok(VerifiedPaymentDto {
            subscription: subscription.into(),
            payment_id,
            plan_type: plan,
        })
    }

    pub async fn get_current_subscription(
        &self,
        user_id: i64,
    ) -> UseCaseResult<CurrentSubscriptionDto> {
        info!(%user_id, "subscriptions: loading current subscription for user");

        let latest = self
            .subscription_repo
            .find_latest_by_user(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load current subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        let Some(latest) = latest else {
            info!(%user_id, "subscriptions: no subscription, reporting free plan");
            return Ok(CurrentSubscriptionDto::free());
        };

        match self.settle_expiry(user_id, latest).await? {
            Some(subscription) => Ok(CurrentSubscriptionDto::from_subscription(
                subscription.into(),
            )),
            None => Ok(CurrentSubscriptionDto::free()),
        }
    }

    pub async fn cancel_subscription(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> UseCaseResult<CanceledSubscriptionDto> {
        info!(%user_id, subscription_id, "subscriptions: cancel requested");

        let canceled = self
            .subscription_repo
            .cancel(user_id, subscription_id, self.clock.now())
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to cancel subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        let Some(canceled) = canceled else {
            let err = SubscriptionError::NotFound;
            warn!(
                %user_id,
                subscription_id,
                status = err.status_code().as_u16(),
                "subscriptions: no active subscription owned by user"
            );
            return Err(err);
        };

        info!(%user_id, subscription_id, "subscriptions: subscription canceled");
        Ok(CanceledSubscriptionDto {
            subscription: canceled.into(),
        })
    }

    /// A user may read their own subscription; admins may read anyone's.
    pub async fn get_user_subscription(
        &self,
        requester_id: i64,
        requester_is_admin: bool,
        user_id: i64,
    ) -> UseCaseResult<Option<UserSubscriptionDto>> {
        if requester_id != user_id && !requester_is_admin {
            let err = SubscriptionError::Forbidden;
            warn!(
                requester_id,
                %user_id,
                status = err.status_code().as_u16(),
                "subscriptions: foreign subscription lookup denied"
            );
            return Err(err);
        }

        let latest = self
            .subscription_repo
            .find_latest_with_user(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load user subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        let Some((subscription, user)) = latest else {
            return Ok(None);
        };

        Ok(self
            .settle_expiry(user_id, subscription)
            .await?
            .map(|subscription| UserSubscriptionDto {
                subscription: subscription.into(),
                user: user.into(),
            }))
    }

    pub async fn list_subscriptions(
        &self,
        filter: ListSubscriptionsFilter,
    ) -> UseCaseResult<SubscriptionListDto> {
        info!(
            page = filter.page.page,
            limit = filter.page.limit,
            status = ?filter.status,
            plan_type = ?filter.plan_type,
            "subscriptions: admin listing requested"
        );

        let page = filter.page;
        let (rows, total_count) = self
            .subscription_repo
            .list_with_users(filter)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to list subscriptions");
                SubscriptionError::Internal(err)
            })?;

        Ok(SubscriptionListDto {
            subscriptions: rows.into_iter().map(Into::into).collect(),
            pagination: Pagination::new(page, total_count),
        })
    }

    /// Applies lazy expiry to the latest row. Returns `None` when the user
    /// should be treated as being on the free plan.
    async fn settle_expiry(
        &self,
        user_id: i64,
        subscription: SubscriptionEntity,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let status = SubscriptionStatus::from_str(&subscription.status)
            .unwrap_or(SubscriptionStatus::Expired);

        match status {
            SubscriptionStatus::Expired => Ok(None),
            SubscriptionStatus::Active => {
                let now = self.clock.now();
                if !is_expired(now, subscription.end_date) {
                    return Ok(Some(subscription));
                }

                let transitioned = self
                    .subscription_repo
                    .mark_expired(subscription.id, now)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            subscription_id = subscription.id,
                            db_error = ?err,
                            "subscriptions: failed to mark subscription expired"
                        );
                        SubscriptionError::Internal(err)
                    })?;

                info!(
                    %user_id,
                    subscription_id = subscription.id,
                    end_date = %subscription.end_date,
                    transitioned,
                    "subscriptions: subscription lapsed, reporting free plan"
                );
                Ok(None)
            }
            SubscriptionStatus::Canceled => Ok(Some(subscription)),
        }
    }
}
