use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{subscriptions::SubscriptionRepository, user_tokens::UserTokenRepository},
        value_objects::{
            enums::{plan_types::PlanType, subscription_statuses::SubscriptionStatus},
            pagination::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PageRequest},
            plans::PlanCatalog,
            subscriptions::{
                CancelSubscriptionModel, CanceledSubscriptionDto, CreateOrderModel,
                CurrentSubscriptionDto, ListSubscriptionsFilter, OrderDto, SubscriptionListDto,
                UserSubscriptionDto, VerifiedPaymentDto, VerifyPaymentModel,
            },
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, user_tokens::UserTokenPostgres},
    },
    payments::razorpay_client::RazorpayClient,
};
use serde::Deserialize;

use crate::{
    auth::{AdminUser, AuthUser},
    axum_http::{
        api_response::ApiResponse,
        error_responses::AppError,
        extractors::{ApiJson, ApiPath, ApiQuery},
    },
    usecases::{
        clock::SystemClock,
        subscriptions::{PaymentGateway, SubscriptionUseCase},
    },
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    gateway: Arc<RazorpayClient>,
    catalog: Arc<PlanCatalog>,
) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let user_token_repository = UserTokenPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(user_token_repository),
        gateway,
        catalog,
        Arc::new(SystemClock),
    );

    router(Arc::new(subscriptions_usecase))
}

pub fn router<S, T, G>(subscriptions_usecase: Arc<SubscriptionUseCase<S, T, G>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/", get(list_subscriptions::<S, T, G>))
        .route("/create-order", post(create_order::<S, T, G>))
        .route("/verify-payment", post(verify_payment::<S, T, G>))
        .route("/current", get(current_subscription::<S, T, G>))
        .route("/cancel", post(cancel_subscription::<S, T, G>))
        .route("/user/:user_id", get(user_subscription::<S, T, G>))
        .with_state(subscriptions_usecase)
}

pub async fn create_order<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    auth: AuthUser,
    ApiJson(create_order_model): ApiJson<CreateOrderModel>,
) -> Result<ApiResponse<OrderDto>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let order = subscriptions_usecase
        .create_order(
            auth.user_id,
            &create_order_model.plan_type,
            &create_order_model.currency,
        )
        .await
        .map_err(|err| AppError::from_subscription(err, "Failed to create order"))?;

    Ok(ApiResponse::with_message("Order created successfully", order))
}

pub async fn verify_payment<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    auth: AuthUser,
    ApiJson(verify_payment_model): ApiJson<VerifyPaymentModel>,
) -> Result<ApiResponse<VerifiedPaymentDto>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let verified = subscriptions_usecase
        .verify_payment(auth.user_id, verify_payment_model)
        .await
        .map_err(|err| AppError::from_subscription(err, "Payment verification failed"))?;

    Ok(ApiResponse::with_message(
        "Payment verified and subscription activated",
        verified,
    ))
}

pub async fn current_subscription<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    auth: AuthUser,
) -> Result<ApiResponse<CurrentSubscriptionDto>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let current = subscriptions_usecase
        .get_current_subscription(auth.user_id)
        .await
        .map_err(|err| AppError::from_subscription(err, "Failed to fetch subscription"))?;

    Ok(ApiResponse::data(current))
}

pub async fn cancel_subscription<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    auth: AuthUser,
    ApiJson(cancel_model): ApiJson<CancelSubscriptionModel>,
) -> Result<ApiResponse<CanceledSubscriptionDto>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let canceled = subscriptions_usecase
        .cancel_subscription(auth.user_id, cancel_model.subscription_id)
        .await
        .map_err(|err| AppError::from_subscription(err, "Failed to cancel subscription"))?;

    Ok(ApiResponse::with_message(
        "Subscription cancelled successfully",
        canceled,
    ))
}

pub async fn user_subscription<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<ApiResponse<Option<UserSubscriptionDto>>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let found = subscriptions_usecase
        .get_user_subscription(auth.user_id, auth.is_admin(), user_id)
        .await
        .map_err(|err| AppError::from_subscription(err, "Failed to fetch user subscription"))?;

    Ok(ApiResponse::data(found))
}

pub async fn list_subscriptions<S, T, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, T, G>>>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<ListSubscriptionsQuery>,
) -> Result<ApiResponse<SubscriptionListDto>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: UserTokenRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let filter = query.into_filter()?;
    let listed = subscriptions_usecase
        .list_subscriptions(filter)
        .await
        .map_err(|err| AppError::from_subscription(err, "Failed to fetch subscriptions"))?;

    Ok(ApiResponse::data(listed))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSubscriptionsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub plan_type: Option<String>,
}

impl ListSubscriptionsQuery {
    pub fn into_filter(self) -> Result<ListSubscriptionsFilter, AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }

        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(SubscriptionStatus::from_str(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Unknown subscription status: {raw}"))
            })?),
        };

        let page = PageRequest { page, limit };
        if page.offset().is_none() {
            return Err(AppError::BadRequest("page is out of range".to_string()));
        }

        let plan_type = match self.plan_type.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                PlanType::from_str(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown plan type: {raw}")))?,
            ),
        };

        Ok(ListSubscriptionsFilter {
            status,
            plan_type,
            page,
        })
    }
}
