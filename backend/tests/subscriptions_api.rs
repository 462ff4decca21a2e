// HTTP-level tests for the subscription API.
//
// The full router (auth, envelope, middleware) is driven with
// tower::ServiceExt::oneshot against an in-memory billing store and a fake
// gateway that signs payments the same way Razorpay does.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use backend::{
    auth::{Claims, JwtVerifier, ROLE_ADMIN},
    axum_http::{http_serve, routers},
    config::config_model::BackendServer,
    usecases::{
        clock::Clock,
        subscriptions::{PaymentGateway, SubscriptionUseCase},
    },
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use crates::{
    domain::{
        entities::{
            subscriptions::SubscriptionEntity,
            user_tokens::{InsertUserTokenEntity, UserTokenEntity},
            users::UserSummaryEntity,
        },
        repositories::{subscriptions::SubscriptionRepository, user_tokens::UserTokenRepository},
        value_objects::{
            enums::{currencies::Currency, plan_types::PlanType},
            plans::PlanCatalog,
            subscriptions::{ActivateSubscriptionModel, ListSubscriptionsFilter},
        },
    },
    payments::razorpay_client::{RazorpayOrder, payment_signature, verify_payment_signature},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

const JWT_SECRET: &str = "supersecretjwtsecretforintegrationtests";
const KEY_SECRET: &str = "test_key_secret";

// ─── In-memory billing store ─────────────────────────────────────

#[derive(Default)]
struct Store {
    tokens: Vec<UserTokenEntity>,
    subscriptions: Vec<SubscriptionEntity>,
    users: HashMap<i64, UserSummaryEntity>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
struct InMemoryBilling {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBilling {
    fn seed_user(&self, id: i64, email: &str) {
        self.store.lock().unwrap().users.insert(
            id,
            UserSummaryEntity {
                id,
                email: email.to_string(),
                first_name: None,
                last_name: None,
            },
        );
    }

    fn seed_subscription(
        &self,
        user_id: i64,
        status: &str,
        created_at: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> i64 {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        store.subscriptions.push(SubscriptionEntity {
            id,
            user_id,
            plan_type: "monthly".to_string(),
            includes: PlanCatalog::default().features(PlanType::Monthly).to_vec(),
            transaction_id: format!("pay_seed_{id}"),
            transaction_date: created_at,
            status: status.to_string(),
            start_date: created_at,
            end_date,
            created_at,
            updated_at: created_at,
        });
        id
    }

    fn subscription(&self, id: i64) -> Option<SubscriptionEntity> {
        let store = self.store.lock().unwrap();
        store.subscriptions.iter().find(|s| s.id == id).cloned()
    }

    fn subscription_count(&self) -> usize {
        self.store.lock().unwrap().subscriptions.len()
    }

    fn tokens(&self) -> Vec<UserTokenEntity> {
        self.store.lock().unwrap().tokens.clone()
    }
}

#[async_trait]
impl UserTokenRepository for InMemoryBilling {
    async fn insert_pending_token(&self, token: InsertUserTokenEntity) -> Result<i64> {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        store.tokens.push(UserTokenEntity {
            id,
            user_id: token.user_id,
            token: token.token,
            token_type: token.token_type,
            used: token.used,
            expires_at: token.expires_at,
            created_at: token.created_at,
        });
        Ok(id)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBilling {
    async fn activate_from_order(
        &self,
        activation: ActivateSubscriptionModel,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut store = self.store.lock().unwrap();

        let Some(token) = store.tokens.iter_mut().find(|token| {
            token.user_id == activation.user_id
                && token.token == activation.order_id
                && token.token_type == activation.token_type
                && !token.used
                && token.expires_at > activation.now
        }) else {
            return Ok(None);
        };
        token.used = true;

        let id = store.next_id();
        let insert = activation.subscription;
        let subscription = SubscriptionEntity {
            id,
            user_id: insert.user_id,
            plan_type: insert.plan_type,
            includes: insert.includes,
            transaction_id: insert.transaction_id,
            transaction_date: insert.transaction_date,
            status: insert.status,
            start_date: insert.start_date,
            end_date: insert.end_date,
            created_at: insert.created_at,
            updated_at: insert.updated_at,
        };
        store.subscriptions.push(subscription.clone());
        Ok(Some(subscription))
    }

    async fn find_latest_by_user(&self, user_id: i64) -> Result<Option<SubscriptionEntity>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| (s.created_at, s.id))
            .cloned())
    }

    async fn find_latest_with_user(
        &self,
        user_id: i64,
    ) -> Result<Option<(SubscriptionEntity, UserSummaryEntity)>> {
        let latest = self.find_latest_by_user(user_id).await?;
        let store = self.store.lock().unwrap();
        Ok(latest.and_then(|s| store.users.get(&user_id).cloned().map(|u| (s, u))))
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id && s.status == "active")
        {
            Some(subscription) => {
                subscription.status = "expired".to_string();
                subscription.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel(
        &self,
        user_id: i64,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut store = self.store.lock().unwrap();
        Ok(store
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id && s.user_id == user_id && s.status == "active")
            .map(|subscription| {
                subscription.status = "canceled".to_string();
                subscription.updated_at = now;
                subscription.clone()
            }))
    }

    async fn list_with_users(
        &self,
        filter: ListSubscriptionsFilter,
    ) -> Result<(Vec<(SubscriptionEntity, UserSummaryEntity)>, i64)> {
        let store = self.store.lock().unwrap();
        let mut rows: Vec<(SubscriptionEntity, UserSummaryEntity)> = store
            .subscriptions
            .iter()
            .filter(|s| filter.status.is_none_or(|status| s.status == status.as_str()))
            .filter(|s| filter.plan_type.is_none_or(|plan| s.plan_type == plan.as_str()))
            .filter_map(|s| store.users.get(&s.user_id).map(|u| (s.clone(), u.clone())))
            .collect();
        rows.sort_by(|(a, _), (b, _)| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = rows.len() as i64;
        let offset = filter
            .page
            .offset()
            .ok_or_else(|| anyhow!("page out of range"))?;
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(filter.page.limit as usize)
            .collect();
        Ok((page, total))
    }
}

// ─── Fake gateway and clock ──────────────────────────────────────

#[derive(Default)]
struct FakeGateway {
    orders: Mutex<HashMap<String, RazorpayOrder>>,
    fail_create: bool,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> String {
        "rzp_test_key".to_string()
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: Currency,
        receipt: String,
        notes: HashMap<String, String>,
    ) -> Result<RazorpayOrder> {
        if self.fail_create {
            return Err(anyhow!("gateway unavailable"));
        }

        let mut orders = self.orders.lock().unwrap();
        let order = RazorpayOrder {
            id: format!("order_test_{}", orders.len() + 1),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt),
            status: Some("created".to_string()),
            notes,
            created_at: None,
        };
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<RazorpayOrder> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| anyhow!("order {order_id} not found"))
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(KEY_SECRET, order_id, payment_id, signature)
    }
}

struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// ─── Harness ─────────────────────────────────────────────────────

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap()
}

struct Harness {
    app: Router,
    billing: InMemoryBilling,
    gateway: Arc<FakeGateway>,
    clock: Arc<TestClock>,
}

fn harness_with(gateway: FakeGateway) -> Harness {
    let billing = InMemoryBilling::default();
    let gateway = Arc::new(gateway);
    let clock = Arc::new(TestClock(Mutex::new(start_time())));

    let usecase = SubscriptionUseCase::new(
        Arc::new(billing.clone()),
        Arc::new(billing.clone()),
        Arc::clone(&gateway),
        Arc::new(PlanCatalog::default()),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    let app = http_serve::app(
        routers::subscriptions::router(Arc::new(usecase)),
        Arc::new(JwtVerifier::new(JWT_SECRET)),
        &BackendServer {
            port: 0,
            body_limit: 1,
            timeout: 30,
        },
    )
    .unwrap();

    Harness {
        app,
        billing,
        gateway,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(FakeGateway::default())
}

fn bearer(user_id: i64, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        email: Some(format!("user{user_id}@example.com")),
        exp: 9_999_999_999,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<String>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_order(
    h: &Harness,
    user_id: i64,
    plan_type: &str,
    currency: &str,
) -> (StatusCode, Value) {
    send(
        &h.app,
        "POST",
        "/subscriptions/create-order",
        Some(bearer(user_id, "user")),
        Some(json!({"planType": plan_type, "currency": currency})),
    )
    .await
}

async fn verify(
    h: &Harness,
    user_id: i64,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> (StatusCode, Value) {
    send(
        &h.app,
        "POST",
        "/subscriptions/verify-payment",
        Some(bearer(user_id, "user")),
        Some(json!({
            "razorpay_order_id": order_id,
            "razorpay_payment_id": payment_id,
            "razorpay_signature": signature,
        })),
    )
    .await
}

// ─── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_is_public() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health-check")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let h = harness();
    let (status, body) = send(&h.app, "GET", "/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let h = harness();

    let (status, body) = send(&h.app, "GET", "/subscriptions/current", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(
        &h.app,
        "GET",
        "/subscriptions/current",
        Some("Bearer not.a.jwt".to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn monthly_usd_purchase_activates_once() {
    let h = harness();

    let (status, body) = create_order(&h, 42, "monthly", "USD").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["amount"], json!(499));
    assert_eq!(body["data"]["currency"], json!("USD"));
    assert_eq!(body["data"]["key"], json!("rzp_test_key"));
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();

    let tokens = h.billing.tokens();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token, order_id);
    assert!(!tokens[0].used);
    assert_eq!(tokens[0].expires_at, tokens[0].created_at + Duration::minutes(30));

    let signature = payment_signature(KEY_SECRET, &order_id, "pay_1").unwrap();
    let (status, body) = verify(&h, 42, &order_id, "pay_1", &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["planType"], json!("monthly"));
    assert_eq!(body["data"]["paymentId"], json!("pay_1"));
    assert_eq!(body["data"]["subscription"]["status"], json!("active"));
    assert_eq!(
        body["data"]["subscription"]["includes"].as_array().map(Vec::len),
        Some(9)
    );
    assert_eq!(
        body["data"]["subscription"]["endDate"],
        json!("2024-02-29T10:00:00Z")
    );

    let (status, body) = send(
        &h.app,
        "GET",
        "/subscriptions/current",
        Some(bearer(42, "user")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasSubscription"], json!(true));
    assert_eq!(body["data"]["plan"], json!("monthly"));

    let (status, body) = verify(&h, 42, &order_id, "pay_1", &signature).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid or expired order"));
    assert_eq!(h.billing.subscription_count(), 1);
}

#[tokio::test]
async fn invalid_plan_or_currency_has_no_side_effects() {
    let h = harness();

    for (plan_type, currency) in [("weekly", "USD"), ("monthly", "JPY")] {
        let (status, body) = create_order(&h, 42, plan_type, currency).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid plan type or currency"));
    }

    let (status, _) = send(
        &h.app,
        "POST",
        "/subscriptions/create-order",
        Some(bearer(42, "user")),
        Some(json!({"currency": "USD"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.gateway.orders.lock().unwrap().is_empty());
    assert!(h.billing.tokens().is_empty());
}

#[tokio::test]
async fn gateway_failure_returns_generic_error_and_no_token() {
    let h = harness_with(FakeGateway {
        fail_create: true,
        ..Default::default()
    });

    let (status, body) = create_order(&h, 42, "yearly", "INR").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Failed to create order"));
    assert!(h.billing.tokens().is_empty());
}

#[tokio::test]
async fn tampered_signature_is_rejected_without_writes() {
    let h = harness();
    let (_, body) = create_order(&h, 42, "monthly", "INR").await;
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();

    let signature = payment_signature(KEY_SECRET, &order_id, "pay_1").unwrap();
    let (status, body) = verify(&h, 42, &order_id, "pay_2", &signature).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid payment signature"));
    assert_eq!(h.billing.subscription_count(), 0);
    assert!(!h.billing.tokens()[0].used);
}

#[tokio::test]
async fn expired_order_token_cannot_be_redeemed() {
    let h = harness();
    let (_, body) = create_order(&h, 42, "monthly", "EUR").await;
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();

    h.clock.advance(Duration::minutes(31));

    let signature = payment_signature(KEY_SECRET, &order_id, "pay_1").unwrap();
    let (status, _) = verify(&h, 42, &order_id, "pay_1", &signature).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.billing.subscription_count(), 0);
}

#[tokio::test]
async fn another_users_order_cannot_be_redeemed() {
    let h = harness();
    let (_, body) = create_order(&h, 42, "monthly", "GBP").await;
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();

    let signature = payment_signature(KEY_SECRET, &order_id, "pay_1").unwrap();
    let (status, _) = verify(&h, 7, &order_id, "pay_1", &signature).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.billing.subscription_count(), 0);
}

#[tokio::test]
async fn lapsed_subscription_is_reported_free_and_stored_expired() {
    let h = harness();
    let now = start_time();
    let lapsed = h.billing.seed_subscription(
        42,
        "active",
        now - Duration::days(40),
        now - Duration::days(9),
    );
    let live = h.billing.seed_subscription(
        7,
        "active",
        now - Duration::days(1),
        now + Duration::days(29),
    );

    let (status, body) = send(
        &h.app,
        "GET",
        "/subscriptions/current",
        Some(bearer(42, "user")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"hasSubscription": false, "plan": "free"}));
    assert_eq!(h.billing.subscription(lapsed).unwrap().status, "expired");

    let (_, body) = send(
        &h.app,
        "GET",
        "/subscriptions/current",
        Some(bearer(7, "user")),
        None,
    )
    .await;
    assert_eq!(body["data"]["hasSubscription"], json!(true));
    assert_eq!(h.billing.subscription(live).unwrap().status, "active");
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let h = harness();
    let now = start_time();
    let id = h
        .billing
        .seed_subscription(42, "active", now, now + Duration::days(30));

    let (status, _) = send(
        &h.app,
        "POST",
        "/subscriptions/cancel",
        Some(bearer(7, "user")),
        Some(json!({"subscriptionId": id})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.billing.subscription(id).unwrap().status, "active");

    let (status, body) = send(
        &h.app,
        "POST",
        "/subscriptions/cancel",
        Some(bearer(42, "user")),
        Some(json!({"subscriptionId": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["status"], json!("canceled"));

    let (status, _) = send(
        &h.app,
        "POST",
        "/subscriptions/cancel",
        Some(bearer(42, "user")),
        Some(json!({"subscriptionId": id})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_lookup_is_self_or_admin() {
    let h = harness();
    let now = start_time();
    h.billing.seed_user(42, "owner@example.com");
    h.billing
        .seed_subscription(42, "active", now, now + Duration::days(30));

    let (status, _) = send(
        &h.app,
        "GET",
        "/subscriptions/user/42",
        Some(bearer(7, "user")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for auth in [bearer(42, "user"), bearer(1, ROLE_ADMIN)] {
        let (status, body) = send(&h.app, "GET", "/subscriptions/user/42", Some(auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["email"], json!("owner@example.com"));
        assert_eq!(body["data"]["subscription"]["userId"], json!(42));
    }

    let (status, body) = send(
        &h.app,
        "GET",
        "/subscriptions/user/99",
        Some(bearer(1, ROLE_ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    let (status, _) = send(
        &h.app,
        "GET",
        "/subscriptions/user/not-a-number",
        Some(bearer(1, ROLE_ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_listing_is_paginated_and_filtered() {
    let h = harness();
    let now = start_time();
    for user_id in 1..=3 {
        h.billing.seed_user(user_id, &format!("user{user_id}@example.com"));
    }
    h.billing
        .seed_subscription(1, "active", now - Duration::days(3), now + Duration::days(27));
    h.billing
        .seed_subscription(2, "canceled", now - Duration::days(2), now + Duration::days(28));
    h.billing
        .seed_subscription(3, "active", now - Duration::days(1), now + Duration::days(29));

    let (status, _) = send(&h.app, "GET", "/subscriptions", Some(bearer(1, "user")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &h.app,
        "GET",
        "/subscriptions?status=active&limit=1",
        Some(bearer(1, ROLE_ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = &body["data"];
    assert_eq!(listed["subscriptions"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["subscriptions"][0]["userId"], json!(3));
    assert_eq!(listed["subscriptions"][0]["user"]["email"], json!("user3@example.com"));
    assert_eq!(
        listed["pagination"],
        json!({
            "currentPage": 1,
            "totalPages": 2,
            "totalCount": 2,
            "hasNext": true,
            "hasPrev": false,
        })
    );

    let (status, _) = send(
        &h.app,
        "GET",
        "/subscriptions?limit=500",
        Some(bearer(1, ROLE_ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &h.app,
        "GET",
        "/subscriptions?page=9223372036854775807",
        Some(bearer(1, ROLE_ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}
