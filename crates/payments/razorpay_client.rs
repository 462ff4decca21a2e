use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;
use tracing::error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com/v1/";

#[derive(Debug, Clone)]
pub struct RazorpayOptions {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: Url,
    pub timeout: Duration,
}

/// Minimal Razorpay orders client built on reqwest.
pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: HashMap<String, String>,
    pub created_at: Option<i64>,
}

impl RazorpayOrder {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorEnvelope {
    error: RazorpayErrorDetails,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetails {
    code: Option<String>,
    description: Option<String>,
    source: Option<String>,
    step: Option<String>,
    reason: Option<String>,
    field: Option<String>,
}

/// Razorpay answers `notes: []` for orders created without notes.
fn notes_map<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let notes = match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect(),
        _ => HashMap::new(),
    };
    Ok(notes)
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`, the value Checkout hands
/// back as `razorpay_signature`.
pub fn payment_signature(key_secret: &str, order_id: &str, payment_id: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a Checkout signature. Only the exact lowercase hex encoding is
/// accepted; the digest comparison itself is constant time.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let well_formed = signature.len() == 64
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return false;
    }

    let Ok(provided) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

impl RazorpayClient {
    pub fn new(options: RazorpayOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build razorpay http client")?;

        Ok(Self {
            http,
            key_id: options.key_id,
            key_secret: options.key_secret,
            base_url: options.base_url,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid razorpay endpoint path: {path}"))
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<RazorpayErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            razorpay_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            razorpay_error_description = ?details.as_ref().and_then(|d| d.description.as_deref()),
            razorpay_error_source = ?details.as_ref().and_then(|d| d.source.as_deref()),
            razorpay_error_step = ?details.as_ref().and_then(|d| d.step.as_deref()),
            razorpay_error_reason = ?details.as_ref().and_then(|d| d.reason.as_deref()),
            razorpay_error_field = ?details.as_ref().and_then(|d| d.field.as_deref()),
            context = %context,
            "razorpay api request failed"
        );

        anyhow::bail!("Razorpay API request failed: {} (status {})", context, status);
    }

    /// Creates an order. https://razorpay.com/docs/api/orders/create/
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: &HashMap<String, String>,
    ) -> Result<RazorpayOrder> {
        let body = CreateOrderRequest {
            amount: amount_minor,
            currency,
            receipt,
            notes,
        };

        let resp = self
            .http
            .post(self.endpoint("orders")?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create order").await?;

        let order: RazorpayOrder = resp.json().await?;
        Ok(order)
    }

    /// Fetches an order by id. https://razorpay.com/docs/api/orders/fetch-with-id/
    pub async fn fetch_order(&self, order_id: &str) -> Result<RazorpayOrder> {
        let resp = self
            .http
            .get(self.endpoint(&format!("orders/{}", order_id))?)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "fetch order").await?;

        let order: RazorpayOrder = resp.json().await?;
        Ok(order)
    }

    pub fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}
