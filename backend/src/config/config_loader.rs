use anyhow::{Context, Result};
use crates::{domain::value_objects::plans::PlanCatalog, payments::razorpay_client};
use tracing::info;

use super::config_model::{Auth, BackendServer, Database, DotEnvyConfig, Plans, Razorpay};

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_RAZORPAY_TIMEOUT_SECS: u64 = 15;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup so tests do not have to touch the
/// process environment.
pub fn from_lookup<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{key} is missing"))
    };

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS is invalid")?,
            None => DEFAULT_DATABASE_MAX_CONNECTIONS,
        },
    };

    let auth = Auth {
        jwt_secret: required("JWT_USER_SECRET")?,
    };

    let razorpay = Razorpay {
        key_id: required("RAZORPAY_KEY_ID")?,
        key_secret: required("RAZORPAY_KEY_SECRET")?,
        base_url: normalize_base_url(
            lookup("RAZORPAY_BASE_URL")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| razorpay_client::DEFAULT_RAZORPAY_BASE_URL.to_string()),
        ),
        timeout: match lookup("RAZORPAY_TIMEOUT") {
            Some(raw) => raw.parse().context("RAZORPAY_TIMEOUT is invalid")?,
            None => DEFAULT_RAZORPAY_TIMEOUT_SECS,
        },
    };

    let plans = Plans {
        catalog_path: lookup("PLAN_CATALOG_PATH").filter(|value| !value.trim().is_empty()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        razorpay,
        plans,
    })
}

/// `Url::join` drops the last path segment unless the base ends with a slash.
fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

pub fn load_plan_catalog(plans: &Plans) -> Result<PlanCatalog> {
    let Some(path) = plans.catalog_path.as_deref() else {
        info!("subscriptions: using built-in plan catalog");
        return Ok(PlanCatalog::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan catalog at {path}"))?;
    let catalog = PlanCatalog::from_json(&raw)
        .with_context(|| format!("invalid plan catalog at {path}"))?;
    info!(path, "subscriptions: plan catalog loaded");
    Ok(catalog)
}
