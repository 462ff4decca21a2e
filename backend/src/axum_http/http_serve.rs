use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::plans::PlanCatalog,
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::razorpay_client::{RazorpayClient, RazorpayOptions},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use url::Url;

use crate::{
    auth::JwtVerifier,
    axum_http::{default_routers, routers},
    config::config_model::{BackendServer, DotEnvyConfig},
};

/// Wraps the subscription routes with the shared middleware stack.
pub fn app(
    subscription_routes: Router,
    jwt_verifier: Arc<JwtVerifier>,
    server: &BackendServer,
) -> Result<Router> {
    let body_limit: usize = (server.body_limit * 1024 * 1024)
        .try_into()
        .context("SERVER_BODY_LIMIT does not fit in memory")?;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/subscriptions", subscription_routes)
        .route("/health-check", get(default_routers::health_check))
        .layer(Extension(jwt_verifier))
        .layer(TimeoutLayer::new(Duration::from_secs(server.timeout)))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    catalog: Arc<PlanCatalog>,
) -> Result<()> {
    let razorpay = RazorpayClient::new(RazorpayOptions {
        key_id: config.razorpay.key_id.clone(),
        key_secret: config.razorpay.key_secret.clone(),
        base_url: Url::parse(&config.razorpay.base_url).context("RAZORPAY_BASE_URL is invalid")?,
        timeout: Duration::from_secs(config.razorpay.timeout),
    })?;

    let subscription_routes = routers::subscriptions::routes(
        Arc::clone(&db_pool),
        Arc::new(razorpay),
        catalog,
    );
    let jwt_verifier = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));
    let app = app(subscription_routes, jwt_verifier, &config.backend_server)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
