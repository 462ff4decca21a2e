use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::{axum_http::http_serve, config::config_loader};
use crates::infra::db::postgres::postgres_connection::{self, PoolOptions};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let catalog = config_loader::load_plan_catalog(&dotenvy_env.plans)?;

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        PoolOptions {
            max_size: dotenvy_env.database.max_connections,
            connection_timeout: Duration::from_secs(5),
        },
    )?;
    info!("Postgres connection has been established");

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(catalog),
    )
    .await?;

    Ok(())
}
