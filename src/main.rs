use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use dotenvy::dotenv;
use hiring_post::{app, config::Config, SharedState, State};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
        )
        .init();

    if let Err(err) = dotenv {
        warn!("No .env file loaded: {}", err);
    }

    let config = Config::from_env()?;
    info!("Initializing service...");
    info!("Forwarding /api/generate to {} as {}", config.proxy.upstream_url, config.proxy.platform);
    info!("Generating through {}", config.generator.endpoint);

    let address = config.address;
    let shared_state: SharedState = Arc::new(State::new(config));

    let listener = tokio::net::TcpListener::bind(address)
        .await?;

    info!("Service now listening at on {}", address);
    axum::serve(
        listener,
        app(shared_state).into_make_service_with_connect_info::<SocketAddr>()
    ).await?;

    Ok(())
}
