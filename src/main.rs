use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{AppState, Config, init_pool, init_router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let pool = init_pool(&config).await?;

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("migrations applied");

    let addr: SocketAddr = ([0, 0, 0, 0], config.server_port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    let app = init_router(AppState::new(pool, config));
    axum::serve(listener, app).await?;
    Ok(())
}
