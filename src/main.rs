use anyhow::Context;
use portal::{AppState, app, broker::sweeper, config::Config, db};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portal=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url).await?;
    db::init_tables(&db_pool).await?;

    let state = AppState::new(db_pool, config);
    let config = state.config.clone();

    let sweeper = sweeper::spawn(state.broker.clone(), config.sweep_interval, config.empty_room_grace);

    let router = app(state)?;
    let listener = tokio::net::TcpListener::bind(&config.server_address)
        .await
        .with_context(|| format!("binding {}", config.server_address))?;

    tracing::info!(address = %config.server_address, "portal v{} listening", env!("CARGO_PKG_VERSION"));
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("serving")?;

    sweeper.abort();
    Ok(())
}
