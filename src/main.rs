use jobtrackfy_admin::{build_router, build_state, config::Config, services::Database};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting JobTrackfy admin service...");

    let db = Arc::new(Database::new(&config).await?);
    if let Err(e) = db.verify_connection().await {
        warn!("Store connection check failed, continuing: {}", e);
    }

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let app_state = build_state(config, db).await?;
    let app = build_router(app_state);

    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
