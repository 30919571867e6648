pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use crate::{
    config::Config,
    error::Result,
    services::{
        AnalyticsService, AuthService, BlogService, Database, GoogleAnalyticsService, MediaService,
        WebhookService,
    },
    state::AppState,
    utils::middleware::{login_rate_limiter, request_logging_middleware, security_headers_middleware},
};
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// 初始化所有服务
pub async fn build_state(config: Config, db: Arc<Database>) -> Result<Arc<AppState>> {
    let auth_service = AuthService::new(&config, db.clone()).await?;
    let analytics_service = AnalyticsService::new(db.clone(), &config).await?;
    let google_analytics_service = GoogleAnalyticsService::new(&config).await?;
    let blog_service = BlogService::new(db.clone()).await?;
    let media_service = MediaService::new(&config, db.clone()).await?;
    let webhook_service = WebhookService::new(&config).await?;
    let login_limiter = Arc::new(login_rate_limiter(config.login_rate_limit_per_minute));

    Ok(Arc::new(AppState {
        config,
        db,
        auth_service,
        analytics_service,
        google_analytics_service,
        blog_service,
        media_service,
        webhook_service,
        login_limiter,
    }))
}

/// 构建应用路由
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let origins = app_state
        .config
        .cors_allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/admin", routes::admin_router(app_state.clone()))
        .merge(routes::webhook_router(app_state.clone()))
        .merge(routes::auth::logout_router())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check() -> &'static str {
    "JobTrackfy admin is running!"
}
