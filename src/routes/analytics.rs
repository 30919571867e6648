use crate::{
    error::Result,
    models::analytics::{AnalyticsReport, FeatureStats, InsightsReport, UserStats},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics", get(get_analytics))
        .route("/feature-stats", get(get_feature_stats))
        .route("/insights", get(get_insights))
        .route("/stats", get(get_stats))
}

/// 产品指标报告
/// GET /api/admin/analytics
async fn get_analytics(State(app_state): State<Arc<AppState>>) -> Result<Json<AnalyticsReport>> {
    debug!("Building analytics report");
    Ok(Json(app_state.analytics_service.get_report().await?))
}

/// GET /api/admin/feature-stats
async fn get_feature_stats(State(app_state): State<Arc<AppState>>) -> Result<Json<FeatureStats>> {
    Ok(Json(app_state.analytics_service.feature_stats().await?))
}

/// GET /api/admin/insights
async fn get_insights(State(app_state): State<Arc<AppState>>) -> Result<Json<InsightsReport>> {
    Ok(Json(app_state.analytics_service.insights().await?))
}

/// GET /api/admin/stats
async fn get_stats(State(app_state): State<Arc<AppState>>) -> Result<Json<UserStats>> {
    Ok(Json(app_state.analytics_service.user_stats().await?))
}
