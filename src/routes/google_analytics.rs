use crate::{error::Result, models::google_analytics::GaAnalyticsResponse, state::AppState};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/google-analytics", get(get_google_analytics))
}

/// GA4 概览
/// GET /api/admin/google-analytics
async fn get_google_analytics(State(app_state): State<Arc<AppState>>) -> Result<Json<GaAnalyticsResponse>> {
    Ok(Json(app_state.google_analytics_service.get_overview().await?))
}
