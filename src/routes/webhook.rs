use crate::{
    error::Result,
    models::webhook::{FetchHtmlRequest, FetchedHtml, WebhookTestResult},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::post, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fetch-html", post(fetch_html))
        .route("/api/webhook-test", post(webhook_test))
}

/// 抓取页面 HTML
/// POST /api/fetch-html
async fn fetch_html(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<FetchHtmlRequest>,
) -> Result<Json<FetchedHtml>> {
    Ok(Json(app_state.webhook_service.fetch_html(request.url.as_deref()).await?))
}

/// 抓取页面并转发到 webhook
/// POST /api/webhook-test
async fn webhook_test(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<FetchHtmlRequest>,
) -> Result<Json<WebhookTestResult>> {
    Ok(Json(app_state.webhook_service.test_webhook(request.url.as_deref()).await?))
}
