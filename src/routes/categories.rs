use crate::{error::Result, models::blog::CategoryPayload, state::AppState};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/blog-categories", get(list_categories).post(create_category))
}

/// GET /api/admin/blog-categories
async fn list_categories(State(app_state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let categories = app_state.blog_service.list_categories().await?;
    Ok(Json(json!({ "categories": categories })))
}

/// POST /api/admin/blog-categories
async fn create_category(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<Value>)> {
    let category = app_state.blog_service.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "category": category }))))
}
