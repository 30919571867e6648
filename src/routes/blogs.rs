use crate::{
    error::Result,
    models::blog::{BlogPayload, BlogPreviewRequest},
    state::AppState,
    utils::markdown::RenderedContent,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/blogs", get(list_blogs).post(create_blog))
        .route("/blogs/:id", get(get_blog).put(update_blog).delete(delete_blog))
        .route("/blog-preview", post(preview_blog))
}

/// 获取所有文章
/// GET /api/admin/blogs
async fn list_blogs(State(app_state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let blogs = app_state.blog_service.list_posts().await?;
    debug!("Listed {} blog posts", blogs.len());
    Ok(Json(json!({ "blogs": blogs })))
}

/// 创建文章
/// POST /api/admin/blogs
async fn create_blog(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BlogPayload>,
) -> Result<(StatusCode, Json<Value>)> {
    let blog = app_state.blog_service.create_post(payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "blog": blog }))))
}

/// GET /api/admin/blogs/:id
async fn get_blog(State(app_state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>> {
    let blog = app_state.blog_service.get_post(&id).await?;
    Ok(Json(json!({ "blog": blog })))
}

/// PUT /api/admin/blogs/:id
async fn update_blog(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<BlogPayload>,
) -> Result<Json<Value>> {
    let blog = app_state.blog_service.update_post(&id, payload).await?;
    Ok(Json(json!({ "blog": blog })))
}

/// DELETE /api/admin/blogs/:id
async fn delete_blog(State(app_state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>> {
    app_state.blog_service.delete_post(&id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// 编辑器预览
/// POST /api/admin/blog-preview
async fn preview_blog(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<BlogPreviewRequest>,
) -> Json<RenderedContent> {
    Json(app_state.blog_service.preview(request.markdown.as_deref().unwrap_or_default()))
}
