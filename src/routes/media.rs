use crate::{
    error::{AppError, Result},
    models::media::{ImageUpload, ImageUploadResponse, IMAGE_FIELD_NAME},
    state::AppState,
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::{debug, error};

// 留出余量，让略超限的文件得到明确的校验错误
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_upload_size: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/blog-images", post(upload_blog_image))
        .layer(DefaultBodyLimit::max(max_upload_size * 2 + MULTIPART_OVERHEAD))
}

/// 上传博客图片
/// POST /api/admin/blog-images
async fn upload_blog_image(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageUploadResponse>)> {
    let mut upload: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::bad_request("Invalid multipart form data")
    })? {
        if field.name() != Some(IMAGE_FIELD_NAME) || field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            error!("Failed to read image field: {}", e);
            AppError::bad_request("Invalid multipart form data")
        })?;

        debug!("Received image {} ({}, {} bytes)", file_name, content_type, data.len());
        upload = Some(ImageUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        });
        break;
    }

    let response = app_state.media_service.upload_blog_image(upload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
