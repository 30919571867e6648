pub mod analytics;
pub mod auth;
pub mod blogs;
pub mod categories;
pub mod google_analytics;
pub mod media;
pub mod webhook;

use crate::{state::AppState, utils::middleware::require_admin};
use axum::{middleware, Router};
use std::sync::Arc;

/// `/api/admin` 下的全部接口，登录以外都需要管理员会话
pub fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .merge(auth::router())
        .merge(analytics::router())
        .merge(google_analytics::router())
        .merge(blogs::router())
        .merge(categories::router())
        .merge(media::router(state.config.max_image_upload_size))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(auth::login_router(state))
        .merge(protected)
}

/// 网页抓取和 webhook 测试，同样需要管理员会话
pub fn webhook_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    webhook::router().route_layer(middleware::from_fn_with_state(state, require_admin))
}
