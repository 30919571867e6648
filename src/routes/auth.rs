use crate::{
    error::{AppError, Result},
    models::admin::{AdminSession, LoginRequest},
    state::AppState,
    utils::middleware::login_rate_limit_middleware,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    middleware,
    response::{IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// 登录接口，按客户端 IP 限流
pub fn login_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(state, login_rate_limit_middleware))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(me))
}

/// 退出登录挂在根路径下
pub fn logout_router() -> Router<Arc<AppState>> {
    Router::new().route("/logout", get(logout))
}

/// 管理员登录
/// POST /api/admin/login
async fn login(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let username = payload.username.trim();
    if !app_state
        .auth_service
        .validate_credentials(username, &payload.password)
        .await?
    {
        warn!("Failed admin login for {}", username);
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = app_state.auth_service.create_session_token(username);
    let cookie = app_state.auth_service.session_cookie(&token);
    info!("Admin {} logged in", username);

    Ok((
        session_headers(&cookie)?,
        Json(json!({ "ok": true, "username": username })),
    ))
}

/// 当前登录的管理员
/// GET /api/admin/me
async fn me(session: AdminSession) -> Json<AdminSession> {
    Json(session)
}

/// 清除会话后回到首页
/// GET /logout
async fn logout(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let cookie = app_state.auth_service.clear_session_cookie();
    Ok((session_headers(&cookie)?, Redirect::to("/")))
}

fn session_headers(cookie: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie).map_err(|e| AppError::Internal(e.to_string()))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}
