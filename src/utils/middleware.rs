use crate::{error::AppError, models::admin::AdminSession, state::AppState};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::HeaderValue, Request},
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::{debug, info, warn};

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 按客户端 IP 计数的登录限流器
pub fn login_rate_limiter(per_minute: u32) -> KeyedRateLimiter {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::dashmap(Quota::per_minute(per_minute))
}

/// 管理员会话检查，通过后把会话放入请求扩展
pub async fn require_admin(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let session = parts.extract_with_state::<AdminSession, _>(&app_state).await?;
    debug!("Admin session for {} on {}", session.username, parts.uri.path());

    parts.extensions.insert(session);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// 登录速率限制中间件
pub async fn login_rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request);

    match app_state.login_limiter.check_key(&client_ip) {
        Ok(_) => {
            debug!("Rate limit check passed for IP: {}", client_ip);
            Ok(next.run(request).await)
        }
        Err(_) => {
            warn!("Login rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);

    let start_time = std::time::Instant::now();

    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// 安全头中间件
pub async fn security_headers_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let is_https = is_https_request(&request);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    if is_https {
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

/// 获取客户端 IP 地址
pub fn get_client_ip<B>(request: &Request<B>) -> String {
    let headers = request.headers();

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        return ip.trim().to_string();
    }

    if let Some(forwarded) = headers.get("forwarded").and_then(|value| value.to_str().ok()) {
        // 只取第一个 for= 参数
        for part in forwarded.split([';', ',']) {
            if let Some(ip) = part.trim().strip_prefix("for=") {
                return ip.trim_matches('"').to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_https_request<B>(request: &Request<B>) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }

    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(|proto| proto == "https")
        .unwrap_or(false)
}
