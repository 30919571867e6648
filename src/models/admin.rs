use serde::{Deserialize, Serialize};
use validator::Validate;

pub const ADMIN_SESSION_COOKIE: &str = "admin_session";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[serde(default)]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[serde(default)]
    pub password: String,
}

/// 会话令牌中签名的内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub username: String,
}

/// 已登录的管理员
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminSession {
    pub username: String,
}
