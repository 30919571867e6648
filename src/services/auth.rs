use crate::{
    config::{AdminUser, Config},
    error::{AppError, Result},
    models::admin::{AdminSession, SessionClaims, ADMIN_SESSION_COOKIE},
    services::Database,
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    headers::Cookie,
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct AuthService {
    users: Vec<AdminUser>,
    secret: String,
    auth_rpc: Option<String>,
    secure_cookie: bool,
    session_max_age_secs: i64,
    db: Arc<Database>,
}

impl AuthService {
    pub async fn new(config: &Config, db: Arc<Database>) -> Result<Self> {
        if config.uses_default_session_secret() && config.is_production() {
            warn!("ADMIN_SESSION_SECRET is not set; sessions are signed with the development secret");
        }
        if config.admin_users.is_empty() && config.admin_auth_rpc.is_none() {
            warn!("No admin users configured; every login attempt will be rejected");
        }

        Ok(Self {
            users: config.admin_users.clone(),
            secret: config.admin_session_secret.clone(),
            auth_rpc: config.admin_auth_rpc.clone(),
            secure_cookie: config.is_production(),
            session_max_age_secs: config.session_max_age_secs,
            db,
        })
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts keys of any length")
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// 常量时间比较：对两边分别做 HMAC 后再比较摘要
    fn compare_safe(&self, expected: &str, provided: &str) -> bool {
        let expected_digest = self.sign(expected);
        let mut mac = self.mac();
        mac.update(provided.as_bytes());
        mac.verify_slice(&expected_digest).is_ok()
    }

    /// 校验管理员账号：优先使用环境变量中的账号，未配置时调用数据库函数
    pub async fn validate_credentials(&self, username: &str, password: &str) -> Result<bool> {
        if !self.users.is_empty() {
            let Some(user) = self.users.iter().find(|user| user.username == username) else {
                debug!("Unknown admin username");
                return Ok(false);
            };
            return Ok(self.compare_safe(&user.password, password));
        }

        let Some(function) = &self.auth_rpc else {
            return Ok(false);
        };

        let result: Value = self
            .db
            .rpc(function, &json!({ "username": username, "password": password }))
            .await?;

        Ok(match result {
            Value::Bool(valid) => valid,
            Value::Array(rows) => !rows.is_empty(),
            Value::Object(row) => row.get("valid").and_then(Value::as_bool).unwrap_or(true),
            _ => false,
        })
    }

    /// `base64url(JSON) + "." + base64url(HMAC-SHA256)`
    pub fn create_session_token(&self, username: &str) -> String {
        let claims = SessionClaims { username: username.to_string() };
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        format!("{}.{}", payload, signature)
    }

    /// 验证会话令牌并返回用户名，任何格式错误或签名不符都返回 None
    pub fn decode_session_token(&self, token: Option<&str>) -> Option<String> {
        let mut parts = token?.split('.');
        let payload = parts.next().filter(|p| !p.is_empty())?;
        let signature = parts.next().filter(|s| !s.is_empty())?;

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: Value = serde_json::from_slice(&decoded).ok()?;
        claims
            .get("username")
            .and_then(Value::as_str)
            .filter(|username| !username.is_empty())
            .map(str::to_string)
    }

    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.session_max_age_secs)
    }

    pub fn clear_session_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            ADMIN_SESSION_COOKIE, value, max_age
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

// Axum extractor for the admin session cookie
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let cookies = parts.extract::<Option<TypedHeader<Cookie>>>().await.ok().flatten();
        let token = cookies.as_ref().and_then(|TypedHeader(cookie)| cookie.get(ADMIN_SESSION_COOKIE));

        state
            .auth_service
            .decode_session_token(token)
            .map(|username| AdminSession { username })
            .ok_or_else(|| AppError::unauthorized("Unauthorized"))
    }
}
