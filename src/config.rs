use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

pub const DEFAULT_SESSION_SECRET: &str = "change-this-admin-session-secret";
pub const DEFAULT_WEBHOOK_TARGET_URL: &str =
    "https://n8n.jobtrackfy.com/webhook-test/aa31c57d-cfe1-41c1-a1f8-6e70eca003f6";
pub const GOOGLE_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_ANALYTICS_ENDPOINT: &str = "https://analyticsdata.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not configured")]
    Missing(&'static str),

    #[error("{0}")]
    Incomplete(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminUser {
    pub username: String,
    pub password: String,
}

/// GA4 服务账号配置，三个字段全部存在时才算已配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ga4Config {
    pub property_id: String,
    pub client_email: String,
    pub private_key: String,
    pub token_url: String,
    pub api_endpoint: String,
}

/// 统计窗口（天）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsWindows {
    pub day: i64,
    pub week: i64,
    pub month: i64,
    pub retention_lookback: i64,
}

/// 单个统计窗口允许的最大天数
pub const MAX_WINDOW_DAYS: i64 = 3650;

impl AnalyticsWindows {
    /// 每个窗口在 1..=MAX_WINDOW_DAYS 之内，并且 day <= week <= month <= retention_lookback
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("ANALYTICS_DAY_WINDOW_DAYS", self.day),
            ("ANALYTICS_WEEK_WINDOW_DAYS", self.week),
            ("ANALYTICS_MONTH_WINDOW_DAYS", self.month),
            ("ANALYTICS_RETENTION_LOOKBACK_DAYS", self.retention_lookback),
        ];

        for (name, days) in named {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ConfigError::Invalid {
                    name,
                    value: days.to_string(),
                });
            }
        }

        for pair in named.windows(2) {
            let ((_, shorter), (name, longer)) = (pair[0], pair[1]);
            if longer < shorter {
                return Err(ConfigError::Invalid {
                    name,
                    value: format!("{} (must not be shorter than {} days)", longer, shorter),
                });
            }
        }

        Ok(())
    }
}

impl Default for AnalyticsWindows {
    fn default() -> Self {
        Self {
            day: 1,
            week: 7,
            month: 30,
            retention_lookback: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub cors_allowed_origins: String,

    // Supabase configuration
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub blog_images_bucket: String,
    pub max_image_upload_size: usize,

    // Admin authentication
    pub admin_users: Vec<AdminUser>,
    pub admin_session_secret: String,
    pub admin_auth_rpc: Option<String>,
    pub session_max_age_secs: i64,
    pub login_rate_limit_per_minute: u32,

    // Google Analytics
    pub ga4: Option<Ga4Config>,

    // Webhook tester
    pub webhook_target_url: String,
    pub fetch_html_timeout_secs: u64,

    // Analytics
    pub analytics_windows: AnalyticsWindows,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = non_empty_var("SUPABASE_URL")
            .or_else(|| non_empty_var("NEXT_PUBLIC_SUPABASE_URL"))
            .ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let supabase_service_role_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?;

        let analytics_windows = AnalyticsWindows {
            day: parse_var("ANALYTICS_DAY_WINDOW_DAYS", 1)?,
            week: parse_var("ANALYTICS_WEEK_WINDOW_DAYS", 7)?,
            month: parse_var("ANALYTICS_MONTH_WINDOW_DAYS", 30)?,
            retention_lookback: parse_var("ANALYTICS_RETENTION_LOOKBACK_DAYS", 60)?,
        };
        analytics_windows.validate()?;

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "jobtrackfy_admin=debug,tower_http=debug".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),

            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_service_role_key,
            blog_images_bucket: non_empty_var("SUPABASE_BLOG_IMAGES_BUCKET")
                .unwrap_or_else(|| "blog-images".to_string()),
            max_image_upload_size: parse_var("MAX_IMAGE_UPLOAD_SIZE", 5 * 1024 * 1024)?,

            admin_users: admin_users_from_env(),
            admin_session_secret: non_empty_var("ADMIN_SESSION_SECRET")
                .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
            admin_auth_rpc: non_empty_var("ADMIN_AUTH_RPC"),
            session_max_age_secs: parse_var("ADMIN_SESSION_MAX_AGE", 60 * 60 * 24 * 7)?,
            login_rate_limit_per_minute: parse_var("LOGIN_RATE_LIMIT_PER_MINUTE", 10)?,

            ga4: ga4_from_env(),

            webhook_target_url: non_empty_var("WEBHOOK_TARGET_URL")
                .unwrap_or_else(|| DEFAULT_WEBHOOK_TARGET_URL.to_string()),
            fetch_html_timeout_secs: parse_var("FETCH_HTML_TIMEOUT_SECS", 10)?,

            analytics_windows,
        })
    }

    /// 用于测试和本地工具的最小配置
    pub fn for_store(supabase_url: &str, service_role_key: &str) -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            cors_allowed_origins: "http://localhost:3001".to_string(),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_service_role_key: service_role_key.to_string(),
            blog_images_bucket: "blog-images".to_string(),
            max_image_upload_size: 5 * 1024 * 1024,
            admin_users: Vec::new(),
            admin_session_secret: DEFAULT_SESSION_SECRET.to_string(),
            admin_auth_rpc: None,
            session_max_age_secs: 60 * 60 * 24 * 7,
            login_rate_limit_per_minute: 10,
            ga4: None,
            webhook_target_url: DEFAULT_WEBHOOK_TARGET_URL.to_string(),
            fetch_html_timeout_secs: 10,
            analytics_windows: AnalyticsWindows::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn uses_default_session_secret(&self) -> bool {
        self.admin_session_secret == DEFAULT_SESSION_SECRET
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn admin_users_from_env() -> Vec<AdminUser> {
    let pair = |user_var: &str, pass_var: &str| {
        let username = env::var(user_var).ok()?.trim().to_string();
        let password = env::var(pass_var).ok()?;
        Some((username, password))
    };

    let pairs = [
        pair("ADMIN_USER_1_USERNAME", "ADMIN_USER_1_PASSWORD"),
        pair("ADMIN_USER_2_USERNAME", "ADMIN_USER_2_PASSWORD"),
    ];

    parse_admin_users(env::var("ADMIN_USERS").ok().as_deref(), pairs.into_iter().flatten())
}

/// 解析管理员账号：优先使用 ADMIN_USERS 的 JSON 数组，无有效条目时退回到成对的环境变量
pub fn parse_admin_users<I>(raw_json: Option<&str>, pairs: I) -> Vec<AdminUser>
where
    I: IntoIterator<Item = (String, String)>,
{
    if let Some(raw) = raw_json {
        if let Ok(serde_json::Value::Array(entries)) = serde_json::from_str::<serde_json::Value>(raw) {
            let users: Vec<AdminUser> = entries
                .iter()
                .filter_map(|entry| {
                    let username = entry.get("username")?.as_str()?.trim();
                    let password = entry.get("password")?.as_str()?;
                    if username.is_empty() || password.is_empty() {
                        return None;
                    }
                    Some(AdminUser {
                        username: username.to_string(),
                        password: password.to_string(),
                    })
                })
                .collect();

            if !users.is_empty() {
                return users;
            }
        }
    }

    pairs
        .into_iter()
        .filter(|(username, password)| !username.is_empty() && !password.is_empty())
        .map(|(username, password)| AdminUser { username, password })
        .collect()
}

fn ga4_from_env() -> Option<Ga4Config> {
    let property_id = non_empty_var("GA4_PROPERTY_ID")?;
    let client_email = non_empty_var("GA4_CLIENT_EMAIL")?;
    let raw_private_key = env::var("GA4_PRIVATE_KEY").ok().filter(|k| !k.is_empty())?;

    Some(Ga4Config {
        property_id,
        client_email,
        private_key: raw_private_key.replace("\\n", "\n"),
        token_url: GOOGLE_OAUTH_TOKEN_URL.to_string(),
        api_endpoint: GOOGLE_ANALYTICS_ENDPOINT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_users_from_json() {
        let raw = r#"[{"username":" alice ","password":"secret"},{"username":"","password":"x"},{"username":"bob"}]"#;
        let users = parse_admin_users(Some(raw), Vec::new());

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[0].password, "secret");
    }

    #[test]
    fn test_parse_admin_users_falls_back_to_pairs() {
        let pairs = vec![
            ("carol".to_string(), "pw1".to_string()),
            ("".to_string(), "pw2".to_string()),
        ];

        // 无法解析的 JSON
        let users = parse_admin_users(Some("not json"), pairs.clone());
        assert_eq!(users, vec![AdminUser { username: "carol".into(), password: "pw1".into() }]);

        // JSON 中没有有效条目
        let users = parse_admin_users(Some("[]"), pairs);
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_default_windows() {
        let windows = AnalyticsWindows::default();
        assert_eq!((windows.day, windows.week, windows.month, windows.retention_lookback), (1, 7, 30, 60));
    }

    #[test]
    fn test_window_validation() {
        assert!(AnalyticsWindows::default().validate().is_ok());

        let custom = AnalyticsWindows { day: 2, week: 14, month: 45, retention_lookback: 90 };
        assert!(custom.validate().is_ok());

        let zero = AnalyticsWindows { day: 0, ..AnalyticsWindows::default() };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::Invalid { name: "ANALYTICS_DAY_WINDOW_DAYS", .. })
        ));

        let huge = AnalyticsWindows { week: 1_000_000_000_000, ..AnalyticsWindows::default() };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::Invalid { name: "ANALYTICS_WEEK_WINDOW_DAYS", .. })
        ));

        let unordered = AnalyticsWindows { week: 40, ..AnalyticsWindows::default() };
        assert!(matches!(
            unordered.validate(),
            Err(ConfigError::Invalid { name: "ANALYTICS_MONTH_WINDOW_DAYS", .. })
        ));

        let short_lookback = AnalyticsWindows { retention_lookback: 20, ..AnalyticsWindows::default() };
        assert!(matches!(
            short_lookback.validate(),
            Err(ConfigError::Invalid { name: "ANALYTICS_RETENTION_LOOKBACK_DAYS", .. })
        ));
    }

    // 唯一读写 ANALYTICS_* 环境变量的测试
    #[test]
    fn test_from_env_rejects_bad_windows() {
        env::set_var("SUPABASE_URL", "http://localhost:54321");
        env::set_var("SUPABASE_SERVICE_ROLE_KEY", "service-key");

        env::set_var("ANALYTICS_WEEK_WINDOW_DAYS", "1000000000000");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.to_string(), "invalid value for ANALYTICS_WEEK_WINDOW_DAYS: 1000000000000");

        env::set_var("ANALYTICS_WEEK_WINDOW_DAYS", "45");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "ANALYTICS_MONTH_WINDOW_DAYS", .. })
        ));

        env::set_var("ANALYTICS_WEEK_WINDOW_DAYS", "14");
        let config = Config::from_env().unwrap();
        assert_eq!(config.analytics_windows.week, 14);
        assert_eq!(config.analytics_windows.month, 30);

        env::remove_var("ANALYTICS_WEEK_WINDOW_DAYS");
    }

    #[test]
    fn test_for_store_trims_trailing_slash() {
        let config = Config::for_store("http://localhost:54321/", "key");
        assert_eq!(config.supabase_url, "http://localhost:54321");
        assert!(config.uses_default_session_secret());
        assert!(!config.is_production());
    }
}
