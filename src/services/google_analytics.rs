use crate::{
    config::{Config, ConfigError, Ga4Config},
    error::{AppError, Result},
    models::google_analytics::{GaAnalyticsResponse, RunReportResponse},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOP_PAGES_LIMIT: u32 = 5;

/// 服务账号断言的声明
#[derive(Debug, Serialize, Deserialize)]
struct ServiceAccountClaims {
    iss: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// GA4 Data API 客户端
#[derive(Clone)]
pub struct GoogleAnalyticsService {
    client: reqwest::Client,
    config: Option<Ga4Config>,
}

impl GoogleAnalyticsService {
    pub async fn new(config: &Config) -> Result<Self> {
        if config.ga4.is_none() {
            info!("GA4 credentials not configured; /google-analytics will report a configuration error");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config: config.ga4.clone(),
        })
    }

    fn ga4(&self) -> Result<&Ga4Config> {
        self.config.as_ref().ok_or(AppError::Configuration(ConfigError::Incomplete(
            "GA4 env missing: GA4_PROPERTY_ID, GA4_CLIENT_EMAIL, GA4_PRIVATE_KEY are required",
        )))
    }

    /// 签发 RS256 断言
    fn service_account_assertion(ga4: &Ga4Config, issued_at: i64) -> Result<String> {
        let claims = ServiceAccountClaims {
            iss: ga4.client_email.clone(),
            scope: ANALYTICS_READONLY_SCOPE.to_string(),
            aud: ga4.token_url.clone(),
            exp: issued_at + TOKEN_LIFETIME_SECS,
            iat: issued_at,
        };

        let key = EncodingKey::from_rsa_pem(ga4.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    /// 用断言换取访问令牌
    async fn access_token(&self, ga4: &Ga4Config) -> Result<String> {
        let assertion = Self::service_account_assertion(ga4, chrono::Utc::now().timestamp())?;

        let response = self
            .client
            .post(&ga4.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!("GA token request failed ({}): {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::ExternalService("GA token response missing access_token".to_string()))
    }

    async fn run_report(&self, ga4: &Ga4Config, token: &str, body: &Value) -> Result<RunReportResponse> {
        let url = format!("{}/properties/{}:runReport", ga4.api_endpoint, ga4.property_id);
        debug!("Running GA4 report: {}", url);

        let response = self.client.post(&url).bearer_auth(token).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!("GA runReport failed ({}): {}", status, body)));
        }

        Ok(response.json().await?)
    }

    /// 7 天和 30 天概览以及 30 天内浏览量最高的页面
    pub async fn get_overview(&self) -> Result<GaAnalyticsResponse> {
        let ga4 = self.ga4()?;
        let token = self.access_token(ga4).await?;

        let last7_body = overview_report("7daysAgo");
        let last30_body = overview_report("30daysAgo");
        let top_pages_body = top_pages_report();

        let (last7, last30, top_pages) = futures::try_join!(
            self.run_report(ga4, &token, &last7_body),
            self.run_report(ga4, &token, &last30_body),
            self.run_report(ga4, &token, &top_pages_body),
        )?;

        Ok(GaAnalyticsResponse {
            last7: last7.overview_metrics(),
            last30: last30.overview_metrics(),
            top_pages: top_pages.top_pages(),
        })
    }
}

fn overview_report(start_date: &str) -> Value {
    json!({
        "dateRanges": [{ "startDate": start_date, "endDate": "today" }],
        "metrics": [
            { "name": "activeUsers" },
            { "name": "newUsers" },
            { "name": "sessions" },
            { "name": "screenPageViews" }
        ],
        "limit": 1
    })
}

fn top_pages_report() -> Value {
    json!({
        "dateRanges": [{ "startDate": "30daysAgo", "endDate": "today" }],
        "dimensions": [{ "name": "pagePath" }],
        "metrics": [{ "name": "screenPageViews" }],
        "orderBys": [{ "metric": { "metricName": "screenPageViews" }, "desc": true }],
        "limit": TOP_PAGES_LIMIT
    })
}
