use crate::{
    config::Config,
    error::{AppError, Result},
    models::webhook::{FetchedHtml, WebhookForward, WebhookTestResult},
};
use axum::http::StatusCode;
use chrono::Utc;
use reqwest::header;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const TESTER_USER_AGENT: &str = "JobTrackfy-Webhook-Tester/1.0";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// 抓取页面 HTML 并转发给自动化 webhook
#[derive(Clone)]
pub struct WebhookService {
    client: reqwest::Client,
    target_url: String,
    fetch_timeout: Duration,
}

impl WebhookService {
    pub async fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            target_url: config.webhook_target_url.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_html_timeout_secs),
        })
    }

    /// 检查并解析请求中的 URL
    pub fn parse_url(raw: Option<&str>) -> Result<Url> {
        let raw = raw
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::bad_request("URL is required"))?;

        Url::parse(raw).map_err(|_| AppError::bad_request("Invalid URL format"))
    }

    pub async fn fetch_html(&self, raw_url: Option<&str>) -> Result<FetchedHtml> {
        let url = Self::parse_url(raw_url)?;
        debug!("Fetching HTML from {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(self.fetch_timeout)
            .header(header::USER_AGENT, TESTER_USER_AGENT)
            .header(header::ACCEPT, BROWSER_ACCEPT)
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(header::ACCEPT_ENCODING, "gzip, deflate")
            .header(header::CONNECTION, "keep-alive")
            .header(header::UPGRADE_INSECURE_REQUESTS, "1")
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Fetching {} failed with {}", url, status);
            return Err(AppError::Upstream {
                status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
                message: format!(
                    "Failed to fetch URL: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let html = response.text().await.map_err(map_send_error)?;

        Ok(FetchedHtml {
            html,
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            fetched_at: Utc::now(),
        })
    }

    /// 抓取页面后把 `{html, url}` POST 到 webhook
    pub async fn test_webhook(&self, raw_url: Option<&str>) -> Result<WebhookTestResult> {
        let page = self.fetch_html(raw_url).await?;

        let response = self
            .client
            .post(&self.target_url)
            .json(&WebhookForward {
                html: &page.html,
                url: &page.url,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Webhook failed: {}", status.as_u16()),
            });
        }

        let body = response.text().await?;
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        info!("Webhook accepted {} bytes of HTML from {}", page.html.len(), page.url);

        Ok(WebhookTestResult {
            status: status.as_u16(),
            data,
            html_length: page.html.len(),
            url: page.url,
        })
    }
}

fn map_send_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout
    } else {
        AppError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(target: &str, timeout_secs: u64) -> WebhookService {
        let mut config = Config::for_store("http://127.0.0.1:9", "key");
        config.webhook_target_url = target.to_string();
        config.fetch_html_timeout_secs = timeout_secs;
        WebhookService::new(&config).await.unwrap()
    }

    #[test]
    fn test_parse_url() {
        assert!(matches!(
            WebhookService::parse_url(None),
            Err(AppError::BadRequest(ref msg)) if msg == "URL is required"
        ));
        assert!(matches!(
            WebhookService::parse_url(Some("  ")),
            Err(AppError::BadRequest(ref msg)) if msg == "URL is required"
        ));
        assert!(matches!(
            WebhookService::parse_url(Some("not a url")),
            Err(AppError::BadRequest(ref msg)) if msg == "Invalid URL format"
        ));
        assert!(WebhookService::parse_url(Some("https://example.com/a")).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_html_sends_tester_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", TESTER_USER_AGENT))
            .and(header("upgrade-insecure-requests", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>hi</html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let webhook = service("http://127.0.0.1:9", 10).await;
        let page = webhook.fetch_html(Some(&format!("{}/page", server.uri()))).await.unwrap();

        assert_eq!(page.html, "<html>hi</html>");
        assert_eq!(page.status, 200);
        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_fetch_html_passes_through_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let webhook = service("http://127.0.0.1:9", 10).await;
        let err = webhook.fetch_html(Some(&server.uri())).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(matches!(err, AppError::Upstream { ref message, .. } if message == "Failed to fetch URL: 404 Not Found"));
    }

    #[tokio::test]
    async fn test_fetch_html_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let webhook = service("http://127.0.0.1:9", 1).await;
        let err = webhook.fetch_html(Some(&server.uri())).await.unwrap_err();

        assert!(matches!(err, AppError::Timeout));
    }

    #[tokio::test]
    async fn test_webhook_forwards_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>job</p>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({ "html": "<p>job</p>" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "received": true })))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = service(&format!("{}/hook", server.uri()), 10).await;
        let result = webhook.test_webhook(Some(&format!("{}/job", server.uri()))).await.unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.data, json!({ "received": true }));
        assert_eq!(result.html_length, 10);
    }

    #[tokio::test]
    async fn test_webhook_failure_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let webhook = service(&format!("{}/hook", server.uri()), 10).await;
        let err = webhook.test_webhook(Some(&server.uri())).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Upstream responded with 502 Bad Gateway: Webhook failed: 500");
    }
}
