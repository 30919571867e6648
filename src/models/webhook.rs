use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::serde_helpers::loose_string;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchHtmlRequest {
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchedHtml {
    pub html: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// 转发到 webhook 的内容
#[derive(Debug, Clone, Serialize)]
pub struct WebhookForward<'a> {
    pub html: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTestResult {
    pub status: u16,
    pub data: Value,
    pub html_length: usize,
    pub url: String,
}
