use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::serde_helpers::{lenient_timestamp, loose_string};

pub const DEFAULT_AUTHOR_NAME: &str = "JobTrackfy Team";

pub const BLOG_POST_COLUMNS: &str = "id, category_id, title, slug, excerpt, content, content_markdown, content_html, content_json, cover_image_url, cover_image_alt, author_name, status, published_at, meta_title, meta_description, canonical_url, og_image_url, og_image_alt, primary_keyword, secondary_keywords, schema_faq, reading_time_minutes, created_at, updated_at";

pub const BLOG_CATEGORY_COLUMNS: &str = "id, name, slug, description";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

impl BlogStatus {
    /// 只有精确的 "published" 才是发布状态
    pub fn from_input(input: Option<&str>) -> Self {
        match input {
            Some("published") => Self::Published,
            _ => Self::Draft,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// 存储中的博客文章
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPost {
    pub id: Value,
    pub category_id: Option<String>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub content_markdown: Option<String>,
    pub content_html: Option<String>,
    pub content_json: Option<Value>,
    pub cover_image_url: Option<String>,
    pub cover_image_alt: Option<String>,
    pub author_name: Option<String>,
    pub status: BlogStatus,
    #[serde(with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub og_image_url: Option<String>,
    pub og_image_alt: Option<String>,
    pub primary_keyword: Option<String>,
    pub secondary_keywords: Option<Vec<String>>,
    pub schema_faq: Option<Vec<FaqItem>>,
    pub reading_time_minutes: Option<u32>,
    #[serde(with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 编辑器提交的文章内容，字段类型不做强校验
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPayload {
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub content_markdown: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub content_html: Option<String>,
    #[serde(default)]
    pub content_json: Option<Value>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub cover_image_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub cover_image_alt: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub author_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub meta_title: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub canonical_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub og_image_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub og_image_alt: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub primary_keyword: Option<String>,
    #[serde(default)]
    pub secondary_keywords: Option<KeywordsInput>,
    #[serde(default)]
    pub schema_faq: Option<Value>,
}

/// 关键词：逗号分隔的字符串或字符串数组
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KeywordsInput {
    Text(String),
    List(Vec<Value>),
    Other(Value),
}

impl From<&str> for KeywordsInput {
    fn from(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }
}

/// 规范化之后写入 `blog_posts` 的数据
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlogUpsertData {
    pub category_id: Option<String>,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub content_markdown: String,
    pub content_html: String,
    pub content_json: Value,
    pub cover_image_url: Option<String>,
    pub cover_image_alt: String,
    pub author_name: String,
    pub status: BlogStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title: String,
    pub meta_description: String,
    pub canonical_url: Option<String>,
    pub og_image_url: Option<String>,
    pub og_image_alt: String,
    pub primary_keyword: String,
    pub secondary_keywords: Vec<String>,
    pub schema_faq: Vec<FaqItem>,
    pub reading_time_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogCategory {
    pub id: Value,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPayload {
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogPreviewRequest {
    #[serde(default, deserialize_with = "loose_string::deserialize")]
    pub markdown: Option<String>,
}

/// 仅用于读取已有文章的发布时间
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishedAtRow {
    #[serde(default, with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdRow {
    #[serde(default)]
    pub id: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blog_status_from_input() {
        assert_eq!(BlogStatus::from_input(Some("published")), BlogStatus::Published);
        assert_eq!(BlogStatus::from_input(Some("Published")), BlogStatus::Draft);
        assert_eq!(BlogStatus::from_input(None), BlogStatus::Draft);
    }

    #[test]
    fn test_payload_ignores_wrong_types() {
        let payload: BlogPayload = serde_json::from_value(json!({
            "title": 12,
            "contentMarkdown": "# Hi",
            "secondaryKeywords": ["a", " b "],
            "schemaFaq": "nope"
        }))
        .unwrap();

        assert_eq!(payload.title, None);
        assert_eq!(payload.content_markdown.as_deref(), Some("# Hi"));
        assert_eq!(
            payload.secondary_keywords,
            Some(KeywordsInput::List(vec![json!("a"), json!(" b ")]))
        );
    }

    #[test]
    fn test_blog_post_from_row() {
        let post: BlogPost = serde_json::from_value(json!({
            "id": "6f1c",
            "title": "Hello",
            "slug": "hello",
            "status": "published",
            "published_at": "2024-01-01T00:00:00+00:00",
            "secondary_keywords": ["rust"],
            "schema_faq": [{ "question": "Q", "answer": "A" }]
        }))
        .unwrap();

        assert_eq!(post.status, BlogStatus::Published);
        assert!(post.published_at.is_some());
        assert_eq!(post.schema_faq.map(|faq| faq.len()), Some(1));
    }
}
