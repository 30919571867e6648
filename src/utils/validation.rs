use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::blog::*;
use crate::utils::markdown::{html_to_plain_text, MarkdownProcessor};
use crate::utils::slug::{to_slug, CATEGORY_SLUG_MAX_LEN, POST_SLUG_MAX_LEN};

pub const MAX_KEYWORDS: usize = 12;
pub const MAX_FAQ_ITEMS: usize = 10;

/// 规范化关键词：去掉空白和空项，最多保留 12 个
pub fn normalize_keywords(input: &KeywordsInput) -> Vec<String> {
    let entries: Vec<&str> = match input {
        KeywordsInput::Text(raw) => raw.split(',').collect(),
        KeywordsInput::List(values) => values.iter().filter_map(Value::as_str).collect(),
        KeywordsInput::Other(_) => Vec::new(),
    };

    entries
        .into_iter()
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// 只保留问题和答案都非空的 FAQ 条目，最多 10 条
pub fn normalize_faq(input: Option<&Value>) -> Vec<FaqItem> {
    let Some(Value::Array(entries)) = input else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let question = entry.get("question")?.as_str()?.trim();
            let answer = entry.get("answer")?.as_str()?.trim();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(FaqItem {
                question: question.to_string(),
                answer: answer.to_string(),
            })
        })
        .take(MAX_FAQ_ITEMS)
        .collect()
}

/// 编辑器文档只接受 `{type: "doc", content: [...]}`，否则返回空文档
pub fn normalize_editor_json(input: Option<Value>) -> Value {
    match input {
        Some(doc)
            if doc.get("type").and_then(Value::as_str) == Some("doc")
                && doc.get("content").map(Value::is_array).unwrap_or(false) =>
        {
            doc
        }
        _ => json!({ "type": "doc", "content": [] }),
    }
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn optional_trimmed(value: &Option<String>) -> Option<String> {
    Some(trimmed(value)).filter(|v| !v.is_empty())
}

/// 校验分类请求
pub fn validate_category_payload(payload: &CategoryPayload) -> Result<NewCategory> {
    let name = trimmed(&payload.name);
    if name.is_empty() {
        return Err(AppError::validation("Category name is required"));
    }

    let input_slug = trimmed(&payload.slug);
    let slug = to_slug(if input_slug.is_empty() { &name } else { &input_slug }, CATEGORY_SLUG_MAX_LEN);
    if slug.is_empty() {
        return Err(AppError::validation("Invalid category slug"));
    }

    Ok(NewCategory {
        name,
        slug,
        description: trimmed(&payload.description),
    })
}

/// 校验并规范化文章请求
///
/// Markdown 优先：有 Markdown 时由它生成 HTML 和阅读时间，只有 HTML 时保留原 HTML，
/// 阅读时间按纯文本计算。`published_at` 按新建文章处理，更新时由调用方覆盖。
pub fn validate_blog_payload(
    payload: BlogPayload,
    processor: &MarkdownProcessor,
    now: DateTime<Utc>,
) -> Result<BlogUpsertData> {
    let title = trimmed(&payload.title);
    let input_slug = trimmed(&payload.slug);
    let excerpt = trimmed(&payload.excerpt);

    let markdown = optional_trimmed(&payload.content_markdown)
        .or_else(|| optional_trimmed(&payload.content))
        .unwrap_or_default();
    let supplied_html = trimmed(&payload.content_html);

    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if markdown.is_empty() && supplied_html.is_empty() {
        return Err(AppError::validation("Content is required"));
    }

    let slug = to_slug(if input_slug.is_empty() { &title } else { &input_slug }, POST_SLUG_MAX_LEN);
    if slug.is_empty() {
        return Err(AppError::validation("Slug is invalid"));
    }

    let (content, content_html, reading_time_minutes) = if markdown.is_empty() {
        let plain_text = html_to_plain_text(&supplied_html);
        let minutes = processor.estimate_reading_time_from_text(&plain_text);
        (plain_text, supplied_html, minutes)
    } else {
        let html = processor.to_html(&markdown);
        let minutes = processor.estimate_reading_time(&markdown);
        (markdown.clone(), html, minutes)
    };

    let status = BlogStatus::from_input(payload.status.as_deref());
    let meta_title = optional_trimmed(&payload.meta_title).unwrap_or_else(|| title.clone());
    let meta_description = optional_trimmed(&payload.meta_description).unwrap_or_else(|| excerpt.clone());

    Ok(BlogUpsertData {
        category_id: optional_trimmed(&payload.category_id),
        title,
        slug,
        excerpt,
        content,
        content_markdown: markdown,
        content_html,
        content_json: normalize_editor_json(payload.content_json),
        cover_image_url: optional_trimmed(&payload.cover_image_url),
        cover_image_alt: trimmed(&payload.cover_image_alt),
        author_name: optional_trimmed(&payload.author_name)
            .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
        status,
        published_at: status.is_published().then_some(now),
        meta_title,
        meta_description,
        canonical_url: optional_trimmed(&payload.canonical_url),
        og_image_url: optional_trimmed(&payload.og_image_url),
        og_image_alt: trimmed(&payload.og_image_alt),
        primary_keyword: trimmed(&payload.primary_keyword),
        secondary_keywords: payload
            .secondary_keywords
            .as_ref()
            .map(normalize_keywords)
            .unwrap_or_default(),
        schema_faq: normalize_faq(payload.schema_faq.as_ref()),
        reading_time_minutes,
        updated_at: None,
    })
}
