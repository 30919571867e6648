use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const WORDS_PER_MINUTE: f64 = 220.0;

static IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\((https?://[^\s)]+)\)").unwrap()
});
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").unwrap()
});
static BOLD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static ORDERED_ITEM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+\. ").unwrap());

static FENCED_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static MARKDOWN_PUNCTUATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#>*`\[\]()\-]").unwrap());

static STYLE_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style.*?</style>").unwrap());
static SCRIPT_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script.*?</script>").unwrap());
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// 博客正文的渲染结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedContent {
    pub html: String,
    pub plain_text: String,
    pub reading_time_minutes: u32,
}

/// 受限 Markdown 子集的渲染器
///
/// 支持标题（h1-h3）、引用、有序/无序列表、围栏代码块和段落，以及行内的图片、链接、
/// 粗体、斜体和行内代码。每一行先做 HTML 转义再做行内替换，图片和链接只接受 http(s) 地址。
#[derive(Clone, Debug, Default)]
pub struct MarkdownProcessor {}

impl MarkdownProcessor {
    pub fn new() -> Self {
        Self {}
    }

    /// 将 Markdown 转换为 HTML
    pub fn to_html(&self, markdown: &str) -> String {
        let normalized = markdown.replace('\r', "");
        let mut html: Vec<String> = Vec::new();
        let mut lists = ListState::default();
        let mut in_code = false;

        for raw_line in normalized.split('\n') {
            let line = raw_line.trim_end();

            if line.starts_with("```") {
                lists.close(&mut html);
                html.push(if in_code { "</code></pre>" } else { "<pre><code>" }.to_string());
                in_code = !in_code;
                continue;
            }

            if in_code {
                html.push(format!("{}\n", escape_html(raw_line)));
                continue;
            }

            if line.trim().is_empty() {
                lists.close(&mut html);
                continue;
            }

            // 按前缀长度从长到短匹配标题
            if let Some(text) = line.strip_prefix("### ") {
                lists.close(&mut html);
                html.push(format!("<h3>{}</h3>", render_inline(text)));
                continue;
            }
            if let Some(text) = line.strip_prefix("## ") {
                lists.close(&mut html);
                html.push(format!("<h2>{}</h2>", render_inline(text)));
                continue;
            }
            if let Some(text) = line.strip_prefix("# ") {
                lists.close(&mut html);
                html.push(format!("<h1>{}</h1>", render_inline(text)));
                continue;
            }
            if let Some(text) = line.strip_prefix("> ") {
                lists.close(&mut html);
                html.push(format!("<blockquote>{}</blockquote>", render_inline(text)));
                continue;
            }

            if let Some(text) = line.strip_prefix("- ") {
                lists.open_unordered(&mut html);
                html.push(format!("<li>{}</li>", render_inline(text)));
                continue;
            }

            if let Some(marker) = ORDERED_ITEM_REGEX.find(line) {
                lists.open_ordered(&mut html);
                html.push(format!("<li>{}</li>", render_inline(&line[marker.end()..])));
                continue;
            }

            lists.close(&mut html);
            html.push(format!("<p>{}</p>", render_inline(line)));
        }

        lists.close(&mut html);
        if in_code {
            html.push("</code></pre>".to_string());
        }

        html.join("\n")
    }

    /// 从 HTML 提取纯文本
    pub fn to_text(&self, html: &str) -> String {
        html_to_plain_text(html)
    }

    /// 估算 Markdown 正文的阅读时间（分钟），代码块和标记符号不计入字数
    pub fn estimate_reading_time(&self, markdown: &str) -> u32 {
        let without_code = FENCED_CODE_REGEX.replace_all(markdown, " ");
        let text = MARKDOWN_PUNCTUATION_REGEX.replace_all(&without_code, " ");
        minutes_for_words(text.split_whitespace().count())
    }

    /// 纯文本的阅读时间，用于只有 HTML 正文的文章
    pub fn estimate_reading_time_from_text(&self, text: &str) -> u32 {
        minutes_for_words(text.split_whitespace().count())
    }

    pub fn render(&self, markdown: &str) -> RenderedContent {
        let html = self.to_html(markdown);
        let plain_text = self.to_text(&html);

        RenderedContent {
            html,
            plain_text,
            reading_time_minutes: self.estimate_reading_time(markdown),
        }
    }
}

#[derive(Default)]
struct ListState {
    in_ul: bool,
    in_ol: bool,
}

impl ListState {
    fn close(&mut self, html: &mut Vec<String>) {
        if self.in_ul {
            html.push("</ul>".to_string());
            self.in_ul = false;
        }
        if self.in_ol {
            html.push("</ol>".to_string());
            self.in_ol = false;
        }
    }

    fn open_unordered(&mut self, html: &mut Vec<String>) {
        if self.in_ol {
            html.push("</ol>".to_string());
            self.in_ol = false;
        }
        if !self.in_ul {
            html.push("<ul>".to_string());
            self.in_ul = true;
        }
    }

    fn open_ordered(&mut self, html: &mut Vec<String>) {
        if self.in_ul {
            html.push("</ul>".to_string());
            self.in_ul = false;
        }
        if !self.in_ol {
            html.push("<ol>".to_string());
            self.in_ol = true;
        }
    }
}

fn minutes_for_words(words: usize) -> u32 {
    ((words as f64 / WORDS_PER_MINUTE).round() as u32).max(1)
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// 行内替换，必须先转义
fn render_inline(line: &str) -> String {
    let out = escape_html(line);
    let out = IMAGE_REGEX.replace_all(&out, r#"<img src="$2" alt="$1" loading="lazy" />"#);
    let out = LINK_REGEX.replace_all(&out, r#"<a href="$2" rel="noopener noreferrer" target="_blank">$1</a>"#);
    let out = BOLD_REGEX.replace_all(&out, "<strong>$1</strong>");
    let out = ITALIC_REGEX.replace_all(&out, "<em>$1</em>");
    let out = CODE_REGEX.replace_all(&out, "<code>$1</code>");
    out.into_owned()
}

/// 去掉 style/script 块和所有标签，还原常见实体并压缩空白
pub fn html_to_plain_text(html: &str) -> String {
    let text = STYLE_BLOCK_REGEX.replace_all(html, " ");
    let text = SCRIPT_BLOCK_REGEX.replace_all(&text, " ");
    let text = TAG_REGEX.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");

    WHITESPACE_REGEX.replace_all(&text, " ").trim().to_string()
}
