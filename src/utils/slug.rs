use once_cell::sync::Lazy;
use regex::Regex;

pub const POST_SLUG_MAX_LEN: usize = 120;
pub const CATEGORY_SLUG_MAX_LEN: usize = 80;

static NON_ALNUM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static FILE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9._-]+").unwrap());
static HYPHEN_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// 从标题生成 URL 友好的 slug
///
/// 小写、去掉首尾空白，非字母数字的连续字符替换为单个连字符，去掉首尾连字符后截断到 `max_len`。
/// 结果可能为空，由调用方决定如何处理。
pub fn to_slug(input: &str, max_len: usize) -> String {
    let lowered = input.to_lowercase();
    let replaced = NON_ALNUM_REGEX.replace_all(lowered.trim(), "-");
    // 只剩 ASCII，按字节截断是安全的
    let trimmed = replaced.trim_matches('-');
    trimmed[..trimmed.len().min(max_len)].to_string()
}

/// 上传文件名的安全化版本，用作存储路径的一部分
pub fn sanitize_file_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = FILE_NAME_REGEX.replace_all(&lowered, "-");
    let collapsed = HYPHEN_RUN_REGEX.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-');

    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}
