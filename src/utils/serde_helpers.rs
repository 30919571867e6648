//! 用于处理 Supabase 行数据的宽松反序列化辅助模块
//!
//! 存储层返回的数据不做强校验：时间戳可能缺失或格式不标准，金额可能是数字或字符串。
//! 这些辅助函数保证单行的异常值不会让整个查询结果反序列化失败。

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// 解析 ISO-8601 / RFC 3339 时间戳，兼容 PostgreSQL 的 `2024-01-01 00:00:00+00` 格式
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    // `+00` 这种两位时区偏移
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    // 无时区的时间按 UTC 处理
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// 可选时间戳：缺失、null 或无法解析时为 None
pub mod lenient_timestamp {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => parse_timestamp(&s),
            _ => None,
        })
    }
}

/// 金额：数字或数字字符串，其余一律视为 0
pub mod lenient_amount {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        let amount = match raw {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            Some(serde_json::Value::Bool(true)) => 1.0,
            _ => 0.0,
        };
        Ok(if amount.is_finite() { amount } else { 0.0 })
    }
}

/// 空字符串视为 None 的可选字符串
pub mod non_empty_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// 请求体中的可选文本字段：只接受字符串，其余类型视为缺失
pub mod loose_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
    }
}
