use chrono::{DateTime, Utc};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::utils::serde_helpers::{lenient_amount, lenient_timestamp, non_empty_string};

// ---------------------------------------------------------------------------
// 存储层的行数据（只读快照）
// ---------------------------------------------------------------------------

/// `marketing_events` 表中的首页访问事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketingEvent {
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub anon_id: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl MarketingEvent {
    pub fn referrer(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get("referrer")?
            .as_str()
            .filter(|r| !r.is_empty())
    }
}

/// 注册用户
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub id: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 产品内的功能使用事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureEvent {
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub event_name: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionRow {
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentTransaction {
    #[serde(default, deserialize_with = "lenient_amount::deserialize")]
    pub amount: f64,
    #[serde(default, deserialize_with = "non_empty_string::deserialize")]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 一次聚合所需的全部行数据，已经由存储层按时间窗口和状态过滤
#[derive(Debug, Clone, Default)]
pub struct AnalyticsInput {
    pub marketing_month: Vec<MarketingEvent>,
    pub marketing_week: Vec<MarketingEvent>,
    pub users_month: Vec<UserRow>,
    pub users_lookback: Vec<UserRow>,
    pub events_month: Vec<FeatureEvent>,
    pub events_lookback: Vec<FeatureEvent>,
    pub active_subscriptions: Vec<SubscriptionRow>,
    pub payments_month: Vec<PaymentTransaction>,
    pub payments_all: Vec<PaymentTransaction>,
}

// ---------------------------------------------------------------------------
// 聚合结果
// ---------------------------------------------------------------------------

/// 按币种汇总的金额，保持币种首次出现的顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrencyTotals(Vec<(String, f64)>);

impl CurrencyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, currency: &str, amount: f64) {
        match self.0.iter_mut().find(|(code, _)| code == currency) {
            Some((_, total)) => *total += amount,
            None => self.0.push((currency.to_string(), amount)),
        }
    }

    pub fn merge(&mut self, other: &CurrencyTotals) {
        for (currency, amount) in other.iter() {
            self.add(currency, amount);
        }
    }

    pub fn get(&self, currency: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(code, _)| code == currency)
            .map(|(_, total)| *total)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(code, total)| (code.as_str(), *total))
    }

    pub fn currencies(&self) -> Vec<&str> {
        self.0.iter().map(|(code, _)| code.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CurrencyTotals {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (currency, total) in &self.0 {
            map.serialize_entry(currency, total)?;
        }
        map.end()
    }
}

/// 推荐来源信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferrerCount {
    pub source: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionWindow {
    pub home_views: usize,
    pub unique_visitors: usize,
    pub signups: usize,
    pub signup_conversion: f64,
    pub top_referrers: Vec<ReferrerCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcquisitionMetrics {
    pub last30: AcquisitionWindow,
    pub last7: AcquisitionWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationMetrics {
    pub activation_rate_24h: f64,
    pub avg_time_to_first_value_hours: Option<f64>,
    pub median_time_to_first_value_hours: Option<f64>,
    pub activated_users: usize,
    pub cohort_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngagementMetrics {
    pub dau: usize,
    pub wau: usize,
    pub mau: usize,
    pub stickiness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionMetrics {
    pub retention7: f64,
    pub retention30: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevenueMetrics {
    pub active_subscribers: usize,
    pub conversion_to_paid: f64,
    pub last30: CurrencyTotals,
    pub all_time: CurrencyTotals,
}

/// GET /api/admin/analytics 的完整响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsReport {
    pub acquisition: AcquisitionMetrics,
    pub activation: ActivationMetrics,
    pub engagement: EngagementMetrics,
    pub retention: RetentionMetrics,
    pub revenue: RevenueMetrics,
}

// ---------------------------------------------------------------------------
// 功能使用、漏斗和用户总数
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventCount {
    pub event: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSummary {
    pub total_events: usize,
    pub active_users: usize,
    pub top: Vec<EventCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureStats {
    pub last30: FeatureSummary,
    pub last7: FeatureSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunnelWindow {
    pub home_views: usize,
    pub unique_visitors: usize,
    pub dashboard_users: usize,
    pub purchasers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Funnel {
    pub last30: FunnelWindow,
    pub last7: FunnelWindow,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBreakdown {
    pub last30: CurrencyTotals,
    pub all_time: CurrencyTotals,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InsightsReport {
    pub funnel: Funnel,
    pub revenue: RevenueBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: u64,
}
