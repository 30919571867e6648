//! 产品指标聚合
//!
//! 所有函数都是 (行数据, now) 的纯函数：不做 I/O，不持有共享状态，任何输入都返回合法结果。
//! 比例统一保留一位小数，分母为 0 时返回 0。

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::config::AnalyticsWindows;
use crate::models::analytics::*;

/// 产品定义的“首次价值”事件
pub const FIRST_VALUE_EVENTS: &[&str] = &[
    "extension_bookmark",
    "extension_application",
    "extension_contact",
    "ai_answer_generator",
    "ai_cover_letter",
    "ai_outreach",
    "ai_linkedin_profile",
    "ai_project_description",
    "ai_mock_interview_start",
    "ai_mock_interview_turn",
    "dashboard_view",
];

pub const ACTIVATION_WINDOW_HOURS: f64 = 24.0;
pub const DEFAULT_TOP_REFERRERS: usize = 5;
pub const DEFAULT_TOP_FEATURE_EVENTS: usize = 8;
pub const DIRECT_REFERRER: &str = "direct";
pub const DEFAULT_CURRENCY: &str = "USD";

const MS_PER_HOUR: f64 = 3_600_000.0;

/// 百分比，一位小数：round(part / whole * 1000) / 10
pub fn round_percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    let value = ((part / whole) * 1000.0).round() / 10.0;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// 超出时间范围时取最早的可表示时刻
pub fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 统计 key 的不同非空取值个数，缺失或空字符串的行不计入
pub fn unique_count<T, F>(rows: &[T], key: F) -> usize
where
    F: Fn(&T) -> Option<&str>,
{
    rows.iter()
        .filter_map(|row| key(row).filter(|value| !value.is_empty()))
        .collect::<HashSet<_>>()
        .len()
}

/// 按币种汇总金额，缺失币种记为 USD
pub fn sum_by_currency(rows: &[PaymentTransaction]) -> CurrencyTotals {
    let mut totals = CurrencyTotals::new();
    for row in rows {
        let currency = row
            .currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY);
        let amount = if row.amount.is_finite() { row.amount } else { 0.0 };
        totals.add(currency, amount);
    }
    totals
}

/// 从 referrer URL 中提取主机名（去掉 www. 前缀），无法解析时归为 direct
pub fn extract_referrer_host(referrer: &str) -> String {
    url::Url::parse(referrer)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_string()))
        .filter(|host| !host.is_empty())
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .unwrap_or_else(|| DIRECT_REFERRER.to_string())
}

/// 访问量最高的来源，计数相同时按首次出现顺序
pub fn top_referrers(rows: &[MarketingEvent], limit: usize) -> Vec<ReferrerCount> {
    let mut counts: Vec<ReferrerCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let host = row
            .referrer()
            .map(extract_referrer_host)
            .unwrap_or_else(|| DIRECT_REFERRER.to_string());

        match index.get(&host) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(host.clone(), counts.len());
                counts.push(ReferrerCount { source: host, count: 1 });
            }
        }
    }

    // sort_by 是稳定排序
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// 每个用户最早的首次价值事件时间
pub fn first_value_times<'a>(
    events: &'a [FeatureEvent],
    first_value_event_names: &[&str],
) -> HashMap<&'a str, DateTime<Utc>> {
    let names: HashSet<&str> = first_value_event_names.iter().copied().collect();
    let mut first_by_user: HashMap<&str, DateTime<Utc>> = HashMap::new();

    for event in events {
        let (Some(user_id), Some(name), Some(created_at)) =
            (event.user_id.as_deref(), event.event_name.as_deref(), event.created_at)
        else {
            continue;
        };
        if !names.contains(name) {
            continue;
        }

        first_by_user
            .entry(user_id)
            .and_modify(|existing| {
                if created_at < *existing {
                    *existing = created_at;
                }
            })
            .or_insert(created_at);
    }

    first_by_user
}

/// 激活指标：注册到首次价值事件的耗时
///
/// 队列大小（分母）包含所有有 id 和注册时间的用户；没有首次价值事件的用户不计入耗时统计，
/// 首次价值事件早于注册时间的差值视为数据异常并丢弃。中位数取排序后下标 floor(n/2) 的元素。
pub fn compute_activation(
    cohort_users: &[UserRow],
    feature_events: &[FeatureEvent],
    first_value_event_names: &[&str],
) -> ActivationMetrics {
    let mut signups: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for user in cohort_users {
        if let (Some(id), Some(created_at)) = (user.id.as_deref(), user.created_at) {
            signups.insert(id, created_at);
        }
    }

    let first_by_user = first_value_times(feature_events, first_value_event_names);

    let mut diffs_hours: Vec<f64> = Vec::new();
    let mut activated_within_window = 0usize;

    for (user_id, signup_at) in &signups {
        let Some(first_at) = first_by_user.get(user_id) else {
            continue;
        };
        let diff_hours = (*first_at - *signup_at).num_milliseconds() as f64 / MS_PER_HOUR;
        if diff_hours < 0.0 {
            continue;
        }
        if diff_hours <= ACTIVATION_WINDOW_HOURS {
            activated_within_window += 1;
        }
        diffs_hours.push(diff_hours);
    }

    diffs_hours.sort_by(|a, b| a.total_cmp(b));

    let avg = if diffs_hours.is_empty() {
        None
    } else {
        Some(diffs_hours.iter().sum::<f64>() / diffs_hours.len() as f64)
    };
    let median = diffs_hours.get(diffs_hours.len() / 2).copied();

    ActivationMetrics {
        activation_rate_24h: round_percentage(activated_within_window as f64, signups.len() as f64),
        avg_time_to_first_value_hours: avg,
        median_time_to_first_value_hours: median,
        activated_users: diffs_hours.len(),
        cohort_size: signups.len(),
    }
}

pub fn group_events_by_user(events: &[FeatureEvent]) -> HashMap<&str, Vec<DateTime<Utc>>> {
    let mut by_user: HashMap<&str, Vec<DateTime<Utc>>> = HashMap::new();
    for event in events {
        if let (Some(user_id), Some(created_at)) = (event.user_id.as_deref(), event.created_at) {
            by_user.entry(user_id).or_default().push(created_at);
        }
    }
    by_user
}

/// 留存率：注册 window_days 天之后仍有任意事件的用户占比
pub fn compute_retention(
    cohort_users: &[&UserRow],
    events_by_user: &HashMap<&str, Vec<DateTime<Utc>>>,
    window_days: i64,
) -> f64 {
    if cohort_users.is_empty() {
        return 0.0;
    }

    let retained = cohort_users
        .iter()
        .filter(|user| {
            let (Some(id), Some(created_at)) = (user.id.as_deref(), user.created_at) else {
                return false;
            };
            let Some(threshold) = Duration::try_days(window_days)
                .and_then(|span| created_at.checked_add_signed(span))
            else {
                return false;
            };
            events_by_user
                .get(id)
                .map(|timestamps| timestamps.iter().any(|ts| *ts >= threshold))
                .unwrap_or(false)
        })
        .count();

    round_percentage(retained as f64, cohort_users.len() as f64)
}

/// 在 [from, to) 区间内注册的用户
pub fn users_created_between<'a>(
    users: &'a [UserRow],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<&'a UserRow> {
    users
        .iter()
        .filter(|user| matches!(user.created_at, Some(created) if created >= from && created < to))
        .collect()
}

pub fn count_created_since<T, F>(rows: &[T], since: DateTime<Utc>, created_at: F) -> usize
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    rows.iter()
        .filter(|row| matches!(created_at(row), Some(ts) if ts >= since))
        .count()
}

/// DAU / WAU / MAU 都以同一个 now 为终点，DAU ⊆ WAU ⊆ MAU
pub fn compute_engagement(
    events: &[FeatureEvent],
    now: DateTime<Utc>,
    windows: &AnalyticsWindows,
) -> EngagementMetrics {
    let day_start = days_before(now, windows.day);
    let week_start = days_before(now, windows.week);

    let active_since = |since: DateTime<Utc>| {
        events
            .iter()
            .filter(|e| matches!(e.created_at, Some(ts) if ts >= since))
            .filter_map(|e| e.user_id.as_deref())
            .collect::<HashSet<_>>()
            .len()
    };

    let dau = active_since(day_start);
    let wau = active_since(week_start);
    let mau = unique_count(events, |e| e.user_id.as_deref());

    EngagementMetrics {
        dau,
        wau,
        mau,
        stickiness: round_percentage(dau as f64, mau as f64),
    }
}

pub fn compute_revenue(
    active_sub_count: usize,
    total_users: usize,
    payments_month: &[PaymentTransaction],
    payments_all: &[PaymentTransaction],
) -> RevenueMetrics {
    RevenueMetrics {
        active_subscribers: active_sub_count,
        conversion_to_paid: round_percentage(active_sub_count as f64, total_users as f64),
        last30: sum_by_currency(payments_month),
        all_time: sum_by_currency(payments_all),
    }
}

pub fn build_acquisition_window(marketing: &[MarketingEvent], signups: usize) -> AcquisitionWindow {
    let unique_visitors = unique_count(marketing, |m| m.anon_id.as_deref());
    AcquisitionWindow {
        home_views: marketing.len(),
        unique_visitors,
        signups,
        signup_conversion: round_percentage(signups as f64, unique_visitors as f64),
        top_referrers: top_referrers(marketing, DEFAULT_TOP_REFERRERS),
    }
}

/// 汇总完整的分析报告
pub fn build_report(
    input: &AnalyticsInput,
    now: DateTime<Utc>,
    windows: &AnalyticsWindows,
    first_value_event_names: &[&str],
) -> AnalyticsReport {
    let week_start = days_before(now, windows.week);
    let month_start = days_before(now, windows.month);
    let lookback_start = days_before(now, windows.retention_lookback);

    let signups_week = count_created_since(&input.users_month, week_start, |u| u.created_at);

    let acquisition = AcquisitionMetrics {
        last30: build_acquisition_window(&input.marketing_month, input.users_month.len()),
        last7: build_acquisition_window(&input.marketing_week, signups_week),
    };

    let activation = compute_activation(&input.users_month, &input.events_month, first_value_event_names);
    let engagement = compute_engagement(&input.events_month, now, windows);

    let events_by_user = group_events_by_user(&input.events_lookback);
    let week_cohort = users_created_between(&input.users_lookback, month_start, week_start);
    let month_cohort = users_created_between(&input.users_lookback, lookback_start, month_start);

    let retention = RetentionMetrics {
        retention7: compute_retention(&week_cohort, &events_by_user, windows.week),
        retention30: compute_retention(&month_cohort, &events_by_user, windows.month),
    };

    let revenue = compute_revenue(
        input.active_subscriptions.len(),
        input.users_lookback.len(),
        &input.payments_month,
        &input.payments_all,
    );

    AnalyticsReport {
        acquisition,
        activation,
        engagement,
        retention,
        revenue,
    }
}

/// 功能事件摘要：事件总数、活跃用户数和最常见的事件
pub fn summarize_feature_events(rows: &[FeatureEvent], limit: usize) -> FeatureSummary {
    let mut by_event: Vec<EventCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for name in rows.iter().filter_map(|row| row.event_name.as_deref()) {
        match index.get(name) {
            Some(&i) => by_event[i].count += 1,
            None => {
                index.insert(name, by_event.len());
                by_event.push(EventCount { event: name.to_string(), count: 1 });
            }
        }
    }

    by_event.sort_by(|a, b| b.count.cmp(&a.count));
    by_event.truncate(limit);

    FeatureSummary {
        total_events: rows.len(),
        active_users: unique_count(rows, |row| row.user_id.as_deref()),
        top: by_event,
    }
}

pub fn build_funnel_window(
    marketing: &[MarketingEvent],
    dashboard_events: &[FeatureEvent],
    subscriptions: &[SubscriptionRow],
) -> FunnelWindow {
    let active: Vec<&SubscriptionRow> = subscriptions.iter().filter(|s| s.is_active()).collect();
    FunnelWindow {
        home_views: marketing.len(),
        unique_visitors: unique_count(marketing, |m| m.anon_id.as_deref()),
        dashboard_users: unique_count(dashboard_events, |e| e.user_id.as_deref()),
        purchasers: unique_count(&active, |s| s.user_id.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(raw: &str) -> Option<DateTime<Utc>> {
        crate::utils::serde_helpers::parse_timestamp(raw)
    }

    fn user(id: &str, created_at: &str) -> UserRow {
        UserRow { id: Some(id.to_string()), created_at: ts(created_at) }
    }

    fn event(user_id: &str, name: &str, created_at: &str) -> FeatureEvent {
        FeatureEvent {
            user_id: Some(user_id.to_string()),
            event_name: Some(name.to_string()),
            created_at: ts(created_at),
        }
    }

    fn payment(amount: f64, currency: Option<&str>) -> PaymentTransaction {
        PaymentTransaction {
            amount,
            currency: currency.map(str::to_string),
            status: Some("success".to_string()),
            created_at: None,
        }
    }

    fn visit(anon_id: Option<&str>, referrer: Option<&str>) -> MarketingEvent {
        MarketingEvent {
            anon_id: anon_id.map(str::to_string),
            created_at: None,
            metadata: referrer.map(|r| serde_json::json!({ "referrer": r })),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_round_percentage() {
        assert_eq!(round_percentage(1.0, 3.0), 33.3);
        assert_eq!(round_percentage(2.0, 3.0), 66.7);
        assert_eq!(round_percentage(1.0, 8.0), 12.5);
        assert_eq!(round_percentage(5.0, 0.0), 0.0);
        assert_eq!(round_percentage(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_unique_count_ignores_missing_keys() {
        let rows = vec![visit(Some("a"), None), visit(Some("a"), None), visit(None, None), visit(Some("b"), None)];
        assert_eq!(unique_count(&rows, |r| r.anon_id.as_deref()), 2);

        let empty: Vec<MarketingEvent> = Vec::new();
        assert_eq!(unique_count(&empty, |r| r.anon_id.as_deref()), 0);
    }

    #[test]
    fn test_sum_by_currency() {
        assert!(sum_by_currency(&[]).is_empty());

        let totals = sum_by_currency(&[
            payment(10.0, Some("EUR")),
            payment(5.0, None),
            payment(2.5, Some("EUR")),
            payment(0.0, Some("")),
        ]);
        assert_eq!(totals.currencies(), vec!["EUR", "USD"]);
        assert_eq!(totals.get("EUR"), Some(12.5));
        assert_eq!(totals.get("USD"), Some(5.0));
    }

    #[test]
    fn test_extract_referrer_host() {
        assert_eq!(extract_referrer_host("https://www.google.com/search?q=jobs"), "google.com");
        assert_eq!(extract_referrer_host("https://news.ycombinator.com/"), "news.ycombinator.com");
        assert_eq!(extract_referrer_host("not a url"), "direct");
        assert_eq!(extract_referrer_host("mailto:someone@example.com"), "direct");
    }

    #[test]
    fn test_top_referrers_order_and_limit() {
        let rows = vec![
            visit(Some("1"), Some("https://b.com")),
            visit(Some("2"), Some("https://a.com")),
            visit(Some("3"), Some("https://a.com")),
            visit(Some("4"), None),
            visit(Some("5"), Some("https://www.b.com/x")),
            visit(Some("6"), Some("garbage")),
            visit(Some("7"), Some("https://c.com")),
            visit(Some("8"), Some("https://d.com")),
            visit(Some("9"), Some("https://e.com")),
        ];

        let top = top_referrers(&rows, 5);
        let sources: Vec<(&str, usize)> = top.iter().map(|r| (r.source.as_str(), r.count)).collect();
        // b.com 先出现，与 a.com、direct 并列时排在前面
        assert_eq!(sources, vec![("b.com", 2), ("a.com", 2), ("direct", 2), ("c.com", 1), ("d.com", 1)]);
    }

    #[test]
    fn test_activation_single_user() {
        let cohort = vec![user("u1", "2024-01-01T00:00:00Z")];
        let events = vec![event("u1", "dashboard_view", "2024-01-01T12:00:00Z")];

        let activation = compute_activation(&cohort, &events, FIRST_VALUE_EVENTS);
        assert_eq!(activation.avg_time_to_first_value_hours, Some(12.0));
        assert_eq!(activation.median_time_to_first_value_hours, Some(12.0));
        assert_eq!(activation.activation_rate_24h, 100.0);
        assert_eq!(activation.activated_users, 1);
        assert_eq!(activation.cohort_size, 1);
    }

    #[test]
    fn test_activation_discards_events_before_signup() {
        let cohort = vec![
            user("u1", "2024-01-02T00:00:00Z"),
            user("u2", "2024-01-01T00:00:00Z"),
        ];
        let events = vec![
            event("u1", "ai_outreach", "2024-01-01T00:00:00Z"),
            event("u2", "ai_outreach", "2024-01-01T06:00:00Z"),
        ];

        let activation = compute_activation(&cohort, &events, FIRST_VALUE_EVENTS);
        assert_eq!(activation.cohort_size, 2);
        assert_eq!(activation.activated_users, 1);
        assert_eq!(activation.activation_rate_24h, 50.0);
        assert_eq!(activation.avg_time_to_first_value_hours, Some(6.0));
    }

    #[test]
    fn test_activation_uses_earliest_first_value_event_only() {
        let cohort = vec![user("u1", "2024-01-01T00:00:00Z"), user("u2", "2024-01-01T00:00:00Z")];
        let events = vec![
            event("u1", "ai_cover_letter", "2024-01-03T00:00:00Z"),
            event("u1", "ai_cover_letter", "2024-01-01T02:00:00Z"),
            event("u1", "settings_opened", "2024-01-01T00:30:00Z"),
            event("u2", "settings_opened", "2024-01-01T01:00:00Z"),
        ];

        let activation = compute_activation(&cohort, &events, FIRST_VALUE_EVENTS);
        assert_eq!(activation.activated_users, 1);
        assert_eq!(activation.avg_time_to_first_value_hours, Some(2.0));
        // u2 没有首次价值事件，但仍计入分母
        assert_eq!(activation.activation_rate_24h, 50.0);
    }

    #[test]
    fn test_activation_upper_median_and_empty() {
        let cohort = vec![
            user("u1", "2024-01-01T00:00:00Z"),
            user("u2", "2024-01-01T00:00:00Z"),
            user("u3", "2024-01-01T00:00:00Z"),
            user("u4", "2024-01-01T00:00:00Z"),
        ];
        let events = vec![
            event("u1", "dashboard_view", "2024-01-01T01:00:00Z"),
            event("u2", "dashboard_view", "2024-01-01T02:00:00Z"),
            event("u3", "dashboard_view", "2024-01-01T10:00:00Z"),
            event("u4", "dashboard_view", "2024-01-03T00:00:00Z"),
        ];

        let activation = compute_activation(&cohort, &events, FIRST_VALUE_EVENTS);
        assert_eq!(activation.median_time_to_first_value_hours, Some(10.0));
        assert_eq!(activation.activation_rate_24h, 75.0);

        let empty = compute_activation(&[], &[], FIRST_VALUE_EVENTS);
        assert_eq!(empty.activation_rate_24h, 0.0);
        assert_eq!(empty.avg_time_to_first_value_hours, None);
        assert_eq!(empty.median_time_to_first_value_hours, None);
    }

    #[test]
    fn test_retention() {
        let users = vec![
            user("u1", "2024-01-01T00:00:00Z"),
            user("u2", "2024-01-01T00:00:00Z"),
            user("u3", "2024-01-01T00:00:00Z"),
        ];
        let events = vec![
            event("u1", "dashboard_view", "2024-01-08T00:00:00Z"),
            event("u2", "dashboard_view", "2024-01-07T23:59:59Z"),
            event("u3", "dashboard_view", "2024-01-02T00:00:00Z"),
        ];
        let by_user = group_events_by_user(&events);
        let cohort: Vec<&UserRow> = users.iter().collect();

        assert_eq!(compute_retention(&cohort, &by_user, 7), 33.3);
        assert_eq!(compute_retention(&[], &by_user, 7), 0.0);
    }

    #[test]
    fn test_retention_cohorts_are_disjoint() {
        let users = vec![
            user("early", "2024-01-05T00:00:00Z"),
            user("mid", "2024-02-10T00:00:00Z"),
            user("recent", "2024-02-28T00:00:00Z"),
            user("edge", "2024-01-31T00:00:00Z"),
        ];
        let now = now();
        let week_cohort = users_created_between(&users, days_before(now, 30), days_before(now, 7));
        let month_cohort = users_created_between(&users, days_before(now, 60), days_before(now, 30));

        let week_ids: Vec<_> = week_cohort.iter().filter_map(|u| u.id.as_deref()).collect();
        let month_ids: Vec<_> = month_cohort.iter().filter_map(|u| u.id.as_deref()).collect();
        assert_eq!(week_ids, vec!["mid", "edge"]);
        assert_eq!(month_ids, vec!["early"]);
    }

    #[test]
    fn test_engagement() {
        let events = vec![
            event("a", "x", "2024-02-29T12:00:00Z"),
            event("b", "x", "2024-02-25T00:00:00Z"),
            event("c", "x", "2024-02-05T00:00:00Z"),
            event("a", "x", "2024-02-05T00:00:00Z"),
            FeatureEvent { user_id: Some("d".into()), event_name: None, created_at: None },
        ];

        let engagement = compute_engagement(&events, now(), &AnalyticsWindows::default());
        assert_eq!(engagement.dau, 1);
        assert_eq!(engagement.wau, 2);
        assert_eq!(engagement.mau, 4);
        assert_eq!(engagement.stickiness, 25.0);

        let empty = compute_engagement(&[], now(), &AnalyticsWindows::default());
        assert_eq!(empty.stickiness, 0.0);
    }

    #[test]
    fn test_revenue_zero_users() {
        let revenue = compute_revenue(3, 0, &[], &[payment(9.0, Some("USD"))]);
        assert_eq!(revenue.conversion_to_paid, 0.0);
        assert!(revenue.last30.is_empty());
        assert_eq!(revenue.all_time.get("USD"), Some(9.0));
    }

    #[test]
    fn test_build_report() {
        let now = now();
        let input = AnalyticsInput {
            marketing_month: vec![
                visit(Some("v1"), Some("https://google.com")),
                visit(Some("v2"), None),
                visit(Some("v2"), None),
                visit(Some("v3"), None),
            ],
            marketing_week: vec![visit(Some("v3"), None)],
            users_month: vec![user("u1", "2024-02-27T00:00:00Z"), user("u2", "2024-02-10T00:00:00Z")],
            users_lookback: vec![
                user("u1", "2024-02-27T00:00:00Z"),
                user("u2", "2024-02-10T00:00:00Z"),
                user("u3", "2024-01-10T00:00:00Z"),
            ],
            events_month: vec![
                event("u1", "dashboard_view", "2024-02-27T03:00:00Z"),
                event("u2", "dashboard_view", "2024-02-25T00:00:00Z"),
            ],
            events_lookback: vec![
                event("u2", "dashboard_view", "2024-02-25T00:00:00Z"),
                event("u3", "dashboard_view", "2024-02-20T00:00:00Z"),
            ],
            active_subscriptions: vec![SubscriptionRow { user_id: Some("u1".into()), status: Some("active".into()), created_at: None }],
            payments_month: vec![payment(20.0, Some("USD"))],
            payments_all: vec![payment(20.0, Some("USD")), payment(15.0, Some("EUR"))],
        };

        let report = build_report(&input, now, &AnalyticsWindows::default(), FIRST_VALUE_EVENTS);

        assert_eq!(report.acquisition.last30.home_views, 4);
        assert_eq!(report.acquisition.last30.unique_visitors, 3);
        assert_eq!(report.acquisition.last30.signups, 2);
        assert_eq!(report.acquisition.last30.signup_conversion, 66.7);
        assert_eq!(report.acquisition.last7.signups, 1);
        assert_eq!(report.acquisition.last7.signup_conversion, 100.0);

        assert_eq!(report.activation.cohort_size, 2);
        assert_eq!(report.activation.activated_users, 2);
        assert_eq!(report.activation.activation_rate_24h, 50.0);

        assert_eq!(report.retention.retention7, 100.0);
        assert_eq!(report.retention.retention30, 100.0);

        assert_eq!(report.revenue.active_subscribers, 1);
        assert_eq!(report.revenue.conversion_to_paid, 33.3);
        assert_eq!(report.revenue.all_time.currencies(), vec!["USD", "EUR"]);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["acquisition"]["last30"]["topReferrers"].is_array());
        assert!(json["revenue"]["allTime"]["EUR"].is_number());
    }

    #[test]
    fn test_build_report_with_custom_windows() {
        let now = now();
        let windows = AnalyticsWindows { day: 3, week: 14, month: 30, retention_lookback: 60 };
        let input = AnalyticsInput {
            users_month: vec![user("u1", "2024-02-20T00:00:00Z"), user("u2", "2024-02-10T00:00:00Z")],
            users_lookback: vec![user("u1", "2024-02-20T00:00:00Z"), user("u2", "2024-02-10T00:00:00Z")],
            events_month: vec![
                event("a", "x", "2024-02-29T12:00:00Z"),
                event("b", "x", "2024-02-27T06:00:00Z"),
                event("c", "x", "2024-02-20T00:00:00Z"),
                event("d", "x", "2024-02-05T00:00:00Z"),
            ],
            events_lookback: vec![event("u2", "x", "2024-02-20T00:00:00Z")],
            ..AnalyticsInput::default()
        };

        let custom = build_report(&input, now, &windows, FIRST_VALUE_EVENTS);
        assert_eq!((custom.engagement.dau, custom.engagement.wau, custom.engagement.mau), (2, 3, 4));
        // u2 落在留存队列里，但注册 14 天后没有事件
        assert_eq!(custom.acquisition.last7.signups, 1);
        assert_eq!(custom.retention.retention7, 0.0);

        let default = build_report(&input, now, &AnalyticsWindows::default(), FIRST_VALUE_EVENTS);
        assert_eq!((default.engagement.dau, default.engagement.wau, default.engagement.mau), (1, 2, 4));
        assert_eq!(default.acquisition.last7.signups, 0);
        assert_eq!(default.retention.retention7, 50.0);
    }

    #[test]
    fn test_out_of_range_windows_do_not_panic() {
        let now = now();
        assert_eq!(days_before(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(days_before(now, 7), now - Duration::days(7));

        let windows = AnalyticsWindows { day: 1, week: 1_000_000_000_000, month: i64::MAX, retention_lookback: i64::MAX };
        let input = AnalyticsInput {
            users_lookback: vec![user("u1", "2024-02-20T00:00:00Z")],
            events_month: vec![event("u1", "x", "2024-02-29T12:00:00Z")],
            events_lookback: vec![event("u1", "x", "2024-02-29T12:00:00Z")],
            ..AnalyticsInput::default()
        };

        let report = build_report(&input, now, &windows, FIRST_VALUE_EVENTS);
        assert_eq!(report.engagement.wau, 1);
        assert_eq!(report.retention.retention30, 0.0);
    }

    #[test]
    fn test_summarize_feature_events() {
        let rows = vec![
            event("a", "ai_outreach", "2024-02-20T00:00:00Z"),
            event("b", "ai_outreach", "2024-02-20T00:00:00Z"),
            event("a", "dashboard_view", "2024-02-20T00:00:00Z"),
            FeatureEvent { user_id: None, event_name: None, created_at: None },
        ];
        let summary = summarize_feature_events(&rows, DEFAULT_TOP_FEATURE_EVENTS);
        assert_eq!(summary.total_events, 4);
        assert_eq!(summary.active_users, 2);
        assert_eq!(summary.top[0], EventCount { event: "ai_outreach".into(), count: 2 });
        assert_eq!(summary.top.len(), 2);
    }

    #[test]
    fn test_funnel_counts_only_active_purchasers() {
        let subs = vec![
            SubscriptionRow { user_id: Some("a".into()), status: Some("active".into()), created_at: None },
            SubscriptionRow { user_id: Some("a".into()), status: Some("active".into()), created_at: None },
            SubscriptionRow { user_id: Some("b".into()), status: Some("canceled".into()), created_at: None },
        ];
        let funnel = build_funnel_window(&[visit(Some("x"), None)], &[event("a", "dashboard_view", "2024-02-20T00:00:00Z")], &subs);
        assert_eq!(funnel, FunnelWindow { home_views: 1, unique_visitors: 1, dashboard_users: 1, purchasers: 1 });
    }

    fn arb_event() -> impl Strategy<Value = FeatureEvent> {
        (proptest::option::of("[a-e]"), 0i64..(40 * 24)).prop_map(|(user_id, hours_ago)| FeatureEvent {
            user_id,
            event_name: Some("dashboard_view".to_string()),
            created_at: Some(now() - Duration::hours(hours_ago)),
        })
    }

    fn arb_payment() -> impl Strategy<Value = PaymentTransaction> {
        (0u32..10_000, proptest::option::of(prop_oneof![Just("USD"), Just("EUR"), Just("INR")]))
            .prop_map(|(amount, currency)| payment(amount as f64, currency))
    }

    proptest! {
        #[test]
        fn prop_engagement_windows_nest(events in proptest::collection::vec(arb_event(), 0..60)) {
            let engagement = compute_engagement(&events, now(), &AnalyticsWindows::default());
            prop_assert!(engagement.dau <= engagement.wau);
            prop_assert!(engagement.wau <= engagement.mau);
            if engagement.mau == 0 {
                prop_assert_eq!(engagement.stickiness, 0.0);
            }
        }

        #[test]
        fn prop_unique_count_matches_distinct_values(ids in proptest::collection::vec(proptest::option::of("[a-d]{0,2}"), 0..40)) {
            let rows: Vec<MarketingEvent> = ids.iter().map(|id| visit(id.as_deref(), None)).collect();
            let expected: HashSet<&str> = ids.iter().filter_map(|id| id.as_deref()).filter(|id| !id.is_empty()).collect();
            prop_assert_eq!(unique_count(&rows, |r| r.anon_id.as_deref()), expected.len());
        }

        #[test]
        fn prop_sum_by_currency_concatenation(
            a in proptest::collection::vec(arb_payment(), 0..20),
            b in proptest::collection::vec(arb_payment(), 0..20),
        ) {
            let mut merged = sum_by_currency(&a);
            merged.merge(&sum_by_currency(&b));

            let combined: Vec<PaymentTransaction> = a.iter().chain(b.iter()).cloned().collect();
            prop_assert_eq!(sum_by_currency(&combined), merged);
        }
    }
}
