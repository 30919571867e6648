use crate::{
    config::{AnalyticsWindows, Config},
    error::Result,
    models::analytics::*,
    services::Database,
    utils::aggregate::{self, days_before, FIRST_VALUE_EVENTS},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

const HOME_VIEW_EVENT: &str = "home_view";
const DASHBOARD_VIEW_EVENT: &str = "dashboard_view";

// 各查询的行数上限
const MARKETING_ROW_CAP: usize = 10_000;
const USERS_MONTH_ROW_CAP: usize = 10_000;
const USERS_LOOKBACK_ROW_CAP: usize = 20_000;
const EVENTS_MONTH_ROW_CAP: usize = 20_000;
const EVENTS_LOOKBACK_ROW_CAP: usize = 40_000;
const SUBSCRIPTION_ROW_CAP: usize = 20_000;
const PAYMENTS_MONTH_ROW_CAP: usize = 10_000;
const PAYMENTS_ALL_ROW_CAP: usize = 20_000;
const SUMMARY_ROW_CAP: usize = 5_000;

const MARKETING_COLUMNS: &str = "anon_id, created_at, metadata";
const USER_COLUMNS: &str = "id, created_at";
const FEATURE_EVENT_COLUMNS: &str = "user_id, event_name, created_at";
const PAYMENT_COLUMNS: &str = "amount, currency, status, created_at";
const SUBSCRIPTION_COLUMNS: &str = "user_id, status, created_at";

#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<Database>,
    windows: AnalyticsWindows,
}

impl AnalyticsService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            windows: config.analytics_windows,
        })
    }

    async fn home_views_since(&self, since: DateTime<Utc>, cap: usize) -> Result<Vec<MarketingEvent>> {
        self.db
            .from("marketing_events")
            .select(MARKETING_COLUMNS)
            .eq("event_name", HOME_VIEW_EVENT)
            .gte("created_at", since)
            .limit(cap)
            .fetch()
            .await
    }

    async fn users_since(&self, since: DateTime<Utc>, cap: usize) -> Result<Vec<UserRow>> {
        self.db
            .from("users")
            .select(USER_COLUMNS)
            .gte("created_at", since)
            .limit(cap)
            .fetch()
            .await
    }

    async fn feature_events_since(&self, since: DateTime<Utc>, cap: usize) -> Result<Vec<FeatureEvent>> {
        self.db
            .from("feature_events")
            .select(FEATURE_EVENT_COLUMNS)
            .gte("created_at", since)
            .limit(cap)
            .fetch()
            .await
    }

    async fn dashboard_views_since(&self, since: DateTime<Utc>) -> Result<Vec<FeatureEvent>> {
        self.db
            .from("feature_events")
            .select(FEATURE_EVENT_COLUMNS)
            .eq("event_name", DASHBOARD_VIEW_EVENT)
            .gte("created_at", since)
            .limit(SUMMARY_ROW_CAP)
            .fetch()
            .await
    }

    async fn subscriptions_since(&self, since: DateTime<Utc>) -> Result<Vec<SubscriptionRow>> {
        self.db
            .from("subscriptions")
            .select(SUBSCRIPTION_COLUMNS)
            .gte("created_at", since)
            .limit(SUMMARY_ROW_CAP)
            .fetch()
            .await
    }

    async fn active_subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        self.db
            .from("subscriptions")
            .select(SUBSCRIPTION_COLUMNS)
            .eq("status", "active")
            .limit(SUBSCRIPTION_ROW_CAP)
            .fetch()
            .await
    }

    async fn successful_payments(&self, since: Option<DateTime<Utc>>, cap: usize) -> Result<Vec<PaymentTransaction>> {
        let query = self
            .db
            .from("payment_transactions")
            .select(PAYMENT_COLUMNS)
            .eq("status", "success");

        let query = match since {
            Some(since) => query.gte("created_at", since),
            None => query,
        };

        query.limit(cap).fetch().await
    }

    /// 拉取一次完整报告需要的九组数据
    pub async fn fetch_input(&self, now: DateTime<Utc>) -> Result<AnalyticsInput> {
        let week_start = days_before(now, self.windows.week);
        let month_start = days_before(now, self.windows.month);
        let lookback_start = days_before(now, self.windows.retention_lookback);

        let (
            marketing_month,
            marketing_week,
            users_month,
            users_lookback,
            events_month,
            events_lookback,
            active_subscriptions,
            payments_month,
            payments_all,
        ) = tokio::try_join!(
            self.home_views_since(month_start, MARKETING_ROW_CAP),
            self.home_views_since(week_start, MARKETING_ROW_CAP),
            self.users_since(month_start, USERS_MONTH_ROW_CAP),
            self.users_since(lookback_start, USERS_LOOKBACK_ROW_CAP),
            self.feature_events_since(month_start, EVENTS_MONTH_ROW_CAP),
            self.feature_events_since(lookback_start, EVENTS_LOOKBACK_ROW_CAP),
            self.active_subscriptions(),
            self.successful_payments(Some(month_start), PAYMENTS_MONTH_ROW_CAP),
            self.successful_payments(None, PAYMENTS_ALL_ROW_CAP),
        )?;

        debug!(
            "Fetched analytics rows: marketing={} users={} events={} payments={}",
            marketing_month.len(),
            users_lookback.len(),
            events_lookback.len(),
            payments_all.len()
        );

        Ok(AnalyticsInput {
            marketing_month,
            marketing_week,
            users_month,
            users_lookback,
            events_month,
            events_lookback,
            active_subscriptions,
            payments_month,
            payments_all,
        })
    }

    /// 获取完整的产品指标报告
    pub async fn get_report(&self) -> Result<AnalyticsReport> {
        let now = Utc::now();
        let input = self.fetch_input(now).await?;
        let report = aggregate::build_report(&input, now, &self.windows, FIRST_VALUE_EVENTS);

        info!(
            "Analytics report built: cohort={} mau={}",
            report.activation.cohort_size, report.engagement.mau
        );
        Ok(report)
    }

    /// 功能使用统计
    pub async fn feature_stats(&self) -> Result<FeatureStats> {
        let now = Utc::now();
        let (month, week) = tokio::try_join!(
            self.feature_events_since(days_before(now, self.windows.month), SUMMARY_ROW_CAP),
            self.feature_events_since(days_before(now, self.windows.week), SUMMARY_ROW_CAP),
        )?;

        Ok(FeatureStats {
            last30: aggregate::summarize_feature_events(&month, aggregate::DEFAULT_TOP_FEATURE_EVENTS),
            last7: aggregate::summarize_feature_events(&week, aggregate::DEFAULT_TOP_FEATURE_EVENTS),
        })
    }

    /// 转化漏斗和收入
    pub async fn insights(&self) -> Result<InsightsReport> {
        let now = Utc::now();
        let week_start = days_before(now, self.windows.week);
        let month_start = days_before(now, self.windows.month);

        let (
            marketing_month,
            marketing_week,
            dashboard_month,
            dashboard_week,
            subs_month,
            subs_week,
            payments_month,
            payments_all,
        ) = tokio::try_join!(
            self.home_views_since(month_start, SUMMARY_ROW_CAP),
            self.home_views_since(week_start, SUMMARY_ROW_CAP),
            self.dashboard_views_since(month_start),
            self.dashboard_views_since(week_start),
            self.subscriptions_since(month_start),
            self.subscriptions_since(week_start),
            self.successful_payments(Some(month_start), SUMMARY_ROW_CAP),
            self.successful_payments(None, PAYMENTS_MONTH_ROW_CAP),
        )?;

        Ok(InsightsReport {
            funnel: Funnel {
                last30: aggregate::build_funnel_window(&marketing_month, &dashboard_month, &subs_month),
                last7: aggregate::build_funnel_window(&marketing_week, &dashboard_week, &subs_week),
            },
            revenue: RevenueBreakdown {
                last30: aggregate::sum_by_currency(&payments_month),
                all_time: aggregate::sum_by_currency(&payments_all),
            },
        })
    }

    /// 注册用户总数：先精确计数 users 表，失败时退回到 Auth Admin API，最后为 0
    pub async fn user_stats(&self) -> Result<UserStats> {
        match self.db.from("users").select("id").count().await {
            Ok(total_users) => return Ok(UserStats { total_users }),
            Err(e) => warn!("Counting users table failed, trying auth admin API: {}", e),
        }

        let total_users = match self.db.count_auth_users().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Auth admin user listing failed: {}", e);
                0
            }
        };

        Ok(UserStats { total_users })
    }
}
