use crate::{
    config::Config,
    services::{
        analytics::AnalyticsService,
        auth::AuthService,
        blog::BlogService,
        database::Database,
        google_analytics::GoogleAnalyticsService,
        media::MediaService,
        webhook::WebhookService,
    },
    utils::middleware::KeyedRateLimiter,
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// Supabase 客户端
    pub db: Arc<Database>,

    /// 管理员认证服务
    pub auth_service: AuthService,

    /// 产品指标服务
    pub analytics_service: AnalyticsService,

    /// GA4 代理
    pub google_analytics_service: GoogleAnalyticsService,

    /// 博客文章和分类
    pub blog_service: BlogService,

    /// 图片上传
    pub media_service: MediaService,

    /// 网页抓取和 webhook 测试
    pub webhook_service: WebhookService,

    /// 登录限流
    pub login_limiter: Arc<KeyedRateLimiter>,
}
