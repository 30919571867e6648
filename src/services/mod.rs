pub mod database;
pub mod auth;
pub mod analytics;
pub mod google_analytics;
pub mod blog;
pub mod media;
pub mod webhook;

// 重新导出常用类型
pub use database::Database;
pub use auth::AuthService;
pub use analytics::AnalyticsService;
pub use google_analytics::GoogleAnalyticsService;
pub use blog::BlogService;
pub use media::MediaService;
pub use webhook::WebhookService;
