pub mod admin;
pub mod analytics;
pub mod blog;
pub mod google_analytics;
pub mod media;
pub mod webhook;
