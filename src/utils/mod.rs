pub mod aggregate;
pub mod markdown;
pub mod middleware;
pub mod serde_helpers;
pub mod slug;
pub mod validation;
