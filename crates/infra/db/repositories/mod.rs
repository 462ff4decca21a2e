pub mod subscriptions;
pub mod user_tokens;
