pub mod subscriptions;
pub mod user_tokens;
pub mod users;
