pub mod clock;
pub mod subscriptions;
