pub mod currencies;
pub mod plan_types;
pub mod subscription_statuses;
pub mod token_types;
