pub mod enums;
pub mod pagination;
pub mod plans;
pub mod subscriptions;
