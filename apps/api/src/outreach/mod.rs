pub mod handlers;
pub mod personalization;
pub mod store;
