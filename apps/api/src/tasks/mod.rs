pub mod handlers;
pub mod quick_add;
pub mod recurrence;
pub mod store;
