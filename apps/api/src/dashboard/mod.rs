pub mod handlers;
pub mod next_action;
pub mod summary;
