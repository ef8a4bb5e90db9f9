pub mod handlers;
pub mod heat;
pub mod stage;
pub mod store;
