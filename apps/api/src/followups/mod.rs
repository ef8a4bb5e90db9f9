pub mod cadence;
pub mod handlers;
pub mod store;
