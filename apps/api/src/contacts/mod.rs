pub mod handlers;
pub mod referrals;
pub mod store;
