//! Growth work outside the pipeline: networking events, side projects with
//! code reviews, and small boost tasks.

pub mod handlers;
pub mod store;
