//! Authentication: Argon2id passwords, HS256 bearer tokens and the
//! `AuthUser` extractor every `/api/v1` handler takes.

pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use extractor::AuthUser;
