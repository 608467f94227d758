pub mod auth;
pub mod json;
