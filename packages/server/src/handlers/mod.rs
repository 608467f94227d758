pub mod auth;
pub mod comment;
pub mod follow;
pub mod oauth;
pub mod post;
pub mod upload;
pub mod user;
